//! Exact solution of the fixed-point equations as a linear program.
//!
//! Semantic minimisation is encoded as `x_s <= value of each choice` with the sum of all
//! variables maximised, maximisation as `>=` with the sum minimised. Probabilistic models
//! have one equation per state.

use std::collections::BTreeMap;

use log::debug;
use minilp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem, Variable};
use ndarray::Array1;

use super::context::SolveContext;
use super::helper_methods::MinMax;
use super::model::{Model, ModelType};
use super::precomputation::positive_states;
use super::quantile::{fixed_value, RewardBound};
use super::state_index::StateIndexMap;
use crate::error::{QuantileError, Result};

fn relation(model_type: ModelType, min_max: MinMax) -> Result<(OptimizationDirection, ComparisonOp)> {
    let direction = match min_max {
        MinMax::Min => OptimizationDirection::Maximize,
        MinMax::Max => OptimizationDirection::Minimize,
    };
    match (model_type, min_max) {
        (ModelType::Dtmc, _) => Ok((direction, ComparisonOp::Eq)),
        (ModelType::Mdp, MinMax::Min) => Ok((direction, ComparisonOp::Le)),
        (ModelType::Mdp, MinMax::Max) => Ok((direction, ComparisonOp::Ge)),
        (ModelType::Ctmc, _) => Err(QuantileError::Unsupported(
            "linear programming on CTMCs".to_string(),
        )),
    }
}

/// One constraint `x_lhs op sum(coeff * x_col) + constant`, coefficients summed per column.
struct Row {
    lhs: usize,
    coeffs: BTreeMap<usize, f64>,
    constant: f64,
}

impl Row {
    fn new(lhs: usize) -> Row {
        Row {
            lhs,
            coeffs: BTreeMap::new(),
            constant: 0.0,
        }
    }

    fn var(&mut self, col: usize, p: f64) {
        *self.coeffs.entry(col).or_insert(0.0) += p;
    }

    fn constant(&mut self, v: f64) {
        self.constant += v;
    }
}

/// The LP together with the translation from dense column numbers to solver variables.
struct Columns {
    problem: Problem,
    vars: Vec<Variable>,
}

impl Columns {
    fn new(direction: OptimizationDirection) -> Columns {
        Columns {
            problem: Problem::new(direction),
            vars: Vec::new(),
        }
    }

    fn add(&mut self, bounds: (f64, f64)) -> usize {
        let v = self.problem.add_var(1.0, bounds);
        self.vars.push(v);
        self.vars.len() - 1
    }

    fn add_row(&mut self, row: &Row, op: ComparisonOp) -> Result<()> {
        // x_lhs - sum(coeff * x_col) op constant
        let mut coeffs: BTreeMap<usize, f64> = BTreeMap::new();
        coeffs.insert(row.lhs, 1.0);
        for (col, p) in row.coeffs.iter() {
            *coeffs.entry(*col).or_insert(0.0) -= *p;
        }
        let mut expr = LinearExpr::empty();
        let mut terms = 0;
        for (col, coeff) in coeffs.into_iter() {
            if coeff != 0.0 {
                expr.add(self.vars[col], coeff);
                terms += 1;
            }
        }
        if terms == 0 {
            let holds = match op {
                ComparisonOp::Eq => row.constant.abs() < 1e-12,
                ComparisonOp::Le => row.constant >= 0.0,
                ComparisonOp::Ge => row.constant <= 0.0,
            };
            return if holds {
                Ok(())
            } else {
                Err(QuantileError::InvalidModel(format!(
                    "constraint of column {} is empty and infeasible",
                    row.lhs
                )))
            };
        }
        self.problem.add_constraint(expr, op, row.constant);
        Ok(())
    }

    fn solve(self) -> Result<Vec<f64>> {
        let solution = self.problem.solve()?;
        Ok(self.vars.iter().map(|v| solution[*v]).collect())
    }
}

/// Solves one state set exactly. Same contract as the iterative solvers.
pub fn lp_solve(ctx: &SolveContext, subset: &[usize]) -> Result<(Array1<f64>, StateIndexMap)> {
    let objective = ctx.objective;
    let (direction, op) = relation(ctx.model.model_type(), objective.min_max())?;
    let index = StateIndexMap::from_slice(subset);
    let upper = match objective.upper_bound() {
        Some(x) => x,
        None => f64::INFINITY,
    };
    let bounds = (objective.lower_bound(), upper);

    let mut lp = Columns::new(direction);
    for _ in 0..index.size() {
        lp.add(bounds);
    }
    let mut rows = 0;
    for (i, s) in index.states().iter().enumerate() {
        for c in 0..ctx.model.num_choices(*s) {
            let mut row = Row::new(i);
            if ctx.model.is_zero_reward_choice(*s, c) {
                for sprime in ctx.model.successors(*s, c).iter().filter(|x| x.p > 0.0) {
                    match index.get(sprime.s) {
                        Some(j) => row.var(j, sprime.p),
                        None => row.constant(sprime.p * ctx.known_value(*s, sprime.s)?),
                    }
                }
            } else {
                row.constant(objective.positive_choice_value(*s, c, ctx.step)?);
            }
            lp.add_row(&row, op)?;
            rows += 1;
        }
    }
    debug!(
        "LP for {} states at step {}: {} constraints",
        index.size(),
        ctx.step,
        rows
    );
    let values: Array1<f64> = lp.solve()?.into_iter().collect();
    Ok((values, index))
}

#[derive(Debug, Clone, Copy)]
enum Cell {
    Const(f64),
    Var(usize),
}

/// Cell of state `s` at step `k`. Steps at or below zero of a lower bound read the
/// unbounded values.
fn cell_at(cells: &[Vec<Cell>], bound: RewardBound, unbounded: Option<&[f64]>, s: usize, k: i64) -> Cell {
    match (bound, unbounded) {
        (RewardBound::Lower, Some(u)) if k <= 0 => Cell::Const(u[s]),
        _ => cells[k as usize][s],
    }
}

/// Values of every state at every reward step `0..=max_step` from one LP, indexed
/// `[step][state]`.
pub fn solve_range(
    model: &dyn Model,
    targets: &[bool],
    bound: RewardBound,
    min_max: MinMax,
    unbounded: Option<&[f64]>,
    max_step: usize,
) -> Result<Vec<Vec<f64>>> {
    let (direction, op) = relation(model.model_type(), min_max)?;
    let n = model.num_states();
    let mut lp = Columns::new(direction);

    let unbounded = match (bound, unbounded) {
        (RewardBound::Lower, None) => {
            return Err(QuantileError::InvalidConfig(
                "a lower reward bound needs the unbounded reachability values".to_string(),
            ))
        }
        (_, u) => u,
    };

    let mut cells: Vec<Vec<Cell>> = Vec::with_capacity(max_step + 1);
    for k in 0..=max_step {
        let fixed: Vec<Option<f64>> = (0..n).map(|s| fixed_value(bound, targets, unbounded, s, k)).collect();
        let open = StateIndexMap::new((0..n).filter(|s| fixed[*s].is_none()).collect());
        let positive = positive_states(model, &open, min_max, |s, c| {
            let w = model.choice_reward(s, c) as i64;
            let mut succ = model.successors(s, c).iter().filter(|x| x.p > 0.0);
            Ok(if w == 0 {
                succ.any(|x| fixed[x.s].map_or(false, |v| v > 0.0))
            } else if bound == RewardBound::Upper && w > k as i64 {
                false
            } else {
                succ.any(|x| match cell_at(&cells, bound, unbounded, x.s, k as i64 - w) {
                    Cell::Const(v) => v > 0.0,
                    Cell::Var(_) => true,
                })
            })
        })?;
        let row: Vec<Cell> = (0..n)
            .map(|s| match fixed[s] {
                Some(v) => Cell::Const(v),
                None if positive[open.index_of(s)] => Cell::Var(lp.add((0.0, 1.0))),
                None => Cell::Const(0.0),
            })
            .collect();
        cells.push(row);
    }

    let mut rows = 0;
    for k in 0..=max_step {
        for s in 0..n {
            let lhs = match cells[k][s] {
                Cell::Var(col) => col,
                Cell::Const(_) => continue,
            };
            for c in 0..model.num_choices(s) {
                let w = model.choice_reward(s, c) as i64;
                let mut row = Row::new(lhs);
                if bound == RewardBound::Upper && w > k as i64 {
                    // the bound is exceeded, the choice is worth nothing
                } else {
                    for sprime in model.successors(s, c).iter().filter(|x| x.p > 0.0) {
                        match cell_at(&cells, bound, unbounded, sprime.s, k as i64 - w) {
                            Cell::Var(col) => row.var(col, sprime.p),
                            Cell::Const(v) => row.constant(sprime.p * v),
                        }
                    }
                }
                lp.add_row(&row, op)?;
                rows += 1;
            }
        }
    }
    debug!(
        "range LP over steps 0..={}: {} variables, {} constraints",
        max_step,
        lp.vars.len(),
        rows
    );

    let x = lp.solve()?;
    Ok(cells
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    Cell::Const(v) => v,
                    Cell::Var(col) => x[col],
                })
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverConfig;
    use crate::model_checking::calculated::CalculatedValues;
    use crate::model_checking::context::tests::FixedObjective;
    use crate::model_checking::model::ExplicitModel;
    use test_log::test;

    /// s0 pays 1 to reach s1, s1 reaches the goal s2 or falls back to s0.
    fn chain(model_type: ModelType) -> ExplicitModel {
        let mut m = ExplicitModel::new(model_type, 3);
        m.add_choice(0, "a", 1, &[(1, 1.0)])
            .add_choice(1, "a", 0, &[(2, 0.5), (0, 0.5)])
            .add_choice(2, "a", 0, &[(2, 1.0)]);
        m
    }

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-6, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn single_set_matches_hand_solution() {
        let mut m = ExplicitModel::new(ModelType::Dtmc, 4);
        m.add_choice(0, "a", 0, &[(1, 1.0)])
            .add_choice(1, "a", 0, &[(0, 0.5), (2, 0.25), (3, 0.25)])
            .add_choice(2, "a", 0, &[(2, 1.0)])
            .add_choice(3, "a", 0, &[(3, 1.0)]);
        let calculated = CalculatedValues::new(4);
        calculated.set(2, 1.0);
        calculated.set(3, 0.0);
        let config = SolverConfig::default();
        for mm in [MinMax::Min, MinMax::Max].iter() {
            let objective = FixedObjective::new(*mm);
            let ctx = SolveContext {
                model: &m,
                objective: &objective,
                calculated: &calculated,
                step: 0,
                config: &config,
            };
            let (x, _) = lp_solve(&ctx, &[0, 1]).unwrap();
            assert_close(x.as_slice().unwrap(), &[0.5, 0.5]);
        }
    }

    #[test]
    fn mdp_choices_are_inequalities() {
        // state 1 may stay in the cycle or leave through a rewarded choice worth 0.2
        let mut m = ExplicitModel::new(ModelType::Mdp, 3);
        m.add_choice(0, "a", 0, &[(1, 1.0)])
            .add_choice(1, "a", 0, &[(0, 0.5), (2, 0.5)])
            .add_choice(1, "b", 2, &[(2, 1.0)])
            .add_choice(2, "a", 0, &[(2, 1.0)]);
        let calculated = CalculatedValues::new(3);
        calculated.set(2, 1.0);
        let mut objective = FixedObjective::new(MinMax::Min);
        objective.positive.insert((1, 1), 0.2);
        let config = SolverConfig::default();
        let ctx = SolveContext {
            model: &m,
            objective: &objective,
            calculated: &calculated,
            step: 2,
            config: &config,
        };
        let (x, _) = lp_solve(&ctx, &[0, 1]).unwrap();
        assert_close(x.as_slice().unwrap(), &[0.2, 0.2]);

        objective.min_max = MinMax::Max;
        let ctx = SolveContext {
            model: &m,
            objective: &objective,
            calculated: &calculated,
            step: 2,
            config: &config,
        };
        let (x, _) = lp_solve(&ctx, &[0, 1]).unwrap();
        assert_close(x.as_slice().unwrap(), &[1.0, 1.0]);
    }

    #[test]
    fn upper_bound_range() {
        let m = chain(ModelType::Dtmc);
        let targets = vec![false, false, true];
        let values = solve_range(&m, &targets, RewardBound::Upper, MinMax::Max, None, 2).unwrap();
        assert_close(&values[0], &[0.0, 0.5, 1.0]);
        assert_close(&values[1], &[0.5, 0.75, 1.0]);
        assert_close(&values[2], &[0.75, 0.875, 1.0]);
    }

    #[test]
    fn range_fixes_states_that_miss_the_goal() {
        // s0 pays 1 to flip between the goal s1 and the absorbing s2
        let mut m = ExplicitModel::new(ModelType::Mdp, 3);
        m.add_choice(0, "a", 1, &[(1, 0.5), (2, 0.5)])
            .add_choice(1, "a", 0, &[(1, 1.0)])
            .add_choice(2, "a", 0, &[(2, 1.0)]);
        let targets = vec![false, true, false];
        for mm in [MinMax::Min, MinMax::Max].iter() {
            let values = solve_range(&m, &targets, RewardBound::Upper, *mm, None, 2).unwrap();
            assert_close(&values[0], &[0.0, 1.0, 0.0]);
            assert_close(&values[1], &[0.5, 1.0, 0.0]);
            assert_close(&values[2], &[0.5, 1.0, 0.0]);
        }
    }

    #[test]
    fn lower_bound_range() {
        let m = chain(ModelType::Mdp);
        let targets = vec![false, false, true];
        let unbounded = vec![1.0, 1.0, 1.0];
        let values = solve_range(&m, &targets, RewardBound::Lower, MinMax::Min, Some(&unbounded), 3).unwrap();
        assert_close(&values[0], &[1.0, 1.0, 1.0]);
        assert_close(&values[1], &[1.0, 0.5, 0.0]);
        assert_close(&values[2], &[0.5, 0.25, 0.0]);
        assert_close(&values[3], &[0.25, 0.125, 0.0]);
    }

    #[test]
    fn lower_bound_needs_unbounded_values() {
        let m = chain(ModelType::Dtmc);
        let res = solve_range(&m, &[false, false, true], RewardBound::Lower, MinMax::Min, None, 1);
        assert!(matches!(res, Err(QuantileError::InvalidConfig(_))));
    }
}
