use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::calculated::CalculatedValues;
use super::helper_methods::MinMax;
use super::lp;
use super::model::{Model, ModelType};
use super::state_index::StateIndexMap;
use super::value_iteration;
use crate::config::SolverConfig;
use crate::error::{QuantileError, Result};

/// What is being optimised, and how positive-reward choices are valued.
pub trait Objective: Sync {
    fn min_max(&self) -> MinMax;

    fn is_probability(&self) -> bool {
        true
    }

    fn lower_bound(&self) -> f64 {
        0.0
    }

    fn upper_bound(&self) -> Option<f64> {
        if self.is_probability() {
            Some(1.0)
        } else {
            None
        }
    }

    /// Value of taking the positive-reward `choice` in `state` at reward step `step`. Only
    /// values of strictly lower steps may be consulted.
    fn positive_choice_value(&self, state: usize, choice: usize, step: usize) -> Result<f64>;
}

/// Everything a solver reads while solving one state set.
pub struct SolveContext<'a> {
    pub model: &'a dyn Model,
    pub objective: &'a dyn Objective,
    pub calculated: &'a CalculatedValues,
    pub step: usize,
    pub config: &'a SolverConfig,
}

impl<'a> SolveContext<'a> {
    /// Value of a successor outside the set being solved; it must already be final.
    pub fn known_value(&self, state: usize, successor: usize) -> Result<f64> {
        self.calculated
            .get(successor)
            .ok_or_else(|| QuantileError::UndefinedSuccessor {
                state,
                successor,
                step: self.step,
            })
    }

    /// Best value over the positive-reward choices of each state of `index`, `None` for a
    /// state without such a choice. Computed once per solve.
    pub fn positive_choice_values(&self, index: &StateIndexMap) -> Result<Vec<Option<f64>>> {
        let mm = self.objective.min_max();
        let mut values: Vec<Option<f64>> = Vec::with_capacity(index.size());
        for s in index.states().iter() {
            let mut best: Option<f64> = None;
            for c in 0..self.model.num_choices(*s) {
                if self.model.is_zero_reward_choice(*s, c) {
                    continue;
                }
                let v = self.objective.positive_choice_value(*s, c, self.step)?;
                best = Some(best.map_or(v, |b| mm.combine(b, v)));
            }
            values.push(best);
        }
        Ok(values)
    }

    /// Expected value of a zero-reward choice, reading set members from `x`.
    pub fn choice_expectation(&self, s: usize, choice: usize, index: &StateIndexMap, x: &Array1<f64>) -> Result<f64> {
        let mut sum = 0.0;
        for sprime in self.model.successors(s, choice).iter() {
            if sprime.p == 0.0 {
                continue;
            }
            let v = match index.get(sprime.s) {
                Some(ix) => x[ix],
                None => self.known_value(s, sprime.s)?,
            };
            sum += sprime.p * v;
        }
        Ok(sum)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SolutionMethod {
    ValueIteration,
    IntervalIteration,
    LinearProgram,
}

impl SolutionMethod {
    pub fn name(self) -> &'static str {
        match self {
            SolutionMethod::ValueIteration => "value iteration",
            SolutionMethod::IntervalIteration => "interval iteration",
            SolutionMethod::LinearProgram => "linear programming",
        }
    }

    /// Rejects combinations no solver run could handle, before any work is done.
    pub fn check(self, model_type: ModelType, min_max: MinMax, objective: &dyn Objective) -> Result<()> {
        if model_type == ModelType::Ctmc {
            return Err(QuantileError::Unsupported(format!(
                "{} on CTMCs, build the embedded DTMC first",
                self.name()
            )));
        }
        if self == SolutionMethod::IntervalIteration {
            if min_max == MinMax::Max {
                return Err(QuantileError::Unsupported(
                    "interval iteration for maximising objectives".to_string(),
                ));
            }
            if objective.upper_bound().is_none() {
                return Err(QuantileError::Unsupported(
                    "interval iteration without an upper bound on the values".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn solve(self, ctx: &SolveContext, subset: &[usize]) -> Result<(Array1<f64>, StateIndexMap)> {
        self.check(ctx.model.model_type(), ctx.objective.min_max(), ctx.objective)?;
        match self {
            SolutionMethod::ValueIteration => value_iteration::value_iteration(ctx, subset),
            SolutionMethod::IntervalIteration => value_iteration::interval_iteration(ctx, subset),
            SolutionMethod::LinearProgram => lp::lp_solve(ctx, subset),
        }
    }
}
