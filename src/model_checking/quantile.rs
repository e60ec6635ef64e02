//! Reward-bounded reachability, one reward step at a time.
//!
//! Step `r` only reads steps below `r` through positive-reward choices, so each step is a
//! zero-reward fixed point over the states whose value is not fixed by the bound.

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::calculated::CalculatedValues;
use super::context::{Objective, SolveContext};
use super::helper_methods::MinMax;
use super::lp;
use super::model::Model;
use super::precomputation::positive_states;
use super::reward_cache::{create_cache, RewardStepValues};
use super::scc;
use super::state_index::StateIndexMap;
use super::topological::{schedule, Schedule};
use crate::config::SolverConfig;
use crate::error::{QuantileError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardBound {
    /// Reach a target with accumulated reward at most the step.
    Upper,
    /// Reach a target for the first time with accumulated reward at least the step.
    Lower,
}

impl std::str::FromStr for RewardBound {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "upper" | "le" => Ok(RewardBound::Upper),
            "lower" | "ge" => Ok(RewardBound::Lower),
            _ => Err(format!("unknown reward bound '{}'", s)),
        }
    }
}

struct StepObjective<'a> {
    model: &'a dyn Model,
    bound: RewardBound,
    min_max: MinMax,
    cache: &'a dyn RewardStepValues,
    unbounded: Option<&'a [f64]>,
}

impl<'a> StepObjective<'a> {
    fn value_at(&self, state: usize, step: usize, reward: usize) -> f64 {
        match (self.bound, self.unbounded) {
            (RewardBound::Lower, Some(u)) if reward >= step => u[state],
            _ => self.cache.previous_value(state, step - reward),
        }
    }
}

impl<'a> Objective for StepObjective<'a> {
    fn min_max(&self) -> MinMax {
        self.min_max
    }

    fn positive_choice_value(&self, state: usize, choice: usize, step: usize) -> Result<f64> {
        let reward = self.model.choice_reward(state, choice) as usize;
        if self.bound == RewardBound::Upper && reward > step {
            return Ok(0.0);
        }
        Ok(self
            .model
            .successors(state, choice)
            .iter()
            .filter(|x| x.p > 0.0)
            .map(|x| x.p * self.value_at(x.s, step, reward))
            .sum())
    }
}

/// Value of `s` at `step` that follows from the bound alone.
pub(crate) fn fixed_value(
    bound: RewardBound,
    targets: &[bool],
    unbounded: Option<&[f64]>,
    s: usize,
    step: usize,
) -> Option<f64> {
    match (bound, unbounded) {
        (RewardBound::Upper, _) if targets[s] => Some(1.0),
        (RewardBound::Lower, Some(u)) if step == 0 => Some(u[s]),
        (RewardBound::Lower, Some(u)) if targets[s] || u[s] == 0.0 => Some(0.0),
        _ => None,
    }
}

fn solve_and_store(ctx: &SolveContext, subset: &[usize]) -> Result<()> {
    let (values, index) = ctx.config.method.solve(ctx, subset)?;
    for (i, s) in index.states().iter().enumerate() {
        ctx.calculated.set(*s, values[i]);
    }
    Ok(())
}

pub struct QuantileComputation<'a> {
    model: &'a dyn Model,
    targets: Vec<bool>,
    bound: RewardBound,
    min_max: MinMax,
    config: SolverConfig,
    unbounded: Option<Vec<f64>>,
    cache: Box<dyn RewardStepValues>,
    step: usize,
}

impl<'a> QuantileComputation<'a> {
    /// Checks the configuration against the model and allocates the reward-step cache.
    /// `unbounded` holds the plain reachability probabilities and is required for a lower
    /// bound.
    pub fn new(
        model: &'a dyn Model,
        targets: Vec<bool>,
        bound: RewardBound,
        min_max: MinMax,
        config: SolverConfig,
        unbounded: Option<Vec<f64>>,
    ) -> Result<QuantileComputation<'a>> {
        config.validate()?;
        let n = model.num_states();
        if targets.len() != n {
            return Err(QuantileError::InvalidModel(format!(
                "{} target flags for {} states",
                targets.len(),
                n
            )));
        }
        match (&unbounded, bound) {
            (None, RewardBound::Lower) => {
                return Err(QuantileError::InvalidConfig(
                    "a lower reward bound needs the unbounded reachability values".to_string(),
                ))
            }
            (Some(u), _) if u.len() != n => {
                return Err(QuantileError::InvalidModel(format!(
                    "{} unbounded values for {} states",
                    u.len(),
                    n
                )))
            }
            _ => {}
        }
        let cache = create_cache(config.cache, model);
        {
            let objective = StepObjective {
                model,
                bound,
                min_max,
                cache: &*cache,
                unbounded: unbounded.as_deref(),
            };
            config.method.check(model.model_type(), min_max, &objective)?;
        }
        info!(
            "quantile {:?} {:?} on {} states with {} ({:?}, {:?})",
            min_max,
            bound,
            n,
            config.method.name(),
            config.scc_method,
            config.scheduling
        );
        Ok(QuantileComputation {
            model,
            targets,
            bound,
            min_max,
            config,
            unbounded,
            cache,
            step: 0,
        })
    }

    /// The reward step the next call to [`next_step`](Self::next_step) computes.
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn next_step(&mut self) -> Result<CalculatedValues> {
        let r = self.step;
        let n = self.model.num_states();
        let calculated = CalculatedValues::new(n);
        {
            let objective = StepObjective {
                model: self.model,
                bound: self.bound,
                min_max: self.min_max,
                cache: &*self.cache,
                unbounded: self.unbounded.as_deref(),
            };

            let mut open: Vec<usize> = Vec::new();
            let mut direct = 0;
            for s in 0..n {
                if let Some(v) = fixed_value(self.bound, &self.targets, self.unbounded.as_deref(), s, r) {
                    calculated.set(s, v);
                } else if self.model.zero_reward_choices(s).is_empty() {
                    let mut values: Vec<f64> = Vec::with_capacity(self.model.num_choices(s));
                    for c in 0..self.model.num_choices(s) {
                        values.push(objective.positive_choice_value(s, c, r)?);
                    }
                    calculated.set(s, self.min_max.select(values).unwrap_or(0.0));
                    direct += 1;
                } else {
                    open.push(s);
                }
            }

            let index = StateIndexMap::from_slice(&open);
            let positive = positive_states(self.model, &index, self.min_max, |s, c| {
                if self.model.is_zero_reward_choice(s, c) {
                    Ok(self
                        .model
                        .successors(s, c)
                        .iter()
                        .filter(|x| x.p > 0.0 && !index.contains(x.s))
                        .any(|x| calculated.get(x.s).map_or(false, |v| v > 0.0)))
                } else {
                    Ok(objective.positive_choice_value(s, c, r)? > 0.0)
                }
            })?;
            let mut zero = 0;
            let mut open_positive: Vec<usize> = Vec::with_capacity(open.len());
            for (s, p) in open.iter().zip(positive.into_iter()) {
                if p {
                    open_positive.push(*s);
                } else {
                    calculated.set(*s, 0.0);
                    zero += 1;
                }
            }
            let open = open_positive;
            debug!(
                "step {}: {} fixed, {} direct, {} zero, {} zero-reward states",
                r,
                n - direct - zero - open.len(),
                direct,
                zero,
                open.len()
            );

            let ctx = SolveContext {
                model: self.model,
                objective: &objective,
                calculated: &calculated,
                step: r,
                config: &self.config,
            };
            if open.is_empty() {
                // nothing left to solve
            } else if self.config.use_scc {
                let (graph, sccs) = scc::decompose(self.model, &open, self.config.scc_method)?;
                let emits = self.config.scc_method.emits_dependency_order();
                match schedule(&graph, sccs, self.config.scheduling, emits) {
                    Schedule::Sequential(order) => {
                        for component in order.iter() {
                            solve_and_store(&ctx, component)?;
                        }
                    }
                    Schedule::Batches(batches) => {
                        for batch in batches.iter() {
                            batch.par_iter().try_for_each(|component| solve_and_store(&ctx, component))?;
                        }
                    }
                }
            } else {
                solve_and_store(&ctx, &open)?;
            }
        }
        debug_assert_eq!(calculated.num_defined(), n);

        let values = calculated.to_vec();
        self.cache.merge_values_into_previous_values(r, &values);
        self.step += 1;
        Ok(calculated)
    }

    /// Runs the remaining steps up to and including `max_step`, returning each step's values.
    pub fn run(&mut self, max_step: usize) -> Result<Vec<Vec<f64>>> {
        let mut out: Vec<Vec<f64>> = Vec::new();
        while self.step <= max_step {
            out.push(self.next_step()?.to_vec());
        }
        Ok(out)
    }

    /// All steps `0..=max_step` of the same problem from a single linear program.
    pub fn solve_range_lp(&self, max_step: usize) -> Result<Vec<Vec<f64>>> {
        lp::solve_range(
            self.model,
            &self.targets,
            self.bound,
            self.min_max,
            self.unbounded.as_deref(),
            max_step,
        )
    }
}
