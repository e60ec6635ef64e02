use log::{debug, trace};
use ndarray::Array1;

use super::context::SolveContext;
use super::helper_methods::{close, converged, max_difference};
use super::state_index::StateIndexMap;
use crate::error::{QuantileError, Result};

/// Starting point of plain value iteration: from above when minimising a probability,
/// from below otherwise.
fn seed(ctx: &SolveContext) -> f64 {
    let objective = ctx.objective;
    if objective.is_probability() && objective.min_max().is_min() {
        objective.upper_bound().unwrap_or(1.0)
    } else {
        objective.lower_bound()
    }
}

/// One Bellman update of state `s`: the optimum over its zero-reward choices, folded with
/// the precomputed value of its positive-reward choices.
fn update(ctx: &SolveContext, index: &StateIndexMap, s: usize, x: &Array1<f64>, positive: Option<f64>) -> Result<f64> {
    let mm = ctx.objective.min_max();
    let mut best = positive;
    for c in 0..ctx.model.num_choices(s) {
        if !ctx.model.is_zero_reward_choice(s, c) {
            continue;
        }
        let v = ctx.choice_expectation(s, c, index, x)?;
        best = Some(best.map_or(v, |b| mm.combine(b, v)));
    }
    Ok(best.unwrap_or_else(|| x[index.index_of(s)]))
}

pub fn value_iteration(ctx: &SolveContext, subset: &[usize]) -> Result<(Array1<f64>, StateIndexMap)> {
    let index = StateIndexMap::from_slice(subset);
    let positive = ctx.positive_choice_values(&index)?;
    let init = seed(ctx);
    let mut x: Array1<f64> = positive.iter().map(|v| v.unwrap_or(init)).collect();
    let mut y: Array1<f64> = x.clone();
    let eps = ctx.config.epsilon;
    let termination = ctx.config.termination;

    let mut iterations = 0;
    while iterations < ctx.config.max_iterations {
        iterations += 1;
        for (i, s) in index.states().iter().enumerate() {
            y[i] = update(ctx, &index, *s, &x, positive[i])?;
        }
        let done = converged(&x, &y, eps, termination);
        std::mem::swap(&mut x, &mut y);
        trace!("value iteration {}: max. difference {:e}", iterations, max_difference(&y, &x));
        if done {
            debug!(
                "value iteration on {} states at step {} converged after {} iterations",
                index.size(),
                ctx.step,
                iterations
            );
            debug_assert!(x.iter().all(|v| v.is_finite() && *v >= 0.0));
            return Ok((x, index));
        }
    }
    Err(QuantileError::NotConverged {
        method: "value iteration",
        iterations,
        max_diff: max_difference(&y, &x),
    })
}

/// Iterates a lower and an upper bound until they meet; the midpoint is returned. Only
/// minimising objectives are handled.
pub fn interval_iteration(ctx: &SolveContext, subset: &[usize]) -> Result<(Array1<f64>, StateIndexMap)> {
    let objective = ctx.objective;
    if !objective.min_max().is_min() {
        return Err(QuantileError::Unsupported(
            "interval iteration for maximising objectives".to_string(),
        ));
    }
    let top = match objective.upper_bound() {
        Some(x) => x,
        None => {
            return Err(QuantileError::Unsupported(
                "interval iteration without an upper bound on the values".to_string(),
            ))
        }
    };
    let index = StateIndexMap::from_slice(subset);
    let positive = ctx.positive_choice_values(&index)?;
    let n = index.size();
    let mut lower: Array1<f64> = Array1::from_elem(n, objective.lower_bound());
    let mut upper: Array1<f64> = Array1::from_elem(n, top);
    let mut next_lower = lower.clone();
    let mut next_upper = upper.clone();
    let eps = ctx.config.epsilon;
    let termination = ctx.config.termination;

    let mut iterations = 0;
    while iterations < ctx.config.max_iterations {
        iterations += 1;
        for (i, s) in index.states().iter().enumerate() {
            next_lower[i] = update(ctx, &index, *s, &lower, positive[i])?;
            next_upper[i] = update(ctx, &index, *s, &upper, positive[i])?;
        }
        std::mem::swap(&mut lower, &mut next_lower);
        std::mem::swap(&mut upper, &mut next_upper);
        let done = lower.iter().zip(upper.iter()).all(|(l, u)| close(*l, *u, eps, termination));
        if done {
            debug!(
                "interval iteration on {} states at step {} converged after {} iterations",
                n, ctx.step, iterations
            );
            let mid: Array1<f64> = (&lower + &upper) / 2.0;
            return Ok((mid, index));
        }
    }
    Err(QuantileError::NotConverged {
        method: "interval iteration",
        iterations,
        max_diff: max_difference(&lower, &upper),
    })
}
