//! Qualitative pass over the zero-reward part of one reward step.
//!
//! States that cannot reach a positive value, or under `Min` can avoid every positive value
//! forever, are 0. Fixing them before solving leaves a fixed point that is unique, so value
//! iteration from above and the maximising LP land on the right one.

use log::trace;

use super::helper_methods::MinMax;
use super::model::Model;
use super::state_index::StateIndexMap;
use crate::error::Result;

/// Flags, by dense index of `open`, the states whose value is positive.
///
/// `exit_hits(s, c)` tells whether choice `c` of `s` reaches a positive value outside
/// `open`. Zero-reward successors inside `open` are followed here. With `Max` one such
/// choice is enough, with `Min` every choice of the state needs one.
pub fn positive_states<F>(
    model: &dyn Model,
    open: &StateIndexMap,
    min_max: MinMax,
    mut exit_hits: F,
) -> Result<Vec<bool>>
where
    F: FnMut(usize, usize) -> Result<bool>,
{
    let n = open.size();
    let mut positive = vec![false; n];
    // choices of each state still without a positive successor
    let mut missing: Vec<usize> = vec![0; n];
    let mut owner: Vec<usize> = Vec::new();
    let mut hit: Vec<bool> = Vec::new();
    let mut waiting: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut stack: Vec<usize> = Vec::new();

    for (i, s) in open.states().iter().enumerate() {
        let choices = model.num_choices(*s);
        missing[i] = match min_max {
            MinMax::Max => 1,
            MinMax::Min => choices,
        };
        for c in 0..choices {
            if exit_hits(*s, c)? {
                missing[i] = missing[i].saturating_sub(1);
                continue;
            }
            if !model.is_zero_reward_choice(*s, c) {
                continue;
            }
            let id = owner.len();
            owner.push(i);
            hit.push(false);
            for sprime in model.successors(*s, c).iter().filter(|x| x.p > 0.0) {
                if let Some(j) = open.get(sprime.s) {
                    waiting[j].push(id);
                }
            }
        }
        if missing[i] == 0 {
            positive[i] = true;
            stack.push(i);
        }
    }

    while let Some(j) = stack.pop() {
        for id in waiting[j].iter() {
            if hit[*id] {
                continue;
            }
            hit[*id] = true;
            let i = owner[*id];
            if positive[i] {
                continue;
            }
            missing[i] -= 1;
            if missing[i] == 0 {
                positive[i] = true;
                stack.push(i);
            }
        }
    }
    trace!(
        "{:?}: {} of {} open states have a positive value",
        min_max,
        positive.iter().filter(|p| **p).count(),
        n
    );
    Ok(positive)
}
