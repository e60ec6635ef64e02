use std::borrow::Cow;
use std::collections::BTreeMap;

use log::debug;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::model::Model;
use super::state_index::StateIndexMap;

/// Values of earlier reward steps, kept in a circular window.
///
/// Reading a step that was never merged, or that has already been overwritten by a
/// newer step, returns whatever the slot holds. Callers only ask for steps inside the
/// window; debug builds check this.
pub trait RewardStepValues: Send + Sync {
    /// Stores `values` (indexed by state id) as the result of `step`, overwriting the slot.
    fn merge_values_into_previous_values(&mut self, step: usize, values: &[f64]);

    fn previous_value(&self, state: usize, step: usize) -> f64;

    /// All states at `step`; states outside the cached subset read as NaN.
    fn previous_values(&self, step: usize) -> Cow<'_, [f64]>;

    /// True when `previous_values` has to build a fresh vector.
    fn expensive_array_generation(&self) -> bool;
}

pub fn get_offset(step: usize, window: usize) -> usize {
    step % window
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum CacheKind {
    UniformAll,
    UniformSparse,
    Individual,
}

fn check_window(latest: Option<usize>, step: usize, window: usize) {
    if let Some(latest) = latest {
        debug_assert!(
            step <= latest && latest - step < window,
            "step {} is outside the retained window (latest {}, size {})",
            step,
            latest,
            window
        );
    }
}

/// `[window][all states]`.
pub struct UniformValues {
    window: usize,
    values: Array2<f64>,
    latest: Option<usize>,
}

impl UniformValues {
    pub fn new(num_states: usize, window: usize) -> UniformValues {
        let window = window.max(1);
        UniformValues {
            window,
            values: Array2::from_elem((window, num_states), f64::NAN),
            latest: None,
        }
    }
}

impl RewardStepValues for UniformValues {
    fn merge_values_into_previous_values(&mut self, step: usize, values: &[f64]) {
        debug_assert_eq!(values.len(), self.values.ncols());
        let offset = get_offset(step, self.window);
        self.values.row_mut(offset).assign(&ArrayView1::from(values));
        self.latest = Some(self.latest.map_or(step, |l| l.max(step)));
    }

    fn previous_value(&self, state: usize, step: usize) -> f64 {
        check_window(self.latest, step, self.window);
        self.values[[get_offset(step, self.window), state]]
    }

    fn previous_values(&self, step: usize) -> Cow<'_, [f64]> {
        check_window(self.latest, step, self.window);
        let row = self.values.row(get_offset(step, self.window));
        match row.to_slice() {
            Some(x) => Cow::Borrowed(x),
            None => Cow::Owned(row.to_vec()),
        }
    }

    fn expensive_array_generation(&self) -> bool {
        false
    }
}

/// `[window][subset]`, addressed through a state index map.
pub struct UniformSparseValues {
    window: usize,
    num_states: usize,
    index: StateIndexMap,
    values: Array2<f64>,
    latest: Option<usize>,
}

impl UniformSparseValues {
    pub fn new(num_states: usize, window: usize, index: StateIndexMap) -> UniformSparseValues {
        let window = window.max(1);
        let values = Array2::from_elem((window, index.size()), f64::NAN);
        UniformSparseValues {
            window,
            num_states,
            index,
            values,
            latest: None,
        }
    }
}

impl RewardStepValues for UniformSparseValues {
    fn merge_values_into_previous_values(&mut self, step: usize, values: &[f64]) {
        let offset = get_offset(step, self.window);
        for (ix, s) in self.index.states().iter().enumerate() {
            self.values[[offset, ix]] = values[*s];
        }
        self.latest = Some(self.latest.map_or(step, |l| l.max(step)));
    }

    fn previous_value(&self, state: usize, step: usize) -> f64 {
        check_window(self.latest, step, self.window);
        self.values[[get_offset(step, self.window), self.index.index_of(state)]]
    }

    fn previous_values(&self, step: usize) -> Cow<'_, [f64]> {
        check_window(self.latest, step, self.window);
        let offset = get_offset(step, self.window);
        let mut out = vec![f64::NAN; self.num_states];
        for (ix, s) in self.index.states().iter().enumerate() {
            out[*s] = self.values[[offset, ix]];
        }
        Cow::Owned(out)
    }

    fn expensive_array_generation(&self) -> bool {
        true
    }
}

/// One row per state of the subset, each as long as that state's own lookback.
pub struct IndividualValues {
    num_states: usize,
    index: StateIndexMap,
    rows: Vec<Vec<f64>>,
    latest: Option<usize>,
}

impl IndividualValues {
    /// `offsets` pairs each cached state with the largest step distance it is read from.
    pub fn new(num_states: usize, offsets: &[(usize, usize)]) -> IndividualValues {
        let index = StateIndexMap::new(offsets.iter().map(|(s, _)| *s).collect());
        let rows = offsets.iter().map(|(_, w)| vec![f64::NAN; (*w).max(1)]).collect();
        IndividualValues {
            num_states,
            index,
            rows,
            latest: None,
        }
    }
}

impl RewardStepValues for IndividualValues {
    fn merge_values_into_previous_values(&mut self, step: usize, values: &[f64]) {
        for (ix, s) in self.index.states().iter().enumerate() {
            let row = &mut self.rows[ix];
            let offset = get_offset(step, row.len());
            row[offset] = values[*s];
        }
        self.latest = Some(self.latest.map_or(step, |l| l.max(step)));
    }

    fn previous_value(&self, state: usize, step: usize) -> f64 {
        let row = &self.rows[self.index.index_of(state)];
        check_window(self.latest, step, row.len());
        row[get_offset(step, row.len())]
    }

    fn previous_values(&self, step: usize) -> Cow<'_, [f64]> {
        let mut out = vec![f64::NAN; self.num_states];
        for (ix, s) in self.index.states().iter().enumerate() {
            let row = &self.rows[ix];
            check_window(self.latest, step, row.len());
            out[*s] = row[get_offset(step, row.len())];
        }
        Cow::Owned(out)
    }

    fn expensive_array_generation(&self) -> bool {
        true
    }
}

/// States read through a positive-reward choice, each with the largest reward of such a
/// choice leading into it. Sorted by state.
pub fn highest_referenced_offsets(model: &dyn Model) -> Vec<(usize, usize)> {
    let mut offsets: BTreeMap<usize, usize> = BTreeMap::new();
    for s in 0..model.num_states() {
        for c in 0..model.num_choices(s) {
            let reward = model.choice_reward(s, c) as usize;
            if reward == 0 {
                continue;
            }
            for sprime in model.successors(s, c).iter().filter(|x| x.p > 0.0) {
                let entry = offsets.entry(sprime.s).or_insert(0);
                *entry = (*entry).max(reward);
            }
        }
    }
    offsets.into_iter().collect()
}

pub fn create_cache(kind: CacheKind, model: &dyn Model) -> Box<dyn RewardStepValues> {
    let offsets = highest_referenced_offsets(model);
    let window = offsets.iter().map(|(_, w)| *w).max().unwrap_or(1);
    debug!(
        "reward step cache {:?}: {} of {} states referenced, window {}",
        kind,
        offsets.len(),
        model.num_states(),
        window
    );
    match kind {
        CacheKind::UniformAll => Box::new(UniformValues::new(model.num_states(), window)),
        CacheKind::UniformSparse => {
            let index = StateIndexMap::new(offsets.iter().map(|(s, _)| *s).collect());
            Box::new(UniformSparseValues::new(model.num_states(), window, index))
        }
        CacheKind::Individual => Box::new(IndividualValues::new(model.num_states(), &offsets)),
    }
}
