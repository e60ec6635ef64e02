use std::sync::atomic::{AtomicU64, Ordering};

const UNDEFINED: u64 = u64::MAX;

/// Per-state results of one reward step.
///
/// Each slot goes from undefined to its final value exactly once. Slots are atomic so
/// the workers of a batch can publish the values of their own component through `&self`.
#[derive(Debug)]
pub struct CalculatedValues {
    values: Vec<AtomicU64>,
}

impl CalculatedValues {
    pub fn new(num_states: usize) -> CalculatedValues {
        let mut values = Vec::with_capacity(num_states);
        values.resize_with(num_states, || AtomicU64::new(UNDEFINED));
        CalculatedValues { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, s: usize) -> Option<f64> {
        match self.values[s].load(Ordering::Acquire) {
            UNDEFINED => None,
            bits => Some(f64::from_bits(bits)),
        }
    }

    pub fn is_defined(&self, s: usize) -> bool {
        self.get(s).is_some()
    }

    pub fn set(&self, s: usize, value: f64) {
        let previous = self.values[s].swap(value.to_bits(), Ordering::Release);
        debug_assert!(previous == UNDEFINED, "value of state {} written twice", s);
    }

    pub fn num_defined(&self) -> usize {
        (0..self.len()).filter(|s| self.is_defined(*s)).count()
    }

    /// Snapshot with NaN standing in for undefined entries.
    pub fn to_vec(&self) -> Vec<f64> {
        (0..self.len()).map(|s| self.get(s).unwrap_or(f64::NAN)).collect()
    }
}
