use std::collections::HashMap;

/// Dense positions `0..n` for a working subset of state ids.
///
/// Built once per subset and read-only afterwards, so a map can be shared by reference
/// between the workers of a parallel batch.
#[derive(Debug, Clone, PartialEq)]
pub struct StateIndexMap {
    states: Vec<usize>,
    index: HashMap<usize, usize>,
}

impl StateIndexMap {
    pub fn new(states: Vec<usize>) -> StateIndexMap {
        let mut index: HashMap<usize, usize> = HashMap::with_capacity(states.len());
        for (ix, s) in states.iter().enumerate() {
            let previous = index.insert(*s, ix);
            debug_assert!(previous.is_none(), "state {} appears twice in the subset", s);
        }
        StateIndexMap { states, index }
    }

    pub fn from_slice(states: &[usize]) -> StateIndexMap {
        StateIndexMap::new(states.to_vec())
    }

    /// Position of `state`. Asking for a state outside the subset is a bug in the caller.
    pub fn index_of(&self, state: usize) -> usize {
        match self.index.get(&state) {
            Some(ix) => *ix,
            None => panic!("state {} is not part of the indexed subset", state),
        }
    }

    pub fn get(&self, state: usize) -> Option<usize> {
        self.index.get(&state).copied()
    }

    pub fn contains(&self, state: usize) -> bool {
        self.index.contains_key(&state)
    }

    pub fn size(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[usize] {
        &self.states[..]
    }

    pub fn state(&self, ix: usize) -> usize {
        self.states[ix]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_positions_follow_input_order() {
        let map = StateIndexMap::new(vec![7, 3, 11]);
        assert_eq!(map.size(), 3);
        assert_eq!(map.index_of(7), 0);
        assert_eq!(map.index_of(11), 2);
        assert_eq!(map.state(1), 3);
        assert_eq!(map.get(4), None);
        assert_eq!(map.states(), &[7, 3, 11]);
    }

    #[test]
    #[should_panic]
    fn absent_state_is_a_bug() {
        let map = StateIndexMap::new(vec![0, 1]);
        map.index_of(2);
    }
}
