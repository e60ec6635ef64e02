//! Strongly connected components of the zero-reward subgraph.
//!
//! Components are reported as vectors of state ids. The two Tarjan variants emit them in
//! dependency order (every component after the components it has edges into); the
//! colouring variant does not and needs [`super::topological`] to sort its output.

mod coloring;
mod tarjan;

use log::debug;
use serde::{Deserialize, Serialize};

use super::model::Model;
use super::state_index::StateIndexMap;
use crate::error::{QuantileError, Result};

pub use coloring::coloring_scc;
pub use tarjan::{recursive_tarjan_scc, tarjan_scc};

/// Zero-reward edges between the states of a subset, on dense indices.
#[derive(Debug, Clone)]
pub struct ZeroRewardGraph {
    index: StateIndexMap,
    successors: Vec<Vec<usize>>,
}

impl ZeroRewardGraph {
    pub fn new(model: &dyn Model, index: StateIndexMap) -> ZeroRewardGraph {
        let successors = index
            .states()
            .iter()
            .map(|s| model.zero_reward_successors(*s, &index))
            .collect();
        ZeroRewardGraph { index, successors }
    }

    /// Graph over `0..successors.len()` with identity state ids.
    pub fn from_adjacency(successors: Vec<Vec<usize>>) -> ZeroRewardGraph {
        let index = StateIndexMap::new((0..successors.len()).collect());
        ZeroRewardGraph { index, successors }
    }

    pub fn len(&self) -> usize {
        self.successors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    pub fn index(&self) -> &StateIndexMap {
        &self.index
    }

    pub fn successors(&self, v: usize) -> &[usize] {
        &self.successors[v][..]
    }

    pub fn predecessors(&self) -> Vec<Vec<usize>> {
        let mut pred: Vec<Vec<usize>> = vec![Vec::new(); self.len()];
        for (v, succ) in self.successors.iter().enumerate() {
            for w in succ.iter() {
                pred[*w].push(v);
            }
        }
        pred
    }

    pub fn num_edges(&self) -> usize {
        self.successors.iter().map(|x| x.len()).sum()
    }
}

/// Collects the components of one decomposition run.
#[derive(Debug, Default)]
pub struct SccStore {
    sccs: Vec<Vec<usize>>,
    done: bool,
}

impl SccStore {
    pub fn new() -> SccStore {
        SccStore::default()
    }

    pub fn notify_next_scc(&mut self, scc: Vec<usize>) {
        debug_assert!(!self.done, "component reported after the decomposition finished");
        debug_assert!(!scc.is_empty());
        self.sccs.push(scc);
    }

    pub fn notify_done(&mut self) {
        self.done = true;
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn sccs(&self) -> Result<&[Vec<usize>]> {
        if self.done {
            Ok(&self.sccs[..])
        } else {
            Err(QuantileError::SccStoreNotFinished)
        }
    }

    pub fn into_sccs(self) -> Result<Vec<Vec<usize>>> {
        if self.done {
            Ok(self.sccs)
        } else {
            Err(QuantileError::SccStoreNotFinished)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SccMethod {
    /// Tarjan on an explicit work stack.
    Tarjan,
    RecursiveTarjan,
    /// Two-pass forward/backward colouring.
    Coloring,
}

impl SccMethod {
    /// Whether the emission order already puts every component after its successors.
    pub fn emits_dependency_order(self) -> bool {
        match self {
            SccMethod::Tarjan | SccMethod::RecursiveTarjan => true,
            SccMethod::Coloring => false,
        }
    }

    pub fn decompose(self, graph: &ZeroRewardGraph) -> Result<Vec<Vec<usize>>> {
        let mut store = SccStore::new();
        match self {
            SccMethod::Tarjan => tarjan_scc(graph, &mut store),
            SccMethod::RecursiveTarjan => recursive_tarjan_scc(graph, &mut store),
            SccMethod::Coloring => coloring_scc(graph, &mut store),
        }
        let sccs = store.into_sccs()?;
        debug!(
            "{:?}: {} states, {} zero-reward edges, {} SCCs",
            self,
            graph.len(),
            graph.num_edges(),
            sccs.len()
        );
        Ok(sccs)
    }
}

/// Decomposes the zero-reward subgraph induced by `subset`.
pub fn decompose(model: &dyn Model, subset: &[usize], method: SccMethod) -> Result<(ZeroRewardGraph, Vec<Vec<usize>>)> {
    let graph = ZeroRewardGraph::new(model, StateIndexMap::from_slice(subset));
    let sccs = method.decompose(&graph)?;
    Ok((graph, sccs))
}
