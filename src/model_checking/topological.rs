//! Processing order for the SCCs of a zero-reward subgraph.
//!
//! A component depends on every component it has a zero-reward edge into, so an order is
//! valid when each component comes after all of its successors in the condensed DAG.

use std::collections::VecDeque;

use log::debug;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use super::scc::ZeroRewardGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Scheduling {
    Sequential,
    /// Batches of independent components, tracking the full condensed DAG.
    Parallel,
    /// Batches of independent components, tracking successor counts only.
    ParallelCounting,
}

/// Edges between components. Component ids are positions in the SCC list.
#[derive(Debug, Clone)]
pub struct Condensation {
    pub scc_of: Vec<usize>,
    pub successors: Vec<Vec<usize>>,
}

impl Condensation {
    pub fn new(graph: &ZeroRewardGraph, sccs: &[Vec<usize>]) -> Condensation {
        let mut scc_of = vec![usize::MAX; graph.len()];
        for (c, scc) in sccs.iter().enumerate() {
            for s in scc.iter() {
                scc_of[graph.index().index_of(*s)] = c;
            }
        }
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); sccs.len()];
        for v in 0..graph.len() {
            let c = scc_of[v];
            for w in graph.successors(v).iter() {
                let d = scc_of[*w];
                if d != c && !successors[c].contains(&d) {
                    successors[c].push(d);
                }
            }
        }
        Condensation { scc_of, successors }
    }

    pub fn len(&self) -> usize {
        self.successors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    pub fn predecessors(&self) -> Vec<Vec<usize>> {
        let mut pred: Vec<Vec<usize>> = vec![Vec::new(); self.len()];
        for (c, succ) in self.successors.iter().enumerate() {
            for d in succ.iter() {
                pred[*d].push(c);
            }
        }
        pred
    }
}

/// Puts `sccs` into dependency order. Output of a decomposer that already emits that order
/// is returned unchanged; otherwise components are peeled off by in-degree (sources
/// first) and the result is reversed.
pub fn sequential_order(graph: &ZeroRewardGraph, sccs: Vec<Vec<usize>>, emits_dependency_order: bool) -> Vec<Vec<usize>> {
    if emits_dependency_order {
        return sccs;
    }
    let cond = Condensation::new(graph, &sccs);
    let mut indegree = vec![0usize; cond.len()];
    for succ in cond.successors.iter() {
        for d in succ.iter() {
            indegree[*d] += 1;
        }
    }
    let mut queue: VecDeque<usize> = (0..cond.len()).filter(|c| indegree[*c] == 0).collect();
    let mut order: Vec<usize> = Vec::with_capacity(cond.len());
    while let Some(c) = queue.pop_front() {
        order.push(c);
        for d in cond.successors[c].iter() {
            indegree[*d] -= 1;
            if indegree[*d] == 0 {
                queue.push_back(*d);
            }
        }
    }
    debug_assert_eq!(order.len(), cond.len(), "condensation is not acyclic");
    order.reverse();
    let mut slots: Vec<Option<Vec<usize>>> = sccs.into_iter().map(Some).collect();
    order.into_iter().filter_map(|c| slots[c].take()).collect()
}

/// Sink-first batches over the condensed DAG kept as a petgraph map, which also answers
/// dependency queries between components.
pub struct SccBatches {
    dag: DiGraphMap<usize, ()>,
    remaining: Vec<usize>,
    ready: Vec<usize>,
}

impl SccBatches {
    pub fn new(cond: &Condensation) -> SccBatches {
        let mut dag: DiGraphMap<usize, ()> = DiGraphMap::new();
        for c in 0..cond.len() {
            dag.add_node(c);
        }
        for (c, succ) in cond.successors.iter().enumerate() {
            for d in succ.iter() {
                dag.add_edge(c, *d, ());
            }
        }
        let remaining: Vec<usize> = (0..cond.len())
            .map(|c| dag.neighbors_directed(c, Direction::Outgoing).count())
            .collect();
        let ready = (0..cond.len()).filter(|c| remaining[*c] == 0).collect();
        SccBatches { dag, remaining, ready }
    }

    /// True if component `a` has an edge into component `b`.
    pub fn depends_on(&self, a: usize, b: usize) -> bool {
        self.dag.contains_edge(a, b)
    }

    pub fn dependants(&self, c: usize) -> Vec<usize> {
        self.dag.neighbors_directed(c, Direction::Incoming).collect()
    }
}

impl Iterator for SccBatches {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.ready.is_empty() {
            return None;
        }
        let batch = std::mem::replace(&mut self.ready, Vec::new());
        for c in batch.iter() {
            for p in self.dag.neighbors_directed(*c, Direction::Incoming) {
                self.remaining[p] -= 1;
                if self.remaining[p] == 0 {
                    self.ready.push(p);
                }
            }
        }
        Some(batch)
    }
}

/// Sink-first batches tracking only how many unprocessed successors each component has.
pub struct SccBatchCounter {
    predecessors: Vec<Vec<usize>>,
    remaining: Vec<usize>,
    ready: Vec<usize>,
}

impl SccBatchCounter {
    pub fn new(cond: &Condensation) -> SccBatchCounter {
        let remaining: Vec<usize> = cond.successors.iter().map(|x| x.len()).collect();
        let ready = (0..cond.len()).filter(|c| remaining[*c] == 0).collect();
        SccBatchCounter {
            predecessors: cond.predecessors(),
            remaining,
            ready,
        }
    }
}

impl Iterator for SccBatchCounter {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.ready.is_empty() {
            return None;
        }
        let batch = std::mem::replace(&mut self.ready, Vec::new());
        for c in batch.iter() {
            for p in self.predecessors[*c].iter() {
                self.remaining[*p] -= 1;
                if self.remaining[*p] == 0 {
                    self.ready.push(*p);
                }
            }
        }
        Some(batch)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Schedule {
    Sequential(Vec<Vec<usize>>),
    Batches(Vec<Vec<Vec<usize>>>),
}

impl Schedule {
    pub fn num_sccs(&self) -> usize {
        match self {
            Schedule::Sequential(order) => order.len(),
            Schedule::Batches(batches) => batches.iter().map(|b| b.len()).sum(),
        }
    }
}

fn take_batches<I: Iterator<Item = Vec<usize>>>(batches: I, sccs: Vec<Vec<usize>>) -> Vec<Vec<Vec<usize>>> {
    let mut slots: Vec<Option<Vec<usize>>> = sccs.into_iter().map(Some).collect();
    batches
        .map(|batch| batch.into_iter().filter_map(|c| slots[c].take()).collect())
        .collect()
}

pub fn schedule(
    graph: &ZeroRewardGraph,
    sccs: Vec<Vec<usize>>,
    scheduling: Scheduling,
    emits_dependency_order: bool,
) -> Schedule {
    let schedule = match scheduling {
        Scheduling::Sequential => Schedule::Sequential(sequential_order(graph, sccs, emits_dependency_order)),
        Scheduling::Parallel => {
            let cond = Condensation::new(graph, &sccs);
            Schedule::Batches(take_batches(SccBatches::new(&cond), sccs))
        }
        Scheduling::ParallelCounting => {
            let cond = Condensation::new(graph, &sccs);
            Schedule::Batches(take_batches(SccBatchCounter::new(&cond), sccs))
        }
    };
    if let Schedule::Batches(batches) = &schedule {
        debug!("{} SCCs in {} batches", schedule.num_sccs(), batches.len());
    }
    schedule
}
