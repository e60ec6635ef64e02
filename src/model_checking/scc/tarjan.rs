use super::{SccStore, ZeroRewardGraph};

const UNVISITED: usize = usize::MAX;

struct TarjanState {
    counter: usize,
    index: Vec<usize>,
    low: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
}

impl TarjanState {
    fn new(n: usize) -> TarjanState {
        TarjanState {
            counter: 0,
            index: vec![UNVISITED; n],
            low: vec![UNVISITED; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
        }
    }

    fn enter(&mut self, v: usize) {
        self.index[v] = self.counter;
        self.low[v] = self.counter;
        self.counter += 1;
        self.stack.push(v);
        self.on_stack[v] = true;
    }

    /// Pops the component rooted at `v` if `v` is a root.
    fn finish(&mut self, v: usize, graph: &ZeroRewardGraph, store: &mut SccStore) {
        if self.low[v] != self.index[v] {
            return;
        }
        let mut scc: Vec<usize> = Vec::new();
        loop {
            let w = match self.stack.pop() {
                Some(w) => w,
                None => break,
            };
            self.on_stack[w] = false;
            scc.push(graph.index().state(w));
            if w == v {
                break;
            }
        }
        store.notify_next_scc(scc);
    }
}

enum Task {
    Enter(usize),
    Traverse { v: usize, edge: usize },
    PostEdge { v: usize, w: usize },
    Finish(usize),
}

/// Tarjan's algorithm driven by an explicit stack of tasks, so the depth of the search is
/// not bounded by the native stack.
pub fn tarjan_scc(graph: &ZeroRewardGraph, store: &mut SccStore) {
    let n = graph.len();
    let mut st = TarjanState::new(n);
    let mut tasks: Vec<Task> = Vec::new();
    for root in 0..n {
        if st.index[root] != UNVISITED {
            continue;
        }
        tasks.push(Task::Enter(root));
        while let Some(task) = tasks.pop() {
            match task {
                Task::Enter(v) => {
                    st.enter(v);
                    tasks.push(Task::Finish(v));
                    tasks.push(Task::Traverse { v, edge: 0 });
                }
                Task::Traverse { v, edge } => {
                    let succ = graph.successors(v);
                    if edge < succ.len() {
                        let w = succ[edge];
                        tasks.push(Task::Traverse { v, edge: edge + 1 });
                        if st.index[w] == UNVISITED {
                            tasks.push(Task::PostEdge { v, w });
                            tasks.push(Task::Enter(w));
                        } else if st.on_stack[w] {
                            st.low[v] = st.low[v].min(st.index[w]);
                        }
                    }
                }
                Task::PostEdge { v, w } => {
                    st.low[v] = st.low[v].min(st.low[w]);
                }
                Task::Finish(v) => st.finish(v, graph, store),
            }
        }
    }
    store.notify_done();
}

/// Textbook recursive Tarjan. Recursion depth grows with the longest zero-reward path,
/// prefer [`tarjan_scc`] outside of small inputs.
pub fn recursive_tarjan_scc(graph: &ZeroRewardGraph, store: &mut SccStore) {
    fn visit(v: usize, graph: &ZeroRewardGraph, st: &mut TarjanState, store: &mut SccStore) {
        st.enter(v);
        for w in graph.successors(v).iter() {
            if st.index[*w] == UNVISITED {
                visit(*w, graph, st, store);
                st.low[v] = st.low[v].min(st.low[*w]);
            } else if st.on_stack[*w] {
                st.low[v] = st.low[v].min(st.index[*w]);
            }
        }
        st.finish(v, graph, store);
    }

    let mut st = TarjanState::new(graph.len());
    for v in 0..graph.len() {
        if st.index[v] == UNVISITED {
            visit(v, graph, &mut st, store);
        }
    }
    store.notify_done();
}
