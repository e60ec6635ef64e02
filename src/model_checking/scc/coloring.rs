use super::{SccStore, ZeroRewardGraph};

/// Two-pass decomposition: a forward search records finishing times, a backward search
/// in reverse finishing order collects each component. States without any zero-reward
/// edge are never touched by either pass and come out as singletons at the end.
///
/// The emission order is not a dependency order.
pub fn coloring_scc(graph: &ZeroRewardGraph, store: &mut SccStore) {
    let n = graph.len();
    let mut visited = vec![false; n];
    let mut finished: Vec<usize> = Vec::with_capacity(n);

    // forward pass, started only from states with outgoing edges
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for root in 0..n {
        if visited[root] || graph.successors(root).is_empty() {
            continue;
        }
        visited[root] = true;
        stack.push((root, 0));
        while let Some((v, edge)) = stack.pop() {
            let succ = graph.successors(v);
            if edge < succ.len() {
                stack.push((v, edge + 1));
                let w = succ[edge];
                if !visited[w] {
                    visited[w] = true;
                    stack.push((w, 0));
                }
            } else {
                finished.push(v);
            }
        }
    }

    // backward pass
    let pred = graph.predecessors();
    let mut color: Vec<Option<usize>> = vec![None; n];
    let mut sccs: Vec<Vec<usize>> = Vec::new();
    let mut work: Vec<usize> = Vec::new();
    for v in finished.iter().rev() {
        if color[*v].is_some() {
            continue;
        }
        let c = sccs.len();
        color[*v] = Some(c);
        let mut scc = vec![*v];
        work.push(*v);
        while let Some(u) = work.pop() {
            for w in pred[u].iter() {
                if visited[*w] && color[*w].is_none() {
                    color[*w] = Some(c);
                    scc.push(*w);
                    work.push(*w);
                }
            }
        }
        sccs.push(scc);
    }

    for scc in sccs.into_iter() {
        store.notify_next_scc(scc.into_iter().map(|v| graph.index().state(v)).collect());
    }
    for v in 0..n {
        if color[v].is_none() {
            store.notify_next_scc(vec![graph.index().state(v)]);
        }
    }
    store.notify_done();
}
