use std::collections::BTreeSet;

use itertools::Itertools;
use petgraph::algo::kosaraju_scc;
use petgraph::graphmap::DiGraphMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use test_log::test;

use quantile::model_checking::calculated::CalculatedValues;
use quantile::model_checking::context::{Objective, SolutionMethod, SolveContext};
use quantile::model_checking::reward_cache::{create_cache, get_offset, highest_referenced_offsets, CacheKind};
use quantile::model_checking::scc::{SccMethod, ZeroRewardGraph};
use quantile::model_checking::topological::{schedule, Schedule, Scheduling};
use quantile::{
    read_model_json, ExplicitModel, MinMax, ModelType, QuantileComputation, QuantileError, RewardBound, SolverConfig,
};

fn random_graph(rng: &mut StdRng, n: usize) -> Vec<Vec<usize>> {
    (0..n)
        .map(|_| {
            let degree = rng.gen_range(0, 4);
            let succ: BTreeSet<usize> = (0..degree).map(|_| rng.gen_range(0, n)).collect();
            succ.into_iter().collect()
        })
        .collect()
}

fn normalise(sccs: &[Vec<usize>]) -> Vec<Vec<usize>> {
    sccs.iter()
        .map(|x| x.iter().copied().sorted().collect::<Vec<usize>>())
        .sorted()
        .collect()
}

#[test]
fn decomposers_agree_with_kosaraju() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..100 {
        let n = rng.gen_range(1, 40);
        let adjacency = random_graph(&mut rng, n);
        let mut reference: DiGraphMap<usize, ()> = DiGraphMap::new();
        for v in 0..n {
            reference.add_node(v);
        }
        for (v, succ) in adjacency.iter().enumerate() {
            for w in succ.iter() {
                reference.add_edge(v, *w, ());
            }
        }
        let expected = normalise(&kosaraju_scc(&reference));
        let graph = ZeroRewardGraph::from_adjacency(adjacency);
        for method in [SccMethod::Tarjan, SccMethod::RecursiveTarjan, SccMethod::Coloring].iter() {
            let sccs = method.decompose(&graph).unwrap();
            assert_eq!(normalise(&sccs), expected, "{:?}", method);
        }
    }
}

#[test]
fn schedules_put_successors_first() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..50 {
        let n = rng.gen_range(1, 30);
        let graph = ZeroRewardGraph::from_adjacency(random_graph(&mut rng, n));
        for method in [SccMethod::Tarjan, SccMethod::Coloring].iter() {
            let sccs = method.decompose(&graph).unwrap();
            for scheduling in [Scheduling::Sequential, Scheduling::Parallel, Scheduling::ParallelCounting].iter() {
                // position of each state's component: (batch, index in flattened order)
                let mut slot = vec![(0usize, 0usize); n];
                let total = match schedule(&graph, sccs.clone(), *scheduling, method.emits_dependency_order()) {
                    Schedule::Sequential(order) => {
                        for (i, scc) in order.iter().enumerate() {
                            for s in scc.iter() {
                                slot[*s] = (i, i);
                            }
                        }
                        order.len()
                    }
                    Schedule::Batches(batches) => {
                        let mut i = 0;
                        for (b, batch) in batches.iter().enumerate() {
                            for scc in batch.iter() {
                                for s in scc.iter() {
                                    slot[*s] = (b, i);
                                }
                                i += 1;
                            }
                        }
                        i
                    }
                };
                assert_eq!(total, sccs.len());
                for v in 0..n {
                    for w in graph.successors(v).iter() {
                        let (bv, iv) = slot[v];
                        let (bw, iw) = slot[*w];
                        if iv != iw {
                            assert!(bw < bv, "{:?} {:?}: {} -> {}", method, scheduling, v, w);
                            assert!(iw < iv);
                        }
                    }
                }
            }
        }
    }
}

/// Random model whose last state is the goal. Every choice leaks probability 0.1 to the
/// goal. With `traps` the leak may instead go to an absorbing fail state `n - 2`, and MDP
/// states may also idle in a zero-reward self loop.
fn random_model(rng: &mut StdRng, model_type: ModelType, n: usize, traps: bool) -> ExplicitModel {
    let goal = n - 1;
    let fail = n - 2;
    let mut m = ExplicitModel::new(model_type, n);
    for s in 0..goal {
        if traps && s == fail {
            m.add_choice(s, "fail", 0, &[(s, 1.0)]);
            continue;
        }
        let choices = match model_type {
            ModelType::Mdp => rng.gen_range(1, 4),
            _ => 1,
        };
        for c in 0..choices {
            let reward = if rng.gen_bool(0.75) { 0 } else { rng.gen_range(1, 3) };
            let leak = if traps && rng.gen_bool(0.3) { fail } else { goal };
            let mut succ: Vec<(usize, f64)> = vec![(leak, 0.1)];
            let k = rng.gen_range(1, 4);
            for _ in 0..k {
                succ.push((rng.gen_range(0, n), 0.9 / k as f64));
            }
            m.add_choice(s, &format!("a{}", c), reward, &succ);
        }
        if traps && model_type == ModelType::Mdp && rng.gen_bool(0.2) {
            m.add_choice(s, "idle", 0, &[(s, 1.0)]);
        }
    }
    m.add_choice(goal, "done", 0, &[(goal, 1.0)]);
    m.validate().unwrap();
    m
}

fn assert_close(a: &[f64], b: &[f64], eps: f64) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert!((x - y).abs() < eps, "{:?} != {:?}", a, b);
    }
}

#[test]
fn solvers_agree_on_random_models() {
    let mut rng = StdRng::seed_from_u64(5);
    for round in 0..20 {
        let n = rng.gen_range(3, 25);
        for model_type in [ModelType::Dtmc, ModelType::Mdp].iter() {
            let m = random_model(&mut rng, *model_type, n, round % 2 == 1);
            let targets: Vec<bool> = (0..n).map(|s| s == n - 1).collect();
            for mm in [MinMax::Min, MinMax::Max].iter() {
                let exact = QuantileComputation::new(&m, targets.clone(), RewardBound::Upper, *mm, SolverConfig::default(), None)
                    .unwrap()
                    .solve_range_lp(5)
                    .unwrap();
                let mut methods = vec![SolutionMethod::ValueIteration, SolutionMethod::LinearProgram];
                if *mm == MinMax::Min {
                    methods.push(SolutionMethod::IntervalIteration);
                }
                for method in methods.into_iter() {
                    let config = SolverConfig {
                        method,
                        scheduling: Scheduling::Parallel,
                        ..SolverConfig::default()
                    };
                    let steps = QuantileComputation::new(&m, targets.clone(), RewardBound::Upper, *mm, config, None)
                        .unwrap()
                        .run(5)
                        .unwrap();
                    for (a, b) in steps.iter().zip(exact.iter()) {
                        assert_close(a, b, 1e-4);
                    }
                }
            }
        }
    }
}

#[test]
fn lower_bound_driver_matches_range_lp() {
    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..10 {
        let n = rng.gen_range(3, 20);
        let m = random_model(&mut rng, ModelType::Dtmc, n, false);
        let targets: Vec<bool> = (0..n).map(|s| s == n - 1).collect();
        let mut q = QuantileComputation::new(
            &m,
            targets,
            RewardBound::Lower,
            MinMax::Max,
            SolverConfig::default(),
            Some(vec![1.0; n]),
        )
        .unwrap();
        let exact = q.solve_range_lp(4).unwrap();
        let steps = q.run(4).unwrap();
        for (a, b) in steps.iter().zip(exact.iter()) {
            assert_close(a, b, 1e-4);
        }
    }
}

#[test]
fn fail_state_and_idle_loop_by_hand() {
    // s0 pays 1 to enter s1; s1 reaches the goal s2, the fail state s3 or s0, and in the
    // MDP it may also wait in place for free
    let build = |model_type: ModelType| {
        let mut m = ExplicitModel::new(model_type, 4);
        m.add_choice(0, "pay", 1, &[(1, 1.0)])
            .add_choice(1, "a", 0, &[(2, 0.5), (3, 0.25), (0, 0.25)])
            .add_choice(2, "a", 0, &[(2, 1.0)])
            .add_choice(3, "a", 0, &[(3, 1.0)]);
        if model_type == ModelType::Mdp {
            m.add_choice(1, "wait", 0, &[(1, 1.0)]);
        }
        m
    };
    let reaching = vec![
        vec![0.0, 0.5, 1.0, 0.0],
        vec![0.5, 0.625, 1.0, 0.0],
        vec![0.625, 0.65625, 1.0, 0.0],
    ];
    let avoiding = vec![vec![0.0, 0.0, 1.0, 0.0]; 3];
    let cases = [
        (ModelType::Dtmc, MinMax::Min, &reaching),
        (ModelType::Dtmc, MinMax::Max, &reaching),
        (ModelType::Mdp, MinMax::Min, &avoiding),
        (ModelType::Mdp, MinMax::Max, &reaching),
    ];
    let targets = vec![false, false, true, false];
    for (model_type, mm, expected) in cases.iter() {
        let m = build(*model_type);
        let exact = QuantileComputation::new(&m, targets.clone(), RewardBound::Upper, *mm, SolverConfig::default(), None)
            .unwrap()
            .solve_range_lp(2)
            .unwrap();
        for (a, b) in exact.iter().zip(expected.iter()) {
            assert_close(a, b, 1e-6);
        }
        let mut methods = vec![SolutionMethod::ValueIteration, SolutionMethod::LinearProgram];
        if mm.is_min() {
            methods.push(SolutionMethod::IntervalIteration);
        }
        for method in methods.into_iter() {
            for cache in [CacheKind::UniformAll, CacheKind::UniformSparse, CacheKind::Individual].iter() {
                let config = SolverConfig {
                    method,
                    cache: *cache,
                    ..SolverConfig::default()
                };
                let steps = QuantileComputation::new(&m, targets.clone(), RewardBound::Upper, *mm, config, None)
                    .unwrap()
                    .run(2)
                    .unwrap();
                for (a, b) in steps.iter().zip(expected.iter()) {
                    assert_close(a, b, 1e-5);
                }
            }
        }
    }
}

struct GoalOnly;

impl Objective for GoalOnly {
    fn min_max(&self) -> MinMax {
        MinMax::Min
    }

    fn positive_choice_value(&self, _state: usize, _choice: usize, _step: usize) -> quantile::Result<f64> {
        Ok(0.0)
    }
}

#[test]
fn two_state_cycle_with_single_exit_reaches_one() {
    // A -> B, B -> {A: 0.5, goal: 0.5}, goal fixed at 1
    let mut m = ExplicitModel::new(ModelType::Dtmc, 3);
    m.add_choice(0, "a", 0, &[(1, 1.0)])
        .add_choice(1, "a", 0, &[(0, 0.5), (2, 0.5)])
        .add_choice(2, "a", 0, &[(2, 1.0)]);
    let calculated = CalculatedValues::new(3);
    calculated.set(2, 1.0);
    let config = SolverConfig::default();
    let ctx = SolveContext {
        model: &m,
        objective: &GoalOnly,
        calculated: &calculated,
        step: 0,
        config: &config,
    };
    for method in [
        SolutionMethod::ValueIteration,
        SolutionMethod::IntervalIteration,
        SolutionMethod::LinearProgram,
    ]
    .iter()
    {
        let (x, index) = method.solve(&ctx, &[0, 1]).unwrap();
        assert!((x[index.index_of(0)] - 1.0).abs() < 1e-6, "{:?}", method);
        assert!((x[index.index_of(1)] - 1.0).abs() < 1e-6, "{:?}", method);
    }

    let mut capped = SolverConfig::default();
    capped.max_iterations = 1;
    let ctx = SolveContext {
        model: &m,
        objective: &GoalOnly,
        calculated: &calculated,
        step: 0,
        config: &capped,
    };
    // one sweep from above already lands on the fixed point, the lower bound does not
    let res = SolutionMethod::IntervalIteration.solve(&ctx, &[0, 1]);
    assert!(matches!(res, Err(QuantileError::NotConverged { .. })));
}

#[test]
fn cache_reads_back_every_retained_step() {
    let mut rng = StdRng::seed_from_u64(7);
    let m = random_model(&mut rng, ModelType::Mdp, 30, false);
    let offsets = highest_referenced_offsets(&m);
    assert!(!offsets.is_empty());
    for kind in [CacheKind::UniformAll, CacheKind::UniformSparse, CacheKind::Individual].iter() {
        let mut cache = create_cache(*kind, &m);
        for step in 0..20usize {
            let values: Vec<f64> = (0..30).map(|s| (step * 100 + s) as f64).collect();
            cache.merge_values_into_previous_values(step, &values);
            for (s, window) in offsets.iter() {
                for back in 0..(*window).min(step + 1) {
                    let expected = ((step - back) * 100 + s) as f64;
                    assert_eq!(cache.previous_value(*s, step - back), expected, "{:?}", kind);
                }
            }
            let row = cache.previous_values(step);
            for (s, _) in offsets.iter() {
                assert_eq!(row[*s], (step * 100 + s) as f64);
            }
        }
    }
    for step in [0usize, 1, 7, 1_000_003, usize::MAX].iter() {
        assert!(get_offset(*step, 3) < 3);
    }
}

#[test]
fn model_file_round_trip_through_the_driver() {
    let json = r#"{
        "model_type": "mdp",
        "num_states": 4,
        "initial": 0,
        "targets": [3],
        "transitions": [
            {"s": 0, "a": "pay", "s_prime": [{"s": 1, "p": 1.0}], "rewards": 1},
            {"s": 1, "a": "a", "s_prime": [{"s": 2, "p": 0.5}, {"s": 3, "p": 0.5}]},
            {"s": 2, "a": "a", "s_prime": [{"s": 1, "p": 0.5}, {"s": 0, "p": 0.5}]},
            {"s": 3, "a": "a", "s_prime": [{"s": 3, "p": 1.0}]}
        ]
    }"#;
    let path = std::env::temp_dir().join(format!("quantile-model-{}.json", std::process::id()));
    std::fs::write(&path, json).unwrap();
    let input = read_model_json(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let mut q = QuantileComputation::new(
        &input.model,
        input.target_flags(),
        RewardBound::Upper,
        MinMax::Max,
        SolverConfig::default(),
        None,
    )
    .unwrap();
    let steps = q.run(1).unwrap();
    assert!((steps[0][input.initial] - 0.0).abs() < 1e-9);
    assert!((steps[1][input.initial] - 2.0 / 3.0).abs() < 1e-5);
}

#[test]
fn iteration_cap_fails_the_step() {
    let mut m = ExplicitModel::new(ModelType::Dtmc, 3);
    m.add_choice(0, "a", 0, &[(1, 1.0)])
        .add_choice(1, "a", 0, &[(0, 0.5), (2, 0.5)])
        .add_choice(2, "a", 0, &[(2, 1.0)]);
    let mut config = SolverConfig::default();
    config.max_iterations = 1;
    config.use_scc = false;
    let mut q = QuantileComputation::new(&m, vec![false, false, true], RewardBound::Upper, MinMax::Max, config, None)
        .unwrap();
    let res = q.run(3);
    assert!(matches!(res, Err(QuantileError::NotConverged { .. })));
}
