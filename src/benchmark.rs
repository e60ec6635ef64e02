use criterion::measurement::WallTime;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use quantile::model_checking::scc::SccMethod;
use quantile::model_checking::topological::Scheduling;
use quantile::{ExplicitModel, MinMax, ModelType, QuantileComputation, RewardBound, SolverConfig};

/// Random MDP whose last state is the goal; every choice leaks to the goal with
/// probability 0.1.
fn setup(n: usize, seed: u64) -> ExplicitModel {
    let mut rng = StdRng::seed_from_u64(seed);
    let goal = n - 1;
    let mut m = ExplicitModel::new(ModelType::Mdp, n);
    for s in 0..goal {
        for c in 0..rng.gen_range(1, 3) {
            let reward = if rng.gen_bool(0.7) { 0 } else { rng.gen_range(1, 4) };
            let mut succ: Vec<(usize, f64)> = vec![(goal, 0.1)];
            let k = rng.gen_range(1, 4);
            for _ in 0..k {
                succ.push((rng.gen_range(0, n), 0.9 / k as f64));
            }
            m.add_choice(s, &format!("a{}", c), reward, &succ);
        }
    }
    m.add_choice(goal, "done", 0, &[(goal, 1.0)]);
    m
}

fn targets(n: usize) -> Vec<bool> {
    (0..n).map(|s| s == n - 1).collect()
}

pub fn quantile_benchmark(c: &mut Criterion) -> &mut Criterion<WallTime> {
    let n = 2000;
    let model = setup(n, 17);
    for (name, scc_method, scheduling) in [
        ("tarjan sequential", SccMethod::Tarjan, Scheduling::Sequential),
        ("coloring sequential", SccMethod::Coloring, Scheduling::Sequential),
        ("tarjan parallel", SccMethod::Tarjan, Scheduling::ParallelCounting),
    ]
    .iter()
    {
        let config = SolverConfig {
            scc_method: *scc_method,
            scheduling: *scheduling,
            ..SolverConfig::default()
        };
        c.bench_function(name, |b| {
            b.iter(|| {
                let mut q = QuantileComputation::new(
                    &model,
                    targets(n),
                    RewardBound::Upper,
                    MinMax::Max,
                    config.clone(),
                    None,
                )
                .unwrap();
                black_box(q.run(10).unwrap())
            })
        });
    }
    c
}

criterion_group!(benches, quantile_benchmark);
criterion_main!(benches);
