use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use portal_bandit::{
    DecisionLoop, EpisodeConfig, EpsilonGreedy, EpsilonGreedyConfig, PhaseAware,
    PhaseAwareConfig, SelectionPolicy, SimConfig, SimulatedExecutor,
};
use std::hint::black_box;

fn bench_select(c: &mut Criterion) {
    // Deterministic outcome stream, long enough to leave forced exploration.
    let n = 2048usize;
    let outcomes: Vec<bool> = (0..n).map(|i| i % 7 < 4 || i % 13 == 0).collect();

    let mut group = c.benchmark_group("choose_and_record");
    for arms in [3usize, 8] {
        group.bench_with_input(BenchmarkId::new("epsilon", arms), &arms, |b, &k| {
            let base = EpsilonGreedy::with_seed(k, EpsilonGreedyConfig::default(), 1).unwrap();
            b.iter(|| {
                let mut p = base.clone();
                for &o in &outcomes {
                    let arm = p.choose_arm();
                    p.record_outcome(arm, o).unwrap();
                }
                black_box(p.registry().total_attempts());
            })
        });
        group.bench_with_input(BenchmarkId::new("phase_aware", arms), &arms, |b, &k| {
            let cfg = PhaseAwareConfig {
                phase_eligible: (0..k).filter(|a| a % 2 == 1).collect(),
                ..PhaseAwareConfig::default()
            };
            let base = PhaseAware::with_seed(k, cfg, 1).unwrap();
            b.iter(|| {
                let mut p = base.clone();
                for &o in &outcomes {
                    let arm = p.choose_arm();
                    p.record_outcome(arm, o).unwrap();
                }
                black_box(p.registry().total_attempts());
            })
        });
    }
    group.finish();
}

fn bench_episode(c: &mut Criterion) {
    c.bench_function("episode/phase_aware/sim_1000", |b| {
        b.iter(|| {
            let policy = PhaseAware::with_seed(3, PhaseAwareConfig::default(), 2).unwrap();
            let sim = SimulatedExecutor::from_config(&SimConfig::default(), 3, 2).unwrap();
            let cfg = EpisodeConfig {
                progress_every: 0,
                ..EpisodeConfig::default()
            };
            let mut dl = DecisionLoop::new(policy, sim, cfg).unwrap();
            black_box(dl.run_episode().unwrap().saved);
        })
    });
}

criterion_group!(benches, bench_select, bench_episode);
criterion_main!(benches);
