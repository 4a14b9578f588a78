use criterion::{criterion_group, criterion_main, Criterion};
use duel_2048::engine::{Move, State};
use duel_2048::expectimax::{Expectimax, ExpectimaxConfig};
use duel_2048::mcts::{rollout, Mcts, MctsConfig, PredicateWeights};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;
use std::time::Duration;

fn corpus() -> Vec<State> {
    let mut rng = StdRng::seed_from_u64(7777);
    let mut states = Vec::new();
    let mut s = State::initial(&mut rng);
    states.push(s);
    let seq = [Move::Left, Move::Up, Move::Right, Move::Down];
    for i in 0..32 {
        if s.is_terminal() { s = State::initial(&mut rng); }
        let dir = seq[i % seq.len()];
        if s.legal_actions().contains(&dir) { s = s.successor(dir, &mut rng); }
        states.push(s);
    }
    states
}

fn bench_expectimax(c: &mut Criterion) {
    let states = corpus();
    let mut ex = Expectimax::seeded(ExpectimaxConfig { depth: 4 }, 3);

    c.bench_function("expectimax/branch_evals", |bch| {
        bch.iter(|| {
            let mut acc = 0.0;
            for s in &states {
                for be in ex.branch_evals(s) { if be.legal { acc += be.ev; } }
            }
            black_box(acc)
        })
    });

    c.bench_function("expectimax/select_action", |bch| {
        bch.iter(|| {
            let mut acc = 0u64;
            for s in &states {
                acc ^= ex.select_action(s).map(|m| m as u64).unwrap_or(0);
            }
            black_box(acc)
        })
    });
}

fn bench_mcts(c: &mut Criterion) {
    let states = corpus();

    c.bench_function("mcts/rollout", |bch| {
        let mut rng = StdRng::seed_from_u64(5);
        let mut weights = PredicateWeights::default();
        bch.iter(|| {
            let mut acc = 0.0;
            for s in &states { acc += rollout(s, &mut weights, &mut rng); }
            black_box(acc)
        })
    });

    // Fixed iteration count so runs are comparable across machines.
    let cfg = MctsConfig { time_limit: Duration::from_secs(60), exploration: 1.5, iteration_cap: Some(64) };
    let mut mcts = Mcts::seeded(cfg, 11);
    c.bench_function("mcts/search_64_iterations", |bch| {
        bch.iter(|| {
            let mut acc = 0u64;
            for s in states.iter().take(8) {
                acc ^= mcts.search(s).map(|m| m as u64).unwrap_or(0);
            }
            black_box(acc)
        })
    });
}

criterion_group!(search, bench_expectimax, bench_mcts);
criterion_main!(search);
