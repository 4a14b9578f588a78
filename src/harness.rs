//! Play whole games with a policy and compare MCTS against Expectimax.
//!
//! ```
//! use duel_2048::engine::State;
//! use duel_2048::expectimax::{Expectimax, ExpectimaxConfig};
//! use duel_2048::harness::{play_game, Summary};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(3);
//! let mut ex = Expectimax::with_config(ExpectimaxConfig { depth: 1 });
//! let game = play_game(&mut ex, &mut rng);
//! assert!(game.moves > 0);
//! let summary = Summary::from_scores(&[game.score]);
//! assert_eq!(summary.mean, game.score as f64);
//! ```

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

use crate::engine::{Move, Score, State, Tile};
use crate::expectimax::{Expectimax, ExpectimaxConfig};
use crate::mcts::{Mcts, MctsConfig, PredicateWeights, WeightStore};
use crate::policy::Policy;

/// z-score of a two-sided 95% confidence interval.
const Z_95: f64 = 1.96;

/// Outcome of one finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameRecord {
    pub score: Score,
    pub moves: u32,
    pub highest_tile: Tile,
    pub reached_win: bool,
}

impl GameRecord {
    fn from_final(state: &State, moves: u32) -> Self {
        Self {
            score: state.score(),
            moves,
            highest_tile: state.board().highest_tile(),
            reached_win: state.board().has_win_tile(),
        }
    }
}

/// Play one game from [`State::initial`] until it is terminal or the policy
/// stops recommending moves.
pub fn play_game<P, R>(policy: &mut P, rng: &mut R) -> GameRecord
where
    P: Policy + ?Sized,
    R: Rng + ?Sized,
{
    play_game_with(policy, rng, |_, _, _| {})
}

/// Like [`play_game`], calling `on_step(state, last_move, move_number)` for
/// the initial state and after every move.
pub fn play_game_with<P, R, F>(policy: &mut P, rng: &mut R, mut on_step: F) -> GameRecord
where
    P: Policy + ?Sized,
    R: Rng + ?Sized,
    F: FnMut(&State, Option<Move>, u32),
{
    let mut state = State::initial(rng);
    let mut moves = 0u32;
    on_step(&state, None, moves);
    while !state.is_terminal() {
        let Some(dir) = policy.select_action(&state) else {
            log::warn!("policy returned no move for a non-terminal state after {moves} moves");
            break;
        };
        state = state.successor(dir, rng);
        moves += 1;
        on_step(&state, Some(dir), moves);
    }
    GameRecord::from_final(&state, moves)
}

/// Descriptive statistics over final scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub games: usize,
    pub mean: f64,
    /// Sample variance (n - 1 denominator); zero for fewer than two games.
    pub variance: f64,
    pub std_dev: f64,
    /// `mean ± 1.96 · std_dev / sqrt(n)`.
    pub ci95: (f64, f64),
    pub min: Score,
    pub max: Score,
}

impl Summary {
    pub fn from_scores(scores: &[Score]) -> Self {
        let n = scores.len();
        if n == 0 {
            return Self { games: 0, mean: 0.0, variance: 0.0, std_dev: 0.0, ci95: (0.0, 0.0), min: 0, max: 0 };
        }
        let mean = scores.iter().map(|&s| s as f64).sum::<f64>() / n as f64;
        let variance = if n < 2 {
            0.0
        } else {
            scores.iter().map(|&s| (s as f64 - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        };
        let std_dev = variance.sqrt();
        let margin = Z_95 * std_dev / (n as f64).sqrt();
        Self {
            games: n,
            mean,
            variance,
            std_dev,
            ci95: (mean - margin, mean + margin),
            min: scores.iter().copied().min().unwrap_or(0),
            max: scores.iter().copied().max().unwrap_or(0),
        }
    }
}

/// Knobs for a head-to-head run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompareConfig {
    /// Games played by each agent.
    pub games: usize,
    pub mcts: MctsConfig,
    pub expectimax: ExpectimaxConfig,
    pub seed: u64,
    /// Play rounds concurrently. MCTS sessions then share one weight store.
    pub parallel: bool,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            games: 100,
            mcts: MctsConfig::from_secs(0.1, 1.5),
            expectimax: ExpectimaxConfig::default(),
            seed: 0,
            parallel: false,
        }
    }
}

/// One MCTS game and one Expectimax game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundResult {
    pub index: usize,
    pub mcts: GameRecord,
    pub expectimax: GameRecord,
}

impl RoundResult {
    #[inline]
    pub fn mcts_won(&self) -> bool { self.mcts.score > self.expectimax.score }
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub rounds: Vec<RoundResult>,
    pub mcts: Summary,
    pub expectimax: Summary,
    /// Rounds where MCTS scored strictly higher.
    pub mcts_wins: usize,
    /// Rollout weights after the last game.
    pub final_weights: PredicateWeights,
}

/// Play `cfg.games` rounds and summarize them. `on_round` runs as each round
/// finishes (from worker threads in parallel mode).
pub fn compare<F>(cfg: &CompareConfig, on_round: F) -> Comparison
where
    F: Fn(&RoundResult) + Sync,
{
    let (mut rounds, final_weights) = if cfg.parallel {
        let shared = Arc::new(Mutex::new(PredicateWeights::default()));
        let rounds: Vec<RoundResult> = (0..cfg.games)
            .into_par_iter()
            .map(|index| {
                let session_rng = StdRng::seed_from_u64(session_seed(cfg.seed, index));
                let mut mcts = Mcts::with_parts(cfg.mcts, Arc::clone(&shared), session_rng);
                let round = play_round(cfg, index, &mut mcts);
                on_round(&round);
                round
            })
            .collect();
        (rounds, shared.snapshot())
    } else {
        let mut mcts = Mcts::with_parts(
            cfg.mcts,
            PredicateWeights::default(),
            StdRng::seed_from_u64(session_seed(cfg.seed, 0)),
        );
        let rounds: Vec<RoundResult> = (0..cfg.games)
            .map(|index| {
                let round = play_round(cfg, index, &mut mcts);
                on_round(&round);
                round
            })
            .collect();
        (rounds, mcts.weights().snapshot())
    };
    rounds.sort_by_key(|r| r.index);

    let mcts_scores: Vec<Score> = rounds.iter().map(|r| r.mcts.score).collect();
    let ex_scores: Vec<Score> = rounds.iter().map(|r| r.expectimax.score).collect();
    Comparison {
        mcts: Summary::from_scores(&mcts_scores),
        expectimax: Summary::from_scores(&ex_scores),
        mcts_wins: rounds.iter().filter(|r| r.mcts_won()).count(),
        rounds,
        final_weights,
    }
}

fn play_round<W: WeightStore>(cfg: &CompareConfig, index: usize, mcts: &mut Mcts<W, StdRng>) -> RoundResult {
    let base = cfg.seed.wrapping_add(2 * index as u64);
    let mcts_game = play_game(mcts, &mut StdRng::seed_from_u64(base));
    let mut ex = Expectimax::seeded(cfg.expectimax, session_seed(base, 1));
    let ex_game = play_game(&mut ex, &mut StdRng::seed_from_u64(base.wrapping_add(1)));
    log::info!("Game {}: MCTS={}, Expectimax={}", index + 1, mcts_game.score, ex_game.score);
    RoundResult { index, mcts: mcts_game, expectimax: ex_game }
}

#[inline]
fn session_seed(seed: u64, index: usize) -> u64 { seed ^ 0x9E37_79B9_7F4A_7C15 ^ index as u64 }

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn tiny(parallel: bool) -> CompareConfig {
        CompareConfig {
            games: 3,
            mcts: MctsConfig { time_limit: Duration::from_secs(30), exploration: 1.5, iteration_cap: Some(4) },
            expectimax: ExpectimaxConfig { depth: 1 },
            seed: 7,
            parallel,
        }
    }

    #[test]
    fn summary_statistics() {
        let s = Summary::from_scores(&[2, 4, 4, 4, 5, 5, 7, 9]);
        assert_eq!(s.games, 8);
        assert_eq!(s.mean, 5.0);
        assert!((s.variance - 32.0 / 7.0).abs() < 1e-12);
        assert!((s.std_dev - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        let margin = 1.96 * s.std_dev / 8f64.sqrt();
        assert!((s.ci95.0 - (5.0 - margin)).abs() < 1e-12);
        assert!((s.ci95.1 - (5.0 + margin)).abs() < 1e-12);
        assert_eq!((s.min, s.max), (2, 9));
    }

    #[test]
    fn summary_of_one_or_none() {
        let one = Summary::from_scores(&[40]);
        assert_eq!((one.mean, one.variance, one.ci95), (40.0, 0.0, (40.0, 40.0)));
        assert_eq!(Summary::from_scores(&[]).games, 0);
    }

    #[test]
    fn play_game_runs_to_terminal() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut first_legal = |s: &State| s.legal_actions().first().copied();
        let mut steps = 0;
        let record = play_game_with(&mut first_legal, &mut rng, |_, _, n| steps = n);
        assert_eq!(steps, record.moves);
        assert!(record.moves > 0);
        assert!(record.highest_tile >= 4 || record.score == 0);
        assert_eq!(record.reached_win, record.highest_tile >= 2048);
    }

    #[test]
    fn play_game_stops_when_policy_gives_up() {
        let mut rng = StdRng::seed_from_u64(22);
        let mut give_up = |_: &State| -> Option<Move> { None };
        let record = play_game(&mut give_up, &mut rng);
        assert_eq!(record.moves, 0);
        assert_eq!(record.score, 0);
    }

    #[test]
    fn compare_sequential() {
        let seen = AtomicUsize::new(0);
        let cmp = compare(&tiny(false), |_| {
            seen.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(seen.load(Ordering::Relaxed), 3);
        assert_eq!(cmp.rounds.len(), 3);
        assert_eq!(cmp.mcts.games, 3);
        assert!(cmp.mcts_wins <= 3);
        assert_ne!(cmp.final_weights, PredicateWeights::default());
        let again = compare(&tiny(false), |_| {});
        assert_eq!(again.rounds, cmp.rounds);
    }

    #[test]
    fn compare_parallel_keeps_round_order() {
        let cmp = compare(&tiny(true), |_| {});
        let indices: Vec<usize> = cmp.rounds.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        // Expectimax games do not depend on the MCTS side.
        let seq = compare(&tiny(false), |_| {});
        let ex_par: Vec<_> = cmp.rounds.iter().map(|r| r.expectimax).collect();
        let ex_seq: Vec<_> = seq.rounds.iter().map(|r| r.expectimax).collect();
        assert_eq!(ex_par, ex_seq);
    }
}
