use std::sync::{Arc, Mutex, PoisonError};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::engine::{Board, Move, State, SIZE};

/// Board features that bias rollout move choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    MaxInCorner,
    EmptyCount,
    MonotonicRows,
    MonotonicCols,
}

impl Predicate {
    pub const ALL: [Predicate; 4] =
        [Predicate::MaxInCorner, Predicate::EmptyCount, Predicate::MonotonicRows, Predicate::MonotonicCols];

    pub fn name(self) -> &'static str {
        match self {
            Predicate::MaxInCorner => "max_in_corner",
            Predicate::EmptyCount => "empty_count",
            Predicate::MonotonicRows => "monotonic_rows",
            Predicate::MonotonicCols => "monotonic_cols",
        }
    }

    /// Value of this predicate on `board`.
    pub fn eval(self, board: &Board) -> u32 {
        let rows = board.rows();
        match self {
            Predicate::MaxInCorner => u32::from(board.corners().contains(&board.highest_tile())),
            Predicate::EmptyCount => board.count_empty() as u32,
            Predicate::MonotonicRows => {
                rows.iter().filter(|line| line.windows(2).all(|w| w[0] <= w[1])).count() as u32
            }
            Predicate::MonotonicCols => {
                (0..SIZE).filter(|&c| (0..SIZE - 1).all(|r| rows[r][c] <= rows[r + 1][c])).count() as u32
            }
        }
    }
}

/// Weight of a predicate before any rollout has been observed.
const INITIAL_WEIGHT: f64 = 1.0;
/// Share of the old weight kept by each update.
const SMOOTHING: f64 = 0.9;
/// Share of the rollout score mixed in by each update.
const TARGET_SHARE: f64 = 0.1;

/// Adaptive predicate weights, one per [`Predicate`].
///
/// Every rollout pulls all four weights toward its final score with the same
/// exponential smoothing step, `w <- 0.9 w + 0.1 final_score`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredicateWeights {
    weights: [f64; 4],
}

impl Default for PredicateWeights {
    fn default() -> Self { Self { weights: [INITIAL_WEIGHT; 4] } }
}

impl PredicateWeights {
    #[inline]
    pub fn get(&self, p: Predicate) -> f64 { self.weights[p as usize] }

    /// Weighted predicate sum for `board`.
    pub fn score(&self, board: &Board) -> f64 {
        Predicate::ALL
            .iter()
            .map(|&p| f64::from(p.eval(board)) * self.get(p))
            .sum()
    }

    pub fn smooth_toward(&mut self, target: f64) {
        for w in &mut self.weights {
            *w = SMOOTHING * *w + TARGET_SHARE * target;
        }
    }
}

/// Storage for the weights a session's rollouts read and update.
///
/// An owned [`PredicateWeights`] keeps a session isolated. An
/// `Arc<Mutex<PredicateWeights>>` shares one set of weights between sessions
/// running on different threads.
pub trait WeightStore {
    fn snapshot(&self) -> PredicateWeights;
    fn smooth_toward(&mut self, target: f64);
}

impl WeightStore for PredicateWeights {
    #[inline]
    fn snapshot(&self) -> PredicateWeights { *self }
    #[inline]
    fn smooth_toward(&mut self, target: f64) { PredicateWeights::smooth_toward(self, target) }
}

impl WeightStore for Arc<Mutex<PredicateWeights>> {
    fn snapshot(&self) -> PredicateWeights { *self.lock().unwrap_or_else(PoisonError::into_inner) }

    fn smooth_toward(&mut self, target: f64) {
        self.lock().unwrap_or_else(PoisonError::into_inner).smooth_toward(target)
    }
}

/// Board used to score `dir` during a rollout: the move resolved without a
/// real spawn, then a 2 dropped into a random empty cell.
pub fn lookahead_board<R: Rng + ?Sized>(board: &Board, dir: Move, rng: &mut R) -> Board {
    let moved = board.shift(dir);
    match moved.empty_cells().choose(rng) {
        Some(&(row, col)) => moved.with_tile(row, col, 2),
        None => moved,
    }
}

/// Legal moves of `state` whose lookahead board has the highest weighted
/// predicate score, in [`Move::ALL`] order.
pub fn best_moves<R: Rng + ?Sized>(state: &State, weights: &PredicateWeights, rng: &mut R) -> Vec<Move> {
    let mut best = Vec::with_capacity(Move::ALL.len());
    let mut best_score = f64::NEG_INFINITY;
    for dir in state.legal_actions() {
        let score = weights.score(&lookahead_board(state.board(), dir, rng));
        if score > best_score {
            best_score = score;
            best.clear();
            best.push(dir);
        } else if score == best_score {
            best.push(dir);
        }
    }
    best
}

/// Play from `start` to a terminal state, each step taking one of the moves
/// whose lookahead board has the best weighted predicate score. Actual moves
/// use the real random spawn. Returns the final score and folds it into
/// `weights`.
pub fn rollout<W, R>(start: &State, weights: &mut W, rng: &mut R) -> f64
where
    W: WeightStore + ?Sized,
    R: Rng + ?Sized,
{
    let w = weights.snapshot();
    let mut state = *start;
    while !state.is_terminal() {
        let Some(&dir) = best_moves(&state, &w, rng).choose(rng) else {
            break;
        };
        state = state.successor(dir, rng);
    }
    let final_score = state.score() as f64;
    weights.smooth_toward(final_score);
    final_score
}
