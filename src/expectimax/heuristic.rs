use crate::engine::{Board, State, SIZE};

use super::Evaluator;

/// Weights of the five evaluation terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicWeights {
    pub score: f64,
    pub empty: f64,
    pub corner: f64,
    pub monotonicity: f64,
    pub smoothness: f64,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self { score: 1.0, empty: 100.0, corner: 1.5, monotonicity: 1.0, smoothness: 1.0 }
    }
}

/// Unweighted evaluation terms for one state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicTerms {
    pub score: f64,
    pub empty: f64,
    pub corner: f64,
    pub monotonicity: f64,
    pub smoothness: f64,
}

impl HeuristicTerms {
    pub fn of(state: &State) -> Self {
        let board = state.board();
        Self {
            score: state.score() as f64,
            empty: board.count_empty() as f64,
            corner: calc_corner(board),
            monotonicity: calc_monotonicity(board),
            smoothness: calc_smoothness(board),
        }
    }

    pub fn weighted(&self, w: &HeuristicWeights) -> f64 {
        w.score * self.score
            + w.empty * self.empty
            + w.corner * self.corner
            + w.monotonicity * self.monotonicity
            + w.smoothness * self.smoothness
    }
}

/// Default static evaluation used at Expectimax leaves.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Heuristic {
    pub weights: HeuristicWeights,
}

impl Evaluator for Heuristic {
    #[inline]
    fn evaluate(&self, state: &State) -> f64 { HeuristicTerms::of(state).weighted(&self.weights) }
}

// Twice the largest tile when a corner holds that value.
fn calc_corner(board: &Board) -> f64 {
    let max_tile = board.highest_tile();
    if board.corners().contains(&max_tile) { 2.0 * max_tile as f64 } else { 0.0 }
}

// Sum of (left - right) over row pairs with left >= right, plus the same for
// (upper - lower) over column pairs.
fn calc_monotonicity(board: &Board) -> f64 {
    let rows = board.rows();
    let mut drops = 0.0;
    for r in 0..SIZE {
        for c in 0..SIZE - 1 {
            let (a, b) = (rows[r][c], rows[r][c + 1]);
            if a >= b {
                drops += b as f64 - a as f64;
            }
        }
    }
    for c in 0..SIZE {
        for r in 0..SIZE - 1 {
            let (a, b) = (rows[r][c], rows[r + 1][c]);
            if a >= b {
                drops += b as f64 - a as f64;
            }
        }
    }
    -drops
}

fn calc_smoothness(board: &Board) -> f64 {
    let rows = board.rows();
    let mut smoothness = 0.0;
    for r in 0..SIZE {
        for c in 0..SIZE {
            let tile = rows[r][c];
            if tile == 0 {
                continue;
            }
            for (nr, nc) in [(r, c + 1), (r + 1, c)] {
                if nr < SIZE && nc < SIZE && rows[nr][nc] != 0 {
                    smoothness -= (tile as f64 - rows[nr][nc] as f64).abs();
                }
            }
        }
    }
    smoothness
}
