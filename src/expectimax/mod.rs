//! Fixed-depth Expectimax policy for the 3x3 game.
//!
//! Max layers pick the best legal move; chance layers average over every
//! possible spawn (a 2 with p=0.9 or a 4 with p=0.1 in each empty cell).
//! Each layer consumes one unit of depth, so the default depth of 4 searches
//! max -> chance -> max -> chance before evaluating leaves.
//!
//! A max layer steps each legal move with [`State::successor`], which drops
//! one random tile, and the chance layer below averages over the spawns that
//! remain. The searcher owns its RNG; [`Expectimax::seeded`] makes it
//! reproducible.
//!
//! Quick start
//! ```
//! use duel_2048::engine::State;
//! use duel_2048::expectimax::{Expectimax, ExpectimaxConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(123);
//! let s0 = State::initial(&mut rng);
//!
//! let mut ex = Expectimax::with_config(ExpectimaxConfig { depth: 2 });
//! let m = ex.select_action(&s0);
//! assert!(m.is_some());
//!
//! // Any `Fn(&State) -> f64` works as a leaf evaluator.
//! let mut greedy = Expectimax::with_evaluator(ExpectimaxConfig { depth: 2 }, |s: &State| s.score() as f64);
//! assert!(greedy.select_action(&s0).is_some());
//! ```

use crate::engine::{Move, State};

mod heuristic;
mod search;

pub use heuristic::{Heuristic, HeuristicTerms, HeuristicWeights};
pub use search::{Expectimax, SearchResult};

/// Static evaluation capability used at leaves and at states with no legal move.
pub trait Evaluator {
    fn evaluate(&self, state: &State) -> f64;
}

impl<F> Evaluator for F
where
    F: Fn(&State) -> f64,
{
    #[inline]
    fn evaluate(&self, state: &State) -> f64 { self(state) }
}

/// Configurable knobs for Expectimax.
///
/// - `depth`: number of layers (max and chance each count one) searched
///   before falling back to the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectimaxConfig {
    pub depth: u32,
}

impl Default for ExpectimaxConfig {
    fn default() -> Self { Self { depth: 4 } }
}

/// Per-branch expected value at the root (no normalization).
///
/// - `ev` is the expected value for taking `dir` from the current state.
/// - `legal` is false when the move is a no-op for the current board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub ev: f64,
    pub legal: bool,
}

/// Basic search stats.
///
/// `nodes` counts states visited by the last search; `peak_nodes` is the
/// largest such count since construction or the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub peak_nodes: u64,
}
