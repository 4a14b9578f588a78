use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::{Move, State, SPAWN_OUTCOMES};
use crate::policy::Policy;

use super::{BranchEval, Evaluator, ExpectimaxConfig, Heuristic, SearchStats};

enum Node { Max, Chance }

/// Value of a searched state and, for max layers, the move achieving it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult {
    pub value: f64,
    pub action: Option<Move>,
}

impl SearchResult {
    #[inline]
    fn leaf(value: f64) -> Self { Self { value, action: None } }
}

/// Single-threaded, fixed-depth Expectimax search.
///
/// Max layers step each legal move with [`State::successor`], so a random
/// tile lands before the chance layer enumerates the remaining spawns. The
/// owned `R` supplies that randomness.
pub struct Expectimax<E = Heuristic, R = StdRng> {
    cfg: ExpectimaxConfig,
    evaluator: E,
    rng: R,
    stats: SearchStats,
}

impl Expectimax<Heuristic, StdRng> {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self { Self::with_evaluator(cfg, Heuristic::default()) }

    /// Default evaluator with a reproducible RNG.
    pub fn seeded(cfg: ExpectimaxConfig, seed: u64) -> Self {
        Self::with_parts(cfg, Heuristic::default(), StdRng::seed_from_u64(seed))
    }
}

impl Default for Expectimax<Heuristic, StdRng> {
    fn default() -> Self { Self::new() }
}

impl<E: Evaluator> Expectimax<E, StdRng> {
    /// Search with a custom leaf evaluator and an entropy-seeded RNG.
    pub fn with_evaluator(cfg: ExpectimaxConfig, evaluator: E) -> Self {
        Self::with_parts(cfg, evaluator, StdRng::from_entropy())
    }
}

impl<E: Evaluator, R: Rng> Expectimax<E, R> {
    pub fn with_parts(cfg: ExpectimaxConfig, evaluator: E, rng: R) -> Self {
        Self { cfg, evaluator, rng, stats: SearchStats::default() }
    }

    #[inline]
    pub fn config(&self) -> &ExpectimaxConfig { &self.cfg }

    /// Best move for `state`, or `None` when the state is terminal or the
    /// configured depth is zero.
    ///
    /// ```
    /// use duel_2048::engine::{Board, Move, State};
    /// use duel_2048::expectimax::Expectimax;
    /// let s = State::new(Board::from_rows([[2, 2, 0], [0, 0, 0], [0, 0, 0]]).unwrap(), 0);
    /// let mut ex = Expectimax::new();
    /// assert!(ex.select_action(&s).is_some());
    /// ```
    #[inline]
    pub fn select_action(&mut self, state: &State) -> Option<Move> { self.search(state).action }

    /// Root max-layer search: the best value and the move achieving it.
    pub fn search(&mut self, state: &State) -> SearchResult {
        let depth = self.cfg.depth;
        let mut walk = Walk { evaluator: &self.evaluator, rng: &mut self.rng, nodes: 0 };
        let result = walk.expectimax(state, Node::Max, depth);
        let nodes = walk.nodes;
        self.record(nodes);
        result
    }

    /// EV at root (max node), equivalent to the best branch EV.
    pub fn state_value(&mut self, state: &State) -> f64 { self.search(state).value }

    /// Compute EV for each direction (no normalization).
    ///
    /// Returns a fixed array in [`Move::ALL`] order and marks illegal moves
    /// as `legal=false`. Random draws happen in the same order as in
    /// [`Self::search`], so equally seeded searchers agree on the best EV.
    pub fn branch_evals(&mut self, state: &State) -> [BranchEval; 4] {
        let child_depth = self.cfg.depth.saturating_sub(1);
        let mut walk = Walk { evaluator: &self.evaluator, rng: &mut self.rng, nodes: 0 };
        let out = Move::ALL.map(|dir| {
            if state.board().shift(dir) != *state.board() {
                let child = state.successor(dir, &mut *walk.rng);
                let ev = walk.expectimax(&child, Node::Chance, child_depth).value;
                BranchEval { dir, ev, legal: true }
            } else {
                BranchEval { dir, ev: 0.0, legal: false }
            }
        });
        let nodes = walk.nodes;
        self.record(nodes);
        out
    }

    /// Statistics collected from the last call to [`Self::search`],
    /// [`Self::branch_evals`] or [`Self::state_value`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }

    fn record(&mut self, nodes: u64) {
        self.stats.nodes = nodes;
        self.stats.peak_nodes = self.stats.peak_nodes.max(nodes);
        log::trace!("expectimax depth {} visited {} nodes", self.cfg.depth, nodes);
    }
}

// One search pass: borrowed evaluator and RNG plus a node counter.
struct Walk<'a, E, R> {
    evaluator: &'a E,
    rng: &'a mut R,
    nodes: u64,
}

impl<E: Evaluator, R: Rng> Walk<'_, E, R> {
    fn expectimax(&mut self, state: &State, node: Node, depth: u32) -> SearchResult {
        self.nodes += 1;
        if depth == 0 || state.is_terminal() {
            return SearchResult::leaf(self.evaluator.evaluate(state));
        }
        match node {
            Node::Max => self.evaluate_max(state, depth),
            Node::Chance => self.evaluate_chance(state, depth),
        }
    }

    fn evaluate_max(&mut self, state: &State, depth: u32) -> SearchResult {
        let mut best_value = f64::NEG_INFINITY;
        let mut best_move = None;
        for dir in state.legal_actions() {
            let child = state.successor(dir, &mut *self.rng);
            let value = self.expectimax(&child, Node::Chance, depth - 1).value;
            // Strict comparison: the first of several equal moves wins.
            if value > best_value {
                best_value = value;
                best_move = Some(dir);
            }
        }
        match best_move {
            Some(_) => SearchResult { value: best_value, action: best_move },
            None => SearchResult::leaf(self.evaluator.evaluate(state)),
        }
    }

    fn evaluate_chance(&mut self, state: &State, depth: u32) -> SearchResult {
        let empty = state.board().empty_cells();
        if empty.is_empty() {
            return SearchResult::leaf(self.evaluator.evaluate(state));
        }
        let num_empty = empty.len() as f64;
        let mut value = 0.0;
        for (row, col) in empty {
            for (tile, prob) in SPAWN_OUTCOMES {
                let child = State::new(state.board().with_tile(row, col, tile), state.score());
                value += self.expectimax(&child, Node::Max, depth - 1).value * prob / num_empty;
            }
        }
        SearchResult::leaf(value)
    }
}

impl<E: Evaluator, R: Rng> Policy for Expectimax<E, R> {
    #[inline]
    fn select_action(&mut self, state: &State) -> Option<Move> { Expectimax::select_action(self, state) }
}
