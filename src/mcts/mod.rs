//! Time-budgeted Monte Carlo Tree Search policy.
//!
//! Each call to [`Mcts::search`] builds a fresh tree rooted at the given
//! state and runs selection (UCB1), one-node expansion, a predicate-guided
//! rollout and backpropagation until the wall-clock budget runs out. The
//! deadline is only checked between iterations, so a move can overrun its
//! budget by up to one iteration; [`SearchReport`] records how long the
//! longest iteration took and whether the overrun went beyond that.
//!
//! The rollout bias ([`PredicateWeights`]) belongs to the session, not to a
//! single search: it keeps adapting across every move and game the session
//! plays.
//!
//! Quick start
//! ```
//! use std::time::Duration;
//! use duel_2048::engine::State;
//! use duel_2048::mcts::{Mcts, MctsConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(5);
//! let s0 = State::initial(&mut rng);
//! let cfg = MctsConfig { time_limit: Duration::from_millis(20), ..Default::default() };
//! let mut mcts = Mcts::seeded(cfg, 5);
//! let m = mcts.search(&s0);
//! assert!(m.is_some());
//! assert_eq!(mcts.last_report().root_visits as u64, mcts.last_report().iterations);
//! ```

use std::time::{Duration, Instant};

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::engine::{Move, State};
use crate::policy::Policy;

mod rollout;
mod tree;

pub use rollout::{best_moves, lookahead_board, rollout, Predicate, PredicateWeights, WeightStore};
pub use tree::{Node, NodeId, Tree};

/// Configurable knobs for MCTS.
///
/// - `time_limit`: wall-clock budget per move, checked once per iteration.
/// - `exploration`: the `c` in `sqrt(c * ln(N + 1) / n)`.
/// - `iteration_cap`: optional hard cap on iterations per move (None keeps
///   the search purely time-bounded).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MctsConfig {
    pub time_limit: Duration,
    pub exploration: f64,
    pub iteration_cap: Option<u64>,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self { time_limit: Duration::from_secs(1), exploration: 1.5, iteration_cap: None }
    }
}

impl MctsConfig {
    /// Budget in (fractional) seconds. Negative or non-finite budgets become zero.
    pub fn from_secs(time_limit_secs: f64, exploration: f64) -> Self {
        let time_limit = Duration::try_from_secs_f64(time_limit_secs).unwrap_or(Duration::ZERO);
        Self { time_limit, exploration, iteration_cap: None }
    }
}

/// Visit statistics of one root child.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChildStats {
    pub action: Move,
    pub visits: u32,
    pub value: f64,
}

/// What the last search did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchReport {
    pub iterations: u64,
    pub time_limit: Duration,
    pub elapsed: Duration,
    pub longest_iteration: Duration,
    pub root_visits: u32,
    pub children: Vec<ChildStats>,
    /// The move was picked at random because no child was ever expanded.
    pub fallback: bool,
}

impl SearchReport {
    /// Time spent past the budget.
    #[inline]
    pub fn overshoot(&self) -> Duration { self.elapsed.saturating_sub(self.time_limit) }

    /// True when the search ran longer than its budget plus one (longest)
    /// iteration.
    #[inline]
    pub fn overran(&self) -> bool { self.elapsed > self.time_limit + self.longest_iteration }
}

/// A search session: configuration, rollout weights and a random source.
///
/// Trees are never reused between calls; the weights are.
pub struct Mcts<W = PredicateWeights, R = StdRng> {
    cfg: MctsConfig,
    weights: W,
    rng: R,
    report: SearchReport,
}

impl Mcts<PredicateWeights, StdRng> {
    /// Session with fresh weights and an entropy-seeded RNG.
    pub fn new(cfg: MctsConfig) -> Self { Self::with_parts(cfg, PredicateWeights::default(), StdRng::from_entropy()) }

    /// Session with fresh weights and a reproducible RNG.
    pub fn seeded(cfg: MctsConfig, seed: u64) -> Self {
        Self::with_parts(cfg, PredicateWeights::default(), StdRng::seed_from_u64(seed))
    }
}

impl<W: WeightStore, R: Rng> Mcts<W, R> {
    pub fn with_parts(cfg: MctsConfig, weights: W, rng: R) -> Self {
        Self { cfg, weights, rng, report: SearchReport::default() }
    }

    #[inline]
    pub fn config(&self) -> &MctsConfig { &self.cfg }

    #[inline]
    pub fn weights(&self) -> &W { &self.weights }

    /// Report of the most recent [`Self::search`].
    #[inline]
    pub fn last_report(&self) -> &SearchReport { &self.report }

    /// Run one budgeted search from `state` and return the most visited root
    /// move. Returns `None` for terminal states.
    pub fn search(&mut self, state: &State) -> Option<Move> {
        if state.is_terminal() {
            self.report = SearchReport { time_limit: self.cfg.time_limit, ..Default::default() };
            return None;
        }
        let start = Instant::now();
        let deadline = start + self.cfg.time_limit;
        let mut tree = Tree::new(*state);
        let mut iterations = 0u64;
        let mut longest_iteration = Duration::ZERO;
        while Instant::now() < deadline && self.cfg.iteration_cap.map_or(true, |cap| iterations < cap) {
            let iter_start = Instant::now();
            self.iterate(&mut tree);
            iterations += 1;
            longest_iteration = longest_iteration.max(iter_start.elapsed());
        }

        let root = tree.root();
        let chosen = tree.most_visited_child(root).and_then(|id| tree.node(id).action());
        let report = SearchReport {
            iterations,
            time_limit: self.cfg.time_limit,
            elapsed: start.elapsed(),
            longest_iteration,
            root_visits: tree.node(root).visits(),
            children: tree
                .node(root)
                .children()
                .iter()
                .filter_map(|&id| {
                    let node = tree.node(id);
                    node.action().map(|action| ChildStats { action, visits: node.visits(), value: node.value() })
                })
                .collect(),
            fallback: chosen.is_none(),
        };
        if report.overran() {
            warn!(
                "MCTS exceeded time limit: took {:.4}s, limit {:.4}s, longest iteration {:.6}s",
                report.elapsed.as_secs_f64(),
                report.time_limit.as_secs_f64(),
                report.longest_iteration.as_secs_f64()
            );
        }
        debug!(
            "MCTS move: {} iterations, {} nodes, longest iteration {:.6}s, total {:.4}s",
            report.iterations,
            tree.len(),
            report.longest_iteration.as_secs_f64(),
            report.elapsed.as_secs_f64()
        );
        self.report = report;

        match chosen {
            Some(action) => Some(action),
            None => state.legal_actions().choose(&mut self.rng).copied(),
        }
    }

    /// One selection, expansion, rollout and backpropagation pass.
    /// Returns the node the rollout started from.
    fn iterate(&mut self, tree: &mut Tree) -> NodeId {
        let selected = tree.select(self.cfg.exploration);
        let node = if tree.node(selected).state().is_terminal() {
            selected
        } else {
            tree.expand(selected, &mut self.rng)
        };
        let result = rollout(tree.node(node).state(), &mut self.weights, &mut self.rng);
        tree.backpropagate(node, result);
        node
    }
}

impl<W: WeightStore, R: Rng> Policy for Mcts<W, R> {
    #[inline]
    fn select_action(&mut self, state: &State) -> Option<Move> { self.search(state) }
}

/// Build a reusable decision function that runs MCTS for `time_limit_secs`
/// per move with exploration constant `exploration`.
///
/// The returned closure owns its session, so its rollout weights persist
/// across every call.
///
/// ```
/// use duel_2048::engine::State;
/// use duel_2048::mcts::make_policy;
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let mut policy = make_policy(0.01, 1.5, StdRng::seed_from_u64(1));
/// let s = State::initial(&mut StdRng::seed_from_u64(2));
/// assert!(policy(&s).is_some());
/// ```
pub fn make_policy<R: Rng>(time_limit_secs: f64, exploration: f64, rng: R) -> impl FnMut(&State) -> Option<Move> {
    let mut session = Mcts::with_parts(MctsConfig::from_secs(time_limit_secs, exploration), PredicateWeights::default(), rng);
    move |state: &State| session.search(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Board, SIZE};
    use std::sync::{Arc, Mutex};

    fn state(rows: [[u32; SIZE]; SIZE], score: u64) -> State {
        State::new(Board::from_rows(rows).unwrap(), score)
    }

    fn capped(iterations: u64) -> MctsConfig {
        MctsConfig { time_limit: Duration::from_secs(60), exploration: 1.5, iteration_cap: Some(iterations) }
    }

    #[test_log::test]
    fn root_visits_match_iterations() {
        let mut mcts = Mcts::seeded(capped(150), 11);
        let s = state([[2, 0, 0], [0, 2, 0], [0, 0, 4]], 0);
        let m = mcts.search(&s);
        let report = mcts.last_report();
        assert_eq!(report.iterations, 150);
        assert_eq!(report.root_visits, 150);
        assert_eq!(report.children.iter().map(|c| c.visits).sum::<u32>(), 150);
        assert!(!report.fallback);
        assert!(m.is_some());
    }

    #[test_log::test]
    fn returns_most_visited_child() {
        let mut mcts = Mcts::seeded(capped(200), 12);
        let s = state([[2, 4, 0], [0, 2, 0], [0, 0, 0]], 0);
        let m = mcts.search(&s);
        let report = mcts.last_report();
        let mut best: Option<&ChildStats> = None;
        for c in &report.children {
            if best.map_or(true, |b| c.visits > b.visits) {
                best = Some(c);
            }
        }
        assert_eq!(m, best.map(|c| c.action));
        assert!(s.legal_actions().contains(&m.unwrap()));
    }

    #[test_log::test]
    fn child_visits_never_decrease() {
        let mut mcts = Mcts::seeded(capped(1), 13);
        let s = state([[2, 0, 0], [0, 0, 0], [0, 0, 2]], 0);
        let mut tree = Tree::new(s);
        let root = tree.root();
        let mut previous: Vec<u32> = Vec::new();
        for i in 0..100u32 {
            mcts.iterate(&mut tree);
            assert_eq!(tree.node(root).visits(), i + 1);
            let visits: Vec<u32> = tree.node(root).children().iter().map(|&c| tree.node(c).visits()).collect();
            assert!(visits.len() >= previous.len());
            for (before, after) in previous.iter().zip(&visits) {
                assert!(after >= before);
            }
            previous = visits;
        }
        // Every legal root move was expanded exactly once.
        let mut actions: Vec<Move> =
            tree.node(root).children().iter().filter_map(|&c| tree.node(c).action()).collect();
        actions.sort_by_key(|m| Move::ALL.iter().position(|x| x == m));
        assert_eq!(actions, s.legal_actions());
    }

    #[test_log::test]
    fn seeded_search_is_reproducible() {
        let s = state([[2, 2, 0], [0, 4, 0], [0, 0, 0]], 4);
        let run = || {
            let mut mcts = Mcts::seeded(capped(120), 99);
            let m = mcts.search(&s);
            (m, mcts.last_report().children.clone(), *mcts.weights())
        };
        assert_eq!(run(), run());
    }

    #[test_log::test]
    fn zero_budget_falls_back_to_a_random_legal_move() {
        let cfg = MctsConfig { time_limit: Duration::ZERO, ..Default::default() };
        let mut mcts = Mcts::seeded(cfg, 14);
        let s = state([[2, 0, 0], [0, 0, 0], [0, 0, 0]], 0);
        let m = mcts.search(&s);
        assert!(mcts.last_report().fallback);
        assert_eq!(mcts.last_report().iterations, 0);
        assert!(s.legal_actions().contains(&m.unwrap()));
    }

    #[test_log::test]
    fn terminal_state_has_no_move() {
        let mut mcts = Mcts::seeded(capped(10), 15);
        assert_eq!(mcts.search(&state([[2, 4, 2], [4, 2, 4], [2, 4, 2]], 0)), None);
        assert_eq!(mcts.search(&state([[2048, 0, 0], [0, 0, 0], [0, 0, 0]], 0)), None);
    }

    #[test_log::test]
    fn time_budget_bounds_the_search() {
        let cfg = MctsConfig { time_limit: Duration::from_millis(30), ..Default::default() };
        let mut mcts = Mcts::seeded(cfg, 16);
        let s = state([[2, 0, 0], [0, 0, 0], [0, 0, 2]], 0);
        assert!(mcts.search(&s).is_some());
        let report = mcts.last_report();
        assert!(report.iterations > 0);
        assert_eq!(report.root_visits as u64, report.iterations);
        assert!(report.elapsed >= report.time_limit);
        assert!(report.longest_iteration > Duration::ZERO);
    }

    #[test_log::test]
    fn weights_persist_across_searches() {
        let mut mcts = Mcts::seeded(capped(5), 17);
        let s = state([[2, 0, 0], [0, 0, 0], [0, 0, 2]], 0);
        mcts.search(&s);
        let after_one = *mcts.weights();
        assert_ne!(after_one, PredicateWeights::default());
        mcts.search(&s);
        assert_ne!(*mcts.weights(), after_one);
    }

    #[test_log::test]
    fn sessions_can_share_weights() {
        let shared = Arc::new(Mutex::new(PredicateWeights::default()));
        let mut a = Mcts::with_parts(capped(3), Arc::clone(&shared), StdRng::seed_from_u64(1));
        let mut b = Mcts::with_parts(capped(3), Arc::clone(&shared), StdRng::seed_from_u64(2));
        let s = state([[2, 0, 0], [0, 0, 0], [0, 0, 2]], 0);
        a.search(&s);
        let after_a = shared.snapshot();
        b.search(&s);
        assert_ne!(shared.snapshot(), after_a);
        assert_eq!(a.weights().snapshot(), b.weights().snapshot());
    }

    #[test]
    fn overran_flags_only_unbounded_overshoot() {
        let mut report = SearchReport {
            time_limit: Duration::from_millis(100),
            elapsed: Duration::from_millis(120),
            longest_iteration: Duration::from_millis(30),
            ..Default::default()
        };
        assert_eq!(report.overshoot(), Duration::from_millis(20));
        assert!(!report.overran());
        report.elapsed = Duration::from_millis(140);
        assert!(report.overran());
    }

    #[test]
    fn from_secs_clamps_bad_budgets() {
        assert_eq!(MctsConfig::from_secs(-1.0, 1.0).time_limit, Duration::ZERO);
        assert_eq!(MctsConfig::from_secs(0.25, 1.0).time_limit, Duration::from_millis(250));
    }
}
