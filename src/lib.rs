//! duel-2048: a 3x3 2048 engine with Expectimax and MCTS policies
//!
//! This crate provides:
//! - A small `Board`/`State` engine with seeded randomness (`engine` module)
//! - A fixed-depth Expectimax policy with a hand-tuned evaluation (`expectimax` module)
//! - A time-budgeted MCTS policy with adaptive rollout weights (`mcts` module)
//! - A head-to-head harness and terminal renderer (`harness`, `render`)
//!
//! Quick start:
//! ```
//! use duel_2048::engine::{Move, State};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Deterministic game start with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let s0 = State::initial(&mut rng);
//! let actions = s0.legal_actions();
//! assert!(!actions.is_empty());
//! let s1 = s0.successor(actions[0], &mut rng);
//! assert!(s1.score() >= s0.score());
//! ```
//!
//! Full loop (simplest possible)
//! ```
//! use duel_2048::engine::State;
//! use duel_2048::expectimax::{Expectimax, ExpectimaxConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // 1) Policy and RNG
//! let mut policy = Expectimax::with_config(ExpectimaxConfig { depth: 2 });
//! let mut rng = StdRng::seed_from_u64(123);
//!
//! // 2) Start state with two random tiles
//! let mut s = State::initial(&mut rng);
//! let mut moves = 0u32;
//!
//! // 3) Loop a few moves to demonstrate flow (keep doctests fast)
//! while !s.is_terminal() && moves < 4 {
//!     match policy.select_action(&s) {
//!         Some(dir) => {
//!             s = s.successor(dir, &mut rng);
//!             moves += 1;
//!         }
//!         None => break,
//!     }
//! }
//! assert!(moves > 0);
//! ```
//!
pub mod engine;
pub mod expectimax;
pub mod harness;
pub mod mcts;
pub mod policy;
pub mod render;
