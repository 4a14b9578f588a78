use crate::engine::{Move, State};

/// Something that picks the next move for a state.
///
/// `None` means no recommendation (terminal state, or nothing to search).
/// Both [`crate::expectimax::Expectimax`] and [`crate::mcts::Mcts`] implement
/// this, as does any `FnMut(&State) -> Option<Move>` closure such as the one
/// returned by [`crate::mcts::make_policy`].
pub trait Policy {
    fn select_action(&mut self, state: &State) -> Option<Move>;
}

impl<F> Policy for F
where
    F: FnMut(&State) -> Option<Move>,
{
    #[inline]
    fn select_action(&mut self, state: &State) -> Option<Move> { self(state) }
}
