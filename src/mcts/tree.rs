use rand::Rng;

use crate::engine::{Move, State};

/// Stable handle of a node inside a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub struct Node {
    state: State,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    visits: u32,
    value: f64,
    untried: Vec<Move>,
    action: Option<Move>,
}

impl Node {
    fn new(state: State, parent: Option<NodeId>, action: Option<Move>) -> Self {
        let untried = if state.is_terminal() { Vec::new() } else { state.legal_actions() };
        Self { state, parent, children: Vec::new(), visits: 0, value: 0.0, untried, action }
    }

    #[inline]
    pub fn state(&self) -> &State { &self.state }
    #[inline]
    pub fn parent(&self) -> Option<NodeId> { self.parent }
    #[inline]
    pub fn children(&self) -> &[NodeId] { &self.children }
    #[inline]
    pub fn visits(&self) -> u32 { self.visits }
    #[inline]
    pub fn value(&self) -> f64 { self.value }
    /// Move that produced this node from its parent (`None` at the root).
    #[inline]
    pub fn action(&self) -> Option<Move> { self.action }
    #[inline]
    pub fn is_fully_expanded(&self) -> bool { self.untried.is_empty() }
}

/// Search tree stored as an arena. Nodes are only ever appended, so a
/// [`NodeId`] stays valid for the life of the tree; parents are referenced by
/// handle, children are owned by position in the arena.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new(root: State) -> Self { Self { nodes: vec![Node::new(root, None, None)] } }

    #[inline]
    pub fn root(&self) -> NodeId { NodeId(0) }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node { &self.nodes[id.0] }

    #[inline]
    pub fn len(&self) -> usize { self.nodes.len() }

    /// UCB1 score of `child` under `parent`; unvisited children score infinity.
    pub fn ucb1(&self, parent: NodeId, child: NodeId, c: f64) -> f64 {
        let child = self.node(child);
        if child.visits == 0 {
            return f64::INFINITY;
        }
        let visits = child.visits as f64;
        let parent_visits = self.node(parent).visits as f64;
        child.value / visits + (c * (parent_visits + 1.0).ln() / visits).sqrt()
    }

    /// Child with the highest UCB1 score; ties go to the earliest child.
    pub fn best_child(&self, id: NodeId, c: f64) -> Option<NodeId> {
        let mut best: Option<(NodeId, f64)> = None;
        for &child in &self.node(id).children {
            let score = self.ucb1(id, child, c);
            if score == f64::INFINITY {
                return Some(child);
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((child, score));
            }
        }
        best.map(|(child, _)| child)
    }

    /// Descend from the root while the current node is fully expanded and
    /// non-terminal.
    pub fn select(&self, c: f64) -> NodeId {
        let mut id = self.root();
        loop {
            let node = self.node(id);
            if !node.is_fully_expanded() || node.state.is_terminal() {
                return id;
            }
            match self.best_child(id, c) {
                Some(child) => id = child,
                None => return id,
            }
        }
    }

    /// Try the most recently listed untried action of `id` and return the new
    /// child; returns `id` itself when nothing is left to try.
    pub fn expand<R: Rng + ?Sized>(&mut self, id: NodeId, rng: &mut R) -> NodeId {
        let Some(action) = self.nodes[id.0].untried.pop() else {
            return id;
        };
        let next = self.nodes[id.0].state.successor(action, rng);
        let child = NodeId(self.nodes.len());
        self.nodes.push(Node::new(next, Some(id), Some(action)));
        self.nodes[id.0].children.push(child);
        child
    }

    /// Add one visit and `result` to `id` and every ancestor up to the root.
    pub fn backpropagate(&mut self, id: NodeId, result: f64) {
        let mut cur = Some(id);
        while let Some(NodeId(idx)) = cur {
            let node = &mut self.nodes[idx];
            node.visits += 1;
            node.value += result;
            cur = node.parent;
        }
    }

    /// Most visited child of `id`; ties go to the earliest child.
    pub fn most_visited_child(&self, id: NodeId) -> Option<NodeId> {
        let mut best: Option<NodeId> = None;
        for &child in &self.node(id).children {
            if best.map_or(true, |b| self.node(child).visits > self.node(b).visits) {
                best = Some(child);
            }
        }
        best
    }
}
