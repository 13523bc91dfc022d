use serde::{Deserialize, Serialize};

/// Category of a grammar token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Fallback,       // Control, no fallback children
    Sequence,       // Control, no sequence children
    Parallel,       // Control, no nesting restriction
    Condition,      // Leaf, never running
    Action,         // Leaf, may be running
    AtomicFallback, // Leaf with fixed fallback substructure
    AtomicSequence, // Leaf with fixed sequence substructure
    Up,             // Closes the most recent control node
}

impl NodeKind {
    pub fn is_control(self) -> bool {
        matches!(self, NodeKind::Fallback | NodeKind::Sequence | NodeKind::Parallel)
    }

    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            NodeKind::Condition | NodeKind::Action | NodeKind::AtomicFallback | NodeKind::AtomicSequence
        )
    }

    /// Leaves that actually do something and may be the last child of a subtree
    pub fn is_behavior(self) -> bool {
        matches!(
            self,
            NodeKind::Action | NodeKind::AtomicFallback | NodeKind::AtomicSequence
        )
    }
}

/// Outcome of a bounded search for a valid genome.
///
/// Running out of attempts is an expected condition during evolution, not an
/// error: callers treat `Exhausted` as "no offspring produced here" and move on.
#[derive(Debug, Clone, PartialEq)]
pub enum Search<T> {
    Found(T),
    Exhausted,
}

impl<T> Search<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Search::Found(_))
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Search::Exhausted)
    }

    pub fn found(self) -> Option<T> {
        match self {
            Search::Found(value) => Some(value),
            Search::Exhausted => None,
        }
    }
}
