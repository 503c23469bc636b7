use crate::*;

/// Opaque handle to a per-infoset signal slot.
///
/// Handles are only meaningful against the [`Graph`] that declared them;
/// the engine owns all storage and algorithms hold nothing but handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signal(pub(crate) usize);

impl Signal {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Symbolic signal width, resolved per infoset at allocation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    /// Exactly one entry.
    Scalar,
    /// One entry per action of the owning infoset.
    Actions,
}

impl Width {
    pub fn resolve(self, actions: usize) -> usize {
        match self {
            Width::Scalar => 1,
            Width::Actions => actions,
        }
    }
    /// Broadcast join: a scalar widens against anything.
    pub(crate) fn join(self, other: Self) -> Self {
        match (self, other) {
            (Width::Scalar, w) => w,
            (w, _) => w,
        }
    }
}

/// Which half of a dynamic update a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Leaves toward the root: children run before their parents.
    Backward,
    /// Root toward the leaves: parents run before their children.
    Forward,
}

// ============================================================================
// BUILTIN SIGNALS
// ============================================================================
// Reserved slots, present in every compiled schedule. The structural pair
// (ACTION_SET_SIZE, SUBTREE_SIZE) is filled from the tree at attach time;
// the rest is per-iteration traversal context.
pub const UTILITY: Signal = Signal(0);
pub const ACTION_SET_SIZE: Signal = Signal(1);
pub const REACH_PROB: Signal = Signal(2);
pub const OPPONENT_REACH_PROB: Signal = Signal(3);
pub const SUBTREE_SIZE: Signal = Signal(4);

pub(crate) const BUILTINS: usize = 5;
pub(crate) const BUILTIN_WIDTHS: [Width; BUILTINS] = [
    Width::Actions,
    Width::Scalar,
    Width::Scalar,
    Width::Scalar,
    Width::Actions,
];
