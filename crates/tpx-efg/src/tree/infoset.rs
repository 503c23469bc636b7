use crate::*;
use petgraph::graph::NodeIndex;

/// Index into the flat infoset arena of a [`GameTree`].
pub type InfosetId = usize;

/// An `(infoset, action)` pair: one sequence-form coordinate.
pub type Sequence = (InfosetId, usize);

/// One information set: decision nodes its owner cannot tell apart.
///
/// Every player also owns a synthetic root infoset with a single action and
/// no member nodes; top-level infosets parent to it, which gives every real
/// sequence a well-defined predecessor.
#[derive(Debug, Clone)]
pub struct Infoset {
    /// Owning player (1-based).
    pub player: Player,
    /// Canonical member node id, or a synthetic tag for root infosets.
    pub label: String,
    /// Member decision nodes, canonical first.
    pub members: Vec<NodeIndex>,
    /// Action-set size, shared by every member.
    pub actions: usize,
    /// Own-player parent sequence; `None` only at root infosets.
    pub parent: Option<Sequence>,
    /// Per-player parent sequences, indexed by `player - 1`: the last
    /// sequence of that player above each member, deduplicated.
    pub parents: Vec<Vec<Sequence>>,
    /// Child infosets (all players) reached through each action.
    pub children: Vec<Vec<InfosetId>>,
    /// Balanced-exploration weight per action: one for the sequence itself
    /// plus the own-player leaf sequences in the subtree below it.
    pub subtree: Vec<Utility>,
    /// Total own-player leaf sequences at or below this infoset.
    pub size: Utility,
}

impl Infoset {
    /// Own-player child infosets through `action`.
    pub fn descend<'a>(
        &'a self,
        tree: &'a GameTree,
        action: usize,
    ) -> impl Iterator<Item = InfosetId> + 'a {
        self.children[action]
            .iter()
            .copied()
            .filter(move |&c| tree.infoset(c).player == self.player)
    }
}
