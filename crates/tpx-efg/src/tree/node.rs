use tpx_core::*;

/// Payload of one game-tree vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Spot {
    pub id: String,
    pub kind: Kind,
}

/// What happens at a vertex.
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    /// A player chooses among the outgoing edges.
    Decision { player: Player },
    /// Nature draws an outgoing edge from a fixed distribution.
    Chance { probs: Vec<Probability> },
    /// The game ends with one payoff per player.
    Terminal { payoffs: Vec<Utility> },
}

impl Spot {
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, Kind::Terminal { .. })
    }
    pub fn is_chance(&self) -> bool {
        matches!(self.kind, Kind::Chance { .. })
    }
    /// The acting player: the owner at a decision, [`CHANCE`] at a chance
    /// vertex, and [`CHANCE`] at terminals (nobody acts).
    pub fn player(&self) -> Player {
        match self.kind {
            Kind::Decision { player } => player,
            _ => CHANCE,
        }
    }
    /// Terminal payoff for a (1-based) player; zero elsewhere.
    pub fn payoff(&self, player: Player) -> Utility {
        match &self.kind {
            Kind::Terminal { payoffs } => payoffs[player - 1],
            _ => 0.0,
        }
    }
}
