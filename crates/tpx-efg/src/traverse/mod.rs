//! Traversal controllers: how an update sweeps the game tree.

mod enumerate;
mod external;
mod outcome;

pub(crate) use enumerate::enumerated;
pub(crate) use external::external;
pub(crate) use outcome::sampled;

use crate::*;
use anyhow::{Context, Result};
use petgraph::graph::NodeIndex;

/// How [`Environment::update`] visits the tree each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traverse {
    /// Visit every node once with exact reach products. Deterministic.
    Enumerate,
    /// Per traverser: expand the traverser's actions, sample everyone
    /// else's from their current strategy signal.
    External,
    /// Sample a single root-to-terminal trajectory from the supplied
    /// behavior signals. Importance correction is the algorithm's job.
    Outcome,
}

/// One visited node with its per-seat reach probabilities (seat 0 is
/// chance). Walks emit parents strictly before children.
#[derive(Debug, Clone)]
pub(crate) struct Visit {
    pub node: NodeIndex,
    pub reach: Vec<Probability>,
}

/// Draw an index from unnormalized non-negative weights.
pub(crate) fn draw(weights: &[Probability], rng: &mut rand::rngs::SmallRng) -> Result<usize> {
    use rand::distr::weighted::WeightedIndex;
    use rand::prelude::Distribution;
    let distribution =
        WeightedIndex::new(weights).context("strategy signal is not a sampleable distribution")?;
    Ok(distribution.sample(rng))
}

/// The behavioral weights a player's strategy signal assigns at a node.
pub(crate) fn policy<'a>(
    tree: &GameTree,
    storage: &'a Storage,
    strategies: &[Signal],
    v: NodeIndex,
    player: Player,
) -> &'a Vector {
    let infoset = tree.membership(v).expect("decision nodes are partitioned");
    storage.get(infoset, strategies[player - 1])
}
