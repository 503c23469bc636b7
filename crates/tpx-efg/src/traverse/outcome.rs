use super::*;
use crate::*;
use anyhow::Result;
use rand::rngs::SmallRng;

/// Sample one root-to-terminal trajectory under the supplied behavior
/// signals, multiplying reach along the path. No clamping happens here;
/// algorithms divide by these reaches and add their own floors.
pub(crate) fn sampled(
    tree: &GameTree,
    storage: &Storage,
    behaviors: &[Signal],
    rng: &mut SmallRng,
) -> Result<Vec<Visit>> {
    let mut visits = Vec::new();
    let mut cursor = Visit {
        node: tree.root(),
        reach: vec![1.0; tree.players() + 1],
    };
    loop {
        let v = cursor.node;
        let children = tree.children(v);
        let step = match tree.spot(v).kind {
            Kind::Terminal { .. } => None,
            Kind::Chance { .. } => {
                let probs = children
                    .iter()
                    .map(|&(a, _)| tree.chance_prob(v, a))
                    .collect::<Vec<_>>();
                let pick = draw(&probs, rng)?;
                Some((CHANCE, probs[pick], children[pick].1))
            }
            Kind::Decision { player } => {
                let policy = policy(tree, storage, behaviors, v, player);
                let pick = draw(policy.as_slice(), rng)?;
                Some((player, policy.get(pick), children[pick].1))
            }
        };
        match step {
            None => {
                visits.push(cursor);
                return Ok(visits);
            }
            Some((seat, prob, child)) => {
                let mut down = cursor.reach.clone();
                down[seat] *= prob;
                visits.push(cursor);
                cursor = Visit {
                    node: child,
                    reach: down,
                };
            }
        }
    }
}
