use super::*;
use crate::*;
use anyhow::Result;
use rand::rngs::SmallRng;

/// External sampling for one traverser: expand all of the traverser's
/// actions, sample a single action everywhere else. Reach still carries
/// the sampled action's probability.
pub(crate) fn external(
    tree: &GameTree,
    storage: &Storage,
    strategies: &[Signal],
    traverser: Player,
    rng: &mut SmallRng,
) -> Result<Vec<Visit>> {
    let mut visits = Vec::new();
    let mut stack = vec![Visit {
        node: tree.root(),
        reach: vec![1.0; tree.players() + 1],
    }];
    while let Some(visit) = stack.pop() {
        let v = visit.node;
        let children = tree.children(v);
        match tree.spot(v).kind {
            Kind::Terminal { .. } => {}
            Kind::Chance { .. } => {
                let probs = children
                    .iter()
                    .map(|&(a, _)| tree.chance_prob(v, a))
                    .collect::<Vec<_>>();
                let pick = draw(&probs, rng)?;
                let mut down = visit.reach.clone();
                down[CHANCE] *= probs[pick];
                stack.push(Visit {
                    node: children[pick].1,
                    reach: down,
                });
            }
            Kind::Decision { player } if player == traverser => {
                let policy = policy(tree, storage, strategies, v, player).clone();
                for &(action, child) in children.iter().rev() {
                    let mut down = visit.reach.clone();
                    down[player] *= policy.get(action);
                    stack.push(Visit {
                        node: child,
                        reach: down,
                    });
                }
            }
            Kind::Decision { player } => {
                let policy = policy(tree, storage, strategies, v, player);
                let pick = draw(policy.as_slice(), rng)?;
                let mut down = visit.reach.clone();
                down[player] *= policy.get(pick);
                stack.push(Visit {
                    node: children[pick].1,
                    reach: down,
                });
            }
        }
        visits.push(visit);
    }
    Ok(visits)
}
