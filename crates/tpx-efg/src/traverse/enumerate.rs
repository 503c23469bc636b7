use super::*;
use crate::*;

/// Visit every node once, in BFS order, with exact reach products under
/// the given strategy signals. Zero variance: identical signal state
/// yields an identical visit sequence.
pub(crate) fn enumerated(tree: &GameTree, storage: &Storage, strategies: &[Signal]) -> Vec<Visit> {
    let mut reaches = vec![Vec::new(); tree.bfs().len()];
    reaches[tree.root().index()] = vec![1.0; tree.players() + 1];
    let mut visits = Vec::with_capacity(tree.bfs().len());
    for &v in tree.bfs() {
        let reach = reaches[v.index()].clone();
        for (action, child) in tree.children(v) {
            let mut down = reach.clone();
            match tree.spot(v).kind {
                Kind::Chance { .. } => down[CHANCE] *= tree.chance_prob(v, action),
                Kind::Decision { player } => {
                    down[player] *= policy(tree, storage, strategies, v, player).get(action)
                }
                Kind::Terminal { .. } => unreachable!("terminals have no children"),
            }
            reaches[child.index()] = down;
        }
        visits.push(Visit { node: v, reach });
    }
    visits
}
