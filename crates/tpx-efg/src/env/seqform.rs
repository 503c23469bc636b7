use crate::*;
use anyhow::{ensure, Result};

/// Which iterate of a strategy signal to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterateKind {
    /// The live signal, read directly from storage.
    Current,
    /// The most recently pushed iterate.
    Last,
    /// Uniform average of all pushed iterates.
    Avg,
    /// Linearly weighted average (iterate `t` weighted `t + 1`).
    LinearAvg,
    /// The pushed iterate with the lowest measured exploitability.
    Best,
}

/// Per-player sequence-form layout plus the exhaustive gradient passes
/// used for exploitability. Sequences of one player are laid out
/// contiguously; `(infoset, action)` maps to `offsets[infoset] + action`.
#[derive(Debug)]
pub(crate) struct SequenceForm {
    offsets: Vec<usize>,
    counts: Vec<usize>,
    chance: Vec<Probability>,
}

impl SequenceForm {
    pub fn new(tree: &GameTree) -> Self {
        let mut offsets = vec![0; tree.infosets().len()];
        let mut counts = vec![0; tree.players()];
        for &i in tree.order() {
            let infoset = tree.infoset(i);
            offsets[i] = counts[infoset.player - 1];
            counts[infoset.player - 1] += infoset.actions;
        }
        let mut chance = vec![1.0; tree.bfs().len()];
        for &v in tree.bfs() {
            let reach = chance[v.index()];
            for (action, child) in tree.children(v) {
                chance[child.index()] = reach
                    * match tree.spot(v).kind {
                        Kind::Chance { .. } => tree.chance_prob(v, action),
                        _ => 1.0,
                    };
            }
        }
        Self {
            offsets,
            counts,
            chance,
        }
    }

    pub fn index(&self, (infoset, action): Sequence) -> usize {
        self.offsets[infoset] + action
    }
    pub fn count(&self, player: Player) -> usize {
        self.counts[player - 1]
    }

    /// Realization plan of a behavioral policy:
    /// `plan[seq(I, a)] = policy(I)[a] * plan[parent(I)]`, root reach 1.
    pub fn realization(
        &self,
        tree: &GameTree,
        player: Player,
        policy: &dyn Fn(InfosetId) -> Vector,
    ) -> Vec<Utility> {
        let mut plan = vec![0.0; self.count(player)];
        for &i in tree.order() {
            let infoset = tree.infoset(i);
            if infoset.player != player {
                continue;
            }
            let reach = match infoset.parent {
                None => 1.0,
                Some(seq) => plan[self.index(seq)],
            };
            let pi = policy(i);
            for a in 0..infoset.actions {
                plan[self.offsets[i] + a] = pi.get(a) * reach;
            }
        }
        plan
    }

    /// Counterfactual gradient over the full tree: each terminal deposits
    /// its payoff, weighted by chance and everyone else's realization, at
    /// the player's last sequence above it.
    pub fn gradient(&self, tree: &GameTree, player: Player, plans: &[Vec<Utility>]) -> Vec<Utility> {
        let mut gradient = vec![0.0; self.count(player)];
        for &v in tree.bfs() {
            if !tree.spot(v).is_terminal() {
                continue;
            }
            let mut weight = self.chance[v.index()];
            for q in 1..=tree.players() {
                if q != player {
                    weight *= plans[q - 1][self.index(tree.sequence(v, q))];
                }
            }
            gradient[self.index(tree.sequence(v, player))] += tree.spot(v).payoff(player) * weight;
        }
        gradient
    }

    /// Best-response value against a fixed gradient by backward max over
    /// counterfactual values.
    pub fn best_response(&self, tree: &GameTree, player: Player, gradient: &[Utility]) -> Utility {
        let mut values = vec![0.0; tree.infosets().len()];
        for &i in tree.order().iter().rev() {
            let infoset = tree.infoset(i);
            if infoset.player != player {
                continue;
            }
            let mut best = -INF;
            for a in 0..infoset.actions {
                let mut value = gradient[self.offsets[i] + a];
                for child in infoset.descend(tree, a) {
                    value += values[child];
                }
                best = best.max(value);
            }
            values[i] = best;
        }
        values[tree.root_infoset(player)]
    }
}

/// Running iterates of one player's pushed sequence-form strategies.
#[derive(Debug)]
pub(crate) struct IterateHistory {
    t: usize,
    last: Vec<Utility>,
    avg: Vec<Utility>,
    linear: Vec<Utility>,
    best: Vec<Utility>,
    best_score: Energy,
}

impl IterateHistory {
    pub fn new(sequences: usize) -> Self {
        Self {
            t: 0,
            last: vec![0.0; sequences],
            avg: vec![0.0; sequences],
            linear: vec![0.0; sequences],
            best: vec![0.0; sequences],
            best_score: INF,
        }
    }

    pub fn push(&mut self, plan: &[Utility]) {
        let t = self.t as Utility;
        for (i, &s) in plan.iter().enumerate() {
            self.avg[i] = self.avg[i] * t / (t + 1.0) + s / (t + 1.0);
            self.linear[i] = self.linear[i] * t / (t + 2.0) + 2.0 * s / (t + 2.0);
        }
        self.last.copy_from_slice(plan);
        self.t += 1;
    }

    /// Strictly lower scores replace the best iterate; ties keep the
    /// first minimum.
    pub fn record_best(&mut self, plan: &[Utility], score: Energy) {
        if score < self.best_score {
            self.best_score = score;
            self.best.copy_from_slice(plan);
        }
    }

    pub fn plan(&self, kind: IterateKind) -> Result<&[Utility]> {
        ensure!(self.t > 0, "no strategy iterates pushed yet");
        Ok(match kind {
            IterateKind::Last => &self.last,
            IterateKind::Avg => &self.avg,
            IterateKind::LinearAvg => &self.linear,
            IterateKind::Best => {
                ensure!(
                    self.best_score < INF,
                    "best iterate was never recorded; push with update_best"
                );
                &self.best
            }
            IterateKind::Current => unreachable!("live iterates never reach the history"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PENNIES: &str = "
        node r player 1 actions rh rt
        node rh player 2 actions rhh rht
        node rt player 2 actions rth rtt
        node rhh leaf payoffs 1=1 2=-1
        node rht leaf payoffs 1=-1 2=1
        node rth leaf payoffs 1=-1 2=1
        node rtt leaf payoffs 1=1 2=-1
        infoset rh nodes rt
    ";

    fn uniform(tree: &GameTree) -> impl Fn(InfosetId) -> Vector + '_ {
        |i| {
            let n = tree.infoset(i).actions;
            Vector::fill(n, 1.0 / n as Utility)
        }
    }

    #[test]
    fn realization_multiplies_down_sequences() {
        let tree = GameTree::from_text(PENNIES).unwrap();
        let sf = SequenceForm::new(&tree);
        let plan = sf.realization(&tree, 1, &uniform(&tree));
        // root sequence plus one infoset with two actions
        assert_eq!(plan.len(), 3);
        let flip = tree.membership(tree.lookup("r").unwrap()).unwrap();
        assert_eq!(plan[sf.index((tree.root_infoset(1), 0))], 1.0);
        assert_eq!(plan[sf.index((flip, 0))], 0.5);
        assert_eq!(plan[sf.index((flip, 1))], 0.5);
    }

    #[test]
    fn uniform_pennies_is_an_equilibrium() {
        let tree = GameTree::from_text(PENNIES).unwrap();
        let sf = SequenceForm::new(&tree);
        let plans = vec![
            sf.realization(&tree, 1, &uniform(&tree)),
            sf.realization(&tree, 2, &uniform(&tree)),
        ];
        for p in 1..=2 {
            let gradient = sf.gradient(&tree, p, &plans);
            let value = plans[p - 1]
                .iter()
                .zip(gradient.iter())
                .map(|(a, b)| a * b)
                .sum::<Utility>();
            let br = sf.best_response(&tree, p, &gradient);
            assert!((value - 0.0).abs() < 1e-12);
            assert!((br - value).abs() < 1e-12);
        }
    }

    #[test]
    fn biased_opponents_are_exploitable() {
        let tree = GameTree::from_text(PENNIES).unwrap();
        let sf = SequenceForm::new(&tree);
        let guess = tree.membership(tree.lookup("rh").unwrap()).unwrap();
        let biased = |i: InfosetId| {
            if i == guess {
                Vector::from(vec![0.75, 0.25])
            } else {
                let n = tree.infoset(i).actions;
                Vector::fill(n, 1.0 / n as Utility)
            }
        };
        let plans = vec![
            sf.realization(&tree, 1, &uniform(&tree)),
            sf.realization(&tree, 2, &biased),
        ];
        let gradient = sf.gradient(&tree, 1, &plans);
        let br = sf.best_response(&tree, 1, &gradient);
        let value = plans[0]
            .iter()
            .zip(gradient.iter())
            .map(|(a, b)| a * b)
            .sum::<Utility>();
        // matching heads exploits the head-heavy guesser
        assert!((br - 0.5).abs() < 1e-12);
        assert!((value - 0.0).abs() < 1e-12);
    }

    #[test]
    fn averages_weight_iterates_correctly() {
        let mut history = IterateHistory::new(1);
        history.push(&[1.0]);
        history.push(&[4.0]);
        history.push(&[1.0]);
        assert_eq!(history.plan(IterateKind::Last).unwrap(), &[1.0]);
        assert!((history.plan(IterateKind::Avg).unwrap()[0] - 2.0).abs() < 1e-12);
        // weights 1:2:3 over pushes
        let linear = (1.0 + 8.0 + 3.0) / 6.0;
        assert!((history.plan(IterateKind::LinearAvg).unwrap()[0] - linear).abs() < 1e-12);
    }

    #[test]
    fn best_iterate_keeps_the_first_minimum() {
        let mut history = IterateHistory::new(1);
        history.push(&[1.0]);
        history.record_best(&[1.0], 0.5);
        history.record_best(&[2.0], 0.5);
        assert_eq!(history.plan(IterateKind::Best).unwrap(), &[1.0]);
        history.record_best(&[3.0], 0.25);
        assert_eq!(history.plan(IterateKind::Best).unwrap(), &[3.0]);
    }

    #[test]
    fn history_kinds_require_pushes() {
        let history = IterateHistory::new(2);
        assert!(history.plan(IterateKind::Avg).is_err());
    }
}
