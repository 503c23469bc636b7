use crate::*;
use anyhow::{ensure, Context, Result};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::HashMap;

/// The engine: owns the tree, the compiled schedule, and all signal
/// storage. Algorithms drive it through [`Environment::update`] and read
/// results back through the strategy accessors.
///
/// Everything is synchronous and single-threaded; an `update` call
/// completes fully before returning, so iteration boundaries are the only
/// stopping points.
#[derive(Debug)]
pub struct Environment {
    tree: GameTree,
    traverse: Traverse,
    seqform: SequenceForm,
    attachment: Option<Attachment>,
    histories: HashMap<(Player, Signal), IterateHistory>,
    rng: SmallRng,
}

#[derive(Debug)]
struct Attachment {
    schedule: Schedule,
    storage: Storage,
}

impl Environment {
    pub fn from_tree(tree: GameTree, traverse: Traverse) -> Self {
        let seqform = SequenceForm::new(&tree);
        Self {
            tree,
            traverse,
            seqform,
            attachment: None,
            histories: HashMap::new(),
            rng: SmallRng::from_os_rng(),
        }
    }
    pub fn from_text(text: &str, traverse: Traverse) -> Result<Self> {
        Ok(Self::from_tree(GameTree::from_text(text)?, traverse))
    }
    pub fn from_file(path: &str, traverse: Traverse) -> Result<Self> {
        Ok(Self::from_tree(GameTree::from_file(path)?, traverse))
    }

    pub fn tree(&self) -> &GameTree {
        &self.tree
    }
    /// Reseed the sampling RNG for reproducible runs.
    pub fn seed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    /// Compile and register a computation graph, replacing any previous
    /// one: allocate storage, fill the structural builtins, and run the
    /// static stages once over every infoset.
    pub fn attach(&mut self, graph: Graph) -> Result<()> {
        let schedule = Schedule::compile(graph)?;
        let mut storage = Storage::new(&self.tree, schedule.widths());
        for (i, infoset) in self.tree.infosets().iter().enumerate() {
            storage.put(i, ACTION_SET_SIZE, Vector::scalar(infoset.actions as Utility));
            storage.put(i, SUBTREE_SIZE, Vector::from(infoset.subtree.clone()));
        }
        schedule.run_static(&self.tree, &mut storage);
        self.attachment = Some(Attachment { schedule, storage });
        self.histories.clear();
        Ok(())
    }

    /// One training iteration: traverse, fill the per-infoset context,
    /// and run the dynamic passes of the selected colors over the visited
    /// infosets of the selected players (`None` means every player).
    ///
    /// `strategies` holds one action-wide signal per player, or a single
    /// signal broadcast to all.
    pub fn update(
        &mut self,
        strategies: &[Signal],
        players: Option<&[Player]>,
        colors: Option<&[usize]>,
    ) -> Result<()> {
        let strategies = self.resolve(strategies)?;
        let players = self.roster(players)?;
        let attachment = self.attachment.as_mut().context("no graph attached")?;
        let Attachment { schedule, storage } = attachment;
        let mask = schedule.mask(colors)?;
        match self.traverse {
            Traverse::Enumerate => {
                let visits = traverse::enumerated(&self.tree, storage, &strategies);
                let visited = contextualize(&self.tree, storage, &visits, &players, true);
                schedule.run_dynamic(&self.tree, storage, &visited, &mask);
            }
            Traverse::External => {
                for &player in &players {
                    let visits =
                        traverse::external(&self.tree, storage, &strategies, player, &mut self.rng)?;
                    let visited = contextualize(&self.tree, storage, &visits, &[player], false);
                    schedule.run_dynamic(&self.tree, storage, &visited, &mask);
                }
            }
            Traverse::Outcome => {
                let visits = traverse::sampled(&self.tree, storage, &strategies, &mut self.rng)?;
                let visited = contextualize(&self.tree, storage, &visits, &players, false);
                schedule.run_dynamic(&self.tree, storage, &visited, &mask);
            }
        }
        Ok(())
    }

    /// Push the current behavioral strategies into sequence-form history:
    /// last, uniform average, linear average, and (with `update_best`)
    /// the exploitability-best iterate.
    pub fn update_strategy(&mut self, strategies: &[Signal], update_best: bool) -> Result<()> {
        let strategies = self.resolve(strategies)?;
        let plans = (1..=self.tree.players())
            .map(|p| self.live_plan(p, strategies[p - 1]))
            .collect::<Result<Vec<_>>>()?;
        let score = match update_best {
            true => Some(self.score(&plans)),
            false => None,
        };
        for p in 1..=self.tree.players() {
            let history = self
                .histories
                .entry((p, strategies[p - 1]))
                .or_insert_with(|| IterateHistory::new(self.seqform.count(p)));
            history.push(&plans[p - 1]);
            if let Some(score) = score {
                history.record_best(&plans[p - 1], score);
            }
        }
        Ok(())
    }

    /// Per-player exploitability of the requested iterate: best-response
    /// value minus achieved value, over the full tree regardless of the
    /// training traversal.
    pub fn exploitability(
        &self,
        strategies: &[Signal],
        kind: IterateKind,
    ) -> Result<Vec<Utility>> {
        let plans = self.plans(strategies, kind)?;
        Ok((1..=self.tree.players())
            .map(|p| {
                let gradient = self.seqform.gradient(&self.tree, p, &plans);
                let value = dot(&plans[p - 1], &gradient);
                self.seqform.best_response(&self.tree, p, &gradient) - value
            })
            .collect())
    }

    /// Expected value per player of the requested iterate.
    pub fn utility(&self, strategies: &[Signal], kind: IterateKind) -> Result<Vec<Utility>> {
        let plans = self.plans(strategies, kind)?;
        Ok((1..=self.tree.players())
            .map(|p| dot(&plans[p - 1], &self.seqform.gradient(&self.tree, p, &plans)))
            .collect())
    }

    /// A player's behavioral strategy by infoset label, normalized from
    /// the requested sequence-form iterate. Uniform where the iterate's
    /// mass vanishes; synthetic root infosets are excluded.
    pub fn strategy(
        &self,
        player: Player,
        signal: Signal,
        kind: IterateKind,
    ) -> Result<HashMap<String, Vec<Probability>>> {
        ensure!(
            player >= 1 && player <= self.tree.players(),
            "player {} out of range",
            player
        );
        let plan = match kind {
            IterateKind::Current => self.live_plan(player, signal)?,
            _ => self.history(player, signal)?.plan(kind)?.to_vec(),
        };
        let mut out = HashMap::new();
        for (i, infoset) in self.tree.infosets().iter().enumerate() {
            if infoset.player != player || self.tree.is_root_infoset(i) {
                continue;
            }
            let weights = (0..infoset.actions)
                .map(|a| plan[self.seqform.index((i, a))])
                .collect::<Vec<_>>();
            let mass = weights.iter().sum::<Utility>();
            let policy = match mass < EPS {
                true => vec![1.0 / infoset.actions as Probability; infoset.actions],
                false => weights.iter().map(|w| w / mass).collect(),
            };
            out.insert(infoset.label.clone(), policy);
        }
        Ok(out)
    }

    /// Raw per-infoset values of any signal, by label. Debug surface;
    /// synthetic root infosets are excluded.
    pub fn values(&self, player: Player, signal: Signal) -> Result<HashMap<String, Vec<Utility>>> {
        let attachment = self.attachment.as_ref().context("no graph attached")?;
        ensure!(
            signal.index() < attachment.schedule.widths().len(),
            "signal was not declared by the attached graph"
        );
        Ok(self
            .tree
            .infosets()
            .iter()
            .enumerate()
            .filter(|(i, infoset)| infoset.player == player && !self.tree.is_root_infoset(*i))
            .map(|(i, infoset)| {
                let value = attachment.storage.get(i, signal);
                (infoset.label.clone(), value.as_slice().to_vec())
            })
            .collect())
    }

    // resolution helpers

    fn resolve(&self, strategies: &[Signal]) -> Result<Vec<Signal>> {
        let attachment = self.attachment.as_ref().context("no graph attached")?;
        let n = self.tree.players();
        ensure!(
            strategies.len() == 1 || strategies.len() == n,
            "expected 1 or {} strategy signals, got {}",
            n,
            strategies.len()
        );
        let resolved = (1..=n)
            .map(|p| strategies[if strategies.len() == 1 { 0 } else { p - 1 }])
            .collect::<Vec<_>>();
        for &signal in &resolved {
            ensure!(
                signal.index() < attachment.schedule.widths().len(),
                "signal was not declared by the attached graph"
            );
            ensure!(
                attachment.schedule.widths()[signal.index()] == Width::Actions,
                "strategy signals must be action-wide"
            );
        }
        Ok(resolved)
    }

    fn roster(&self, players: Option<&[Player]>) -> Result<Vec<Player>> {
        match players {
            None => Ok((1..=self.tree.players()).collect()),
            Some(players) => {
                for &p in players {
                    ensure!(
                        p >= 1 && p <= self.tree.players(),
                        "player {} out of range",
                        p
                    );
                }
                Ok(players.to_vec())
            }
        }
    }

    fn history(&self, player: Player, signal: Signal) -> Result<&IterateHistory> {
        self.histories.get(&(player, signal)).context(
            "no iterate history for this signal; call update_strategy with it first",
        )
    }

    /// Realize the live signal into a sequence-form plan, validating that
    /// the signal is a declared action-wide one and that every infoset
    /// holds a distribution.
    fn live_plan(&self, player: Player, signal: Signal) -> Result<Vec<Utility>> {
        let attachment = self.attachment.as_ref().context("no graph attached")?;
        ensure!(
            signal.index() < attachment.schedule.widths().len(),
            "signal was not declared by the attached graph"
        );
        ensure!(
            attachment.schedule.widths()[signal.index()] == Width::Actions,
            "strategy signals must be action-wide"
        );
        for (i, infoset) in self.tree.infosets().iter().enumerate() {
            if infoset.player != player {
                continue;
            }
            let value = attachment.storage.get(i, signal);
            ensure!(
                value.iter().all(|v| v >= -EPS) && (value.sum() - 1.0).abs() <= CHANCE_TOLERANCE,
                "strategy signal at infoset '{}' is not a probability distribution",
                infoset.label
            );
        }
        Ok(self
            .seqform
            .realization(&self.tree, player, &|i| {
                attachment.storage.get(i, signal).clone()
            }))
    }

    fn plans(&self, strategies: &[Signal], kind: IterateKind) -> Result<Vec<Vec<Utility>>> {
        let strategies = self.resolve(strategies)?;
        (1..=self.tree.players())
            .map(|p| match kind {
                IterateKind::Current => self.live_plan(p, strategies[p - 1]),
                _ => Ok(self.history(p, strategies[p - 1])?.plan(kind)?.to_vec()),
            })
            .collect()
    }

    /// Summed exploitability of a full plan profile.
    fn score(&self, plans: &[Vec<Utility>]) -> Energy {
        (1..=self.tree.players())
            .map(|p| {
                let gradient = self.seqform.gradient(&self.tree, p, plans);
                self.seqform.best_response(&self.tree, p, &gradient) - dot(&plans[p - 1], &gradient)
            })
            .sum()
    }
}

fn dot(a: &[Utility], b: &[Utility]) -> Utility {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Fill the transient traversal context for the given players and return
/// the visited infosets in forward (parents first) order.
///
/// Per visited infoset: `reach_prob` is the owner's reach at the first
/// visited member, `opponent_reach_prob` accumulates everyone else's
/// reach over visited members, and each visited terminal deposits its
/// payoff at the player's last sequence above it, weighted by the exact
/// counterfactual reach under enumeration and left unweighted when
/// sampled. Infosets that are not visited keep stale context and receive
/// no dynamic update.
fn contextualize(
    tree: &GameTree,
    storage: &mut Storage,
    visits: &[Visit],
    players: &[Player],
    exact: bool,
) -> Vec<InfosetId> {
    let mut visited = Vec::new();
    let mut seen = vec![false; tree.infosets().len()];
    for &p in players {
        let root = tree.root_infoset(p);
        seen[root] = true;
        visited.push(root);
        storage.get_mut(root, UTILITY).reset(0.0);
        storage.get_mut(root, REACH_PROB).reset(1.0);
        storage.get_mut(root, OPPONENT_REACH_PROB).reset(1.0);
    }
    for visit in visits {
        match tree.spot(visit.node).kind {
            Kind::Decision { player } if players.contains(&player) => {
                let i = tree.membership(visit.node).expect("partitioned");
                if !seen[i] {
                    seen[i] = true;
                    visited.push(i);
                    storage.get_mut(i, UTILITY).reset(0.0);
                    storage.get_mut(i, OPPONENT_REACH_PROB).reset(0.0);
                    storage
                        .get_mut(i, REACH_PROB)
                        .reset(visit.reach[player]);
                }
                let counterfactual = counterfactual(&visit.reach, player);
                let opponent = storage.get_mut(i, OPPONENT_REACH_PROB);
                opponent.set(0, opponent.get(0) + counterfactual);
            }
            Kind::Terminal { .. } => {
                for &p in players {
                    let (i, a) = tree.sequence(visit.node, p);
                    let weight = match exact {
                        true => counterfactual(&visit.reach, p),
                        false => 1.0,
                    };
                    let utility = storage.get_mut(i, UTILITY);
                    utility.set(a, utility.get(a) + tree.spot(visit.node).payoff(p) * weight);
                }
            }
            _ => {}
        }
    }
    visited
}

/// Everyone's reach but the player's own, chance included.
fn counterfactual(reach: &[Probability], player: Player) -> Probability {
    reach
        .iter()
        .enumerate()
        .filter(|&(q, _)| q != player)
        .map(|(_, r)| r)
        .product()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEIGHTED: &str = "
        node r chance actions c1=0.4 c2=0.6
        node c1 player 1 actions l1 l2
        node c2 player 1 actions l3 l4
        node l1 leaf payoffs 1=1
        node l2 leaf payoffs 1=2
        node l3 leaf payoffs 1=3
        node l4 leaf payoffs 1=4
        infoset c1 nodes c2
    ";

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

    fn uniform_graph() -> (Graph, Signal) {
        let mut g = Graph::new();
        g.backward(true);
        let ones = g.constant(Width::Actions, 1.0);
        let strategy = g.define(Expr::from(ones).normalize(1.0, true)).unwrap();
        (g, strategy)
    }

    #[test]
    fn enumerate_fills_exact_context() {
        let mut env = Environment::from_text(WEIGHTED, Traverse::Enumerate).unwrap();
        let (g, strategy) = uniform_graph();
        env.attach(g).unwrap();
        env.update(&[strategy], None, None).unwrap();
        let utility = env.values(1, UTILITY).unwrap();
        let expected = vec![1.0 * 0.4 + 3.0 * 0.6, 2.0 * 0.4 + 4.0 * 0.6];
        for (got, want) in utility["c1"].iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-12);
        }
        let opponent = env.values(1, OPPONENT_REACH_PROB).unwrap();
        assert!((opponent["c1"][0] - 1.0).abs() < 1e-12);
        let reach = env.values(1, REACH_PROB).unwrap();
        assert!((reach["c1"][0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn enumerate_is_deterministic() {
        let mut env = Environment::from_text(PENNIES, Traverse::Enumerate).unwrap();
        let (g, strategy) = uniform_graph();
        env.attach(g).unwrap();
        env.update(&[strategy], None, None).unwrap();
        let first = env.values(2, UTILITY).unwrap();
        env.update(&[strategy], None, None).unwrap();
        let second = env.values(2, UTILITY).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn player_filter_restricts_updates() {
        let mut env = Environment::from_text(PENNIES, Traverse::Enumerate).unwrap();
        let mut g = Graph::new();
        g.backward(true);
        let ones = g.constant(Width::Actions, 1.0);
        let strategy = g.define(Expr::from(ones).normalize(1.0, true)).unwrap();
        let hits = g.constant(Width::Scalar, 0.0);
        g.backward(false);
        g.update(hits, Expr::from(hits) + 1.0).unwrap();
        env.attach(g).unwrap();
        env.update(&[strategy], Some(&[1]), None).unwrap();
        assert_eq!(env.values(1, hits).unwrap()["r"], vec![1.0]);
        assert_eq!(env.values(2, hits).unwrap()["rh"], vec![0.0]);
    }

    #[test]
    fn outcome_sampling_is_unbiased() {
        let tree = "
            node r chance actions a=0.5 b=0.5
            node a player 1 actions a1 a2
            node b player 1 actions b1 b2
            node a1 player 2 actions t1 t2
            node a2 player 2 actions t3 t4
            node b1 player 2 actions t5 t6
            node b2 player 2 actions t7 t8
            node t1 leaf payoffs 1=1 2=-1
            node t2 leaf payoffs 1=-2 2=2
            node t3 leaf payoffs 1=3 2=-3
            node t4 leaf payoffs 1=-4 2=4
            node t5 leaf payoffs 1=5 2=-5
            node t6 leaf payoffs 1=-6 2=6
            node t7 leaf payoffs 1=7 2=-7
            node t8 leaf payoffs 1=-8 2=8
            infoset a nodes b
            infoset a1 nodes a2 b1 b2
        ";
        let exact = {
            let mut env = Environment::from_text(tree, Traverse::Enumerate).unwrap();
            let (g, strategy) = uniform_graph();
            env.attach(g).unwrap();
            env.update(&[strategy], None, None).unwrap();
            env.values(1, UTILITY).unwrap()
        };
        let mut env = Environment::from_text(tree, Traverse::Outcome).unwrap();
        env.seed(42);
        let (mut g, strategy) = uniform_graph();
        g.backward(true);
        let acc = g.constant(Width::Actions, 0.0);
        g.backward(false);
        g.update(acc, Expr::from(acc) + g.utility()).unwrap();
        env.attach(g).unwrap();
        let iterations = 200_000;
        for _ in 0..iterations {
            env.update(&[strategy], None, None).unwrap();
        }
        let sampled = env.values(1, acc).unwrap();
        // a sampled deposit of payoff * 1 occurs with the trajectory's full
        // probability, so the mean estimate carries the player's own reach
        for (a, (&got, &want)) in sampled["a"].iter().zip(exact["a"].iter()).enumerate() {
            let mean = got / iterations as Utility;
            let own = 0.5;
            assert!(
                (mean - want * own).abs() < 0.02,
                "action {}: {} vs {}",
                a,
                mean,
                want * own
            );
        }
    }

    #[test]
    fn exploitability_and_strategy_surface() {
        let mut env = Environment::from_text(PENNIES, Traverse::Enumerate).unwrap();
        let (g, strategy) = uniform_graph();
        env.attach(g).unwrap();
        let exp = env
            .exploitability(&[strategy], IterateKind::Current)
            .unwrap();
        assert!(exp.iter().all(|e| e.abs() < 1e-12));
        // histories exist only after update_strategy
        assert!(env.exploitability(&[strategy], IterateKind::Avg).is_err());
        env.update_strategy(&[strategy], true).unwrap();
        let exp = env.exploitability(&[strategy], IterateKind::Best).unwrap();
        assert!(exp.iter().all(|e| e.abs() < 1e-12));
        let strat = env.strategy(1, strategy, IterateKind::Avg).unwrap();
        assert_eq!(strat["r"], vec![0.5, 0.5]);
        assert!(!strat.contains_key("~root:1"));
    }

    #[test]
    fn misuse_is_rejected() {
        let mut env = Environment::from_text(PENNIES, Traverse::Enumerate).unwrap();
        let (mut g, strategy) = uniform_graph();
        g.backward(true);
        let scalar = g.constant(Width::Scalar, 1.0);
        env.attach(g).unwrap();
        assert!(env.update(&[scalar], None, None).is_err());
        assert!(env.update(&[strategy], Some(&[9]), None).is_err());
        assert!(env.update(&[strategy], None, Some(&[5])).is_err());
        assert!(env.strategy(1, scalar, IterateKind::Current).is_err());
        assert!(env.strategy(9, strategy, IterateKind::Current).is_err());
        assert!(env.update_strategy(&[scalar], false).is_err());
    }

    #[test]
    fn color_masks_select_dynamic_steps() {
        let mut env = Environment::from_text(PENNIES, Traverse::Enumerate).unwrap();
        let mut g = Graph::new();
        g.backward(true);
        let ones = g.constant(Width::Actions, 1.0);
        let strategy = g.define(Expr::from(ones).normalize(1.0, true)).unwrap();
        let red = g.constant(Width::Scalar, 0.0);
        let blue = g.constant(Width::Scalar, 0.0);
        g.backward(false);
        g.color(1);
        g.update(red, Expr::from(red) + 1.0).unwrap();
        g.color(2);
        g.update(blue, Expr::from(blue) + 1.0).unwrap();
        env.attach(g).unwrap();
        env.update(&[strategy], None, Some(&[1])).unwrap();
        assert_eq!(env.values(1, red).unwrap()["r"], vec![1.0]);
        assert_eq!(env.values(1, blue).unwrap()["r"], vec![0.0]);
        env.update(&[strategy], None, None).unwrap();
        assert_eq!(env.values(1, red).unwrap()["r"], vec![2.0]);
        assert_eq!(env.values(1, blue).unwrap()["r"], vec![1.0]);
    }
}
