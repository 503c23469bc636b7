use crate::*;
use anyhow::Result;

/// Outcome-sampling Monte Carlo CFR.
///
/// One trajectory per player per iteration, sampled from an exploration
/// behavior that mixes a fixed base profile into the current strategy at
/// rate `delta`. Counterfactual values are importance-corrected by the
/// sampling reach, so only the visited path pays for the update.
///
/// The base profile is either the current strategy at attach time (uniform)
/// or, with `balanced`, proportional to subtree size, which spreads
/// trajectories toward large subtrees.
pub struct OutcomeMccfr {
    graph: Graph,
    strategy: Signal,
    previous: Signal,
    explore: Signal,
}

impl OutcomeMccfr {
    pub fn new(delta: Probability, plus: bool, balanced: bool) -> Result<Self> {
        let mut g = Graph::new();
        g.forward(true);
        let expectation = g.constant(Width::Scalar, 0.0);
        let strategy = g.constant(Width::Actions, 0.0);
        g.update(strategy, 1.0 / g.action_set_size())?;
        let previous = g.constant(Width::Actions, 0.0);
        g.update(previous, Expr::from(strategy))?;
        let realization = g.constant(Width::Actions, 0.0);
        g.update(realization, Expr::from(strategy))?;
        let reach = g.define(Expr::aggregate(
            realization,
            Reducer::Sum,
            Relation::Parent,
            PlayerFilter::Own,
            1.0,
        ))?;
        g.update(realization, Expr::from(reach) * strategy)?;
        let base = g.constant(Width::Actions, 0.0);
        match balanced {
            true => g.update(base, g.subtree_size().normalize(1.0, true))?,
            false => g.update(base, Expr::from(strategy))?,
        }
        let explore = g.constant(Width::Actions, 0.0);
        g.update(explore, Expr::from(base))?;
        let base_form = g.constant(Width::Actions, 0.0);
        g.update(base_form, Expr::from(base))?;
        let base_reach = g.define(Expr::aggregate(
            base_form,
            Reducer::Sum,
            Relation::Parent,
            PlayerFilter::Own,
            1.0,
        ))?;
        g.update(base_form, Expr::from(base_reach) * base)?;
        let regrets = g.constant(Width::Actions, 0.0);

        g.backward(false);
        let counterfactual = g.define(
            Expr::aggregate(
                expectation,
                Reducer::Sum,
                Relation::Children,
                PlayerFilter::Own,
                0.0,
            ) + g.utility() / (g.reach_prob() * explore),
        )?;
        g.update(expectation, Expr::from(counterfactual).dot(strategy))?;
        g.update(
            regrets,
            Expr::from(regrets) + Expr::from(counterfactual) - expectation,
        )?;
        g.update(previous, Expr::from(strategy))?;
        g.update(strategy, Expr::from(regrets).normalize(1.0, true))?;
        if plus {
            g.update(regrets, Expr::from(regrets).maximum(0.0))?;
        }

        g.forward(false);
        g.update(
            reach,
            Expr::aggregate(
                realization,
                Reducer::Sum,
                Relation::Parent,
                PlayerFilter::Own,
                1.0,
            ),
        )?;
        g.update(realization, Expr::from(reach) * strategy)?;
        g.update(
            explore,
            (Expr::from(base_form) * delta + Expr::from(realization) * (1.0 - delta))
                .normalize(1.0, false),
        )?;
        Ok(Self {
            graph: g,
            strategy,
            previous,
            explore,
        })
    }
}

impl Algorithm for OutcomeMccfr {
    fn graph(&self) -> Graph {
        self.graph.clone()
    }
    fn strategy(&self) -> Signal {
        self.strategy
    }
    fn convergence(&self) -> IterateKind {
        IterateKind::Avg
    }
    /// Alternating per-player updates. The updating player samples from its
    /// exploration behavior; players already updated this iteration expose
    /// their pre-update strategy so every traversal faces the same profile.
    fn update(&self, env: &mut Environment) -> Result<()> {
        let players = env.tree().players();
        for player in 1..=players {
            let behaviors = (1..=players)
                .map(|q| match q {
                    q if q == player => self.explore,
                    q if q < player => self.previous,
                    _ => self.strategy,
                })
                .collect::<Vec<_>>();
            env.update(&behaviors, Some(&[player]), None)?;
        }
        Ok(())
    }
}
