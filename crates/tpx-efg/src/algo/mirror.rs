use crate::*;
use anyhow::Result;

/// Magnetic mirror descent over the treeplex.
///
/// Last-iterate method: each backward pass takes a mirror step on the
/// counterfactual gradient, scaled by the opponents' reach, then projects
/// back toward a magnet distribution proportional to subtree size. The
/// entropic variant steps in log space with a max-shift before
/// exponentiation to keep the exponentials bounded.
///
/// `eta` is the step size, `tau` the strength of the regularization the
/// last iterate converges to, and `gamma` the projection floor.
pub struct MirrorDescent {
    graph: Graph,
    strategy: Signal,
}

impl MirrorDescent {
    pub fn new(eta: Energy, tau: Energy, gamma: Probability, distance: Distance) -> Result<Self> {
        let mut g = Graph::new();
        g.backward(true);
        let expectation = g.constant(Width::Scalar, 0.0);
        let magnet = g.define(g.subtree_size().normalize(1.0, true))?;
        let strategy = g.constant(Width::Actions, 0.0);
        g.update(strategy, 1.0 / g.action_set_size())?;

        g.backward(false);
        let anneal = eta * tau + 1.0;
        let gradient = g.define(
            Expr::aggregate(
                expectation,
                Reducer::Sum,
                Relation::Children,
                PlayerFilter::Own,
                0.0,
            ) + g.utility(),
        )?;
        g.update(expectation, Expr::from(gradient).dot(strategy))?;
        let step = Expr::from(gradient) / (g.opponent_reach_prob() / eta);
        match distance {
            Distance::KL => {
                g.update(strategy, (Expr::from(strategy).log() + step) / anneal)?;
                g.update(strategy, Expr::from(strategy) - Expr::from(strategy).max())?;
                g.update(strategy, Expr::from(strategy).exp())?;
            }
            Distance::L2 => {
                g.update(strategy, (Expr::from(strategy) + step) / anneal)?;
            }
        }
        g.update(
            strategy,
            Expr::from(strategy).project(distance, gamma, Some(Expr::from(magnet))),
        )?;
        Ok(Self { graph: g, strategy })
    }
}

impl Algorithm for MirrorDescent {
    fn graph(&self) -> Graph {
        self.graph.clone()
    }
    fn strategy(&self) -> Signal {
        self.strategy
    }
    fn convergence(&self) -> IterateKind {
        IterateKind::Last
    }
    fn update(&self, env: &mut Environment) -> Result<()> {
        env.update(&[self.strategy], None, None)
    }
}
