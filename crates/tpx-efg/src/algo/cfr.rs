use crate::*;
use anyhow::Result;

/// Counterfactual regret minimization as a computation graph.
///
/// Backward pass per visited infoset: counterfactual action values are the
/// children's expectations plus the local utility context, regrets
/// accumulate against the expectation under the current strategy, and the
/// next strategy is the L1 normalization of positive regrets.
///
/// With `plus` set, negative regrets are floored at zero after each
/// accumulation and players update alternately, which pairs with the
/// linearly weighted average iterate.
pub struct RegretMatching {
    graph: Graph,
    strategy: Signal,
    plus: bool,
}

impl RegretMatching {
    pub fn new(plus: bool) -> Result<Self> {
        let mut g = Graph::new();
        g.backward(true);
        let expectation = g.constant(Width::Scalar, 0.0);
        let strategy = g.constant(Width::Actions, 0.0);
        g.update(strategy, 1.0 / g.action_set_size())?;
        let regrets = g.constant(Width::Actions, 0.0);
        g.backward(false);
        let counterfactual = g.define(
            Expr::aggregate(
                expectation,
                Reducer::Sum,
                Relation::Children,
                PlayerFilter::Own,
                0.0,
            ) + g.utility(),
        )?;
        g.update(expectation, Expr::from(counterfactual).dot(strategy))?;
        let accumulated = Expr::from(regrets) + Expr::from(counterfactual) - expectation;
        match plus {
            true => g.update(regrets, accumulated.maximum(0.0))?,
            false => g.update(regrets, accumulated)?,
        }
        g.update(strategy, Expr::from(regrets).normalize(1.0, true))?;
        Ok(Self {
            graph: g,
            strategy,
            plus,
        })
    }
}

impl Algorithm for RegretMatching {
    fn graph(&self) -> Graph {
        self.graph.clone()
    }
    fn strategy(&self) -> Signal {
        self.strategy
    }
    fn convergence(&self) -> IterateKind {
        match self.plus {
            true => IterateKind::LinearAvg,
            false => IterateKind::Avg,
        }
    }
    fn update(&self, env: &mut Environment) -> Result<()> {
        match self.plus {
            false => env.update(&[self.strategy], None, None),
            true => {
                for player in 1..=env.tree().players() {
                    env.update(&[self.strategy], Some(&[player]), None)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const PENNIES: &str = "
        node r player 1 actions rh rt
        node rh player 2 actions rhh rht
        node rt player 2 actions rth rtt
        node rhh leaf payoffs 1=1 2=-1
        node rht leaf payoffs 1=-1 2=1
        node rth leaf payoffs 1=-1 2=1
        node rtt leaf payoffs 1=1 2=-1
        infoset rh nodes rt
    ";

    /// Three-card Kuhn poker: one chip ante, one chip bet, six deals.
    pub fn kuhn() -> String {
        let cards = ["J", "Q", "K"];
        let deals = cards
            .iter()
            .flat_map(|a| cards.iter().filter(move |b| *b != a).map(move |b| (*a, *b)))
            .collect::<Vec<_>>();
        let mut text = String::from("node r chance actions");
        for (a, b) in &deals {
            text += &format!(" d{}{}={:.12}", a, b, 1.0 / 6.0);
        }
        text += "\n";
        let rank = |c: &str| "JQK".find(c).unwrap();
        for (a, b) in &deals {
            let d = format!("d{}{}", a, b);
            let w: f64 = if rank(a) > rank(b) { 1.0 } else { -1.0 };
            text += &format!("node {d} player 1 actions {d}x {d}b\n");
            text += &format!("node {d}x player 2 actions {d}xx {d}xb\n");
            text += &format!("node {d}b player 2 actions {d}bc {d}bf\n");
            text += &format!("node {d}xx leaf payoffs 1={} 2={}\n", w, -w);
            text += &format!("node {d}xb player 1 actions {d}xbc {d}xbf\n");
            text += &format!("node {d}xbc leaf payoffs 1={} 2={}\n", 2.0 * w, -2.0 * w);
            text += &format!("node {d}xbf leaf payoffs 1=-1 2=1\n");
            text += &format!("node {d}bc leaf payoffs 1={} 2={}\n", 2.0 * w, -2.0 * w);
            text += &format!("node {d}bf leaf payoffs 1=1 2=-1\n");
        }
        for c in cards {
            let mates = cards.iter().filter(|o| **o != c).collect::<Vec<_>>();
            text += &format!("infoset d{}{} nodes d{}{}\n", c, mates[0], c, mates[1]);
            text += &format!("infoset d{}{}xb nodes d{}{}xb\n", c, mates[0], c, mates[1]);
            text += &format!("infoset d{}{}x nodes d{}{}x\n", mates[0], c, mates[1], c);
            text += &format!("infoset d{}{}b nodes d{}{}b\n", mates[0], c, mates[1], c);
        }
        text
    }

    /// A coin flip decides which player acts; each branch has a dominant
    /// action, so vanilla regret matching converges at the averaging rate.
    const FLIP: &str = "
        node r chance actions c1=0.5 c2=0.5
        node c1 player 1 actions c1a c1b
        node c2 player 2 actions c2a c2b
        node c1a leaf payoffs 1=1 2=-1
        node c1b leaf payoffs 1=-1 2=1
        node c2a leaf payoffs 1=1 2=-1
        node c2b leaf payoffs 1=-1 2=1
    ";

    #[test]
    fn cfr_clears_the_chance_rooted_flip() {
        let mut env = Environment::from_text(FLIP, Traverse::Enumerate).unwrap();
        let cfr = RegretMatching::new(false).unwrap();
        let exploitability = train(&mut env, &cfr, 10_000).unwrap();
        assert!(
            exploitability.iter().sum::<Utility>() < 0.01,
            "{:?}",
            exploitability
        );
        let strategy = env
            .strategy(1, cfr.strategy(), IterateKind::Avg)
            .unwrap();
        assert!(strategy["c1"][0] > 0.99);
        let strategy = env
            .strategy(2, cfr.strategy(), IterateKind::Avg)
            .unwrap();
        assert!(strategy["c2"][1] > 0.99);
    }

    #[test]
    fn cfr_converges_on_pennies() {
        let mut env = Environment::from_text(PENNIES, Traverse::Enumerate).unwrap();
        let cfr = RegretMatching::new(false).unwrap();
        let exploitability = train(&mut env, &cfr, 10_000).unwrap();
        assert!(
            exploitability.iter().sum::<Utility>() < 0.05,
            "{:?}",
            exploitability
        );
        let strategy = env
            .strategy(1, cfr.strategy(), IterateKind::Avg)
            .unwrap();
        assert!((strategy["r"][0] - 0.5).abs() < 0.05);
    }

    #[test]
    fn cfr_plus_pennies_reaches_tight_exploitability() {
        let mut env = Environment::from_text(PENNIES, Traverse::Enumerate).unwrap();
        let plus = RegretMatching::new(true).unwrap();
        let exploitability = train(&mut env, &plus, 10_000).unwrap();
        assert!(
            exploitability.iter().sum::<Utility>() < 0.01,
            "{:?}",
            exploitability
        );
    }

    #[test]
    fn cfr_converges_on_kuhn() {
        let mut env = Environment::from_text(&kuhn(), Traverse::Enumerate).unwrap();
        let cfr = RegretMatching::new(false).unwrap();
        let exploitability = train(&mut env, &cfr, 20_000).unwrap();
        assert!(
            exploitability.iter().sum::<Utility>() < 0.02,
            "{:?}",
            exploitability
        );
        let value = env
            .utility(&[cfr.strategy()], IterateKind::Avg)
            .unwrap();
        // the dealt player loses 1/18 per hand at equilibrium
        assert!((value[0] + 1.0 / 18.0).abs() < 0.01, "{:?}", value);
        assert!((value[0] + value[1]).abs() < 1e-9);
    }

    #[test]
    fn cfr_plus_converges_on_kuhn() {
        let mut env = Environment::from_text(&kuhn(), Traverse::Enumerate).unwrap();
        let plus = RegretMatching::new(true).unwrap();
        let exploitability = train(&mut env, &plus, 5_000).unwrap();
        assert!(
            exploitability.iter().sum::<Utility>() < 0.01,
            "{:?}",
            exploitability
        );
    }

    #[test]
    fn external_sampling_converges_on_kuhn() {
        let mut env = Environment::from_text(&kuhn(), Traverse::External).unwrap();
        env.seed(7);
        let cfr = RegretMatching::new(false).unwrap();
        let exploitability = train(&mut env, &cfr, 50_000).unwrap();
        assert!(
            exploitability.iter().sum::<Utility>() < 0.05,
            "{:?}",
            exploitability
        );
    }
}
