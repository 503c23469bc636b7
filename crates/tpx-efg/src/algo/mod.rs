//! Reference equilibrium-finding clients.
//!
//! Each algorithm builds its update rule once as a [`Graph`] and drives the
//! [`Environment`] through [`Algorithm::update`]. These double as the
//! engine's convergence test harness.

mod cfr;
mod mccfr;
mod mirror;
mod progress;

pub use cfr::RegretMatching;
pub use mccfr::OutcomeMccfr;
pub use mirror::MirrorDescent;
pub use progress::Progress;

use crate::*;
use anyhow::Result;

pub trait Algorithm {
    /// The update rule, compiled by [`Environment::attach`].
    fn graph(&self) -> Graph;
    /// The signal holding the current behavioral strategy.
    fn strategy(&self) -> Signal;
    /// The iterate the algorithm's guarantees apply to.
    fn convergence(&self) -> IterateKind;
    /// One full training iteration.
    fn update(&self, env: &mut Environment) -> Result<()>;
}

/// Attach and run an algorithm for a fixed number of iterations, logging
/// summed exploitability periodically. The first call initializes the dual
/// terminal/file logger. Returns the final per-player exploitability of the
/// algorithm's convergent iterate.
pub fn train(
    env: &mut Environment,
    algorithm: &dyn Algorithm,
    iterations: usize,
) -> Result<Vec<Utility>> {
    static LOGGER: std::sync::Once = std::sync::Once::new();
    LOGGER.call_once(tpx_core::log);
    env.attach(algorithm.graph())?;
    let strategy = algorithm.strategy();
    let kind = algorithm.convergence();
    let mut progress = Progress::new();
    for _ in 0..iterations {
        algorithm.update(env)?;
        env.update_strategy(&[strategy], kind == IterateKind::Best)?;
        progress.tick();
        if progress.epoch() % TRAINING_LOG_INTERVAL == 0 || progress.epoch() == iterations {
            let total = env
                .exploitability(&[strategy], kind)?
                .iter()
                .sum::<Utility>();
            log::info!("{} exploitability {:.6}", progress.format(), total);
        }
    }
    log::info!("{}", progress.summary());
    env.exploitability(&[strategy], kind)
}
