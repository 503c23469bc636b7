//! The environment: signal storage, sequence-form evaluation, and the
//! update loop binding a compiled schedule to a game tree.

mod environment;
mod seqform;
mod storage;

pub use environment::Environment;
pub use seqform::IterateKind;
pub use storage::Storage;

pub(crate) use seqform::{IterateHistory, SequenceForm};
