//! Computation-graph builder and compiled schedule.

mod expr;
mod graph;
mod schedule;
mod signal;

pub use expr::{Binary, Expr, Unary};
pub use graph::{Graph, Step};
pub use schedule::Schedule;
pub use signal::{
    Pass, Signal, Width, ACTION_SET_SIZE, OPPONENT_REACH_PROB, REACH_PROB, SUBTREE_SIZE, UTILITY,
};

pub(crate) use schedule::Eval;
