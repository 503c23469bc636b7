//! Computation-graph runtime for extensive-form games.
//!
//! A game is loaded once into an immutable [`GameTree`]; algorithms are
//! written as computation graphs over per-infoset signal vectors, compiled
//! into a [`Schedule`] and driven by an [`Environment`] that traverses the
//! tree, fills the per-infoset context, and runs the graph's dynamic passes.
//!
//! # Module Structure
//!
//! - `tree` — persisted format, game tree, infoset arena
//! - `kernel` — signal vectors and simplex projections
//! - `graph` — computation-graph builder and compiled schedule
//! - `aggregate` — cross-infoset reductions
//! - `traverse` — enumeration and sampling controllers
//! - `env` — environment, signal storage, sequence form
//! - `algo` — reference equilibrium-finding clients

pub mod aggregate;
pub mod algo;
pub mod env;
pub mod graph;
pub mod kernel;
pub mod traverse;
pub mod tree;

pub use aggregate::*;
pub use algo::*;
pub use env::*;
pub use graph::*;
pub use kernel::*;
pub use traverse::*;
pub use tree::*;

pub use tpx_core::*;
