//! Tree store: persisted game descriptions, vertices, and infosets.

mod infoset;
mod node;
mod tree;

pub mod parse;

pub use infoset::{Infoset, InfosetId, Sequence};
pub use node::{Kind, Spot};
pub use parse::Record;
pub use tree::GameTree;
