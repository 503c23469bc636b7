//! Numeric kernel: fixed-width signal vectors and simplex projections.

pub mod project;
pub mod vector;

pub use project::{project, Distance};
pub use vector::Vector;
