//! Index-space geometry: boxes and the simulation domain.

pub mod domain;
pub mod index_box;

pub use domain::{Boundary, Domain, REFINEMENT_RATIO};
pub use index_box::{IndexBox, MAX_DIM};
