//! Static admission checks run before any hierarchy exists.
//!
//! Both validators are pure: running them twice on the same configuration
//! gives the same result.

pub mod geometry;
pub mod patch_size;

pub use geometry::GeometryValidator;
pub use patch_size::{PatchSizeBounds, PatchSizeConstraintSolver};
