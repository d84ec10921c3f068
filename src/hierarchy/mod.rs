//! The patch hierarchy and its construction.

pub mod builder;
pub mod level;
pub mod patch;

pub use builder::RefinementHierarchyBuilder;
pub use level::{Level, PatchHierarchy};
pub use patch::{Patch, PatchDescriptor, PatchId};
