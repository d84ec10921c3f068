#![cfg_attr(docsrs, feature(doc_cfg))]
//! # amr-hierarchy
//!
//! amr-hierarchy builds and maintains the patch hierarchy of a block-structured
//! adaptive-mesh-refinement (AMR) simulation: a stack of levels, each tiled by
//! rectangular patches, refined either by user-given static boxes or by a
//! per-cell tagging criterion, with patches spread over distributed workers.
//!
//! ## Features
//! - Strongly typed configuration, validated before any hierarchy exists
//!   ([`config::SimulationConfig`], [`validation`])
//! - Static-box and tagging refinement ([`hierarchy::RefinementHierarchyBuilder`],
//!   [`tagging::TaggingEngine`])
//! - Deterministic clustering of tagged cells, independent of worker count
//! - Collective steps that every worker takes whether it owns patches or not
//!   ([`algs::HierarchySynchronizer`])
//! - Pluggable communication backends (serial, in-process threads, MPI)
//! - A read-only export view for diagnostic writers ([`diagnostics`])
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! amr-hierarchy = "0.1"
//! # Optional features:
//! # features = ["mpi-support", "parallel-tagging", "check-invariants"]
//! ```
//!
//! ```
//! use amr_hierarchy::prelude::*;
//!
//! let domain = Domain::new(&[55], &[0.2]).unwrap();
//! let hierarchy = HierarchyConfig::default().with_box(0, "B0", &[10], &[14]);
//! let config = SimulationConfig::new(domain, hierarchy);
//! let comm = NoComm;
//! let built = RefinementHierarchyBuilder::new(&config, &comm)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! assert_eq!(built.num_levels(), 2);
//! built.teardown();
//! ```
//!
//! ## Lifecycle
//! A [`hierarchy::PatchHierarchy`] is an explicit handle: `build → use →
//! teardown`. There is no process-wide "current simulation".

pub mod algs;
pub mod config;
pub mod data;
pub mod debug_invariants;
pub mod diagnostics;
pub mod geometry;
pub mod hierarchy;
pub mod hierarchy_error;
pub mod model;
pub mod tagging;
pub mod validation;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, NoComm, RayonComm};
    pub use crate::algs::synchronizer::{CollectiveOp, HierarchySynchronizer};
    pub use crate::config::{HierarchyConfig, RefinementMode, SimulationConfig};
    pub use crate::data::{Centering, PatchData, TagField};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::diagnostics::{DiagnosticWriter, HierarchyDiagnosticView, PatchProperties};
    pub use crate::geometry::{Domain, IndexBox};
    pub use crate::hierarchy::{Patch, PatchHierarchy, RefinementHierarchyBuilder};
    pub use crate::hierarchy_error::{
        ConfigurationError, CoordinationFailure, HierarchyError, TagFieldError,
    };
    pub use crate::model::{FieldInitializer, FieldProfile, ProfileInitializer};
    pub use crate::tagging::{GradientTagger, TagContext, TaggingEngine};
    pub use crate::validation::{GeometryValidator, PatchSizeConstraintSolver};
}
