//! HierarchyError: unified error type for amr-hierarchy public APIs
//!
//! Two kinds of failure exist. [`ConfigurationError`] is static: it is detected
//! before any hierarchy exists and covers every geometry and patch-size rule.
//! [`CoordinationFailure`] is dynamic: it is detected while workers build the
//! hierarchy together and means the workers no longer agree on what exists.
//! Both are terminal for the construction attempt.

use crate::geometry::IndexBox;
use thiserror::Error;

/// Static configuration violations, raised before construction starts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("dimension must be 1, 2 or 3, got {0}")]
    InvalidDimension(usize),
    #[error("`{field}` has {found} components but the domain is {dim}-dimensional")]
    MismatchedDimension {
        field: &'static str,
        dim: usize,
        found: usize,
    },
    #[error("domain has zero cells along axis {axis}")]
    EmptyDomain { axis: usize },
    #[error("cell size along axis {axis} must be positive and finite, got {value}")]
    NonPositiveCellSize { axis: usize, value: f64 },
    #[error("max_nbr_levels must be at least 1, got {0}")]
    InvalidMaxLevels(usize),
    #[error("refinement box level key `{0}` is not of the form `L<n>`")]
    InvalidLevelKey(String),
    #[error(
        "smallest_patch_size ({smallest}) exceeds largest_patch_size ({largest}) along axis {axis}"
    )]
    PatchSizeBoundsInverted {
        axis: usize,
        smallest: i64,
        largest: i64,
    },
    #[error("patch size bounds must be positive, got {value} along axis {axis}")]
    ZeroPatchSize { axis: usize, value: i64 },
    #[error("box `{box_id}` on level {level} ({lower:?}..={upper:?}) leaves the level domain {domain:?}")]
    BoxOutOfDomain {
        level: usize,
        box_id: String,
        lower: Vec<i64>,
        upper: Vec<i64>,
        domain: Vec<i64>,
    },
    #[error("box `{box_id}` on level {level} has lower > upper along axis {axis}")]
    InvertedBox {
        level: usize,
        box_id: String,
        axis: usize,
    },
    #[error("boxes `{first}` and `{second}` overlap on level {level}")]
    OverlappingBoxes {
        level: usize,
        first: String,
        second: String,
    },
    #[error("box `{box_id}` on level {level} is not contained in any refined region of level {parent}")]
    MissingParentBox {
        level: usize,
        parent: usize,
        box_id: String,
    },
    #[error(
        "box `{box_id}` on level {level} requests level {requested}, but max_nbr_levels is {max_nbr_levels}"
    )]
    LevelExceedsMaximum {
        level: usize,
        box_id: String,
        requested: usize,
        max_nbr_levels: usize,
    },
    #[error(
        "extent {extent} on level {level} along axis {axis} cannot be tiled by patches of {smallest}..={largest} cells ({context})"
    )]
    UnpartitionableExtent {
        level: usize,
        axis: usize,
        extent: i64,
        smallest: i64,
        largest: i64,
        context: String,
    },
    #[error("level {level} indices overflow the integer index range of this domain")]
    LevelOutOfRange { level: usize },
    #[error("cluster_efficiency must lie in (0, 1], got {0}")]
    InvalidClusterEfficiency(f64),
    #[error("refinement mode `tagging` needs a tagging engine")]
    MissingTagger,
    #[error("unknown refinement mode `{0}` (expected `boxes` or `tagging`)")]
    UnknownRefinementMode(String),
    #[error("configuration could not be parsed: {0}")]
    Parse(String),
}

/// Dynamic failures detected while workers build a level together.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinationFailure {
    /// Workers entered different collective steps at the same point.
    #[error(
        "collective mismatch on rank {rank}: expected {expected_op} at epoch {expected_epoch}, got {found_op} at epoch {found_epoch}"
    )]
    MismatchedCollective {
        rank: usize,
        expected_op: String,
        expected_epoch: u64,
        found_op: String,
        found_epoch: u64,
    },
    /// Another worker reported a collective mismatch; this worker only learns of it.
    #[error("collective {op} at epoch {epoch} was aborted by the root")]
    Aborted { op: String, epoch: u64 },
    /// A step failed locally on another worker; every other worker learns of
    /// it through the same collective.
    #[error("rank {rank} failed during {op}")]
    PeerFailed { rank: usize, op: String },
    #[error("workers derived different box sets for level {level} (rank {rank} disagrees with rank 0)")]
    DivergentBoxes { level: usize, rank: usize },
    #[error("level {level}: workers own {reported} patches in total but the level has {expected}")]
    PatchCountMismatch {
        level: usize,
        expected: u64,
        reported: u64,
    },
    #[error("transport error with rank {peer}: {reason}")]
    Transport { peer: usize, reason: String },
    #[error("malformed message from rank {peer}: {reason}")]
    MalformedMessage { peer: usize, reason: String },
}

/// A tag field that cannot be clustered: bad values or the wrong box.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TagFieldError {
    #[error("tag field of patch {patch} holds {value} at cell {cell:?}; tags must be 0 or 1")]
    InvalidValue {
        patch: String,
        cell: Vec<i64>,
        value: i32,
    },
    #[error("tag field of patch {patch} has {found} values but the patch has {expected} cells")]
    ShapeMismatch {
        patch: String,
        expected: usize,
        found: usize,
    },
    #[error("tag field of patch {patch} covers {found} but the patch covers {expected}")]
    BoxMismatch {
        patch: String,
        expected: IndexBox,
        found: IndexBox,
    },
}

/// Unified error type for hierarchy construction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HierarchyError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Coordination(#[from] CoordinationFailure),
    #[error(transparent)]
    InvalidTags(#[from] TagFieldError),
    /// A hierarchy invariant (nesting, overlap, ownership) does not hold.
    #[error("hierarchy invariant violated: {0}")]
    Invariant(String),
}

impl HierarchyError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, HierarchyError::Configuration(_))
    }

    pub fn is_coordination(&self) -> bool {
        matches!(self, HierarchyError::Coordination(_))
    }
}
