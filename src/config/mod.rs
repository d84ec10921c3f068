//! Strongly-typed hierarchy configuration.
//!
//! [`HierarchyConfig`] enumerates every recognized option with an explicit
//! default. It deserializes from the same dictionary shape the simulation
//! input uses:
//!
//! ```json
//! {
//!   "cells": 55, "dl": 0.2,
//!   "max_nbr_levels": 2,
//!   "smallest_patch_size": 5, "largest_patch_size": 64,
//!   "refinement": "boxes",
//!   "refinement_boxes": {"L0": {"B0": [[10], [14]]}}
//! }
//! ```
//!
//! Nothing is validated lazily: [`HierarchyConfig::resolve`] runs every
//! static check and either returns a [`ResolvedConfig`] or the first
//! [`ConfigurationError`].

use crate::geometry::{Boundary, Domain, IndexBox};
use crate::hierarchy_error::ConfigurationError;
use crate::validation::geometry::GeometryValidator;
use crate::validation::patch_size::{PatchSizeBounds, PatchSizeConstraintSolver};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A value given either once for every axis or per axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisValue<T> {
    Scalar(T),
    PerAxis(Vec<T>),
}

impl<T: Clone> AxisValue<T> {
    /// Expand to exactly `dim` values.
    pub fn to_axes(&self, field: &'static str, dim: usize) -> Result<Vec<T>, ConfigurationError> {
        match self {
            AxisValue::Scalar(v) => Ok(vec![v.clone(); dim]),
            AxisValue::PerAxis(v) if v.len() == dim => Ok(v.clone()),
            AxisValue::PerAxis(v) => Err(ConfigurationError::MismatchedDimension {
                field,
                dim,
                found: v.len(),
            }),
        }
    }

    fn len_hint(&self) -> Option<usize> {
        match self {
            AxisValue::Scalar(_) => None,
            AxisValue::PerAxis(v) => Some(v.len()),
        }
    }
}

impl<T> From<T> for AxisValue<T> {
    fn from(v: T) -> Self {
        AxisValue::Scalar(v)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RefinementMode {
    /// User-specified static refinement boxes.
    #[default]
    Boxes,
    /// Criterion-driven tagging.
    Tagging,
}

impl FromStr for RefinementMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boxes" => Ok(RefinementMode::Boxes),
            "tagging" => Ok(RefinementMode::Tagging),
            other => Err(ConfigurationError::UnknownRefinementMode(other.to_string())),
        }
    }
}

impl TryFrom<String> for RefinementMode {
    type Error = ConfigurationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RefinementMode> for String {
    fn from(m: RefinementMode) -> String {
        m.to_string()
    }
}

impl fmt::Display for RefinementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RefinementMode::Boxes => "boxes",
            RefinementMode::Tagging => "tagging",
        })
    }
}

/// One user-specified refinement box, expressed in the index space of
/// `level`. It requests that region to be covered by level `level + 1`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementBox {
    pub level: usize,
    pub id: String,
    pub lower: Vec<i64>,
    pub upper: Vec<i64>,
}

impl RefinementBox {
    pub fn new(level: usize, id: impl Into<String>, lower: &[i64], upper: &[i64]) -> Self {
        Self {
            level,
            id: id.into(),
            lower: lower.to_vec(),
            upper: upper.to_vec(),
        }
    }

    /// Only meaningful once the corner lengths have been checked.
    pub fn index_box(&self) -> IndexBox {
        IndexBox::new(&self.lower, &self.upper)
    }
}

/// `level -> (box id -> RefinementBox)`
pub type RefinementBoxes = BTreeMap<usize, BTreeMap<String, RefinementBox>>;

/// Wire shape of the configuration; converted into [`HierarchyConfig`].
#[derive(Clone, Serialize, Deserialize)]
struct RawHierarchyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_nbr_levels: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    smallest_patch_size: Option<AxisValue<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    largest_patch_size: Option<AxisValue<i64>>,
    #[serde(default)]
    refinement: Option<RefinementMode>,
    #[serde(default)]
    refinement_boxes: BTreeMap<String, BTreeMap<String, (Vec<i64>, Vec<i64>)>>,
    #[serde(default)]
    cluster_efficiency: Option<f64>,
}

impl From<HierarchyConfig> for RawHierarchyConfig {
    fn from(cfg: HierarchyConfig) -> Self {
        let refinement_boxes = cfg
            .refinement_boxes
            .into_iter()
            .map(|(level, boxes)| {
                let boxes = boxes
                    .into_iter()
                    .map(|(id, b)| (id, (b.lower, b.upper)))
                    .collect();
                (format!("L{level}"), boxes)
            })
            .collect();
        RawHierarchyConfig {
            max_nbr_levels: cfg.max_nbr_levels,
            smallest_patch_size: cfg.smallest_patch_size,
            largest_patch_size: cfg.largest_patch_size,
            refinement: Some(cfg.refinement),
            refinement_boxes,
            cluster_efficiency: Some(cfg.cluster_efficiency),
        }
    }
}

/// Parse `"L<n>"`.
pub fn parse_level_key(key: &str) -> Result<usize, ConfigurationError> {
    key.strip_prefix('L')
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or_else(|| ConfigurationError::InvalidLevelKey(key.to_string()))
}

impl TryFrom<RawHierarchyConfig> for HierarchyConfig {
    type Error = ConfigurationError;

    fn try_from(raw: RawHierarchyConfig) -> Result<Self, Self::Error> {
        let mut refinement_boxes = RefinementBoxes::new();
        for (key, boxes) in raw.refinement_boxes {
            let level = parse_level_key(&key)?;
            let entry = refinement_boxes.entry(level).or_default();
            for (id, (lower, upper)) in boxes {
                entry.insert(id.clone(), RefinementBox { level, id, lower, upper });
            }
        }
        let refinement = match raw.refinement {
            Some(mode) => mode,
            None => RefinementMode::Boxes,
        };
        Ok(HierarchyConfig {
            max_nbr_levels: raw.max_nbr_levels,
            smallest_patch_size: raw.smallest_patch_size,
            largest_patch_size: raw.largest_patch_size,
            refinement,
            refinement_boxes,
            cluster_efficiency: raw
                .cluster_efficiency
                .unwrap_or(crate::algs::cluster::DEFAULT_EFFICIENCY),
        })
    }
}

/// Hierarchy options as given by the user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHierarchyConfig", into = "RawHierarchyConfig")]
pub struct HierarchyConfig {
    /// `None`: boxes mode uses the highest boxed level + 2, tagging uses 1.
    pub max_nbr_levels: Option<usize>,
    /// `None`: one cell.
    pub smallest_patch_size: Option<AxisValue<i64>>,
    /// `None`: unbounded (the level's domain extent).
    pub largest_patch_size: Option<AxisValue<i64>>,
    pub refinement: RefinementMode,
    pub refinement_boxes: RefinementBoxes,
    /// Fill ratio at which a cluster of tagged cells is accepted as a box.
    pub cluster_efficiency: f64,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            max_nbr_levels: None,
            smallest_patch_size: None,
            largest_patch_size: None,
            refinement: RefinementMode::Boxes,
            refinement_boxes: RefinementBoxes::new(),
            cluster_efficiency: crate::algs::cluster::DEFAULT_EFFICIENCY,
        }
    }
}

impl HierarchyConfig {
    pub fn with_max_levels(mut self, n: usize) -> Self {
        self.max_nbr_levels = Some(n);
        self
    }

    /// Same bounds on every axis.
    pub fn with_patch_sizes(self, smallest: i64, largest: i64) -> Self {
        self.with_axis_patch_sizes(AxisValue::Scalar(smallest), AxisValue::Scalar(largest))
    }

    pub fn with_axis_patch_sizes(mut self, smallest: AxisValue<i64>, largest: AxisValue<i64>) -> Self {
        self.smallest_patch_size = Some(smallest);
        self.largest_patch_size = Some(largest);
        self
    }

    pub fn with_mode(mut self, mode: RefinementMode) -> Self {
        self.refinement = mode;
        self
    }

    /// Add a refinement box under `L<level>`.
    pub fn with_box(mut self, level: usize, id: &str, lower: &[i64], upper: &[i64]) -> Self {
        self.refinement_boxes
            .entry(level)
            .or_default()
            .insert(id.to_string(), RefinementBox::new(level, id, lower, upper));
        self
    }

    fn highest_boxed_level(&self) -> Option<usize> {
        self.refinement_boxes
            .iter()
            .filter(|(_, boxes)| !boxes.is_empty())
            .map(|(&l, _)| l)
            .max()
    }

    /// Number of levels the hierarchy may hold.
    pub fn effective_max_levels(&self) -> usize {
        match (self.max_nbr_levels, self.refinement) {
            (Some(n), _) => n,
            (None, RefinementMode::Boxes) => self
                .highest_boxed_level()
                .map_or(1, |l| l.saturating_add(2)),
            (None, RefinementMode::Tagging) => 1,
        }
    }

    /// Run every static check against `domain`.
    ///
    /// Order: patch-size bounds (independent of any box), index range of the
    /// deepest level, geometry of the boxes, then tiling of every level
    /// region.
    pub fn resolve(&self, domain: &Domain) -> Result<ResolvedConfig, ConfigurationError> {
        let dim = domain.dim();
        let max_levels = self.effective_max_levels();
        if max_levels == 0 {
            return Err(ConfigurationError::InvalidMaxLevels(0));
        }
        let bounds = PatchSizeBounds::from_config(
            self.smallest_patch_size.as_ref(),
            self.largest_patch_size.as_ref(),
            dim,
        )?;
        let solver = PatchSizeConstraintSolver::new(bounds);
        solver.validate_bounds()?;
        if domain.domain_box(max_levels - 1).is_none() {
            return Err(ConfigurationError::LevelOutOfRange {
                level: max_levels - 1,
            });
        }

        let no_boxes = RefinementBoxes::new();
        let boxes = match self.refinement {
            RefinementMode::Boxes => &self.refinement_boxes,
            RefinementMode::Tagging => {
                if !self.refinement_boxes.values().all(|b| b.is_empty()) {
                    log::warn!("refinement_boxes are ignored in tagging mode");
                }
                &no_boxes
            }
        };
        let regions = GeometryValidator::new(domain, max_levels).validate(boxes)?;
        for (level, level_regions) in regions.iter().enumerate() {
            for region in level_regions {
                solver.partition(region, level)?;
            }
        }
        if !(self.cluster_efficiency > 0.0 && self.cluster_efficiency <= 1.0) {
            return Err(ConfigurationError::InvalidClusterEfficiency(
                self.cluster_efficiency,
            ));
        }
        Ok(ResolvedConfig {
            max_levels,
            mode: self.refinement,
            solver,
            static_regions: regions,
            cluster_efficiency: self.cluster_efficiency,
        })
    }
}

/// Configuration after every default has been applied and every static
/// rule has been checked.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedConfig {
    pub max_levels: usize,
    pub mode: RefinementMode,
    pub solver: PatchSizeConstraintSolver,
    /// Static-box mode: `static_regions[l]` are the refined regions of level
    /// `l` in its own index space (level 0 is the whole domain). Tagging mode
    /// only carries level 0.
    pub static_regions: Vec<Vec<IndexBox>>,
    pub cluster_efficiency: f64,
}

impl ResolvedConfig {
    pub fn bounds(&self) -> &PatchSizeBounds {
        self.solver.bounds()
    }
}

#[derive(Deserialize)]
struct RawSimulationConfig {
    #[serde(default)]
    dim: Option<usize>,
    cells: AxisValue<i64>,
    dl: AxisValue<f64>,
    #[serde(default)]
    origin: Option<AxisValue<f64>>,
    #[serde(default)]
    boundary_types: Option<AxisValue<Boundary>>,
    #[serde(flatten)]
    hierarchy: HierarchyConfig,
}

/// Domain plus hierarchy options: everything the core consumes.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "RawSimulationConfig")]
pub struct SimulationConfig {
    pub domain: Domain,
    pub hierarchy: HierarchyConfig,
}

impl TryFrom<RawSimulationConfig> for SimulationConfig {
    type Error = ConfigurationError;

    fn try_from(raw: RawSimulationConfig) -> Result<Self, Self::Error> {
        let dim = raw
            .dim
            .or_else(|| raw.cells.len_hint())
            .or_else(|| raw.dl.len_hint())
            .unwrap_or(1);
        let cells = raw.cells.to_axes("cells", dim)?;
        let dl = raw.dl.to_axes("dl", dim)?;
        let origin = match raw.origin {
            Some(o) => o.to_axes("origin", dim)?,
            None => vec![0.0; dim],
        };
        let boundary = match raw.boundary_types {
            Some(b) => b.to_axes("boundary_types", dim)?,
            None => vec![Boundary::Periodic; dim],
        };
        let domain = Domain::with_boundaries(&cells, &dl, &origin, &boundary)?;
        Ok(SimulationConfig {
            domain,
            hierarchy: raw.hierarchy,
        })
    }
}

impl SimulationConfig {
    pub fn new(domain: Domain, hierarchy: HierarchyConfig) -> Self {
        Self { domain, hierarchy }
    }

    /// Validate the hierarchy options against the domain.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigurationError> {
        self.hierarchy.resolve(&self.domain)
    }
}
