//! Patch-size constraint solving.
//!
//! Every patch of every level must have between `smallest` and `largest`
//! cells along each axis. The solver answers two questions: are the bounds
//! themselves consistent, and can a given region be tiled by patches that
//! respect them.
//!
//! Tiling rule for an extent `n` with bounds `[s, l]`: use
//! `k = ceil(n / l)` pieces of `n / k` cells, the first `n % k` pieces one
//! cell larger. The extent is admissible iff the smallest piece has at least
//! `s` cells; fewer pieces would break `l` and more pieces would only shrink
//! them, so this is exact.

use crate::config::AxisValue;
use crate::geometry::{IndexBox, MAX_DIM};
use crate::hierarchy_error::ConfigurationError;
use itertools::Itertools;

/// Per-axis patch size bounds. `largest[d] == None` means unbounded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchSizeBounds {
    smallest: Vec<i64>,
    largest: Vec<Option<i64>>,
}

impl PatchSizeBounds {
    pub fn new(smallest: Vec<i64>, largest: Vec<Option<i64>>) -> Self {
        Self { smallest, largest }
    }

    /// One-cell minimum, no maximum.
    pub fn unbounded(dim: usize) -> Self {
        Self::new(vec![1; dim], vec![None; dim])
    }

    pub fn from_config(
        smallest: Option<&AxisValue<i64>>,
        largest: Option<&AxisValue<i64>>,
        dim: usize,
    ) -> Result<Self, ConfigurationError> {
        let smallest = match smallest {
            Some(v) => v.to_axes("smallest_patch_size", dim)?,
            None => vec![1; dim],
        };
        let largest = match largest {
            Some(v) => v
                .to_axes("largest_patch_size", dim)?
                .into_iter()
                .map(Some)
                .collect(),
            None => vec![None; dim],
        };
        Ok(Self { smallest, largest })
    }

    pub fn dim(&self) -> usize {
        self.smallest.len()
    }

    pub fn smallest(&self, axis: usize) -> i64 {
        self.smallest[axis]
    }

    pub fn largest(&self, axis: usize) -> Option<i64> {
        self.largest[axis]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchSizeConstraintSolver {
    bounds: PatchSizeBounds,
}

impl PatchSizeConstraintSolver {
    pub fn new(bounds: PatchSizeBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> &PatchSizeBounds {
        &self.bounds
    }

    /// Structural check of the bounds, independent of any box.
    pub fn validate_bounds(&self) -> Result<(), ConfigurationError> {
        for axis in 0..self.bounds.dim() {
            let s = self.bounds.smallest(axis);
            if s < 1 {
                return Err(ConfigurationError::ZeroPatchSize { axis, value: s });
            }
            if let Some(l) = self.bounds.largest(axis) {
                if l < 1 {
                    return Err(ConfigurationError::ZeroPatchSize { axis, value: l });
                }
                if s > l {
                    return Err(ConfigurationError::PatchSizeBoundsInverted {
                        axis,
                        smallest: s,
                        largest: l,
                    });
                }
            }
        }
        Ok(())
    }

    /// Piece lengths for `extent` cells along `axis`, or `None` when the
    /// extent cannot be tiled within the bounds.
    pub fn split_extent(&self, extent: i64, axis: usize) -> Option<Vec<i64>> {
        if extent < 1 {
            return None;
        }
        let pieces = match self.bounds.largest(axis) {
            Some(l) => (extent + l - 1) / l,
            None => 1,
        };
        let base = extent / pieces;
        if base < self.bounds.smallest(axis) {
            return None;
        }
        let rem = extent % pieces;
        Some(
            (0..pieces)
                .map(|i| if i < rem { base + 1 } else { base })
                .collect(),
        )
    }

    pub fn is_admissible(&self, extent: i64, axis: usize) -> bool {
        self.split_extent(extent, axis).is_some()
    }

    /// Tile `region` into patches, axis by axis. Patches come out in
    /// row-major order of their lower corners (axis 0 fastest).
    pub fn partition(
        &self,
        region: &IndexBox,
        level: usize,
    ) -> Result<Vec<IndexBox>, ConfigurationError> {
        let dim = region.dim();
        let mut per_axis: Vec<Vec<(i64, i64)>> = Vec::with_capacity(dim);
        for axis in 0..dim {
            let extent = region.extent(axis);
            let pieces = self.split_extent(extent, axis).ok_or_else(|| {
                ConfigurationError::UnpartitionableExtent {
                    level,
                    axis,
                    extent,
                    smallest: self.bounds.smallest(axis),
                    largest: self.bounds.largest(axis).unwrap_or(extent),
                    context: format!("region {region}"),
                }
            })?;
            let mut lo = region.lower()[axis];
            let spans = pieces
                .into_iter()
                .map(|len| {
                    let span = (lo, lo + len - 1);
                    lo += len;
                    span
                })
                .collect();
            per_axis.push(spans);
        }
        // multi_cartesian_product varies the last axis fastest; reverse the
        // axis order so axis 0 varies fastest.
        let patches = per_axis
            .iter()
            .rev()
            .map(|spans| spans.iter().copied())
            .multi_cartesian_product()
            .map(|rev_spans| {
                let mut lo = [0; MAX_DIM];
                let mut up = [0; MAX_DIM];
                for (i, (l, u)) in rev_spans.into_iter().enumerate() {
                    let axis = dim - 1 - i;
                    lo[axis] = l;
                    up[axis] = u;
                }
                IndexBox::from_arrays(dim, lo, up)
            })
            .collect();
        Ok(patches)
    }

    /// Smallest coarse extent `c` with `wanted <= c <= available` such that
    /// the refined extent `c * ratio` is admissible along `axis`.
    pub fn fit_refined_extent(
        &self,
        wanted: i64,
        available: i64,
        ratio: i64,
        axis: usize,
    ) -> Option<i64> {
        let start = wanted.max(1);
        (start..=available).find(|&c| self.is_admissible(c * ratio, axis))
    }
}
