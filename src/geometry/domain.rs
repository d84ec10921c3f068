//! The simulation domain: dimensionality, cell counts, cell sizes and
//! boundary conditions. Immutable once a hierarchy is built from it.

use super::index_box::{IndexBox, MAX_DIM};
use crate::hierarchy_error::ConfigurationError;
use serde::{Deserialize, Serialize};

/// Refinement ratio between consecutive levels. Only 2 is supported.
pub const REFINEMENT_RATIO: i64 = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    #[default]
    Periodic,
    Other,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    dim: usize,
    cells: Vec<i64>,
    dl: Vec<f64>,
    origin: Vec<f64>,
    boundary: Vec<Boundary>,
}

impl Domain {
    /// Periodic domain with origin at zero.
    pub fn new(cells: &[i64], dl: &[f64]) -> Result<Self, ConfigurationError> {
        let dim = cells.len();
        Self::with_boundaries(
            cells,
            dl,
            &vec![0.0; dim],
            &vec![Boundary::Periodic; dim],
        )
    }

    pub fn with_boundaries(
        cells: &[i64],
        dl: &[f64],
        origin: &[f64],
        boundary: &[Boundary],
    ) -> Result<Self, ConfigurationError> {
        let dim = cells.len();
        if dim == 0 || dim > MAX_DIM {
            return Err(ConfigurationError::InvalidDimension(dim));
        }
        for (field, found) in [
            ("dl", dl.len()),
            ("origin", origin.len()),
            ("boundary_types", boundary.len()),
        ] {
            if found != dim {
                return Err(ConfigurationError::MismatchedDimension { field, dim, found });
            }
        }
        if let Some(axis) = cells.iter().position(|&n| n <= 0) {
            return Err(ConfigurationError::EmptyDomain { axis });
        }
        if let Some(axis) = dl.iter().position(|&h| !(h.is_finite() && h > 0.0)) {
            return Err(ConfigurationError::NonPositiveCellSize {
                axis,
                value: dl[axis],
            });
        }
        Ok(Self {
            dim,
            cells: cells.to_vec(),
            dl: dl.to_vec(),
            origin: origin.to_vec(),
            boundary: boundary.to_vec(),
        })
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn cells(&self) -> &[i64] {
        &self.cells
    }

    pub fn dl(&self) -> &[f64] {
        &self.dl
    }

    pub fn origin(&self) -> &[f64] {
        &self.origin
    }

    pub fn boundary(&self) -> &[Boundary] {
        &self.boundary
    }

    /// `ratio^level`, or `None` once it no longer fits in `i64`.
    pub fn ratio_to_level0(level: usize) -> Option<i64> {
        u32::try_from(level)
            .ok()
            .and_then(|l| REFINEMENT_RATIO.checked_pow(l))
    }

    /// Whole domain in the index space of level 0.
    pub fn base_box(&self) -> IndexBox {
        IndexBox::from_cells(&self.cells)
    }

    /// Whole domain in the index space of `level`, or `None` when that
    /// level's indices overflow `i64`.
    pub fn domain_box(&self, level: usize) -> Option<IndexBox> {
        let r = Self::ratio_to_level0(level)?;
        let upper = self
            .cells
            .iter()
            .map(|&n| n.checked_mul(r).map(|c| c - 1))
            .collect::<Option<Vec<i64>>>()?;
        Some(IndexBox::new(&vec![0; self.dim], &upper))
    }

    /// Cell width on `level`.
    pub fn cell_width(&self, level: usize) -> Vec<f64> {
        let exp = i32::try_from(level).unwrap_or(i32::MAX);
        let r = (REFINEMENT_RATIO as f64).powi(exp);
        self.dl.iter().map(|h| h / r).collect()
    }

    /// Physical position of the lower corner of `cell` on `level`.
    pub fn cell_lower_corner(&self, level: usize, cell: &[i64]) -> Vec<f64> {
        let dx = self.cell_width(level);
        (0..self.dim)
            .map(|d| self.origin[d] + cell[d] as f64 * dx[d])
            .collect()
    }

    /// Physical position of the center of `cell` on `level`.
    pub fn cell_center(&self, level: usize, cell: &[i64]) -> Vec<f64> {
        let dx = self.cell_width(level);
        (0..self.dim)
            .map(|d| self.origin[d] + (cell[d] as f64 + 0.5) * dx[d])
            .collect()
    }
}
