//! Integer boxes in a level's cell index space.
//!
//! An [`IndexBox`] holds inclusive `lower`/`upper` corners for up to three
//! axes. Axes beyond `dim` are kept at zero so two boxes of the same
//! dimension compare and hash consistently.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest supported dimensionality.
pub const MAX_DIM: usize = 3;

/// Inclusive integer box `lower..=upper` in the index space of one level.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexBox {
    dim: usize,
    lower: [i64; MAX_DIM],
    upper: [i64; MAX_DIM],
}

impl IndexBox {
    /// Build a box from per-axis corners. The slices must have the same
    /// length (1..=3); corner ordering is not checked here, see
    /// [`IndexBox::is_empty`].
    pub fn new(lower: &[i64], upper: &[i64]) -> Self {
        debug_assert_eq!(lower.len(), upper.len());
        debug_assert!((1..=MAX_DIM).contains(&lower.len()));
        let dim = lower.len().min(upper.len()).min(MAX_DIM);
        let mut lo = [0; MAX_DIM];
        let mut up = [0; MAX_DIM];
        lo[..dim].copy_from_slice(&lower[..dim]);
        up[..dim].copy_from_slice(&upper[..dim]);
        Self {
            dim,
            lower: lo,
            upper: up,
        }
    }

    pub(crate) fn from_arrays(dim: usize, lower: [i64; MAX_DIM], upper: [i64; MAX_DIM]) -> Self {
        let mut b = Self { dim, lower, upper };
        for d in dim..MAX_DIM {
            b.lower[d] = 0;
            b.upper[d] = 0;
        }
        b
    }

    /// Box covering `0..cells[d]` on every axis.
    pub fn from_cells(cells: &[i64]) -> Self {
        let upper: Vec<i64> = cells.iter().map(|&n| n - 1).collect();
        Self::new(&vec![0; cells.len()], &upper)
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn lower(&self) -> &[i64] {
        &self.lower[..self.dim]
    }

    #[inline]
    pub fn upper(&self) -> &[i64] {
        &self.upper[..self.dim]
    }

    #[inline]
    pub(crate) fn lower_array(&self) -> [i64; MAX_DIM] {
        self.lower
    }

    #[inline]
    pub(crate) fn upper_array(&self) -> [i64; MAX_DIM] {
        self.upper
    }

    /// Number of cells along `axis` (may be ≤ 0 for an inverted box).
    #[inline]
    pub fn extent(&self, axis: usize) -> i64 {
        self.upper[axis] - self.lower[axis] + 1
    }

    pub fn extents(&self) -> Vec<i64> {
        (0..self.dim).map(|d| self.extent(d)).collect()
    }

    /// True when some axis has `lower > upper`.
    pub fn is_empty(&self) -> bool {
        (0..self.dim).any(|d| self.upper[d] < self.lower[d])
    }

    pub fn num_cells(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        (0..self.dim).map(|d| self.extent(d) as u64).product()
    }

    /// Index of the longest axis; ties go to the lowest axis.
    pub fn longest_axis(&self) -> usize {
        (0..self.dim)
            .fold(0, |best, d| if self.extent(d) > self.extent(best) { d } else { best })
    }

    pub fn contains_cell(&self, cell: &[i64]) -> bool {
        (0..self.dim).all(|d| self.lower[d] <= cell[d] && cell[d] <= self.upper[d])
    }

    pub fn contains_box(&self, other: &IndexBox) -> bool {
        !other.is_empty()
            && (0..self.dim)
                .all(|d| self.lower[d] <= other.lower[d] && other.upper[d] <= self.upper[d])
    }

    pub fn intersects(&self, other: &IndexBox) -> bool {
        !self.intersection(other).is_empty()
    }

    /// Overlap of two boxes; empty when they are disjoint.
    pub fn intersection(&self, other: &IndexBox) -> IndexBox {
        let mut lo = [0; MAX_DIM];
        let mut up = [0; MAX_DIM];
        for d in 0..self.dim {
            lo[d] = self.lower[d].max(other.lower[d]);
            up[d] = self.upper[d].min(other.upper[d]);
        }
        Self::from_arrays(self.dim, lo, up)
    }

    /// Smallest box containing both.
    pub fn bounding(&self, other: &IndexBox) -> IndexBox {
        let mut lo = [0; MAX_DIM];
        let mut up = [0; MAX_DIM];
        for d in 0..self.dim {
            lo[d] = self.lower[d].min(other.lower[d]);
            up[d] = self.upper[d].max(other.upper[d]);
        }
        Self::from_arrays(self.dim, lo, up)
    }

    /// Map to the next finer index space: every coarse cell becomes `ratio`
    /// fine cells per axis.
    pub fn refine(&self, ratio: i64) -> IndexBox {
        let mut lo = [0; MAX_DIM];
        let mut up = [0; MAX_DIM];
        for d in 0..self.dim {
            lo[d] = self.lower[d] * ratio;
            up[d] = (self.upper[d] + 1) * ratio - 1;
        }
        Self::from_arrays(self.dim, lo, up)
    }

    /// Map to the next coarser index space (covering box).
    pub fn coarsen(&self, ratio: i64) -> IndexBox {
        let mut lo = [0; MAX_DIM];
        let mut up = [0; MAX_DIM];
        for d in 0..self.dim {
            lo[d] = self.lower[d].div_euclid(ratio);
            up[d] = self.upper[d].div_euclid(ratio);
        }
        Self::from_arrays(self.dim, lo, up)
    }

    /// Copy with one axis replaced by `lower..=upper`.
    pub fn with_axis(&self, axis: usize, lower: i64, upper: i64) -> IndexBox {
        let mut b = *self;
        b.lower[axis] = lower;
        b.upper[axis] = upper;
        b
    }

    /// Row-major offset of `cell` inside this box (axis 0 fastest).
    pub fn offset_of(&self, cell: &[i64]) -> Option<usize> {
        if !self.contains_cell(cell) {
            return None;
        }
        let mut offset = 0usize;
        let mut stride = 1usize;
        for d in 0..self.dim {
            offset += (cell[d] - self.lower[d]) as usize * stride;
            stride *= self.extent(d) as usize;
        }
        Some(offset)
    }

    /// Iterate every cell, axis 0 fastest.
    pub fn cells(&self) -> Cells {
        Cells {
            bx: *self,
            next: if self.is_empty() {
                None
            } else {
                Some(self.lower)
            },
        }
    }
}

impl fmt::Display for IndexBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}..={:?}]", self.lower(), self.upper())
    }
}

/// Row-major cell iterator produced by [`IndexBox::cells`].
pub struct Cells {
    bx: IndexBox,
    next: Option<[i64; MAX_DIM]>,
}

impl Iterator for Cells {
    type Item = [i64; MAX_DIM];

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        let mut nxt = cur;
        let mut done = true;
        for d in 0..self.bx.dim {
            if nxt[d] < self.bx.upper[d] {
                nxt[d] += 1;
                done = false;
                break;
            }
            nxt[d] = self.bx.lower[d];
        }
        self.next = if done { None } else { Some(nxt) };
        Some(cur)
    }
}
