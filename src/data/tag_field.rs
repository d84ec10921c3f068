//! Per-cell refinement flags.

use super::patch_data::{Centering, PatchData, PatchValues};
use crate::geometry::{IndexBox, MAX_DIM};
use crate::hierarchy_error::TagFieldError;

/// Name under which a patch stores its tags. Any quantity whose name ends
/// with this suffix is a tag quantity.
pub const TAG_QUANTITY: &str = "tags";

/// Integer flags over a patch's cells: `1` asks for refinement, `0` does not.
///
/// Values are not checked on construction; [`TagField::validate`] must pass
/// before the field is clustered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagField {
    cells: IndexBox,
    values: Vec<i32>,
}

impl TagField {
    /// All-zero field over `cells`.
    pub fn zeros(cells: &IndexBox) -> Self {
        Self {
            cells: *cells,
            values: vec![0; cells.num_cells() as usize],
        }
    }

    /// Wrap raw values laid out row-major over `cells`.
    pub fn from_values(cells: &IndexBox, values: Vec<i32>, patch: &str) -> Result<Self, TagFieldError> {
        let expected = cells.num_cells() as usize;
        if values.len() != expected {
            return Err(TagFieldError::ShapeMismatch {
                patch: patch.to_string(),
                expected,
                found: values.len(),
            });
        }
        Ok(Self {
            cells: *cells,
            values,
        })
    }

    /// Build from a predicate evaluated at every cell.
    pub fn from_fn(cells: &IndexBox, mut tagged: impl FnMut(&[i64]) -> bool) -> Self {
        let values = cells
            .cells()
            .map(|c| i32::from(tagged(&c[..cells.dim()])))
            .collect();
        Self {
            cells: *cells,
            values,
        }
    }

    /// Cell box of the field.
    pub fn cells(&self) -> &IndexBox {
        &self.cells
    }

    /// Raw values.
    pub fn values(&self) -> &[i32] {
        &self.values
    }

    /// Value at `cell`, `None` outside the field.
    pub fn get(&self, cell: &[i64]) -> Option<i32> {
        self.cells.offset_of(cell).map(|i| self.values[i])
    }

    /// Set the flag at `cell`; returns false when `cell` is outside.
    pub fn set(&mut self, cell: &[i64], tagged: bool) -> bool {
        match self.cells.offset_of(cell) {
            Some(i) => {
                self.values[i] = i32::from(tagged);
                true
            }
            None => false,
        }
    }

    /// Check that every value is 0 or 1.
    pub fn validate(&self, patch: &str) -> Result<(), TagFieldError> {
        match self
            .cells
            .cells()
            .zip(&self.values)
            .find(|&(_, &v)| v != 0 && v != 1)
        {
            Some((cell, &value)) => Err(TagFieldError::InvalidValue {
                patch: patch.to_string(),
                cell: cell[..self.cells.dim()].to_vec(),
                value,
            }),
            None => Ok(()),
        }
    }

    /// Number of cells flagged 1.
    pub fn count(&self) -> usize {
        self.values.iter().filter(|&&v| v == 1).count()
    }

    /// Cells flagged 1, row-major.
    pub fn tagged_cells(&self) -> impl Iterator<Item = [i64; MAX_DIM]> + '_ {
        self.cells
            .cells()
            .zip(&self.values)
            .filter_map(|(c, &v)| (v == 1).then_some(c))
    }

    /// Store as a cell-centered integer quantity named [`TAG_QUANTITY`].
    pub fn to_patch_data(&self) -> PatchData {
        PatchData::from_values(
            TAG_QUANTITY,
            Centering::Cell,
            &self.cells,
            1,
            PatchValues::I32(self.values.clone()),
        )
        .unwrap_or_else(|| PatchData::int(TAG_QUANTITY, &self.cells))
    }

    /// Read back from patch data; `None` unless it is single-component
    /// cell-centered integer data.
    pub fn from_patch_data(data: &PatchData) -> Option<Self> {
        if data.centering() != Centering::Cell || data.components() != 1 {
            return None;
        }
        Some(Self {
            cells: *data.data_box(),
            values: data.as_i32()?.to_vec(),
        })
    }
}
