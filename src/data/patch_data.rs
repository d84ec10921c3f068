//! Named arrays over a patch's cells or nodes.

use crate::geometry::IndexBox;
use serde::{Deserialize, Serialize};

/// Where array values sit relative to the patch's cells.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Centering {
    /// One value per cell.
    #[default]
    Cell,
    /// One value per cell corner; one more than the cell count per axis.
    Node,
}

impl Centering {
    /// Index box covered by the data of a patch with cell box `cells`.
    pub fn data_box(self, cells: &IndexBox) -> IndexBox {
        match self {
            Centering::Cell => *cells,
            Centering::Node => {
                let mut bx = *cells;
                for d in 0..cells.dim() {
                    bx = bx.with_axis(d, cells.lower()[d], cells.upper()[d] + 1);
                }
                bx
            }
        }
    }
}

/// Scalar type tag for patch data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScalarType {
    /// Physical quantities.
    F64,
    /// Integer fields such as tags.
    I32,
}

impl ScalarType {
    /// Returns a stable string label for the scalar type.
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarType::F64 => "f64",
            ScalarType::I32 => "i32",
        }
    }
}

/// Type-tagged value buffer.
#[derive(Clone, Debug, PartialEq)]
pub enum PatchValues {
    /// Real values.
    F64(Vec<f64>),
    /// Integer values.
    I32(Vec<i32>),
}

impl PatchValues {
    /// Scalar type of the buffer.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            PatchValues::F64(_) => ScalarType::F64,
            PatchValues::I32(_) => ScalarType::I32,
        }
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        match self {
            PatchValues::F64(v) => v.len(),
            PatchValues::I32(v) => v.len(),
        }
    }

    /// True when no values are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named array living on one patch.
///
/// Values are laid out point-major: all components of the first point, then
/// the next point, points ordered row-major over [`PatchData::data_box`]
/// with axis 0 fastest.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchData {
    name: String,
    centering: Centering,
    components: usize,
    data_box: IndexBox,
    values: PatchValues,
}

impl PatchData {
    /// Zero-filled real data over a patch with cell box `cells`.
    pub fn real(name: impl Into<String>, centering: Centering, cells: &IndexBox, components: usize) -> Self {
        let data_box = centering.data_box(cells);
        let n = data_box.num_cells() as usize * components;
        Self {
            name: name.into(),
            centering,
            components,
            data_box,
            values: PatchValues::F64(vec![0.0; n]),
        }
    }

    /// Zero-filled single-component integer data over the cells of `cells`.
    pub fn int(name: impl Into<String>, cells: &IndexBox) -> Self {
        let n = cells.num_cells() as usize;
        Self {
            name: name.into(),
            centering: Centering::Cell,
            components: 1,
            data_box: *cells,
            values: PatchValues::I32(vec![0; n]),
        }
    }

    /// Wrap existing values. Returns `None` when the value count does not
    /// match the box and component count.
    pub fn from_values(
        name: impl Into<String>,
        centering: Centering,
        cells: &IndexBox,
        components: usize,
        values: PatchValues,
    ) -> Option<Self> {
        let data_box = centering.data_box(cells);
        if values.len() != data_box.num_cells() as usize * components {
            return None;
        }
        Some(Self {
            name: name.into(),
            centering,
            components,
            data_box,
            values,
        })
    }

    /// Quantity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cell or node centering.
    pub fn centering(&self) -> Centering {
        self.centering
    }

    /// Values per point.
    pub fn components(&self) -> usize {
        self.components
    }

    /// Box of points the values cover.
    pub fn data_box(&self) -> &IndexBox {
        &self.data_box
    }

    /// Scalar type of the values.
    pub fn scalar_type(&self) -> ScalarType {
        self.values.scalar_type()
    }

    /// Raw value buffer.
    pub fn values(&self) -> &PatchValues {
        &self.values
    }

    /// Real values, if this is real data.
    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.values {
            PatchValues::F64(v) => Some(v),
            PatchValues::I32(_) => None,
        }
    }

    /// Mutable real values, if this is real data.
    pub fn as_f64_mut(&mut self) -> Option<&mut [f64]> {
        match &mut self.values {
            PatchValues::F64(v) => Some(v),
            PatchValues::I32(_) => None,
        }
    }

    /// Integer values, if this is integer data.
    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.values {
            PatchValues::I32(v) => Some(v),
            PatchValues::F64(_) => None,
        }
    }

    /// All components at `point`, or `None` when the point is outside the
    /// data box.
    pub fn point(&self, point: &[i64]) -> Option<&[f64]> {
        let off = self.data_box.offset_of(point)? * self.components;
        self.as_f64()?.get(off..off + self.components)
    }

    /// Mutable components at `point`.
    pub fn point_mut(&mut self, point: &[i64]) -> Option<&mut [f64]> {
        let off = self.data_box.offset_of(point)? * self.components;
        let n = self.components;
        self.as_f64_mut()?.get_mut(off..off + n)
    }
}
