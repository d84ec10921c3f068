//! Read-only view of a built hierarchy for export.
//!
//! The view borrows the hierarchy and reports it exactly as built: levels in
//! order, this worker's patches in index order, and each patch's named
//! datasets. Tag fields are stored under a name ending in `"tags"`, so a
//! writer can tell them apart from physical quantities with
//! [`is_tag_quantity`].

use crate::data::{PatchData, TAG_QUANTITY};
use crate::hierarchy::{Level, Patch, PatchHierarchy, PatchId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// True for quantities holding refinement tags.
pub fn is_tag_quantity(name: &str) -> bool {
    name.ends_with(TAG_QUANTITY)
}

/// Geometric attributes of one patch, as written next to its datasets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchProperties {
    pub id: PatchId,
    /// Physical position of the patch's lower corner.
    pub origin: Vec<f64>,
    pub nbr_cells: Vec<i64>,
    pub lower: Vec<i64>,
    pub upper: Vec<i64>,
    pub mpi_rank: usize,
}

/// The external writer's side of the export.
pub trait DiagnosticWriter {
    type Error;

    fn begin_level(&mut self, _level: &Level) -> Result<(), Self::Error> {
        Ok(())
    }

    fn write_patch(
        &mut self,
        properties: &PatchProperties,
        datasets: &[&PatchData],
    ) -> Result<(), Self::Error>;
}

#[derive(Clone, Copy, Debug)]
pub struct HierarchyDiagnosticView<'h> {
    hierarchy: &'h PatchHierarchy,
}

impl<'h> HierarchyDiagnosticView<'h> {
    pub fn new(hierarchy: &'h PatchHierarchy) -> Self {
        Self { hierarchy }
    }

    pub fn levels(&self) -> &'h [Level] {
        self.hierarchy.levels()
    }

    /// This worker's patches on `level`; empty for a level that does not exist.
    pub fn patches(&self, level: usize) -> &'h [Patch] {
        self.hierarchy.level(level).map_or(&[], Level::patches)
    }

    pub fn properties(&self, patch: &Patch) -> PatchProperties {
        let cells = patch.cells();
        PatchProperties {
            id: patch.id(),
            origin: self
                .hierarchy
                .domain()
                .cell_lower_corner(patch.id().level, cells.lower()),
            nbr_cells: cells.extents(),
            lower: cells.lower().to_vec(),
            upper: cells.upper().to_vec(),
            mpi_rank: patch.owner(),
        }
    }

    pub fn datasets<'p>(&self, patch: &'p Patch) -> impl Iterator<Item = &'p PatchData> {
        patch.datasets()
    }

    pub fn tags<'p>(&self, patch: &'p Patch) -> Option<&'p PatchData> {
        patch.data(TAG_QUANTITY)
    }

    /// Names of every quantity held by a local patch.
    pub fn quantities(&self) -> BTreeSet<&'h str> {
        self.levels()
            .iter()
            .flat_map(|l| l.patches())
            .flat_map(|p| p.datasets())
            .map(PatchData::name)
            .collect()
    }

    /// Quantity names excluding tags.
    pub fn physical_quantities(&self) -> BTreeSet<&'h str> {
        self.quantities()
            .into_iter()
            .filter(|n| !is_tag_quantity(n))
            .collect()
    }

    /// Hand every level and local patch to `writer`, in order.
    pub fn dump<W>(&self, writer: &mut W) -> Result<(), W::Error>
    where
        W: DiagnosticWriter + ?Sized,
    {
        for level in self.levels() {
            writer.begin_level(level)?;
            for patch in level.patches() {
                let datasets: Vec<&PatchData> = patch.datasets().collect();
                writer.write_patch(&self.properties(patch), &datasets)?;
            }
        }
        Ok(())
    }
}
