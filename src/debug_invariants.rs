//! Structural checks on a built hierarchy.
//!
//! [`DebugInvariants::validate_invariants`] can always be called.
//! [`DebugInvariants::debug_assert_invariants`] only runs it in debug builds
//! or with the `check-invariants` feature, and panics on the first broken
//! invariant.

use crate::hierarchy::PatchHierarchy;
use crate::hierarchy_error::HierarchyError;
use crate::validation::geometry::covered_by;

/// True in debug builds and with the `check-invariants` feature.
pub const fn invariant_checks_enabled() -> bool {
    cfg!(any(debug_assertions, feature = "check-invariants"))
}

pub trait DebugInvariants {
    /// First broken invariant, if any.
    fn validate_invariants(&self) -> Result<(), HierarchyError>;

    /// Panic on a broken invariant when checks are enabled. `stage` names
    /// the step that produced the value, e.g. `"after regrid"`.
    fn debug_assert_invariants(&self, stage: &str) {
        if invariant_checks_enabled() {
            if let Err(e) = self.validate_invariants() {
                panic!("[invariants] {stage}: {e}");
            }
        }
    }
}

impl DebugInvariants for PatchHierarchy {
    /// Nesting, disjointness, tiling and ownership of every level.
    fn validate_invariants(&self) -> Result<(), HierarchyError> {
        let fail = |msg: String| Err(HierarchyError::Invariant(msg));
        for (ln, level) in self.levels().iter().enumerate() {
            if level.number() != ln {
                return fail(format!("level at position {ln} is numbered {}", level.number()));
            }
            let regions = level.regions();
            if ln == 0 {
                if regions != [self.domain().base_box()] {
                    return fail("level 0 does not cover the domain".into());
                }
            } else {
                let parent: Vec<_> = self.levels()[ln - 1]
                    .regions()
                    .iter()
                    .map(|r| r.refine(level.ratio()))
                    .collect();
                if let Some(r) = regions.iter().find(|r| !covered_by(r, &parent)) {
                    return fail(format!("level {ln} region {r} leaves the refined level {}", ln - 1));
                }
            }

            let descriptors = level.descriptors();
            for (i, a) in descriptors.iter().enumerate() {
                if a.id.level != ln || a.id.index != i {
                    return fail(format!("patch {} sits at level {ln} index {i}", a.id));
                }
                if a.owner >= self.size() {
                    return fail(format!("patch {} owned by rank {} of {}", a.id, a.owner, self.size()));
                }
                if !regions.iter().any(|r| r.contains_box(&a.cells)) {
                    return fail(format!("patch {} lies outside the regions of level {ln}", a.id));
                }
                if let Some(b) = descriptors[i + 1..].iter().find(|b| a.cells.intersects(&b.cells)) {
                    return fail(format!("patches {} and {} overlap", a.id, b.id));
                }
            }
            let region_cells: u64 = regions.iter().map(|r| r.num_cells()).sum();
            if region_cells != level.num_cells() {
                return fail(format!("patches of level {ln} do not tile its regions"));
            }

            let owned: Vec<_> = level.owned_by(self.rank()).map(|d| d.id).collect();
            let local: Vec<_> = level.patches().iter().map(|p| p.id()).collect();
            if owned != local {
                return fail(format!(
                    "rank {} holds {:?} on level {ln} but owns {:?}",
                    self.rank(),
                    local,
                    owned
                ));
            }
        }
        Ok(())
    }
}
