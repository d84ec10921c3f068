//! Refinement-box geometry checks.
//!
//! Each rule runs over every box before the next rule starts, so the error
//! reported is the first broken rule, then the lowest level, then the
//! lowest box id:
//! 0. a box on level `L` requests level `L + 1`, so it needs
//!    `L + 2 <= max_nbr_levels` and an index range for level `L + 1` that
//!    fits in `i64`; no geometry is computed before this holds,
//! 1. corners have the domain's dimension and lie inside the domain of the
//!    box's level,
//! 2. `lower <= upper` on every axis (with inclusive corners this also
//!    guarantees an extent of at least one cell),
//! 3. boxes of one level do not overlap,
//! 4. boxes on level `L > 0` are covered by the refined boxes of `L - 1`.

use crate::config::{RefinementBox, RefinementBoxes};
use crate::geometry::{Domain, IndexBox, REFINEMENT_RATIO};
use crate::hierarchy_error::ConfigurationError;

pub struct GeometryValidator<'d> {
    domain: &'d Domain,
    max_levels: usize,
}

impl<'d> GeometryValidator<'d> {
    pub fn new(domain: &'d Domain, max_levels: usize) -> Self {
        Self { domain, max_levels }
    }

    /// Validate every box and return the refined region of each level in
    /// its own index space: `regions[0]` is the whole domain, `regions[l + 1]`
    /// are the boxes of level `l` refined.
    pub fn validate(&self, boxes: &RefinementBoxes) -> Result<Vec<Vec<IndexBox>>, ConfigurationError> {
        let requested: Vec<(usize, Vec<&RefinementBox>)> = boxes
            .iter()
            .filter(|(_, level_boxes)| !level_boxes.is_empty())
            .map(|(&level, level_boxes)| (level, level_boxes.values().collect()))
            .collect();
        let all_boxes = || requested.iter().flat_map(|(_, b)| b.iter().copied());

        for (level, level_boxes) in &requested {
            self.check_level(*level, level_boxes[0])?;
        }
        for rb in all_boxes() {
            self.check_inside(rb)?;
        }
        for rb in all_boxes() {
            check_ordered(rb)?;
        }
        for (level, level_boxes) in &requested {
            check_disjoint(*level, level_boxes)?;
        }

        let mut regions = vec![vec![self.domain.base_box()]];
        for (level, level_boxes) in &requested {
            // An empty or skipped parent level leaves no slot at `level`.
            let parent_regions: &[IndexBox] = regions.get(*level).map_or(&[], |r| r.as_slice());
            for rb in level_boxes {
                if !covered_by(&rb.index_box(), parent_regions) {
                    return Err(ConfigurationError::MissingParentBox {
                        level: *level,
                        parent: level.saturating_sub(1),
                        box_id: rb.id.clone(),
                    });
                }
            }
            let mut refined: Vec<IndexBox> = level_boxes
                .iter()
                .map(|rb| rb.index_box().refine(REFINEMENT_RATIO))
                .collect();
            refined.sort();
            regions.push(refined);
        }
        Ok(regions)
    }

    fn check_level(&self, level: usize, rb: &RefinementBox) -> Result<(), ConfigurationError> {
        let requested = level.saturating_add(1);
        if requested.saturating_add(1) > self.max_levels {
            return Err(ConfigurationError::LevelExceedsMaximum {
                level,
                box_id: rb.id.clone(),
                requested,
                max_nbr_levels: self.max_levels,
            });
        }
        if self.domain.domain_box(requested).is_none() {
            return Err(ConfigurationError::LevelOutOfRange { level: requested });
        }
        Ok(())
    }

    fn check_inside(&self, rb: &RefinementBox) -> Result<(), ConfigurationError> {
        let dim = self.domain.dim();
        for found in [rb.lower.len(), rb.upper.len()] {
            if found != dim {
                return Err(ConfigurationError::MismatchedDimension {
                    field: "refinement_boxes",
                    dim,
                    found,
                });
            }
        }
        let level_domain = self
            .domain
            .domain_box(rb.level)
            .ok_or(ConfigurationError::LevelOutOfRange { level: rb.level })?;
        let inside = (0..dim).all(|d| {
            let (lo, up) = (level_domain.lower()[d], level_domain.upper()[d]);
            (lo..=up).contains(&rb.lower[d]) && (lo..=up).contains(&rb.upper[d])
        });
        if !inside {
            return Err(ConfigurationError::BoxOutOfDomain {
                level: rb.level,
                box_id: rb.id.clone(),
                lower: rb.lower.clone(),
                upper: rb.upper.clone(),
                domain: level_domain.upper().to_vec(),
            });
        }
        Ok(())
    }
}

fn check_ordered(rb: &RefinementBox) -> Result<(), ConfigurationError> {
    match (0..rb.lower.len()).find(|&d| rb.lower[d] > rb.upper[d]) {
        Some(axis) => Err(ConfigurationError::InvertedBox {
            level: rb.level,
            box_id: rb.id.clone(),
            axis,
        }),
        None => Ok(()),
    }
}

fn check_disjoint(level: usize, boxes: &[&RefinementBox]) -> Result<(), ConfigurationError> {
    for (i, first) in boxes.iter().enumerate() {
        let a = first.index_box();
        if let Some(second) = boxes[i + 1..].iter().find(|b| a.intersects(&b.index_box())) {
            return Err(ConfigurationError::OverlappingBoxes {
                level,
                first: first.id.clone(),
                second: second.id.clone(),
            });
        }
    }
    Ok(())
}

/// True when every cell of `bx` lies in one of the disjoint `regions`.
pub(crate) fn covered_by(bx: &IndexBox, regions: &[IndexBox]) -> bool {
    let covered: u64 = regions.iter().map(|r| bx.intersection(r).num_cells()).sum();
    covered == bx.num_cells()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HierarchyConfig;

    fn domain55() -> Domain {
        Domain::new(&[55], &[0.2]).unwrap()
    }

    fn boxes(cfg: HierarchyConfig) -> RefinementBoxes {
        cfg.refinement_boxes
    }

    #[test]
    fn single_box_gives_two_levels_of_regions() {
        let b = boxes(HierarchyConfig::default().with_box(0, "B0", &[10], &[14]));
        let regions = GeometryValidator::new(&domain55(), 2).validate(&b).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[1], vec![IndexBox::new(&[20], &[29])]);
    }

    #[test]
    fn out_of_domain_rejected() {
        let b = boxes(HierarchyConfig::default().with_box(0, "B0", &[5], &[65]));
        let err = GeometryValidator::new(&domain55(), 2).validate(&b).unwrap_err();
        assert!(matches!(err, ConfigurationError::BoxOutOfDomain { level: 0, .. }));
    }

    #[test]
    fn inverted_rejected() {
        let b = boxes(HierarchyConfig::default().with_box(0, "B0", &[14], &[10]));
        let err = GeometryValidator::new(&domain55(), 2).validate(&b).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvertedBox { axis: 0, .. }));
    }

    #[test]
    fn overlap_rejected() {
        let b = boxes(
            HierarchyConfig::default()
                .with_box(0, "B0", &[10], &[20])
                .with_box(0, "B1", &[20], &[30]),
        );
        let err = GeometryValidator::new(&domain55(), 2).validate(&b).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::OverlappingBoxes {
                level: 0,
                first: "B0".into(),
                second: "B1".into()
            }
        );
    }

    #[test]
    fn nesting_required() {
        // L1 box outside the refined L0 box [20, 29]
        let b = boxes(
            HierarchyConfig::default()
                .with_box(0, "B0", &[10], &[14])
                .with_box(1, "B1", &[40], &[45]),
        );
        let err = GeometryValidator::new(&domain55(), 3).validate(&b).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingParentBox { level: 1, .. }));

        // L1 box without any L0 box
        let b = boxes(HierarchyConfig::default().with_box(1, "B1", &[20], &[25]));
        let err = GeometryValidator::new(&domain55(), 3).validate(&b).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingParentBox { level: 1, .. }));

        let b = boxes(
            HierarchyConfig::default()
                .with_box(0, "B0", &[10], &[14])
                .with_box(1, "B1", &[22], &[27]),
        );
        let regions = GeometryValidator::new(&domain55(), 3).validate(&b).unwrap();
        assert_eq!(regions[2], vec![IndexBox::new(&[44], &[55])]);
    }

    #[test]
    fn level_limit() {
        let b = boxes(HierarchyConfig::default().with_box(0, "B0", &[10], &[50]));
        let err = GeometryValidator::new(&domain55(), 1).validate(&b).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::LevelExceedsMaximum { level: 0, requested: 1, max_nbr_levels: 1, .. }
        ));
    }

    #[test]
    fn level_limit_is_checked_before_geometry() {
        // out of the domain too, but the level request is the first rule
        let b = boxes(HierarchyConfig::default().with_box(63, "B0", &[0], &[1]));
        let err = GeometryValidator::new(&domain55(), 2).validate(&b).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::LevelExceedsMaximum { level: 63, requested: 64, .. }
        ));

        let err = GeometryValidator::new(&domain55(), usize::MAX).validate(&b).unwrap_err();
        assert_eq!(err, ConfigurationError::LevelOutOfRange { level: 64 });
    }

    #[test]
    fn rules_are_checked_in_order_across_boxes() {
        // B0 overlaps B1 and B2 is inverted: inversion is the earlier rule
        let b = boxes(
            HierarchyConfig::default()
                .with_box(0, "B0", &[10], &[20])
                .with_box(0, "B1", &[15], &[25])
                .with_box(0, "B2", &[40], &[35]),
        );
        let err = GeometryValidator::new(&domain55(), 2).validate(&b).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvertedBox { ref box_id, .. } if box_id == "B2"));

        // containment runs over both levels before ordering
        let b = boxes(
            HierarchyConfig::default()
                .with_box(0, "B0", &[14], &[10])
                .with_box(1, "B1", &[200], &[210]),
        );
        let err = GeometryValidator::new(&domain55(), 3).validate(&b).unwrap_err();
        assert!(matches!(err, ConfigurationError::BoxOutOfDomain { level: 1, .. }));
    }

    #[test]
    fn empty_level_is_valid() {
        let mut b = RefinementBoxes::new();
        b.insert(0, Default::default());
        let regions = GeometryValidator::new(&domain55(), 1).validate(&b).unwrap();
        assert_eq!(regions.len(), 1);
    }
}
