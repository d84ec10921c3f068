use amr_hierarchy::config::HierarchyConfig;
use amr_hierarchy::geometry::Domain;
use amr_hierarchy::hierarchy_error::ConfigurationError;
use amr_hierarchy::validation::{GeometryValidator, PatchSizeBounds, PatchSizeConstraintSolver};
use proptest::prelude::*;

fn domain(cells: i64) -> Domain {
    Domain::new(&[cells], &[0.1]).unwrap()
}

proptest! {
    #[test]
    fn inverted_or_out_of_domain_boxes_are_rejected(
        cells in 8i64..100,
        lo in -20i64..120,
        hi in -20i64..120,
    ) {
        let cfg = HierarchyConfig::default().with_box(0, "B0", &[lo], &[hi]);
        let inside = (0..cells).contains(&lo) && (0..cells).contains(&hi);
        let result = cfg.resolve(&domain(cells));
        if lo > hi || !inside {
            let rejected = matches!(
                result,
                Err(ConfigurationError::InvertedBox { .. }) | Err(ConfigurationError::BoxOutOfDomain { .. })
            );
            prop_assert!(rejected);
        } else {
            prop_assert!(result.is_ok());
        }
    }

    #[test]
    fn inverted_bounds_rejected_regardless_of_boxes(
        largest in 1i64..50,
        gap in 1i64..50,
        with_box in any::<bool>(),
    ) {
        let mut cfg = HierarchyConfig::default().with_patch_sizes(largest + gap, largest);
        if with_box {
            cfg = cfg.with_box(0, "B0", &[1], &[4]);
        }
        let inverted = matches!(
            cfg.resolve(&domain(200)),
            Err(ConfigurationError::PatchSizeBoundsInverted { .. })
        );
        prop_assert!(inverted);
    }

    #[test]
    fn validation_is_idempotent(
        cells in 16i64..128,
        lo in 0i64..8,
        len in 1i64..8,
        smallest in 1i64..6,
        extra in 0i64..30,
    ) {
        let d = domain(cells);
        let cfg = HierarchyConfig::default()
            .with_patch_sizes(smallest, smallest + extra)
            .with_box(0, "B0", &[lo], &[lo + len - 1]);

        let first = cfg.resolve(&d);
        let second = cfg.resolve(&d);
        prop_assert_eq!(first, second);

        let validator = GeometryValidator::new(&d, 2);
        prop_assert_eq!(validator.validate(&cfg.refinement_boxes), validator.validate(&cfg.refinement_boxes));

        let solver = PatchSizeConstraintSolver::new(PatchSizeBounds::new(vec![smallest], vec![Some(smallest + extra)]));
        prop_assert_eq!(solver.validate_bounds(), solver.validate_bounds());
        prop_assert_eq!(solver.split_extent(cells, 0), solver.split_extent(cells, 0));
    }
}
