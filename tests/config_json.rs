use amr_hierarchy::config::{AxisValue, HierarchyConfig, RefinementMode, SimulationConfig};
use amr_hierarchy::geometry::IndexBox;
use amr_hierarchy::hierarchy_error::ConfigurationError;

#[test]
fn parses_the_dictionary_form() {
    let cfg: SimulationConfig = serde_json::from_str(
        r#"{
            "cells": 65,
            "dl": 0.2,
            "max_nbr_levels": 2,
            "smallest_patch_size": 5,
            "largest_patch_size": 64,
            "refinement": "boxes",
            "refinement_boxes": {"L0": {"B0": [[10], [14]]}}
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.domain.cells(), &[65]);
    assert_eq!(cfg.hierarchy.smallest_patch_size, Some(AxisValue::Scalar(5)));
    let resolved = cfg.resolve().unwrap();
    assert_eq!(resolved.max_levels, 2);
    assert_eq!(resolved.static_regions[1], vec![IndexBox::new(&[20], &[29])]);
}

#[test]
fn per_axis_values_and_tagging_mode() {
    let cfg: SimulationConfig = serde_json::from_str(
        r#"{
            "cells": [40, 20],
            "dl": [0.3, 0.3],
            "boundary_types": "periodic",
            "refinement": "tagging",
            "max_nbr_levels": 3,
            "smallest_patch_size": [10, 5],
            "largest_patch_size": [20, 20]
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.domain.dim(), 2);
    assert_eq!(cfg.hierarchy.refinement, RefinementMode::Tagging);
    let resolved = cfg.resolve().unwrap();
    assert_eq!(resolved.bounds().smallest(1), 5);
}

#[test]
fn bad_inputs_are_parse_errors() {
    let bad_mode = serde_json::from_str::<SimulationConfig>(
        r#"{"cells": 10, "dl": 0.1, "refinement": "magic"}"#,
    );
    assert!(bad_mode.is_err());

    let bad_key = serde_json::from_str::<SimulationConfig>(
        r#"{"cells": 10, "dl": 0.1, "refinement_boxes": {"X0": {"B0": [[1], [2]]}}}"#,
    );
    assert!(bad_key.unwrap_err().to_string().contains("X0"));

    let bad_dim = serde_json::from_str::<SimulationConfig>(r#"{"cells": [10, 10], "dl": [0.1]}"#);
    assert!(bad_dim.is_err());
}

#[test]
fn hierarchy_config_round_trips() {
    let cfg = HierarchyConfig::default()
        .with_max_levels(3)
        .with_patch_sizes(4, 16)
        .with_box(0, "B0", &[2], &[9])
        .with_box(1, "B1", &[6], &[11]);
    let text = serde_json::to_string(&cfg).unwrap();
    assert!(text.contains("\"L1\""));
    let back: HierarchyConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn inverted_sizes_rejected_from_json() {
    let cfg: SimulationConfig = serde_json::from_str(
        r#"{"cells": 65, "dl": 0.2, "smallest_patch_size": 100, "largest_patch_size": 64}"#,
    )
    .unwrap();
    assert!(matches!(
        cfg.resolve(),
        Err(ConfigurationError::PatchSizeBoundsInverted { .. })
    ));
}

#[test]
fn deep_level_keys_are_errors_not_panics() {
    let parse = |json: &str| serde_json::from_str::<SimulationConfig>(json).unwrap();

    let cfg = parse(
        r#"{"cells": 55, "dl": 0.2, "max_nbr_levels": 2, "refinement": "boxes",
            "refinement_boxes": {"L63": {"B0": [[0], [1]]}}}"#,
    );
    assert!(matches!(
        cfg.resolve(),
        Err(ConfigurationError::LevelExceedsMaximum { level: 63, requested: 64, max_nbr_levels: 2, .. })
    ));

    // without max_nbr_levels the box asks for level 64, which 55 cells cannot index
    let cfg = parse(r#"{"cells": 55, "dl": 0.2, "refinement_boxes": {"L63": {"B0": [[0], [1]]}}}"#);
    assert_eq!(cfg.resolve(), Err(ConfigurationError::LevelOutOfRange { level: 64 }));

    let cfg = parse(
        r#"{"cells": 55, "dl": 0.2, "refinement_boxes": {"L18446744073709551615": {"B0": [[0], [1]]}}}"#,
    );
    assert!(matches!(cfg.resolve(), Err(ConfigurationError::LevelOutOfRange { .. })));

    let cfg = parse(r#"{"cells": 55, "dl": 0.2, "refinement": "tagging", "max_nbr_levels": 80}"#);
    assert_eq!(cfg.resolve(), Err(ConfigurationError::LevelOutOfRange { level: 79 }));
}

#[test]
fn cluster_efficiency_out_of_range() {
    let cfg: SimulationConfig =
        serde_json::from_str(r#"{"cells": 55, "dl": 0.2, "cluster_efficiency": 1.5}"#).unwrap();
    assert_eq!(
        cfg.resolve(),
        Err(ConfigurationError::InvalidClusterEfficiency(1.5))
    );
}
