mod util;

use amr_hierarchy::config::{HierarchyConfig, RefinementMode, SimulationConfig};
use amr_hierarchy::data::{Centering, TagField};
use amr_hierarchy::diagnostics::{HierarchyDiagnosticView, is_tag_quantity};
use amr_hierarchy::geometry::{Domain, IndexBox};
use amr_hierarchy::hierarchy::{Patch, RefinementHierarchyBuilder};
use amr_hierarchy::hierarchy_error::{CoordinationFailure, HierarchyError, TagFieldError};
use amr_hierarchy::model::ProfileInitializer;
use amr_hierarchy::tagging::{FnTagger, GradientTagger, TagContext};
use util::{WORKER_COUNTS, run_workers};

fn bump(x: &[f64]) -> f64 {
    1.0 + 4.0 * (-((x[0] - 4.5) / 0.8).powi(2)).exp()
}

fn tagging_config(smallest: i64, largest: i64) -> SimulationConfig {
    SimulationConfig::new(
        Domain::new(&[40], &[0.3]).unwrap(),
        HierarchyConfig::default()
            .with_mode(RefinementMode::Tagging)
            .with_max_levels(3)
            .with_patch_sizes(smallest, largest),
    )
}

#[test]
fn boxes_do_not_depend_on_worker_count() {
    let init = ProfileInitializer::new().with_profile("density", Centering::Cell, bump);
    let tagger = GradientTagger::new("density");

    for (s, l) in [(10, 20), (20, 20), (20, 40)] {
        let cfg = tagging_config(s, l);
        let mut reference: Option<Vec<Vec<IndexBox>>> = None;
        for n in WORKER_COUNTS {
            let per_rank = run_workers(n, |comm| {
                let h = RefinementHierarchyBuilder::new(&cfg, comm)
                    .unwrap()
                    .with_tagger(&tagger)
                    .with_initializer(&init)
                    .build()
                    .unwrap();
                let view = HierarchyDiagnosticView::new(&h);
                for level in view.levels().iter().take(h.num_levels() - 1) {
                    for patch in level.patches() {
                        let tags = view.tags(patch).expect("tagged level without tags");
                        assert!(is_tag_quantity(tags.name()));
                        assert!(tags.as_i32().unwrap().iter().all(|&v| v == 0 || v == 1));
                    }
                }
                h.levels()
                    .iter()
                    .map(|l| l.descriptors().iter().map(|d| d.cells).collect::<Vec<_>>())
                    .collect::<Vec<_>>()
            });
            assert!(per_rank.iter().all(|b| b == &per_rank[0]));
            assert!(per_rank[0].len() >= 2, "({s}, {l}): nothing was refined");
            match &reference {
                None => reference = Some(per_rank[0].clone()),
                Some(r) => assert_eq!(r, &per_rank[0], "({s}, {l}) with {n} workers"),
            }
        }
    }
}

#[test]
fn refined_patches_respect_size_bounds() {
    let init = ProfileInitializer::new().with_profile("density", Centering::Cell, bump);
    let tagger = GradientTagger::new("density");
    let cfg = tagging_config(20, 20);
    let sizes = run_workers(2, |comm| {
        let h = RefinementHierarchyBuilder::new(&cfg, comm)
            .unwrap()
            .with_tagger(&tagger)
            .with_initializer(&init)
            .build()
            .unwrap();
        h.levels()
            .iter()
            .flat_map(|l| l.descriptors().iter().map(|d| d.cells.extent(0)))
            .collect::<Vec<_>>()
    });
    assert!(sizes[0].iter().all(|&e| e == 20));
}

#[test]
fn invalid_tags_fail_every_worker() {
    let cfg = tagging_config(10, 20);
    let bad = FnTagger(|p: &Patch, _: &TagContext| {
        let mut values = vec![0; p.cells().num_cells() as usize];
        if p.id().index == 1 {
            values[3] = 2;
        }
        TagField::from_values(p.cells(), values, "test").unwrap()
    });
    let results = run_workers(2, |comm| {
        RefinementHierarchyBuilder::new(&cfg, comm)
            .unwrap()
            .with_tagger(&bad)
            .build()
            .map(|h| h.num_levels())
    });
    // patch 1 lives on rank 1
    assert!(matches!(
        &results[0],
        Err(HierarchyError::Coordination(CoordinationFailure::PeerFailed { rank: 1, .. }))
    ));
    assert!(matches!(
        &results[1],
        Err(HierarchyError::InvalidTags(TagFieldError::InvalidValue { value: 2, .. }))
    ));
}

#[test]
fn nothing_tagged_stops_at_level_zero() {
    let cfg = tagging_config(10, 20);
    let none = FnTagger(|p: &Patch, _: &TagContext| TagField::zeros(p.cells()));
    for n in WORKER_COUNTS {
        let levels = run_workers(n, |comm| {
            RefinementHierarchyBuilder::new(&cfg, comm)
                .unwrap()
                .with_tagger(&none)
                .build()
                .unwrap()
                .num_levels()
        });
        assert!(levels.iter().all(|&l| l == 1));
    }
}

#[test]
fn regrid_rebuilds_the_same_levels() {
    let init = ProfileInitializer::new().with_profile("density", Centering::Cell, bump);
    let tagger = GradientTagger::new("density");
    let cfg = tagging_config(10, 20);
    let same = run_workers(2, |comm| {
        let builder = RefinementHierarchyBuilder::new(&cfg, comm)
            .unwrap()
            .with_tagger(&tagger)
            .with_initializer(&init);
        let mut h = builder.build().unwrap();
        let before: Vec<_> = h.levels().iter().map(|l| l.regions().to_vec()).collect();
        builder.regrid(&mut h).unwrap();
        let after: Vec<_> = h.levels().iter().map(|l| l.regions().to_vec()).collect();
        before == after
    });
    assert!(same.iter().all(|&s| s));
}

fn bump_2d(x: &[f64]) -> f64 {
    let r2 = ((x[0] - 4.5) / 0.8).powi(2) + ((x[1] - 7.0) / 0.8).powi(2);
    1.0 + 4.0 * (-r2).exp()
}

#[test]
fn planar_boxes_do_not_depend_on_worker_count() {
    let init = ProfileInitializer::new().with_profile("density", Centering::Cell, bump_2d);
    let tagger = GradientTagger::new("density");

    for (s, l) in [(10, 20), (20, 40)] {
        let cfg = SimulationConfig::new(
            Domain::new(&[40, 40], &[0.3, 0.3]).unwrap(),
            HierarchyConfig::default()
                .with_mode(RefinementMode::Tagging)
                .with_max_levels(3)
                .with_patch_sizes(s, l),
        );
        let mut reference: Option<Vec<Vec<IndexBox>>> = None;
        for n in WORKER_COUNTS {
            let per_rank = run_workers(n, |comm| {
                let h = RefinementHierarchyBuilder::new(&cfg, comm)
                    .unwrap()
                    .with_tagger(&tagger)
                    .with_initializer(&init)
                    .build()
                    .unwrap();
                let view = HierarchyDiagnosticView::new(&h);
                let owns_tagged = view
                    .levels()
                    .iter()
                    .take(h.num_levels() - 1)
                    .any(|level| !level.patches().is_empty());
                let sees_tags = view.quantities().iter().any(|q| is_tag_quantity(q));
                assert_eq!(owns_tagged, sees_tags);
                let owns_any = view.levels().iter().any(|level| !level.patches().is_empty());
                assert_eq!(owns_any, view.physical_quantities().contains("density"));
                let boxes = h
                    .levels()
                    .iter()
                    .map(|l| l.descriptors().iter().map(|d| d.cells).collect::<Vec<_>>())
                    .collect::<Vec<_>>();
                (boxes, sees_tags)
            });
            assert!(per_rank.iter().any(|(_, tags)| *tags), "({s}, {l}) with {n} workers");
            let boxes = &per_rank[0].0;
            assert!(per_rank.iter().all(|(b, _)| b == boxes));
            assert!(boxes.len() >= 2, "({s}, {l}): nothing was refined");
            assert!(boxes[1..].iter().flatten().all(|b| b.dim() == 2));
            match &reference {
                None => reference = Some(boxes.clone()),
                Some(r) => assert_eq!(r, boxes, "({s}, {l}) with {n} workers"),
            }
        }
    }
}
