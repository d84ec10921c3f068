mod util;

use amr_hierarchy::algs::communicator::Communicator;
use amr_hierarchy::algs::synchronizer::{CollectiveOp, HierarchySynchronizer};
use amr_hierarchy::config::HierarchyConfig;
use amr_hierarchy::debug_invariants::DebugInvariants;
use amr_hierarchy::geometry::IndexBox;
use amr_hierarchy::hierarchy::{PatchDescriptor, RefinementHierarchyBuilder};
use amr_hierarchy::hierarchy_error::ConfigurationError;
use util::{WORKER_COUNTS, run_workers, sim_1d};

#[test]
fn single_patch_levels_do_not_hang() {
    // L0 box [10, 14] in a 55-cell domain: one patch on level 0 and one on
    // level 1, so every worker but rank 0 owns nothing.
    let cfg = sim_1d(55, HierarchyConfig::default().with_box(0, "B0", &[10], &[14]));
    for n in WORKER_COUNTS {
        let results = run_workers(n, |comm| {
            let h = RefinementHierarchyBuilder::new(&cfg, comm)
                .unwrap()
                .build()
                .unwrap();
            h.validate_invariants().unwrap();
            let owned: Vec<usize> = h.levels().iter().map(|l| l.local_patch_count()).collect();
            let layout: Vec<Vec<PatchDescriptor>> =
                h.levels().iter().map(|l| l.descriptors().to_vec()).collect();

            // Any later collective over all workers still completes.
            let mut sync = HierarchySynchronizer::new(comm);
            let total = sync
                .all_reduce_sum(CollectiveOp::PatchCount, h.local_patch_count() as u64)
                .unwrap();
            sync.barrier(CollectiveOp::Barrier).unwrap();

            let ops: Vec<CollectiveOp> = h.collective_log().iter().map(|r| r.op).collect();
            h.teardown();
            (owned, total, ops, layout)
        });

        for (rank, (owned, total, ops, layout)) in results.iter().enumerate() {
            let expect = if rank == 0 { vec![1, 1] } else { vec![0, 0] };
            assert_eq!(owned, &expect, "{n} workers, rank {rank}");
            assert_eq!(*total, 2);
            assert_eq!(ops, &results[0].2, "ranks took different collective paths");
            assert_eq!(layout, &results[0].3, "{n} workers, rank {rank}");
        }
        let layout = &results[0].3;
        assert_eq!(layout.len(), 2);
        assert_eq!(layout[0][0].cells, IndexBox::new(&[0], &[54]));
        assert_eq!(layout[1][0].cells, IndexBox::new(&[20], &[29]));
        assert!(layout.iter().all(|l| l.len() == 1 && l[0].owner == 0));
    }
}

#[test]
fn whole_domain_box_is_one_patch() {
    let cfg = sim_1d(55, HierarchyConfig::default().with_box(0, "B0", &[0], &[54]));
    for n in WORKER_COUNTS {
        let layouts = run_workers(n, |comm| {
            let h = RefinementHierarchyBuilder::new(&cfg, comm)
                .unwrap()
                .build()
                .unwrap();
            h.levels()
                .iter()
                .map(|l| l.descriptors().to_vec())
                .collect::<Vec<_>>()
        });
        assert!(layouts.iter().all(|l| l == &layouts[0]));
        assert_eq!(layouts[0][1].len(), 1);
        assert_eq!(layouts[0][1][0].cells, IndexBox::new(&[0], &[109]));
    }
}

#[test]
fn wide_box_is_valid() {
    let cfg = sim_1d(65, HierarchyConfig::default().with_box(0, "B0", &[5], &[55]));
    for n in WORKER_COUNTS {
        let counts = run_workers(n, |comm| {
            let h = RefinementHierarchyBuilder::new(&cfg, comm)
                .unwrap()
                .build()
                .unwrap();
            assert_eq!(h.num_levels(), 2);
            assert_eq!(h.level(1).unwrap().regions(), &[IndexBox::new(&[10], &[111])]);
            h.local_patch_count()
        });
        assert_eq!(counts.iter().sum::<usize>(), 2);
    }
}

#[test]
fn patches_are_spread_over_workers() {
    let cfg = sim_1d(
        64,
        HierarchyConfig::default()
            .with_patch_sizes(8, 16)
            .with_box(0, "B0", &[8], &[39]),
    );
    let descriptors = run_workers(4, |comm| {
        let h = RefinementHierarchyBuilder::new(&cfg, comm)
            .unwrap()
            .build()
            .unwrap();
        let l1 = h.level(1).unwrap();
        assert_eq!(l1.local_patch_count(), l1.owned_by(comm.rank()).count());
        l1.descriptors().to_vec()
    });
    // level 1 region [16, 79]: 64 cells in four 16-cell patches, one per rank
    let owners: Vec<usize> = descriptors[0].iter().map(|d| d.owner).collect();
    assert_eq!(owners, vec![0, 1, 2, 3]);
    assert!(descriptors.iter().all(|d| d == &descriptors[0]));
}

#[test]
fn level_limit_rejected() {
    let cfg = sim_1d(
        65,
        HierarchyConfig::default()
            .with_max_levels(1)
            .with_box(0, "B0", &[10], &[50]),
    );
    assert!(matches!(
        cfg.resolve(),
        Err(ConfigurationError::LevelExceedsMaximum { level: 0, .. })
    ));
}

#[test]
fn box_outside_domain_rejected() {
    let cfg = sim_1d(55, HierarchyConfig::default().with_box(0, "B0", &[5], &[65]));
    assert!(matches!(
        cfg.resolve(),
        Err(ConfigurationError::BoxOutOfDomain { level: 0, .. })
    ));
}

#[test]
fn inverted_patch_sizes_rejected_without_boxes() {
    let cfg = sim_1d(65, HierarchyConfig::default().with_patch_sizes(100, 64));
    assert_eq!(
        cfg.resolve(),
        Err(ConfigurationError::PatchSizeBoundsInverted {
            axis: 0,
            smallest: 100,
            largest: 64
        })
    );
}

#[test]
fn invalid_configuration_never_reaches_the_workers() {
    let cfg = sim_1d(55, HierarchyConfig::default().with_box(0, "B0", &[5], &[65]));
    let errors = run_workers(2, |comm| RefinementHierarchyBuilder::new(&cfg, comm).err());
    assert!(errors.iter().all(Option::is_some));
}
