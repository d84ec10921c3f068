//! Level-by-level hierarchy construction.
//!
//! Level 0 tiles the whole domain. Each further level is either read from
//! the validated static regions or derived from the tags of the level below:
//! tags are gathered from every worker, clustered per region, grown to
//! admissible patch sizes and refined.
//!
//! Every worker takes the same collective steps in the same order, whatever
//! it owns:
//!
//! | step            | op              | contribution          |
//! |-----------------|-----------------|-----------------------|
//! | per level       | `BoxDigest`     | the level's patch boxes |
//! | per level       | `PatchCount`    | number of local patches |
//! | tagging only    | `GatherTags`    | local tagged cells    |
//! | per transition  | `AnyBoxes`      | "next level is non-empty" |
//! | per transition  | `LevelComplete` | nothing               |
//!
//! A failure detected between two collectives is identical on every worker
//! (it depends only on data all of them have seen), so all of them leave at
//! the same step.

use super::level::{Level, PatchHierarchy};
use super::patch::{Patch, PatchDescriptor, PatchId};
use crate::algs::cluster::{Cell, ClusterConfig, cluster_cells, merge_overlapping};
use crate::algs::communicator::Communicator;
use crate::algs::load_balance::assign_owners;
use crate::algs::synchronizer::{CollectiveOp, HierarchySynchronizer};
use crate::algs::wire::{WireCount, cast_slice, decode_cells, encode_cells};
use crate::config::{RefinementMode, ResolvedConfig, SimulationConfig};
use crate::debug_invariants::DebugInvariants;
use crate::geometry::{Domain, IndexBox, REFINEMENT_RATIO};
use crate::hierarchy_error::{ConfigurationError, CoordinationFailure, HierarchyError};
use crate::model::FieldInitializer;
use crate::tagging::{TaggingEngine, tag_patches};
use std::mem::size_of;

const TAGS_OK: u64 = 0;
const TAGS_INVALID: u64 = 1;

pub struct RefinementHierarchyBuilder<'a, C: Communicator> {
    domain: Domain,
    config: ResolvedConfig,
    comm: &'a C,
    tagger: Option<&'a dyn TaggingEngine>,
    initializer: Option<&'a dyn FieldInitializer>,
}

impl<'a, C: Communicator> RefinementHierarchyBuilder<'a, C> {
    /// Validate `config` and prepare a builder. No hierarchy exists until
    /// [`build`](Self::build) succeeds.
    pub fn new(config: &SimulationConfig, comm: &'a C) -> Result<Self, ConfigurationError> {
        let resolved = config.resolve()?;
        Ok(Self {
            domain: config.domain.clone(),
            config: resolved,
            comm,
            tagger: None,
            initializer: None,
        })
    }

    pub fn with_tagger(mut self, tagger: &'a dyn TaggingEngine) -> Self {
        self.tagger = Some(tagger);
        self
    }

    pub fn with_initializer(mut self, initializer: &'a dyn FieldInitializer) -> Self {
        self.initializer = Some(initializer);
        self
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    fn check_ready(&self) -> Result<(), ConfigurationError> {
        if self.config.mode == RefinementMode::Tagging && self.tagger.is_none() {
            return Err(ConfigurationError::MissingTagger);
        }
        Ok(())
    }

    /// Build every level. On error nothing is returned; the partial levels
    /// are dropped.
    pub fn build(&self) -> Result<PatchHierarchy, HierarchyError> {
        self.check_ready()?;
        let mut hierarchy = PatchHierarchy::new(
            self.domain.clone(),
            self.config.clone(),
            self.comm.rank(),
            self.comm.size(),
        );
        let mut sync = HierarchySynchronizer::new(self.comm);
        let result = self.build_levels(&mut sync, &mut hierarchy.levels);
        hierarchy.collectives = sync.log().to_vec();
        result?;

        hierarchy.debug_assert_invariants("after build");
        log::info!(
            "[rank {}/{}] built {} levels: {:?} patches, {} local",
            hierarchy.rank(),
            hierarchy.size(),
            hierarchy.num_levels(),
            hierarchy
                .levels()
                .iter()
                .map(Level::global_patch_count)
                .collect::<Vec<_>>(),
            hierarchy.local_patch_count()
        );
        Ok(hierarchy)
    }

    /// Drop every level above 0 and rebuild them from the current level-0
    /// data. On error only level 0 is left.
    pub fn regrid(&self, hierarchy: &mut PatchHierarchy) -> Result<(), HierarchyError> {
        self.check_ready()?;
        hierarchy.levels.truncate(1);
        let mut sync = HierarchySynchronizer::new(self.comm);
        let result = self.build_levels(&mut sync, &mut hierarchy.levels);
        hierarchy.collectives.extend_from_slice(sync.log());
        if result.is_err() {
            hierarchy.levels.truncate(1);
        }
        result?;
        hierarchy.debug_assert_invariants("after regrid");
        Ok(())
    }

    fn build_levels(
        &self,
        sync: &mut HierarchySynchronizer<'_, C>,
        levels: &mut Vec<Level>,
    ) -> Result<(), HierarchyError> {
        if levels.is_empty() {
            let base = vec![self.domain.base_box()];
            levels.push(self.make_level(sync, 0, base)?);
        }
        while let Some(current) = levels.last_mut() {
            let ln = current.number();
            let next = if ln + 1 < self.config.max_levels {
                self.next_regions(sync, current)?
            } else {
                Vec::new()
            };
            let more = sync.any(CollectiveOp::AnyBoxes, !next.is_empty())?;
            sync.barrier(CollectiveOp::LevelComplete)?;
            if !more {
                break;
            }
            levels.push(self.make_level(sync, ln + 1, next)?);
        }
        Ok(())
    }

    /// Tile `regions`, assign owners and create the local patches.
    fn make_level(
        &self,
        sync: &mut HierarchySynchronizer<'_, C>,
        ln: usize,
        regions: Vec<IndexBox>,
    ) -> Result<Level, HierarchyError> {
        let mut boxes = Vec::new();
        for region in &regions {
            boxes.extend(self.config.solver.partition(region, ln)?);
        }
        let owners = assign_owners(&boxes, self.comm.size());
        let rank = self.comm.rank();
        let descriptors: Vec<PatchDescriptor> = boxes
            .iter()
            .zip(&owners)
            .enumerate()
            .map(|(index, (cells, &owner))| PatchDescriptor {
                id: PatchId::new(ln, index),
                cells: *cells,
                owner,
            })
            .collect();
        let patches: Vec<Patch> = descriptors
            .iter()
            .filter(|d| d.owner == rank)
            .map(|d| self.create_patch(ln, d))
            .collect();

        sync.agree_on_boxes(ln, &boxes)?;
        let reported = sync.all_reduce_sum(CollectiveOp::PatchCount, patches.len() as u64)?;
        let expected = descriptors.len() as u64;
        if reported != expected {
            return Err(CoordinationFailure::PatchCountMismatch {
                level: ln,
                expected,
                reported,
            }
            .into());
        }
        log::debug!(
            "[rank {rank}] level {ln}: {} regions, {} patches, {} local",
            regions.len(),
            descriptors.len(),
            patches.len()
        );
        Ok(Level::new(ln, regions, descriptors, patches))
    }

    fn create_patch(&self, ln: usize, descriptor: &PatchDescriptor) -> Patch {
        let mut patch = Patch::new(descriptor.clone());
        if let Some(init) = self.initializer {
            for data in init.initialize(&self.domain, ln, &descriptor.cells) {
                patch.insert(data);
            }
        }
        patch
    }

    /// Regions of level `current + 1`, in that level's index space.
    fn next_regions(
        &self,
        sync: &mut HierarchySynchronizer<'_, C>,
        current: &mut Level,
    ) -> Result<Vec<IndexBox>, HierarchyError> {
        match self.config.mode {
            RefinementMode::Boxes => Ok(self
                .config
                .static_regions
                .get(current.number() + 1)
                .cloned()
                .unwrap_or_default()),
            RefinementMode::Tagging => self.tagged_regions(sync, current),
        }
    }

    fn tagged_regions(
        &self,
        sync: &mut HierarchySynchronizer<'_, C>,
        level: &mut Level,
    ) -> Result<Vec<IndexBox>, HierarchyError> {
        let tagger = self.tagger.ok_or(ConfigurationError::MissingTagger)?;
        let ln = level.number();
        let local = tag_patches(tagger, &self.domain, ln, level.patches_mut());

        // A worker with bad tags still takes part, flagging the failure.
        let mut payload = Vec::new();
        match &local {
            Ok(_) => {
                let mut cells = Vec::new();
                for patch in level.patches() {
                    if let Some(tags) = patch.tags() {
                        cells.extend(tags.tagged_cells());
                    }
                }
                payload.extend_from_slice(cast_slice(&[WireCount::new(TAGS_OK)]));
                payload.extend(encode_cells(&cells));
            }
            Err(_) => payload.extend_from_slice(cast_slice(&[WireCount::new(TAGS_INVALID)])),
        }
        let parts = sync.all_gather(CollectiveOp::GatherTags, &payload)?;
        local?;

        let mut cells: Vec<Cell> = Vec::new();
        for (rank, part) in parts.iter().enumerate() {
            let malformed = |reason: String| CoordinationFailure::MalformedMessage { peer: rank, reason };
            let (head, body) = part
                .split_at_checked(size_of::<WireCount>())
                .ok_or_else(|| malformed("missing tag status".into()))?;
            if bytemuck::pod_read_unaligned::<WireCount>(head).get() != TAGS_OK {
                return Err(CoordinationFailure::PeerFailed {
                    rank,
                    op: format!("tagging of level {ln}"),
                }
                .into());
            }
            cells.extend(decode_cells(body).map_err(malformed)?);
        }
        Ok(self.cluster_regions(level, &cells))
    }

    /// Cluster the gathered tags of `level` region by region and return the
    /// refined boxes, sorted.
    fn cluster_regions(&self, level: &Level, cells: &[Cell]) -> Vec<IndexBox> {
        let dim = self.domain.dim();
        let cfg = ClusterConfig::new(self.config.cluster_efficiency);
        let mut next = Vec::new();
        for region in level.regions() {
            let inside: Vec<Cell> = cells
                .iter()
                .copied()
                .filter(|c| region.contains_cell(&c[..dim]))
                .collect();
            if inside.is_empty() {
                continue;
            }
            let clusters = cluster_cells(&inside, dim, &cfg);
            let fitted = self.fit_in_region(&clusters, region, level.number());
            next.extend(fitted.iter().map(|b| b.refine(REFINEMENT_RATIO)));
        }
        next.sort();
        log::debug!(
            "level {}: {} tagged cells -> {} boxes for level {}",
            level.number(),
            cells.len(),
            next.len(),
            level.number() + 1
        );
        next
    }

    /// Grow and merge `clusters` until each is disjoint from the others and
    /// refines to an admissible patch extent.
    fn fit_in_region(&self, clusters: &[IndexBox], region: &IndexBox, ln: usize) -> Vec<IndexBox> {
        let fit = |b: &IndexBox| self.fit_box(b, region, ln);
        let mut boxes = merge_overlapping(clusters.iter().map(fit).collect());
        loop {
            let refit: Vec<IndexBox> = boxes.iter().map(fit).collect();
            if refit == boxes {
                return boxes;
            }
            boxes = merge_overlapping(refit);
        }
    }

    fn fit_box(&self, b: &IndexBox, region: &IndexBox, ln: usize) -> IndexBox {
        let solver = &self.config.solver;
        let mut out = *b;
        for axis in 0..b.dim() {
            let extent = b.extent(axis);
            let Some(c) =
                solver.fit_refined_extent(extent, region.extent(axis), REFINEMENT_RATIO, axis)
            else {
                log::warn!(
                    "level {ln}: tagged box {b} cannot be sized within region {region}; using the whole region"
                );
                return *region;
            };
            let (rlo, rup) = (region.lower()[axis], region.upper()[axis]);
            let extra = c - extent;
            let mut lo = b.lower()[axis] - extra / 2;
            let mut up = lo + c - 1;
            if lo < rlo {
                up += rlo - lo;
                lo = rlo;
            }
            if up > rup {
                lo -= up - rup;
                up = rup;
            }
            out = out.with_axis(axis, lo, up);
        }
        out
    }
}
