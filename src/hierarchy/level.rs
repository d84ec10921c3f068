//! Levels and the hierarchy handle.

use super::patch::{Patch, PatchDescriptor, PatchId};
use crate::algs::synchronizer::CollectiveRecord;
use crate::config::ResolvedConfig;
use crate::geometry::{Domain, IndexBox, REFINEMENT_RATIO};

/// One resolution tier.
///
/// `regions` are the disjoint boxes selected for this level (the whole
/// domain on level 0) and `descriptors` are the patches tiling them, in
/// global index order. `patches` holds only the patches this worker owns.
#[derive(Clone, Debug, PartialEq)]
pub struct Level {
    number: usize,
    regions: Vec<IndexBox>,
    descriptors: Vec<PatchDescriptor>,
    patches: Vec<Patch>,
}

impl Level {
    pub(crate) fn new(
        number: usize,
        regions: Vec<IndexBox>,
        descriptors: Vec<PatchDescriptor>,
        patches: Vec<Patch>,
    ) -> Self {
        Self {
            number,
            regions,
            descriptors,
            patches,
        }
    }

    pub fn number(&self) -> usize {
        self.number
    }

    /// Ratio to the next coarser level; 1 on level 0.
    pub fn ratio(&self) -> i64 {
        if self.number == 0 { 1 } else { REFINEMENT_RATIO }
    }

    pub fn regions(&self) -> &[IndexBox] {
        &self.regions
    }

    /// All patches of the level, owned here or not.
    pub fn descriptors(&self) -> &[PatchDescriptor] {
        &self.descriptors
    }

    /// Patches owned by this worker, in index order.
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn patches_mut(&mut self) -> &mut [Patch] {
        &mut self.patches
    }

    pub fn patch(&self, id: PatchId) -> Option<&Patch> {
        self.patches.iter().find(|p| p.id() == id)
    }

    pub fn global_patch_count(&self) -> usize {
        self.descriptors.len()
    }

    pub fn local_patch_count(&self) -> usize {
        self.patches.len()
    }

    pub fn owned_by(&self, rank: usize) -> impl Iterator<Item = &PatchDescriptor> {
        self.descriptors.iter().filter(move |d| d.owner == rank)
    }

    pub fn num_cells(&self) -> u64 {
        self.descriptors.iter().map(|d| d.cells.num_cells()).sum()
    }
}

/// A built hierarchy on one worker.
///
/// Created by [`crate::hierarchy::RefinementHierarchyBuilder::build`] and
/// released with [`PatchHierarchy::teardown`].
#[derive(Debug)]
pub struct PatchHierarchy {
    domain: Domain,
    config: ResolvedConfig,
    rank: usize,
    size: usize,
    pub(crate) levels: Vec<Level>,
    pub(crate) collectives: Vec<CollectiveRecord>,
}

impl PatchHierarchy {
    pub(crate) fn new(domain: Domain, config: ResolvedConfig, rank: usize, size: usize) -> Self {
        Self {
            domain,
            config,
            rank,
            size,
            levels: Vec::new(),
            collectives: Vec::new(),
        }
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn level(&self, n: usize) -> Option<&Level> {
        self.levels.get(n)
    }

    pub fn level_mut(&mut self, n: usize) -> Option<&mut Level> {
        self.levels.get_mut(n)
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn finest_level(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Collective steps taken by this worker while building, in order.
    pub fn collective_log(&self) -> &[CollectiveRecord] {
        &self.collectives
    }

    pub fn local_patch_count(&self) -> usize {
        self.levels.iter().map(Level::local_patch_count).sum()
    }

    /// Release every level and its patches.
    pub fn teardown(self) {
        log::debug!(
            "[rank {}] tearing down {} levels, {} local patches",
            self.rank,
            self.levels.len(),
            self.local_patch_count()
        );
    }
}
