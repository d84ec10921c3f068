//! Patches: rectangular pieces of a level, each owned by one worker.

use crate::data::{PatchData, TAG_QUANTITY, TagField};
use crate::geometry::IndexBox;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Global patch identity. `index` orders the patches of a level and is the
/// same on every worker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatchId {
    pub level: usize,
    pub index: usize,
}

impl PatchId {
    pub fn new(level: usize, index: usize) -> Self {
        Self { level, index }
    }
}

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.level, self.index)
    }
}

/// What every worker knows about every patch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchDescriptor {
    pub id: PatchId,
    pub cells: IndexBox,
    /// Rank of the owning worker.
    pub owner: usize,
}

/// A patch owned by this worker, with its data.
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    descriptor: PatchDescriptor,
    data: BTreeMap<String, PatchData>,
}

impl Patch {
    pub fn new(descriptor: PatchDescriptor) -> Self {
        Self {
            descriptor,
            data: BTreeMap::new(),
        }
    }

    pub fn descriptor(&self) -> &PatchDescriptor {
        &self.descriptor
    }

    pub fn id(&self) -> PatchId {
        self.descriptor.id
    }

    pub fn cells(&self) -> &IndexBox {
        &self.descriptor.cells
    }

    pub fn owner(&self) -> usize {
        self.descriptor.owner
    }

    /// Add or replace a quantity.
    pub fn insert(&mut self, data: PatchData) -> Option<PatchData> {
        self.data.insert(data.name().to_string(), data)
    }

    pub fn remove(&mut self, name: &str) -> Option<PatchData> {
        self.data.remove(name)
    }

    pub fn data(&self, name: &str) -> Option<&PatchData> {
        self.data.get(name)
    }

    pub fn data_mut(&mut self, name: &str) -> Option<&mut PatchData> {
        self.data.get_mut(name)
    }

    /// Quantities in name order.
    pub fn datasets(&self) -> impl Iterator<Item = &PatchData> {
        self.data.values()
    }

    pub fn tags(&self) -> Option<TagField> {
        self.data(TAG_QUANTITY).and_then(TagField::from_patch_data)
    }
}
