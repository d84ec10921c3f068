//! Patch ownership by greedy bin-packing.
//!
//! Patches are taken largest first (cell count) and each goes to the rank
//! with the smallest load so far; ties go to the lowest rank. Every worker
//! runs this on the same global patch list and gets the same owners, so no
//! exchange is needed to agree on ownership.

use crate::geometry::IndexBox;
use std::cmp::Reverse;

/// Owner rank of each patch, indexed like `patches`.
pub fn assign_owners(patches: &[IndexBox], n_ranks: usize) -> Vec<usize> {
    let n_ranks = n_ranks.max(1);
    let mut owners = vec![0; patches.len()];
    if n_ranks == 1 || patches.is_empty() {
        return owners;
    }

    // Stable sort keeps patch order among equal loads.
    let mut order: Vec<usize> = (0..patches.len()).collect();
    order.sort_by_key(|&i| Reverse(patches[i].num_cells()));

    let mut loads = vec![0u64; n_ranks];
    for idx in order {
        let (rank, _) = loads
            .iter()
            .enumerate()
            .min_by_key(|&(r, &load)| (load, r))
            .unwrap_or((0, &0));
        owners[idx] = rank;
        loads[rank] += patches[idx].num_cells();
    }
    owners
}
