//! Clustering of tagged cells into boxes (Berger–Rigoutsos).
//!
//! The input is a set of cell indices on one level. The bounding box of the
//! set is accepted when enough of its cells are tagged; otherwise it is cut
//! in two and each half is clustered again. Cut selection, in order:
//!
//! 1. the first hole (a zero in the signature) along the longest axis, then
//!    along the other axes;
//! 2. the strongest zero crossing of the signature's discrete Laplacian;
//! 3. the midpoint of the longest axis.
//!
//! Ties go to the lowest axis, then the lowest index. The output is sorted by
//! lower corner and depends only on the set of cells, never on their order
//! or on which worker tagged them.

use crate::geometry::{IndexBox, MAX_DIM};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EFFICIENCY: f64 = 0.7;

pub type Cell = [i64; MAX_DIM];

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Minimum fraction of tagged cells for a box to be accepted.
    pub efficiency: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            efficiency: DEFAULT_EFFICIENCY,
        }
    }
}

impl ClusterConfig {
    pub fn new(efficiency: f64) -> Self {
        Self { efficiency }
    }
}

/// Cluster `cells` (duplicates allowed) into disjoint boxes covering all of
/// them.
pub fn cluster_cells(cells: &[Cell], dim: usize, cfg: &ClusterConfig) -> Vec<IndexBox> {
    let mut group = cells.to_vec();
    group.sort_unstable();
    group.dedup();

    let mut out = Vec::new();
    let mut stack = vec![group];
    while let Some(group) = stack.pop() {
        let Some(bbox) = bounding_box(&group, dim) else {
            continue;
        };
        let efficiency = group.len() as f64 / bbox.num_cells() as f64;
        if group.len() == 1 || efficiency >= cfg.efficiency {
            out.push(bbox);
            continue;
        }
        let (axis, cut) = choose_cut(&group, &bbox);
        let (left, right): (Vec<Cell>, Vec<Cell>) =
            group.into_iter().partition(|c| c[axis] < cut);
        stack.push(right);
        stack.push(left);
    }
    out.sort();
    out
}

fn bounding_box(cells: &[Cell], dim: usize) -> Option<IndexBox> {
    let first = cells.first()?;
    let (mut lo, mut up) = (*first, *first);
    for c in &cells[1..] {
        for d in 0..dim {
            lo[d] = lo[d].min(c[d]);
            up[d] = up[d].max(c[d]);
        }
    }
    Some(IndexBox::from_arrays(dim, lo, up))
}

/// Number of cells in each slab orthogonal to `axis`.
fn signature(cells: &[Cell], bbox: &IndexBox, axis: usize) -> Vec<u64> {
    let lo = bbox.lower()[axis];
    let mut sig = vec![0u64; bbox.extent(axis) as usize];
    for c in cells {
        sig[(c[axis] - lo) as usize] += 1;
    }
    sig
}

/// Axes by decreasing extent, lowest axis first on ties.
fn axes_longest_first(bbox: &IndexBox) -> Vec<usize> {
    let mut axes: Vec<usize> = (0..bbox.dim()).collect();
    axes.sort_by_key(|&d| (std::cmp::Reverse(bbox.extent(d)), d));
    axes
}

/// Returns `(axis, cut)`; cells with `c[axis] < cut` form the first half.
/// Both halves are non-empty.
fn choose_cut(cells: &[Cell], bbox: &IndexBox) -> (usize, i64) {
    let axes = axes_longest_first(bbox);
    let sigs: Vec<(usize, Vec<u64>)> = axes
        .iter()
        .map(|&d| (d, signature(cells, bbox, d)))
        .collect();

    for (axis, sig) in &sigs {
        if let Some(i) = sig.iter().position(|&n| n == 0) {
            return (*axis, bbox.lower()[*axis] + i as i64);
        }
    }

    let mut best: Option<(i64, usize, usize)> = None; // (strength, axis, index)
    for (axis, sig) in &sigs {
        if sig.len() < 4 {
            continue;
        }
        let lap: Vec<i64> = sig
            .windows(3)
            .map(|w| w[0] as i64 - 2 * w[1] as i64 + w[2] as i64)
            .collect();
        for (j, w) in lap.windows(2).enumerate() {
            if (w[0] < 0) != (w[1] < 0) {
                let strength = (w[1] - w[0]).abs();
                // lap[j] sits at signature index j + 1; cut between j + 1 and j + 2
                let index = j + 2;
                let better = match best {
                    None => true,
                    Some((s, a, i)) => strength > s || (strength == s && (*axis, index) < (a, i)),
                };
                if better {
                    best = Some((strength, *axis, index));
                }
            }
        }
    }
    if let Some((_, axis, index)) = best {
        return (axis, bbox.lower()[axis] + index as i64);
    }

    let axis = axes[0];
    (axis, bbox.lower()[axis] + bbox.extent(axis) / 2)
}

/// Replace overlapping boxes by their bounding box until the set is
/// disjoint. Output is sorted.
pub fn merge_overlapping(mut boxes: Vec<IndexBox>) -> Vec<IndexBox> {
    loop {
        boxes.sort();
        let mut merged = false;
        'outer: for i in 0..boxes.len() {
            for j in (i + 1)..boxes.len() {
                if boxes[i].intersects(&boxes[j]) {
                    let b = boxes.swap_remove(j);
                    boxes[i] = boxes[i].bounding(&b);
                    merged = true;
                    break 'outer;
                }
            }
        }
        if !merged {
            return boxes;
        }
    }
}
