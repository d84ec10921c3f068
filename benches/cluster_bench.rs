use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use amr_hierarchy::algs::cluster::{ClusterConfig, cluster_cells, merge_overlapping};

/// Tagged cells scattered around a few blobs of a `side x side` grid.
fn blobs(side: i64, n_blobs: usize, per_blob: usize, seed: u64) -> Vec<[i64; 3]> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut cells = Vec::with_capacity(n_blobs * per_blob);
    for _ in 0..n_blobs {
        let cx = rng.gen_range(0..side);
        let cy = rng.gen_range(0..side);
        for _ in 0..per_blob {
            let x = (cx + rng.gen_range(-8..=8)).clamp(0, side - 1);
            let y = (cy + rng.gen_range(-8..=8)).clamp(0, side - 1);
            cells.push([x, y, 0]);
        }
    }
    cells.sort_unstable();
    cells.dedup();
    cells
}

fn bench_cluster(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster_cells");
    let cfg = ClusterConfig::default();
    for &(side, n_blobs) in &[(64, 2), (256, 8), (1024, 32)] {
        let cells = blobs(side, n_blobs, 200, 42);
        group.bench_with_input(BenchmarkId::from_parameter(side), &cells, |b, cells| {
            b.iter(|| merge_overlapping(cluster_cells(cells, 2, &cfg)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cluster);
criterion_main!(benches);
