#![allow(dead_code)]
use amr_hierarchy::algs::communicator::RayonComm;
use amr_hierarchy::config::{HierarchyConfig, SimulationConfig};
use amr_hierarchy::geometry::Domain;

/// Run `f` once per rank on `n` in-process workers, each on its own thread.
/// Results are returned in rank order.
pub fn run_workers<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&RayonComm) -> T + Sync,
{
    let world = RayonComm::world(n);
    std::thread::scope(|s| {
        let handles: Vec<_> = world
            .iter()
            .map(|comm| {
                let f = &f;
                s.spawn(move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker panicked"))
            .collect()
    })
}

/// 1-D domain with `cells` cells of width `1 / cells`.
pub fn domain_1d(cells: i64) -> Domain {
    Domain::new(&[cells], &[1.0 / cells as f64]).unwrap()
}

pub fn sim_1d(cells: i64, hierarchy: HierarchyConfig) -> SimulationConfig {
    SimulationConfig::new(domain_1d(cells), hierarchy)
}

pub const WORKER_COUNTS: [usize; 3] = [1, 2, 4];
