//! Re-export public algorithms.

pub mod cluster;
pub mod communicator;
pub mod load_balance;
pub mod synchronizer;
pub mod wire;

pub use cluster::{ClusterConfig, cluster_cells, merge_overlapping};
pub use communicator::{CommTag, Communicator, NoComm, RayonComm, Wait};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
pub use load_balance::assign_owners;
pub use synchronizer::{CollectiveOp, CollectivePhase, CollectiveRecord, HierarchySynchronizer};
