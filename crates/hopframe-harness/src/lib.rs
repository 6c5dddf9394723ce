//! Deterministic simulation harness for hopframe protocol testing.
//!
//! A virtual-time executor, an in-process broadcast link with a pluggable
//! topology, and a cluster builder that wires up N nodes with delivery
//! recorders. Everything runs single-threaded on a virtual clock, so runs
//! are exactly reproducible: the same seed and the same schedule produce
//! the same frame interleaving every time.
//!
//! # Typical test shape
//!
//! ```no_run
//! use hopframe_core::NodeConfig;
//! use hopframe_harness::Cluster;
//!
//! let cluster = Cluster::chain(10, &NodeConfig::default());
//! cluster.init_all();
//! cluster.run_for(30_000); // let routing converge, in virtual ms
//! assert!(cluster.node(0).route(9).is_some());
//! ```

pub mod cluster;
pub mod executor;
pub mod link;
pub mod sim_host;

pub use cluster::Cluster;
pub use executor::SimExecutor;
pub use link::SimLink;
pub use sim_host::SimHost;
