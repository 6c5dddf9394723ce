//! Sans-IO protocol engine for the hopframe mesh.
//!
//! The engine sits above a broadcast-only link layer and provides unicast
//! delivery across multi-hop paths, link-wide flooding, coarse time
//! synchronization, and a distance-vector route table. The platform
//! supplies three primitives through the [`Host`] trait (broadcast, a
//! delayed task scheduler, and a millisecond clock) and feeds every
//! received frame into [`Node::receive`].
//!
//! # Architecture
//!
//! ```text
//! Node<H: Host>
//!   ├─ recent: RecentCache        (dedup of flooded frames)
//!   ├─ routes: RouteTable         (next-hop/metric per destination)
//!   ├─ callbacks                  (user delivery, time sync, path debug)
//!   └─ host: H                    (broadcast / now_ms / schedule_after)
//! ```
//!
//! All state lives on one logical executor: the host invokes `receive` and
//! scheduled tasks on the same thread, and the engine never blocks or
//! spawns. Scheduled tasks hold a weak handle, so dropping the last [`Node`]
//! clone turns every pending timer and reflood into a no-op.

pub mod config;
pub mod error;
pub mod host;
pub mod jitter;
pub mod lru;
pub mod node;
pub mod route_table;

pub use config::NodeConfig;
pub use error::SendError;
pub use host::{Host, Task};
pub use jitter::time_based_random;
pub use lru::RecentCache;
pub use node::{Node, NodeStats};
pub use route_table::{RouteEntry, RouteOrigin, RouteTable};
