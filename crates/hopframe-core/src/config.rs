//! Engine configuration knobs.

/// Tunables for a [`crate::Node`].
///
/// Defaults match the protocol's reference values; deployments mostly
/// adjust the sync/expiry intervals to their link's duty cycle and the
/// jitter window to its contention behaviour.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Initial hop budget for emitted frames, 1..=15. Also the upper bound
    /// accepted on inbound frames and the cap for route metrics.
    pub ttl_default: u8,

    /// Capacity of the recent-uuid dedup cache.
    pub lru_size: usize,

    /// Lower edge of the reflood jitter window, in milliseconds.
    pub delay_min_ms: u32,

    /// Upper edge of the reflood jitter window, in milliseconds.
    pub delay_max_ms: u32,

    /// Period of the routing-sync advertisement timer.
    pub route_sync_interval_ms: u32,

    /// Period of the route-expiry sweep timer.
    pub route_check_interval_ms: u32,

    /// Idle time after which a dynamic route entry is removed.
    pub route_expired_ms: u32,

    /// Distance-vector routing. When disabled the node advertises only its
    /// self-route, ingests nothing, and never forwards or refloods frames
    /// addressed elsewhere.
    pub enable_dv_routing: bool,

    /// Deliver `sync_time` floods to the time-sync callback.
    pub enable_time_sync: bool,

    /// Answer and deliver path-tracing probes addressed to this node.
    pub enable_route_debug: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ttl_default: 5,
            lru_size: 32,
            delay_min_ms: 10,
            delay_max_ms: 300,
            route_sync_interval_ms: 10_000,
            route_check_interval_ms: 1_000,
            route_expired_ms: 30_000,
            enable_dv_routing: true,
            enable_time_sync: true,
            enable_route_debug: true,
        }
    }
}
