//! Distance-vector route table.
//!
//! One entry per destination: the neighbour to hand frames to, the hop
//! count, the link quality of the advertisement that produced it, and a
//! last-refresh timestamp for expiry. The table itself is policy-free
//! storage plus the best-path comparison; the engine decides when to feed
//! it candidates.

use hopframe_proto::{Addr, Lqs, Ts};

/// How a route entry came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOrigin {
    /// Learned from a neighbour's advertisement; refreshed and expired.
    Dynamic,
    /// Installed by the operator; never expires.
    Static,
}

/// Routing state for one destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    /// Destination address.
    pub dst: Addr,
    /// Neighbour that frames for `dst` are handed to.
    pub next_hop: Addr,
    /// Hop count to `dst`. 0 marks the self-route.
    pub metric: u8,
    /// Link quality of the advertisement this entry was learned from.
    pub lqs: Lqs,
    /// Last time the entry was installed or refreshed.
    pub refreshed_at: Ts,
    /// Dynamic (learned) or static (pinned).
    pub origin: RouteOrigin,
}

/// Table of known destinations.
///
/// The address space is 8 bits and tables stay small, so entries live in a
/// plain vector and lookups scan.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `dst`, if known.
    pub fn find(&self, dst: Addr) -> Option<&RouteEntry> {
        self.entries.iter().find(|entry| entry.dst == dst)
    }

    /// Install `entry`, replacing any previous entry for the same
    /// destination. No best-path comparison; see [`Self::apply_candidate`].
    pub fn add_or_replace(&mut self, entry: RouteEntry) {
        match self.entries.iter_mut().find(|cur| cur.dst == entry.dst) {
            Some(cur) => *cur = entry,
            None => self.entries.push(entry),
        }
    }

    /// Remove the entry for `dst`, if present.
    pub fn remove(&mut self, dst: Addr) {
        self.entries.retain(|entry| entry.dst != dst);
    }

    /// Iterate all entries.
    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter()
    }

    /// Number of known destinations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Offer a candidate learned from an advertisement.
    ///
    /// Best-path rule: a strictly smaller metric wins; an equal metric wins
    /// only with a strictly larger link quality. An equal-metric candidate
    /// that does not win still refreshes the stored entry's timestamp. A
    /// worse candidate is ignored. Static entries are pinned and only ever
    /// replaced by [`Self::add_or_replace`].
    ///
    /// Returns true when the candidate was installed.
    pub fn apply_candidate(&mut self, candidate: RouteEntry) -> bool {
        let Some(cur) = self.entries.iter_mut().find(|cur| cur.dst == candidate.dst) else {
            self.entries.push(candidate);
            return true;
        };
        if cur.origin == RouteOrigin::Static {
            return false;
        }
        if candidate.metric < cur.metric
            || (candidate.metric == cur.metric && candidate.lqs > cur.lqs)
        {
            *cur = candidate;
            return true;
        }
        if candidate.metric == cur.metric {
            cur.refreshed_at = candidate.refreshed_at;
        }
        false
    }

    /// Drop stale entries.
    ///
    /// An entry survives if it is the self-route (metric 0), is static, or
    /// was refreshed within `expired_ms` and has a metric below
    /// `metric_cap`. Time comparison is wrapping, so a clock that wraps
    /// does not mass-expire the table.
    pub fn sweep_expired(&mut self, now: Ts, expired_ms: u32, metric_cap: u8) {
        self.entries.retain(|entry| {
            if entry.metric == 0 {
                return true;
            }
            if entry.origin == RouteOrigin::Static {
                return true;
            }
            if now.wrapping_sub(entry.refreshed_at) > expired_ms {
                tracing::debug!(dst = entry.dst, "route expired");
                return false;
            }
            if entry.metric >= metric_cap {
                tracing::debug!(dst = entry.dst, metric = entry.metric, "route over metric cap");
                return false;
            }
            true
        });
    }
}
