//! Semantic aliases for the protocol's primitive fields.
//!
//! Addresses are a flat 8-bit space: `0x01..=0xFE` are unicast nodes,
//! [`ADDR_BROADCAST`] is link-local broadcast, and [`ADDR_UNSET`] is
//! reserved. Timestamps are millisecond counters that wrap; all arithmetic
//! on them must be wrapping.

/// 8-bit node address.
pub type Addr = u8;

/// Per-source sequence counter. Wraps at 255.
pub type Seq = u8;

/// Hop budget carried in a frame. Effective range is 4 bits (0..=15).
pub type Ttl = u8;

/// Millisecond timestamp since node start (or epoch). Wraps.
pub type Ts = u32;

/// Signed link-quality score reported by the link layer. Larger is better.
pub type Lqs = i8;

/// Per-message dedup identifier: `(src << 24) | (seq << 16) | (ts & 0xFFFF)`.
///
/// A retransmission of the same frame keeps its uuid; a fresh frame from the
/// same `(src, seq)` after the clock advances gets a new one, which tolerates
/// `seq` wrap within a short window.
pub type MsgUuid = u32;

/// Reserved "no address" value.
pub const ADDR_UNSET: Addr = 0x00;

/// Link-local broadcast address.
pub const ADDR_BROADCAST: Addr = 0xFF;
