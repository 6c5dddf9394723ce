//! Packed route advertisement entries.
//!
//! A routing-sync payload is a flat sequence of 3-byte entries with no
//! padding. Entries are read and written field by field; the layout is
//! never produced by reinterpreting a struct in memory.

use bytes::{BufMut, Bytes};

use crate::{message::DATA_MAX, types::Addr};

/// Wire size of one advertisement entry.
pub const ROUTE_MSG_SIZE: usize = 3;

/// How many entries fit in a single frame payload.
pub const ROUTES_PER_FRAME: usize = DATA_MAX / ROUTE_MSG_SIZE;

/// One advertised destination: "to reach `dst`, go through `next_hop`,
/// `metric` hops away from the advertiser".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteMsg {
    /// Advertised destination.
    pub dst: Addr,
    /// Hop the advertiser uses; set to the advertiser's own address on send.
    pub next_hop: Addr,
    /// Advertiser's hop count to `dst`.
    pub metric: u8,
}

impl RouteMsg {
    /// Append this entry's 3 bytes to a payload buffer.
    pub fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.dst);
        buf.put_u8(self.next_hop);
        buf.put_u8(self.metric);
    }

    /// Pack a batch of entries into one frame payload.
    ///
    /// Callers chunk at [`ROUTES_PER_FRAME`]; anything larger would overflow
    /// [`DATA_MAX`].
    pub fn encode_batch(entries: &[RouteMsg]) -> Bytes {
        debug_assert!(entries.len() <= ROUTES_PER_FRAME);
        let mut buf = Vec::with_capacity(entries.len() * ROUTE_MSG_SIZE);
        for entry in entries {
            entry.write(&mut buf);
        }
        Bytes::from(buf)
    }

    /// Iterate the entries of a received payload.
    ///
    /// A trailing partial entry (payload length not a multiple of 3) is
    /// ignored.
    pub fn iter_payload(data: &[u8]) -> impl Iterator<Item = RouteMsg> + '_ {
        data.chunks_exact(ROUTE_MSG_SIZE)
            .map(|chunk| RouteMsg { dst: chunk[0], next_hop: chunk[1], metric: chunk[2] })
    }
}
