//! Frame codec: serialize and strictly parse protocol messages.
//!
//! Byte layout (all multi-byte integers little-endian):
//!
//! ```text
//! ┌────────┬────────────┬───────────────────────────────────────────┐
//! │ Bytes  │ Field      │ Description                               │
//! ├────────┼────────────┼───────────────────────────────────────────┤
//! │ 1      │ magic      │ 0x3C                                      │
//! │ 1      │ version    │ protocol version, checked bit-exact       │
//! │ 1      │ length     │ byte count after this field               │
//! │ 1      │ type/ttl   │ type in high nibble, ttl in low nibble    │
//! │ 1      │ src        │ source address                            │
//! │ 1      │ dst        │ destination address                       │
//! │ 1      │ seq        │ per-source sequence number                │
//! │ 4      │ ts         │ millisecond timestamp                     │
//! │ 0/1    │ next_hop   │ designated forwarder (route-class only)   │
//! │ n      │ data       │ opaque payload                            │
//! │ 2      │ crc        │ CRC-16/CCITT-FALSE over magic..data       │
//! └────────┴────────────┴───────────────────────────────────────────┘
//! ```
//!
//! Parsing is strict: magic, version, length, type, and CRC are all
//! validated before any field is trusted. A frame that fails any check is
//! rejected with the specific reason; the original bytes are not retained.

use bytes::{BufMut, Bytes};

use crate::{
    crc::crc16_ccitt,
    errors::{Result, WireError},
    types::{Addr, MsgUuid, Seq, Ts, Ttl},
};

/// Frame magic byte.
pub const MAGIC: u8 = 0x3C;

/// Protocol version carried in every frame.
pub const VERSION: u8 = 0x01;

/// Minimum frame size: header and CRC with no `next_hop` and no data.
pub const MSG_MIN: usize = 13;

/// Maximum payload size a frame can carry.
///
/// The length field counts everything after itself, so the data share is
/// bounded by `256 - (MSG_MIN - 3) - next_hop`.
pub const DATA_MAX: usize = 250;

/// Maximum frame size on the wire.
pub const MSG_MAX: usize = MSG_MIN + DATA_MAX;

/// Bytes excluded from the length field: magic, version, length itself.
const NOT_IN_LEN: usize = 3;

/// Offset of the first byte after `ts`.
const AFTER_TS: usize = 11;

/// Message type, carried in the high nibble of the packed type/ttl byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Distance-vector route advertisement.
    RouteInfo = 0,
    /// Route advertisement that also solicits the receiver's table.
    RouteInfoAndRequest = 1,
    /// Coarse time-synchronization flood.
    SyncTime = 2,
    /// Link-wide user broadcast flood.
    Broadcast = 3,
    /// Unicast user payload, forwarded hop by hop.
    UserData = 4,
    /// Outbound path-tracing probe.
    RouteDebugSend = 5,
    /// Return leg of a path-tracing probe.
    RouteDebugBack = 6,
}

impl MessageType {
    /// Decode a type nibble. Any value outside the enum is a parse error.
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0 => Some(Self::RouteInfo),
            1 => Some(Self::RouteInfoAndRequest),
            2 => Some(Self::SyncTime),
            3 => Some(Self::Broadcast),
            4 => Some(Self::UserData),
            5 => Some(Self::RouteDebugSend),
            6 => Some(Self::RouteDebugBack),
            _ => None,
        }
    }

    /// The wire nibble for this type.
    pub fn as_nibble(self) -> u8 {
        self as u8
    }

    /// Whether frames of this type carry an explicit `next_hop` byte.
    ///
    /// The serializer and parser must agree on this discriminant; the
    /// length field encodes the exact byte count either way.
    pub fn carries_next_hop(self) -> bool {
        matches!(self, Self::UserData | Self::RouteDebugSend | Self::RouteDebugBack)
    }

    /// Largest payload a frame of this type can carry.
    ///
    /// The `next_hop` byte comes out of the shared [`DATA_MAX`] budget, so
    /// route-class frames carry one byte less than flood-class frames.
    pub fn max_data(self) -> usize {
        DATA_MAX - usize::from(self.carries_next_hop())
    }
}

/// A parsed (or to-be-serialized) protocol message.
///
/// `next_hop` is only meaningful when [`MessageType::carries_next_hop`] is
/// true for `kind`; it serializes to nothing otherwise and parses as
/// [`crate::ADDR_UNSET`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message type.
    pub kind: MessageType,
    /// Remaining hop budget. Effective range 0..=15.
    pub ttl: Ttl,
    /// Originating node.
    pub src: Addr,
    /// Destination node. Ignored by receivers for flood-class types.
    pub dst: Addr,
    /// Per-source sequence number.
    pub seq: Seq,
    /// Millisecond timestamp at the originator.
    pub ts: Ts,
    /// Designated forwarder for route-class frames.
    pub next_hop: Addr,
    /// Opaque payload, at most [`DATA_MAX`] bytes.
    pub data: Bytes,
}

impl Message {
    /// Dedup identifier: `(src << 24) | (seq << 16) | (ts & 0xFFFF)`.
    pub fn uuid(&self) -> MsgUuid {
        (MsgUuid::from(self.src) << 24) | (MsgUuid::from(self.seq) << 16) | (self.ts & 0xFFFF)
    }

    /// Size this message will occupy on the wire.
    pub fn wire_len(&self) -> usize {
        MSG_MIN + usize::from(self.kind.carries_next_hop()) + self.data.len()
    }

    /// Serialize into a freshly framed byte vector.
    ///
    /// # Errors
    ///
    /// [`WireError::DataTooLarge`] if the payload exceeds what this frame
    /// type can carry ([`MessageType::max_data`]).
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let max = self.kind.max_data();
        if self.data.len() > max {
            return Err(WireError::DataTooLarge { len: self.data.len(), max });
        }

        let total = self.wire_len();
        let mut buf = Vec::with_capacity(total);
        buf.put_u8(MAGIC);
        buf.put_u8(VERSION);
        buf.put_u8((total - NOT_IN_LEN) as u8);
        buf.put_u8((self.kind.as_nibble() << 4) | (self.ttl & 0x0F));
        buf.put_u8(self.src);
        buf.put_u8(self.dst);
        buf.put_u8(self.seq);
        buf.put_u32_le(self.ts);
        if self.kind.carries_next_hop() {
            buf.put_u8(self.next_hop);
        }
        buf.put_slice(&self.data);

        let crc = crc16_ccitt(&buf);
        buf.put_u16_le(crc);

        debug_assert_eq!(buf.len(), total);
        Ok(buf)
    }

    /// Strictly parse a received frame.
    ///
    /// Validation order: size bounds, magic, version, length field, type
    /// nibble, CRC. The TTL is the low nibble of the packed byte and is not
    /// range-checked here (the engine enforces its own bound).
    ///
    /// # Errors
    ///
    /// One of the [`WireError`] parse variants naming the first check that
    /// failed.
    pub fn deserialize(payload: &[u8]) -> Result<Self> {
        let len = payload.len();
        if !(MSG_MIN..=MSG_MAX).contains(&len) {
            return Err(WireError::SizeOutOfRange { len });
        }
        if payload[0] != MAGIC {
            return Err(WireError::BadMagic { found: payload[0] });
        }
        if payload[1] != VERSION {
            return Err(WireError::BadVersion { found: payload[1] });
        }
        // The length field is a single byte, so a maximum-size frame stores
        // its count modulo 256; the size bounds above and the CRC pin the
        // real length.
        let declared = payload[2];
        if declared != ((len - NOT_IN_LEN) & 0xFF) as u8 {
            return Err(WireError::BadLength { declared, actual: len - NOT_IN_LEN });
        }
        let packed = payload[3];
        let kind = MessageType::from_nibble(packed >> 4)
            .ok_or(WireError::BadType { nibble: packed >> 4 })?;
        let ttl = packed & 0x0F;

        // A route-class frame must have room for its next_hop byte.
        if kind.carries_next_hop() && len < MSG_MIN + 1 {
            return Err(WireError::SizeOutOfRange { len });
        }

        let declared_crc = u16::from_le_bytes([payload[len - 2], payload[len - 1]]);
        let computed_crc = crc16_ccitt(&payload[..len - 2]);
        if declared_crc != computed_crc {
            return Err(WireError::BadCrc { declared: declared_crc, computed: computed_crc });
        }

        let src = payload[4];
        let dst = payload[5];
        let seq = payload[6];
        let ts = u32::from_le_bytes([payload[7], payload[8], payload[9], payload[10]]);
        let (next_hop, data_start) = if kind.carries_next_hop() {
            (payload[AFTER_TS], AFTER_TS + 1)
        } else {
            (crate::types::ADDR_UNSET, AFTER_TS)
        };
        let data = Bytes::copy_from_slice(&payload[data_start..len - 2]);

        Ok(Self { kind, ttl, src, dst, seq, ts, next_hop, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: MessageType) -> Message {
        Message {
            kind,
            ttl: 5,
            src: 0x01,
            dst: 0x09,
            seq: 0x02,
            ts: 0x0000_0123,
            next_hop: if kind.carries_next_hop() { 0x02 } else { 0x00 },
            data: Bytes::from_static(b"hi"),
        }
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn user_data_fixture_layout() {
        let bytes = sample(MessageType::UserData).serialize().unwrap();
        // 13 base + 1 next_hop + 2 data
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes[0], MAGIC);
        assert_eq!(bytes[1], VERSION);
        assert_eq!(bytes[2], 13); // length excludes magic/version/length
        assert_eq!(bytes[3], 0x45); // user_data in high nibble, ttl 5 in low
        assert_eq!(bytes[4], 0x01);
        assert_eq!(bytes[5], 0x09);
        assert_eq!(bytes[6], 0x02);
        assert_eq!(&bytes[7..11], &[0x23, 0x01, 0x00, 0x00]);
        assert_eq!(bytes[11], 0x02);
        assert_eq!(&bytes[12..14], b"hi");
        let crc = crc16_ccitt(&bytes[..14]);
        assert_eq!(&bytes[14..16], crc.to_le_bytes());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn broadcast_omits_next_hop() {
        let bytes = sample(MessageType::Broadcast).serialize().unwrap();
        assert_eq!(bytes.len(), 15); // no next_hop byte
        let parsed = Message::deserialize(&bytes).unwrap();
        assert_eq!(parsed.next_hop, crate::ADDR_UNSET);
        assert_eq!(parsed.data, Bytes::from_static(b"hi"));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn round_trip_all_types() {
        for nibble in 0..=6 {
            let kind = MessageType::from_nibble(nibble).unwrap();
            let msg = sample(kind);
            let parsed = Message::deserialize(&msg.serialize().unwrap()).unwrap();
            assert_eq!(parsed, msg);
        }
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn uuid_packs_src_seq_and_low_ts() {
        let msg = Message {
            kind: MessageType::UserData,
            ttl: 1,
            src: 0x12,
            dst: 0x00,
            seq: 0x34,
            ts: 0xABCD_5678,
            next_hop: 0x00,
            data: Bytes::new(),
        };
        assert_eq!(msg.uuid(), 0x1234_5678);
    }

    #[test]
    fn reject_empty_and_short() {
        assert_eq!(
            Message::deserialize(&[]),
            Err(WireError::SizeOutOfRange { len: 0 })
        );
        assert_eq!(
            Message::deserialize(&[MAGIC; 12]),
            Err(WireError::SizeOutOfRange { len: 12 })
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn reject_bad_magic() {
        let mut bytes = sample(MessageType::Broadcast).serialize().unwrap();
        bytes[0] = 0x3D;
        assert_eq!(Message::deserialize(&bytes), Err(WireError::BadMagic { found: 0x3D }));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn reject_bad_version() {
        let mut bytes = sample(MessageType::Broadcast).serialize().unwrap();
        bytes[1] = VERSION + 1;
        assert!(matches!(Message::deserialize(&bytes), Err(WireError::BadVersion { .. })));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn reject_bad_length_field() {
        let mut bytes = sample(MessageType::Broadcast).serialize().unwrap();
        bytes[2] += 1;
        assert!(matches!(Message::deserialize(&bytes), Err(WireError::BadLength { .. })));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn reject_unknown_type_nibble() {
        let mut bytes = sample(MessageType::Broadcast).serialize().unwrap();
        bytes[3] = (0x7 << 4) | (bytes[3] & 0x0F);
        // Type check runs before the CRC check, so the stale CRC is not the
        // reported reason.
        assert_eq!(Message::deserialize(&bytes), Err(WireError::BadType { nibble: 0x7 }));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn reject_corrupt_crc() {
        let mut bytes = sample(MessageType::UserData).serialize().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(Message::deserialize(&bytes), Err(WireError::BadCrc { .. })));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn reject_payload_over_data_max() {
        let msg = Message {
            kind: MessageType::Broadcast,
            ttl: 5,
            src: 1,
            dst: 0,
            seq: 0,
            ts: 0,
            next_hop: 0,
            data: Bytes::from(vec![0u8; DATA_MAX + 1]),
        };
        assert_eq!(
            msg.serialize(),
            Err(WireError::DataTooLarge { len: DATA_MAX + 1, max: DATA_MAX })
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn max_size_frame_round_trips() {
        let msg = Message {
            kind: MessageType::Broadcast,
            ttl: 15,
            src: 0xFE,
            dst: 0xFF,
            seq: 0xFF,
            ts: u32::MAX,
            next_hop: 0,
            data: Bytes::from(vec![0xAB; DATA_MAX]),
        };
        let bytes = msg.serialize().unwrap();
        assert_eq!(bytes.len(), MSG_MAX);
        assert_eq!(Message::deserialize(&bytes).unwrap(), msg);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn next_hop_byte_comes_out_of_the_data_budget() {
        let full = Message {
            kind: MessageType::UserData,
            ttl: 5,
            src: 1,
            dst: 2,
            seq: 0,
            ts: 0,
            next_hop: 2,
            data: Bytes::from(vec![0xCD; MessageType::UserData.max_data()]),
        };
        let bytes = full.serialize().unwrap();
        // A route-class frame at capacity still fits the wire maximum.
        assert_eq!(bytes.len(), MSG_MAX);
        assert_eq!(Message::deserialize(&bytes).unwrap(), full);

        let over = Message { data: Bytes::from(vec![0xCD; DATA_MAX]), ..full };
        assert!(matches!(over.serialize(), Err(WireError::DataTooLarge { .. })));
    }
}
