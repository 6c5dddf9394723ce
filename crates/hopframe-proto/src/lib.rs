//! Wire format for the hopframe mesh protocol.
//!
//! A frame is a small binary envelope carried over a broadcast-only link
//! layer (UDP broadcast, LoRa, BLE advertising, ESP-NOW). The format is
//! fixed-order, little-endian, CRC-protected, and fits in a single link
//! frame: the engine above assumes the link delivers whole frames.
//!
//! This crate is pure data: no I/O, no engine state. See `hopframe-core`
//! for the protocol engine that produces and consumes these frames.

pub mod crc;
pub mod errors;
pub mod message;
pub mod route;
pub mod types;

pub use crc::crc16_ccitt;
pub use errors::{Result, WireError};
pub use message::{DATA_MAX, MAGIC, MSG_MAX, MSG_MIN, Message, MessageType, VERSION};
pub use route::{ROUTES_PER_FRAME, RouteMsg};
pub use types::{ADDR_BROADCAST, ADDR_UNSET, Addr, Lqs, MsgUuid, Seq, Ts, Ttl};
