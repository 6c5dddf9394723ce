//! Wire-level error types.
//!
//! Parse failures carry enough context to log the reason without retaining
//! the frame. None of these propagate to user callbacks; the engine drops
//! the offending frame and counts it.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = core::result::Result<T, WireError>;

/// Errors produced while encoding or decoding a frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// Frame is shorter than the minimum or longer than the maximum size.
    #[error("frame size out of range: {len} bytes")]
    SizeOutOfRange {
        /// Observed frame length.
        len: usize,
    },

    /// First byte is not the protocol magic.
    #[error("bad magic byte: {found:#04x}")]
    BadMagic {
        /// Byte found where the magic was expected.
        found: u8,
    },

    /// Version byte does not match this implementation.
    #[error("unsupported protocol version: {found}")]
    BadVersion {
        /// Version byte found on the wire.
        found: u8,
    },

    /// Length field disagrees with the actual frame size.
    #[error("length field mismatch: declared {declared}, actual {actual}")]
    BadLength {
        /// Value of the length field.
        declared: u8,
        /// Byte count the field should have declared.
        actual: usize,
    },

    /// Type nibble is outside the defined enum.
    #[error("unknown message type: {nibble:#x}")]
    BadType {
        /// The offending high nibble.
        nibble: u8,
    },

    /// CRC check failed.
    #[error("crc mismatch: declared {declared:#06x}, computed {computed:#06x}")]
    BadCrc {
        /// CRC carried in the frame.
        declared: u16,
        /// CRC computed over the received bytes.
        computed: u16,
    },

    /// Outbound payload exceeds [`crate::DATA_MAX`].
    #[error("payload too large: {len} bytes exceeds {max}")]
    DataTooLarge {
        /// Payload length requested.
        len: usize,
        /// Maximum the wire format can carry.
        max: usize,
    },
}
