//! Engine error types.
//!
//! All inbound failures are local: the engine logs, counts, and drops.
//! Only outbound operations surface an error to the caller, and a missing
//! route is deliberately not one of them (the frame is still emitted and
//! degrades to no-path behaviour en route).

use thiserror::Error;

/// Errors returned by outbound operations on a [`crate::Node`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Payload exceeds what one frame can carry.
    #[error("payload too large: {len} bytes exceeds {max}")]
    SizeExceeded {
        /// Requested payload length.
        len: usize,
        /// Maximum the wire format allows.
        max: usize,
    },

    /// The broadcast interceptor vetoed the emission.
    #[error("operation vetoed by broadcast interceptor")]
    InterceptorVetoed,
}
