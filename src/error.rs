//! Error types for the frame layer.
//!
//! Three kinds of failure cross the boundary to packet dispatch:
//! parse/semantic violations, soft resource exhaustion, and unknown frame
//! types. Anything richer (per-stream application codes, crypto errors)
//! travels inside frames as plain `u64` error codes and is not modeled here.

use thiserror::Error;

/// Result alias used throughout the frame layer.
pub type Result<T> = core::result::Result<T, Error>;

/// Frame layer errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Malformed or semantically invalid frame: truncated VarInt, length
    /// field exceeding the remaining payload, CRYPTO offset != 0, ACK range
    /// count above the configured limit, CID sequence gap, close phrase
    /// missing its NUL terminator, and similar.
    ///
    /// Packet dispatch translates this into a PROTOCOL_VIOLATION
    /// CONNECTION_CLOSE on the transport.
    #[error("invalid frame")]
    Invalid,

    /// Soft resource failure: the outbound control queue refused a frame or
    /// a connection ID set is at capacity. Decoders revert any side effect
    /// they performed before hitting this (see DATA_BLOCKED handling).
    #[error("out of memory")]
    NoMemory,

    /// Frame type byte above the highest type this core understands (0x1e).
    #[error("unsupported frame type {0:#04x}")]
    Unsupported(u8),
}

impl Error {
    /// Transport error code (RFC 9000 Section 20) reported to the peer when
    /// this error aborts packet processing.
    pub fn to_wire(&self) -> u64 {
        match self {
            Error::Invalid => 0x0a,         // PROTOCOL_VIOLATION
            Error::NoMemory => 0x01,        // INTERNAL_ERROR
            Error::Unsupported(_) => 0x07,  // FRAME_ENCODING_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_wire_codes() {
        assert_eq!(Error::Invalid.to_wire(), 0x0a);
        assert_eq!(Error::NoMemory.to_wire(), 0x01);
        assert_eq!(Error::Unsupported(0xff).to_wire(), 0x07);
    }
}
