// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Crate-wide error type.
//!
//! Every fallible operation in the wire layer returns one of these variants.
//! Parse failures on inbound datagrams are caught at the per-packet boundary
//! by the circuit engine and never unwind past it; this type exists for the
//! cases where the caller needs to know why.

use std::fmt;

/// Errors produced by the descriptor, codec, bit-packer and circuit layers.
#[derive(Debug)]
pub enum Error {
    /// Wire parse failed: unknown packet id, truncated block, bad zero-coding,
    /// or an OSD parse error. Carries a short human-readable reason.
    Malformed(String),
    /// A byte-aligned bit-packer operation was invoked while `bit_pos != 0`.
    Misaligned,
    /// A handshake, ack, logout or ping deadline elapsed.
    Timeout,
    /// The operation requires a circuit in `Connected` state.
    NotConnected,
    /// A fixed- or variable-length field would overflow its declared capacity.
    CapacityExceeded(String),
    /// Underlying socket or HTTP transport error.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Malformed(reason) => write!(f, "malformed wire data: {reason}"),
            Error::Misaligned => write!(f, "bit-packer operation requires byte alignment"),
            Error::Timeout => write!(f, "operation timed out"),
            Error::NotConnected => write!(f, "circuit is not connected"),
            Error::CapacityExceeded(reason) => write!(f, "capacity exceeded: {reason}"),
            Error::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
