//! Error types for the Vorbis header and comment codecs.

use thiserror::Error;

/// Result type for Vorbis-layer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Vorbis-layer error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the Ogg container layer
    #[error("Ogg container error: {0}")]
    Ogg(#[from] tagweld_ogg::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Header packet does not carry the expected `vorbis` signature
    #[error("invalid header signature: expected packet type {expected:#04x}, got {actual:#04x}")]
    InvalidSignature {
        /// Packet type byte that was required
        expected: u8,
        /// Packet type byte actually found
        actual: u8,
    },

    /// Packet ended before its declared contents
    #[error("truncated packet: expected at least {expected} bytes, got {actual}")]
    TruncatedPacket {
        /// Bytes the structure declares
        expected: usize,
        /// Bytes actually present
        actual: usize,
    },

    /// Comment or identification header missing its framing bit
    #[error("header packet missing framing bit")]
    MissingFramingBit,

    /// Comment field name contains characters outside 0x20–0x7D or an `=`
    #[error("invalid field name: {0:?}")]
    InvalidFieldName(String),

    /// Comment entry is not valid UTF-8
    #[error("comment entry is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Stream does not have the three mandatory Vorbis header packets
    #[error("stream has only {0} packets, expected at least 3 vorbis headers")]
    MissingHeaders(usize),
}
