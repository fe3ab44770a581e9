//! Error types for Ogg container parsing and rewriting.

use thiserror::Error;

/// Result type for Ogg container operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Ogg container error types.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from the underlying file or reader
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Page does not start with the `OggS` capture pattern
    #[error("invalid capture pattern: expected \"OggS\", got {0:?}")]
    InvalidCapturePattern([u8; 4]),

    /// Unknown stream structure version
    #[error("unsupported stream structure version: {0}")]
    UnsupportedVersion(u8),

    /// Data ended mid-header, mid-segment-table, or mid-payload
    #[error("truncated page: expected {expected} bytes, got {actual}")]
    TruncatedHeader {
        /// Bytes the page structure declares
        expected: u64,
        /// Bytes actually available
        actual: u64,
    },

    /// Stored page checksum does not match the recomputed value
    #[error("corrupt page {page}: stored checksum {expected:#010x}, computed {actual:#010x}")]
    CorruptPage {
        /// Sequence number of the failing page
        page: u32,
        /// Checksum stored in the page header
        expected: u32,
        /// Checksum recomputed over the page bytes
        actual: u32,
    },

    /// Continuation flag inconsistent with the preceding page's lacing
    #[error("malformed continuation on page {page}")]
    MalformedContinuation {
        /// Sequence number of the offending page
        page: u32,
    },

    /// Packet index beyond the end of the stream
    #[error("packet index {index} out of range, stream has {count} packets")]
    PacketIndexOutOfRange {
        /// Requested packet ordinal
        index: usize,
        /// Number of packets in the stream
        count: usize,
    },

    /// Post-rewrite validation found a packet count or content mismatch
    #[error("layout invariant violation: {reason}")]
    LayoutInvariantViolation {
        /// What the validation pass found
        reason: String,
    },
}
