//! Error types for record archives
//!
//! Every fallible archive operation reports one [`ArchiveError`]. We use
//! `thiserror` for the `Display` and `Error` implementations.

use std::io;
use thiserror::Error;

/// Result type alias for archive operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Errors raised by archive writers and readers
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Operation is not valid in the current lifecycle phase
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// An ordinary record with this name was already written
    #[error("Duplicate record name: {0}")]
    DuplicateName(String),

    /// No record with this name exists in the archive
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Caller-provided buffer cannot hold the record
    #[error("Buffer too small for record '{name}': need {required} bytes, capacity {capacity}")]
    BufferTooSmall {
        /// Record name
        name: String,
        /// Record size in bytes
        required: u64,
        /// Capacity of the destination buffer
        capacity: usize,
    },

    /// Directory, end marker or reserved records are missing or unparsable
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// Record payload does not match its stored CRC-32
    #[error("Checksum mismatch for record '{name}': expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Record name
        name: String,
        /// CRC-32 stored in the directory
        expected: u32,
        /// CRC-32 computed over the payload
        actual: u32,
    },

    /// Record name violates the naming rules
    #[error("Invalid record name {name:?}: {reason}")]
    InvalidName {
        /// Offending name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Argument outside its valid range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Sink accepted fewer bytes than requested
    #[error("Short write: sink accepted {accepted} of {expected} bytes")]
    ShortWrite {
        /// Bytes handed to the sink
        expected: usize,
        /// Bytes the sink reported as accepted
        accepted: usize,
    },

    /// I/O error from the underlying sink or source
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ArchiveError {
    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a not found error
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create a corrupt archive error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptArchive(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Returns true if the error is a failed name lookup
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if the archive bytes themselves are damaged
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptArchive(_) | Self::ChecksumMismatch { .. })
    }

    /// Returns true if the error came from the sink or source
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ShortWrite { .. })
    }
}
