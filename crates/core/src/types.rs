//! Record naming conventions and the serialization identity token

use crate::error::{ArchiveError, Result};
use std::fmt;
use uuid::Uuid;

/// Reserved record name holding the archive's serialization identity
pub const SERIALIZATION_ID_RECORD_NAME: &str = ".data/serialization_id";

/// Name suffix marking a record as a debug record
pub const DEBUG_RECORD_SUFFIX: &str = ".debug_pkl";

/// Maximum record name length in bytes (ZIP name length is a u16)
pub const MAX_RECORD_NAME_BYTES: usize = u16::MAX as usize;

/// Returns true if `name` follows the debug record suffix convention
pub fn is_debug_record(name: &str) -> bool {
    name.ends_with(DEBUG_RECORD_SUFFIX)
}

/// Returns true if `name` is the reserved identity record name
pub fn is_serialization_id_record(name: &str) -> bool {
    name == SERIALIZATION_ID_RECORD_NAME
}

/// Validate a record name
///
/// Names must be non-empty, free of NUL bytes and fit in a ZIP name field.
pub fn validate_record_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.len() > MAX_RECORD_NAME_BYTES {
        "name exceeds 65535 bytes"
    } else if name.contains('\0') {
        "name contains a NUL byte"
    } else {
        return Ok(());
    };
    Err(ArchiveError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Unique token identifying one serialization output.
///
/// Generated once per writer. Stored verbatim as the payload of the
/// reserved identity record, so it is treated as opaque bytes; generated
/// tokens are hyphenated UUID v4 strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerializationId(Vec<u8>);

impl SerializationId {
    /// Generate a fresh random token
    pub fn generate() -> Self {
        SerializationId(Uuid::new_v4().hyphenated().to_string().into_bytes())
    }

    /// Wrap existing token bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        SerializationId(bytes.into())
    }

    /// Raw token bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Token as text, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Consume into raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Display for SerializationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<&str> for SerializationId {
    fn from(s: &str) -> Self {
        SerializationId(s.as_bytes().to_vec())
    }
}

impl PartialEq<str> for SerializationId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl PartialEq<&str> for SerializationId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}
