//! Binary on-disk format
//!
//! Archives are uncompressed ("stored") ZIP files, so `unzip -l` can list
//! them. All integers are little-endian.
//!
//! ```text
//! for each record:   local header | name | [zip64 extra] | FB pad extra | payload
//! then:              central directory (one header per record, write order)
//! then (if needed):  zip64 end of central directory + zip64 locator
//! finally:           end of central directory (22 bytes, no comment)
//! ```
//!
//! Mod time/date are always zero so identical input produces identical bytes.

pub mod end;
pub mod headers;

pub use end::{EndOfCentralDirectory, EOCD_SIZE, ZIP64_EOCD_SIZE, ZIP64_LOCATOR_SIZE};
pub use headers::{CentralHeader, LocalHeader, CENTRAL_HEADER_SIZE, LOCAL_HEADER_SIZE};

use recordpack_core::ArchiveError;

/// Local file header signature
pub const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
/// Central directory header signature
pub const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
/// End of central directory signature
pub const EOCD_SIG: u32 = 0x0605_4b50;
/// Zip64 end of central directory signature
pub const ZIP64_EOCD_SIG: u32 = 0x0606_4b50;
/// Zip64 end of central directory locator signature
pub const ZIP64_LOCATOR_SIG: u32 = 0x0706_4b50;

/// Zip64 extended information extra field id
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// "Version needed to extract" for plain stored entries
pub const VERSION_DEFAULT: u16 = 20;
/// "Version needed to extract" once zip64 fields are in play
pub const VERSION_ZIP64: u16 = 45;

/// 32-bit field value meaning "see zip64 extra"
pub const U32_SENTINEL: u32 = u32::MAX;
/// 16-bit field value meaning "see zip64 record"
pub const U16_SENTINEL: u16 = u16::MAX;

/// Compression method: stored
pub const METHOD_STORED: u16 = 0;

/// Low-level format decoding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// Buffer ended before a field could be read
    #[error("Truncated {what}: need {needed} bytes, have {available}")]
    Truncated {
        /// Structure being decoded
        what: &'static str,
        /// Bytes required
        needed: usize,
        /// Bytes available
        available: usize,
    },
    /// Signature did not match
    #[error("Bad {what} signature: {actual:#010x}")]
    BadSignature {
        /// Structure being decoded
        what: &'static str,
        /// Signature found
        actual: u32,
    },
    /// Record is compressed; only stored records are supported
    #[error("Record '{name}' uses unsupported compression method {method}")]
    UnsupportedMethod {
        /// Record name
        name: String,
        /// Compression method id
        method: u16,
    },
    /// Field holds a value that cannot be right
    #[error("Invalid {what}: {detail}")]
    InvalidField {
        /// Field name
        what: &'static str,
        /// Description
        detail: String,
    },
    /// No end of central directory record in the archive tail
    #[error("End of central directory not found")]
    MissingEndRecord,
}

impl From<FormatError> for ArchiveError {
    fn from(e: FormatError) -> Self {
        ArchiveError::CorruptArchive(e.to_string())
    }
}

/// Little-endian field reader over a byte slice.
pub(crate) struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(data: &'a [u8], what: &'static str) -> Self {
        FieldReader { data, pos: 0, what }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        let available = self.data.len() - self.pos;
        if len > available {
            return Err(FormatError::Truncated {
                what: self.what,
                needed: len,
                available,
            });
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub(crate) fn u16(&mut self) -> Result<u16, FormatError> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, FormatError> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u64(&mut self) -> Result<u64, FormatError> {
        let b = self.bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(b);
        Ok(u64::from_le_bytes(arr))
    }

    pub(crate) fn signature(&mut self, expected: u32) -> Result<(), FormatError> {
        let actual = self.u32()?;
        if actual != expected {
            return Err(FormatError::BadSignature {
                what: self.what,
                actual,
            });
        }
        Ok(())
    }
}

pub(crate) fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Narrow a size/offset to a 32-bit field, or the zip64 sentinel.
pub(crate) fn u32_or_sentinel(v: u64) -> u32 {
    if v >= U32_SENTINEL as u64 {
        U32_SENTINEL
    } else {
        v as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_reader() {
        let mut buf = Vec::new();
        put_u16(&mut buf, 0xBEEF);
        put_u32(&mut buf, 0xDEAD_BEEF);
        put_u64(&mut buf, 0x0102_0304_0506_0708);

        let mut r = FieldReader::new(&buf, "test");
        assert_eq!(r.u16().unwrap(), 0xBEEF);
        assert_eq!(r.u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(r.position(), 14);

        let err = r.u16().unwrap_err();
        assert!(matches!(err, FormatError::Truncated { needed: 2, available: 0, .. }));
    }

    #[test]
    fn test_signature_mismatch() {
        let mut buf = Vec::new();
        put_u32(&mut buf, LOCAL_HEADER_SIG);
        let mut r = FieldReader::new(&buf, "local header");
        let err = r.signature(CENTRAL_HEADER_SIG).unwrap_err();
        assert!(err.to_string().contains("local header"));
    }

    #[test]
    fn test_u32_or_sentinel() {
        assert_eq!(u32_or_sentinel(0), 0);
        assert_eq!(u32_or_sentinel(0xFFFF_FFFE), 0xFFFF_FFFE);
        assert_eq!(u32_or_sentinel(0xFFFF_FFFF), U32_SENTINEL);
        assert_eq!(u32_or_sentinel(1 << 40), U32_SENTINEL);
    }

    #[test]
    fn test_format_error_is_corruption() {
        let err: ArchiveError = FormatError::MissingEndRecord.into();
        assert!(err.is_corruption());
    }
}
