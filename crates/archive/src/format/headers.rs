//! Local and central directory file headers
//!
//! # Local header (30 bytes + name + extras)
//!
//! ```text
//! sig(4) + version(2) + flags(2) + method(2) + time(2) + date(2) + crc32(4)
//! + compressed(4) + uncompressed(4) + name_len(2) + extra_len(2)
//! ```
//!
//! # Central header (46 bytes + name + extras)
//!
//! ```text
//! sig(4) + made_by(2) + version(2) + flags(2) + method(2) + time(2) + date(2)
//! + crc32(4) + compressed(4) + uncompressed(4) + name_len(2) + extra_len(2)
//! + comment_len(2) + disk(2) + internal_attr(2) + external_attr(4) + offset(4)
//! ```

use super::{
    put_u16, put_u32, put_u64, u32_or_sentinel, FieldReader, FormatError, CENTRAL_HEADER_SIG,
    LOCAL_HEADER_SIG, METHOD_STORED, U32_SENTINEL, VERSION_DEFAULT, VERSION_ZIP64,
    ZIP64_EXTRA_ID,
};
use crate::padding::{padding_len, write_padding_extra, EXTRA_FIELD_HEADER_SIZE};

/// Fixed part of a local file header
pub const LOCAL_HEADER_SIZE: u64 = 30;

/// Fixed part of a central directory header
pub const CENTRAL_HEADER_SIZE: u64 = 46;

/// Zip64 extra in a local header: prefix + uncompressed + compressed
const LOCAL_ZIP64_EXTRA_SIZE: u64 = EXTRA_FIELD_HEADER_SIZE + 16;

fn needs_zip64_size(size: u64) -> bool {
    size >= U32_SENTINEL as u64
}

/// Local header for one record, written immediately before its payload.
#[derive(Debug, Clone, Copy)]
pub struct LocalHeader<'a> {
    /// Record name
    pub name: &'a str,
    /// CRC-32 of the payload
    pub crc32: u32,
    /// Payload size in bytes
    pub size: u64,
}

impl<'a> LocalHeader<'a> {
    /// Create a local header
    pub fn new(name: &'a str, crc32: u32, size: u64) -> Self {
        LocalHeader { name, crc32, size }
    }

    /// Header length before any pad bytes
    pub fn unpadded_len(&self) -> u64 {
        let zip64 = if needs_zip64_size(self.size) {
            LOCAL_ZIP64_EXTRA_SIZE
        } else {
            0
        };
        LOCAL_HEADER_SIZE + self.name.len() as u64 + zip64 + EXTRA_FIELD_HEADER_SIZE
    }

    /// Encode the header as if it starts at `header_offset`.
    ///
    /// Returns the encoded bytes and the absolute payload offset, which is a
    /// multiple of `alignment`.
    pub fn encode(&self, header_offset: u64, alignment: u64) -> (Vec<u8>, u64) {
        let zip64 = needs_zip64_size(self.size);
        let payload_start = header_offset + self.unpadded_len();
        let pad = padding_len(payload_start, alignment);

        let zip64_len = if zip64 { LOCAL_ZIP64_EXTRA_SIZE } else { 0 };
        let extra_len = zip64_len + EXTRA_FIELD_HEADER_SIZE + pad;
        let size32 = u32_or_sentinel(self.size);

        let mut buf = Vec::with_capacity((self.unpadded_len() + pad) as usize);
        put_u32(&mut buf, LOCAL_HEADER_SIG);
        put_u16(&mut buf, if zip64 { VERSION_ZIP64 } else { VERSION_DEFAULT });
        put_u16(&mut buf, 0); // flags
        put_u16(&mut buf, METHOD_STORED);
        put_u16(&mut buf, 0); // mod time
        put_u16(&mut buf, 0); // mod date
        put_u32(&mut buf, self.crc32);
        put_u32(&mut buf, size32);
        put_u32(&mut buf, size32);
        put_u16(&mut buf, self.name.len() as u16);
        put_u16(&mut buf, extra_len as u16);
        buf.extend_from_slice(self.name.as_bytes());

        if zip64 {
            put_u16(&mut buf, ZIP64_EXTRA_ID);
            put_u16(&mut buf, 16);
            put_u64(&mut buf, self.size);
            put_u64(&mut buf, self.size);
        }
        write_padding_extra(&mut buf, payload_start, alignment);

        (buf, payload_start + pad)
    }
}

/// Fields of a local header the reader needs to locate a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalHeaderPrefix {
    /// Compression method
    pub method: u16,
    /// Length of the name that follows the fixed header
    pub name_len: u16,
    /// Length of the extras that follow the name
    pub extra_len: u16,
}

impl LocalHeaderPrefix {
    /// Decode the fixed 30-byte part of a local header
    pub fn decode(data: &[u8]) -> Result<Self, FormatError> {
        let mut r = FieldReader::new(data, "local header");
        r.signature(LOCAL_HEADER_SIG)?;
        let _version = r.u16()?;
        let _flags = r.u16()?;
        let method = r.u16()?;
        let _time = r.u16()?;
        let _date = r.u16()?;
        let _crc32 = r.u32()?;
        let _compressed = r.u32()?;
        let _uncompressed = r.u32()?;
        let name_len = r.u16()?;
        let extra_len = r.u16()?;
        Ok(LocalHeaderPrefix {
            method,
            name_len,
            extra_len,
        })
    }

    /// Distance from the header start to the payload start
    pub fn payload_distance(&self) -> u64 {
        LOCAL_HEADER_SIZE + self.name_len as u64 + self.extra_len as u64
    }
}

/// Central directory entry for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralHeader {
    /// Record name
    pub name: String,
    /// CRC-32 of the payload
    pub crc32: u32,
    /// Payload size in bytes
    pub size: u64,
    /// Absolute offset of the record's local header
    pub header_offset: u64,
}

impl CentralHeader {
    fn zip64_fields(&self) -> (bool, bool) {
        (
            needs_zip64_size(self.size),
            self.header_offset >= U32_SENTINEL as u64,
        )
    }

    /// Encoded length of this entry
    pub fn encoded_len(&self) -> u64 {
        CENTRAL_HEADER_SIZE + self.name.len() as u64 + self.zip64_extra_len()
    }

    fn zip64_extra_len(&self) -> u64 {
        let (big_size, big_offset) = self.zip64_fields();
        let body = (if big_size { 16 } else { 0 }) + (if big_offset { 8 } else { 0 });
        if body == 0 {
            0
        } else {
            EXTRA_FIELD_HEADER_SIZE + body
        }
    }

    /// Append the encoded entry to `buf`
    pub fn encode(&self, buf: &mut Vec<u8>) {
        let (big_size, big_offset) = self.zip64_fields();
        let version = if big_size || big_offset {
            VERSION_ZIP64
        } else {
            VERSION_DEFAULT
        };
        let size32 = u32_or_sentinel(self.size);

        put_u32(buf, CENTRAL_HEADER_SIG);
        put_u16(buf, VERSION_ZIP64); // made by
        put_u16(buf, version);
        put_u16(buf, 0); // flags
        put_u16(buf, METHOD_STORED);
        put_u16(buf, 0); // mod time
        put_u16(buf, 0); // mod date
        put_u32(buf, self.crc32);
        put_u32(buf, size32);
        put_u32(buf, size32);
        put_u16(buf, self.name.len() as u16);
        put_u16(buf, self.zip64_extra_len() as u16);
        put_u16(buf, 0); // comment
        put_u16(buf, 0); // disk start
        put_u16(buf, 0); // internal attributes
        put_u32(buf, 0); // external attributes
        put_u32(buf, u32_or_sentinel(self.header_offset));
        buf.extend_from_slice(self.name.as_bytes());

        if big_size || big_offset {
            put_u16(buf, ZIP64_EXTRA_ID);
            put_u16(buf, (self.zip64_extra_len() - EXTRA_FIELD_HEADER_SIZE) as u16);
            if big_size {
                put_u64(buf, self.size);
                put_u64(buf, self.size);
            }
            if big_offset {
                put_u64(buf, self.header_offset);
            }
        }
    }

    /// Decode the next entry from a central directory buffer
    pub(crate) fn decode(r: &mut FieldReader<'_>) -> Result<Self, FormatError> {
        r.signature(CENTRAL_HEADER_SIG)?;
        let _made_by = r.u16()?;
        let _version = r.u16()?;
        let _flags = r.u16()?;
        let method = r.u16()?;
        let _time = r.u16()?;
        let _date = r.u16()?;
        let crc32 = r.u32()?;
        let compressed32 = r.u32()?;
        let uncompressed32 = r.u32()?;
        let name_len = r.u16()? as usize;
        let extra_len = r.u16()? as usize;
        let comment_len = r.u16()? as usize;
        let _disk = r.u16()?;
        let _internal = r.u16()?;
        let _external = r.u32()?;
        let offset32 = r.u32()?;

        let name = std::str::from_utf8(r.bytes(name_len)?)
            .map_err(|_| FormatError::InvalidField {
                what: "record name",
                detail: "not valid UTF-8".to_string(),
            })?
            .to_string();

        if method != METHOD_STORED {
            return Err(FormatError::UnsupportedMethod { name, method });
        }

        let mut uncompressed = uncompressed32 as u64;
        let mut compressed = compressed32 as u64;
        let mut header_offset = offset32 as u64;
        let mut missing_zip64 = uncompressed32 == U32_SENTINEL
            || compressed32 == U32_SENTINEL
            || offset32 == U32_SENTINEL;

        let mut extras = FieldReader::new(r.bytes(extra_len)?, "extra field");
        while extras.position() < extra_len {
            let id = extras.u16()?;
            let len = extras.u16()? as usize;
            let body = extras.bytes(len)?;
            if id != ZIP64_EXTRA_ID {
                continue;
            }
            let mut z = FieldReader::new(body, "zip64 extra");
            if uncompressed32 == U32_SENTINEL {
                uncompressed = z.u64()?;
            }
            if compressed32 == U32_SENTINEL {
                compressed = z.u64()?;
            }
            if offset32 == U32_SENTINEL {
                header_offset = z.u64()?;
            }
            missing_zip64 = false;
        }
        if missing_zip64 {
            return Err(FormatError::InvalidField {
                what: "zip64 extra",
                detail: format!("record '{}' has 32-bit overflow markers but no zip64 extra", name),
            });
        }

        let _comment = r.bytes(comment_len)?;

        if compressed != uncompressed {
            return Err(FormatError::InvalidField {
                what: "record size",
                detail: format!(
                    "record '{}' is stored but sizes differ ({} vs {})",
                    name, compressed, uncompressed
                ),
            });
        }

        Ok(CentralHeader {
            name,
            crc32,
            size: uncompressed,
            header_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_header_aligns_payload() {
        for header_offset in [0u64, 1, 37, 64, 1000, 4097] {
            let header = LocalHeader::new("key1", 0x1234_5678, 127);
            let (bytes, payload_offset) = header.encode(header_offset, 64);
            assert_eq!(payload_offset % 64, 0);
            assert_eq!(header_offset + bytes.len() as u64, payload_offset);

            let prefix = LocalHeaderPrefix::decode(&bytes[..LOCAL_HEADER_SIZE as usize]).unwrap();
            assert_eq!(prefix.method, METHOD_STORED);
            assert_eq!(prefix.name_len, 4);
            assert_eq!(prefix.payload_distance(), bytes.len() as u64);
            assert_eq!(&bytes[30..34], b"key1");
        }
    }

    #[test]
    fn test_local_header_first_record_layout() {
        // 30 + 4 + 4 = 38 bytes before padding, so 26 pad bytes reach 64
        let (bytes, payload_offset) = LocalHeader::new("key1", 0, 10).encode(0, 64);
        assert_eq!(payload_offset, 64);
        assert_eq!(bytes.len(), 64);
        assert_eq!(&bytes[34..36], b"FB");
        assert_eq!(u16::from_le_bytes([bytes[36], bytes[37]]), 26);
        assert_eq!(u16::from_le_bytes([bytes[28], bytes[29]]), 30);
    }

    #[test]
    fn test_local_header_zip64_size() {
        let size = 5 * 1024 * 1024 * 1024u64;
        let header = LocalHeader::new("big", 0, size);
        let (bytes, payload_offset) = header.encode(0, 64);
        assert_eq!(payload_offset % 64, 0);
        assert_eq!(u32::from_le_bytes(bytes[18..22].try_into().unwrap()), U32_SENTINEL);
        assert_eq!(u16::from_le_bytes([bytes[33], bytes[34]]), ZIP64_EXTRA_ID);
        assert_eq!(u64::from_le_bytes(bytes[37..45].try_into().unwrap()), size);
    }

    #[test]
    fn test_local_prefix_rejects_bad_signature() {
        let bytes = [0u8; 30];
        assert!(matches!(
            LocalHeaderPrefix::decode(&bytes),
            Err(FormatError::BadSignature { .. })
        ));
    }

    #[test]
    fn test_central_header_decode_encoded() {
        let entries = vec![
            CentralHeader {
                name: "key1".to_string(),
                crc32: 7,
                size: 127,
                header_offset: 0,
            },
            CentralHeader {
                name: "huge/offset".to_string(),
                crc32: 9,
                size: 64,
                header_offset: 6 * 1024 * 1024 * 1024,
            },
            CentralHeader {
                name: "huge/size".to_string(),
                crc32: 11,
                size: u32::MAX as u64,
                header_offset: 4096,
            },
        ];

        let mut buf = Vec::new();
        for entry in &entries {
            entry.encode(&mut buf);
        }
        let expected_len: u64 = entries.iter().map(|e| e.encoded_len()).sum();
        assert_eq!(buf.len() as u64, expected_len);

        let mut r = FieldReader::new(&buf, "central directory");
        for entry in &entries {
            assert_eq!(&CentralHeader::decode(&mut r).unwrap(), entry);
        }
        assert_eq!(r.position(), buf.len());
    }

    #[test]
    fn test_central_header_rejects_compressed() {
        let entry = CentralHeader {
            name: "x".to_string(),
            crc32: 0,
            size: 1,
            header_offset: 0,
        };
        let mut buf = Vec::new();
        entry.encode(&mut buf);
        buf[10] = 8; // deflate

        let mut r = FieldReader::new(&buf, "central directory");
        assert!(matches!(
            CentralHeader::decode(&mut r),
            Err(FormatError::UnsupportedMethod { method: 8, .. })
        ));
    }
}
