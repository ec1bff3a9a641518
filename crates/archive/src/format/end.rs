//! End of central directory records
//!
//! The classic end record is the archive's end marker. Readers find it by
//! scanning the tail backwards, then follow it (or the zip64 locator placed
//! just before it) to the central directory.
//!
//! # Binary Format
//!
//! ```text
//! zip64 end (56):   sig(4) + record_size(8) + made_by(2) + version(2) + disk(4)
//!                   + cd_disk(4) + entries_on_disk(8) + entries(8) + cd_size(8)
//!                   + cd_offset(8)
//! zip64 locator (20): sig(4) + disk(4) + zip64_end_offset(8) + total_disks(4)
//! end (22):         sig(4) + disk(2) + cd_disk(2) + entries_on_disk(2)
//!                   + entries(2) + cd_size(4) + cd_offset(4) + comment_len(2)
//! ```

use super::{
    put_u16, put_u32, put_u64, u32_or_sentinel, FieldReader, FormatError, EOCD_SIG,
    U16_SENTINEL, U32_SENTINEL, VERSION_ZIP64, ZIP64_EOCD_SIG, ZIP64_LOCATOR_SIG,
};

/// Size of the classic end of central directory record (without comment)
pub const EOCD_SIZE: u64 = 22;
/// Size of the zip64 end of central directory record
pub const ZIP64_EOCD_SIZE: u64 = 56;
/// Size of the zip64 end of central directory locator
pub const ZIP64_LOCATOR_SIZE: u64 = 20;
/// Largest trailing comment a classic end record can announce
pub const MAX_COMMENT_LEN: u64 = u16::MAX as u64;

/// Where the central directory lives and how many entries it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    /// Number of central directory entries
    pub entries: u64,
    /// Central directory size in bytes
    pub cd_size: u64,
    /// Absolute offset of the central directory
    pub cd_offset: u64,
}

impl EndOfCentralDirectory {
    /// Returns true if any field overflows the classic record
    pub fn needs_zip64(&self) -> bool {
        self.entries >= U16_SENTINEL as u64
            || self.cd_size >= U32_SENTINEL as u64
            || self.cd_offset >= U32_SENTINEL as u64
    }

    /// Encoded length of the end records
    pub fn encoded_len(&self) -> u64 {
        if self.needs_zip64() {
            ZIP64_EOCD_SIZE + ZIP64_LOCATOR_SIZE + EOCD_SIZE
        } else {
            EOCD_SIZE
        }
    }

    /// Append the end records, written starting at absolute `position`.
    pub fn encode(&self, position: u64, buf: &mut Vec<u8>) {
        if self.needs_zip64() {
            put_u32(buf, ZIP64_EOCD_SIG);
            put_u64(buf, ZIP64_EOCD_SIZE - 12); // excludes sig and this field
            put_u16(buf, VERSION_ZIP64);
            put_u16(buf, VERSION_ZIP64);
            put_u32(buf, 0);
            put_u32(buf, 0);
            put_u64(buf, self.entries);
            put_u64(buf, self.entries);
            put_u64(buf, self.cd_size);
            put_u64(buf, self.cd_offset);

            put_u32(buf, ZIP64_LOCATOR_SIG);
            put_u32(buf, 0);
            put_u64(buf, position);
            put_u32(buf, 1);
        }

        let entries16 = if self.entries >= U16_SENTINEL as u64 {
            U16_SENTINEL
        } else {
            self.entries as u16
        };
        put_u32(buf, EOCD_SIG);
        put_u16(buf, 0);
        put_u16(buf, 0);
        put_u16(buf, entries16);
        put_u16(buf, entries16);
        put_u32(buf, u32_or_sentinel(self.cd_size));
        put_u32(buf, u32_or_sentinel(self.cd_offset));
        put_u16(buf, 0); // comment
    }
}

/// Classic end record as found in the archive tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassicEnd {
    /// Offset of the record within the scanned tail
    pub tail_index: usize,
    /// Entry count (may be the 16-bit sentinel)
    pub entries: u16,
    /// Central directory size (may be the 32-bit sentinel)
    pub cd_size: u32,
    /// Central directory offset (may be the 32-bit sentinel)
    pub cd_offset: u32,
}

impl ClassicEnd {
    /// Scan `tail` backwards for the last well-formed end record.
    pub fn find(tail: &[u8]) -> Result<Self, FormatError> {
        let eocd = EOCD_SIZE as usize;
        if tail.len() < eocd {
            return Err(FormatError::MissingEndRecord);
        }
        let sig = EOCD_SIG.to_le_bytes();
        for index in (0..=tail.len() - eocd).rev() {
            if tail[index..index + 4] != sig {
                continue;
            }
            let mut r = FieldReader::new(&tail[index..], "end of central directory");
            r.signature(EOCD_SIG)?;
            let _disk = r.u16()?;
            let _cd_disk = r.u16()?;
            let _entries_on_disk = r.u16()?;
            let entries = r.u16()?;
            let cd_size = r.u32()?;
            let cd_offset = r.u32()?;
            let comment_len = r.u16()? as usize;
            // A stray signature inside payload data would claim a comment
            // that runs past the end of the archive.
            if index + eocd + comment_len > tail.len() {
                continue;
            }
            return Ok(ClassicEnd {
                tail_index: index,
                entries,
                cd_size,
                cd_offset,
            });
        }
        Err(FormatError::MissingEndRecord)
    }

    /// Returns true if the real values live in a zip64 record
    pub fn defers_to_zip64(&self) -> bool {
        self.entries == U16_SENTINEL
            || self.cd_size == U32_SENTINEL
            || self.cd_offset == U32_SENTINEL
    }

    /// Values of the classic record
    pub fn to_end(&self) -> EndOfCentralDirectory {
        EndOfCentralDirectory {
            entries: self.entries as u64,
            cd_size: self.cd_size as u64,
            cd_offset: self.cd_offset as u64,
        }
    }
}

/// Decode a zip64 locator, returning the zip64 end record's offset.
pub fn decode_zip64_locator(data: &[u8]) -> Result<u64, FormatError> {
    let mut r = FieldReader::new(data, "zip64 locator");
    r.signature(ZIP64_LOCATOR_SIG)?;
    let _disk = r.u32()?;
    let offset = r.u64()?;
    let _disks = r.u32()?;
    Ok(offset)
}

/// Decode a zip64 end of central directory record.
pub fn decode_zip64_end(data: &[u8]) -> Result<EndOfCentralDirectory, FormatError> {
    let mut r = FieldReader::new(data, "zip64 end of central directory");
    r.signature(ZIP64_EOCD_SIG)?;
    let _record_size = r.u64()?;
    let _made_by = r.u16()?;
    let _version = r.u16()?;
    let _disk = r.u32()?;
    let _cd_disk = r.u32()?;
    let _entries_on_disk = r.u64()?;
    let entries = r.u64()?;
    let cd_size = r.u64()?;
    let cd_offset = r.u64()?;
    Ok(EndOfCentralDirectory {
        entries,
        cd_size,
        cd_offset,
    })
}
