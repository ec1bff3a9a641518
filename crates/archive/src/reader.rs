//! Stream reader
//!
//! Parses the end marker and central directory of a finalized archive up
//! front, then serves records by name from a random-access source.
//!
//! # Visibility
//!
//! A name that was never written is an error (`NotFound`) in every lookup.
//! A debug record (name ending in `.debug_pkl`) is present but, with debug
//! loading disabled, suppressed: `has_record` reports false and the read
//! forms succeed with zero bytes.

use std::fs::File;
use std::path::Path;

use recordpack_core::{
    is_serialization_id_record, ArchiveError, RecordSource, Result, SeekSource, SerializationId,
    SERIALIZATION_ID_RECORD_NAME,
};
use tracing::{debug, trace};

use crate::config::ReaderConfig;
use crate::directory::{RecordDirectory, RecordEntry};
use crate::format::end::{decode_zip64_end, decode_zip64_locator, ClassicEnd, MAX_COMMENT_LEN};
use crate::format::headers::LocalHeaderPrefix;
use crate::format::{
    CentralHeader, EndOfCentralDirectory, FieldReader, EOCD_SIZE, LOCAL_HEADER_SIZE,
    METHOD_STORED, ZIP64_EOCD_SIZE, ZIP64_LOCATOR_SIZE,
};
use crate::padding::is_aligned;

/// Reader for record archives
pub struct ArchiveReader<S: RecordSource> {
    source: S,
    config: ReaderConfig,
    archive_size: u64,
    directory: RecordDirectory,
    /// The reserved identity record, kept out of the ordinary directory
    identity: Option<RecordEntry>,
}

impl<S: RecordSource> ArchiveReader<S> {
    /// Open an archive with default configuration
    pub fn new(source: S) -> Result<Self> {
        Self::with_config(source, ReaderConfig::default())
    }

    /// Open an archive with the given configuration
    pub fn with_config(source: S, config: ReaderConfig) -> Result<Self> {
        config.validate()?;
        let archive_size = source.size()?;

        let (end, directory_limit) = read_end_records(&source, archive_size)?;
        let headers = read_central_directory(&source, &end, directory_limit)?;

        let mut entries = Vec::with_capacity(headers.len());
        for header in headers {
            entries.push(resolve_entry(&source, header, end.cd_offset)?);
        }
        check_no_overlap(&entries)?;

        let mut directory = RecordDirectory::new();
        let mut identity = None;
        for entry in entries {
            if config.strict_alignment && !is_aligned(entry.data_offset, config.alignment) {
                return Err(ArchiveError::corrupt(format!(
                    "record '{}' data offset {} is not {}-byte aligned",
                    entry.name, entry.data_offset, config.alignment
                )));
            }
            if is_serialization_id_record(&entry.name) {
                if identity.is_some() {
                    return Err(ArchiveError::corrupt("multiple serialization id records"));
                }
                identity = Some(entry);
                continue;
            }
            directory.insert(entry).map_err(|e| match e {
                ArchiveError::DuplicateName(name) => {
                    ArchiveError::corrupt(format!("duplicate record name '{}'", name))
                }
                other => other,
            })?;
        }

        debug!(
            records = directory.len(),
            archive_size,
            has_identity = identity.is_some(),
            "Opened archive"
        );

        Ok(ArchiveReader {
            source,
            config,
            archive_size,
            directory,
            identity,
        })
    }

    /// Serve or suppress debug records on subsequent lookups
    pub fn set_load_debug_records(&mut self, load: bool) {
        self.config.load_debug_records = load;
    }

    /// Returns true if debug records are served
    pub fn loads_debug_records(&self) -> bool {
        self.config.load_debug_records
    }

    /// Returns true if the record exists and is not suppressed
    pub fn has_record(&self, name: &str) -> bool {
        matches!(self.lookup(name), Ok(Some(_)))
    }

    /// Absolute offset of the record's payload within the source.
    ///
    /// Suppressed debug records are reported as `NotFound`.
    pub fn get_record_offset(&self, name: &str) -> Result<u64> {
        match self.lookup(name)? {
            Some(entry) => Ok(entry.data_offset),
            None => Err(ArchiveError::not_found(name)),
        }
    }

    /// Payload size of a record (0 if suppressed)
    pub fn record_size(&self, name: &str) -> Result<u64> {
        Ok(self.lookup(name)?.map_or(0, |entry| entry.size))
    }

    /// Read a whole record into a new buffer (empty if suppressed)
    pub fn get_record(&self, name: &str) -> Result<Vec<u8>> {
        let entry = match self.lookup(name)? {
            Some(entry) => entry,
            None => return Ok(Vec::new()),
        };
        let mut buf = vec![0u8; self.buffer_len(entry)?];
        self.read_payload(entry, &mut buf)?;
        Ok(buf)
    }

    /// Read a whole record into `dst`, returning the bytes written
    /// (0 if suppressed). Fails with `BufferTooSmall` if `dst` is shorter
    /// than the record; `dst` is left untouched in that case.
    pub fn get_record_into(&self, name: &str, dst: &mut [u8]) -> Result<usize> {
        let entry = match self.lookup(name)? {
            Some(entry) => entry,
            None => return Ok(0),
        };
        let len = self.check_capacity(entry, dst.len())?;
        self.read_payload(entry, &mut dst[..len])?;
        Ok(len)
    }

    /// Read a record into `dst` in chunks of at most `chunk_size` bytes,
    /// handing each chunk to `copy_fn(dst_window, chunk)`.
    ///
    /// Returns the total bytes delivered (0 if suppressed).
    pub fn get_record_chunked<F>(
        &self,
        name: &str,
        dst: &mut [u8],
        chunk_size: usize,
        mut copy_fn: F,
    ) -> Result<usize>
    where
        F: FnMut(&mut [u8], &[u8]),
    {
        let entry = match self.lookup(name)? {
            Some(entry) => entry,
            None => return Ok(0),
        };
        let len = self.check_capacity(entry, dst.len())?;

        let mut delivered = 0;
        for chunk in RecordChunks::new(self, Some(entry), chunk_size)? {
            let chunk = chunk?;
            copy_fn(&mut dst[delivered..delivered + chunk.len()], &chunk);
            delivered += chunk.len();
        }
        debug_assert_eq!(delivered, len);
        Ok(delivered)
    }

    /// Lazily read a record as a sequence of chunks of at most
    /// `chunk_size` bytes; the last chunk may be shorter.
    ///
    /// Suppressed records yield no chunks. Call again to restart.
    pub fn record_chunks(&self, name: &str, chunk_size: usize) -> Result<RecordChunks<'_, S>> {
        let entry = self.lookup(name)?;
        RecordChunks::new(self, entry, chunk_size)
    }

    /// Identity token stored in the archive
    pub fn serialization_id(&self) -> Result<SerializationId> {
        let entry = self.identity.as_ref().ok_or_else(|| {
            ArchiveError::corrupt(format!("missing '{}' record", SERIALIZATION_ID_RECORD_NAME))
        })?;
        let mut buf = vec![0u8; self.buffer_len(entry)?];
        self.read_payload(entry, &mut buf)?;
        Ok(SerializationId::from_bytes(buf))
    }

    /// Ordinary record names in archive order (identity record excluded)
    pub fn record_names(&self) -> impl Iterator<Item = &str> {
        self.directory.names()
    }

    /// Number of ordinary records
    pub fn record_count(&self) -> usize {
        self.directory.len()
    }

    /// Ordinary record directory
    pub fn directory(&self) -> &RecordDirectory {
        &self.directory
    }

    /// Total archive size in bytes
    pub fn archive_size(&self) -> u64 {
        self.archive_size
    }

    /// Reader configuration
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Release the underlying source
    pub fn into_inner(self) -> S {
        self.source
    }

    /// Resolve a name. `Err(NotFound)` if absent, `Ok(None)` if suppressed.
    fn lookup(&self, name: &str) -> Result<Option<&RecordEntry>> {
        let found = if is_serialization_id_record(name) {
            self.identity.as_ref()
        } else {
            self.directory.get(name)
        };
        let entry = found.ok_or_else(|| ArchiveError::not_found(name))?;

        if entry.is_debug() && !self.config.load_debug_records {
            trace!(record = name, "Debug record suppressed");
            return Ok(None);
        }
        Ok(Some(entry))
    }

    fn buffer_len(&self, entry: &RecordEntry) -> Result<usize> {
        usize::try_from(entry.size).map_err(|_| {
            ArchiveError::invalid_argument(format!(
                "record '{}' of {} bytes does not fit in memory",
                entry.name, entry.size
            ))
        })
    }

    fn check_capacity(&self, entry: &RecordEntry, capacity: usize) -> Result<usize> {
        if (capacity as u64) < entry.size {
            return Err(ArchiveError::BufferTooSmall {
                name: entry.name.clone(),
                required: entry.size,
                capacity,
            });
        }
        Ok(entry.size as usize)
    }

    fn read_payload(&self, entry: &RecordEntry, buf: &mut [u8]) -> Result<()> {
        self.source.read_exact_at(entry.data_offset, buf)?;
        trace!(record = %entry.name, size = entry.size, "Record read");
        if self.config.verify_checksums {
            verify_crc(entry, crc32fast::hash(buf))?;
        }
        Ok(())
    }
}

impl ArchiveReader<SeekSource<File>> {
    /// Open a file-backed archive
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        debug!(path = %path.display(), "Opening archive file");
        Self::new(SeekSource::new(file)?)
    }
}

/// Lazy, finite sequence of payload chunks for one record.
///
/// Each item is at most `chunk_size` bytes. With checksum verification on,
/// the final item is an error if the payload does not match its CRC-32.
pub struct RecordChunks<'a, S: RecordSource> {
    reader: &'a ArchiveReader<S>,
    entry: Option<&'a RecordEntry>,
    chunk_size: u64,
    delivered: u64,
    hasher: crc32fast::Hasher,
    done: bool,
}

impl<'a, S: RecordSource> RecordChunks<'a, S> {
    fn new(
        reader: &'a ArchiveReader<S>,
        entry: Option<&'a RecordEntry>,
        chunk_size: usize,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ArchiveError::invalid_argument("chunk size must be at least 1"));
        }
        Ok(RecordChunks {
            reader,
            entry,
            chunk_size: chunk_size as u64,
            delivered: 0,
            hasher: crc32fast::Hasher::new(),
            done: false,
        })
    }

    /// Bytes delivered so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    fn next_chunk(&mut self, entry: &RecordEntry) -> Result<Option<Vec<u8>>> {
        let remaining = entry.size - self.delivered;
        if remaining == 0 {
            if self.reader.config.verify_checksums {
                let actual = std::mem::replace(&mut self.hasher, crc32fast::Hasher::new());
                verify_crc(entry, actual.finalize())?;
            }
            return Ok(None);
        }

        let len = remaining.min(self.chunk_size) as usize;
        let mut chunk = vec![0u8; len];
        self.reader
            .source
            .read_exact_at(entry.data_offset + self.delivered, &mut chunk)?;
        self.hasher.update(&chunk);
        self.delivered += len as u64;
        Ok(Some(chunk))
    }
}

impl<S: RecordSource> Iterator for RecordChunks<'_, S> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let entry = match self.entry {
            Some(entry) => entry,
            None => {
                self.done = true;
                return None;
            }
        };
        match self.next_chunk(entry) {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn verify_crc(entry: &RecordEntry, actual: u32) -> Result<()> {
    if actual != entry.crc32 {
        return Err(ArchiveError::ChecksumMismatch {
            name: entry.name.clone(),
            expected: entry.crc32,
            actual,
        });
    }
    Ok(())
}

/// Locate the end records. Returns them plus the offset the central
/// directory must end at or before.
fn read_end_records<S: RecordSource>(
    source: &S,
    archive_size: u64,
) -> Result<(EndOfCentralDirectory, u64)> {
    if archive_size < EOCD_SIZE {
        return Err(ArchiveError::corrupt(format!(
            "archive of {} bytes is too small to hold an end marker",
            archive_size
        )));
    }

    let tail_len = archive_size.min(EOCD_SIZE + MAX_COMMENT_LEN);
    let tail_start = archive_size - tail_len;
    let mut tail = vec![0u8; tail_len as usize];
    source.read_exact_at(tail_start, &mut tail)?;

    let classic = ClassicEnd::find(&tail)?;
    let eocd_offset = tail_start + classic.tail_index as u64;
    if !classic.defers_to_zip64() {
        return Ok((classic.to_end(), eocd_offset));
    }

    if eocd_offset < ZIP64_LOCATOR_SIZE + ZIP64_EOCD_SIZE {
        return Err(ArchiveError::corrupt("zip64 locator missing before end marker"));
    }
    let mut locator = [0u8; ZIP64_LOCATOR_SIZE as usize];
    source.read_exact_at(eocd_offset - ZIP64_LOCATOR_SIZE, &mut locator)?;
    let zip64_offset = decode_zip64_locator(&locator)?;
    if zip64_offset > eocd_offset - ZIP64_LOCATOR_SIZE - ZIP64_EOCD_SIZE {
        return Err(ArchiveError::corrupt(format!(
            "zip64 end record offset {} out of range",
            zip64_offset
        )));
    }

    let mut record = [0u8; ZIP64_EOCD_SIZE as usize];
    source.read_exact_at(zip64_offset, &mut record)?;
    Ok((decode_zip64_end(&record)?, zip64_offset))
}

fn read_central_directory<S: RecordSource>(
    source: &S,
    end: &EndOfCentralDirectory,
    limit: u64,
) -> Result<Vec<CentralHeader>> {
    let cd_end = end
        .cd_offset
        .checked_add(end.cd_size)
        .filter(|cd_end| *cd_end <= limit)
        .ok_or_else(|| {
            ArchiveError::corrupt(format!(
                "central directory [{}, +{}) extends past end marker at {}",
                end.cd_offset, end.cd_size, limit
            ))
        })?;

    // Every entry needs at least a fixed header, which bounds the count
    let max_entries = end.cd_size / crate::format::CENTRAL_HEADER_SIZE;
    if end.entries > max_entries {
        return Err(ArchiveError::corrupt(format!(
            "{} entries cannot fit in a {}-byte central directory",
            end.entries, end.cd_size
        )));
    }

    let mut raw = vec![0u8; (cd_end - end.cd_offset) as usize];
    source.read_exact_at(end.cd_offset, &mut raw)?;

    let mut r = FieldReader::new(&raw, "central directory");
    let mut headers = Vec::with_capacity(end.entries as usize);
    for _ in 0..end.entries {
        headers.push(CentralHeader::decode(&mut r)?);
    }
    Ok(headers)
}

/// Read a record's local header to find where its payload starts.
fn resolve_entry<S: RecordSource>(
    source: &S,
    header: CentralHeader,
    cd_offset: u64,
) -> Result<RecordEntry> {
    if header.header_offset.saturating_add(LOCAL_HEADER_SIZE) > cd_offset {
        return Err(ArchiveError::corrupt(format!(
            "record '{}' header offset {} lies past the central directory",
            header.name, header.header_offset
        )));
    }

    let mut fixed = [0u8; LOCAL_HEADER_SIZE as usize];
    source.read_exact_at(header.header_offset, &mut fixed)?;
    let prefix = LocalHeaderPrefix::decode(&fixed)?;
    if prefix.method != METHOD_STORED {
        return Err(ArchiveError::corrupt(format!(
            "record '{}' local header uses compression method {}",
            header.name, prefix.method
        )));
    }

    let mut name = vec![0u8; prefix.name_len as usize];
    source.read_exact_at(header.header_offset + LOCAL_HEADER_SIZE, &mut name)?;
    if name != header.name.as_bytes() {
        return Err(ArchiveError::corrupt(format!(
            "local header name {:?} does not match directory name '{}'",
            String::from_utf8_lossy(&name),
            header.name
        )));
    }

    let data_offset = header.header_offset + prefix.payload_distance();
    if data_offset.saturating_add(header.size) > cd_offset {
        return Err(ArchiveError::corrupt(format!(
            "record '{}' payload [{}, +{}) overlaps the central directory",
            header.name, data_offset, header.size
        )));
    }

    Ok(RecordEntry {
        name: header.name,
        header_offset: header.header_offset,
        data_offset,
        size: header.size,
        crc32: header.crc32,
    })
}

fn check_no_overlap(entries: &[RecordEntry]) -> Result<()> {
    let mut spans: Vec<(u64, u64, &str)> = entries
        .iter()
        .map(|e| (e.header_offset, e.data_end(), e.name.as_str()))
        .collect();
    spans.sort_unstable();
    for pair in spans.windows(2) {
        let (_, prev_end, prev) = pair[0];
        let (start, _, next) = pair[1];
        if start < prev_end {
            return Err(ArchiveError::corrupt(format!(
                "records '{}' and '{}' overlap",
                prev, next
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::ArchiveWriter;

    fn build(records: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ArchiveWriter::new(Vec::new());
        for (name, data) in records {
            writer.write_record(name, data).unwrap();
        }
        writer.write_end_of_file().unwrap();
        writer.into_inner().unwrap()
    }

    #[test]
    fn test_open_and_read() {
        let archive = build(&[("a", b"alpha"), ("b", b"")]);
        let reader = ArchiveReader::new(&archive).unwrap();

        assert_eq!(reader.record_count(), 2);
        assert_eq!(reader.archive_size(), archive.len() as u64);
        assert_eq!(reader.get_record("a").unwrap(), b"alpha");
        assert_eq!(reader.get_record("b").unwrap(), b"");
        assert_eq!(reader.record_size("a").unwrap(), 5);

        let names: Vec<&str> = reader.record_names().collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_identity_record_resolvable_by_name() {
        let archive = build(&[("a", b"alpha")]);
        let reader = ArchiveReader::new(&archive).unwrap();

        assert!(reader.has_record(SERIALIZATION_ID_RECORD_NAME));
        let raw = reader.get_record(SERIALIZATION_ID_RECORD_NAME).unwrap();
        assert_eq!(raw, reader.serialization_id().unwrap().as_bytes());
        assert!(reader.record_names().all(|n| n != SERIALIZATION_ID_RECORD_NAME));
    }

    #[test]
    fn test_buffer_too_small_leaves_buffer_untouched() {
        let archive = build(&[("a", &[7u8; 100])]);
        let reader = ArchiveReader::new(&archive).unwrap();

        let mut dst = vec![0u8; 99];
        let err = reader.get_record_into("a", &mut dst).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::BufferTooSmall {
                required: 100,
                capacity: 99,
                ..
            }
        ));
        assert!(dst.iter().all(|b| *b == 0));

        let err = reader
            .get_record_chunked("a", &mut dst, 10, |d, s| d.copy_from_slice(s))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::BufferTooSmall { .. }));

        // Larger buffers are fine; only the record's bytes are written
        let mut dst = vec![0u8; 128];
        assert_eq!(reader.get_record_into("a", &mut dst).unwrap(), 100);
        assert!(dst[..100].iter().all(|b| *b == 7));
        assert!(dst[100..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let archive = build(&[("a", b"alpha")]);
        let reader = ArchiveReader::new(&archive).unwrap();
        assert!(matches!(
            reader.record_chunks("a", 0),
            Err(ArchiveError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_record_chunks_restartable() {
        let data: Vec<u8> = (0..=255u8).collect();
        let archive = build(&[("a", &data)]);
        let reader = ArchiveReader::new(&archive).unwrap();

        for _ in 0..2 {
            let chunks: Vec<Vec<u8>> = reader
                .record_chunks("a", 100)
                .unwrap()
                .collect::<Result<_>>()
                .unwrap();
            let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
            assert_eq!(sizes, vec![100, 100, 56]);
            assert_eq!(chunks.concat(), data);
        }

        let mut chunks = reader.record_chunks("a", 100).unwrap();
        assert_eq!(chunks.delivered(), 0);
        chunks.next().unwrap().unwrap();
        assert_eq!(chunks.delivered(), 100);
    }

    #[test]
    fn test_empty_record_has_no_chunks() {
        let archive = build(&[("empty", b"")]);
        let reader = ArchiveReader::new(&archive).unwrap();
        assert_eq!(reader.record_chunks("empty", 8).unwrap().count(), 0);
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let mut archive = build(&[("a", b"alpha")]);
        let offset = ArchiveReader::new(&archive)
            .unwrap()
            .get_record_offset("a")
            .unwrap() as usize;
        archive[offset] ^= 0xFF;

        let reader = ArchiveReader::new(&archive).unwrap();
        let err = reader.get_record("a").unwrap_err();
        assert!(matches!(err, ArchiveError::ChecksumMismatch { .. }));
        assert!(err.is_corruption());

        let results: Vec<Result<Vec<u8>>> = reader.record_chunks("a", 2).unwrap().collect();
        assert!(results.last().unwrap().is_err());

        let reader =
            ArchiveReader::with_config(&archive, ReaderConfig::new().with_checksums(false))
                .unwrap();
        assert_eq!(reader.get_record("a").unwrap()[1..], b"alpha"[1..]);
    }

    #[test]
    fn test_empty_source_is_corrupt() {
        let empty: Vec<u8> = Vec::new();
        let err = ArchiveReader::new(&empty).err().unwrap();
        assert!(matches!(err, ArchiveError::CorruptArchive(_)));
    }

    #[test]
    fn test_overlap_detection() {
        let entries = vec![
            RecordEntry {
                name: "a".to_string(),
                header_offset: 0,
                data_offset: 64,
                size: 100,
                crc32: 0,
            },
            RecordEntry {
                name: "b".to_string(),
                header_offset: 128,
                data_offset: 192,
                size: 10,
                crc32: 0,
            },
        ];
        assert!(check_no_overlap(&entries).is_err());
        assert!(check_no_overlap(&entries[..1]).is_ok());
    }
}
