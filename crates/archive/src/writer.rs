//! Stream writer
//!
//! Appends named records to a sink, each payload aligned, then finalizes the
//! archive with the identity record, the central directory and the end
//! marker.
//!
//! # Lifecycle
//!
//! ```text
//! new() ──write_record()*──> write_end_of_file() ──> finalized (immutable)
//!              │
//!              └── sink failure ──> failed (every later call errors)
//! ```
//!
//! The sink only ever sees strictly increasing offsets; nothing is rewound.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use recordpack_core::{
    is_serialization_id_record, validate_record_name, ArchiveError, RecordSink, Result,
    SerializationId, SERIALIZATION_ID_RECORD_NAME,
};
use tracing::{debug, trace, warn};

use crate::config::WriterConfig;
use crate::directory::{RecordDirectory, RecordEntry};
use crate::format::{EndOfCentralDirectory, LocalHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Open,
    Finalized,
    Failed,
}

/// Writer for record archives
pub struct ArchiveWriter<S: RecordSink> {
    sink: S,
    config: WriterConfig,
    position: u64,
    directory: RecordDirectory,
    serialization_id: SerializationId,
    /// Identity bytes a caller wrote under the reserved name
    supplied_id: Option<Vec<u8>>,
    state: WriterState,
}

impl<S: RecordSink> ArchiveWriter<S> {
    /// Create a writer with default configuration
    pub fn new(sink: S) -> Self {
        Self::build(sink, WriterConfig::default())
    }

    /// Create a writer with the given configuration
    pub fn with_config(sink: S, config: WriterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(sink, config))
    }

    fn build(sink: S, config: WriterConfig) -> Self {
        let serialization_id = SerializationId::generate();
        debug!(%serialization_id, alignment = config.alignment, "Created archive writer");
        ArchiveWriter {
            sink,
            config,
            position: 0,
            directory: RecordDirectory::new(),
            serialization_id,
            supplied_id: None,
            state: WriterState::Open,
        }
    }

    /// Write one record.
    ///
    /// Writing under the reserved identity name stamps the archive's identity
    /// instead of adding a visible record; only the first such write counts.
    pub fn write_record(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        validate_record_name(name)?;

        if is_serialization_id_record(name) {
            if self.supplied_id.is_some() {
                warn!(record = name, "Serialization id already supplied, ignoring duplicate write");
            } else {
                debug!(record = name, len = data.len(), "Caller supplied serialization id");
                self.supplied_id = Some(data.to_vec());
            }
            return Ok(());
        }

        if self.directory.contains(name) {
            return Err(ArchiveError::DuplicateName(name.to_string()));
        }

        let entry = self.write_block(name, data)?;
        self.directory.insert(entry)
    }

    /// Records written so far.
    ///
    /// Excludes the identity record until the archive is finalized.
    pub fn written_records(&self) -> &RecordDirectory {
        &self.directory
    }

    /// Identity token generated for this writer
    pub fn serialization_id(&self) -> &SerializationId {
        &self.serialization_id
    }

    /// Finalize the archive.
    ///
    /// Writes the identity record, the central directory and the end
    /// records, then flushes the sink. No records can be written afterwards.
    pub fn write_end_of_file(&mut self) -> Result<()> {
        self.ensure_open()?;

        // The identity record must precede the directory that indexes it
        let id_bytes = match self.supplied_id.take() {
            Some(bytes) => bytes,
            None => self.serialization_id.as_bytes().to_vec(),
        };
        let id_entry = self.write_block(SERIALIZATION_ID_RECORD_NAME, &id_bytes)?;
        self.directory.insert(id_entry)?;

        let cd_offset = self.position;
        let mut central = Vec::new();
        for entry in &self.directory {
            entry.central_header().encode(&mut central);
        }
        self.append(&central)?;

        let end = EndOfCentralDirectory {
            entries: self.directory.len() as u64,
            cd_size: central.len() as u64,
            cd_offset,
        };
        let mut tail = Vec::with_capacity(end.encoded_len() as usize);
        end.encode(self.position, &mut tail);
        self.append(&tail)?;

        if let Err(e) = self.sink.flush_sink() {
            self.state = WriterState::Failed;
            return Err(e.into());
        }
        self.state = WriterState::Finalized;

        debug!(
            records = self.directory.len(),
            archive_size = self.position,
            zip64 = end.needs_zip64(),
            "Archive finalized"
        );
        Ok(())
    }

    /// Returns true once `write_end_of_file` has succeeded
    pub fn is_finalized(&self) -> bool {
        self.state == WriterState::Finalized
    }

    /// Bytes handed to the sink so far
    pub fn bytes_written(&self) -> u64 {
        self.position
    }

    /// Writer configuration
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Return the sink of a finalized archive
    pub fn into_inner(self) -> Result<S> {
        if self.state != WriterState::Finalized {
            return Err(ArchiveError::invalid_state(
                "archive is not finalized; call write_end_of_file first",
            ));
        }
        Ok(self.sink)
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            WriterState::Open => Ok(()),
            WriterState::Finalized => Err(ArchiveError::invalid_state(
                "archive already finalized",
            )),
            WriterState::Failed => Err(ArchiveError::invalid_state(
                "writer failed after a sink error; archive is unusable",
            )),
        }
    }

    /// Write local header, pad and payload for one record
    fn write_block(&mut self, name: &str, data: &[u8]) -> Result<RecordEntry> {
        let crc32 = crc32fast::hash(data);
        let size = data.len() as u64;
        let header_offset = self.position;
        let (header, data_offset) =
            LocalHeader::new(name, crc32, size).encode(header_offset, self.config.alignment);

        self.append(&header)?;
        self.append(data)?;

        trace!(record = name, header_offset, data_offset, size, "Record written");
        Ok(RecordEntry {
            name: name.to_string(),
            header_offset,
            data_offset,
            size,
            crc32,
        })
    }

    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let accepted = match self.sink.append(bytes) {
            Ok(n) => n,
            Err(e) => {
                warn!(position = self.position, error = %e, "Sink write failed");
                self.state = WriterState::Failed;
                return Err(e.into());
            }
        };
        if accepted != bytes.len() {
            warn!(
                position = self.position,
                expected = bytes.len(),
                accepted,
                "Sink accepted a short write"
            );
            self.state = WriterState::Failed;
            return Err(ArchiveError::ShortWrite {
                expected: bytes.len(),
                accepted,
            });
        }
        self.position += bytes.len() as u64;
        Ok(())
    }
}

impl ArchiveWriter<BufWriter<File>> {
    /// Create a file-backed writer, truncating any existing file
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        debug!(path = %path.display(), "Creating archive file");
        Ok(Self::new(BufWriter::new(file)))
    }
}
