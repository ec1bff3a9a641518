//! Record archive layer for Recordpack
//!
//! This crate implements the container format:
//!
//! - Writer: append-only, one aligned payload per named record
//! - Reader: directory parsed once up front, random-access lookups by name
//! - Format: stored ZIP layout (local headers, central directory, end marker)
//! - Padding: every payload starts on an alignment boundary (default 64)
//! - Identity: one reserved `.data/serialization_id` record per archive
//!
//! ## Usage
//!
//! ```ignore
//! let mut writer = ArchiveWriter::new(Vec::new());
//! writer.write_record("data/0", &tensor_bytes)?;
//! writer.write_end_of_file()?;
//! let bytes = writer.into_inner()?;
//!
//! let reader = ArchiveReader::new(bytes)?;
//! let tensor = reader.get_record("data/0")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod directory;
pub mod format;
pub mod padding;
pub mod reader;
pub mod writer;

pub use config::{ConfigError, ReaderConfig, WriterConfig, DEFAULT_ALIGNMENT, MAX_ALIGNMENT};
pub use directory::{RecordDirectory, RecordEntry};
pub use format::FormatError;
pub use reader::{ArchiveReader, RecordChunks};
pub use writer::ArchiveWriter;
