//! Recordpack - aligned, random-access record archives
//!
//! Recordpack persists a named set of opaque byte blobs ("records") into one
//! sequential archive and retrieves any record by name without re-reading the
//! whole archive. It is the storage layer under model serialization: tensors,
//! metadata and debug artifacts are each stored as one record.
//!
//! # Quick Start
//!
//! ```ignore
//! use recordpack::{ArchiveReader, ArchiveWriter};
//!
//! let mut writer = ArchiveWriter::new(Vec::new());
//! writer.write_record("key1", b"payload")?;
//! writer.write_end_of_file()?;
//! let archive = writer.into_inner()?;
//!
//! let reader = ArchiveReader::new(archive)?;
//! assert_eq!(reader.get_record("key1")?, b"payload");
//! ```

pub use recordpack_archive::*;
pub use recordpack_core::*;
