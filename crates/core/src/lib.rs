//! Core types and traits for Recordpack
//!
//! This crate defines the foundational types shared by the archive layer:
//! - ArchiveError: Error taxonomy for writers and readers
//! - RecordSink / RecordSource: Byte sink and random-access source traits
//! - SerializationId: Per-archive identity token
//! - Record naming conventions (reserved identity name, debug suffix)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ArchiveError, Result};
pub use traits::{FnSink, RecordSink, RecordSource, SeekSource};
pub use types::{
    is_debug_record, is_serialization_id_record, validate_record_name, SerializationId,
    DEBUG_RECORD_SUFFIX, MAX_RECORD_NAME_BYTES, SERIALIZATION_ID_RECORD_NAME,
};
