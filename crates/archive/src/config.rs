//! Archive configuration
//!
//! Writer and reader settings. Both validate before use and report problems
//! as [`ConfigError`], surfaced to callers as `ArchiveError::InvalidConfig`.

use recordpack_core::ArchiveError;

/// Default record data alignment in bytes.
pub const DEFAULT_ALIGNMENT: u64 = 64;

/// Largest supported alignment.
///
/// Padding is stored in a ZIP extra field whose length is a u16, so any pad
/// (at most `alignment - 1` bytes) must fit in 16 bits.
pub const MAX_ALIGNMENT: u64 = 32 * 1024;

/// Writer configuration
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Alignment of every record's data start offset (default: 64)
    pub alignment: u64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            alignment: DEFAULT_ALIGNMENT,
        }
    }
}

impl WriterConfig {
    /// Create a writer configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set record alignment (builder pattern).
    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.alignment = alignment;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_alignment(self.alignment)
    }
}

/// Reader configuration
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Alignment every record's data offset is expected to satisfy (default: 64)
    pub alignment: u64,

    /// Serve records named with the debug suffix (default: true)
    pub load_debug_records: bool,

    /// Check payload CRC-32 on every read (default: true)
    pub verify_checksums: bool,

    /// Reject archives containing misaligned records at open (default: true)
    pub strict_alignment: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            alignment: DEFAULT_ALIGNMENT,
            load_debug_records: true,
            verify_checksums: true,
            strict_alignment: true,
        }
    }
}

impl ReaderConfig {
    /// Create a reader configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set expected alignment (builder pattern).
    pub fn with_alignment(mut self, alignment: u64) -> Self {
        self.alignment = alignment;
        self
    }

    /// Enable or disable serving debug records (builder pattern).
    pub fn with_debug_records(mut self, load: bool) -> Self {
        self.load_debug_records = load;
        self
    }

    /// Enable or disable checksum verification (builder pattern).
    pub fn with_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Enable or disable the alignment check at open (builder pattern).
    pub fn with_strict_alignment(mut self, strict: bool) -> Self {
        self.strict_alignment = strict;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_alignment(self.alignment)
    }
}

fn validate_alignment(alignment: u64) -> Result<(), ConfigError> {
    if !alignment.is_power_of_two() {
        return Err(ConfigError::AlignmentNotPowerOfTwo(alignment));
    }
    if alignment > MAX_ALIGNMENT {
        return Err(ConfigError::AlignmentTooLarge(alignment));
    }
    Ok(())
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Alignment must be a power of two
    #[error("Alignment must be a power of two, got {0}")]
    AlignmentNotPowerOfTwo(u64),

    /// Alignment exceeds the largest pad a ZIP extra field can hold
    #[error("Alignment {0} exceeds maximum of 32768")]
    AlignmentTooLarge(u64),
}

impl From<ConfigError> for ArchiveError {
    fn from(e: ConfigError) -> Self {
        ArchiveError::InvalidConfig(e.to_string())
    }
}
