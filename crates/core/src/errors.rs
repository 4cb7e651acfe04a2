//! Error types for the docsync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// Codec errors
// ---------------------------------------------------------------------------

/// Errors from encoding or decoding an export artifact.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Decompression or JSON parsing failed.
    #[error("malformed documentation file: {0}")]
    Malformed(String),

    /// The declared payload length does not match the bytes present.
    #[error("truncated documentation file: expected {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },

    /// The envelope tag byte is not one we know how to read.
    #[error("unknown documentation file envelope tag 0x{0:02x}")]
    UnknownEnvelope(u8),

    /// Generic I/O wrapper for file import/export.
    #[error("documentation file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Errors returned by [`EntityStore`](crate::store::EntityStore) calls.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with this id exists.
    #[error("documentation record {id} not found")]
    NotFound { id: u64 },

    /// A record with this id already exists.
    #[error("documentation record {id} already exists")]
    DuplicateKey { id: u64 },

    /// The record carries neither a body nor member notes.
    #[error("documentation record {id} is empty and cannot be persisted")]
    EmptyRecord { id: u64 },

    /// Underlying persistence failure.
    #[error("store database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::SqliteError(e))
    }
}

// ---------------------------------------------------------------------------
// Apply errors
// ---------------------------------------------------------------------------

/// Errors from committing resolved merge operations to the store.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// One or more records could not be written. Every other record was
    /// still processed.
    #[error("apply failed for {} record(s)", .0.len())]
    PartialFailure(Vec<(u64, StoreError)>),
}

impl ApplyError {
    /// Ids of the records that failed, in the order they failed.
    pub fn failed_ids(&self) -> Vec<u64> {
        match self {
            Self::PartialFailure(failures) => failures.iter().map(|(id, _)| *id).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Errors from an import or export run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The file could not be read or decoded; nothing was written.
    #[error("sync codec error: {0}")]
    Codec(#[from] CodecError),

    /// Reading or overwriting the local set failed.
    #[error("sync store error: {0}")]
    Store(#[from] StoreError),

    /// Some records could not be merged.
    #[error("sync apply error: {0}")]
    Apply(#[from] ApplyError),
}

// ---------------------------------------------------------------------------
// Edit errors
// ---------------------------------------------------------------------------

/// Errors from the user edit path.
#[derive(Debug, Error)]
pub enum EditError {
    /// The member to remove does not exist on the class.
    #[error("member {member_id} not found on documentation record {class_id}")]
    MemberNotFound { class_id: u64, member_id: u64 },

    /// Underlying store error.
    #[error("edit store error: {0}")]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Database errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite persistence layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed { version: u32, detail: String },

    /// Generic I/O error (e.g. file permissions).
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = StoreError::NotFound { id: 42 };
        assert_eq!(err.to_string(), "documentation record 42 not found");

        let err = CodecError::UnknownEnvelope(0x7f);
        assert_eq!(
            err.to_string(),
            "unknown documentation file envelope tag 0x7f"
        );

        let err = CodecError::Truncated {
            expected: 10,
            actual: 3,
        };
        assert!(err.to_string().contains("expected 10"));

        let err = ConfigError::InvalidValue {
            field: "logging.level".into(),
            detail: "unknown level".into(),
        };
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn test_partial_failure_lists_ids() {
        let err = ApplyError::PartialFailure(vec![
            (7, StoreError::DuplicateKey { id: 7 }),
            (9, StoreError::EmptyRecord { id: 9 }),
        ]);
        assert_eq!(err.to_string(), "apply failed for 2 record(s)");
        assert_eq!(err.failed_ids(), vec![7, 9]);
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let core_err: CoreError = StoreError::DuplicateKey { id: 1 }.into();
        assert!(matches!(core_err, CoreError::Store(_)));

        let core_err: CoreError = CodecError::Malformed("bad".into()).into();
        assert!(matches!(core_err, CoreError::Codec(_)));
    }
}
