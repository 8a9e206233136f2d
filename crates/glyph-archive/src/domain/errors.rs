//! # Domain Errors
//!
//! Error types for the archive core.
//!
//! - `ArchiveError` is what pipeline callers see.
//! - `StoreError`, `IpcError` and `AuditError` belong to the individual
//!   components and convert into `ArchiveError` with `?`.
//!
//! A verification mismatch is deliberately absent: it is a result
//! (`VerificationOutcome::Mismatch`), not a failure.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the ingestion and verification pipelines.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Source path is missing or not a regular file.
    #[error("source file not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// No metadata entry matches the selector.
    #[error("archive entry not found: {selector}")]
    EntryNotFound { selector: String },

    /// The entry exists but its archived file is gone from disk.
    #[error("archived file for entry {id} is missing: {}", path.display())]
    ArchivedFileMissing { id: i64, path: PathBuf },

    /// Content digest (or archive path) already registered.
    #[error("duplicate {field} {value}{}", existing.as_ref().map(|p| format!(": already archived at {p}")).unwrap_or_default())]
    Duplicate {
        field: DuplicateField,
        value: String,
        existing: Option<String>,
    },

    /// Post-copy digests differ. The destination is left in place.
    #[error(
        "integrity mismatch after copying {} -> {}: source {source_digest}, copy {destination_digest}",
        origin.display(),
        destination.display()
    )]
    IntegrityMismatch {
        origin: PathBuf,
        destination: PathBuf,
        source_digest: String,
        destination_digest: String,
    },

    /// Module IPC failure.
    #[error(transparent)]
    Ipc(#[from] IpcError),

    /// Metadata store failure.
    #[error(transparent)]
    Store(StoreError),

    /// Audit log failure.
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// In-process cryptographic operation failed.
    #[error("crypto operation failed: {reason}")]
    Crypto { reason: String },

    /// Sealed bytes did not authenticate under the key: altered, truncated
    /// or sealed with another key.
    #[error("authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// Configuration is unusable for the requested operation.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// File system failure on a specific path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ArchiveError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the duplicate condition, whether detected by the pre-check
    /// or by the store's uniqueness constraint.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, ArchiveError::Duplicate { .. })
    }
}

impl From<StoreError> for ArchiveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field, value } => ArchiveError::Duplicate {
                field,
                value,
                existing: None,
            },
            other => ArchiveError::Store(other),
        }
    }
}

/// Which unique column rejected an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    ArchivePath,
    ContentDigest,
}

impl fmt::Display for DuplicateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateField::ArchivePath => write!(f, "file_path"),
            DuplicateField::ContentDigest => write!(f, "hash"),
        }
    }
}

/// Metadata store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness constraint violated.
    #[error("duplicate {field}: {value}")]
    Duplicate { field: DuplicateField, value: String },

    /// No row with this id.
    #[error("no entry with id {id}")]
    NotFound { id: i64 },

    /// A stored row could not be decoded.
    #[error("corrupt row: {reason}")]
    Corrupt { reason: String },

    /// Path cannot be stored as text.
    #[error("path is not valid UTF-8: {}", path.display())]
    UnsupportedPath { path: PathBuf },

    /// Underlying SQLite failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to prepare the database location.
    #[error("store I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Module IPC errors.
#[derive(Debug, Error)]
pub enum IpcError {
    /// Module executable does not exist.
    #[error("module executable not found: {}", path.display())]
    ExecutableNotFound { path: PathBuf },

    /// Serialized request exceeds the transport ceiling. Raised before spawn.
    #[error("IPC payload too large: {size} bytes > {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Request could not be serialized.
    #[error("failed to encode IPC request: {0}")]
    Encode(#[from] serde_json::Error),

    /// Process could not be started.
    #[error("failed to spawn module {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Module did not exit in time and was killed.
    #[error("module {} timed out after {:.1}s", path.display(), elapsed.as_secs_f64())]
    Timeout { path: PathBuf, elapsed: Duration },

    /// Module exited unsuccessfully.
    #[error("module {} exited with code {}: stderr: {stderr}", path.display(), code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    NonZeroExit {
        path: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    /// Module output is not a valid response.
    #[error("invalid response from module ({reason}): {raw}")]
    MalformedResponse { raw: String, reason: String },

    /// Module answered with an `error` field.
    #[error("module rejected `{command}`: {message}")]
    ModuleRejected { command: String, message: String },

    /// Pipe or wait failure while talking to the module.
    #[error("module I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Audit log errors.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Replay found a record whose digest linkage does not hold.
    #[error("audit chain broken at record {position} (line {line}): {reason}")]
    ChainCorruption {
        position: usize,
        line: usize,
        reason: String,
    },

    /// Failed to read, lock or append to the log file.
    #[error("audit log I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Record could not be encoded.
    #[error("audit record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
