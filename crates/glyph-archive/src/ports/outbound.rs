//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the archive service. Production adapters live in
//! `crate::adapters`; tests swap in their own where useful (clock, replicator).

use std::path::Path;

use serde_json::Value;

use crate::domain::algorithms::{CipherAlgorithm, HashAlgorithm};
use crate::domain::audit::ChainVerification;
use crate::domain::entities::{ArchiveEntry, NewEntry, Timestamp};
use crate::domain::errors::{ArchiveError, AuditError, StoreError};

/// Durable table of archive entries.
///
/// Production: `SqliteMetadataStore`.
///
/// ## Uniqueness
///
/// `archive_path` and `content_digest` are unique. Implementations enforce
/// this themselves and report violations as `StoreError::Duplicate`; callers
/// must never rely on a prior lookup alone.
pub trait MetadataStore {
    /// Insert an entry and return the stored snapshot (with its id).
    fn add_entry(&mut self, entry: NewEntry) -> Result<ArchiveEntry, StoreError>;

    /// Insert an entry and commit only if `then` succeeds.
    ///
    /// Used to make the row and its audit record appear together.
    fn add_entry_then<E, F>(&mut self, entry: NewEntry, then: F) -> Result<ArchiveEntry, E>
    where
        E: From<StoreError>,
        F: FnOnce(&ArchiveEntry) -> Result<(), E>;

    fn get_by_id(&self, id: i64) -> Result<Option<ArchiveEntry>, StoreError>;

    fn get_by_path(&self, path: &Path) -> Result<Option<ArchiveEntry>, StoreError>;

    fn get_by_digest(&self, digest: &str) -> Result<Option<ArchiveEntry>, StoreError>;

    /// Set `verified` and `last_checked_at`; returns the updated snapshot.
    fn update_verification(
        &mut self,
        id: i64,
        verified: bool,
        checked_at: Timestamp,
    ) -> Result<ArchiveEntry, StoreError>;

    /// Newest entries first, at most `limit`.
    fn list_recent(&self, limit: usize) -> Result<Vec<ArchiveEntry>, StoreError>;

    /// Number of entries.
    fn count(&self) -> Result<u64, StoreError>;
}

/// Append-only, hash-chained action log.
///
/// Production: `FileAuditLog`.
pub trait AuditSink {
    /// Append a record stamped `at` and return its digest.
    fn append(&self, at: &Timestamp, event: &str, payload: Value) -> Result<String, AuditError>;

    /// Replay the whole log from the sentinel.
    fn verify_chain(&self) -> Result<ChainVerification, AuditError>;
}

/// Hashing and encryption capability.
///
/// Two variants exist: `LocalProcessor` (in-process) and `ModuleProcessor`
/// (external executable over the IPC channel). The pipelines behave the same
/// with either.
pub trait ContentProcessor {
    /// Hex digest of a file's content.
    fn digest_file(&self, path: &Path, algorithm: HashAlgorithm) -> Result<String, ArchiveError>;

    /// Encrypt `plaintext`. Output layout is `nonce || ciphertext`.
    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &str,
        algorithm: CipherAlgorithm,
    ) -> Result<Vec<u8>, ArchiveError>;

    /// Inverse of `encrypt`.
    fn decrypt(
        &self,
        sealed: &[u8],
        key: &str,
        algorithm: CipherAlgorithm,
    ) -> Result<Vec<u8>, ArchiveError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Off-site copy of finished archives.
///
/// Fire-and-forget: the return value is informational and never gates
/// ingestion.
pub trait RemoteReplicator {
    fn send_file(&self, path: &Path) -> bool;
}

/// Time source (for testability).
pub trait TimeSource {
    fn now(&self) -> Timestamp;
}
