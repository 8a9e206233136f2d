//! # Inbound Ports (Driving Ports)
//!
//! The primary API of the archive core.

use std::path::Path;

use crate::domain::audit::ChainVerification;
use crate::domain::entities::{
    ArchiveEntry, EntrySelector, IngestOptions, ProvidedMetadata, VerificationResult,
};
use crate::domain::errors::ArchiveError;

/// Operations offered to the operator-facing surface.
///
/// Implementations keep the metadata store and audit log consistent: an
/// operation that fails leaves neither a row nor an audit record behind.
pub trait ArchiveApi {
    /// Archive a file.
    ///
    /// ## Errors
    ///
    /// - `SourceNotFound`: path missing or not a regular file
    /// - `Duplicate`: content digest already archived (pre-check or insert)
    /// - `IntegrityMismatch`: post-copy digests differ (copy left in place)
    /// - `Ipc` / `Crypto`: digest or encryption backend failed
    /// - `Config`: encryption enabled but no key available
    fn ingest(
        &mut self,
        source: &Path,
        metadata: ProvidedMetadata,
        options: IngestOptions,
    ) -> Result<ArchiveEntry, ArchiveError>;

    /// Re-hash an archived file and record the outcome.
    ///
    /// A mismatch is returned as a result, not an error.
    ///
    /// ## Errors
    ///
    /// - `EntryNotFound`: selector matches nothing
    /// - `ArchivedFileMissing`: entry exists, file does not
    fn verify(&mut self, selector: &EntrySelector) -> Result<VerificationResult, ArchiveError>;

    /// Verify the newest `limit` entries, one result per entry.
    fn verify_recent(
        &mut self,
        limit: usize,
    ) -> Result<Vec<(i64, Result<VerificationResult, ArchiveError>)>, ArchiveError>;

    /// Newest entries first.
    fn list_recent(&self, limit: usize) -> Result<Vec<ArchiveEntry>, ArchiveError>;

    /// Replay the audit chain.
    fn verify_audit_chain(&self) -> Result<ChainVerification, ArchiveError>;
}
