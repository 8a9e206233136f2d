use std::fs;
use std::path::Path;

use serde_json::json;

use super::ArchiveService;
use crate::domain::algorithms::CipherAlgorithm;
use crate::domain::digest;
use crate::domain::entities::{ArchiveEntry, EntrySelector, VerificationOutcome, VerificationResult};
use crate::domain::errors::ArchiveError;
use crate::ports::outbound::{
    AuditSink, ContentProcessor, MetadataStore, RemoteReplicator, TimeSource,
};

impl<S, A, P, R, T> ArchiveService<S, A, P, R, T>
where
    S: MetadataStore,
    A: AuditSink,
    P: ContentProcessor,
    R: RemoteReplicator,
    T: TimeSource,
{
    pub(crate) fn verify_entry(
        &mut self,
        selector: &EntrySelector,
    ) -> Result<VerificationResult, ArchiveError> {
        let entry = self
            .resolve(selector)?
            .ok_or_else(|| ArchiveError::EntryNotFound {
                selector: selector.to_string(),
            })?;

        if !entry.archive_path.is_file() {
            return Err(ArchiveError::ArchivedFileMissing {
                id: entry.id,
                path: entry.archive_path,
            });
        }

        let actual_digest = self.current_digest(&entry)?;
        let outcome = VerificationOutcome::from_match(actual_digest == entry.content_digest);
        let checked_at = self.time_source.now();

        self.store
            .update_verification(entry.id, outcome.is_match(), checked_at)?;
        self.audit.append(
            &checked_at,
            "verify",
            json!({
                "id": entry.id,
                "file": entry.archive_path.display().to_string(),
                "expected": entry.content_digest,
                "actual": actual_digest,
                "ok": outcome.is_match(),
            }),
        )?;

        if outcome.is_match() {
            tracing::info!(id = entry.id, path = %entry.archive_path.display(), "integrity verified");
        } else {
            tracing::warn!(
                id = entry.id,
                path = %entry.archive_path.display(),
                expected = %entry.content_digest,
                actual = %actual_digest,
                "integrity mismatch"
            );
        }

        Ok(VerificationResult {
            entry_id: entry.id,
            archive_path: entry.archive_path,
            expected_digest: entry.content_digest,
            actual_digest,
            outcome,
            checked_at,
        })
    }

    fn resolve(&self, selector: &EntrySelector) -> Result<Option<ArchiveEntry>, ArchiveError> {
        let found = match selector {
            EntrySelector::Id(id) => self.store.get_by_id(*id)?,
            EntrySelector::Digest(digest) => self.store.get_by_digest(&digest.to_ascii_lowercase())?,
            EntrySelector::Path(path) => self.resolve_path(path)?,
        };
        Ok(found)
    }

    /// Stored paths are canonical; try the path as given, then its
    /// canonical and absolute forms.
    fn resolve_path(&self, path: &Path) -> Result<Option<ArchiveEntry>, ArchiveError> {
        if let Some(entry) = self.store.get_by_path(path)? {
            return Ok(Some(entry));
        }
        let candidates = [path.canonicalize().ok(), std::path::absolute(path).ok()];
        for candidate in candidates.into_iter().flatten() {
            if let Some(entry) = self.store.get_by_path(&candidate)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Digest of the entry's plaintext as it is on disk now.
    ///
    /// Encrypted entries are opened first. If the sealed bytes fail
    /// authentication the content cannot be the archived plaintext, and the
    /// digest of the raw stored bytes is reported instead. Any other
    /// decryption failure is an error.
    fn current_digest(&self, entry: &ArchiveEntry) -> Result<String, ArchiveError> {
        let algorithm = self.config.security.hash_algo;

        let Some(cipher_name) = entry.encryption() else {
            return self.processor.digest_file(&entry.archive_path, algorithm);
        };

        let cipher: CipherAlgorithm = cipher_name.parse().map_err(|reason| ArchiveError::Config {
            reason: format!("entry {} records {reason}", entry.id),
        })?;
        let key = self.encryption_key()?;
        let sealed = fs::read(&entry.archive_path)
            .map_err(|e| ArchiveError::io(&entry.archive_path, e))?;

        match self.processor.decrypt(&sealed, &key, cipher) {
            Ok(plaintext) => Ok(digest::digest_bytes(algorithm, &plaintext)),
            Err(ArchiveError::AuthenticationFailed { reason }) => {
                tracing::warn!(id = entry.id, %reason, "archived ciphertext does not open");
                Ok(digest::digest_bytes(algorithm, &sealed))
            }
            Err(other) => Err(other),
        }
    }
}
