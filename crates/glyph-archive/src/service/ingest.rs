use std::fs;
use std::io;
use std::path::Path;

use serde_json::{json, Value};

use super::ArchiveService;
use crate::domain::digest;
use crate::domain::entities::{
    ArchiveEntry, IngestOptions, Metadata, NewEntry, ProvidedMetadata, ENCRYPTION_METADATA_KEY,
};
use crate::domain::errors::{ArchiveError, DuplicateField};
use crate::domain::placement::{allocate_destination, with_suffix, ENCRYPTED_SUFFIX};
use crate::ports::outbound::{
    AuditSink, ContentProcessor, MetadataStore, RemoteReplicator, TimeSource,
};

/// Author recorded when none is provided.
pub(crate) const UNKNOWN_AUTHOR: &str = "Unknown";

impl<S, A, P, R, T> ArchiveService<S, A, P, R, T>
where
    S: MetadataStore,
    A: AuditSink,
    P: ContentProcessor,
    R: RemoteReplicator,
    T: TimeSource,
{
    pub(crate) fn ingest_file(
        &mut self,
        source: &Path,
        provided: ProvidedMetadata,
        options: IngestOptions,
    ) -> Result<ArchiveEntry, ArchiveError> {
        let source_meta = fs::metadata(source)
            .ok()
            .filter(|m| m.is_file())
            .ok_or_else(|| ArchiveError::SourceNotFound {
                path: source.to_path_buf(),
            })?;

        let algorithm = self.config.security.hash_algo;
        let content_digest = self.processor.digest_file(source, algorithm)?;
        tracing::debug!(
            source = %source.display(),
            digest = %content_digest,
            processor = self.processor.name(),
            "content digest computed"
        );

        if let Some(existing) = self.store.get_by_digest(&content_digest)? {
            tracing::warn!(
                source = %source.display(),
                existing_id = existing.id,
                "duplicate content; not archived"
            );
            return Err(ArchiveError::Duplicate {
                field: DuplicateField::ContentDigest,
                value: content_digest,
                existing: Some(existing.archive_path.display().to_string()),
            });
        }

        let encryption = if self.config.security.encryption.enabled {
            Some((
                self.encryption_key()?,
                self.config.security.encryption.algorithm,
            ))
        } else {
            None
        };

        let sibling = encryption.as_ref().map(|_| ENCRYPTED_SUFFIX);
        let destination =
            allocate_destination(&self.archive_dir, source, sibling).ok_or_else(|| {
                ArchiveError::io(
                    &self.archive_dir,
                    io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("no free archive name for {}", source.display()),
                    ),
                )
            })?;

        fs::copy(source, &destination).map_err(|e| ArchiveError::io(&destination, e))?;

        if options.verify_copy {
            let source_digest =
                digest::digest_file(algorithm, source).map_err(|e| ArchiveError::io(source, e))?;
            let destination_digest = digest::digest_file(algorithm, &destination)
                .map_err(|e| ArchiveError::io(&destination, e))?;
            if source_digest != destination_digest {
                tracing::error!(
                    source = %source.display(),
                    destination = %destination.display(),
                    "copy does not match source; ingestion aborted"
                );
                return Err(ArchiveError::IntegrityMismatch {
                    origin: source.to_path_buf(),
                    destination,
                    source_digest,
                    destination_digest,
                });
            }
        }

        let mut metadata = build_metadata(source, &provided, source_meta.len());

        let archive_path = match encryption {
            Some((key, cipher)) => {
                let plaintext =
                    fs::read(&destination).map_err(|e| ArchiveError::io(&destination, e))?;
                let sealed = self.processor.encrypt(&plaintext, &key, cipher).map_err(|e| {
                    tracing::error!(
                        destination = %destination.display(),
                        error = %e,
                        "encryption failed; ingestion aborted"
                    );
                    e
                })?;

                let encrypted = with_suffix(&destination, ENCRYPTED_SUFFIX);
                fs::write(&encrypted, sealed).map_err(|e| ArchiveError::io(&encrypted, e))?;
                fs::remove_file(&destination).map_err(|e| ArchiveError::io(&destination, e))?;
                metadata.insert(
                    ENCRYPTION_METADATA_KEY.to_string(),
                    Value::String(cipher.wire_name().to_string()),
                );
                encrypted
            }
            None => destination,
        };

        let replicated = self.replicator.send_file(&archive_path);
        tracing::debug!(path = %archive_path.display(), replicated, "handed to replicator");

        let added_at = self.time_source.now();
        let new_entry = NewEntry {
            archive_path,
            content_digest,
            metadata,
            added_at,
        };

        let audit = &self.audit;
        let entry = self
            .store
            .add_entry_then(new_entry, |entry| -> Result<(), ArchiveError> {
                audit.append(
                    &added_at,
                    "file_added",
                    json!({
                        "file": entry.archive_path.display().to_string(),
                        "hash": entry.content_digest,
                        "id": entry.id,
                    }),
                )?;
                Ok(())
            })
            .map_err(|e| {
                tracing::error!(source = %source.display(), error = %e, "ingestion aborted");
                e
            })?;

        tracing::info!(
            id = entry.id,
            source = %source.display(),
            path = %entry.archive_path.display(),
            digest = %entry.content_digest,
            "file archived"
        );
        Ok(entry)
    }
}

/// Metadata recorded for a new entry.
///
/// `title`, `author` and `tags` fall back to `extra`, then to defaults
/// (file stem, `"Unknown"`, `[]`). `original_filename` and `size_bytes`
/// are always computed.
pub(crate) fn build_metadata(source: &Path, provided: &ProvidedMetadata, size: u64) -> Metadata {
    let mut metadata = provided.extra.clone();

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    match &provided.title {
        Some(title) => {
            metadata.insert("title".to_string(), json!(title));
        }
        None => {
            metadata.entry("title").or_insert_with(|| json!(stem));
        }
    }
    match &provided.author {
        Some(author) => {
            metadata.insert("author".to_string(), json!(author));
        }
        None => {
            metadata.entry("author").or_insert_with(|| json!(UNKNOWN_AUTHOR));
        }
    }
    if provided.tags.is_empty() {
        metadata.entry("tags").or_insert_with(|| json!([]));
    } else {
        metadata.insert("tags".to_string(), json!(provided.tags));
    }

    let original_filename = source
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    metadata.insert("original_filename".to_string(), json!(original_filename));
    metadata.insert("size_bytes".to_string(), json!(size));
    metadata
}
