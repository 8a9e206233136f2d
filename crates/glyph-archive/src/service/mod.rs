//! # Archive Service
//!
//! The main service implementing the archive API.
//!
//! ## Architecture
//!
//! This service:
//! 1. Implements `ArchiveApi` for ingestion, verification and reporting
//! 2. Couples every row insert with its audit record
//! 3. Uses dependency injection for store, audit log, processor, replicator
//!    and clock

mod ingest;
mod verify;
#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};

use crate::adapters::SecretKey;
use crate::domain::audit::ChainVerification;
use crate::domain::config::GlyphConfig;
use crate::domain::entities::{
    ArchiveEntry, EntrySelector, IngestOptions, ProvidedMetadata, VerificationResult,
};
use crate::domain::errors::ArchiveError;
use crate::ports::inbound::ArchiveApi;
use crate::ports::outbound::{
    AuditSink, ContentProcessor, MetadataStore, RemoteReplicator, TimeSource,
};

/// The Archive Service.
pub struct ArchiveService<S, A, P, R, T>
where
    S: MetadataStore,
    A: AuditSink,
    P: ContentProcessor,
    R: RemoteReplicator,
    T: TimeSource,
{
    pub(crate) store: S,
    pub(crate) audit: A,
    pub(crate) processor: P,
    pub(crate) replicator: R,
    pub(crate) time_source: T,
    pub(crate) config: GlyphConfig,
    /// Canonical form of `config.storage.archive_dir`.
    pub(crate) archive_dir: PathBuf,
}

/// Dependencies for ArchiveService
pub struct ArchiveDependencies<S, A, P, R, T> {
    pub store: S,
    pub audit: A,
    pub processor: P,
    pub replicator: R,
    pub time_source: T,
}

impl<S, A, P, R, T> ArchiveService<S, A, P, R, T>
where
    S: MetadataStore,
    A: AuditSink,
    P: ContentProcessor,
    R: RemoteReplicator,
    T: TimeSource,
{
    /// Create the service, creating archive storage if it does not exist.
    pub fn new(
        deps: ArchiveDependencies<S, A, P, R, T>,
        config: GlyphConfig,
    ) -> Result<Self, ArchiveError> {
        config.validate().map_err(|e| ArchiveError::Config {
            reason: e.to_string(),
        })?;

        let configured = &config.storage.archive_dir;
        fs::create_dir_all(configured).map_err(|e| ArchiveError::io(configured, e))?;
        let archive_dir = configured
            .canonicalize()
            .map_err(|e| ArchiveError::io(configured, e))?;

        tracing::info!(
            archive_dir = %archive_dir.display(),
            processor = deps.processor.name(),
            hash_algo = %config.security.hash_algo,
            encryption = config.security.encryption.enabled,
            "archive service ready"
        );

        Ok(Self {
            store: deps.store,
            audit: deps.audit,
            processor: deps.processor,
            replicator: deps.replicator,
            time_source: deps.time_source,
            config,
            archive_dir,
        })
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    pub fn config(&self) -> &GlyphConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn audit(&self) -> &A {
        &self.audit
    }

    /// Read the encryption key from its environment variable and check it
    /// decodes to a usable key.
    pub(crate) fn encryption_key(&self) -> Result<String, ArchiveError> {
        let var = &self.config.security.encryption.key_env_var;
        let key = std::env::var(var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ArchiveError::Config {
                reason: format!("encryption key variable {var} is not set"),
            })?;
        SecretKey::from_base64(&key).map_err(|e| ArchiveError::Config {
            reason: format!("encryption key in {var} is unusable: {e}"),
        })?;
        Ok(key)
    }
}

impl<S, A, P, R, T> ArchiveApi for ArchiveService<S, A, P, R, T>
where
    S: MetadataStore,
    A: AuditSink,
    P: ContentProcessor,
    R: RemoteReplicator,
    T: TimeSource,
{
    fn ingest(
        &mut self,
        source: &Path,
        metadata: ProvidedMetadata,
        options: IngestOptions,
    ) -> Result<ArchiveEntry, ArchiveError> {
        self.ingest_file(source, metadata, options)
    }

    fn verify(&mut self, selector: &EntrySelector) -> Result<VerificationResult, ArchiveError> {
        self.verify_entry(selector)
    }

    fn verify_recent(
        &mut self,
        limit: usize,
    ) -> Result<Vec<(i64, Result<VerificationResult, ArchiveError>)>, ArchiveError> {
        let ids: Vec<i64> = self.store.list_recent(limit)?.iter().map(|e| e.id).collect();
        Ok(ids
            .into_iter()
            .map(|id| (id, self.verify_entry(&EntrySelector::Id(id))))
            .collect())
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        Ok(self.store.list_recent(limit)?)
    }

    fn verify_audit_chain(&self) -> Result<ChainVerification, ArchiveError> {
        Ok(self.audit.verify_chain()?)
    }
}
