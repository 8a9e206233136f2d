//! # Glyph Archive Core
//!
//! Long-term preservation of files: content-addressed deduplication,
//! integrity re-verification, and a tamper-evident audit trail.
//!
//! ## Architecture
//!
//! ```text
//!             ┌──────────── ArchiveService ────────────┐
//! add ──────→ │ digest → dedup → copy → (encrypt) →    │──→ archive dir
//!             │ insert row ⇄ append audit record       │──→ SQLite / JSONL
//! verify ───→ │ resolve → re-digest → update → audit   │
//!             └──────────────┬─────────────────────────┘
//!                            │ ContentProcessor
//!               LocalProcessor │ ModuleProcessor ──IPC──→ external module
//! ```
//!
//! ## Invariants
//!
//! | Invariant | Enforced by |
//! |-----------|-------------|
//! | One entry per content digest | `UNIQUE(hash)` + pre-check |
//! | One entry per archive path | `UNIQUE(file_path)` |
//! | Row exists iff its audit record exists | `MetadataStore::add_entry_then` |
//! | Record `n` links to record `n-1` | `FileAuditLog` append lock |
//! | IPC requests ≤ 10 MiB | `ModuleChannel::call` (checked before spawn) |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Pure domain logic (entities, errors, audit chain, config)
//! - `ports/` - Port traits (inbound API, outbound SPI)
//! - `service/` - Application service implementing the API
//! - `adapters/` - SQLite store, file audit log, processors, replicators
//! - `ipc/` - External module wire format and subprocess channel
//!
//! ## Usage
//!
//! ```ignore
//! use glyph_archive::*;
//!
//! let config = GlyphConfig::default();
//! let deps = ArchiveDependencies {
//!     store: SqliteMetadataStore::open(&config.metadata.database)?,
//!     audit: FileAuditLog::open(&config.audit.file)?,
//!     processor: LocalProcessor,
//!     replicator: DisabledReplicator,
//!     time_source: SystemTimeSource,
//! };
//! let mut service = ArchiveService::new(deps, config)?;
//!
//! let entry = service.ingest(path, ProvidedMetadata::default(), IngestOptions::default())?;
//! let result = service.verify(&EntrySelector::Id(entry.id))?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ipc;
pub mod ports;
pub mod service;

// Re-export key types for convenience
pub use adapters::{
    replicator_for, DisabledReplicator, FileAuditLog, LocalProcessor, ModuleProcessor,
    PendingReplicator, SecretKey, SqliteMetadataStore, SystemTimeSource,
};
pub use domain::algorithms::{CipherAlgorithm, HashAlgorithm};
pub use domain::audit::{AuditRecord, ChainBreak, ChainVerification, GENESIS};
pub use domain::config::{ConfigError, GlyphConfig};
pub use domain::entities::{
    ArchiveEntry, EntrySelector, IngestOptions, Metadata, NewEntry, ProvidedMetadata, Timestamp,
    VerificationOutcome, VerificationResult,
};
pub use domain::errors::{ArchiveError, AuditError, DuplicateField, IpcError, StoreError};
pub use ports::inbound::ArchiveApi;
pub use ports::outbound::{
    AuditSink, ContentProcessor, MetadataStore, RemoteReplicator, TimeSource,
};
pub use service::{ArchiveDependencies, ArchiveService};

// Re-export IPC types
pub use ipc::{
    ModuleChannel, ModuleReply, ModuleRequest, AUTH_FAILURE_PREFIX, MAX_IPC_PAYLOAD_BYTES,
};
