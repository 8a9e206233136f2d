//! # Adapters Module
//!
//! Production implementations of the outbound ports.
//!
//! ## Modules
//!
//! - `store`: SQLite metadata store
//! - `audit`: JSON-lines hash-chained audit log (fs2 append lock)
//! - `processor`: in-process and external-module content processors
//! - `replicator`: remote replication placeholders
//! - `infra`: system clock

pub mod audit;
pub mod infra;
pub mod processor;
pub mod replicator;
pub mod store;

pub use audit::FileAuditLog;
pub use infra::SystemTimeSource;
pub use processor::{LocalProcessor, ModuleProcessor, SecretKey};
pub use replicator::{replicator_for, DisabledReplicator, PendingReplicator};
pub use store::SqliteMetadataStore;
