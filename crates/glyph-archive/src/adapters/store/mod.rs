//! Metadata store adapters.

mod sqlite;

pub use sqlite::SqliteMetadataStore;
