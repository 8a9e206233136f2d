//! SQLite-backed metadata store.
//!
//! # Schema
//!
//! One table, `archive_entries`, with columns `id`, `file_path`, `hash`,
//! `metadata` (JSON text), `added`, `verified` (0/1), `last_checked`.
//! `file_path` and `hash` carry `UNIQUE` constraints; those constraints are
//! the only cross-process coordination for deduplication.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use crate::domain::entities::{format_timestamp, ArchiveEntry, Metadata, NewEntry, Timestamp};
use crate::domain::errors::{DuplicateField, StoreError};
use crate::ports::outbound::MetadataStore;

const SELECT_COLUMNS: &str =
    "SELECT id, file_path, hash, metadata, added, verified, last_checked FROM archive_entries";

/// Durable metadata store backed by SQLite.
pub struct SqliteMetadataStore {
    conn: Connection,
    location: Option<PathBuf>,
}

impl SqliteMetadataStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init_schema(&conn)?;

        tracing::debug!(database = %path.display(), "metadata store opened");
        Ok(Self {
            conn,
            location: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database (tests and dry runs).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn,
            location: None,
        })
    }

    /// Database file, if not in memory.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Initializes the database schema.
    pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS archive_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_path TEXT NOT NULL UNIQUE,
                hash TEXT NOT NULL UNIQUE,
                metadata TEXT NOT NULL,
                added TEXT NOT NULL,
                verified INTEGER NOT NULL DEFAULT 1,
                last_checked TEXT
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_archive_entries_added ON archive_entries(added)",
            [],
        )?;
        Ok(())
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn add_entry(&mut self, entry: NewEntry) -> Result<ArchiveEntry, StoreError> {
        let id = insert_entry(&self.conn, &entry)?;
        tracing::info!(id, path = %entry.archive_path.display(), "metadata entry added");
        fetch_one(&self.conn, "id = ?1", id)?.ok_or(StoreError::NotFound { id })
    }

    fn add_entry_then<E, F>(&mut self, entry: NewEntry, then: F) -> Result<ArchiveEntry, E>
    where
        E: From<StoreError>,
        F: FnOnce(&ArchiveEntry) -> Result<(), E>,
    {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| E::from(StoreError::from(e)))?;

        let id = insert_entry(&tx, &entry)?;
        let stored = fetch_one(&tx, "id = ?1", id)?.ok_or(StoreError::NotFound { id })?;

        // Dropping `tx` on the error path rolls the insert back.
        then(&stored)?;

        // The hook's side effects cannot be undone if the commit fails; the
        // row rolls back and its id may be handed out again.
        if let Err(e) = tx.commit() {
            tracing::error!(
                id,
                path = %stored.archive_path.display(),
                error = %e,
                "commit failed after hook ran; hook side effects reference a row that does not exist"
            );
            return Err(E::from(StoreError::from(e)));
        }
        tracing::info!(id, path = %stored.archive_path.display(), "metadata entry committed");
        Ok(stored)
    }

    fn get_by_id(&self, id: i64) -> Result<Option<ArchiveEntry>, StoreError> {
        fetch_one(&self.conn, "id = ?1", id)
    }

    fn get_by_path(&self, path: &Path) -> Result<Option<ArchiveEntry>, StoreError> {
        fetch_one(&self.conn, "file_path = ?1", path_text(path)?)
    }

    fn get_by_digest(&self, digest: &str) -> Result<Option<ArchiveEntry>, StoreError> {
        fetch_one(&self.conn, "hash = ?1", digest)
    }

    fn update_verification(
        &mut self,
        id: i64,
        verified: bool,
        checked_at: Timestamp,
    ) -> Result<ArchiveEntry, StoreError> {
        let changed = self.conn.execute(
            "UPDATE archive_entries SET verified = ?1, last_checked = ?2 WHERE id = ?3",
            params![verified, format_timestamp(&checked_at), id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { id });
        }
        tracing::debug!(id, verified, "verification status updated");
        fetch_one(&self.conn, "id = ?1", id)?.ok_or(StoreError::NotFound { id })
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<ArchiveEntry>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_COLUMNS} ORDER BY added DESC, id DESC LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![limit], RawRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(RawRow::into_entry).collect()
    }

    fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM archive_entries", [], |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}

fn insert_entry(conn: &Connection, entry: &NewEntry) -> Result<i64, StoreError> {
    let file_path = path_text(&entry.archive_path)?;
    let metadata = serde_json::to_string(&entry.metadata).map_err(|e| StoreError::Corrupt {
        reason: format!("metadata not serializable: {e}"),
    })?;
    let added = format_timestamp(&entry.added_at);

    let result = conn.execute(
        "INSERT INTO archive_entries (file_path, hash, metadata, added, verified, last_checked)
         VALUES (?1, ?2, ?3, ?4, 1, ?4)",
        params![file_path, entry.content_digest, metadata, added],
    );

    match result {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(err, Some(message)))
            if err.code == ErrorCode::ConstraintViolation && message.contains("UNIQUE") =>
        {
            if message.contains("file_path") {
                Err(StoreError::Duplicate {
                    field: DuplicateField::ArchivePath,
                    value: file_path.to_string(),
                })
            } else {
                Err(StoreError::Duplicate {
                    field: DuplicateField::ContentDigest,
                    value: entry.content_digest.clone(),
                })
            }
        }
        Err(err) => Err(err.into()),
    }
}

fn fetch_one<P: rusqlite::ToSql>(
    conn: &Connection,
    condition: &str,
    value: P,
) -> Result<Option<ArchiveEntry>, StoreError> {
    let raw = conn
        .query_row(
            &format!("{SELECT_COLUMNS} WHERE {condition}"),
            params![value],
            RawRow::from_row,
        )
        .optional()?;
    raw.map(RawRow::into_entry).transpose()
}

fn path_text(path: &Path) -> Result<&str, StoreError> {
    path.to_str().ok_or_else(|| StoreError::UnsupportedPath {
        path: path.to_path_buf(),
    })
}

fn parse_timestamp(column: &str, raw: &str) -> Result<Timestamp, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            reason: format!("{column} {raw:?}: {e}"),
        })
}

/// Row as stored, before decoding JSON and timestamps.
struct RawRow {
    id: i64,
    file_path: String,
    hash: String,
    metadata: String,
    added: String,
    verified: bool,
    last_checked: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            file_path: row.get(1)?,
            hash: row.get(2)?,
            metadata: row.get(3)?,
            added: row.get(4)?,
            verified: row.get(5)?,
            last_checked: row.get(6)?,
        })
    }

    fn into_entry(self) -> Result<ArchiveEntry, StoreError> {
        let metadata: Metadata =
            serde_json::from_str(&self.metadata).map_err(|e| StoreError::Corrupt {
                reason: format!("metadata of entry {}: {e}", self.id),
            })?;
        let last_checked_at = self
            .last_checked
            .as_deref()
            .map(|raw| parse_timestamp("last_checked", raw))
            .transpose()?;

        Ok(ArchiveEntry {
            id: self.id,
            archive_path: PathBuf::from(self.file_path),
            content_digest: self.hash,
            metadata,
            added_at: parse_timestamp("added", &self.added)?,
            verified: self.verified,
            last_checked_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn new_entry(path: &str, digest: &str, secs: i64) -> NewEntry {
        let mut metadata = Metadata::new();
        metadata.insert("title".to_string(), json!("Test"));
        NewEntry {
            archive_path: PathBuf::from(path),
            content_digest: digest.to_string(),
            metadata,
            added_at: at(secs),
        }
    }

    #[test]
    fn test_add_and_get() {
        let mut store = SqliteMetadataStore::open_in_memory().unwrap();
        let entry = store.add_entry(new_entry("/fake/path", "abcdef", 0)).unwrap();

        assert!(entry.id > 0);
        assert!(entry.verified);
        assert_eq!(entry.last_checked_at, Some(entry.added_at));
        assert_eq!(entry.title(), Some("Test"));

        let by_path = store.get_by_path(Path::new("/fake/path")).unwrap().unwrap();
        assert_eq!(by_path, entry);
        assert_eq!(store.get_by_digest("abcdef").unwrap(), Some(entry.clone()));
        assert_eq!(store.get_by_id(entry.id).unwrap(), Some(entry));
        assert_eq!(store.get_by_digest("missing").unwrap(), None);
    }

    #[test]
    fn test_duplicate_digest_rejected() {
        let mut store = SqliteMetadataStore::open_in_memory().unwrap();
        store.add_entry(new_entry("/a", "same", 0)).unwrap();

        let err = store.add_entry(new_entry("/b", "same", 1)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Duplicate { field: DuplicateField::ContentDigest, .. }
        ));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let mut store = SqliteMetadataStore::open_in_memory().unwrap();
        store.add_entry(new_entry("/a", "one", 0)).unwrap();

        let err = store.add_entry(new_entry("/a", "two", 1)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Duplicate { field: DuplicateField::ArchivePath, .. }
        ));
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut store = SqliteMetadataStore::open_in_memory().unwrap();
        let first = store.add_entry(new_entry("/a", "one", 0)).unwrap();

        let rolled_back: Result<ArchiveEntry, StoreError> = store
            .add_entry_then(new_entry("/b", "two", 1), |_| {
                Err(StoreError::Corrupt {
                    reason: "hook failed".to_string(),
                })
            });
        assert!(rolled_back.is_err());

        let second = store.add_entry(new_entry("/c", "three", 2)).unwrap();
        assert!(second.id > first.id);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_add_entry_then_rolls_back_on_hook_error() {
        let mut store = SqliteMetadataStore::open_in_memory().unwrap();

        let result: Result<ArchiveEntry, StoreError> =
            store.add_entry_then(new_entry("/a", "one", 0), |entry| {
                assert!(entry.id > 0);
                Err(StoreError::Corrupt {
                    reason: "audit append failed".to_string(),
                })
            });

        assert!(result.is_err());
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.get_by_digest("one").unwrap(), None);
    }

    #[test]
    fn test_add_entry_then_commits_on_success() {
        let mut store = SqliteMetadataStore::open_in_memory().unwrap();
        let mut seen = None;

        let entry: ArchiveEntry = store
            .add_entry_then::<StoreError, _>(new_entry("/a", "one", 0), |entry| {
                seen = Some(entry.id);
                Ok(())
            })
            .unwrap();

        assert_eq!(seen, Some(entry.id));
        assert_eq!(store.get_by_id(entry.id).unwrap(), Some(entry));
    }

    #[test]
    fn test_add_entry_then_commit_failure_after_hook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.db");
        let mut store = SqliteMetadataStore::open(&path).unwrap();
        store.conn.busy_timeout(Duration::from_millis(50)).unwrap();

        // A reader holding a shared lock keeps the writer from committing.
        let mut reader = None;
        let mut hook_ran = false;
        let result = store.add_entry_then::<StoreError, _>(new_entry("/a", "one", 0), |_| {
            let conn = Connection::open(&path)?;
            conn.execute_batch("BEGIN")?;
            conn.query_row("SELECT count(*) FROM archive_entries", [], |r| r.get::<_, i64>(0))?;
            reader = Some(conn);
            hook_ran = true;
            Ok(())
        });

        assert!(hook_ran);
        assert!(matches!(result, Err(StoreError::Database(_))), "{result:?}");
        drop(reader);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_update_verification() {
        let mut store = SqliteMetadataStore::open_in_memory().unwrap();
        let entry = store.add_entry(new_entry("/a", "one", 0)).unwrap();

        let updated = store.update_verification(entry.id, false, at(60)).unwrap();
        assert!(!updated.verified);
        assert_eq!(updated.last_checked_at, Some(at(60)));
        assert_eq!(updated.added_at, entry.added_at);

        let err = store.update_verification(999, true, at(61)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { id: 999 }));
    }

    #[test]
    fn test_list_recent_orders_newest_first_with_id_tiebreak() {
        let mut store = SqliteMetadataStore::open_in_memory().unwrap();
        let a = store.add_entry(new_entry("/a", "a", 10)).unwrap();
        let b = store.add_entry(new_entry("/b", "b", 30)).unwrap();
        let c = store.add_entry(new_entry("/c", "c", 30)).unwrap();
        let d = store.add_entry(new_entry("/d", "d", 20)).unwrap();

        let ids: Vec<i64> = store.list_recent(10).unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![c.id, b.id, d.id, a.id]);

        assert_eq!(store.list_recent(2).unwrap().len(), 2);
        assert!(store.list_recent(0).unwrap().is_empty());
    }

    #[test]
    fn test_reopen_file_database_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("metadata.db");

        {
            let mut store = SqliteMetadataStore::open(&db).unwrap();
            store.add_entry(new_entry("/a", "one", 0)).unwrap();
            assert_eq!(store.location(), Some(db.as_path()));
        }

        let store = SqliteMetadataStore::open(&db).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.get_by_digest("one").unwrap().is_some());
    }
}
