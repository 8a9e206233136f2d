//! # Domain Entities
//!
//! Archive entries, ingestion inputs and verification results.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wall-clock timestamp (UTC).
pub type Timestamp = DateTime<Utc>;

/// Open metadata mapping stored alongside an entry.
pub type Metadata = Map<String, Value>;

/// Metadata key recording the cipher applied to the stored bytes.
pub const ENCRYPTION_METADATA_KEY: &str = "encryption";

/// Render a timestamp the way the store and audit log persist it.
///
/// Fixed precision keeps lexicographic order equal to chronological order.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// One archived file, as recorded in the metadata store.
///
/// Instances are snapshots; mutation goes through
/// `MetadataStore::update_verification`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub id: i64,
    pub archive_path: PathBuf,
    pub content_digest: String,
    pub metadata: Metadata,
    pub added_at: Timestamp,
    pub verified: bool,
    pub last_checked_at: Option<Timestamp>,
}

impl ArchiveEntry {
    /// Title from metadata, if any.
    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(Value::as_str)
    }

    /// Cipher name when the archived bytes are encrypted.
    pub fn encryption(&self) -> Option<&str> {
        self.metadata
            .get(ENCRYPTION_METADATA_KEY)
            .and_then(Value::as_str)
    }
}

/// Row to insert. The store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub archive_path: PathBuf,
    pub content_digest: String,
    pub metadata: Metadata,
    pub added_at: Timestamp,
}

/// Caller-supplied descriptive metadata for an ingestion.
#[derive(Debug, Clone, Default)]
pub struct ProvidedMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    /// Additional keys copied verbatim; they never override the computed
    /// `original_filename` and `size_bytes`.
    pub extra: Metadata,
}

impl ProvidedMetadata {
    /// Parse a comma-separated tag list, dropping empty items.
    pub fn parse_tags(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Per-call ingestion switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    /// Re-hash source and copy after copying.
    pub verify_copy: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self { verify_copy: true }
    }
}

/// Identifies an entry for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySelector {
    Id(i64),
    Digest(String),
    Path(PathBuf),
}

impl EntrySelector {
    /// Pick one selector from optional inputs: id, then digest, then path.
    pub fn first_of(
        id: Option<i64>,
        digest: Option<String>,
        path: Option<PathBuf>,
    ) -> Option<Self> {
        id.map(EntrySelector::Id)
            .or_else(|| digest.map(EntrySelector::Digest))
            .or_else(|| path.map(EntrySelector::Path))
    }
}

impl fmt::Display for EntrySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntrySelector::Id(id) => write!(f, "id={id}"),
            EntrySelector::Digest(d) => write!(f, "hash={d}"),
            EntrySelector::Path(p) => write!(f, "path={}", p.display()),
        }
    }
}

/// Outcome of comparing a stored digest with a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationOutcome {
    Match,
    Mismatch,
}

impl VerificationOutcome {
    pub fn from_match(ok: bool) -> Self {
        if ok {
            VerificationOutcome::Match
        } else {
            VerificationOutcome::Mismatch
        }
    }

    pub fn is_match(self) -> bool {
        self == VerificationOutcome::Match
    }
}

/// Result of one verification run.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationResult {
    pub entry_id: i64,
    pub archive_path: PathBuf,
    pub expected_digest: String,
    pub actual_digest: String,
    pub outcome: VerificationOutcome,
    pub checked_at: Timestamp,
}

impl VerificationResult {
    pub fn is_match(&self) -> bool {
        self.outcome.is_match()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_selector_priority() {
        let sel = EntrySelector::first_of(
            Some(4),
            Some("ab".to_string()),
            Some(PathBuf::from("/a")),
        );
        assert_eq!(sel, Some(EntrySelector::Id(4)));

        let sel = EntrySelector::first_of(None, Some("ab".to_string()), Some(PathBuf::from("/a")));
        assert_eq!(sel, Some(EntrySelector::Digest("ab".to_string())));

        assert_eq!(EntrySelector::first_of(None, None, None), None);
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(
            ProvidedMetadata::parse_tags("law, tax,,2024 "),
            vec!["law", "tax", "2024"]
        );
        assert!(ProvidedMetadata::parse_tags("").is_empty());
    }

    #[test]
    fn test_timestamp_format_sorts_chronologically() {
        let a = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        assert_eq!(format_timestamp(&a), "2024-01-02T03:04:05.000000Z");
        assert!(format_timestamp(&a) < format_timestamp(&b));
    }
}
