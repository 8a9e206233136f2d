//! # Archive Service Tests

use super::*;
use crate::adapters::{DisabledReplicator, FileAuditLog, LocalProcessor, SecretKey, SqliteMetadataStore};
use crate::domain::algorithms::CipherAlgorithm;
use crate::domain::entities::{format_timestamp, Timestamp, VerificationOutcome};
use crate::domain::errors::{AuditError, DuplicateField};
use crate::ports::outbound::MetadataStore;
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::cell::Cell;
use tempfile::TempDir;

const HELLO: &[u8] = b"Hello, Glyph!";
const HELLO_SHA256: &str = "2f0531f0c22bfabeeea1c7b66376c2543ad7ffd5a5e482756b7199d67e0d9f09";

/// Clock that advances one second per reading.
struct SteppingClock {
    ticks: Cell<i64>,
}

impl SteppingClock {
    fn new() -> Self {
        Self { ticks: Cell::new(0) }
    }
}

impl TimeSource for SteppingClock {
    fn now(&self) -> Timestamp {
        let tick = self.ticks.get();
        self.ticks.set(tick + 1);
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(tick)
    }
}

/// Audit sink whose appends always fail.
struct FailingAudit;

impl AuditSink for FailingAudit {
    fn append(&self, _at: &Timestamp, _event: &str, _payload: Value) -> Result<String, AuditError> {
        Err(AuditError::Io {
            path: PathBuf::from("audit.jsonl"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        })
    }

    fn verify_chain(&self) -> Result<ChainVerification, AuditError> {
        Ok(ChainVerification::default())
    }
}

type TestService<A> =
    ArchiveService<SqliteMetadataStore, A, LocalProcessor, DisabledReplicator, SteppingClock>;

fn test_config(root: &Path) -> GlyphConfig {
    let mut config = GlyphConfig::default();
    config.storage.archive_dir = root.join("archive");
    config.metadata.database = root.join("metadata.db");
    config.audit.file = root.join("logs").join("audit.jsonl");
    config
}

fn make_service_with<A: AuditSink>(config: GlyphConfig, audit: A) -> TestService<A> {
    let deps = ArchiveDependencies {
        store: SqliteMetadataStore::open_in_memory().unwrap(),
        audit,
        processor: LocalProcessor,
        replicator: DisabledReplicator,
        time_source: SteppingClock::new(),
    };
    ArchiveService::new(deps, config).unwrap()
}

fn make_test_service(config: GlyphConfig) -> TestService<FileAuditLog> {
    let audit = FileAuditLog::open(&config.audit.file).unwrap();
    make_service_with(config, audit)
}

fn write_source(dir: &TempDir, relative: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join("incoming").join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, bytes).unwrap();
    path
}

fn archived_files(service: &TestService<impl AuditSink>) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(service.archive_dir())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}

fn enable_encryption(config: &mut GlyphConfig, var: &str, algorithm: CipherAlgorithm) {
    std::env::set_var(var, SecretKey::generate().to_base64());
    config.security.encryption.enabled = true;
    config.security.encryption.algorithm = algorithm;
    config.security.encryption.key_env_var = var.to_string();
}

#[test]
fn test_ingest_hello_glyph() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = make_test_service(test_config(dir.path()));
    let source = write_source(&dir, "hello.txt", HELLO);

    let entry = service
        .ingest(&source, ProvidedMetadata::default(), IngestOptions::default())
        .unwrap();

    assert!(entry.verified);
    assert_eq!(entry.content_digest, HELLO_SHA256);
    assert_eq!(entry.archive_path, service.archive_dir().join("hello.txt"));
    assert_eq!(fs::read(&entry.archive_path).unwrap(), HELLO);
    assert_eq!(entry.metadata["title"], "hello");
    assert_eq!(entry.metadata["author"], "Unknown");
    assert_eq!(entry.metadata["size_bytes"], 13);
    assert_eq!(entry.metadata["original_filename"], "hello.txt");
    assert!(entry.encryption().is_none());
    assert_eq!(entry.last_checked_at, Some(entry.added_at));

    // Source is copied, not moved.
    assert!(source.exists());

    let records = service.audit().records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].event, "file_added");
    assert_eq!(records[0].payload["id"], entry.id);
    assert_eq!(records[0].payload["hash"], HELLO_SHA256);
}

#[test]
fn test_duplicate_content_is_rejected_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = make_test_service(test_config(dir.path()));
    let first = write_source(&dir, "hello.txt", HELLO);
    let second = write_source(&dir, "copy/other-name.txt", HELLO);

    let entry = service
        .ingest(&first, ProvidedMetadata::default(), IngestOptions::default())
        .unwrap();
    let err = service
        .ingest(&second, ProvidedMetadata::default(), IngestOptions::default())
        .unwrap_err();

    match err {
        ArchiveError::Duplicate {
            field,
            value,
            existing,
        } => {
            assert_eq!(field, DuplicateField::ContentDigest);
            assert_eq!(value, HELLO_SHA256);
            assert_eq!(existing, Some(entry.archive_path.display().to_string()));
        }
        other => panic!("expected Duplicate, got {other:?}"),
    }

    assert_eq!(service.store().count().unwrap(), 1);
    assert_eq!(service.audit().records().unwrap().len(), 1);
    assert_eq!(archived_files(&service), vec![entry.archive_path]);
}

#[test]
fn test_name_collision_gets_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = make_test_service(test_config(dir.path()));
    let a = write_source(&dir, "a/report.txt", b"first");
    let b = write_source(&dir, "b/report.txt", b"second");

    let first = service
        .ingest(&a, ProvidedMetadata::default(), IngestOptions::default())
        .unwrap();
    let second = service
        .ingest(&b, ProvidedMetadata::default(), IngestOptions::default())
        .unwrap();

    assert_eq!(first.archive_path, service.archive_dir().join("report.txt"));
    assert_eq!(second.archive_path, service.archive_dir().join("report_1.txt"));
    assert_eq!(fs::read(&second.archive_path).unwrap(), b"second");
}

#[test]
fn test_missing_or_non_regular_source() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = make_test_service(test_config(dir.path()));

    let missing = dir.path().join("nope.txt");
    let err = service
        .ingest(&missing, ProvidedMetadata::default(), IngestOptions::default())
        .unwrap_err();
    assert!(matches!(err, ArchiveError::SourceNotFound { .. }));

    let err = service
        .ingest(dir.path(), ProvidedMetadata::default(), IngestOptions::default())
        .unwrap_err();
    assert!(matches!(err, ArchiveError::SourceNotFound { .. }));

    assert_eq!(service.store().count().unwrap(), 0);
}

#[test]
fn test_failed_audit_append_leaves_no_row() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = make_service_with(test_config(dir.path()), FailingAudit);
    let source = write_source(&dir, "hello.txt", HELLO);

    let err = service
        .ingest(&source, ProvidedMetadata::default(), IngestOptions::default())
        .unwrap_err();

    assert!(matches!(err, ArchiveError::Audit(AuditError::Io { .. })));
    assert_eq!(service.store().count().unwrap(), 0);
    assert!(service.store().get_by_digest(HELLO_SHA256).unwrap().is_none());
}

#[test]
fn test_provided_metadata_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = make_test_service(test_config(dir.path()));
    let source = write_source(&dir, "paper.pdf", b"%PDF-1.7");

    let provided = ProvidedMetadata {
        title: Some("On Archives".to_string()),
        author: Some("A. Writer".to_string()),
        tags: ProvidedMetadata::parse_tags("history, , archives"),
        ..Default::default()
    };
    let entry = service
        .ingest(&source, provided, IngestOptions { verify_copy: false })
        .unwrap();

    assert_eq!(entry.title(), Some("On Archives"));
    assert_eq!(entry.metadata["author"], "A. Writer");
    assert_eq!(entry.metadata["tags"], json!(["history", "archives"]));
}

#[test]
fn test_verify_untouched_file_matches() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = make_test_service(test_config(dir.path()));
    let source = write_source(&dir, "hello.txt", HELLO);
    let entry = service
        .ingest(&source, ProvidedMetadata::default(), IngestOptions::default())
        .unwrap();

    for selector in [
        EntrySelector::Id(entry.id),
        EntrySelector::Digest(HELLO_SHA256.to_uppercase()),
        EntrySelector::Path(entry.archive_path.clone()),
    ] {
        let result = service.verify(&selector).unwrap();
        assert_eq!(result.outcome, VerificationOutcome::Match);
        assert_eq!(result.entry_id, entry.id);
        assert_eq!(result.actual_digest, HELLO_SHA256);
    }
}

#[test]
fn test_verify_twice_updates_last_checked_each_time() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = make_test_service(test_config(dir.path()));
    let source = write_source(&dir, "hello.txt", HELLO);
    let entry = service
        .ingest(&source, ProvidedMetadata::default(), IngestOptions::default())
        .unwrap();

    let first = service.verify(&EntrySelector::Id(entry.id)).unwrap();
    let after_first = service.store().get_by_id(entry.id).unwrap().unwrap();
    let second = service.verify(&EntrySelector::Id(entry.id)).unwrap();
    let after_second = service.store().get_by_id(entry.id).unwrap().unwrap();

    assert_eq!(first.outcome, second.outcome);
    assert!(first.checked_at > entry.added_at);
    assert!(second.checked_at > first.checked_at);
    assert_eq!(after_first.last_checked_at, Some(first.checked_at));
    assert_eq!(after_second.last_checked_at, Some(second.checked_at));
    assert!(after_second.verified);
    // Audit records are stamped by the same clock as the store.
    let stamps: Vec<String> = service
        .audit()
        .records()
        .unwrap()
        .into_iter()
        .map(|r| r.timestamp)
        .collect();
    assert_eq!(
        stamps,
        vec![
            format_timestamp(&entry.added_at),
            format_timestamp(&first.checked_at),
            format_timestamp(&second.checked_at),
        ]
    );
}

#[test]
fn test_truncated_copy_is_a_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = make_test_service(test_config(dir.path()));
    let source = write_source(&dir, "hello.txt", HELLO);
    let entry = service
        .ingest(&source, ProvidedMetadata::default(), IngestOptions::default())
        .unwrap();

    fs::write(&entry.archive_path, b"").unwrap();

    let result = service
        .verify(&EntrySelector::Path(entry.archive_path.clone()))
        .unwrap();
    assert_eq!(result.outcome, VerificationOutcome::Mismatch);
    assert_eq!(result.expected_digest, HELLO_SHA256);
    assert_ne!(result.actual_digest, HELLO_SHA256);

    let stored = service.store().get_by_id(entry.id).unwrap().unwrap();
    assert!(!stored.verified);

    let records = service.audit().records().unwrap();
    let last = records.last().unwrap();
    assert_eq!(last.event, "verify");
    assert_eq!(last.payload["ok"], false);
    assert_eq!(last.payload["expected"], HELLO_SHA256);
}

#[test]
fn test_verify_resolution_failures() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = make_test_service(test_config(dir.path()));
    let source = write_source(&dir, "hello.txt", HELLO);
    let entry = service
        .ingest(&source, ProvidedMetadata::default(), IngestOptions::default())
        .unwrap();

    let err = service.verify(&EntrySelector::Id(entry.id + 100)).unwrap_err();
    assert!(matches!(err, ArchiveError::EntryNotFound { .. }));

    let err = service
        .verify(&EntrySelector::Path(dir.path().join("unknown.txt")))
        .unwrap_err();
    assert!(matches!(err, ArchiveError::EntryNotFound { .. }));

    fs::remove_file(&entry.archive_path).unwrap();
    let err = service.verify(&EntrySelector::Id(entry.id)).unwrap_err();
    assert!(matches!(err, ArchiveError::ArchivedFileMissing { id, .. } if id == entry.id));

    // Neither failure touched the audit log.
    assert_eq!(service.audit().records().unwrap().len(), 1);
}

#[test]
fn test_encrypted_ingest_and_verify() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    enable_encryption(&mut config, "GLYPH_TEST_KEY_SERVICE_ROUND_TRIP", CipherAlgorithm::Aes256Gcm);
    let mut service = make_test_service(config);
    let source = write_source(&dir, "hello.txt", HELLO);

    let entry = service
        .ingest(&source, ProvidedMetadata::default(), IngestOptions::default())
        .unwrap();

    assert_eq!(entry.archive_path, service.archive_dir().join("hello.txt.enc"));
    assert_eq!(entry.encryption(), Some("aes-256-gcm"));
    assert_eq!(entry.content_digest, HELLO_SHA256);
    assert_eq!(archived_files(&service), vec![entry.archive_path.clone()]);
    assert_ne!(fs::read(&entry.archive_path).unwrap(), HELLO);

    let result = service.verify(&EntrySelector::Id(entry.id)).unwrap();
    assert_eq!(result.outcome, VerificationOutcome::Match);
}

#[test]
fn test_tampered_ciphertext_is_a_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    enable_encryption(
        &mut config,
        "GLYPH_TEST_KEY_SERVICE_TAMPER",
        CipherAlgorithm::XChaCha20Poly1305,
    );
    let mut service = make_test_service(config);
    let source = write_source(&dir, "hello.txt", HELLO);
    let entry = service
        .ingest(&source, ProvidedMetadata::default(), IngestOptions::default())
        .unwrap();

    let mut sealed = fs::read(&entry.archive_path).unwrap();
    let last = sealed.len() - 1;
    sealed[last] ^= 0xff;
    fs::write(&entry.archive_path, sealed).unwrap();

    let result = service.verify(&EntrySelector::Id(entry.id)).unwrap();
    assert_eq!(result.outcome, VerificationOutcome::Mismatch);
    assert!(!service.store().get_by_id(entry.id).unwrap().unwrap().verified);
}

#[test]
fn test_missing_key_fails_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.security.encryption.enabled = true;
    config.security.encryption.key_env_var = "GLYPH_TEST_KEY_SERVICE_NEVER_SET".to_string();
    let mut service = make_test_service(config);
    let source = write_source(&dir, "hello.txt", HELLO);

    let err = service
        .ingest(&source, ProvidedMetadata::default(), IngestOptions::default())
        .unwrap_err();

    assert!(matches!(err, ArchiveError::Config { .. }));
    assert!(archived_files(&service).is_empty());
    assert_eq!(service.store().count().unwrap(), 0);
    assert!(service.audit().records().unwrap().is_empty());
}

#[test]
fn test_verify_recent_reports_each_entry() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = make_test_service(test_config(dir.path()));

    let mut entries = Vec::new();
    for (name, body) in [("a.txt", "alpha"), ("b.txt", "beta"), ("c.txt", "gamma")] {
        let source = write_source(&dir, name, body.as_bytes());
        entries.push(
            service
                .ingest(&source, ProvidedMetadata::default(), IngestOptions::default())
                .unwrap(),
        );
    }
    fs::write(&entries[1].archive_path, b"rot").unwrap();
    fs::remove_file(&entries[0].archive_path).unwrap();

    let results = service.verify_recent(10).unwrap();
    let ids: Vec<i64> = results.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![entries[2].id, entries[1].id, entries[0].id]);

    assert!(results[0].1.as_ref().unwrap().is_match());
    assert!(!results[1].1.as_ref().unwrap().is_match());
    assert!(matches!(results[2].1, Err(ArchiveError::ArchivedFileMissing { .. })));

    assert_eq!(service.verify_recent(1).unwrap().len(), 1);
}

#[test]
fn test_list_recent_and_audit_chain() {
    let dir = tempfile::tempdir().unwrap();
    let mut service = make_test_service(test_config(dir.path()));
    let a = write_source(&dir, "a.txt", b"alpha");
    let b = write_source(&dir, "b.txt", b"beta");
    let first = service
        .ingest(&a, ProvidedMetadata::default(), IngestOptions::default())
        .unwrap();
    let second = service
        .ingest(&b, ProvidedMetadata::default(), IngestOptions::default())
        .unwrap();
    service.verify(&EntrySelector::Id(first.id)).unwrap();

    let listed: Vec<i64> = service.list_recent(20).unwrap().iter().map(|e| e.id).collect();
    assert_eq!(listed, vec![second.id, first.id]);

    let chain = service.verify_audit_chain().unwrap();
    assert!(chain.is_intact());
    assert_eq!(chain.verified_records, 3);
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.modules.crypto.timeout_secs = 0;

    let deps = ArchiveDependencies {
        store: SqliteMetadataStore::open_in_memory().unwrap(),
        audit: FailingAudit,
        processor: LocalProcessor,
        replicator: DisabledReplicator,
        time_source: SteppingClock::new(),
    };
    assert!(matches!(
        ArchiveService::new(deps, config),
        Err(ArchiveError::Config { .. })
    ));
}
