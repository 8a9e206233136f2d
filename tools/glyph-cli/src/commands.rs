//! Subcommand implementations. Each returns whether the command succeeded;
//! hard failures propagate as errors.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use glyph_archive::{
    replicator_for, ArchiveApi, ArchiveDependencies, ArchiveEntry, ArchiveService,
    ContentProcessor, EntrySelector, FileAuditLog, GlyphConfig, IngestOptions, LocalProcessor,
    ModuleProcessor, ProvidedMetadata, RemoteReplicator, SqliteMetadataStore, SystemTimeSource,
    VerificationResult,
};

pub type CliService = ArchiveService<
    SqliteMetadataStore,
    FileAuditLog,
    Box<dyn ContentProcessor>,
    Box<dyn RemoteReplicator>,
    SystemTimeSource,
>;

/// Wire the production adapters selected by `config`.
pub fn open_service(config: GlyphConfig) -> Result<CliService> {
    let crypto = &config.modules.crypto;
    let processor: Box<dyn ContentProcessor> = if crypto.enabled {
        Box::new(
            ModuleProcessor::from_path(&crypto.path, crypto.timeout())
                .context("failed to set up crypto module")?,
        )
    } else {
        Box::new(LocalProcessor)
    };

    let deps = ArchiveDependencies {
        store: SqliteMetadataStore::open(&config.metadata.database).with_context(|| {
            format!(
                "failed to open metadata database {}",
                config.metadata.database.display()
            )
        })?,
        audit: FileAuditLog::open(&config.audit.file).context("failed to open audit log")?,
        processor,
        replicator: replicator_for(config.storage.use_remote),
        time_source: SystemTimeSource,
    };
    ArchiveService::new(deps, config).context("failed to initialise archive")
}

pub fn add(
    service: &mut CliService,
    file: &Path,
    metadata: ProvidedMetadata,
    verify_copy: bool,
) -> Result<bool> {
    let entry = service
        .ingest(file, metadata, IngestOptions { verify_copy })
        .with_context(|| format!("failed to archive {}", file.display()))?;

    let mut out = io::stdout().lock();
    writeln!(out, "archived #{} {}", entry.id, entry.archive_path.display())?;
    writeln!(out, "  hash: {}", entry.content_digest)?;
    if let Some(cipher) = entry.encryption() {
        writeln!(out, "  encryption: {cipher}")?;
    }
    Ok(true)
}

pub fn verify(
    service: &mut CliService,
    id: Option<i64>,
    hash: Option<String>,
    path: Option<PathBuf>,
) -> Result<bool> {
    let Some(selector) = EntrySelector::first_of(id, hash, path) else {
        bail!("nothing to verify: pass --id, --hash, --path or a file path");
    };
    let result = service
        .verify(&selector)
        .with_context(|| format!("failed to verify {selector}"))?;

    print_result(&mut io::stdout().lock(), &result)?;
    Ok(result.is_match())
}

pub fn verify_all(service: &mut CliService, limit: usize) -> Result<bool> {
    let results = service.verify_recent(limit)?;
    let mut out = io::stdout().lock();

    let mut failures = 0usize;
    for (id, outcome) in &results {
        match outcome {
            Ok(result) => {
                if !result.is_match() {
                    failures += 1;
                }
                print_result(&mut out, result)?;
            }
            Err(e) => {
                failures += 1;
                writeln!(out, "ERROR     #{id} {e}")?;
            }
        }
    }
    writeln!(out, "{} checked, {} failed", results.len(), failures)?;
    Ok(failures == 0)
}

pub fn list(service: &CliService, limit: usize, json: bool) -> Result<bool> {
    let entries = service.list_recent(limit)?;
    let mut out = io::stdout().lock();

    if json {
        serde_json::to_writer_pretty(&mut out, &entries)?;
        writeln!(out)?;
        return Ok(true);
    }

    if entries.is_empty() {
        writeln!(out, "archive is empty")?;
        return Ok(true);
    }
    writeln!(out, "{:>6}  {:<8}  {:<20}  {:<24}  PATH", "ID", "STATUS", "ADDED", "TITLE")?;
    for entry in &entries {
        writeln!(out, "{}", list_row(entry))?;
    }
    Ok(true)
}

pub fn audit(service: &CliService) -> Result<bool> {
    let chain = service.verify_audit_chain()?;
    let mut out = io::stdout().lock();

    match &chain.first_break {
        None => {
            writeln!(out, "audit chain intact: {} records", chain.verified_records)?;
            Ok(true)
        }
        Some(brk) => {
            writeln!(
                out,
                "audit chain BROKEN at record {} (line {}): {}",
                brk.position, brk.line, brk.reason
            )?;
            writeln!(out, "{} records verified before the break", chain.verified_records)?;
            Ok(false)
        }
    }
}

fn print_result(out: &mut impl Write, result: &VerificationResult) -> io::Result<()> {
    if result.is_match() {
        writeln!(out, "OK        #{} {}", result.entry_id, result.archive_path.display())
    } else {
        writeln!(
            out,
            "MISMATCH  #{} {}\n  expected: {}\n  actual:   {}",
            result.entry_id,
            result.archive_path.display(),
            result.expected_digest,
            result.actual_digest
        )
    }
}

fn list_row(entry: &ArchiveEntry) -> String {
    let status = if entry.verified { "ok" } else { "FAILED" };
    let title: String = entry.title().unwrap_or("-").chars().take(24).collect();
    format!(
        "{:>6}  {:<8}  {:<20}  {:<24}  {}",
        entry.id,
        status,
        entry.added_at.format("%Y-%m-%d %H:%M:%S"),
        title,
        entry.archive_path.display()
    )
}
