//! JSON-lines audit log on the local file system.

use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::lock::AppendLock;
use crate::domain::audit::{self, AuditRecord, ChainVerification};
use crate::domain::entities::{format_timestamp, Timestamp};
use crate::domain::errors::AuditError;
use crate::ports::outbound::AuditSink;

/// Append-only, hash-chained audit log stored as one JSON object per line.
#[derive(Debug, Clone)]
pub struct FileAuditLog {
    path: PathBuf,
}

impl FileAuditLog {
    /// Bind to `path`, creating parent directories. The file itself is
    /// created on first append.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| AuditError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in file order. Blank lines are skipped.
    pub fn records(&self) -> Result<Vec<AuditRecord>, AuditError> {
        let text = self.read_all()?;
        let mut records = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(line).map_err(|e| AuditError::ChainCorruption {
                position: records.len(),
                line: index + 1,
                reason: format!("unparsable record: {e}"),
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Replay the chain and fail on the first break.
    pub fn ensure_intact(&self) -> Result<ChainVerification, AuditError> {
        let verification = self.verify_chain()?;
        match verification.first_break {
            Some(brk) => Err(AuditError::ChainCorruption {
                position: brk.position,
                line: brk.line,
                reason: brk.reason,
            }),
            None => Ok(verification),
        }
    }

    fn read_all(&self) -> Result<String, AuditError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: io::Error) -> AuditError {
        AuditError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl AuditSink for FileAuditLog {
    fn append(&self, at: &Timestamp, event: &str, payload: Value) -> Result<String, AuditError> {
        let mut guard = AppendLock::acquire(&self.path).map_err(|e| self.io_error(e))?;
        let file = guard.file_mut();

        let mut existing = String::new();
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_string(&mut existing))
            .map_err(|e| self.io_error(e))?;

        let prev = audit::last_digest(&existing).map_err(|e| {
            let non_blank: Vec<usize> = existing
                .lines()
                .enumerate()
                .filter(|(_, l)| !l.trim().is_empty())
                .map(|(i, _)| i + 1)
                .collect();
            AuditError::ChainCorruption {
                position: non_blank.len().saturating_sub(1),
                line: non_blank.last().copied().unwrap_or(0),
                reason: format!("last record unparsable: {e}"),
            }
        })?;

        let record = AuditRecord::seal(format_timestamp(at), event, payload, prev);
        let mut line = serde_json::to_string(&record)?;
        // Hand-edited logs may lack the final newline.
        if !existing.is_empty() && !existing.ends_with('\n') {
            line.insert(0, '\n');
        }
        line.push('\n');

        file.write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .and_then(|_| file.sync_data())
            .map_err(|e| self.io_error(e))?;

        tracing::debug!(event, digest = %record.hash, "audit record appended");
        Ok(record.hash)
    }

    fn verify_chain(&self) -> Result<ChainVerification, AuditError> {
        let text = self.read_all()?;
        let verification = audit::replay(text.lines().enumerate().map(|(i, l)| (i + 1, l)));
        if let Some(brk) = &verification.first_break {
            tracing::warn!(
                position = brk.position,
                line = brk.line,
                reason = %brk.reason,
                "audit chain broken"
            );
        }
        Ok(verification)
    }
}
