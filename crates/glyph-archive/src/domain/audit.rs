//! # Audit Chain
//!
//! Pure functions over the hash chain. A record's digest is
//! `sha256_hex(canonical({timestamp, event, payload, prev}) ++ prev)`, where
//! `canonical` is JSON with object keys sorted at every depth, `", "` between
//! items, `": "` after keys and non-ASCII text left unescaped. Logs written
//! by earlier Glyph releases use exactly this form.
//!
//! Storage lives in `adapters::audit`; everything here is deterministic and
//! independent of the file layout.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// `prev` value of the first record in a log.
pub const GENESIS: &str = "GENESIS";

/// One line of the audit log. Field order is the on-disk order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: String,
    pub event: String,
    pub payload: Value,
    pub prev: String,
    pub hash: String,
}

impl AuditRecord {
    /// Build a record linked to `prev` and compute its digest.
    pub fn seal(
        timestamp: impl Into<String>,
        event: impl Into<String>,
        payload: Value,
        prev: impl Into<String>,
    ) -> Self {
        let timestamp = timestamp.into();
        let event = event.into();
        let prev = prev.into();
        let hash = record_digest(&timestamp, &event, &payload, &prev);
        Self {
            timestamp,
            event,
            payload,
            prev,
            hash,
        }
    }

    /// Digest this record should carry given its other fields.
    pub fn expected_digest(&self) -> String {
        record_digest(&self.timestamp, &self.event, &self.payload, &self.prev)
    }
}

/// Digest of a record's fields chained to `prev`.
pub fn record_digest(timestamp: &str, event: &str, payload: &Value, prev: &str) -> String {
    let mut body = serde_json::Map::new();
    body.insert("timestamp".to_string(), Value::String(timestamp.to_string()));
    body.insert("event".to_string(), Value::String(event.to_string()));
    body.insert("payload".to_string(), payload.clone());
    body.insert("prev".to_string(), Value::String(prev.to_string()));

    let mut hasher = Sha256::new();
    hasher.update(canonical_json(&Value::Object(body)).as_bytes());
    hasher.update(prev.as_bytes());
    hex::encode(hasher.finalize())
}

/// JSON with object keys sorted recursively and `", "` / `": "` separators.
///
/// Independent of serde_json's map ordering features.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push_str(": ");
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Where and why a replay stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBreak {
    /// Zero-based record index (blank lines excluded).
    pub position: usize,
    /// One-based line number in the log file.
    pub line: usize,
    pub reason: String,
}

/// Result of replaying a log from the sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChainVerification {
    /// Records that verified before the first break (or all of them).
    pub verified_records: usize,
    pub first_break: Option<ChainBreak>,
}

impl ChainVerification {
    pub fn is_intact(&self) -> bool {
        self.first_break.is_none()
    }
}

/// Replay raw log lines (`(line_number, text)`), stopping at the first break.
///
/// Blank lines are skipped. An unparsable line is itself a break.
pub fn replay<'a, I>(lines: I) -> ChainVerification
where
    I: IntoIterator<Item = (usize, &'a str)>,
{
    let mut expected_prev = GENESIS.to_string();
    let mut position = 0usize;

    for (line, text) in lines {
        if text.trim().is_empty() {
            continue;
        }

        let fail = |reason: String| ChainVerification {
            verified_records: position,
            first_break: Some(ChainBreak {
                position,
                line,
                reason,
            }),
        };

        let record: AuditRecord = match serde_json::from_str(text) {
            Ok(record) => record,
            Err(e) => return fail(format!("unparsable record: {e}")),
        };

        if record.prev != expected_prev {
            return fail(format!(
                "prev {} does not match preceding digest {}",
                record.prev, expected_prev
            ));
        }

        let recomputed = record.expected_digest();
        if record.hash != recomputed {
            return fail(format!(
                "stored digest {} differs from recomputed {}",
                record.hash, recomputed
            ));
        }

        expected_prev = record.hash;
        position += 1;
    }

    ChainVerification {
        verified_records: position,
        first_break: None,
    }
}

/// Digest of the last record in `text`, or the sentinel for an empty log.
pub fn last_digest(text: &str) -> Result<String, serde_json::Error> {
    match text.lines().rev().find(|l| !l.trim().is_empty()) {
        Some(line) => {
            let record: AuditRecord = serde_json::from_str(line)?;
            Ok(record.hash)
        }
        None => Ok(GENESIS.to_string()),
    }
}
