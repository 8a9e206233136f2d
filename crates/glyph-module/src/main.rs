//! # Glyph Reference Module
//!
//! Reads one JSON request from stdin, runs it in-process and writes one JSON
//! reply to stdout:
//!
//! ```text
//! {"cmd":"hash","data":"<hex>","algorithm":"sha256"}        -> {"result":"<hex digest>"}
//! {"cmd":"encrypt","data":"<hex>","key":"<b64>",...}        -> {"result":"<hex nonce||ct>"}
//! {"cmd":"decrypt","data":"<hex nonce||ct>","key":"<b64>"}  -> {"result":"<hex plaintext>"}
//! ```
//!
//! Bad input of any kind is answered with `{"error": "..."}` and exit code 0.
//! A non-zero exit means the reply itself could not be written.
//!
//! Diagnostics go to stderr, filtered by `GLYPH_LOG` (default `warn`).

use std::io::{self, Read, Write};

use anyhow::Context;
use glyph_archive::domain::digest::digest_bytes;
use glyph_archive::{
    ArchiveError, ContentProcessor, LocalProcessor, ModuleReply, ModuleRequest, AUTH_FAILURE_PREFIX,
    MAX_IPC_PAYLOAD_BYTES,
};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("GLYPH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let mut raw = Vec::new();
    io::stdin()
        .lock()
        .take(MAX_IPC_PAYLOAD_BYTES as u64 + 1)
        .read_to_end(&mut raw)
        .context("failed to read request from stdin")?;

    let reply = if raw.len() > MAX_IPC_PAYLOAD_BYTES {
        ModuleReply::Error(format!(
            "request exceeds {MAX_IPC_PAYLOAD_BYTES} bytes"
        ))
    } else {
        match String::from_utf8(raw) {
            Ok(text) => handle(&text),
            Err(_) => ModuleReply::Error("request is not UTF-8".to_string()),
        }
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", reply.to_json()).context("failed to write reply")?;
    stdout.flush().context("failed to flush reply")?;
    Ok(())
}

/// Answer one raw request.
fn handle(raw: &str) -> ModuleReply {
    let request: ModuleRequest = match serde_json::from_str(raw.trim()) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting request");
            return ModuleReply::Error(format!("invalid request: {e}"));
        }
    };

    let command = request.command();
    match execute(request) {
        Ok(result) => {
            tracing::debug!(command, "request handled");
            ModuleReply::Result(result)
        }
        Err(message) => {
            tracing::warn!(command, %message, "request failed");
            ModuleReply::Error(message)
        }
    }
}

fn execute(request: ModuleRequest) -> Result<String, String> {
    match request {
        ModuleRequest::Hash { data, algorithm } => {
            let bytes = decode_hex(&data)?;
            Ok(digest_bytes(algorithm, &bytes))
        }
        ModuleRequest::Encrypt {
            data,
            key,
            algorithm,
        } => {
            let bytes = decode_hex(&data)?;
            LocalProcessor
                .encrypt(&bytes, &key, algorithm)
                .map(hex::encode)
                .map_err(|e| e.to_string())
        }
        ModuleRequest::Decrypt {
            data,
            key,
            algorithm,
        } => {
            let bytes = decode_hex(&data)?;
            LocalProcessor
                .decrypt(&bytes, &key, algorithm)
                .map(hex::encode)
                .map_err(|e| match e {
                    ArchiveError::AuthenticationFailed { reason } => {
                        format!("{AUTH_FAILURE_PREFIX}: {reason}")
                    }
                    other => other.to_string(),
                })
        }
    }
}

fn decode_hex(data: &str) -> Result<Vec<u8>, String> {
    hex::decode(data).map_err(|e| format!("data is not hex: {e}"))
}
