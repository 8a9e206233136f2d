//! Configuration loading: JSON settings file plus environment overrides.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use glyph_archive::{GlyphConfig, HashAlgorithm};

/// Settings file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config/settings.json";

/// Load the settings file and apply `GLYPH_*` overrides from the process
/// environment.
///
/// An explicit `--config` path must exist; the default path may be absent,
/// in which case built-in defaults apply.
pub fn load_config(explicit: Option<&Path>) -> Result<GlyphConfig> {
    let mut config = match explicit {
        Some(path) => read_config(path)?,
        None => match read_config(Path::new(DEFAULT_CONFIG_PATH)) {
            Ok(config) => config,
            Err(e) if is_not_found(&e) => GlyphConfig::default(),
            Err(e) => return Err(e),
        },
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<GlyphConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<io::Error>())
        .any(|e| e.kind() == io::ErrorKind::NotFound)
}

/// Apply overrides.
///
/// # Environment Variables
///
/// - `GLYPH_ARCHIVE_DIR`: archive storage directory
/// - `GLYPH_DATABASE`: metadata database file
/// - `GLYPH_AUDIT_FILE`: audit log file
/// - `GLYPH_HASH_ALGO`: sha256, sha512, sha3-256 or blake3
/// - `GLYPH_LOG_LEVEL`: log filter directive
/// - `GLYPH_JSON_LOGS`: true/false, 1/0
pub fn apply_env_overrides<F>(config: &mut GlyphConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(dir) = var("GLYPH_ARCHIVE_DIR") {
        config.storage.archive_dir = PathBuf::from(dir);
    }
    if let Some(db) = var("GLYPH_DATABASE") {
        config.metadata.database = PathBuf::from(db);
    }
    if let Some(file) = var("GLYPH_AUDIT_FILE") {
        config.audit.file = PathBuf::from(file);
    }
    if let Some(algo) = var("GLYPH_HASH_ALGO") {
        config.security.hash_algo = algo
            .parse::<HashAlgorithm>()
            .map_err(|e| anyhow!("GLYPH_HASH_ALGO: {e}"))?;
    }
    if let Some(level) = var("GLYPH_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("GLYPH_JSON_LOGS") {
        config.logging.json_format = parse_flag(&json)
            .ok_or_else(|| anyhow!("GLYPH_JSON_LOGS: expected true/false, got {json:?}"))?;
    }
    Ok(())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
