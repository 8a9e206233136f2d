//! # Archive Configuration
//!
//! Shape of the settings document consumed by the pipelines. Every section
//! has defaults, so `{}` is a valid configuration. Loading the document and
//! applying environment overrides is the binary's job.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::algorithms::{CipherAlgorithm, HashAlgorithm};

/// Complete Glyph configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlyphConfig {
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
    pub audit: AuditConfig,
    pub modules: ModulesConfig,
    pub logging: LoggingConfig,
}

impl GlyphConfig {
    /// Reject configurations the pipelines cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let crypto = &self.modules.crypto;
        if crypto.enabled && crypto.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "modules.crypto.enabled requires modules.crypto.path".to_string(),
            ));
        }
        if crypto.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "modules.crypto.timeout_secs must be positive".to_string(),
            ));
        }
        let enc = &self.security.encryption;
        if enc.enabled && enc.key_env_var.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "security.encryption.enabled requires security.encryption.key_env_var".to_string(),
            ));
        }
        if self.storage.archive_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.archive_dir must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Digest and encryption settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub hash_algo: HashAlgorithm,
    pub encryption: EncryptionConfig,
}

/// Optional encryption of archived bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub enabled: bool,
    pub algorithm: CipherAlgorithm,
    /// Environment variable holding the base64-encoded 32-byte key.
    pub key_env_var: String,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            algorithm: CipherAlgorithm::default(),
            key_env_var: "GLYPH_ENCRYPTION_KEY".to_string(),
        }
    }
}

/// Archive storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub archive_dir: PathBuf,
    /// Hand finished archives to the remote replicator.
    pub use_remote: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            archive_dir: PathBuf::from("./data/archive"),
            use_remote: false,
        }
    }
}

/// Metadata store location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub database: PathBuf,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("./data/metadata.db"),
        }
    }
}

/// Audit log location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub file: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("./logs/audit.jsonl"),
        }
    }
}

/// External module switches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    pub crypto: ModuleConfig,
}

/// One external module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub timeout_secs: u64,
}

impl ModuleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::new(),
            timeout_secs: 30,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (trace, debug, info, warn, error).
    pub level: String,
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}
