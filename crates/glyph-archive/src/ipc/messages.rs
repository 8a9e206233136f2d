//! # Module Wire Messages
//!
//! Request: `{"cmd": "<name>", ...}` with hex-encoded bytes.
//! Response: exactly one of `{"result": ...}` or `{"error": ...}`.
//!
//! A `decrypt` whose input does not authenticate answers with an error text
//! starting with [`AUTH_FAILURE_PREFIX`]. Every other error is a module
//! failure.

use serde::{Deserialize, Serialize};

use crate::domain::algorithms::{CipherAlgorithm, HashAlgorithm};
use crate::domain::errors::IpcError;

/// Ceiling on one serialized request.
pub const MAX_IPC_PAYLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Error text prefix marking a `decrypt` authentication failure.
pub const AUTH_FAILURE_PREFIX: &str = "authentication failed";

/// One request to an external module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum ModuleRequest {
    /// Digest of `data` (hex).
    Hash {
        data: String,
        #[serde(default)]
        algorithm: HashAlgorithm,
    },
    /// Seal `data` (hex) under `key` (base64).
    Encrypt {
        data: String,
        key: String,
        #[serde(default)]
        algorithm: CipherAlgorithm,
    },
    /// Open `data` (hex, `nonce || ciphertext`) under `key` (base64).
    Decrypt {
        data: String,
        key: String,
        #[serde(default)]
        algorithm: CipherAlgorithm,
    },
}

impl ModuleRequest {
    pub fn hash(data: &[u8], algorithm: HashAlgorithm) -> Self {
        ModuleRequest::Hash {
            data: hex::encode(data),
            algorithm,
        }
    }

    pub fn encrypt(data: &[u8], key: &str, algorithm: CipherAlgorithm) -> Self {
        ModuleRequest::Encrypt {
            data: hex::encode(data),
            key: key.to_string(),
            algorithm,
        }
    }

    pub fn decrypt(data: &[u8], key: &str, algorithm: CipherAlgorithm) -> Self {
        ModuleRequest::Decrypt {
            data: hex::encode(data),
            key: key.to_string(),
            algorithm,
        }
    }

    /// Wire name of the command, safe to log.
    pub fn command(&self) -> &'static str {
        match self {
            ModuleRequest::Hash { .. } => "hash",
            ModuleRequest::Encrypt { .. } => "encrypt",
            ModuleRequest::Decrypt { .. } => "decrypt",
        }
    }
}

/// A well-formed module reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleReply {
    Result(String),
    Error(String),
}

#[derive(Serialize, Deserialize)]
struct RawReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ModuleReply {
    /// Parse module stdout. Both or neither field present is malformed.
    pub fn parse(raw: &str) -> Result<Self, IpcError> {
        let malformed = |reason: String| IpcError::MalformedResponse {
            raw: raw.to_string(),
            reason,
        };

        let reply: RawReply =
            serde_json::from_str(raw.trim()).map_err(|e| malformed(format!("not JSON: {e}")))?;

        match (reply.result, reply.error) {
            (Some(result), None) => Ok(ModuleReply::Result(result)),
            (None, Some(error)) => Ok(ModuleReply::Error(error)),
            (Some(_), Some(_)) => Err(malformed("both `result` and `error` present".to_string())),
            (None, None) => Err(malformed("neither `result` nor `error` present".to_string())),
        }
    }

    /// Whether an error text reports an authentication failure.
    pub fn is_auth_failure(message: &str) -> bool {
        message.starts_with(AUTH_FAILURE_PREFIX)
    }

    /// Serialized form written by modules.
    pub fn to_json(&self) -> String {
        let raw = match self {
            ModuleReply::Result(r) => RawReply {
                result: Some(r.clone()),
                error: None,
            },
            ModuleReply::Error(e) => RawReply {
                result: None,
                error: Some(e.clone()),
            },
        };
        // Two optional strings always serialize.
        serde_json::to_string(&raw).unwrap_or_else(|_| String::from("{}"))
    }

    /// The result payload, or `ModuleRejected` naming `command`.
    pub fn into_result(self, command: &str) -> Result<String, IpcError> {
        match self {
            ModuleReply::Result(r) => Ok(r),
            ModuleReply::Error(message) => Err(IpcError::ModuleRejected {
                command: command.to_string(),
                message,
            }),
        }
    }
}
