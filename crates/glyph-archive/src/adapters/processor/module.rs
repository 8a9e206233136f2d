//! Processor backed by an external module executable.

use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::domain::algorithms::{CipherAlgorithm, HashAlgorithm};
use crate::domain::errors::{ArchiveError, IpcError};
use crate::ipc::{ModuleChannel, ModuleReply, ModuleRequest};
use crate::ports::outbound::ContentProcessor;

/// Delegates hashing and encryption to a module over `ModuleChannel`.
///
/// Files are sent whole, so inputs are bounded by the IPC payload ceiling.
#[derive(Debug, Clone)]
pub struct ModuleProcessor {
    channel: ModuleChannel,
    timeout: Duration,
}

impl ModuleProcessor {
    pub fn new(channel: ModuleChannel, timeout: Duration) -> Self {
        Self { channel, timeout }
    }

    /// Bind to the executable at `path`.
    pub fn from_path(path: &Path, timeout: Duration) -> Result<Self, IpcError> {
        Ok(Self::new(ModuleChannel::new(path)?, timeout))
    }

    fn call_bytes(&self, request: ModuleRequest) -> Result<Vec<u8>, ArchiveError> {
        let result = self.channel.call_for_result(&request, self.timeout)?;
        hex::decode(result.trim()).map_err(|e| {
            IpcError::MalformedResponse {
                raw: result,
                reason: format!("`{}` result is not hex: {e}", request.command()),
            }
            .into()
        })
    }
}

impl ContentProcessor for ModuleProcessor {
    fn digest_file(&self, path: &Path, algorithm: HashAlgorithm) -> Result<String, ArchiveError> {
        let bytes = fs::read(path).map_err(|e| ArchiveError::io(path, e))?;
        let request = ModuleRequest::hash(&bytes, algorithm);
        let digest = self
            .channel
            .call_for_result(&request, self.timeout)?
            .trim()
            .to_ascii_lowercase();

        if digest.len() != algorithm.hex_len() || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IpcError::MalformedResponse {
                raw: digest,
                reason: format!("not a {algorithm} hex digest"),
            }
            .into());
        }
        Ok(digest)
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &str,
        algorithm: CipherAlgorithm,
    ) -> Result<Vec<u8>, ArchiveError> {
        self.call_bytes(ModuleRequest::encrypt(plaintext, key, algorithm))
    }

    fn decrypt(
        &self,
        sealed: &[u8],
        key: &str,
        algorithm: CipherAlgorithm,
    ) -> Result<Vec<u8>, ArchiveError> {
        self.call_bytes(ModuleRequest::decrypt(sealed, key, algorithm))
            .map_err(|e| match e {
                ArchiveError::Ipc(IpcError::ModuleRejected { message, .. })
                    if ModuleReply::is_auth_failure(&message) =>
                {
                    ArchiveError::AuthenticationFailed { reason: message }
                }
                other => other,
            })
    }

    fn name(&self) -> &'static str {
        "module"
    }
}
