//! Content processors: in-process and external module.

use std::path::Path;

use crate::domain::algorithms::{CipherAlgorithm, HashAlgorithm};
use crate::domain::errors::ArchiveError;
use crate::ports::outbound::ContentProcessor;

mod local;
mod module;

pub use local::{LocalProcessor, SecretKey, KEY_LEN};
pub use module::ModuleProcessor;

/// Lets callers pick a processor at runtime (`Box<dyn ContentProcessor>`).
impl<P: ContentProcessor + ?Sized> ContentProcessor for Box<P> {
    fn digest_file(&self, path: &Path, algorithm: HashAlgorithm) -> Result<String, ArchiveError> {
        (**self).digest_file(path, algorithm)
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &str,
        algorithm: CipherAlgorithm,
    ) -> Result<Vec<u8>, ArchiveError> {
        (**self).encrypt(plaintext, key, algorithm)
    }

    fn decrypt(
        &self,
        sealed: &[u8],
        key: &str,
        algorithm: CipherAlgorithm,
    ) -> Result<Vec<u8>, ArchiveError> {
        (**self).decrypt(sealed, key, algorithm)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
