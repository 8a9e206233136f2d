//! # Content Digests
//!
//! Streaming digests over files and byte slices. Files are read in 64 KiB
//! chunks so large archives never have to fit in memory.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256, Sha512};
use sha3::Sha3_256;

use super::algorithms::HashAlgorithm;

/// Read buffer size for file hashing.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Stateful hasher over any supported algorithm.
pub enum ContentHasher {
    Sha256(Sha256),
    Sha512(Sha512),
    Sha3_256(Sha3_256),
    Blake3(Box<blake3::Hasher>),
}

impl ContentHasher {
    /// Create a hasher for `algorithm`.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => ContentHasher::Sha256(Sha256::new()),
            HashAlgorithm::Sha512 => ContentHasher::Sha512(Sha512::new()),
            HashAlgorithm::Sha3_256 => ContentHasher::Sha3_256(Sha3_256::new()),
            HashAlgorithm::Blake3 => ContentHasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    /// Update with data.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        match self {
            ContentHasher::Sha256(h) => h.update(data),
            ContentHasher::Sha512(h) => h.update(data),
            ContentHasher::Sha3_256(h) => h.update(data),
            ContentHasher::Blake3(h) => {
                h.update(data);
            }
        }
        self
    }

    /// Finalize into a lowercase hex string.
    pub fn finalize_hex(self) -> String {
        match self {
            ContentHasher::Sha256(h) => hex::encode(h.finalize()),
            ContentHasher::Sha512(h) => hex::encode(h.finalize()),
            ContentHasher::Sha3_256(h) => hex::encode(h.finalize()),
            ContentHasher::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Hex digest of a byte slice (one-shot).
pub fn digest_bytes(algorithm: HashAlgorithm, data: &[u8]) -> String {
    let mut hasher = ContentHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize_hex()
}

/// Hex digest of everything readable from `reader`.
pub fn digest_reader<R: Read>(algorithm: HashAlgorithm, mut reader: R) -> io::Result<String> {
    let mut hasher = ContentHasher::new(algorithm);
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize_hex())
}

/// Hex digest of a file's content.
pub fn digest_file(algorithm: HashAlgorithm, path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let digest = digest_reader(algorithm, file)?;
    tracing::debug!(path = %path.display(), %algorithm, %digest, "computed file digest");
    Ok(digest)
}

/// SHA-256 of `b"hello world"`.
#[cfg(test)]
pub(crate) const HELLO_WORLD_SHA256: &str =
    "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            digest_bytes(HashAlgorithm::Sha256, b"hello world"),
            HELLO_WORLD_SHA256
        );
    }

    #[test]
    fn test_hex_lengths_match_algorithm() {
        for algo in [
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha512,
            HashAlgorithm::Sha3_256,
            HashAlgorithm::Blake3,
        ] {
            assert_eq!(digest_bytes(algo, b"glyph").len(), algo.hex_len());
        }
    }

    #[test]
    fn test_streaming_matches_one_shot_across_chunks() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 2 + 17)).map(|i| (i % 251) as u8).collect();
        let streamed = digest_reader(HashAlgorithm::Blake3, data.as_slice()).unwrap();
        assert_eq!(streamed, digest_bytes(HashAlgorithm::Blake3, &data));
    }

    #[test]
    fn test_digest_file_missing_is_io_error() {
        let err = digest_file(HashAlgorithm::Sha256, Path::new("/nonexistent/glyph")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
