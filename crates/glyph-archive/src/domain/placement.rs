//! Destination allocation inside archive storage.
//!
//! Names derive from the source file name. Occupied names get an
//! incrementing `_<n>` suffix before the extension. Each attempt re-checks
//! the directory; two processes can still race for the same name.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Upper bound on suffix attempts before giving up.
pub const MAX_SUFFIX_ATTEMPTS: u32 = 100_000;

/// Suffix appended to the archive name of encrypted files.
pub const ENCRYPTED_SUFFIX: &str = ".enc";

/// Candidate name for attempt `n` (`0` is the bare file name).
pub fn candidate_name(file_name: &Path, n: u32) -> OsString {
    if n == 0 {
        return file_name.as_os_str().to_os_string();
    }
    let stem = file_name.file_stem().unwrap_or(file_name.as_os_str());
    let mut name = stem.to_os_string();
    name.push(format!("_{n}"));
    if let Some(ext) = file_name.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}

/// First unused destination for `source` under `archive_dir`.
///
/// When `sibling_suffix` is set (e.g. `.enc`), the name with that suffix
/// appended must be free too. Returns `None` if `source` has no file name or
/// every attempt is taken.
pub fn allocate_destination(
    archive_dir: &Path,
    source: &Path,
    sibling_suffix: Option<&str>,
) -> Option<PathBuf> {
    let file_name = Path::new(source.file_name()?);

    (0..MAX_SUFFIX_ATTEMPTS)
        .map(|n| archive_dir.join(candidate_name(file_name, n)))
        .find(|candidate| {
            !candidate.exists()
                && sibling_suffix.map_or(true, |suffix| !with_suffix(candidate, suffix).exists())
        })
}

/// `path` with `suffix` appended to its final component.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}
