//! Cache-key derivation and mtime-based staleness checks.
//!
//! Cache keys use `rustc_hash::FxHasher` over the whole file content: fast,
//! deterministic, and good enough for content-change detection (collision
//! resistance is not a security requirement here - the key only names and
//! validates cache files). Keys are recomputed on every invocation; the cost
//! is bounded by the cheap mtime pre-check in [`crate::store`].

use rustc_hash::FxHasher;
use std::fs::File;
use std::hash::Hasher;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::time::SystemTime;

/// Compute the content cache key of a file (16-char hex fingerprint).
///
/// Same bytes always produce the same key; different bytes a different one.
pub fn cache_key(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let hash = compute_reader(BufReader::new(file))?;
    Ok(format!("{hash:016x}"))
}

/// Compute hash from a reader (streaming, for large files).
pub fn compute_reader(mut reader: impl Read) -> io::Result<u64> {
    let mut hasher = FxHasher::default();
    let mut buffer = [0u8; 8192];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.write(&buffer[..n]);
    }
    Ok(hasher.finish())
}

/// Get the modification time of a file
///
/// Returns `None` if the file doesn't exist or mtime cannot be read
pub fn mtime(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}
