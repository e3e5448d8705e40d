//! SHA-256 verification of dependency archives.

use std::io::Read;
use std::path::Path;

use ngstage_common::error::{Result, StageError};
use sha2::{Digest, Sha256};

/// Computes the hex-encoded SHA-256 of a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn hash_file(path: &Path) -> Result<String> {
    tracing::debug!(path = %path.display(), "computing SHA-256 hash");
    let io_err = |e| StageError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Validates that a file matches the expected SHA-256.
///
/// An empty `expected` disables the check.
///
/// # Errors
///
/// Returns `StageError::HashMismatch` if the hashes differ.
pub fn validate_hash(path: &Path, expected: &str) -> Result<()> {
    if expected.is_empty() {
        tracing::debug!(path = %path.display(), "no checksum listed, skipping verification");
        return Ok(());
    }
    let actual = hash_file(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(StageError::HashMismatch {
            resource: path.display().to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn hash_of_known_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hello");
        std::fs::write(&path, "hello").expect("write");
        assert_eq!(hash_file(&path).expect("hash"), HELLO_SHA256);
    }

    #[test]
    fn validate_accepts_matching_and_empty_hash() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hello");
        std::fs::write(&path, "hello").expect("write");
        validate_hash(&path, HELLO_SHA256).expect("match");
        validate_hash(&path, &HELLO_SHA256.to_uppercase()).expect("case-insensitive");
        validate_hash(&path, "").expect("skipped");
    }

    #[test]
    fn validate_rejects_mismatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hello");
        std::fs::write(&path, "hello").expect("write");
        let err = validate_hash(&path, "00").expect_err("mismatch");
        assert!(matches!(err, StageError::HashMismatch { .. }));
    }

    #[test]
    fn hash_of_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            hash_file(&dir.path().join("missing")),
            Err(StageError::Io { .. })
        ));
    }
}
