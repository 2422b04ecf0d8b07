//! SHA-256 checksum verification for downloaded files.
//!
//! Files are streamed through the digest in fixed-size chunks and never
//! loaded whole into memory.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use modelfetch_core::{DownloadError, DownloadResult};

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Calculate the lowercase hex SHA-256 digest of a file.
pub fn calculate_file_checksum(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Compare two hex digests, ignoring case and surrounding whitespace.
pub fn checksums_match(actual: &str, expected: &str) -> bool {
    actual.trim().eq_ignore_ascii_case(expected.trim())
}

/// Whether the file at `path` hashes to `expected_hex`.
pub fn verify(path: &Path, expected_hex: &str) -> std::io::Result<bool> {
    let actual = calculate_file_checksum(path)?;
    Ok(checksums_match(&actual, expected_hex))
}

/// Verify a file on the blocking pool.
///
/// Returns the computed digest on a match and
/// [`DownloadError::ChecksumFailed`] on a mismatch.
pub async fn verify_file(path: PathBuf, expected_hex: String) -> DownloadResult<String> {
    let actual = tokio::task::spawn_blocking(move || calculate_file_checksum(&path))
        .await
        .map_err(|e| DownloadError::other(format!("checksum task failed: {e}")))??;

    if checksums_match(&actual, &expected_hex) {
        Ok(actual)
    } else {
        Err(DownloadError::checksum_failed(
            expected_hex.trim().to_ascii_lowercase(),
            actual,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelfetch_core::DownloadErrorKind;
    use std::io::Write;
    use tempfile::TempDir;

    const HELLO_WORLD_SHA256: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_calculate_checksum() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "hello.txt", b"hello world");
        assert_eq!(calculate_file_checksum(&path).unwrap(), HELLO_WORLD_SHA256);
    }

    #[test]
    fn test_calculate_checksum_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.bin", b"");
        assert_eq!(calculate_file_checksum(&path).unwrap(), EMPTY_SHA256);
    }

    #[test]
    fn test_checksum_spanning_multiple_buffers() {
        let dir = TempDir::new().unwrap();
        let data = vec![0xABu8; BUFFER_SIZE * 3 + 17];
        let path = write_file(&dir, "big.bin", &data);
        let expected = format!("{:x}", Sha256::digest(&data));
        assert_eq!(calculate_file_checksum(&path).unwrap(), expected);
    }

    #[test]
    fn test_verify_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "hello.txt", b"hello world");
        assert!(verify(&path, &HELLO_WORLD_SHA256.to_uppercase()).unwrap());
        assert!(!verify(&path, EMPTY_SHA256).unwrap());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(calculate_file_checksum(&dir.path().join("nope")).is_err());
    }

    #[tokio::test]
    async fn test_verify_file_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "hello.txt", b"hello world");
        let err = verify_file(path, "DEADBEEF".into()).await.unwrap_err();
        assert_eq!(err.kind(), DownloadErrorKind::ChecksumFailed);
        assert_eq!(
            err,
            DownloadError::checksum_failed("deadbeef", HELLO_WORLD_SHA256)
        );
    }

    #[tokio::test]
    async fn test_verify_file_match() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "hello.txt", b"hello world");
        let digest = tokio_test::assert_ok!(verify_file(path, HELLO_WORLD_SHA256.into()).await);
        assert_eq!(digest, HELLO_WORLD_SHA256);
    }
}
