//! File access with bounded retry
//!
//! Cloud-synced storage (OneDrive, Dropbox) surfaces transient I/O errors for
//! files that are not locally materialized yet. Reads here retry a bounded
//! number of times with exponential backoff. This is the only retry logic in
//! the crate: resolution and composition never retry on their own.

use std::path::Path;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;

const MAX_RETRIES: u32 = 3;
const INITIAL_DELAY: Duration = Duration::from_millis(100);

/// Read a file to a string, retrying transient I/O errors with backoff.
pub async fn read_with_retry(path: &Path) -> Result<String> {
    let mut delay = INITIAL_DELAY;
    let mut attempt = 0;

    loop {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => return Ok(content),
            Err(e) if is_transient(&e) && attempt + 1 < MAX_RETRIES => {
                if attempt == 0 {
                    warn!(
                        path = %path.display(),
                        "transient I/O error reading file, retrying (cloud-synced storage?)"
                    );
                }
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Transient errors worth retrying: generic I/O failures from sync layers.
/// NotFound and permission errors are definitive and propagate immediately.
fn is_transient(e: &std::io::Error) -> bool {
    !matches!(
        e.kind(),
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("content.md");
        std::fs::write(&path, "hello").unwrap();
        assert_eq!(read_with_retry(&path).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_missing_file_fails_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let start = std::time::Instant::now();
        let err = read_with_retry(&dir.path().join("absent.md")).await.unwrap_err();
        assert!(matches!(err, crate::error::MountplanError::Io { .. }));
        // NotFound must not burn through the backoff schedule
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
