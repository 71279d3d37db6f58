//! Archive source handler
//!
//! Fetches a zip archive - over HTTP(S) for `zip+https://`, or straight from
//! disk for `zip+file://` - and extracts it into the staging directory. The
//! `#subdirectory=` fragment then selects the effective root inside the
//! extracted tree.

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{MountplanError, Result};
use crate::uri::{ParsedSourceRef, SchemeFamily};

use super::{Resolution, SourceHandler};

/// Handler for `zip+https` and `zip+file` references.
pub struct ArchiveHandler {
    client: reqwest::Client,
}

impl ArchiveHandler {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ArchiveHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceHandler for ArchiveHandler {
    fn scheme(&self) -> SchemeFamily {
        SchemeFamily::Archive
    }

    async fn resolve(&self, parsed: &ParsedSourceRef, staging: &Path) -> Result<Resolution> {
        let url = parsed.remote_url();
        let bytes = if parsed.transport == "file" {
            tokio::fs::read(&parsed.path)
                .await
                .map_err(|e| MountplanError::source_unavailable(&url, e.to_string()))?
        } else {
            self.download(&url).await?
        };
        debug!(url = %url, bytes = bytes.len(), "fetched archive");

        let dest = staging.to_path_buf();
        let source_ref = url.clone();
        tokio::task::spawn_blocking(move || extract_zip(&bytes, &dest, &source_ref))
            .await
            .map_err(|e| MountplanError::source_unavailable(&url, e.to_string()))??;

        Ok(Resolution::Staged {
            subpath: parsed.subpath.clone(),
        })
    }
}

impl ArchiveHandler {
    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MountplanError::source_unavailable(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MountplanError::source_unavailable(
                url,
                format!("HTTP {status}"),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MountplanError::source_unavailable(url, e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn extract_zip(bytes: &[u8], dest: &Path, source_ref: &str) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| MountplanError::source_unavailable(source_ref, format!("invalid archive: {e}")))?;
    archive
        .extract(dest)
        .map_err(|e| MountplanError::source_unavailable(source_ref, format!("extraction failed: {e}")))
}
