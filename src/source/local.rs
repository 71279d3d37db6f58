//! Local filesystem source handler
//!
//! Resolves `file://` URIs and plain paths (absolute, `./relative`,
//! `~/home-relative`) directly against the filesystem. Nothing is copied or
//! cached: the resolved directory is used in place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{MountplanError, Result};
use crate::paths;
use crate::uri::{ParsedSourceRef, SchemeFamily};

use super::{Resolution, Resolved, SourceHandler};

/// Handler for local paths.
pub struct LocalHandler {
    base_dir: PathBuf,
}

impl LocalHandler {
    /// Create a handler resolving relative paths against `base_dir`.
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }
}

#[async_trait]
impl SourceHandler for LocalHandler {
    fn scheme(&self) -> SchemeFamily {
        SchemeFamily::File
    }

    async fn resolve(&self, parsed: &ParsedSourceRef, _staging: &Path) -> Result<Resolution> {
        let root = paths::resolve_path(&parsed.path, &self.base_dir);
        if !root.exists() {
            return Err(MountplanError::source_unavailable(
                &parsed.path,
                "path does not exist",
            ));
        }
        let root = paths::canonicalize(&root)?;

        let active = match &parsed.subpath {
            Some(sub) => {
                let candidate = root.join(sub);
                if !candidate.exists() {
                    return Err(MountplanError::reference_not_found(
                        &parsed.path,
                        format!("subpath '{sub}' does not exist"),
                    ));
                }
                candidate
            }
            None => root.clone(),
        };

        Ok(Resolution::Direct(Resolved {
            active_path: active,
            source_root: root,
        }))
    }
}
