//! Source handlers
//!
//! One handler per scheme family turns a parsed source reference into a local
//! directory: local paths resolve in place, git remotes clone at a ref, and
//! archives download and extract. Handlers are selected through a registry
//! keyed on the parsed scheme - call sites never branch on string prefixes.
//!
//! Remote handlers materialize content into a staging directory owned by the
//! cache; the cache publishes the directory only after the fetch succeeds.

pub mod archive;
pub mod git;
pub mod local;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{MountplanError, Result};
use crate::uri::{ParsedSourceRef, SchemeFamily};

pub use archive::ArchiveHandler;
pub use git::GitHandler;
pub use local::LocalHandler;

/// A resolved source: the effective root after applying any subpath, plus the
/// root of the fetched content (clone/extraction root or local directory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Directory the bundle definition is loaded from
    pub active_path: PathBuf,
    /// Root of the fetched content, kept for sibling-resource resolution
    pub source_root: PathBuf,
}

/// Outcome of a handler resolution.
#[derive(Debug)]
pub enum Resolution {
    /// Content is already on local disk; use it in place (never cached).
    Direct(Resolved),
    /// Content was materialized into the staging directory; the cache
    /// publishes it and applies `subpath` to derive the active path.
    Staged { subpath: Option<String> },
}

/// Capability interface for resolving one scheme family.
#[async_trait]
pub trait SourceHandler: Send + Sync {
    /// Scheme family this handler serves.
    fn scheme(&self) -> SchemeFamily;

    /// Turn a parsed reference into local content.
    ///
    /// Remote handlers fetch into `staging` (an existing empty directory) and
    /// return [`Resolution::Staged`]; the local handler ignores `staging` and
    /// returns [`Resolution::Direct`].
    async fn resolve(&self, parsed: &ParsedSourceRef, staging: &Path) -> Result<Resolution>;
}

/// Handler registry keyed on scheme family.
pub struct HandlerRegistry {
    handlers: HashMap<SchemeFamily, Arc<dyn SourceHandler>>,
}

impl HandlerRegistry {
    /// Registry with the built-in handlers: local paths resolved against
    /// `base_dir`, git via libgit2, archives via HTTP download or local read.
    pub fn with_defaults(base_dir: PathBuf) -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
        };
        registry.register(Arc::new(LocalHandler::new(base_dir)));
        registry.register(Arc::new(GitHandler::new()));
        registry.register(Arc::new(ArchiveHandler::new()));
        registry
    }

    /// Register a handler, replacing any existing one for the same scheme.
    pub fn register(&mut self, handler: Arc<dyn SourceHandler>) {
        self.handlers.insert(handler.scheme(), handler);
    }

    /// Handler for a scheme family.
    pub fn get(&self, scheme: SchemeFamily) -> Result<Arc<dyn SourceHandler>> {
        self.handlers.get(&scheme).cloned().ok_or_else(|| {
            MountplanError::invalid_reference(
                scheme.label(),
                "no source handler registered for scheme",
            )
        })
    }
}
