//! Bundle discovery registry
//!
//! Maps short bundle names to source references, and classifies reference
//! strings for the loader. Discovery is an explicitly-passed dependency
//! (shared behind `Arc`), never ambient state.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;

use crate::error::{MountplanError, Result};

/// How a reference string should be resolved.
///
/// The classification order is fixed and must not be reordered: compound
/// `namespace:subpath` tokens would otherwise be misclassified as plain
/// names (or worse, names as compounds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefKind {
    /// Explicit transport scheme - resolved directly through URI parsing
    Scheme,
    /// Local path markers - resolved as a filesystem path
    Path,
    /// `namespace:subpath` - namespace through discovery, then the subpath
    Compound { namespace: String, subpath: String },
    /// Bare name - resolved through discovery directly
    Name,
}

/// Classify a reference string.
pub fn classify(reference: &str) -> RefKind {
    // 1. Explicit transport scheme
    if reference.starts_with("git+") || reference.starts_with("zip+") || reference.contains("://") {
        return RefKind::Scheme;
    }

    // 2. Local path markers
    if reference.starts_with('/')
        || reference.starts_with("./")
        || reference.starts_with("../")
        || reference.starts_with("~/")
        || reference == "~"
        || reference == "."
        || reference == ".."
    {
        return RefKind::Path;
    }

    // 3. Compound namespace:subpath token
    if let Some((namespace, subpath)) = reference.split_once(':') {
        if !namespace.is_empty() && !subpath.is_empty() {
            return RefKind::Compound {
                namespace: namespace.to_string(),
                subpath: subpath.to_string(),
            };
        }
    }

    // 4. Bare name
    RefKind::Name
}

/// In-memory name -> source reference registry.
#[derive(Debug, Default)]
pub struct Discovery {
    registry: RwLock<BTreeMap<String, String>>,
}

impl Discovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name -> reference mapping, overwriting any existing one.
    pub fn register(&self, name: impl Into<String>, reference: impl Into<String>) {
        let (name, reference) = (name.into(), reference.into());
        debug!(name = %name, reference = %reference, "registered bundle");
        self.registry
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(name, reference);
    }

    /// Register several mappings at once.
    pub fn register_many<I, K, V>(&self, mappings: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, reference) in mappings {
            self.register(name, reference);
        }
    }

    /// Look up the reference for a registered name.
    pub fn lookup(&self, name: &str) -> Result<String> {
        self.find(name)
            .ok_or_else(|| MountplanError::bundle_not_found(name))
    }

    /// Look up a name, returning `None` when unregistered.
    pub fn find(&self, name: &str) -> Option<String> {
        self.registry
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// True when the name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.registry
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}
