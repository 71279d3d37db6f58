//! Bundle loader
//!
//! Turns a reference string into a fully composed [`Bundle`]:
//! classification (scheme / path / `namespace:subpath` / bare name), source
//! resolution through the cache, definition-file parsing, and depth-first
//! include resolution in declared order with on-stack cycle detection.
//!
//! Cache and discovery are explicitly passed, shared dependencies; two
//! loaders over the same cache coalesce their fetches.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::bundle::Bundle;
use crate::cache::SourceCache;
use crate::compose::compose;
use crate::discovery::{Discovery, RefKind, classify};
use crate::error::{MountplanError, Result};
use crate::frontmatter::parse_frontmatter;
use crate::fsio;
use crate::source::Resolved;
use crate::uri::ParsedSourceRef;

/// Definition filename priority; the first match wins.
const DEFINITION_FILES: &[&str] = &["bundle.md", "bundle.yaml", "bundle.yml"];

/// Candidate suffixes tried when a `namespace:subpath` reference does not
/// name an existing file directly.
const COMPOUND_CANDIDATES: &[&str] = &[".md", ".yaml", ".yml"];

/// Loader behavior knobs.
#[derive(Debug, Clone, Default)]
pub struct LoaderOptions {
    /// Downgrade missing includes to warnings instead of failing the load.
    pub lenient_includes: bool,
}

/// Resolves and loads bundles from any supported source.
pub struct BundleLoader {
    cache: Arc<SourceCache>,
    discovery: Arc<Discovery>,
    options: LoaderOptions,
}

impl BundleLoader {
    /// Loader with default options.
    pub fn new(cache: Arc<SourceCache>, discovery: Arc<Discovery>) -> Self {
        Self::with_options(cache, discovery, LoaderOptions::default())
    }

    pub fn with_options(
        cache: Arc<SourceCache>,
        discovery: Arc<Discovery>,
        options: LoaderOptions,
    ) -> Self {
        Self {
            cache,
            discovery,
            options,
        }
    }

    /// Load a bundle and compose its includes, in declared order.
    pub async fn load(&self, reference: &str) -> Result<Bundle> {
        let mut stack = Vec::new();
        self.load_with_stack(reference, &mut stack).await
    }

    /// Recursive load step. `stack` holds the definition files currently
    /// being loaded on this call path; re-entering one is a cycle.
    fn load_with_stack<'a>(
        &'a self,
        reference: &'a str,
        stack: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<Bundle>> {
        Box::pin(async move {
            let resolved = self.resolve_reference(reference).await?;
            let definition = find_definition_file(&resolved.active_path)?;
            let key = dunce::canonicalize(&definition)
                .unwrap_or_else(|_| definition.clone())
                .display()
                .to_string();

            if stack.contains(&key) {
                let chain = format!("{} -> {}", stack.join(" -> "), key);
                return Err(MountplanError::CircularDependency { chain });
            }

            stack.push(key);
            let result = self.load_definition(&definition, stack).await;
            stack.pop();
            result
        })
    }

    async fn load_definition(&self, file: &Path, stack: &mut Vec<String>) -> Result<Bundle> {
        let bundle = parse_definition_file(file).await?;
        debug!(bundle = %bundle.name, file = %file.display(), "loaded bundle definition");

        // Register the bundle under its own name so later namespace:subpath
        // references (including self-referencing includes) resolve.
        if !bundle.name.is_empty() && !self.discovery.contains(&bundle.name) {
            if let Some(base) = &bundle.base_path {
                self.discovery
                    .register(&bundle.name, base.display().to_string());
            }
        }

        let mut included: Vec<Bundle> = Vec::new();
        for include in &bundle.includes {
            match self.load_with_stack(include, stack).await {
                Ok(loaded) => included.push(loaded),
                Err(err @ MountplanError::BundleNotFound { .. })
                    if self.options.lenient_includes =>
                {
                    warn!(include = %include, %err, "include not found, skipping");
                }
                Err(err) => return Err(err),
            }
        }

        // Includes merge first, in declared order; the current bundle
        // overlays them all.
        let composed = match included.split_first() {
            None => compose(&bundle, &[]),
            Some((first, rest)) => {
                let mut overlays: Vec<&Bundle> = rest.iter().collect();
                overlays.push(&bundle);
                compose(first, &overlays)
            }
        };
        Ok(composed)
    }

    /// Resolve a reference string to local content, following the fixed
    /// classification order. Registry lookups are followed at most twice,
    /// so a registered name may point at a scheme, a path, or one compound
    /// reference - never at another bare name.
    async fn resolve_reference(&self, original: &str) -> Result<Resolved> {
        let mut reference = original.to_string();

        for _ in 0..2 {
            match classify(&reference) {
                RefKind::Scheme | RefKind::Path => {
                    let parsed = ParsedSourceRef::parse(&reference)?;
                    return self.cache.resolve(&parsed).await;
                }
                RefKind::Compound { namespace, subpath } => {
                    let base_ref = self.discovery.lookup(&namespace)?;
                    if !matches!(classify(&base_ref), RefKind::Scheme | RefKind::Path) {
                        return Err(MountplanError::invalid_reference(
                            original,
                            format!("namespace '{namespace}' is not registered to a source"),
                        ));
                    }
                    let parsed = ParsedSourceRef::parse(&base_ref)?;
                    let base = self.cache.resolve(&parsed).await?;
                    return find_in_namespace(&base, &subpath, original);
                }
                RefKind::Name => {
                    reference = self.discovery.lookup(&reference)?;
                }
            }
        }

        Err(MountplanError::invalid_reference(
            original,
            "registry entry resolves to another bare name",
        ))
    }
}

/// Locate the bundle definition inside resolved content. A directory is
/// searched in filename priority order; a direct file path is used as-is.
fn find_definition_file(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    for name in DEFINITION_FILES {
        let candidate = path.join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    Err(MountplanError::bundle_not_found(
        path.display().to_string(),
    ))
}

/// Find a resource inside a resolved namespace: the subpath as given, with a
/// definition extension appended, or as a directory holding a definition.
fn find_in_namespace(base: &Resolved, subpath: &str, original: &str) -> Result<Resolved> {
    let root = if base.active_path.is_file() {
        base.active_path
            .parent()
            .unwrap_or(&base.active_path)
            .to_path_buf()
    } else {
        base.active_path.clone()
    };

    let direct = root.join(subpath);
    let mut candidates = vec![direct.clone()];
    for suffix in COMPOUND_CANDIDATES {
        candidates.push(root.join(format!("{subpath}{suffix}")));
    }
    for name in DEFINITION_FILES {
        candidates.push(direct.join(name));
    }

    for candidate in candidates {
        if candidate.exists() {
            return Ok(Resolved {
                active_path: candidate,
                source_root: base.source_root.clone(),
            });
        }
    }

    Err(MountplanError::bundle_not_found(original))
}

/// Parse a definition file into a bundle (instruction attached from the
/// markdown body, base path from the containing directory).
async fn parse_definition_file(file: &Path) -> Result<Bundle> {
    let content = fsio::read_with_retry(file).await?;
    let base_path = file.parent();

    let extension = file.extension().and_then(|e| e.to_str()).unwrap_or("");
    let (header, body) = match extension {
        "md" => parse_frontmatter(&content)?,
        "yaml" | "yml" => {
            let value: serde_yaml::Value = serde_yaml::from_str(&content).map_err(|e| {
                MountplanError::bundle_load(format!("{}: {e}", file.display()))
            })?;
            let mapping = match value {
                serde_yaml::Value::Null => serde_yaml::Mapping::new(),
                serde_yaml::Value::Mapping(m) => m,
                _ => {
                    return Err(MountplanError::bundle_load(format!(
                        "{}: definition must be a mapping",
                        file.display()
                    )));
                }
            };
            (mapping, String::new())
        }
        other => {
            return Err(MountplanError::bundle_load(format!(
                "{}: unknown bundle format '{other}'",
                file.display()
            )));
        }
    };

    let mut bundle = Bundle::from_header(&header, base_path)?;
    let body = body.trim();
    if !body.is_empty() {
        bundle.instruction = Some(body.to_string());
    }
    Ok(bundle)
}

/// Convenience: load a bundle with a default cache and discovery, resolving
/// relative references against the current directory.
pub async fn load_bundle(reference: &str) -> Result<Bundle> {
    let base_dir = std::env::current_dir()?;
    let cache = Arc::new(SourceCache::with_defaults(base_dir)?);
    let discovery = Arc::new(Discovery::new());
    BundleLoader::new(cache, discovery).load(reference).await
}
