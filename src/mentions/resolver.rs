//! Mention resolution against composed bundle locations
//!
//! `@namespace:rel/path` resolves through the namespace -> base-location map
//! recorded during composition; bare `@path` resolves against the composed
//! bundle's own base path. Registered context entries take priority, then
//! the path relative to the namespace root, then the conventional
//! `context/` directory.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::bundle::Bundle;

/// Resolves mention tokens to file paths.
#[derive(Debug, Clone, Default)]
pub struct MentionResolver {
    namespaces: BTreeMap<String, PathBuf>,
    context: BTreeMap<String, PathBuf>,
    base_path: Option<PathBuf>,
}

impl MentionResolver {
    /// Build a resolver from a composed bundle: its namespace map, its
    /// accumulated context entries, and its base path for bare mentions.
    pub fn from_bundle(bundle: &Bundle) -> Self {
        let mut namespaces = bundle.source_base_paths.clone();
        if !bundle.name.is_empty() && !namespaces.contains_key(&bundle.name) {
            if let Some(base) = &bundle.base_path {
                namespaces.insert(bundle.name.clone(), base.clone());
            }
        }
        Self {
            namespaces,
            context: bundle.context.clone(),
            base_path: bundle.base_path.clone(),
        }
    }

    /// Register an extra namespace -> base-location pair.
    pub fn register_namespace(&mut self, name: impl Into<String>, base: PathBuf) {
        self.namespaces.insert(name.into(), base);
    }

    /// Resolve a mention (with `@` prefix) to an existing file path.
    pub fn resolve(&self, mention: &str) -> Option<PathBuf> {
        let body = mention.strip_prefix('@')?;

        if let Some((namespace, rel)) = body.split_once(':') {
            // Context entries registered under the composed, namespaced key
            if let Some(path) = self.context.get(body) {
                if path.exists() {
                    return Some(path.clone());
                }
            }

            let base = self.namespaces.get(namespace)?;
            return first_existing(&[
                base.join(rel),
                base.join(format!("{rel}.md")),
                base.join("context").join(rel),
                base.join("context").join(format!("{rel}.md")),
            ]);
        }

        let base = self.base_path.as_deref()?;
        first_existing(&[base.join(body), base.join(format!("{body}.md"))])
    }

    /// Known namespaces, for diagnostics.
    pub fn namespaces(&self) -> impl Iterator<Item = (&String, &PathBuf)> {
        self.namespaces.iter()
    }
}

fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.exists()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, MentionResolver) {
        let dir = tempfile::tempdir().unwrap();
        let ns_root = dir.path().join("foundation");
        std::fs::create_dir_all(ns_root.join("context")).unwrap();
        std::fs::write(ns_root.join("context/philosophy.md"), "# Philosophy").unwrap();
        std::fs::write(ns_root.join("NOTES.md"), "notes").unwrap();

        let own_root = dir.path().join("app");
        std::fs::create_dir_all(&own_root).unwrap();
        std::fs::write(own_root.join("README.md"), "readme").unwrap();

        let mut resolver = MentionResolver {
            base_path: Some(own_root),
            ..MentionResolver::default()
        };
        resolver.register_namespace("foundation", ns_root);
        (dir, resolver)
    }

    #[test]
    fn test_resolves_context_directory_convention() {
        let (_dir, resolver) = fixture();
        let path = resolver.resolve("@foundation:philosophy").unwrap();
        assert!(path.ends_with("foundation/context/philosophy.md"));
    }

    #[test]
    fn test_resolves_path_relative_to_namespace_root() {
        let (_dir, resolver) = fixture();
        let path = resolver.resolve("@foundation:NOTES.md").unwrap();
        assert!(path.ends_with("foundation/NOTES.md"));
    }

    #[test]
    fn test_resolves_bare_mention_against_base_path() {
        let (_dir, resolver) = fixture();
        let path = resolver.resolve("@README.md").unwrap();
        assert!(path.ends_with("app/README.md"));
    }

    #[test]
    fn test_unknown_namespace_is_none() {
        let (_dir, resolver) = fixture();
        assert!(resolver.resolve("@ghost:anything").is_none());
    }

    #[test]
    fn test_missing_file_is_none() {
        let (_dir, resolver) = fixture();
        assert!(resolver.resolve("@foundation:absent").is_none());
    }

    #[test]
    fn test_from_bundle_includes_own_name() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = Bundle {
            name: "own".to_string(),
            base_path: Some(dir.path().to_path_buf()),
            ..Bundle::default()
        };
        let resolver = MentionResolver::from_bundle(&bundle);
        assert!(resolver.namespaces().any(|(name, _)| name == "own"));
    }
}
