//! Recursive mention loading with deduplication
//!
//! Content loaded for a mention may itself contain mentions; expansion
//! recurses up to [`MAX_MENTION_DEPTH`]. A visited set of canonical paths
//! plus a content fingerprint guarantees a file is injected at most once per
//! pass, even when referenced through different namespace aliases.
//!
//! Mentions are best-effort enrichment: unresolvable ones degrade to
//! warnings and are skipped. A bundle that marks its mentions as required
//! turns those failures into load errors instead - only for the mentions in
//! its own instruction text, not for nested ones.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use tracing::warn;

use crate::error::{MountplanError, Result};
use crate::fsio;

use super::parser::parse_mentions;
use super::resolver::MentionResolver;
use super::{ContextFile, MentionResult};

/// Maximum nested-mention expansion depth.
pub const MAX_MENTION_DEPTH: usize = 10;

/// Collects unique mention content across one resolution pass.
#[derive(Debug, Default)]
pub struct ContentDeduplicator {
    seen_paths: HashSet<PathBuf>,
    seen_fingerprints: HashSet<String>,
    files: Vec<ContextFile>,
}

impl ContentDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file. Returns `false` when the file (by canonical path or by
    /// content fingerprint) was already collected.
    pub fn add_file(&mut self, path: &Path, content: &str) -> bool {
        let canonical = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if !self.seen_paths.insert(canonical.clone()) {
            return false;
        }

        let fingerprint = blake3::hash(content.as_bytes()).to_hex().to_string();
        if !self.seen_fingerprints.insert(fingerprint.clone()) {
            return false;
        }

        self.files.push(ContextFile {
            path: canonical,
            content: content.to_string(),
            fingerprint,
        });
        true
    }

    /// Unique files collected, in first-seen order.
    pub fn unique_files(&self) -> &[ContextFile] {
        &self.files
    }
}

/// Load all mentions in `text`, recursively expanding nested mentions.
///
/// With `required` set, an unresolvable top-level mention fails the load
/// with `BundleLoad`; otherwise it is skipped with a warning.
pub async fn load_mentions(
    text: &str,
    resolver: &MentionResolver,
    deduplicator: &mut ContentDeduplicator,
    required: bool,
) -> Result<Vec<MentionResult>> {
    let mut results = Vec::new();
    for mention in parse_mentions(text) {
        let result = resolve_mention(&mention, resolver, deduplicator, required, 0).await?;
        results.push(result);
    }
    Ok(results)
}

fn resolve_mention<'a>(
    mention: &'a str,
    resolver: &'a MentionResolver,
    deduplicator: &'a mut ContentDeduplicator,
    required: bool,
    depth: usize,
) -> BoxFuture<'a, Result<MentionResult>> {
    Box::pin(async move {
        let Some(path) = resolver.resolve(mention) else {
            if required {
                return Err(MountplanError::bundle_load(format!(
                    "required mention '{mention}' could not be resolved"
                )));
            }
            warn!(mention = %mention, "mention did not resolve, skipping");
            return Ok(MentionResult {
                mention: mention.to_string(),
                resolved_path: None,
                content: None,
            });
        };

        let content = match fsio::read_with_retry(&path).await {
            Ok(content) => content,
            Err(err) => {
                if required {
                    return Err(MountplanError::bundle_load(format!(
                        "required mention '{mention}' failed to load: {err}"
                    )));
                }
                warn!(mention = %mention, %err, "mention content unreadable, skipping");
                return Ok(MentionResult {
                    mention: mention.to_string(),
                    resolved_path: Some(path),
                    content: None,
                });
            }
        };

        if !deduplicator.add_file(&path, &content) {
            // Already injected in this pass; keep the reference, drop the body
            return Ok(MentionResult {
                mention: mention.to_string(),
                resolved_path: Some(path),
                content: None,
            });
        }

        if depth < MAX_MENTION_DEPTH {
            for nested in parse_mentions(&content) {
                // Nested mentions are always opportunistic
                resolve_mention(&nested, resolver, deduplicator, false, depth + 1).await?;
            }
        }

        Ok(MentionResult {
            mention: mention.to_string(),
            resolved_path: Some(path),
            content: Some(content),
        })
    })
}

/// Render collected context files as an attributed block prepended to the
/// instruction text.
pub fn format_context_block(files: &[ContextFile]) -> String {
    if files.is_empty() {
        return String::new();
    }

    let mut out = String::from("<context>\n");
    for file in files {
        out.push_str(&format!("<file path=\"{}\">\n", file.path.display()));
        out.push_str(file.content.trim_end());
        out.push_str("\n</file>\n");
    }
    out.push_str("</context>");
    out
}
