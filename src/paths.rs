//! Cross-platform path utilities
//!
//! Expands `~` against the user's home directory, resolves relative references
//! against a supplied base directory, and produces canonical paths with
//! consistent symlink handling (dunce avoids Windows UNC surprises).

use std::path::{Path, PathBuf};

use crate::error::{MountplanError, Result};

/// Expand a leading `~` to the user's home directory.
///
/// Paths without a `~` prefix are returned unchanged.
pub fn expand_tilde(input: &str) -> PathBuf {
    if input == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = input.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(input)
}

/// Resolve a path string to an absolute path.
///
/// `~` expands to the home directory; relative paths resolve against `base`.
pub fn resolve_path(input: &str, base: &Path) -> PathBuf {
    let expanded = expand_tilde(input);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

/// Canonicalize an existing path, failing with `SourceUnavailable` otherwise.
pub fn canonicalize(path: &Path) -> Result<PathBuf> {
    dunce::canonicalize(path).map_err(|e| {
        MountplanError::source_unavailable(path.display().to_string(), e.to_string())
    })
}

/// Make a reference slug safe for filesystem use.
///
/// Replaces separators and other unsafe characters with hyphens, collapses
/// runs, and trims the ends. Returns "source" if nothing survives.
pub fn make_path_safe(name: &str) -> String {
    const UNSAFE: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '@', '#', '+'];

    let mut out = String::with_capacity(name.len());
    let mut last_hyphen = true;
    for c in name.chars() {
        if UNSAFE.contains(&c) || c.is_whitespace() {
            if !last_hyphen {
                out.push('-');
                last_hyphen = true;
            }
        } else {
            out.push(c);
            last_hyphen = false;
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "source".to_string()
    } else {
        trimmed.to_string()
    }
}
