//! Source reference parsing
//!
//! This module parses source reference strings into structured descriptors:
//! - Git repositories: `git+https://github.com/org/repo@v1.0.0#subdirectory=bundles/core`
//! - Archives: `zip+https://example.com/bundle.zip`, `zip+file:///local/archive.zip`
//! - Local paths: `file:///abs/path`, `/abs/path`, `./relative`, `~/home-relative`
//! - Registry names: `foundation`, `foundation/providers/anthropic`
//!
//! Both the `#subdirectory=` fragment and the legacy `@ref/subpath` form select
//! a directory inside the fetched content; the fragment wins when both are given.

use crate::error::{MountplanError, Result};

/// Scheme family of a parsed reference, used to select a source handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemeFamily {
    /// Version-control remote (`git+https`, `git+ssh`, `git+file`)
    Git,
    /// Archive over network or local file (`zip+https`, `zip+file`)
    Archive,
    /// Local filesystem path (`file://`, absolute, relative, `~`)
    File,
    /// Bare name resolved through the discovery registry
    Registry,
}

impl SchemeFamily {
    /// Short label used in cache keys and log lines
    pub fn label(self) -> &'static str {
        match self {
            SchemeFamily::Git => "git",
            SchemeFamily::Archive => "zip",
            SchemeFamily::File => "file",
            SchemeFamily::Registry => "registry",
        }
    }
}

/// Parsed source reference. Two refs with identical fields denote the same
/// resolution target; `cache_key` is the normalized form used by the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedSourceRef {
    /// Scheme family (handler selector)
    pub scheme: SchemeFamily,
    /// Transport qualifier for remote schemes (`https`, `http`, `ssh`, `file`)
    pub transport: String,
    /// Host for remote schemes (e.g. `github.com`), empty otherwise
    pub host: String,
    /// Repository / archive / filesystem path
    pub path: String,
    /// Version reference (branch, tag, or commit id)
    pub reference: Option<String>,
    /// Directory selected inside the fetched content
    pub subpath: Option<String>,
}

impl ParsedSourceRef {
    /// Parse a source reference string.
    ///
    /// Fails with `InvalidReference` when the scheme is unrecognized or the
    /// reference cannot be split into its components.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if input.is_empty() {
            return Err(MountplanError::invalid_reference(input, "empty reference"));
        }

        if let Some(rest) = input.strip_prefix("git+") {
            return parse_transport_ref(input, rest, SchemeFamily::Git);
        }

        if let Some(rest) = input.strip_prefix("zip+") {
            return parse_transport_ref(input, rest, SchemeFamily::Archive);
        }

        if let Some(rest) = input.strip_prefix("file://") {
            let (path, subpath) = split_fragment(rest);
            if path.is_empty() {
                return Err(MountplanError::invalid_reference(input, "empty file path"));
            }
            return Ok(ParsedSourceRef {
                scheme: SchemeFamily::File,
                transport: String::new(),
                host: String::new(),
                path: path.to_string(),
                reference: None,
                subpath,
            });
        }

        if is_local_path(input) {
            return Ok(ParsedSourceRef {
                scheme: SchemeFamily::File,
                transport: String::new(),
                host: String::new(),
                path: input.to_string(),
                reference: None,
                subpath: None,
            });
        }

        // A bare URL without a git+/zip+ qualifier is not resolvable: we
        // cannot tell a repository from an archive from a web page.
        if input.contains("://") {
            let scheme = input.split("://").next().unwrap_or("");
            return Err(MountplanError::invalid_reference(
                input,
                format!("unrecognized scheme '{scheme}'"),
            ));
        }

        // Bare name, optionally with a subpath: resolved through discovery
        let (name, subpath) = match input.split_once('/') {
            Some((name, sub)) => (name, Some(sub.to_string())),
            None => (input, None),
        };
        Ok(ParsedSourceRef {
            scheme: SchemeFamily::Registry,
            transport: String::new(),
            host: String::new(),
            path: name.to_string(),
            reference: None,
            subpath,
        })
    }

    /// Normalized key identifying this resolution target in the cache.
    pub fn cache_key(&self) -> String {
        let mut key = format!(
            "{}+{}://{}{}",
            self.scheme.label(),
            self.transport,
            self.host,
            self.path
        );
        key.push('@');
        key.push_str(self.reference.as_deref().unwrap_or("HEAD"));
        if let Some(sub) = &self.subpath {
            key.push('#');
            key.push_str(sub);
        }
        key
    }

    /// True when the version reference denotes an immutable object
    /// (a full 40-character commit id). Pinned refs cache indefinitely.
    pub fn is_pinned(&self) -> bool {
        self.scheme == SchemeFamily::Git
            && self
                .reference
                .as_deref()
                .is_some_and(|r| r.len() == 40 && r.chars().all(|c| c.is_ascii_hexdigit()))
    }

    /// True when resolving this reference requires a fetch (and is cacheable).
    pub fn is_remote(&self) -> bool {
        matches!(self.scheme, SchemeFamily::Git | SchemeFamily::Archive)
    }

    /// URL passed to the underlying transport for remote schemes.
    ///
    /// `git+https://github.com/org/repo` -> `https://github.com/org/repo`,
    /// `zip+file:///archive.zip` -> `/archive.zip` (plain path).
    pub fn remote_url(&self) -> String {
        if self.transport == "file" {
            self.path.clone()
        } else {
            format!("{}://{}{}", self.transport, self.host, self.path)
        }
    }
}

/// Check whether the input uses a local path marker.
fn is_local_path(input: &str) -> bool {
    input.starts_with('/')
        || input.starts_with("./")
        || input.starts_with("../")
        || input.starts_with("~/")
        || input == "~"
        || input == "."
        || input == ".."
}

/// Split a `#subdirectory=` fragment off a reference tail.
fn split_fragment(input: &str) -> (&str, Option<String>) {
    match input.split_once('#') {
        Some((head, fragment)) => (head, subdirectory_from_fragment(fragment)),
        None => (input, None),
    }
}

/// Extract the `subdirectory=` value from a URL fragment.
fn subdirectory_from_fragment(fragment: &str) -> Option<String> {
    fragment
        .split('&')
        .find_map(|part| part.strip_prefix("subdirectory="))
        .filter(|sub| !sub.is_empty())
        .map(str::to_string)
}

/// Parse a `git+` or `zip+` reference after its family prefix.
fn parse_transport_ref(original: &str, rest: &str, scheme: SchemeFamily) -> Result<ParsedSourceRef> {
    let (rest, fragment_subpath) = split_fragment(rest);

    let Some((transport, remainder)) = rest.split_once("://") else {
        return Err(MountplanError::invalid_reference(
            original,
            "missing transport qualifier (expected e.g. git+https://... or zip+file://...)",
        ));
    };
    if transport.is_empty() || !transport.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(MountplanError::invalid_reference(
            original,
            format!("invalid transport '{transport}'"),
        ));
    }

    let (host, path) = match remainder.find('/') {
        Some(slash) => (&remainder[..slash], &remainder[slash..]),
        None => (remainder, ""),
    };
    if path.is_empty() {
        return Err(MountplanError::invalid_reference(
            original,
            "missing repository or archive path",
        ));
    }

    // @ref may carry a legacy /subpath tail: org/repo@main/bundles/core
    let (path, reference, legacy_subpath) = match path.find('@') {
        Some(at) => {
            let (head, tail) = (&path[..at], &path[at + 1..]);
            let (reference, legacy) = match tail.split_once('/') {
                Some((r, sub)) => (r, Some(sub.to_string())),
                None => (tail, None),
            };
            if reference.is_empty() {
                return Err(MountplanError::invalid_reference(
                    original,
                    "empty version reference after '@'",
                ));
            }
            (head, Some(reference.to_string()), legacy)
        }
        None => (path, None, None),
    };

    // Explicit #subdirectory= wins over the legacy @ref/subpath form
    let subpath = fragment_subpath.or(legacy_subpath);

    Ok(ParsedSourceRef {
        scheme,
        transport: transport.to_string(),
        host: host.to_string(),
        path: path.to_string(),
        reference,
        subpath,
    })
}
