//! Source cache
//!
//! Wraps the source handlers with a keyed store mapping normalized source
//! references to previously resolved directories.
//!
//! ## Cache structure
//!
//! ```text
//! ~/.cache/mountplan/sources/
//! └── <host-path-slug>/
//!     └── <key-digest>/
//!         └── <fetched content>
//! ```
//!
//! Pinned refs (full commit ids) cache indefinitely and are reused across
//! processes straight from disk. Mutable refs (branch names, archive URLs)
//! honor the configurable `CachePolicy::mutable_ttl` and can be refreshed
//! per key without touching other entries.
//!
//! Concurrent resolutions of the same key coalesce behind a per-key async
//! mutex: exactly one fetch runs, every waiter observes the published entry.
//! Fetches stage into a temp directory inside the cache root and are renamed
//! into place only on success, so a cancelled fetch never publishes a
//! partial entry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tracing::debug;

use crate::error::{MountplanError, Result};
use crate::paths;
use crate::source::{HandlerRegistry, Resolution, Resolved};
use crate::uri::ParsedSourceRef;

/// Staleness and timeout policy for the cache.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// TTL for mutable-ref entries. `None` (default) keeps an entry until a
    /// caller forces a refresh or invalidates the key. Pinned refs ignore
    /// the TTL entirely.
    pub mutable_ttl: Option<Duration>,
    /// Upper bound on a single fetch; exceeding it fails the resolution
    /// with `SourceUnavailable` instead of blocking indefinitely.
    pub fetch_timeout: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            mutable_ttl: None,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// A published cache entry. Never mutated - only replaced on invalidation.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Normalized source key
    pub key: String,
    /// Effective root after applying any subpath
    pub active_path: PathBuf,
    /// Root of the fetched content
    pub source_root: PathBuf,
    /// When the fetch completed
    pub resolved_at: SystemTime,
    /// Whether the key denotes an immutable object
    pub pinned: bool,
}

/// Keyed directory cache over the source handler registry.
pub struct SourceCache {
    root: PathBuf,
    policy: CachePolicy,
    handlers: HandlerRegistry,
    entries: Mutex<HashMap<String, CacheEntry>>,
    key_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Default cache root: `MOUNTPLAN_CACHE_DIR` or `<user cache dir>/mountplan/sources`.
pub fn default_cache_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("MOUNTPLAN_CACHE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let base = dirs::cache_dir().ok_or_else(|| MountplanError::Io {
        message: "could not determine user cache directory".to_string(),
    })?;
    Ok(base.join("mountplan").join("sources"))
}

impl SourceCache {
    /// Create a cache over `handlers`, storing fetched content under `root`.
    pub fn new(root: PathBuf, handlers: HandlerRegistry, policy: CachePolicy) -> Self {
        Self {
            root,
            policy,
            handlers,
            entries: Mutex::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Cache with default handlers, cache root, and policy; relative local
    /// paths resolve against `base_dir`.
    pub fn with_defaults(base_dir: PathBuf) -> Result<Self> {
        Ok(Self::new(
            default_cache_dir()?,
            HandlerRegistry::with_defaults(base_dir),
            CachePolicy::default(),
        ))
    }

    /// Resolve a parsed reference to a local directory, serving repeats of
    /// the same key from the cache.
    pub async fn resolve(&self, parsed: &ParsedSourceRef) -> Result<Resolved> {
        self.resolve_inner(parsed, false).await
    }

    /// Resolve a parsed reference, refetching this key even when cached.
    /// Other keys are unaffected.
    pub async fn resolve_fresh(&self, parsed: &ParsedSourceRef) -> Result<Resolved> {
        self.resolve_inner(parsed, true).await
    }

    /// Drop the entry for a key, removing its on-disk content.
    pub async fn invalidate(&self, parsed: &ParsedSourceRef) -> Result<()> {
        let key = parsed.cache_key();
        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        let removed = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(&key);
        let dir = self.entry_dir(parsed, &key);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        debug!(key = %key, existed = removed.is_some(), "invalidated cache entry");
        Ok(())
    }

    /// Drop every entry and remove all cached content.
    pub fn clear(&self) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }

    /// Currently published entry for a key, if any.
    pub fn entry(&self, parsed: &ParsedSourceRef) -> Option<CacheEntry> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&parsed.cache_key())
            .cloned()
    }

    async fn resolve_inner(&self, parsed: &ParsedSourceRef, force: bool) -> Result<Resolved> {
        // Local paths are used in place; there is nothing to cache.
        if !parsed.is_remote() {
            let handler = self.handlers.get(parsed.scheme)?;
            return match handler.resolve(parsed, &self.root).await? {
                Resolution::Direct(resolved) => Ok(resolved),
                Resolution::Staged { .. } => Err(MountplanError::source_unavailable(
                    parsed.cache_key(),
                    "local handler unexpectedly staged content",
                )),
            };
        }

        let key = parsed.cache_key();
        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        if !force {
            if let Some(entry) = self.lookup_valid(&key) {
                debug!(key = %key, "cache hit");
                return Ok(Resolved {
                    active_path: entry.active_path,
                    source_root: entry.source_root,
                });
            }
        }

        let final_dir = self.entry_dir(parsed, &key);

        // Pinned content already on disk from an earlier process is reusable
        // without refetching.
        if !force && parsed.is_pinned() && final_dir.is_dir() {
            debug!(key = %key, "reusing pinned content from disk");
            return self.publish(parsed, &key, final_dir);
        }

        self.fetch(parsed, &key, final_dir).await
    }

    async fn fetch(
        &self,
        parsed: &ParsedSourceRef,
        key: &str,
        final_dir: PathBuf,
    ) -> Result<Resolved> {
        std::fs::create_dir_all(&self.root)?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)?;

        let handler = self.handlers.get(parsed.scheme)?;
        debug!(key = %key, "fetching source");
        let resolution = tokio::time::timeout(
            self.policy.fetch_timeout,
            handler.resolve(parsed, staging.path()),
        )
        .await
        .map_err(|_| {
            MountplanError::source_unavailable(
                key,
                format!("fetch timed out after {:?}", self.policy.fetch_timeout),
            )
        })??;

        let subpath = match resolution {
            Resolution::Staged { subpath } => subpath,
            Resolution::Direct(resolved) => return Ok(resolved),
        };

        // Validate the subpath before publishing anything.
        if let Some(sub) = &subpath {
            if !staging.path().join(sub).exists() {
                return Err(MountplanError::reference_not_found(
                    key,
                    format!("subpath '{sub}' not found in fetched content"),
                ));
            }
        }

        if final_dir.exists() {
            std::fs::remove_dir_all(&final_dir)?;
        }
        if let Some(parent) = final_dir.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Past this point the fetch succeeded; move the staged content into
        // place and publish the entry. Cancellation can no longer tear it.
        let staged = staging.keep();
        if let Err(e) = std::fs::rename(&staged, &final_dir) {
            let _ = std::fs::remove_dir_all(&staged);
            return Err(e.into());
        }

        self.publish(parsed, key, final_dir)
    }

    fn publish(&self, parsed: &ParsedSourceRef, key: &str, final_dir: PathBuf) -> Result<Resolved> {
        let active_path = match &parsed.subpath {
            Some(sub) => {
                let candidate = final_dir.join(sub);
                if !candidate.exists() {
                    return Err(MountplanError::reference_not_found(
                        key,
                        format!("subpath '{sub}' not found in cached content"),
                    ));
                }
                candidate
            }
            None => final_dir.clone(),
        };

        let entry = CacheEntry {
            key: key.to_string(),
            active_path: active_path.clone(),
            source_root: final_dir.clone(),
            resolved_at: SystemTime::now(),
            pinned: parsed.is_pinned(),
        };
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), entry);

        Ok(Resolved {
            active_path,
            source_root: final_dir,
        })
    }

    fn lookup_valid(&self, key: &str) -> Option<CacheEntry> {
        let entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = entries.get(key)?;
        if !entry.pinned {
            if let Some(ttl) = self.policy.mutable_ttl {
                let age = entry.resolved_at.elapsed().unwrap_or(Duration::MAX);
                if age >= ttl {
                    debug!(key = %key, "mutable entry exceeded ttl");
                    return None;
                }
            }
        }
        entry.active_path.exists().then(|| entry.clone())
    }

    fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.key_locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    fn entry_dir(&self, parsed: &ParsedSourceRef, key: &str) -> PathBuf {
        let slug = paths::make_path_safe(&format!("{}{}", parsed.host, parsed.path));
        let digest = blake3::hash(key.as_bytes()).to_hex();
        self.root.join(slug).join(&digest.as_str()[..16])
    }
}
