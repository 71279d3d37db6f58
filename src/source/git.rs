//! Git source handler
//!
//! Clones repositories at a requested ref. Branch/tag refs get a shallow
//! clone where the transport allows it; pinned commit refs need history, so
//! they get a full clone followed by a detached checkout. Authentication is
//! delegated to git's native credential system (SSH keys from `~/.ssh/`,
//! credential helpers).
//!
//! All libgit2 work is blocking and runs on the blocking thread pool.

use std::path::Path;

use async_trait::async_trait;
use git2::build::RepoBuilder;
use git2::{Cred, CredentialType, FetchOptions, RemoteCallbacks, Repository};
use tracing::debug;

use crate::error::{MountplanError, Result};
use crate::uri::{ParsedSourceRef, SchemeFamily};

use super::{Resolution, SourceHandler};

/// Handler for `git+https`, `git+ssh`, and `git+file` references.
pub struct GitHandler;

impl GitHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GitHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceHandler for GitHandler {
    fn scheme(&self) -> SchemeFamily {
        SchemeFamily::Git
    }

    async fn resolve(&self, parsed: &ParsedSourceRef, staging: &Path) -> Result<Resolution> {
        let subpath = parsed.subpath.clone();
        let parsed = parsed.clone();
        let dest = staging.to_path_buf();

        tokio::task::spawn_blocking(move || clone_at_ref(&parsed, &dest))
            .await
            .map_err(|e| MountplanError::source_unavailable("git", e.to_string()))??;

        Ok(Resolution::Staged { subpath })
    }
}

/// Clone `parsed` into `dest` and leave the working tree at the requested ref.
fn clone_at_ref(parsed: &ParsedSourceRef, dest: &Path) -> Result<()> {
    let url = parsed.remote_url();
    // Pinned commits may not be reachable from any branch tip, so shallow
    // clones only apply when no explicit ref was requested.
    let shallow = parsed.reference.is_none() && parsed.transport != "file";
    debug!(url = %url, shallow, reference = ?parsed.reference, "cloning git source");

    let repo = clone(&url, dest, shallow)?;

    if let Some(reference) = &parsed.reference {
        let sha = resolve_ref(&repo, reference).ok_or_else(|| {
            MountplanError::reference_not_found(
                &url,
                format!("ref '{reference}' not found in repository"),
            )
        })?;
        checkout_commit(&repo, &sha)
            .map_err(|e| MountplanError::source_unavailable(&url, e.message().to_string()))?;
    }

    Ok(())
}

/// Clone a repository, with git's native credential chain on the callbacks.
fn clone(url: &str, dest: &Path, shallow: bool) -> Result<Repository> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(credential_callback);

    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(callbacks);
    if shallow {
        fetch_options.depth(1);
    }

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_options);
    builder
        .clone(url, dest)
        .map_err(|e| MountplanError::source_unavailable(url, e.message().to_string()))
}

fn credential_callback(
    _url: &str,
    username_from_url: Option<&str>,
    allowed: CredentialType,
) -> std::result::Result<Cred, git2::Error> {
    if allowed.contains(CredentialType::SSH_KEY) {
        let username = username_from_url.unwrap_or("git");
        if let Ok(cred) = Cred::ssh_key_from_agent(username) {
            return Ok(cred);
        }
        let ssh_dir = dirs::home_dir().unwrap_or_default().join(".ssh");
        for key_name in &["id_ed25519", "id_rsa", "id_ecdsa"] {
            let private_key = ssh_dir.join(key_name);
            if private_key.exists() {
                return Cred::ssh_key(username, None, &private_key, None);
            }
        }
    }
    Cred::default()
}

/// Resolve a ref name (branch, tag, or commit id) to a full commit sha.
fn resolve_ref(repo: &Repository, reference: &str) -> Option<String> {
    let candidates = [
        reference.to_string(),
        format!("refs/heads/{reference}"),
        format!("refs/tags/{reference}"),
        format!("refs/remotes/origin/{reference}"),
    ];

    for candidate in &candidates {
        if let Ok(found) = repo.find_reference(candidate) {
            if let Ok(commit) = found.peel_to_commit() {
                return Some(commit.id().to_string());
            }
        }
    }

    // Direct commit id, including abbreviated forms
    if let Ok(object) = repo.revparse_single(reference) {
        if let Ok(commit) = object.peel_to_commit() {
            return Some(commit.id().to_string());
        }
    }

    None
}

/// Check out a commit on a detached HEAD, forcing the working tree.
fn checkout_commit(repo: &Repository, sha: &str) -> std::result::Result<(), git2::Error> {
    let oid = git2::Oid::from_str(sha)?;
    let commit = repo.find_commit(oid)?;
    repo.set_head_detached(commit.id())?;

    let mut checkout = git2::build::CheckoutBuilder::new();
    checkout.force();
    repo.checkout_head(Some(&mut checkout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn init_repo_with_commit(dir: &Path) -> (Repository, String) {
        let repo = Repository::init(dir).unwrap();
        std::fs::write(dir.join("bundle.md"), "---\nbundle: {name: seed}\n---\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("bundle.md")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let sha = {
            let tree = repo.find_tree(tree_id).unwrap();
            let sig = git2::Signature::now("test", "test@example.com").unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
                .unwrap()
                .to_string()
        };
        (repo, sha)
    }

    #[test]
    fn test_resolve_ref_finds_head_commit() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, sha) = init_repo_with_commit(dir.path());
        assert_eq!(resolve_ref(&repo, &sha), Some(sha.clone()));
        assert_eq!(resolve_ref(&repo, "HEAD"), Some(sha));
        assert_eq!(resolve_ref(&repo, "no-such-branch"), None);
    }

    #[tokio::test]
    async fn test_clone_local_repo_at_ref() {
        let src = tempfile::tempdir().unwrap();
        let (_repo, sha) = init_repo_with_commit(src.path());

        let dest = tempfile::tempdir().unwrap();
        let staging = dest.path().join("clone");
        std::fs::create_dir(&staging).unwrap();

        let parsed = ParsedSourceRef {
            scheme: SchemeFamily::Git,
            transport: "file".to_string(),
            host: String::new(),
            path: src.path().display().to_string(),
            reference: Some(sha),
            subpath: None,
        };

        let handler = GitHandler::new();
        let resolution = handler.resolve(&parsed, &staging).await.unwrap();
        assert!(matches!(resolution, Resolution::Staged { .. }));
        assert!(staging.join("bundle.md").exists());
    }

    #[tokio::test]
    async fn test_missing_ref_is_reference_not_found() {
        let src = tempfile::tempdir().unwrap();
        init_repo_with_commit(src.path());

        let dest = tempfile::tempdir().unwrap();
        let staging = dest.path().join("clone");
        std::fs::create_dir(&staging).unwrap();

        let parsed = ParsedSourceRef {
            scheme: SchemeFamily::Git,
            transport: "file".to_string(),
            host: String::new(),
            path: src.path().display().to_string(),
            reference: Some("no-such-ref".to_string()),
            subpath: None,
        };

        let err = GitHandler::new()
            .resolve(&parsed, &staging)
            .await
            .unwrap_err();
        assert!(matches!(err, MountplanError::ReferenceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_source_unavailable() {
        let dest = tempfile::tempdir().unwrap();
        let staging = dest.path().join("clone");
        std::fs::create_dir(&staging).unwrap();

        let parsed = ParsedSourceRef {
            scheme: SchemeFamily::Git,
            transport: "file".to_string(),
            host: String::new(),
            path: PathBuf::from("/no/such/repo").display().to_string(),
            reference: None,
            subpath: None,
        };

        let err = GitHandler::new()
            .resolve(&parsed, &staging)
            .await
            .unwrap_err();
        assert!(matches!(err, MountplanError::SourceUnavailable { .. }));
    }
}
