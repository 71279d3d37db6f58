//! Common test utilities for mountplan integration tests

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mountplan::cache::CachePolicy;
use mountplan::source::HandlerRegistry;
use mountplan::{BundleLoader, Discovery, SourceCache};
use tempfile::TempDir;

/// A test workspace holding bundle fixtures and an isolated cache.
pub struct TestWorkspace {
    /// Temporary directory
    #[allow(dead_code)]
    pub temp: TempDir,
    /// Path to workspace root
    pub path: PathBuf,
    /// Shared discovery registry, pre-wired into [`TestWorkspace::loader`]
    pub discovery: Arc<Discovery>,
    cache: Arc<SourceCache>,
}

/// Install a test subscriber honoring `RUST_LOG`; safe to call repeatedly.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl TestWorkspace {
    /// Create a new test workspace with its own cache directory.
    pub fn new() -> Self {
        init_tracing();
        let temp = TempDir::new().expect("failed to create temp directory");
        let path = temp.path().to_path_buf();
        let handlers = HandlerRegistry::with_defaults(path.clone());
        let cache = Arc::new(SourceCache::new(
            path.join(".cache"),
            handlers,
            CachePolicy::default(),
        ));
        Self {
            temp,
            path,
            discovery: Arc::new(Discovery::new()),
            cache,
        }
    }

    /// Loader over this workspace's cache and discovery.
    pub fn loader(&self) -> BundleLoader {
        BundleLoader::new(self.cache.clone(), self.discovery.clone())
    }

    /// Write a bundle definition under `bundles/<name>/bundle.md` and return
    /// its directory. `header` is inserted verbatim after the bundle block.
    pub fn write_bundle(&self, name: &str, header: &str, body: &str) -> PathBuf {
        let dir = self.path.join("bundles").join(name);
        std::fs::create_dir_all(&dir).expect("failed to create bundle directory");
        let content = format!("---\nbundle:\n  name: {name}\n{header}---\n{body}");
        std::fs::write(dir.join("bundle.md"), content).expect("failed to write bundle.md");
        dir
    }

    /// Write an arbitrary file relative to the workspace root.
    #[allow(dead_code)]
    pub fn write_file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent directory");
        }
        std::fs::write(&path, content).expect("failed to write file");
        path
    }

    /// Absolute reference string for a bundle created with `write_bundle`.
    pub fn bundle_ref(&self, name: &str) -> String {
        self.path.join("bundles").join(name).display().to_string()
    }
}

/// Create a zip archive of a directory tree, one file per entry.
#[allow(dead_code)]
pub fn zip_directory(dir: &Path, archive_path: &Path) {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    let file = std::fs::File::create(archive_path).expect("failed to create archive");
    let mut writer = zip::ZipWriter::new(file);
    add_dir_entries(&mut writer, dir, dir);
    writer.finish().expect("failed to finish archive");

    fn add_dir_entries(
        writer: &mut zip::ZipWriter<std::fs::File>,
        root: &Path,
        dir: &Path,
    ) {
        for entry in std::fs::read_dir(dir).expect("failed to read dir") {
            let entry = entry.expect("failed to read entry");
            let path = entry.path();
            let rel = path
                .strip_prefix(root)
                .expect("entry outside root")
                .to_string_lossy()
                .replace('\\', "/");
            if path.is_dir() {
                add_dir_entries(writer, root, &path);
            } else {
                writer
                    .start_file(rel, SimpleFileOptions::default())
                    .expect("failed to start archive entry");
                let content = std::fs::read(&path).expect("failed to read file");
                writer.write_all(&content).expect("failed to write entry");
            }
        }
    }
}
