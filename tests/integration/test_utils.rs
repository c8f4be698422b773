//! Shared test utilities for integration tests
//!
//! Artifact builders, a directory-backed release mirror and isolation for tests
//! that touch process-wide state (environment variables, child processes).

use stageloader::archive::{ArtifactHeader, EntryTree, HEADER_ENTRY};
use stageloader::checksum;
use stageloader::update::{DiffAsset, Release};
use stageloader::version::Version;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;

pub const NAMESPACE: &str = "stageloader";

/// Global mutex serializing environment access and helper-process spawns
static ENV_MUTEX: Mutex<()> = Mutex::new(());

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
}

/// Artifact archive for `package` at `version`, with one payload file
pub fn artifact(package: &str, version: &str, payload: &str) -> Vec<u8> {
    let mut tree = EntryTree::new();
    tree.insert(
        HEADER_ENTRY.to_string(),
        ArtifactHeader::new(package, version).render().into_bytes(),
    );
    tree.insert("payload.txt".to_string(), payload.as_bytes().to_vec());
    tree.to_bytes().unwrap()
}

/// Archive without any header
pub fn headerless_artifact(payload: &str) -> Vec<u8> {
    let mut tree = EntryTree::new();
    tree.insert("payload.txt".to_string(), payload.as_bytes().to_vec());
    tree.to_bytes().unwrap()
}

/// Place `content` where a directory search root embeds the next stage
pub fn embed_in_directory(root: &Path, stage_dir: &str, content: &[u8]) -> PathBuf {
    let path = root
        .join(NAMESPACE)
        .join("loader")
        .join(stage_dir)
        .join("stage-next.pkg");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    path
}

/// Package archive at `path` embedding `content` as the next stage
pub fn embed_in_package(path: &Path, stage_dir: &str, content: &[u8]) {
    let mut package = EntryTree::new();
    package.insert(
        format!("{}/loader/{}/stage-next.pkg", NAMESPACE, stage_dir),
        content.to_vec(),
    );
    std::fs::write(path, package.to_bytes().unwrap()).unwrap();
}

/// Directory laid out like a `file://` update service
pub struct Mirror {
    dir: TempDir,
}

impl Mirror {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("file://{}", self.dir.path().display())
    }

    /// Serve `content` as the latest `package` release on the stable branch
    pub fn publish(&self, package: &str, version: &str, content: &[u8], diffs: Vec<DiffAsset>) {
        let file = format!("{}-{}.pkg", package, version);
        std::fs::write(self.dir.path().join(&file), content).unwrap();
        let release = Release {
            version: Version::new(version),
            checksum: checksum::of_bytes(content).to_string(),
            url: file,
            diffs,
        };
        let document = self.dir.path().join(package).join("stable.json");
        std::fs::create_dir_all(document.parent().unwrap()).unwrap();
        std::fs::write(document, serde_json::to_string(&release).unwrap()).unwrap();
    }

    /// Store a diff archive and describe it as applying to `from`
    pub fn diff(&self, name: &str, from: &[u8], diff: &[u8]) -> DiffAsset {
        std::fs::write(self.dir.path().join(name), diff).unwrap();
        DiffAsset {
            from_checksum: checksum::of_bytes(from).to_string(),
            url: name.to_string(),
        }
    }
}

/// Run `f` with XDG_CONFIG_HOME pointing into `test_dir`, restoring it afterwards
pub fn with_xdg_config<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = env_lock();
    let original = std::env::var_os("XDG_CONFIG_HOME");
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path());

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

    match original {
        Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
        None => std::env::remove_var("XDG_CONFIG_HOME"),
    }
    match result {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
