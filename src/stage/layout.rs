//! On-disk layout of a stage's artifacts.
//!
//! ```text
//! <gameDir>/<namespace>/loader/<stageDir>/<variant>/
//!     current.pkg          the artifact that gets loaded
//!     current.update.pkg   pending update, moved over current.pkg before load
//!     current.pkg.meta     version and checksum recorded by the remote updater
//!     current.pkg.state    pending prompt-before-install decision
//! ```

use crate::error::LoaderError;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const CURRENT_FILE: &str = "current.pkg";
pub const PENDING_UPDATE_FILE: &str = "current.update.pkg";
pub const META_FILE: &str = "current.pkg.meta";
pub const STATE_FILE: &str = "current.pkg.state";

/// File name of the next stage's artifact when embedded in a search root
pub const EMBEDDED_FILE: &str = "stage-next.pkg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageLayout {
    dir: PathBuf,
}

impl StageLayout {
    pub fn new(game_dir: &Path, namespace: &str, stage_dir: &str, variant: &str) -> Self {
        Self {
            dir: game_dir
                .join(namespace)
                .join("loader")
                .join(stage_dir)
                .join(variant),
        }
    }

    /// Logical path of the embedded artifact on a search root
    pub fn embedded_resource(namespace: &str, stage_dir: &str) -> String {
        format!("{}/loader/{}/{}", namespace, stage_dir, EMBEDDED_FILE)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current(&self) -> PathBuf {
        self.dir.join(CURRENT_FILE)
    }

    pub fn pending_update(&self) -> PathBuf {
        self.dir.join(PENDING_UPDATE_FILE)
    }

    pub fn meta_file(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    pub fn state_file(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    pub fn ensure_dir(&self) -> Result<(), LoaderError> {
        fs::create_dir_all(&self.dir).map_err(|e| LoaderError::io(&self.dir, e))
    }

    /// Move a pending update over the current artifact. Returns whether there was one.
    ///
    /// The current file is removed first and the update renamed into its place; the
    /// running artifact's file is never written to.
    pub fn consume_pending_update(&self) -> Result<bool, LoaderError> {
        let pending = self.pending_update();
        if !pending.is_file() {
            return Ok(false);
        }

        let current = self.current();
        info!(
            pending = %pending.display(),
            current = %current.display(),
            "Found pending update, replacing current artifact"
        );
        match fs::remove_file(&current) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(LoaderError::io(&current, e)),
        }
        fs::rename(&pending, &current).map_err(|e| LoaderError::io(&pending, e))?;
        Ok(true)
    }

    /// Replace the current artifact with `content`
    pub fn install_current(&self, content: &[u8]) -> Result<(), LoaderError> {
        self.ensure_dir()?;
        write_atomic(&self.current(), content)
    }
}

/// Write `content` to a temp file beside `path`, then rename it over `path`
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<(), LoaderError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix("stage-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| LoaderError::io(dir, e))?;
    temp.write_all(content)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| LoaderError::io(path, e))?;
    temp.persist(path)
        .map_err(|e| LoaderError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let layout = StageLayout::new(Path::new("/game"), "essential", "stage2", "fabric");
        assert_eq!(
            layout.current(),
            PathBuf::from("/game/essential/loader/stage2/fabric/current.pkg")
        );
        assert_eq!(
            layout.pending_update(),
            PathBuf::from("/game/essential/loader/stage2/fabric/current.update.pkg")
        );
        assert_eq!(
            StageLayout::embedded_resource("essential", "stage2"),
            "essential/loader/stage2/stage-next.pkg"
        );
    }

    #[test]
    fn test_consume_pending_update_replaces_current() {
        let temp = TempDir::new().unwrap();
        let layout = StageLayout::new(temp.path(), "ns", "stage1", "default");
        layout.ensure_dir().unwrap();
        fs::write(layout.current(), b"old").unwrap();
        fs::write(layout.pending_update(), b"new").unwrap();

        assert!(layout.consume_pending_update().unwrap());
        assert!(!layout.pending_update().exists());
        assert_eq!(fs::read(layout.current()).unwrap(), b"new");
        assert!(!layout.consume_pending_update().unwrap());
    }

    #[test]
    fn test_consume_pending_update_without_current() {
        let temp = TempDir::new().unwrap();
        let layout = StageLayout::new(temp.path(), "ns", "stage1", "default");
        layout.ensure_dir().unwrap();
        fs::write(layout.pending_update(), b"first").unwrap();

        assert!(layout.consume_pending_update().unwrap());
        assert_eq!(fs::read(layout.current()).unwrap(), b"first");
    }

    #[test]
    fn test_install_current_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let layout = StageLayout::new(temp.path(), "ns", "stage1", "default");
        layout.install_current(b"one").unwrap();
        layout.install_current(b"two").unwrap();

        assert_eq!(fs::read(layout.current()).unwrap(), b"two");
        let names: Vec<_> = fs::read_dir(layout.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(CURRENT_FILE)]);
    }
}
