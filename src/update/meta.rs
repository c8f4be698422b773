//! Sidecar files kept next to the current artifact.

use crate::checksum::ContentHash;
use crate::error::UpdateError;
use crate::version::Version;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Version and checksum of the artifact last installed by the updater
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub version: Version,
    pub checksum: String,
}

impl ArtifactMeta {
    pub fn load(path: &Path) -> Result<Option<Self>, UpdateError> {
        load_toml(path)
    }

    /// Load the meta, discarding it if it no longer describes `artifact_hash`
    pub fn load_verified(path: &Path, artifact_hash: &ContentHash) -> Option<Self> {
        let meta = match Self::load(path) {
            Ok(meta) => meta?,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable artifact meta");
                return None;
            }
        };
        if artifact_hash.matches(&meta.checksum) {
            Some(meta)
        } else {
            debug!(path = %path.display(), "Artifact meta is stale, discarding it");
            None
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), UpdateError> {
        save_toml(path, self)
    }
}

/// Prompt-before-install bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateState {
    /// Release waiting for a decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_update_version: Option<String>,

    /// The decision, once given. `true` without a pending version is blanket consent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_update_resolution: Option<bool>,
}

impl UpdateState {
    /// Load the state; a missing or unreadable file is an empty state
    pub fn load(path: &Path) -> Self {
        match load_toml(path) {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable update state");
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending_update_version.is_none() && self.pending_update_resolution.is_none()
    }

    /// Persist the state, removing the file when there is nothing to keep
    pub fn save(&self, path: &Path) -> Result<(), UpdateError> {
        if self.is_empty() {
            return match fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            };
        }
        save_toml(path, self)
    }
}

fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, UpdateError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    toml::from_str(&text)
        .map(Some)
        .map_err(|e| UpdateError::Metadata(format!("{}: {}", path.display(), e)))
}

fn save_toml<T: Serialize>(path: &Path, value: &T) -> Result<(), UpdateError> {
    let text = toml::to_string(value)
        .map_err(|e| UpdateError::Metadata(format!("{}: {}", path.display(), e)))?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix("tmp-")
        .suffix(".toml")
        .tempfile_in(dir)?;
    temp.write_all(text.as_bytes())?;
    temp.persist(path).map_err(|e| UpdateError::Io(e.error))?;
    Ok(())
}
