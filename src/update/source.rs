//! Where releases come from.

use crate::checksum::ContentHash;
use crate::error::UpdateError;
use crate::ui::LoaderUi;
use crate::version::Version;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

/// Latest release of a package on a branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub version: Version,
    pub checksum: String,
    pub url: String,
    /// Diffs that turn an older artifact into this release
    #[serde(default)]
    pub diffs: Vec<DiffAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffAsset {
    /// Checksum of the artifact the diff applies to
    pub from_checksum: String,
    pub url: String,
}

impl Release {
    /// A diff that applies to the artifact hashing to `local`
    pub fn diff_from(&self, local: &ContentHash) -> Option<&DiffAsset> {
        self.diffs.iter().find(|diff| local.matches(&diff.from_checksum))
    }

    pub(crate) fn validate(&self) -> Result<(), UpdateError> {
        if self.version.as_str().trim().is_empty() || self.checksum.trim().is_empty() {
            return Err(UpdateError::InvalidResponse(format!(
                "release is missing version or checksum (version={:?}, checksum={:?})",
                self.version.as_str(),
                self.checksum
            )));
        }
        if self.url.trim().is_empty() {
            return Err(UpdateError::InvalidResponse(format!(
                "release {} has no download url",
                self.version
            )));
        }
        Ok(())
    }
}

/// Update service client
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Latest release of `package` on `branch`, or `None` if this platform is not served
    async fn latest(&self, package: &str, branch: &str) -> Result<Option<Release>, UpdateError>;

    /// Download `url` into `dest`, reporting size and progress to `ui`. Returns the byte count.
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        ui: &mut dyn LoaderUi,
    ) -> Result<u64, UpdateError>;
}

const COPY_CHUNK: usize = 64 * 1024;

/// Releases served from a directory, laid out as
/// `<root>/<package>/<branch>.json` plus the files those documents point to.
///
/// Release urls are resolved relative to the root. Used for offline mirrors and
/// configured with a `file://` base url.
#[derive(Debug, Clone)]
pub struct LocalUpdateSource {
    root: PathBuf,
}

impl LocalUpdateSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Source for a `file://` url
    pub fn from_url(url: &str) -> Option<Self> {
        url.strip_prefix("file://").map(Self::new)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let relative = url.strip_prefix("file://").unwrap_or(url);
        let path = Path::new(relative);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl UpdateSource for LocalUpdateSource {
    async fn latest(&self, package: &str, branch: &str) -> Result<Option<Release>, UpdateError> {
        let document = self.root.join(package).join(format!("{}.json", branch));
        let text = match tokio::fs::read_to_string(&document).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(document = %document.display(), "No release document");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let release: Option<Release> = serde_json::from_str(&text)
            .map_err(|e| UpdateError::InvalidResponse(format!("{}: {}", document.display(), e)))?;
        if let Some(release) = &release {
            release.validate()?;
        }
        Ok(release)
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        ui: &mut dyn LoaderUi,
    ) -> Result<u64, UpdateError> {
        let source = self.resolve(url);
        let mut input = tokio::fs::File::open(&source).await?;
        let size = input.metadata().await?.len();
        ui.set_download_size(clamp_u32(size));

        let mut output = tokio::fs::File::create(dest).await?;
        let mut buffer = vec![0u8; COPY_CHUNK];
        let mut copied = 0u64;
        loop {
            let read = input.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            output.write_all(&buffer[..read]).await?;
            copied += read as u64;
            ui.set_downloaded(clamp_u32(copied));
        }
        output.flush().await?;
        Ok(copied)
    }
}

/// Progress values travel as 32-bit integers
pub(crate) fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
