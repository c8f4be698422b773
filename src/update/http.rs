//! HTTP update service client.
//!
//! ```text
//! GET {base}/v1/{package}/versions/{branch}/platforms/{platform}
//!     -> {"version", "checksum", "url"?, "diffs"?} or null for unsupported platforms
//! GET {base}/v1/{package}/versions/{version}/platforms/{platform}/download
//!     -> {"url"}, only asked when the release document carries no url
//! ```

use crate::error::UpdateError;
use crate::ui::LoaderUi;
use crate::update::source::{clamp_u32, DiffAsset, Release, UpdateSource};
use crate::version::Version;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

const USER_AGENT: &str = concat!("stageloader/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ReleaseDocument {
    version: Option<String>,
    checksum: Option<String>,
    url: Option<String>,
    #[serde(default)]
    diffs: Vec<DiffAsset>,
}

#[derive(Debug, Deserialize)]
struct DownloadDocument {
    url: Option<String>,
}

pub struct HttpUpdateSource {
    client: Client,
    base_url: String,
    platform: String,
}

impl HttpUpdateSource {
    /// Client with `timeout` applied to connecting and to each request
    pub fn new(base_url: &str, platform: &str, timeout: Duration) -> Result<Self, UpdateError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| UpdateError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            platform: platform.to_string(),
        })
    }

    fn version_url(&self, package: &str, version_or_branch: &str) -> String {
        format!(
            "{}/v1/{}/versions/{}/platforms/{}",
            self.base_url, package, version_or_branch, self.platform
        )
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<Option<T>, UpdateError> {
        debug!(url, "Fetching update metadata");
        let response = self.client.get(url).send().await.map_err(|e| {
            error!(url, error = %e, "Update service request failed");
            UpdateError::from(e)
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let cf_ray = response
                .headers()
                .get("cf-ray")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            error!(url, %status, cf_ray = %cf_ray, "Update service returned an error");
            return Err(UpdateError::Http(format!("{} returned {}", url, status)));
        }

        let text = response.text().await?;
        serde_json::from_str::<Option<T>>(&text)
            .map_err(|e| UpdateError::InvalidResponse(format!("{}: {}", url, e)))
    }

    async fn download_url(&self, package: &str, version: &str) -> Result<String, UpdateError> {
        let url = format!("{}/download", self.version_url(package, version));
        let document: Option<DownloadDocument> = self.fetch_json(&url).await?;
        document
            .and_then(|d| d.url)
            .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
            .ok_or_else(|| UpdateError::InvalidResponse(format!("{} gave no valid download url", url)))
    }
}

#[async_trait]
impl UpdateSource for HttpUpdateSource {
    async fn latest(&self, package: &str, branch: &str) -> Result<Option<Release>, UpdateError> {
        let url = self.version_url(package, branch);
        let Some(document) = self.fetch_json::<ReleaseDocument>(&url).await? else {
            warn!(package, platform = %self.platform, "Update service does not support this platform");
            return Ok(None);
        };

        let (version, checksum) = match (document.version, document.checksum) {
            (Some(version), Some(checksum)) if !version.is_empty() && !checksum.is_empty() => {
                (version, checksum)
            }
            (version, checksum) => {
                return Err(UpdateError::InvalidResponse(format!(
                    "unexpected release data (version={:?}, checksum={:?})",
                    version, checksum
                )));
            }
        };

        let url = match document.url {
            Some(url) if !url.is_empty() => url,
            _ => self.download_url(package, &version).await?,
        };

        let release = Release {
            version: Version::new(version),
            checksum,
            url,
            diffs: document.diffs,
        };
        release.validate()?;
        Ok(Some(release))
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        ui: &mut dyn LoaderUi,
    ) -> Result<u64, UpdateError> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;
        if let Some(size) = response.content_length() {
            ui.set_download_size(clamp_u32(size));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut downloaded = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            ui.set_downloaded(clamp_u32(downloaded));
        }
        file.flush().await?;
        debug!(url, bytes = downloaded, "Download finished");
        Ok(downloaded)
    }
}
