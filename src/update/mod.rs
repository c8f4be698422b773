//! Remote updates for stage artifacts.
//!
//! The [`Updater`] runs while a stage is checking for updates. Anything it
//! installs is written to the pending-update path and then picked up exactly like
//! an update left behind by an earlier run. Failures here are never fatal to the
//! bootstrap; the caller logs them and carries on with what is on disk.

pub mod http;
pub mod meta;
pub mod policy;
pub mod source;

pub use http::HttpUpdateSource;
pub use meta::{ArtifactMeta, UpdateState};
pub use policy::{AutoUpdate, FixedAnswer, UpdatePrompt};
pub use source::{DiffAsset, LocalUpdateSource, Release, UpdateSource};

use crate::checksum::{self, ContentHash};
use crate::config::LoaderConfig;
use crate::error::UpdateError;
use crate::patch;
use crate::stage::layout::StageLayout;
use crate::stage::select::file_version;
use crate::ui::LoaderUi;
use crate::version::Version;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{debug, info, warn};

/// What one update check did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Auto-update is off and an artifact already exists
    Disabled,
    /// Nothing is published for this package, branch and platform
    Unavailable,
    UpToDate,
    /// The release was downloaded, verified and placed as the pending update
    Installed(Version),
    /// A newer release was recorded for a decision on a later boot
    Queued(Version),
    /// A newer release was turned down, or no decision could be obtained
    Declined(Version),
}

impl UpdateOutcome {
    pub fn installed(&self) -> bool {
        matches!(self, UpdateOutcome::Installed(_))
    }
}

/// The artifact currently on disk, as far as the updater is concerned
#[derive(Debug, Clone)]
struct LocalArtifact {
    exists: bool,
    version: Option<Version>,
    checksum: ContentHash,
}

impl LocalArtifact {
    fn inspect(layout: &StageLayout, package: &str) -> Self {
        let current = layout.current();
        if !current.is_file() {
            return Self {
                exists: false,
                version: None,
                checksum: ContentHash::Unknown,
            };
        }

        let checksum = checksum::of_file(&current);
        let version = match ArtifactMeta::load_verified(&layout.meta_file(), &checksum) {
            Some(meta) => Some(meta.version),
            None => file_version(&current, package),
        };
        Self {
            exists: true,
            version,
            checksum,
        }
    }
}

pub struct Updater {
    source: Arc<dyn UpdateSource>,
    mode: AutoUpdate,
    branch: String,
    prompt: Arc<dyn UpdatePrompt>,
}

impl Updater {
    pub fn new(source: Arc<dyn UpdateSource>, mode: AutoUpdate, branch: impl Into<String>) -> Self {
        Self {
            source,
            mode,
            branch: branch.into(),
            prompt: Arc::new(FixedAnswer(None)),
        }
    }

    /// Updater for the configured service, or `None` when no service is configured
    pub fn from_config(config: &LoaderConfig) -> Result<Option<Self>, UpdateError> {
        let Some(base_url) = config.update.base_url.as_deref() else {
            return Ok(None);
        };
        let source: Arc<dyn UpdateSource> = match LocalUpdateSource::from_url(base_url) {
            Some(local) => Arc::new(local),
            None => Arc::new(HttpUpdateSource::new(
                base_url,
                &config.update.platform,
                config.update.timeout(),
            )?),
        };
        Ok(Some(Self::new(
            source,
            config.auto_update_mode(),
            config.branch.clone(),
        )))
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn UpdatePrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn mode(&self) -> AutoUpdate {
        self.mode
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// [`Updater::check`] on a dedicated runtime, for the synchronous loader
    pub fn check_blocking(
        &self,
        layout: &StageLayout,
        package: &str,
        ui: &mut dyn LoaderUi,
    ) -> Result<UpdateOutcome, UpdateError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(UpdateError::Runtime(
                "Cannot run a blocking update check from within an async runtime".to_string(),
            ));
        }
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| UpdateError::Runtime(format!("Failed to create runtime: {}", e)))?;
        rt.block_on(self.check(layout, package, ui))
    }

    /// Check for and possibly install a newer release of `package`
    pub async fn check(
        &self,
        layout: &StageLayout,
        package: &str,
        ui: &mut dyn LoaderUi,
    ) -> Result<UpdateOutcome, UpdateError> {
        fs::create_dir_all(layout.dir())?;
        let local = LocalArtifact::inspect(layout, package);

        let outcome = if !local.exists {
            // Without any artifact there is nothing to load, so fetch one regardless of mode
            match self.source.latest(package, &self.branch).await? {
                Some(release) => {
                    info!(package, version = %release.version, "No local artifact, downloading initial copy");
                    self.install(layout, &release, &local, ui).await?;
                    UpdateOutcome::Installed(release.version)
                }
                None => UpdateOutcome::Unavailable,
            }
        } else {
            match self.mode {
                AutoUpdate::Off => UpdateOutcome::Disabled,
                AutoUpdate::Full => self.check_full(layout, package, &local, ui).await?,
                AutoUpdate::Manual => self.check_manual(layout, package, &local, ui).await?,
            }
        };

        if self.mode != AutoUpdate::Manual {
            let state_file = layout.state_file();
            if !UpdateState::load(&state_file).is_empty() {
                debug!(package, "Clearing pending update state outside of prompt mode");
                UpdateState::default().save(&state_file)?;
            }
        }

        Ok(outcome)
    }

    async fn check_full(
        &self,
        layout: &StageLayout,
        package: &str,
        local: &LocalArtifact,
        ui: &mut dyn LoaderUi,
    ) -> Result<UpdateOutcome, UpdateError> {
        let Some(release) = self.source.latest(package, &self.branch).await? else {
            return Ok(UpdateOutcome::Unavailable);
        };
        if local.checksum.matches(&release.checksum) {
            return Ok(UpdateOutcome::UpToDate);
        }
        if local.version.as_ref().is_some_and(|v| *v > release.version) {
            // an embedded copy newer than the release would be selected again on every boot
            debug!(
                package,
                local = ?local.version.as_ref().map(Version::as_str),
                release = %release.version,
                "Local artifact is newer than the published release"
            );
            return Ok(UpdateOutcome::UpToDate);
        }

        self.install(layout, &release, local, ui).await?;
        Ok(UpdateOutcome::Installed(release.version))
    }

    async fn check_manual(
        &self,
        layout: &StageLayout,
        package: &str,
        local: &LocalArtifact,
        ui: &mut dyn LoaderUi,
    ) -> Result<UpdateOutcome, UpdateError> {
        let Some(release) = self.source.latest(package, &self.branch).await? else {
            return Ok(UpdateOutcome::Unavailable);
        };
        if local.version.as_ref().is_some_and(|v| release.version <= *v) {
            return Ok(UpdateOutcome::UpToDate);
        }

        let state_file = layout.state_file();
        let mut state = UpdateState::load(&state_file);
        let blanket_consent =
            state.pending_update_version.is_none() && state.pending_update_resolution == Some(true);
        let already_pending =
            state.pending_update_version.as_deref() == Some(release.version.as_str());

        if !blanket_consent && !already_pending {
            info!(package, version = %release.version, branch = %self.branch, "Found newer release, queueing it for confirmation");
            state.pending_update_version = Some(release.version.as_str().to_string());
            state.pending_update_resolution = None;
            state.save(&state_file)?;
            return Ok(UpdateOutcome::Queued(release.version));
        }

        if state.pending_update_resolution.is_none() {
            state.pending_update_resolution = self.prompt.confirm(&release.version);
            if state.pending_update_resolution.is_some() {
                state.save(&state_file)?;
            }
        }

        match state.pending_update_resolution {
            Some(true) => {
                self.install(layout, &release, local, ui).await?;
                UpdateState::default().save(&state_file)?;
                Ok(UpdateOutcome::Installed(release.version))
            }
            resolution => {
                let reason = if resolution.is_some() {
                    "declined"
                } else {
                    "no answer"
                };
                warn!(
                    package,
                    version = %release.version,
                    branch = %self.branch,
                    reason,
                    "Skipping newer release"
                );
                Ok(UpdateOutcome::Declined(release.version))
            }
        }
    }

    /// Fetch `release`, verify it and place it as the pending update
    async fn install(
        &self,
        layout: &StageLayout,
        release: &Release,
        local: &LocalArtifact,
        ui: &mut dyn LoaderUi,
    ) -> Result<(), UpdateError> {
        info!(
            version = %release.version,
            checksum = %release.checksum,
            url = %release.url,
            "Installing update"
        );

        ui.start();
        let fetched = self.fetch_verified(layout, release, local, ui).await;
        ui.complete();

        let staged = fetched?;
        staged
            .persist(layout.pending_update())
            .map_err(|e| UpdateError::Io(e.error))?;
        ArtifactMeta {
            version: release.version.clone(),
            checksum: release.checksum.clone(),
        }
        .save(&layout.meta_file())
    }

    async fn fetch_verified(
        &self,
        layout: &StageLayout,
        release: &Release,
        local: &LocalArtifact,
        ui: &mut dyn LoaderUi,
    ) -> Result<TempPath, UpdateError> {
        if let Some(diff) = release.diff_from(&local.checksum) {
            match self.fetch_via_diff(layout, release, diff, ui).await {
                Ok(staged) => return Ok(staged),
                Err(e) => warn!(error = %e, "Diff update failed, downloading the full artifact"),
            }
        }

        let staged = temp_path(layout.dir(), "download-")?;
        self.source.download(&release.url, &staged, ui).await?;
        verify(&staged, &release.checksum)?;
        Ok(staged)
    }

    async fn fetch_via_diff(
        &self,
        layout: &StageLayout,
        release: &Release,
        diff: &DiffAsset,
        ui: &mut dyn LoaderUi,
    ) -> Result<TempPath, UpdateError> {
        debug!(url = %diff.url, "Updating through diff");
        let diff_file = temp_path(layout.dir(), "diff-")?;
        self.source.download(&diff.url, &diff_file, ui).await?;

        let staged = temp_path(layout.dir(), "patched-")?;
        fs::copy(layout.current(), &staged)?;
        patch::apply(&staged, &diff_file)?;
        verify(&staged, &release.checksum)?;
        Ok(staged)
    }
}

fn temp_path(dir: &Path, prefix: &str) -> Result<TempPath, UpdateError> {
    Ok(tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?
        .into_temp_path())
}

fn verify(path: &Path, expected: &str) -> Result<(), UpdateError> {
    let actual = checksum::try_of_file(path)?;
    if actual.matches(expected) {
        Ok(())
    } else {
        Err(UpdateError::ChecksumMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}
