//! The contract between a stage and the stage it loads.

use crate::error::LoaderError;
use crate::stage::context::{ArtifactInfo, LoadingContext};
use crate::stage::loader::{BootstrapContext, Loader, StageLoader};
use crate::stage::StageSpec;
use crate::ui::SharedUi;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A loaded stage
pub trait Stage: Send {
    /// Run this stage's own bootstrap, usually loading the stage after it
    fn load(&mut self, game_dir: &Path) -> Result<(), LoaderError>;

    /// Second phase, run once the host has finished its own setup
    fn initialize(&mut self) -> Result<(), LoaderError> {
        Ok(())
    }

    fn is_loaded(&self) -> bool;
}

/// Entry point of a stage artifact
pub trait StageFactory: Send + Sync {
    fn create(&self, handle: StageHandle) -> Result<Box<dyn Stage>, LoaderError>;
}

impl<F> StageFactory for F
where
    F: Fn(StageHandle) -> Result<Box<dyn Stage>, LoaderError> + Send + Sync,
{
    fn create(&self, handle: StageHandle) -> Result<Box<dyn Stage>, LoaderError> {
        self(handle)
    }
}

/// Handed to a freshly created stage: where it came from and how to reach the
/// shared bootstrap state.
#[derive(Clone)]
pub struct StageHandle {
    bootstrap: Arc<BootstrapContext>,
    spec: StageSpec,
    artifact: ArtifactInfo,
    context: Arc<LoadingContext>,
    game_dir: PathBuf,
}

impl StageHandle {
    pub(crate) fn new(
        bootstrap: Arc<BootstrapContext>,
        spec: StageSpec,
        artifact: ArtifactInfo,
        context: Arc<LoadingContext>,
        game_dir: PathBuf,
    ) -> Self {
        Self {
            bootstrap,
            spec,
            artifact,
            context,
            game_dir,
        }
    }

    pub fn bootstrap(&self) -> &Arc<BootstrapContext> {
        &self.bootstrap
    }

    /// The [`StageSpec`] this stage was loaded from
    pub fn spec(&self) -> &StageSpec {
        &self.spec
    }

    pub fn artifact(&self) -> &ArtifactInfo {
        &self.artifact
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact.path
    }

    /// The context this stage was loaded into
    pub fn context(&self) -> &Arc<LoadingContext> {
        &self.context
    }

    pub fn variant(&self) -> &str {
        &self.bootstrap.config().variant
    }

    pub fn game_dir(&self) -> &Path {
        &self.game_dir
    }

    /// Progress UI shared by every stage of this bootstrap
    pub fn ui(&self) -> SharedUi {
        self.bootstrap.ui().clone()
    }

    /// Loader for the stage after this one, parented to this stage's context
    pub fn next_stage(&self, spec: StageSpec) -> StageLoader {
        StageLoader::new(Arc::clone(&self.bootstrap), spec, Arc::clone(&self.context))
    }

    /// [`Loader`] for the stage after this one, parented to this stage's context
    pub fn next_loader(&self, spec: StageSpec) -> Loader {
        Loader::with_parent(Arc::clone(&self.bootstrap), spec, Arc::clone(&self.context))
    }
}

impl std::fmt::Debug for StageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageHandle")
            .field("spec", &self.spec)
            .field("artifact", &self.artifact)
            .field("context", &self.context.label())
            .finish()
    }
}
