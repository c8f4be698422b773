//! Bootstrap of one stage boundary.
//!
//! [`StageLoader`] walks the artifact of the next stage through
//! `CheckingUpdate -> VersionSelecting -> Materializing -> Isolating -> Loaded`,
//! or `Failed` on the first fatal error. [`Loader`] is the face shown to the
//! embedding host: load once, initialize, report whether anything loaded.

use crate::checksum;
use crate::config::LoaderConfig;
use crate::error::LoaderError;
use crate::stage::claim::{ClaimRegistry, StageKey};
use crate::stage::context::{ArtifactInfo, LoadingContext, StaticUnitProvider, UnitProvider, UnitTable};
use crate::stage::entry::{Stage, StageFactory, StageHandle};
use crate::stage::layout::StageLayout;
use crate::stage::search::SearchPath;
use crate::stage::select::{select_artifact, Selection, SelectionOutcome};
use crate::stage::StageSpec;
use crate::ui::SharedUi;
use crate::update::Updater;
use crate::version::Version;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// State shared by every stage of one bootstrap
pub struct BootstrapContext {
    config: LoaderConfig,
    search_path: SearchPath,
    claims: ClaimRegistry,
    units: Arc<dyn UnitProvider>,
    host: Arc<LoadingContext>,
    updater: Option<Updater>,
    ui: SharedUi,
}

impl BootstrapContext {
    pub fn builder(config: LoaderConfig) -> BootstrapContextBuilder {
        BootstrapContextBuilder {
            config,
            search_path: SearchPath::new(),
            units: None,
            shared_units: UnitTable::new(),
            updater: None,
            ui: None,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    pub fn claims(&self) -> &ClaimRegistry {
        &self.claims
    }

    pub fn unit_provider(&self) -> &Arc<dyn UnitProvider> {
        &self.units
    }

    /// Context of the embedding host, parent of the first stage loaded
    pub fn host_context(&self) -> &Arc<LoadingContext> {
        &self.host
    }

    pub fn updater(&self) -> Option<&Updater> {
        self.updater.as_ref()
    }

    pub fn ui(&self) -> &SharedUi {
        &self.ui
    }

    pub fn layout(&self, game_dir: &Path, spec: &StageSpec) -> StageLayout {
        StageLayout::new(game_dir, &self.config.namespace, &spec.stage_dir, &self.config.variant)
    }
}

pub struct BootstrapContextBuilder {
    config: LoaderConfig,
    search_path: SearchPath,
    units: Option<Arc<dyn UnitProvider>>,
    shared_units: UnitTable,
    updater: Option<Updater>,
    ui: Option<SharedUi>,
}

impl BootstrapContextBuilder {
    pub fn search_path(mut self, search_path: SearchPath) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn unit_provider(mut self, units: impl UnitProvider + 'static) -> Self {
        self.units = Some(Arc::new(units));
        self
    }

    /// Unit owned by the host and visible to every stage
    pub fn shared_unit(mut self, name: &str, factory: Arc<dyn StageFactory>) -> Self {
        self.shared_units.insert(name.to_string(), factory);
        self
    }

    pub fn updater(mut self, updater: Option<Updater>) -> Self {
        self.updater = updater;
        self
    }

    pub fn ui(mut self, ui: SharedUi) -> Self {
        self.ui = Some(ui);
        self
    }

    pub fn build(self) -> Arc<BootstrapContext> {
        Arc::new(BootstrapContext {
            config: self.config,
            search_path: self.search_path,
            claims: ClaimRegistry::new(),
            units: self
                .units
                .unwrap_or_else(|| Arc::new(StaticUnitProvider::new())),
            host: LoadingContext::host(self.shared_units),
            updater: self.updater,
            ui: self.ui.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    CheckingUpdate,
    VersionSelecting,
    Materializing,
    Isolating,
    Loaded,
    Failed,
}

/// A stage that was instantiated, with the handle it was given
pub struct LoadedStage {
    pub stage: Box<dyn Stage>,
    pub handle: StageHandle,
}

pub enum BootstrapOutcome {
    Loaded(LoadedStage),
    /// Another loader already claimed this stage and variant
    Skipped,
}

pub struct StageLoader {
    bootstrap: Arc<BootstrapContext>,
    spec: StageSpec,
    parent: Arc<LoadingContext>,
    history: Vec<StageState>,
}

impl StageLoader {
    pub fn new(bootstrap: Arc<BootstrapContext>, spec: StageSpec, parent: Arc<LoadingContext>) -> Self {
        Self {
            bootstrap,
            spec,
            parent,
            history: Vec::new(),
        }
    }

    pub fn spec(&self) -> &StageSpec {
        &self.spec
    }

    pub fn key(&self) -> StageKey {
        StageKey::new(&self.spec.stage_dir, &self.bootstrap.config.variant)
    }

    pub fn layout(&self, game_dir: &Path) -> StageLayout {
        self.bootstrap.layout(game_dir, &self.spec)
    }

    pub fn state(&self) -> Option<StageState> {
        self.history.last().copied()
    }

    /// Every state entered so far, in order
    pub fn history(&self) -> &[StageState] {
        &self.history
    }

    fn enter(&mut self, state: StageState) {
        debug!(stage = %self.spec.stage_dir, ?state, "Entering state");
        self.history.push(state);
    }

    /// Claim, materialize, isolate and instantiate the next stage
    pub fn bootstrap(&mut self, game_dir: &Path) -> Result<BootstrapOutcome, LoaderError> {
        let key = self.key();
        if !self.bootstrap.claims.try_claim(&key) {
            info!(stage = %key.stage, variant = %key.variant, "Stage already claimed, skipping");
            return Ok(BootstrapOutcome::Skipped);
        }

        match self.load_next(game_dir) {
            Ok(loaded) => Ok(BootstrapOutcome::Loaded(loaded)),
            Err(e) => {
                self.enter(StageState::Failed);
                error!(stage = %key.stage, variant = %key.variant, error = %e, "Stage bootstrap failed");
                Err(e)
            }
        }
    }

    /// Bring the on-disk artifact up to date without loading it
    pub fn materialize(&mut self, game_dir: &Path) -> Result<ArtifactInfo, LoaderError> {
        let layout = self.layout(game_dir);

        self.enter(StageState::CheckingUpdate);
        layout.ensure_dir()?;
        layout.consume_pending_update()?;
        self.check_remote_update(&layout)?;

        self.enter(StageState::VersionSelecting);
        let outcome = self.select(&layout);

        self.enter(StageState::Materializing);
        let path = layout.current();
        let version = match outcome.selection {
            Selection::Replace {
                candidate,
                version,
                content,
            } => {
                info!(
                    stage = %self.spec.stage_dir,
                    from = %candidate,
                    version = %version,
                    previous = ?outcome.current_version.as_ref().map(Version::as_str),
                    "Installing newer embedded artifact"
                );
                layout.install_current(&content)?;
                Some(version)
            }
            Selection::KeepCurrent if path.is_file() => outcome.current_version,
            Selection::KeepCurrent => {
                return Err(LoaderError::NoArtifact {
                    stage: self.spec.stage_dir.clone(),
                    variant: self.bootstrap.config.variant.clone(),
                });
            }
        };

        Ok(ArtifactInfo {
            checksum: checksum::of_file(&path),
            path,
            package: self.spec.package.clone(),
            version,
        })
    }

    /// Candidates for the next stage, without changing anything on disk
    pub fn inspect(&self, game_dir: &Path) -> SelectionOutcome {
        self.select(&self.layout(game_dir))
    }

    fn select(&self, layout: &StageLayout) -> SelectionOutcome {
        let resource =
            StageLayout::embedded_resource(&self.bootstrap.config.namespace, &self.spec.stage_dir);
        let candidates = self.bootstrap.search_path.candidates(&resource);
        debug!(resource = %resource, candidates = candidates.len(), "Searching for embedded artifacts");
        select_artifact(&layout.current(), &candidates, &self.spec.package)
    }

    fn check_remote_update(&self, layout: &StageLayout) -> Result<(), LoaderError> {
        let Some(updater) = self.bootstrap.updater.as_ref() else {
            return Ok(());
        };
        let mut ui = self.bootstrap.ui.clone();
        match updater.check_blocking(layout, &self.spec.package, &mut ui) {
            Ok(outcome) => {
                debug!(stage = %self.spec.stage_dir, ?outcome, "Update check finished");
                if outcome.installed() {
                    layout.consume_pending_update()?;
                }
            }
            Err(e) => {
                warn!(stage = %self.spec.stage_dir, error = %e, "Update check failed, continuing with local artifacts");
            }
        }
        Ok(())
    }

    fn load_next(&mut self, game_dir: &Path) -> Result<LoadedStage, LoaderError> {
        let artifact = self.materialize(game_dir)?;

        self.enter(StageState::Isolating);
        let units = self.bootstrap.units.units_for(&artifact)?;
        let context = LoadingContext::child(&self.parent, artifact.clone(), units);
        let resolved = context.resolve(&self.spec.entry_point).ok_or_else(|| {
            LoaderError::EntryPointNotFound {
                entry_point: self.spec.entry_point.clone(),
                context: context.label().to_string(),
            }
        })?;
        if resolved.context_id != context.id() {
            return Err(LoaderError::WrongContext {
                expected: context.label().to_string(),
                actual: resolved.context_label,
            });
        }

        let handle = StageHandle::new(
            Arc::clone(&self.bootstrap),
            self.spec.clone(),
            artifact,
            Arc::clone(&context),
            game_dir.to_path_buf(),
        );
        let stage = resolved.factory.create(handle.clone())?;

        self.enter(StageState::Loaded);
        info!(
            stage = %self.spec.stage_dir,
            variant = %self.bootstrap.config.variant,
            context = %context.label(),
            path = %handle.artifact_path().display(),
            "Stage loaded"
        );
        Ok(LoadedStage { stage, handle })
    }
}

/// Host-facing loader for one stage
pub struct Loader {
    bootstrap: Arc<BootstrapContext>,
    spec: StageSpec,
    parent: Arc<LoadingContext>,
    attempted: bool,
    loaded: Option<LoadedStage>,
    game_dir: Option<PathBuf>,
}

impl Loader {
    pub fn new(bootstrap: Arc<BootstrapContext>, spec: StageSpec) -> Self {
        let parent = Arc::clone(bootstrap.host_context());
        Self::with_parent(bootstrap, spec, parent)
    }

    pub fn with_parent(bootstrap: Arc<BootstrapContext>, spec: StageSpec, parent: Arc<LoadingContext>) -> Self {
        Self {
            bootstrap,
            spec,
            parent,
            attempted: false,
            loaded: None,
            game_dir: None,
        }
    }

    /// Load the stage. Only the first call does anything, even if it failed.
    pub fn load(&mut self, game_dir: &Path) -> Result<(), LoaderError> {
        if self.attempted {
            debug!(stage = %self.spec.stage_dir, "Load already attempted");
            return Ok(());
        }
        self.attempted = true;
        self.game_dir = Some(game_dir.to_path_buf());

        let mut stage_loader = StageLoader::new(
            Arc::clone(&self.bootstrap),
            self.spec.clone(),
            Arc::clone(&self.parent),
        );
        match stage_loader.bootstrap(game_dir)? {
            BootstrapOutcome::Skipped => Ok(()),
            BootstrapOutcome::Loaded(mut loaded) => {
                if let Err(e) = loaded.stage.load(game_dir) {
                    error!(
                        stage = %self.spec.stage_dir,
                        variant = %loaded.handle.variant(),
                        error = %e,
                        "Stage failed to load"
                    );
                    return Err(e);
                }
                self.loaded = Some(loaded);
                Ok(())
            }
        }
    }

    /// Initialize the loaded stage. Nothing happens if nothing was loaded.
    pub fn initialize(&mut self) -> Result<(), LoaderError> {
        match self.loaded.as_mut() {
            Some(loaded) => loaded.stage.initialize(),
            None => Ok(()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
            .as_ref()
            .map(|loaded| loaded.stage.is_loaded())
            .unwrap_or(false)
    }

    pub fn loaded(&self) -> Option<&LoadedStage> {
        self.loaded.as_ref()
    }

    pub fn game_dir(&self) -> Option<&Path> {
        self.game_dir.as_deref()
    }
}
