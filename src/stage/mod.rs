//! Staged bootstrap loading.
//!
//! Each stage locates the artifact of the stage after it, brings it up to date
//! from pending updates, the update service and embedded copies, then loads it
//! into a fresh [`LoadingContext`] and instantiates its entry point. The next
//! stage repeats the same steps for the stage after that.

pub mod claim;
pub mod context;
pub mod entry;
pub mod layout;
pub mod loader;
pub mod search;
pub mod select;

pub use claim::{ClaimRegistry, StageKey};
pub use context::{ArtifactInfo, LoadingContext, ResolvedUnit, StaticUnitProvider, UnitProvider, UnitTable};
pub use entry::{Stage, StageFactory, StageHandle};
pub use layout::StageLayout;
pub use loader::{
    BootstrapContext, BootstrapContextBuilder, BootstrapOutcome, LoadedStage, Loader, StageLoader,
    StageState,
};
pub use search::{Candidate, SearchPath, SearchRoot};
pub use select::{select_artifact, CandidateReport, Selection, SelectionOutcome};

/// What a stage needs to know about the stage it loads next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    /// Directory name under `<namespace>/loader/`
    pub stage_dir: String,
    /// Logical package name the artifact header must declare
    pub package: String,
    /// Unit instantiated once the artifact is loaded
    pub entry_point: String,
}

impl StageSpec {
    pub fn new(
        stage_dir: impl Into<String>,
        package: impl Into<String>,
        entry_point: impl Into<String>,
    ) -> Self {
        Self {
            stage_dir: stage_dir.into(),
            package: package.into(),
            entry_point: entry_point.into(),
        }
    }
}
