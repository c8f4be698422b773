//! End-to-end bootstrap of stage artifacts from embedded candidates

use crate::integration::test_utils::{
    artifact, embed_in_directory, embed_in_package, headerless_artifact, NAMESPACE,
};
use stageloader::archive::EntryTree;
use stageloader::config::LoaderConfig;
use stageloader::error::LoaderError;
use stageloader::stage::{
    BootstrapContext, Loader, SearchPath, Stage, StageHandle, StageLayout, StageLoader, StageSpec,
    StaticUnitProvider,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const STAGE2: &str = "loader-stage2";
const STAGE3: &str = "loader-stage3";

fn current_path(game: &Path, stage_dir: &str) -> std::path::PathBuf {
    StageLayout::new(game, NAMESPACE, stage_dir, "default").current()
}

fn payload_of(path: &Path) -> String {
    let tree = EntryTree::read(path).unwrap();
    String::from_utf8(tree.get("payload.txt").unwrap().to_vec()).unwrap()
}

/// Records its `load` and reports itself loaded afterwards
struct Leaf {
    loaded: bool,
}

impl Stage for Leaf {
    fn load(&mut self, _game_dir: &Path) -> Result<(), LoaderError> {
        self.loaded = true;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// Second stage that bootstraps the third through its handle
struct Relay {
    handle: StageHandle,
    next: Option<Loader>,
}

impl Stage for Relay {
    fn load(&mut self, game_dir: &Path) -> Result<(), LoaderError> {
        let mut next = self
            .handle
            .next_loader(StageSpec::new("stage3", STAGE3, "stage3::Leaf"));
        next.load(game_dir)?;
        self.next = Some(next);
        Ok(())
    }

    fn initialize(&mut self) -> Result<(), LoaderError> {
        match self.next.as_mut() {
            Some(next) => next.initialize(),
            None => Ok(()),
        }
    }

    fn is_loaded(&self) -> bool {
        self.next.as_ref().map(Loader::is_loaded).unwrap_or(false)
    }
}

fn leaf_provider(package: &str, created: Arc<AtomicUsize>) -> StaticUnitProvider {
    StaticUnitProvider::new().register(package, "entry", move |_handle| {
        created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Leaf { loaded: false }))
    })
}

fn context(search: SearchPath, provider: StaticUnitProvider) -> Arc<BootstrapContext> {
    BootstrapContext::builder(LoaderConfig::default())
        .search_path(search)
        .unit_provider(provider)
        .build()
}

#[test]
fn test_newest_candidate_wins() {
    let game = TempDir::new().unwrap();
    let older = TempDir::new().unwrap();
    let newer = TempDir::new().unwrap();
    embed_in_directory(older.path(), "stage2", &artifact(STAGE2, "1.2.0", "old"));
    embed_in_directory(newer.path(), "stage2", &artifact(STAGE2, "1.3.0", "new"));

    let search = SearchPath::new()
        .with_directory(older.path())
        .with_directory(newer.path());
    let created = Arc::new(AtomicUsize::new(0));
    let bootstrap = context(search, leaf_provider(STAGE2, created.clone()));

    let mut loader = Loader::new(bootstrap, StageSpec::new("stage2", STAGE2, "entry"));
    loader.load(game.path()).unwrap();

    assert!(loader.is_loaded());
    assert_eq!(payload_of(&current_path(game.path(), "stage2")), "new");
    let handle = &loader.loaded().unwrap().handle;
    assert_eq!(handle.artifact().version.as_ref().unwrap().as_str(), "1.3.0");
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_foreign_and_headerless_candidates_are_never_chosen() {
    let game = TempDir::new().unwrap();
    let roots = TempDir::new().unwrap();
    let foreign = roots.path().join("foreign");
    let bare = roots.path().join("bare");
    let genuine = roots.path().join("genuine");
    embed_in_directory(&foreign, "stage2", &artifact("someone-else", "9.9.9", "foreign"));
    embed_in_directory(&bare, "stage2", &headerless_artifact("bare"));
    embed_in_directory(&genuine, "stage2", &artifact(STAGE2, "1.0.0", "genuine"));

    let search = SearchPath::new()
        .with_directory(&foreign)
        .with_directory(&bare)
        .with_directory(&genuine);
    let bootstrap = context(search, leaf_provider(STAGE2, Arc::new(AtomicUsize::new(0))));
    let mut loader = StageLoader::new(
        Arc::clone(&bootstrap),
        StageSpec::new("stage2", STAGE2, "entry"),
        Arc::clone(bootstrap.host_context()),
    );

    let artifact = loader.materialize(game.path()).unwrap();
    assert_eq!(artifact.version.unwrap().as_str(), "1.0.0");
    assert_eq!(payload_of(&artifact.path), "genuine");
}

#[test]
fn test_only_invalid_candidates_is_no_artifact() {
    let game = TempDir::new().unwrap();
    let roots = TempDir::new().unwrap();
    embed_in_directory(roots.path(), "stage2", &headerless_artifact("bare"));

    let bootstrap = context(
        SearchPath::new().with_directory(roots.path()),
        leaf_provider(STAGE2, Arc::new(AtomicUsize::new(0))),
    );
    let mut loader = Loader::new(bootstrap, StageSpec::new("stage2", STAGE2, "entry"));
    let err = loader.load(game.path()).unwrap_err();
    assert!(matches!(err, LoaderError::NoArtifact { .. }));
}

#[test]
fn test_pending_update_is_consumed() {
    let game = TempDir::new().unwrap();
    let layout = StageLayout::new(game.path(), NAMESPACE, "stage2", "default");
    layout.install_current(&artifact(STAGE2, "1.0.0", "installed")).unwrap();
    let pending = artifact(STAGE2, "1.1.0", "pending");
    std::fs::write(layout.pending_update(), &pending).unwrap();

    let bootstrap = context(
        SearchPath::new(),
        leaf_provider(STAGE2, Arc::new(AtomicUsize::new(0))),
    );
    let mut loader = Loader::new(bootstrap, StageSpec::new("stage2", STAGE2, "entry"));
    loader.load(game.path()).unwrap();

    assert!(!layout.pending_update().exists());
    assert_eq!(std::fs::read(layout.current()).unwrap(), pending);
}

#[test]
fn test_equal_embedded_version_keeps_disk_copy() {
    let game = TempDir::new().unwrap();
    let roots = TempDir::new().unwrap();
    let layout = StageLayout::new(game.path(), NAMESPACE, "stage2", "default");
    layout.install_current(&artifact(STAGE2, "1.2.0", "on disk")).unwrap();
    embed_in_directory(roots.path(), "stage2", &artifact(STAGE2, "1.2.0+other", "embedded"));

    let bootstrap = context(
        SearchPath::new().with_directory(roots.path()),
        leaf_provider(STAGE2, Arc::new(AtomicUsize::new(0))),
    );
    let mut loader = Loader::new(bootstrap, StageSpec::new("stage2", STAGE2, "entry"));
    loader.load(game.path()).unwrap();

    assert_eq!(payload_of(&layout.current()), "on disk");
}

#[test]
fn test_candidates_inside_package_archives() {
    let game = TempDir::new().unwrap();
    let packages = TempDir::new().unwrap();
    embed_in_package(
        &packages.path().join("a-mod.zip"),
        "stage2",
        &artifact(STAGE2, "2.0.0", "from package"),
    );
    std::fs::write(packages.path().join("notes.txt"), "not a package").unwrap();

    let mut search = SearchPath::new();
    assert_eq!(search.scan_packages(packages.path(), 1).unwrap(), 1);
    let bootstrap = context(search, leaf_provider(STAGE2, Arc::new(AtomicUsize::new(0))));
    let mut loader = Loader::new(bootstrap, StageSpec::new("stage2", STAGE2, "entry"));
    loader.load(game.path()).unwrap();

    assert_eq!(payload_of(&current_path(game.path(), "stage2")), "from package");
}

#[test]
fn test_first_claim_wins_per_context() {
    let game = TempDir::new().unwrap();
    let roots = TempDir::new().unwrap();
    embed_in_directory(roots.path(), "stage2", &artifact(STAGE2, "1.0.0", "x"));
    let created = Arc::new(AtomicUsize::new(0));
    let bootstrap = context(
        SearchPath::new().with_directory(roots.path()),
        leaf_provider(STAGE2, created.clone()),
    );

    // two independently embedded first stages sharing one bootstrap
    let mut first = Loader::new(Arc::clone(&bootstrap), StageSpec::new("stage2", STAGE2, "entry"));
    let mut second = Loader::new(Arc::clone(&bootstrap), StageSpec::new("stage2", STAGE2, "entry"));
    first.load(game.path()).unwrap();
    second.load(game.path()).unwrap();

    assert!(first.is_loaded());
    assert!(!second.is_loaded());
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn test_three_stage_cascade() {
    let game = TempDir::new().unwrap();
    let roots = TempDir::new().unwrap();
    embed_in_directory(roots.path(), "stage2", &artifact(STAGE2, "1.0.0", "two"));
    embed_in_directory(roots.path(), "stage3", &artifact(STAGE3, "3.1.0", "three"));

    let contexts = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&contexts);
    let leaf_seen = Arc::clone(&contexts);
    let provider = StaticUnitProvider::new()
        .register(STAGE2, "stage2::Relay", move |handle: StageHandle| {
            seen.lock().unwrap().push(handle.context().depth());
            Ok(Box::new(Relay { handle, next: None }))
        })
        .register(STAGE3, "stage3::Leaf", move |handle: StageHandle| {
            leaf_seen.lock().unwrap().push(handle.context().depth());
            Ok(Box::new(Leaf { loaded: false }))
        });
    let bootstrap = context(SearchPath::new().with_directory(roots.path()), provider);

    let mut loader = Loader::new(bootstrap, StageSpec::new("stage2", STAGE2, "stage2::Relay"));
    loader.load(game.path()).unwrap();
    loader.initialize().unwrap();

    assert!(loader.is_loaded());
    assert_eq!(*contexts.lock().unwrap(), vec![1, 2]);
    assert_eq!(payload_of(&current_path(game.path(), "stage3")), "three");
}
