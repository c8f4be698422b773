//! Remote updates driven through the synchronous loader

use crate::integration::test_utils::{artifact, Mirror, NAMESPACE};
use stageloader::archive::EntryTree;
use stageloader::config::LoaderConfig;
use stageloader::patch::ChangeSet;
use stageloader::stage::{BootstrapContext, SearchPath, StageLayout, StageLoader, StageSpec};
use stageloader::ui::{RecordingUi, SharedUi, UiEvent};
use stageloader::update::{ArtifactMeta, FixedAnswer, UpdateState, Updater};
use std::sync::Arc;
use tempfile::TempDir;

const PACKAGE: &str = "loader-stage2";

fn config(mirror: &Mirror, auto_update: Option<&str>) -> LoaderConfig {
    let mut config = LoaderConfig::default();
    config.update.base_url = Some(mirror.base_url());
    config.auto_update = auto_update.map(str::to_string);
    config
}

fn stage_loader(config: LoaderConfig, answer: Option<bool>, ui: SharedUi) -> StageLoader {
    let updater = Updater::from_config(&config)
        .unwrap()
        .map(|updater| updater.with_prompt(Arc::new(FixedAnswer(answer))));
    let bootstrap = BootstrapContext::builder(config)
        .search_path(SearchPath::new())
        .updater(updater)
        .ui(ui)
        .build();
    StageLoader::new(
        Arc::clone(&bootstrap),
        StageSpec::new("stage2", PACKAGE, "entry"),
        Arc::clone(bootstrap.host_context()),
    )
}

fn layout(game: &TempDir) -> StageLayout {
    StageLayout::new(game.path(), NAMESPACE, "stage2", "default")
}

#[test]
fn test_initial_download_materializes_artifact() {
    let mirror = Mirror::new();
    let content = artifact(PACKAGE, "1.0.0", "remote");
    mirror.publish(PACKAGE, "1.0.0", &content, Vec::new());
    let game = TempDir::new().unwrap();

    let recording = RecordingUi::new();
    let mut loader = stage_loader(
        config(&mirror, Some("false")),
        None,
        SharedUi::new(Box::new(recording.clone())),
    );
    let installed = loader.materialize(game.path()).unwrap();

    assert_eq!(installed.version.unwrap().as_str(), "1.0.0");
    assert_eq!(std::fs::read(layout(&game).current()).unwrap(), content);
    assert!(!layout(&game).pending_update().exists());
    let events = recording.events();
    assert_eq!(events.first(), Some(&UiEvent::Start));
    assert_eq!(events.last(), Some(&UiEvent::Complete));
}

#[test]
fn test_full_mode_applies_offered_diff() {
    let mirror = Mirror::new();
    let game = TempDir::new().unwrap();
    let old = artifact(PACKAGE, "1.0.0", "old");
    layout(&game).ensure_dir().unwrap();
    layout(&game).install_current(&old).unwrap();

    // the release is exactly what the diff produces from the installed artifact
    let mut target = EntryTree::from_bytes(&old).unwrap();
    let change_set = ChangeSet {
        removed: Vec::new(),
        replaced: vec![
            (
                "META-INF/MANIFEST.MF".to_string(),
                stageloader::archive::ArtifactHeader::new(PACKAGE, "1.1.0")
                    .render()
                    .into_bytes(),
            ),
            ("payload.txt".to_string(), b"patched".to_vec()),
        ],
        added: Vec::new(),
    };
    change_set.apply_to(&mut target).unwrap();
    let release = target.to_bytes().unwrap();
    let diff = mirror.diff(
        "1.0.0-to-1.1.0.diff",
        &old,
        &change_set.to_diff().to_bytes().unwrap(),
    );
    mirror.publish(PACKAGE, "1.1.0", &release, vec![diff]);

    let mut loader = stage_loader(config(&mirror, None), None, SharedUi::default());
    let installed = loader.materialize(game.path()).unwrap();

    assert_eq!(installed.version.unwrap().as_str(), "1.1.0");
    assert_eq!(std::fs::read(layout(&game).current()).unwrap(), release);
    let meta = ArtifactMeta::load(&layout(&game).meta_file()).unwrap().unwrap();
    assert_eq!(meta.version.as_str(), "1.1.0");
}

#[test]
fn test_prompt_mode_queues_then_installs_on_consent() {
    let mirror = Mirror::new();
    let game = TempDir::new().unwrap();
    layout(&game).ensure_dir().unwrap();
    layout(&game)
        .install_current(&artifact(PACKAGE, "1.0.0", "old"))
        .unwrap();
    let newer = artifact(PACKAGE, "2.0.0", "new");
    mirror.publish(PACKAGE, "2.0.0", &newer, Vec::new());

    // no answer available: nothing is installed and the question stays open
    let mut undecided = stage_loader(config(&mirror, Some("with-prompt")), None, SharedUi::default());
    undecided.materialize(game.path()).unwrap();
    assert_ne!(std::fs::read(layout(&game).current()).unwrap(), newer);
    let state = UpdateState::load(&layout(&game).state_file());
    assert_eq!(state.pending_update_version.as_deref(), Some("2.0.0"));

    let mut consenting = stage_loader(config(&mirror, Some("with-prompt")), Some(true), SharedUi::default());
    consenting.materialize(game.path()).unwrap();
    assert_eq!(std::fs::read(layout(&game).current()).unwrap(), newer);
    assert!(UpdateState::load(&layout(&game).state_file()).is_empty());
}

#[test]
fn test_unreachable_service_falls_back_to_local_artifact() {
    let game = TempDir::new().unwrap();
    let local = artifact(PACKAGE, "1.0.0", "local");
    layout(&game).ensure_dir().unwrap();
    layout(&game).install_current(&local).unwrap();

    let mut config = LoaderConfig::default();
    config.update.base_url = Some("http://127.0.0.1:9".to_string());
    config.update.timeout_secs = 2;
    let mut loader = stage_loader(config, None, SharedUi::default());

    let installed = loader.materialize(game.path()).unwrap();
    assert_eq!(installed.version.unwrap().as_str(), "1.0.0");
    assert_eq!(std::fs::read(layout(&game).current()).unwrap(), local);
}
