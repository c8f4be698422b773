//! Layered configuration: defaults, global file, game directory files

use crate::integration::test_utils::with_xdg_config;
use stageloader::config::{ConfigLoader, UiMode};
use stageloader::update::AutoUpdate;
use tempfile::TempDir;

fn write(path: &std::path::Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[test]
fn test_defaults_without_any_file() {
    let xdg = TempDir::new().unwrap();
    let game = TempDir::new().unwrap();
    let config = with_xdg_config(&xdg, || ConfigLoader::load(game.path()).unwrap());

    assert_eq!(config.namespace, "stageloader");
    assert_eq!(config.variant, "default");
    assert_eq!(config.auto_update_mode(), AutoUpdate::Full);
    assert_eq!(config.ui.mode, UiMode::Log);
}

#[test]
fn test_game_dir_file_overrides_global_file() {
    let xdg = TempDir::new().unwrap();
    let game = TempDir::new().unwrap();
    write(
        &xdg.path().join("stageloader").join("config.toml"),
        r#"
branch = "beta"
variant = "global"

[update]
base_url = "https://updates.example.com"
"#,
    );
    write(
        &ConfigLoader::game_dir_config_path(game.path()),
        r#"
variant = "fabric"
auto_update = "with-prompt"

[update]
platform = "fabric_1-20-1"
"#,
    );

    let config = with_xdg_config(&xdg, || {
        assert_eq!(
            ConfigLoader::global_config_path().unwrap(),
            xdg.path().join("stageloader").join("config.toml")
        );
        ConfigLoader::load(game.path()).unwrap()
    });

    assert_eq!(config.branch, "beta");
    assert_eq!(config.variant, "fabric");
    assert_eq!(config.auto_update_mode(), AutoUpdate::Manual);
    assert_eq!(
        config.update.base_url.as_deref(),
        Some("https://updates.example.com")
    );
    assert_eq!(config.update.platform, "fabric_1-20-1");
    assert_eq!(config.update.timeout_secs, 30);
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_file_is_an_error() {
    let xdg = TempDir::new().unwrap();
    let game = TempDir::new().unwrap();
    write(
        &ConfigLoader::game_dir_config_path(game.path()),
        "[ui]\nmode = \"window\"\n",
    );
    let result = with_xdg_config(&xdg, || ConfigLoader::load(game.path()));
    assert!(result.is_err());
}
