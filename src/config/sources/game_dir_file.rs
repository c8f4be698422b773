//! Game directory config source: config/stageloader.toml and config/stageloader.{env}.toml

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::File;
use std::path::{Path, PathBuf};

/// Base config file inside a game directory
pub fn base_config_path(game_dir: &Path) -> PathBuf {
    game_dir.join("config").join("stageloader.toml")
}

/// Add game directory config files to builder.
/// Precedence: config/stageloader.toml (base) then config/stageloader.{STAGELOADER_ENV}.toml.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    game_dir: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let mut builder = builder;

    let base_config_path = base_config_path(game_dir);
    if base_config_path.exists() {
        builder = builder.add_source(File::from(base_config_path.as_path()).required(false));
    }

    if let Ok(env_name) = std::env::var("STAGELOADER_ENV") {
        let env_config_path = game_dir
            .join("config")
            .join(format!("stageloader.{}.toml", env_name));
        if env_config_path.exists() {
            builder = builder.add_source(File::from(env_config_path.as_path()).required(false));
        }
    }

    Ok(builder)
}
