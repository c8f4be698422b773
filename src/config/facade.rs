//! Entry point for loading [`LoaderConfig`].

use super::merge::merge_policy;
use super::sources::{game_dir_file, global_file};
use super::{LoaderConfig, ENV_PREFIX};
use config::{ConfigError, Environment, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads layered configuration
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a game directory.
    ///
    /// Sources, lowest precedence first: built-in defaults, the global file, the game
    /// directory's files, then `STAGELOADER__SECTION__KEY` environment variables.
    pub fn load(game_dir: &Path) -> Result<LoaderConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = game_dir_file::add_to_builder(builder, game_dir)?;
        let builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let config: LoaderConfig = builder.build()?.try_deserialize()?;
        debug!(
            game_dir = %game_dir.display(),
            namespace = %config.namespace,
            variant = %config.variant,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Load configuration from a single file on top of the defaults
    pub fn load_from_file(path: &Path) -> Result<LoaderConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()
    }

    /// Path of the global config file, if one can be determined
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    /// Path of the base config file inside a game directory
    pub fn game_dir_config_path(game_dir: &Path) -> PathBuf {
        game_dir_file::base_config_path(game_dir)
    }
}
