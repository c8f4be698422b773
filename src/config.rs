//! Configuration System
//!
//! Layered loader configuration: built-in defaults, the user's global file, the
//! game directory's files and finally `STAGELOADER__SECTION__KEY` environment
//! variables. See [`ConfigLoader`].

use crate::logging::LoggingConfig;
use crate::update::AutoUpdate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Prefix of environment variables overriding configuration values
pub const ENV_PREFIX: &str = "STAGELOADER";

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Directory under the game dir that holds all loader state
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Variant of the installed artifacts, one current artifact per stage and variant
    #[serde(default = "default_variant")]
    pub variant: String,

    /// Release branch queried on the update service
    #[serde(default = "default_branch")]
    pub branch: String,

    /// `true`, `false` or `with-prompt`; unset means `true`
    #[serde(default)]
    pub auto_update: Option<String>,

    #[serde(default)]
    pub update: UpdateConfig,

    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote update service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// `http(s)://` service root, or `file://` root of a local mirror. Unset disables remote updates.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_platform")]
    pub platform: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// How download progress is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiMode {
    /// Progress goes to the log
    Log,
    /// Progress is relayed to a `ui-helper` child process
    Forked,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_ui_mode")]
    pub mode: UiMode,

    /// Seconds a completed helper may take to exit before it is killed
    #[serde(default = "default_helper_grace_secs")]
    pub helper_grace_secs: u64,

    /// Minimum interval between forwarded progress updates
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

fn default_namespace() -> String {
    "stageloader".to_string()
}

fn default_variant() -> String {
    "default".to_string()
}

fn default_branch() -> String {
    "stable".to_string()
}

fn default_platform() -> String {
    "default".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_ui_mode() -> UiMode {
    UiMode::Log
}

fn default_helper_grace_secs() -> u64 {
    5
}

fn default_throttle_ms() -> u64 {
    100
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            variant: default_variant(),
            branch: default_branch(),
            auto_update: None,
            update: UpdateConfig::default(),
            ui: UiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            platform: default_platform(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            mode: default_ui_mode(),
            helper_grace_secs: default_helper_grace_secs(),
            throttle_ms: default_throttle_ms(),
        }
    }
}

impl UpdateConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl UiConfig {
    pub fn helper_grace(&self) -> Duration {
        Duration::from_secs(self.helper_grace_secs)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Loader(String),
    Update(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Loader(msg) => write!(f, "Loader: {}", msg),
            ValidationError::Update(msg) => write!(f, "Update: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl LoaderConfig {
    /// Effective auto-update mode
    pub fn auto_update_mode(&self) -> AutoUpdate {
        AutoUpdate::from_setting(self.auto_update.as_deref())
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (field, value) in [("namespace", &self.namespace), ("variant", &self.variant)] {
            if let Err(e) = validate_path_segment(value) {
                errors.push(ValidationError::Loader(format!("{}: {}", field, e)));
            }
        }
        if self.branch.trim().is_empty() {
            errors.push(ValidationError::Loader("branch cannot be empty".to_string()));
        }

        if let Some(base_url) = &self.update.base_url {
            let supported = ["http://", "https://", "file://"];
            if !supported.iter().any(|scheme| base_url.starts_with(scheme)) {
                errors.push(ValidationError::Update(format!(
                    "base_url must start with http://, https:// or file://, got '{}'",
                    base_url
                )));
            }
        }
        if self.update.platform.trim().is_empty() {
            errors.push(ValidationError::Update("platform cannot be empty".to_string()));
        }
        if self.update.timeout_secs == 0 {
            errors.push(ValidationError::Update("timeout_secs must be positive".to_string()));
        }

        if !["text", "json"].contains(&self.logging.format.as_str()) {
            errors.push(ValidationError::Logging(format!(
                "format must be 'text' or 'json', got '{}'",
                self.logging.format
            )));
        }
        if !["stdout", "stderr", "file"].contains(&self.logging.output.as_str()) {
            errors.push(ValidationError::Logging(format!(
                "output must be 'stdout', 'stderr' or 'file', got '{}'",
                self.logging.output
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn validate_path_segment(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("cannot be empty".to_string());
    }
    if value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(format!("'{}' must be a single directory name", value));
    }
    Ok(())
}
