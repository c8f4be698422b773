//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources override earlier ones key by key; tables are merged, not replaced.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("namespace", "stageloader")?
        .set_default("variant", "default")?
        .set_default("branch", "stable")?
        .set_default("update.platform", "default")?
        .set_default("update.timeout_secs", 30)?
        .set_default("ui.mode", "log")
}
