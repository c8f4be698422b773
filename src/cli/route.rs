//! CLI route: single route table and run context. Dispatches to domain services.

use crate::checksum;
use crate::cli::parse::{Commands, StageArgs};
use crate::cli::prompt::TerminalPrompt;
use crate::config::{ConfigLoader, LoaderConfig};
use crate::error::LoaderError;
use crate::patch;
use crate::stage::{BootstrapContext, SearchPath, SearchRoot, StageLoader, StageSpec};
use crate::ui::{self, SharedUi};
use crate::update::{FixedAnswer, UpdatePrompt, Updater};
use crate::version;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Depth below `--packages-dir` searched for package archives
const PACKAGE_SCAN_DEPTH: usize = 2;

/// Runtime context for CLI execution: game directory and resolved configuration.
/// Built from the game directory and optional config path using ConfigLoader only.
pub struct RunContext {
    game_dir: PathBuf,
    config: LoaderConfig,
}

impl RunContext {
    pub fn new(game_dir: PathBuf, config_path: Option<PathBuf>) -> Result<Self, LoaderError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&game_dir)?,
        };
        Ok(Self::with_config(game_dir, config))
    }

    pub fn with_config(game_dir: PathBuf, config: LoaderConfig) -> Self {
        Self { game_dir, config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn game_dir(&self) -> &Path {
        &self.game_dir
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, LoaderError> {
        match command {
            Commands::Compare { a, b } => Ok(Self::handle_compare(a, b)),
            Commands::Checksum { file } => Self::handle_checksum(file),
            Commands::Patch { target, diff } => Self::handle_patch(target, diff),
            Commands::Inspect { stage, format } => self.handle_inspect(stage, format),
            Commands::Bootstrap { stage, yes } => self.handle_bootstrap(stage, *yes),
            Commands::UiHelper { .. } => Err(LoaderError::ConfigError(
                "ui-helper reads from stdin and must run as its own process".to_string(),
            )),
        }
    }

    fn handle_compare(a: &str, b: &str) -> String {
        match version::compare(a, b) {
            Ordering::Less => "<",
            Ordering::Equal => "=",
            Ordering::Greater => ">",
        }
        .to_string()
    }

    fn handle_checksum(file: &Path) -> Result<String, LoaderError> {
        let hash = checksum::try_of_file(file).map_err(|e| LoaderError::io(file, e))?;
        Ok(hash.to_string())
    }

    fn handle_patch(target: &Path, diff: &Path) -> Result<String, LoaderError> {
        let report = patch::apply(target, diff)?;
        Ok(format!(
            "Patched {}: {} removed, {} replaced, {} added",
            target.display(),
            report.removed,
            report.replaced,
            report.added
        ))
    }

    fn handle_inspect(&self, args: &StageArgs, format: &str) -> Result<String, LoaderError> {
        let bootstrap = self.bootstrap_context(args, None)?;
        let loader = StageLoader::new(
            Arc::clone(&bootstrap),
            stage_spec(args),
            Arc::clone(bootstrap.host_context()),
        );
        let layout = loader.layout(&self.game_dir);
        let outcome = loader.inspect(&self.game_dir);

        if format == "json" {
            let candidates: Vec<_> = outcome
                .reports
                .iter()
                .map(|report| {
                    json!({
                        "origin": report.origin,
                        "version": report.version.as_ref().map(|v| v.as_str()),
                        "selected": report.selected,
                    })
                })
                .collect();
            let value = json!({
                "stage": args.stage,
                "variant": bootstrap.config().variant,
                "current": layout.current(),
                "candidates": candidates,
            });
            return serde_json::to_string_pretty(&value)
                .map_err(|e| LoaderError::ConfigError(format!("Failed to render JSON: {}", e)));
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Origin", "Version", "Selected"]);
        for report in &outcome.reports {
            let version = report
                .version
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            let selected = if report.selected { "yes" } else { "" };
            table.add_row(vec![report.origin.as_str(), version.as_str(), selected]);
        }

        let title = format!("{}/{}", args.stage, bootstrap.config().variant);
        Ok(format!(
            "{}\n{}\n{}",
            title.bold().underline(),
            layout.dir().display().dimmed(),
            table
        ))
    }

    fn handle_bootstrap(&self, args: &StageArgs, yes: bool) -> Result<String, LoaderError> {
        let prompt: Arc<dyn UpdatePrompt> = if yes {
            Arc::new(FixedAnswer(Some(true)))
        } else {
            Arc::new(TerminalPrompt)
        };
        let bootstrap = self.bootstrap_context(args, Some(prompt))?;
        let mut loader = StageLoader::new(
            Arc::clone(&bootstrap),
            stage_spec(args),
            Arc::clone(bootstrap.host_context()),
        );

        let artifact = loader.materialize(&self.game_dir)?;
        info!(
            stage = %args.stage,
            variant = %bootstrap.config().variant,
            path = %artifact.path.display(),
            "Stage materialized"
        );

        let version = artifact
            .version
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(format!(
            "{} {} {}\n  path:     {}\n  checksum: {}",
            "Materialized".green().bold(),
            artifact.package,
            version,
            artifact.path.display(),
            artifact.checksum
        ))
    }

    fn bootstrap_context(
        &self,
        args: &StageArgs,
        prompt: Option<Arc<dyn UpdatePrompt>>,
    ) -> Result<Arc<BootstrapContext>, LoaderError> {
        let mut config = self.config.clone();
        if let Some(variant) = &args.variant {
            config.variant = variant.clone();
        }
        if let Err(errors) = config.validate() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Err(LoaderError::ConfigError(messages.join("; ")));
        }

        let search_path = search_path(args)?;
        debug!(roots = search_path.roots().len(), "Search path ready");

        let updater = match prompt {
            Some(prompt) => Updater::from_config(&config)?.map(|u| u.with_prompt(prompt)),
            None => None,
        };
        let ui = SharedUi::new(ui::from_config(&config.ui));

        Ok(BootstrapContext::builder(config)
            .search_path(search_path)
            .updater(updater)
            .ui(ui)
            .build())
    }
}

fn stage_spec(args: &StageArgs) -> StageSpec {
    StageSpec::new(args.stage.as_str(), args.package.as_str(), "")
}

fn search_path(args: &StageArgs) -> Result<SearchPath, LoaderError> {
    let mut search_path = SearchPath::new();
    for root in &args.search {
        if root.is_dir() {
            search_path.push(SearchRoot::Directory(root.clone()));
        } else {
            search_path.push(SearchRoot::Archive(root.clone()));
        }
    }
    if let Some(dir) = &args.packages_dir {
        search_path.scan_packages(dir, PACKAGE_SCAN_DEPTH)?;
    }
    Ok(search_path)
}
