//! Stageloader CLI Binary
//!
//! Command-line interface for inspecting and driving the staged bootstrap, and
//! the `ui-helper` process that forked progress UIs talk to.

use anyhow::Context;
use clap::Parser;
use stageloader::cli::{map_error, Cli, Commands, RunContext};
use stageloader::config::ConfigLoader;
use stageloader::logging::{init_logging, LoggingConfig};
use stageloader::ui::{self, FanoutUi, LoaderUi, TracingUi, TranscriptUi};
use std::io::{self, BufReader};
use std::path::Path;
use std::process;
use tracing::{error, info};

fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    if let Commands::UiHelper { transcript } = &cli.command {
        if let Err(e) = run_ui_helper(transcript.as_deref()) {
            error!("UI helper failed: {:#}", e);
            eprintln!("{:#}", e);
            process::exit(1);
        }
        return;
    }

    info!("Stageloader CLI starting");

    let context = match RunContext::new(cli.game_dir.clone(), cli.config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Error loading configuration: {}", e);
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    }
}

/// Serve UI frames from stdin until the parent completes or goes away
fn run_ui_helper(transcript: Option<&Path>) -> anyhow::Result<()> {
    let mut uis: Vec<Box<dyn LoaderUi>> = vec![Box::new(TracingUi::new())];
    if let Some(path) = transcript {
        let transcript = TranscriptUi::create(path)
            .with_context(|| format!("Failed to open transcript {}", path.display()))?;
        uis.push(Box::new(transcript));
    }
    let mut fanout = FanoutUi::new(uis);

    let stdin = io::stdin();
    ui::serve(BufReader::new(stdin.lock()), &mut fanout).context("Failed to read UI frames")?;
    Ok(())
}

/// Build logging configuration from CLI args, environment, and config file
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = if let Some(ref config_path) = cli.config {
        ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    } else {
        ConfigLoader::load(&cli.game_dir)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    };

    // Without --verbose only warnings reach the terminal
    if cli.quiet {
        config.level = "error".to_string();
    } else if cli.verbose {
        config.level = "debug".to_string();
    } else if config.level == "info" {
        config.level = "warn".to_string();
    }

    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = Some(file.clone());
    }

    config
}
