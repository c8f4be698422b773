//! CLI parse: clap types for stageloader. No behavior; definitions only.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Stageloader CLI - inspect and drive the staged bootstrap
#[derive(Parser)]
#[command(name = "stageloader")]
#[command(about = "Self-updating multi-stage bootstrap loader")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Game directory holding the loader state
    #[arg(long, global = true, default_value = ".")]
    pub game_dir: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare two version strings
    Compare {
        a: String,
        b: String,
    },
    /// Print the content hash of a file
    Checksum {
        file: PathBuf,
    },
    /// Apply a diff archive to a target archive in place
    Patch {
        target: PathBuf,
        diff: PathBuf,
    },
    /// Show the on-disk artifact and every embedded candidate of a stage
    Inspect {
        #[command(flatten)]
        stage: StageArgs,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Update and materialize a stage's artifact without loading it
    Bootstrap {
        #[command(flatten)]
        stage: StageArgs,

        /// Install updates without asking, even in with-prompt mode
        #[arg(long)]
        yes: bool,
    },
    /// Helper-process entry point: read UI frames from stdin
    UiHelper {
        /// Append every received event to this file
        #[arg(long)]
        transcript: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct StageArgs {
    /// Stage directory under <namespace>/loader/
    #[arg(long, default_value = "stage2")]
    pub stage: String,

    /// Package name the artifact header must declare
    #[arg(long)]
    pub package: String,

    /// Directory or archive searched for embedded artifacts (repeatable)
    #[arg(long = "search")]
    pub search: Vec<PathBuf>,

    /// Directory whose package archives are added to the search path
    #[arg(long)]
    pub packages_dir: Option<PathBuf>,

    /// Override the configured variant
    #[arg(long)]
    pub variant: Option<String>,
}
