//! Stageloader: Self-Updating Multi-Stage Bootstrap Loader
//!
//! A small, rarely changing first stage locates the artifact of the next stage,
//! brings it up to date from pending updates, a remote update service and
//! embedded copies, then loads it into an isolated context. Each stage repeats
//! the same steps for the stage after it.

pub mod archive;
pub mod checksum;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod patch;
pub mod stage;
pub mod ui;
pub mod update;
pub mod version;
