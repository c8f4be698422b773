//! Integration tests for the stageloader bootstrap

mod config_layers;
mod diff_patch;
mod progress_channel;
mod stage_bootstrap;
mod test_utils;
mod update_flow;
mod version_ordering;
