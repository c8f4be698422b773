//! CLI domain: parse, route and output only.
//! No domain orchestration; single route table dispatches to domain services.

mod output;
mod parse;
mod prompt;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, StageArgs};
pub use prompt::TerminalPrompt;
pub use route::RunContext;
