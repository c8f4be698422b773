//! Interactive answer for with-prompt updates.

use crate::update::UpdatePrompt;
use crate::version::Version;
use dialoguer::Confirm;
use tracing::warn;

/// Asks on the controlling terminal. Without a terminal there is no answer and
/// the question is repeated on the next boot.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl UpdatePrompt for TerminalPrompt {
    fn confirm(&self, version: &Version) -> Option<bool> {
        match Confirm::new()
            .with_prompt(format!("Install update {}?", version))
            .default(true)
            .interact_opt()
        {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "Cannot ask for update consent");
                None
            }
        }
    }
}
