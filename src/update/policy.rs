//! When to install updates, and who to ask.

use crate::version::Version;
use std::fmt;

pub const WITH_PROMPT: &str = "with-prompt";

/// How eagerly newer releases are installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoUpdate {
    /// Install whatever the update service offers
    Full,
    /// Queue newer releases and install them once the user agrees
    Manual,
    /// No network beyond the initial download
    Off,
}

impl AutoUpdate {
    /// Parse the `auto_update` setting: unset means `Full`, `with-prompt` means
    /// `Manual`, anything else is read as a boolean.
    pub fn from_setting(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None => AutoUpdate::Full,
            Some(value) if value.eq_ignore_ascii_case(WITH_PROMPT) => AutoUpdate::Manual,
            Some(value) if value.eq_ignore_ascii_case("true") => AutoUpdate::Full,
            Some(_) => AutoUpdate::Off,
        }
    }
}

impl fmt::Display for AutoUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutoUpdate::Full => f.write_str("true"),
            AutoUpdate::Manual => f.write_str(WITH_PROMPT),
            AutoUpdate::Off => f.write_str("false"),
        }
    }
}

/// Asks whether a queued release may be installed.
///
/// `None` means no answer could be obtained; the question is asked again on the
/// next boot.
pub trait UpdatePrompt: Send + Sync {
    fn confirm(&self, version: &Version) -> Option<bool>;
}

/// Prompt that always gives the same answer, for headless setups
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub Option<bool>);

impl UpdatePrompt for FixedAnswer {
    fn confirm(&self, _version: &Version) -> Option<bool> {
        self.0
    }
}
