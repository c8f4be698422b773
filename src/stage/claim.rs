//! First-claimant-wins registry for stage loads.
//!
//! Several independently embedded copies of a stage may run in the same process.
//! Only the first to claim a (stage, variant) pair goes on to load it; the others
//! back off and report success.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StageKey {
    pub stage: String,
    pub variant: String,
}

impl StageKey {
    pub fn new(stage: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            variant: variant.into(),
        }
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stage, self.variant)
    }
}

#[derive(Debug, Default)]
pub struct ClaimRegistry {
    claimed: Mutex<HashSet<StageKey>>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. Returns `false` if someone else already holds it.
    pub fn try_claim(&self, key: &StageKey) -> bool {
        self.claimed.lock().insert(key.clone())
    }

    pub fn is_claimed(&self, key: &StageKey) -> bool {
        self.claimed.lock().contains(key)
    }
}
