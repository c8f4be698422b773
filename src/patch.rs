//! Applies diff archives to a target archive.
//!
//! A diff is itself a zip archive with up to three root directories:
//! - `-/…` entries are removed from the target (empty parents are cleaned up)
//! - `~/…` entries replace the corresponding target entries
//! - `+/…` entries are added to the target, overwriting anything already there
//!
//! `~` and `+` are applied identically; the split only makes diffs easier to read.
//! The patched archive is rewritten in a canonical form (sorted entries, fixed
//! timestamps), so identical logical content always yields identical bytes.

use crate::archive::{normalize_entry_name, parent_of, EntryTree};
use crate::error::{ArchiveError, PatchError};
use std::path::Path;
use tracing::{debug, info};

pub const REMOVE_ROOT: &str = "-";
pub const REPLACE_ROOT: &str = "~";
pub const ADD_ROOT: &str = "+";

/// Summary of one patch application
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub removed: usize,
    pub replaced: usize,
    pub added: usize,
}

/// Change-set extracted from a diff archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub removed: Vec<String>,
    pub replaced: Vec<(String, Vec<u8>)>,
    pub added: Vec<(String, Vec<u8>)>,
}

impl ChangeSet {
    /// Split a diff archive's files into their `-`, `~` and `+` trees.
    /// Files outside those roots are ignored.
    pub fn from_diff(diff: &EntryTree) -> Result<Self, ArchiveError> {
        let mut change_set = ChangeSet::default();
        for name in diff.file_names() {
            let Some((root, relative)) = name.split_once('/') else {
                continue;
            };
            let relative = normalize_entry_name(relative)?;
            match root {
                REMOVE_ROOT => change_set.removed.push(relative),
                REPLACE_ROOT => change_set
                    .replaced
                    .push((relative, diff.get(name).unwrap_or_default().to_vec())),
                ADD_ROOT => change_set
                    .added
                    .push((relative, diff.get(name).unwrap_or_default().to_vec())),
                _ => continue,
            }
        }
        Ok(change_set)
    }

    /// Build the diff archive for this change-set
    pub fn to_diff(&self) -> EntryTree {
        let mut diff = EntryTree::new();
        for name in &self.removed {
            diff.insert(format!("{}/{}", REMOVE_ROOT, name), Vec::new());
        }
        for (name, content) in &self.replaced {
            diff.insert(format!("{}/{}", REPLACE_ROOT, name), content.clone());
        }
        for (name, content) in &self.added {
            diff.insert(format!("{}/{}", ADD_ROOT, name), content.clone());
        }
        diff
    }

    /// Apply to an in-memory tree: removals first, then replacements, then additions
    pub fn apply_to(&self, target: &mut EntryTree) -> Result<PatchReport, PatchError> {
        let mut report = PatchReport::default();

        for name in &self.removed {
            if remove(target, name) {
                report.removed += 1;
            }
        }
        for (name, content) in &self.replaced {
            add(target, name, content)?;
            report.replaced += 1;
        }
        for (name, content) in &self.added {
            add(target, name, content)?;
            report.added += 1;
        }

        Ok(report)
    }
}

/// Apply the diff archive at `diff_file` to `target_file` in place
pub fn apply(target_file: &Path, diff_file: &Path) -> Result<PatchReport, PatchError> {
    let diff = EntryTree::read(diff_file)?;
    let change_set = ChangeSet::from_diff(&diff)?;

    let mut target = EntryTree::read(target_file)?;
    let report = change_set.apply_to(&mut target)?;
    target.write_atomic(target_file)?;

    info!(
        target = %target_file.display(),
        diff = %diff_file.display(),
        removed = report.removed,
        replaced = report.replaced,
        added = report.added,
        "Applied diff"
    );
    Ok(report)
}

fn remove(target: &mut EntryTree, name: &str) -> bool {
    if !target.remove_recursively(name) {
        debug!(entry = name, "Entry to remove is already absent");
        return false;
    }
    target.prune_empty_parents(name);
    true
}

fn add(target: &mut EntryTree, name: &str, content: &[u8]) -> Result<(), PatchError> {
    if target.exists(name) {
        target.remove_recursively(name);
    }

    let mut parent = parent_of(name);
    while let Some(dir) = parent {
        if target.contains_file(dir) {
            return Err(PatchError::Conflict {
                path: name.to_string(),
                existing: dir.to_string(),
            });
        }
        parent = parent_of(dir);
    }

    target.insert(name.to_string(), content.to_vec());
    Ok(())
}
