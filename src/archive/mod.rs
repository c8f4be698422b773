//! Archive handling: in-memory entry trees, header records and deterministic output

pub mod header;
pub mod tree;

pub use header::{ArtifactHeader, HEADER_ENTRY};
pub use tree::EntryTree;

use crate::error::ArchiveError;

/// Normalize an archive entry name to `a/b/c` form.
///
/// Backslashes become `/`, leading `./` and trailing `/` are dropped. Absolute
/// names, empty names and names containing `..` are rejected so a diff can never
/// write outside the archive root.
pub fn normalize_entry_name(name: &str) -> Result<String, ArchiveError> {
    let unified = name.replace('\\', "/");
    if unified.starts_with('/') {
        return Err(ArchiveError::InvalidEntryName(name.to_string()));
    }

    let mut parts = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(ArchiveError::InvalidEntryName(name.to_string())),
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return Err(ArchiveError::InvalidEntryName(name.to_string()));
    }
    Ok(parts.join("/"))
}

/// Parent directory of a normalized entry name, `None` at the archive root.
pub fn parent_of(name: &str) -> Option<&str> {
    name.rfind('/').map(|idx| &name[..idx])
}
