//! In-memory view of a zip archive's entries

use crate::archive::{normalize_entry_name, parent_of};
use crate::error::ArchiveError;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Upper bound on the buffer reserved up front for one entry
const MAX_PRESIZE: u64 = 1 << 20;

/// Archive entries keyed by normalized path.
///
/// Directories are tracked explicitly but only ever exist as ancestors of at least
/// one file: inserting a file creates its parents, and removals cascade upward
/// through parents left empty. An archive's explicit empty directory entries are
/// not carried over when it is read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryTree {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

impl EntryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all file entries of the zip archive at `path`
    pub fn read(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Read all file entries from an in-memory zip archive
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArchiveError> {
        Self::from_reader(Cursor::new(bytes))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, ArchiveError> {
        let mut archive = ZipArchive::new(reader)?;
        let mut tree = Self::new();

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let name = normalize_entry_name(entry.name())?;
            // declared sizes are untrusted until the archive checksum is verified
            let mut content = Vec::with_capacity(entry.size().min(MAX_PRESIZE) as usize);
            entry.read_to_end(&mut content)?;
            tree.insert(name, content);
        }

        Ok(tree)
    }

    /// Insert or overwrite a file entry, creating its parent directories.
    ///
    /// `name` must already be normalized.
    pub fn insert(&mut self, name: String, content: Vec<u8>) {
        let mut parent = parent_of(&name);
        while let Some(dir) = parent {
            if !self.dirs.insert(dir.to_string()) {
                break;
            }
            parent = parent_of(dir);
        }
        self.files.insert(name, content);
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    pub fn contains_file(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn contains_dir(&self, name: &str) -> bool {
        self.dirs.contains(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.contains_file(name) || self.contains_dir(name)
    }

    /// Whether a directory still has any file or directory directly or indirectly below it
    pub fn has_children(&self, dir: &str) -> bool {
        let prefix = format!("{}/", dir);
        self.files
            .range(prefix.clone()..)
            .next()
            .map(|(name, _)| name.starts_with(&prefix))
            .unwrap_or(false)
            || self
                .dirs
                .range(prefix.clone()..)
                .next()
                .map(|name| name.starts_with(&prefix))
                .unwrap_or(false)
    }

    /// Delete a file, or a directory and everything below it.
    ///
    /// Returns whether anything was removed. Parents are left in place; see
    /// [`EntryTree::prune_empty_parents`].
    pub fn remove_recursively(&mut self, name: &str) -> bool {
        if self.files.remove(name).is_some() {
            return true;
        }
        if !self.dirs.remove(name) {
            return false;
        }

        let prefix = format!("{}/", name);
        self.files.retain(|path, _| !path.starts_with(&prefix));
        self.dirs.retain(|path| !path.starts_with(&prefix));
        true
    }

    /// Remove `name`'s ancestors that no longer have children, walking upward
    /// until a non-empty directory or the archive root is reached.
    pub fn prune_empty_parents(&mut self, name: &str) {
        let mut parent = parent_of(name);
        while let Some(dir) = parent {
            if self.has_children(dir) {
                break;
            }
            self.dirs.remove(dir);
            parent = parent_of(dir);
        }
    }

    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn dir_names(&self) -> impl Iterator<Item = &str> {
        self.dirs.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Serialize as a zip archive.
    ///
    /// Entries are sorted by name and carry a fixed timestamp and permissions, so
    /// equal trees always produce byte-identical archives.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<W, ArchiveError> {
        let file_options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);
        let dir_options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o755);

        let mut names: Vec<(String, Option<&[u8]>)> = self
            .dirs
            .iter()
            .map(|dir| (format!("{}/", dir), None))
            .chain(
                self.files
                    .iter()
                    .map(|(name, content)| (name.clone(), Some(content.as_slice()))),
            )
            .collect();
        names.sort_by(|a, b| a.0.cmp(&b.0));

        let mut zip = ZipWriter::new(writer);
        for (name, content) in names {
            match content {
                Some(content) => {
                    zip.start_file(name, file_options)?;
                    zip.write_all(content)?;
                }
                None => zip.add_directory(name, dir_options)?,
            }
        }
        Ok(zip.finish()?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArchiveError> {
        Ok(self.write_to(Cursor::new(Vec::new()))?.into_inner())
    }

    /// Write the archive next to `path` and rename it into place
    pub fn write_atomic(&self, path: &Path) -> Result<(), ArchiveError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = tempfile::Builder::new()
            .prefix("patch-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        let bytes = self.to_bytes()?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| ArchiveError::Io(e.error))?;
        Ok(())
    }
}
