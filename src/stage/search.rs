//! Search path for embedded stage artifacts.
//!
//! A root is either a directory, in which case the logical resource path is
//! joined onto it, or an archive (an extension package) that embeds the
//! resource as an entry.

use crate::error::{ArchiveError, LoaderError};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::ZipArchive;

/// File extensions treated as packages when scanning a directory
pub const PACKAGE_EXTENSIONS: &[&str] = &["pkg", "zip", "jar"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchRoot {
    Directory(PathBuf),
    Archive(PathBuf),
}

impl SearchRoot {
    fn locate(&self, resource: &str) -> Result<Option<Candidate>, ArchiveError> {
        match self {
            SearchRoot::Directory(dir) => {
                let path = resource
                    .split('/')
                    .fold(dir.clone(), |path, segment| path.join(segment));
                Ok(path.is_file().then_some(Candidate::Loose(path)))
            }
            SearchRoot::Archive(archive) => {
                let mut zip = ZipArchive::new(BufReader::new(File::open(archive)?))?;
                let present = match zip.by_name(resource) {
                    Ok(_) => true,
                    Err(ZipError::FileNotFound) => false,
                    Err(e) => return Err(e.into()),
                };
                Ok(present.then(|| Candidate::Embedded {
                    archive: archive.clone(),
                    entry: resource.to_string(),
                }))
            }
        }
    }
}

impl fmt::Display for SearchRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchRoot::Directory(dir) => write!(f, "{}", dir.display()),
            SearchRoot::Archive(archive) => write!(f, "{}!", archive.display()),
        }
    }
}

/// Ordered list of places that may embed the next stage
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    roots: Vec<SearchRoot>,
}

impl SearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.roots.push(SearchRoot::Directory(dir.into()));
        self
    }

    pub fn with_archive(mut self, archive: impl Into<PathBuf>) -> Self {
        self.roots.push(SearchRoot::Archive(archive.into()));
        self
    }

    pub fn push(&mut self, root: SearchRoot) {
        self.roots.push(root);
    }

    pub fn roots(&self) -> &[SearchRoot] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Add every package under `dir` (up to `max_depth` levels) as an archive root.
    ///
    /// Packages are added in file-name order so the search path is the same on
    /// every run. A missing directory adds nothing.
    pub fn scan_packages(&mut self, dir: &Path, max_depth: usize) -> Result<usize, LoaderError> {
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "Package directory does not exist");
            return Ok(0);
        }

        let mut found = Vec::new();
        let walker = WalkDir::new(dir)
            .follow_links(false)
            .max_depth(max_depth)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|e| {
                LoaderError::io(
                    dir,
                    io::Error::new(
                        io::ErrorKind::Other,
                        format!("Failed to walk directory: {}", e),
                    ),
                )
            })?;
            if entry.file_type().is_file() && is_package(entry.path()) {
                found.push(entry.into_path());
            }
        }

        debug!(dir = %dir.display(), packages = found.len(), "Scanned package directory");
        let count = found.len();
        self.roots.extend(found.into_iter().map(SearchRoot::Archive));
        Ok(count)
    }

    /// Every root holding `resource`, in search order.
    ///
    /// A root that cannot be inspected is logged and skipped.
    pub fn candidates(&self, resource: &str) -> Vec<Candidate> {
        self.roots
            .iter()
            .filter_map(|root| match root.locate(resource) {
                Ok(found) => found,
                Err(e) => {
                    warn!(root = %root, resource, error = %e, "Skipping unreadable search root");
                    None
                }
            })
            .collect()
    }
}

fn is_package(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            PACKAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// One place the next stage's artifact was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Loose(PathBuf),
    Embedded { archive: PathBuf, entry: String },
}

impl Candidate {
    /// Read the candidate's bytes
    pub fn read(&self) -> Result<Vec<u8>, ArchiveError> {
        match self {
            Candidate::Loose(path) => Ok(fs::read(path)?),
            Candidate::Embedded { archive, entry } => {
                let mut zip = ZipArchive::new(BufReader::new(File::open(archive)?))?;
                let mut content = Vec::new();
                let mut file = zip.by_name(entry)?;
                file.read_to_end(&mut content)?;
                drop(file);
                Ok(content)
            }
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Candidate::Loose(path) => write!(f, "{}", path.display()),
            Candidate::Embedded { archive, entry } => {
                write!(f, "{}!/{}", archive.display(), entry)
            }
        }
    }
}
