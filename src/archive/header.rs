//! Artifact header records.
//!
//! Every stage artifact carries a manifest-style key/value record at
//! [`HEADER_ENTRY`]. The loader only trusts an artifact's version when the
//! record's `Name` matches the package it expects.

use crate::error::ArchiveError;
use crate::version::Version;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

/// Location of the header record inside an artifact
pub const HEADER_ENTRY: &str = "META-INF/MANIFEST.MF";

pub const NAME_KEY: &str = "Name";
pub const VERSION_KEY: &str = "Version";

/// Parsed header record.
///
/// Only the main section (everything before the first blank line) is kept.
/// Keys are matched case-insensitively and continuation lines (leading single
/// space) are folded into the previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactHeader {
    attributes: Vec<(String, String)>,
}

impl ArtifactHeader {
    pub fn new(name: &str, version: &str) -> Self {
        let mut header = Self::default();
        header.set(NAME_KEY, name);
        header.set(VERSION_KEY, version);
        header
    }

    pub fn parse(text: &str) -> Self {
        let mut attributes: Vec<(String, String)> = Vec::new();

        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                break;
            }
            if let Some(continuation) = line.strip_prefix(' ') {
                if let Some((_, value)) = attributes.last_mut() {
                    value.push_str(continuation);
                }
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                attributes.push((key.trim().to_string(), value.trim().to_string()));
            }
        }

        Self { attributes }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        match self
            .attributes
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((key.to_string(), value.to_string())),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.get(NAME_KEY)
    }

    pub fn version(&self) -> Option<&str> {
        self.get(VERSION_KEY)
    }

    /// The artifact's version, if it declares itself as `expected_name`.
    ///
    /// `None` is the "version -1" of the selection rules: it loses to every
    /// real version.
    pub fn version_for(&self, expected_name: &str) -> Option<Version> {
        if self.name() != Some(expected_name) {
            return None;
        }
        self.version()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(Version::new)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.attributes {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Read the header of a zip archive. `Ok(None)` when the archive has no header entry.
    pub fn read_from_archive<R: Read + Seek>(reader: R) -> Result<Option<Self>, ArchiveError> {
        let mut archive = ZipArchive::new(reader)?;
        let mut entry = match archive.by_name(HEADER_ENTRY) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        Ok(Some(Self::parse(&text)))
    }

    pub fn read_from_bytes(bytes: &[u8]) -> Result<Option<Self>, ArchiveError> {
        Self::read_from_archive(Cursor::new(bytes))
    }

    pub fn read_from_file(path: &Path) -> Result<Option<Self>, ArchiveError> {
        let file = std::fs::File::open(path)?;
        Self::read_from_archive(std::io::BufReader::new(file))
    }
}
