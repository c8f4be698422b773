//! Content identity for artifacts using BLAKE3
//!
//! Only used to answer "did this artifact change"; it is not a security boundary.

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::warn;

/// Content hash of an artifact.
///
/// `Unknown` stands in for a hash that could not be computed. It never compares
/// equal to anything, including another `Unknown`, so a failed read always looks
/// like a change and forces a re-materialize instead of a false skip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum ContentHash {
    Known(String),
    Unknown,
}

impl ContentHash {
    pub fn as_hex(&self) -> Option<&str> {
        match self {
            ContentHash::Known(hex) => Some(hex),
            ContentHash::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, ContentHash::Known(_))
    }

    /// Compare against a hex digest published elsewhere (update service, meta file).
    pub fn matches(&self, hex_digest: &str) -> bool {
        match self {
            ContentHash::Known(hex) => hex.eq_ignore_ascii_case(hex_digest),
            ContentHash::Unknown => false,
        }
    }
}

impl PartialEq for ContentHash {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ContentHash::Known(a), ContentHash::Known(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentHash::Known(hex) => f.write_str(hex),
            ContentHash::Unknown => f.write_str("unknown"),
        }
    }
}

impl From<Option<String>> for ContentHash {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(hex) => ContentHash::Known(hex),
            None => ContentHash::Unknown,
        }
    }
}

impl From<ContentHash> for Option<String> {
    fn from(value: ContentHash) -> Self {
        match value {
            ContentHash::Known(hex) => Some(hex),
            ContentHash::Unknown => None,
        }
    }
}

/// Compute the content hash of in-memory bytes
pub fn of_bytes(content: &[u8]) -> ContentHash {
    let mut hasher = Hasher::new();
    hasher.update(content);
    ContentHash::Known(hex::encode(hasher.finalize().as_bytes()))
}

/// Compute the content hash of a file, logging and returning `Unknown` on error
pub fn of_file(path: &Path) -> ContentHash {
    match try_of_file(path) {
        Ok(hash) => hash,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to compute checksum");
            ContentHash::Unknown
        }
    }
}

/// Compute the content hash of a file, streaming its contents
pub fn try_of_file(path: &Path) -> io::Result<ContentHash> {
    let mut file = File::open(path)?;
    let mut hasher = Hasher::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(ContentHash::Known(hex::encode(hasher.finalize().as_bytes())))
}
