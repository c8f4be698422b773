//! Error types for the staged bootstrap loader.

use std::path::PathBuf;
use thiserror::Error;

/// Archive reading/writing errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid entry name: {0}")]
    InvalidEntryName(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),
}

/// Diff application errors
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Patch I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot write {path}: {existing} is a file, not a directory")]
    Conflict { path: String, existing: String },
}

/// Remote update errors. All of these are transient from the loader's point of view.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Unexpected response from update service: {0}")]
    InvalidResponse(String),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Update I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to apply update diff: {0}")]
    Patch(#[from] PatchError),

    #[error("Update metadata error: {0}")]
    Metadata(String),

    #[error("Async runtime error: {0}")]
    Runtime(String),
}

impl From<reqwest::Error> for UpdateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UpdateError::InvalidResponse(err.to_string())
        } else {
            UpdateError::Http(err.to_string())
        }
    }
}

/// Bootstrap errors surfaced to the embedding environment.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),

    #[error("Update error: {0}")]
    Update(#[from] UpdateError),

    #[error("No artifact available for {stage}/{variant}: nothing on disk and no valid embedded candidate")]
    NoArtifact { stage: String, variant: String },

    #[error("Entry point {entry_point} not found in loading context {context}")]
    EntryPointNotFound { entry_point: String, context: String },

    #[error("Loaded by unexpected context: expected {expected}, got {actual}")]
    WrongContext { expected: String, actual: String },

    #[error("Stage failed: {0}")]
    StageFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LoaderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoaderError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<config::ConfigError> for LoaderError {
    fn from(err: config::ConfigError) -> Self {
        LoaderError::ConfigError(err.to_string())
    }
}
