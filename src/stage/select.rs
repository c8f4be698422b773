//! Version selection between the on-disk artifact and embedded candidates.

use crate::archive::ArtifactHeader;
use crate::stage::search::Candidate;
use crate::version::Version;
use std::path::Path;
use tracing::{debug, warn};

/// Version of an artifact that declares itself as `package`.
///
/// A missing, unreadable or foreign header yields `None`, which loses to every
/// real version.
pub fn artifact_version(content: &[u8], package: &str) -> Option<Version> {
    match ArtifactHeader::read_from_bytes(content) {
        Ok(Some(header)) => header.version_for(package),
        Ok(None) => None,
        Err(e) => {
            debug!(error = %e, "Unreadable artifact header");
            None
        }
    }
}

/// [`artifact_version`] of a file. A missing file has no version.
pub fn file_version(path: &Path, package: &str) -> Option<Version> {
    if !path.is_file() {
        return None;
    }
    match ArtifactHeader::read_from_file(path) {
        Ok(Some(header)) => header.version_for(package),
        Ok(None) => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read artifact header");
            None
        }
    }
}

/// What was found where, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateReport {
    pub origin: String,
    pub version: Option<Version>,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub enum Selection {
    /// The on-disk artifact stays
    KeepCurrent,
    /// A candidate is strictly newer and should be copied into place
    Replace {
        candidate: Candidate,
        version: Version,
        content: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub current_version: Option<Version>,
    pub selection: Selection,
    /// The current artifact first, then every candidate in search order
    pub reports: Vec<CandidateReport>,
}

/// Pick the artifact to load.
///
/// The strictly greatest version wins, so ties keep the on-disk file and, among
/// candidates, the one found first. Candidates that cannot be read are skipped.
pub fn select_artifact(current: &Path, candidates: &[Candidate], package: &str) -> SelectionOutcome {
    let current_version = file_version(current, package);
    let mut reports = vec![CandidateReport {
        origin: current.display().to_string(),
        version: current_version.clone(),
        selected: false,
    }];

    let mut best_version = current_version.clone();
    let mut best: Option<(usize, Candidate, Version, Vec<u8>)> = None;

    for candidate in candidates {
        let content = match candidate.read() {
            Ok(content) => content,
            Err(e) => {
                warn!(candidate = %candidate, error = %e, "Failed to read candidate, skipping");
                reports.push(CandidateReport {
                    origin: candidate.to_string(),
                    version: None,
                    selected: false,
                });
                continue;
            }
        };

        let version = artifact_version(&content, package);
        debug!(candidate = %candidate, version = ?version.as_ref().map(Version::as_str), "Found candidate");
        reports.push(CandidateReport {
            origin: candidate.to_string(),
            version: version.clone(),
            selected: false,
        });

        if let Some(version) = version {
            if best_version.as_ref().map_or(true, |best| version > *best) {
                best_version = Some(version.clone());
                best = Some((reports.len() - 1, candidate.clone(), version, content));
            }
        }
    }

    let selection = match best {
        Some((index, candidate, version, content)) => {
            reports[index].selected = true;
            Selection::Replace {
                candidate,
                version,
                content,
            }
        }
        None => {
            reports[0].selected = current.is_file();
            Selection::KeepCurrent
        }
    };

    SelectionOutcome {
        current_version,
        selection,
        reports,
    }
}
