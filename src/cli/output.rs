//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::LoaderError;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &LoaderError) -> String {
    match e {
        LoaderError::NoArtifact { .. } => format!(
            "{}\nhint: pass --search with a directory or archive holding the embedded artifact",
            e
        ),
        _ => format!("Error: {}", e),
    }
}
