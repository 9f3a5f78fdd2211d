//! Fail-fast checks run before any network activity.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("required tool not found on PATH: {0}")]
    MissingTool(&'static str),

    #[error("missing local exercise directories:\n{}", format_paths(.0))]
    MissingLocalDirs(Vec<PathBuf>),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Verify every external binary the transfer will spawn is on PATH.
pub fn require_tools(tools: &[&'static str]) -> Result<(), PreflightError> {
    for tool in tools {
        if which::which(tool).is_err() {
            return Err(PreflightError::MissingTool(tool));
        }
    }
    Ok(())
}

/// Verify every resolved exercise directory exists locally, listing all
/// missing ones at once rather than stopping at the first.
pub fn require_local_dirs(paths: &[PathBuf]) -> Result<(), PreflightError> {
    let missing: Vec<PathBuf> = paths.iter().filter(|p| !p.is_dir()).cloned().collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PreflightError::MissingLocalDirs(missing))
    }
}
