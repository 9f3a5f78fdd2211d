//! Path safety checks that gate every destructive operation.
//!
//! The gateway cleanup step runs `rm -rf` on a remote directory, so every
//! configured path must be certified here before any hop is allowed to start.
//! All checks are pure string/path manipulation: normalization is lexical
//! (`.` and `..` components are folded without touching the filesystem), so a
//! symlink inside the local root can never redirect a check outside it.
//!
//! Any violation is fatal to the whole invocation; nothing here is retried or
//! downgraded to a warning.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::config::TransferConfig;

/// Reserved final segment of both staging directories.
const SHARED_SEGMENT: &str = "shared";

const GLOB_CHARS: [char; 4] = ['*', '?', '[', ']'];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{label} must be an absolute path: {path}")]
    NotAbsolute { label: String, path: String },

    #[error("{label} cannot be the filesystem root")]
    Root { label: String },

    #[error("{label} must end with '/{SHARED_SEGMENT}': {path}")]
    NotShared { label: String, path: String },

    #[error("EXERCISE_DIRS is empty")]
    NoExercises,

    #[error("EXERCISE_DIRS contains an empty entry")]
    EmptyEntry,

    #[error("EXERCISE_DIRS contains glob characters: {0}")]
    GlobEntry(String),

    #[error("EXERCISE_DIRS contains an unsafe path: {0}")]
    UnsafeEntry(String),

    #[error("EXERCISE_DIRS entry points at the local root itself: {0}")]
    PointsAtRoot(String),

    #[error("EXERCISE_DIRS entry is outside the local root: {0}")]
    OutsideRoot(String),
}

/// Fold `.` and `..` components without consulting the filesystem.
///
/// `..` at the root stays at the root; `..` at the start of a relative path
/// is preserved so callers can detect upward escapes.
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                match out.components().next_back() {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    Some(Component::RootDir) => {}
                    _ => out.push(".."),
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Fail unless `path` is absolute and does not normalize to `/`.
pub fn validate_absolute_non_root(label: &str, path: &Path) -> Result<(), ValidationError> {
    if !path.is_absolute() {
        return Err(ValidationError::NotAbsolute {
            label: label.to_string(),
            path: path.display().to_string(),
        });
    }
    if normalize_lexical(path) == Path::new("/") {
        return Err(ValidationError::Root {
            label: label.to_string(),
        });
    }
    Ok(())
}

/// Fail unless the final segment of `path` is exactly `shared`.
pub fn validate_shared_suffix(label: &str, path: &Path) -> Result<(), ValidationError> {
    validate_absolute_non_root(label, path)?;
    let normalized = normalize_lexical(path);
    if normalized.file_name().and_then(|n| n.to_str()) != Some(SHARED_SEGMENT) {
        return Err(ValidationError::NotShared {
            label: label.to_string(),
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// Certify every exercise directory name against the local root.
///
/// Returns the resolved absolute path for each entry on success. Every entry
/// must be non-empty, free of glob metacharacters, and resolve strictly
/// inside `local_root` without equalling it.
pub fn validate_exercise_set(
    local_root: &Path,
    names: &[String],
) -> Result<Vec<PathBuf>, ValidationError> {
    if names.is_empty() {
        return Err(ValidationError::NoExercises);
    }
    validate_absolute_non_root("LOCAL_PARALLEL", local_root)?;
    let root = normalize_lexical(local_root);

    let mut resolved = Vec::with_capacity(names.len());
    for raw in names {
        if raw.is_empty() {
            return Err(ValidationError::EmptyEntry);
        }
        if raw.contains(&GLOB_CHARS[..]) {
            return Err(ValidationError::GlobEntry(raw.clone()));
        }

        let entry = Path::new(raw);
        let abs = if entry.is_absolute() {
            normalize_lexical(entry)
        } else {
            let norm = normalize_lexical(entry);
            if norm == Path::new(".") || norm.starts_with("..") {
                return Err(ValidationError::UnsafeEntry(raw.clone()));
            }
            normalize_lexical(&root.join(norm))
        };

        if abs == root {
            return Err(ValidationError::PointsAtRoot(raw.clone()));
        }
        // Containment is component-wise: the normalized root must be a
        // prefix path of the resolved entry.
        if !abs.starts_with(&root) {
            return Err(ValidationError::OutsideRoot(raw.clone()));
        }
        resolved.push(abs);
    }
    Ok(resolved)
}

/// Certify the whole configuration. Must succeed before any hop that could
/// delete or overwrite data is executed.
pub fn validate_transfer_paths(config: &TransferConfig) -> Result<Vec<PathBuf>, ValidationError> {
    validate_absolute_non_root("ORION_HOME", &config.gateway_home)?;
    validate_absolute_non_root("LOCAL_PARALLEL", &config.local_root)?;
    validate_shared_suffix("SCIROUTER_SHARED", &config.cluster_shared)?;
    validate_shared_suffix("ORION_HOME/shared", &config.gateway_staging())?;
    validate_exercise_set(&config.local_root, &config.exercise_dirs)
}
