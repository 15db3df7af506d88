// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Local Path Safety Validation
//!
//! Shared by the CLI and the HTTP trigger layer: a project's `local_path` is
//! resolved to an absolute canonical path and rejected if it names a
//! protected system directory, doesn't exist, isn't a directory, or isn't
//! readable.

use std::path::{Path, PathBuf};
use thiserror::Error;

const PROTECTED_PREFIXES: &[&str] = &[
    "/etc",
    "/usr",
    "/bin",
    "/sbin",
    "/sys",
    "/proc",
    "/var/lib",
    "/root",
    "/System",
    "/Library/System",
    "C:\\Windows",
    "C:\\Program Files",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathSafetyError {
    #[error("path does not exist: {0}")]
    NotFound(String),

    #[error("path is not a directory: {0}")]
    NotADirectory(String),

    #[error("path is not readable: {0}")]
    NotReadable(String),

    #[error("path resolves under a protected system directory: {0}")]
    Protected(String),
}

/// Canonicalizes `path` and validates it against the protected-directory
/// list, existence, directory-ness, and readability. Returns the canonical
/// path on success.
pub fn validate_local_path(path: impl AsRef<Path>) -> Result<PathBuf, PathSafetyError> {
    let path = path.as_ref();

    let canonical = std::fs::canonicalize(path).map_err(|_| PathSafetyError::NotFound(path.display().to_string()))?;

    let canonical_str = canonical.to_string_lossy();
    if PROTECTED_PREFIXES.iter().any(|prefix| canonical_str.starts_with(prefix)) {
        return Err(PathSafetyError::Protected(canonical.display().to_string()));
    }

    let metadata =
        std::fs::metadata(&canonical).map_err(|_| PathSafetyError::NotReadable(canonical.display().to_string()))?;

    if !metadata.is_dir() {
        return Err(PathSafetyError::NotADirectory(canonical.display().to_string()));
    }

    std::fs::read_dir(&canonical).map_err(|_| PathSafetyError::NotReadable(canonical.display().to_string()))?;

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_an_existing_readable_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = validate_local_path(dir.path());
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_a_missing_path() {
        let err = validate_local_path("/no/such/path/at/all-xyz").unwrap_err();
        assert!(matches!(err, PathSafetyError::NotFound(_)));
    }

    #[test]
    fn rejects_a_file_that_is_not_a_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = validate_local_path(file.path()).unwrap_err();
        assert!(matches!(err, PathSafetyError::NotADirectory(_)));
    }

    #[test]
    fn rejects_a_protected_system_directory() {
        let err = validate_local_path("/etc").unwrap_err();
        assert!(matches!(err, PathSafetyError::Protected(_)));
    }
}
