//! Id generation and path-safety helpers.
//!
//! The path-safety guard is grounded directly on the teacher's
//! `security::safe_path`: canonicalize-free normalization, reject absolute
//! inputs, and reject anything that resolves outside the base directory.

use crate::error::RuntimeError;
use std::path::{Component, Path, PathBuf};

pub fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4())
}

/// Normalize a path by resolving `.`/`..` components without touching disk
/// (plain `Path::canonicalize` would fail for files that don't exist yet).
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if matches!(out.last(), Some(Component::Normal(_))) {
                    out.pop();
                }
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out.into_iter().collect()
}

/// Join `filename` onto `base_dir`, rejecting empty names, absolute names,
/// and any resolved path that would escape `base_dir`.
pub fn safe_join(base_dir: &Path, filename: &str) -> Result<PathBuf, RuntimeError> {
    if filename.is_empty() {
        return Err(RuntimeError::IllegalArgument("id must not be empty".into()));
    }
    let rel = Path::new(filename);
    if rel.is_absolute() {
        return Err(RuntimeError::IllegalArgument(format!(
            "illegal id: absolute path not allowed: {filename}"
        )));
    }

    let joined = normalize_path(&base_dir.join(rel));
    let base_normalized = normalize_path(base_dir);
    if !joined.starts_with(&base_normalized) {
        return Err(RuntimeError::IllegalArgument(format!(
            "illegal id: {filename} escapes base directory"
        )));
    }
    Ok(joined)
}

/// Unix-second timestamp, matching the integer-seconds data model in spec §3.
pub fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
