//! Path helpers for configured data files.

use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::core::errors::{Result, ScsError};

/// Resolve a path to an absolute, normalized path.
///
/// Existing paths are canonicalized (symlinks resolved). Paths that do not
/// exist yet, such as a telemetry file before its first append, are joined to
/// the CWD and normalized syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = fs::canonicalize(&absolute) {
        return canonical;
    }
    normalize_syntactic(&absolute)
}

/// Create the parent directory of `path` if it is missing.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| ScsError::io(parent, source))
        }
        _ => Ok(()),
    }
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_becomes_absolute() {
        let resolved = resolve_absolute_path(Path::new("telemetry-not-here.jsonl"));
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("telemetry-not-here.jsonl"));
    }

    #[cfg(unix)]
    #[test]
    fn missing_path_is_normalized_syntactically() {
        let input = Path::new("/nonexistent_scs/data/../telemetry.jsonl");
        assert_eq!(
            resolve_absolute_path(input),
            PathBuf::from("/nonexistent_scs/telemetry.jsonl")
        );
        assert_eq!(normalize_syntactic(Path::new("/../x")), PathBuf::from("/x"));
    }

    #[test]
    fn ensure_parent_dir_creates_nested_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b").join("events.jsonl");
        ensure_parent_dir(&target).unwrap();
        assert!(target.parent().unwrap().is_dir());
        assert!(ensure_parent_dir(Path::new("bare.jsonl")).is_ok());
    }
}
