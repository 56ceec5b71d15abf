//! Spectrum file index keyed by sample identifier.
//!
//! Spectrum files live under directories whose name matches a glob pattern
//! (`Bruker*` by default). A file's stem is its sample identifier, so several
//! files (e.g. repeated scans with different extensions) can share one id.

use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use log::debug;
use thiserror::Error;
use walkdir::WalkDir;

use crate::core::table::IdSet;

/// Errors that can occur while indexing or pruning spectrum files.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Directory not found: {0}")]
    RootNotFound(PathBuf),

    #[error("Invalid directory pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Failed to scan '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete file '{path}': {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Sample identifier of a spectrum file: its file stem.
pub fn file_identifier(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

/// Find directories directly under `root` whose name matches `pattern`.
///
/// # Errors
///
/// Returns [`IndexError::RootNotFound`] if `root` is not a directory.
pub fn find_spectrum_dirs(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(IndexError::RootNotFound(root.to_path_buf()));
    }

    let matcher = Pattern::new(pattern).map_err(|e| IndexError::InvalidPattern {
        pattern: pattern.to_string(),
        source: e,
    })?;

    let entries = fs::read_dir(root).map_err(|e| IndexError::Io {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| IndexError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_dir() && matcher.matches(&entry.file_name().to_string_lossy()) {
            dirs.push(path);
        }
    }

    dirs.sort();
    Ok(dirs)
}

/// Collect the identifiers of all spectrum files under `root`.
///
/// Every regular file at any depth below a pattern-matching directory
/// contributes its stem.
pub fn list_identifiers(root: &Path, pattern: &str) -> Result<IdSet> {
    let mut ids = IdSet::new();

    for dir in find_spectrum_dirs(root, pattern)? {
        for entry in WalkDir::new(&dir).min_depth(1) {
            let entry = entry.map_err(|e| IndexError::Io {
                path: dir.clone(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(id) = file_identifier(entry.path()) {
                ids.insert(id);
            }
        }
    }

    Ok(ids)
}

/// Find the files directly inside pattern-matching directories whose stem
/// is one of `identifiers`.
pub fn find_files_by_identifier(root: &Path, pattern: &str, identifiers: &IdSet) -> Result<Vec<PathBuf>> {
    let mut matches = Vec::new();
    if identifiers.is_empty() {
        // Still validate the root so a typo fails loudly
        find_spectrum_dirs(root, pattern)?;
        return Ok(matches);
    }

    for dir in find_spectrum_dirs(root, pattern)? {
        let entries = fs::read_dir(&dir).map_err(|e| IndexError::Io {
            path: dir.clone(),
            source: e,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| IndexError::Io {
                path: dir.clone(),
                source: e,
            })?;
            let file_type = entry.file_type().map_err(|e| IndexError::Io {
                path: entry.path(),
                source: e,
            })?;
            // Same rule as listing: symlinks are not spectrum files
            if !file_type.is_file() {
                continue;
            }
            let path = entry.path();
            if file_identifier(&path).is_some_and(|id| identifiers.contains(&id)) {
                files.push(path);
            }
        }

        files.sort();
        matches.extend(files);
    }

    Ok(matches)
}

/// Delete spectrum files whose stem is in `identifiers`.
///
/// Only files directly inside a pattern-matching directory are considered.
/// Files with any other stem are left untouched.
///
/// # Arguments
///
/// * `root` - Directory containing the spectrum directories
/// * `pattern` - Glob pattern for spectrum directory names
/// * `identifiers` - Identifiers whose files should be removed
/// * `dry_run` - If true, only report what would be deleted
///
/// # Returns
///
/// The deleted (or would-be-deleted) file paths.
///
/// # Errors
///
/// The first failed deletion aborts with [`IndexError::Delete`]; files
/// removed before it stay removed.
pub fn remove_unpaired(
    root: &Path,
    pattern: &str,
    identifiers: &IdSet,
    dry_run: bool,
) -> Result<Vec<PathBuf>> {
    let to_delete = find_files_by_identifier(root, pattern, identifiers)?;
    delete_files(&to_delete, dry_run)?;
    Ok(to_delete)
}

/// Delete each of `paths` in order, stopping at the first failure.
///
/// A path that vanished since it was listed is a failure too.
pub fn delete_files(paths: &[PathBuf], dry_run: bool) -> Result<()> {
    for path in paths {
        if dry_run {
            debug!("Would delete {}", path.display());
            continue;
        }
        debug!("Deleting {}", path.display());
        fs::remove_file(path).map_err(|e| IndexError::Delete {
            path: path.clone(),
            source: e,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    use tempfile::TempDir;

    fn touch(path: &Path) -> PathBuf {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(path).unwrap();
        path.to_path_buf()
    }

    fn ids(values: &[&str]) -> IdSet {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_file_identifier_uses_stem() {
        assert_eq!(file_identifier(Path::new("dir/icr012345.0")), Some("icr012345".to_string()));
        assert_eq!(file_identifier(Path::new("dir/A1")), Some("A1".to_string()));
    }

    #[test]
    fn test_list_identifiers_any_depth() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("Bruker_HTSXT/A.0"));
        touch(&root.join("Bruker_HTSXT/A.1"));
        touch(&root.join("Bruker_MPA/nested/deeper/B.0"));
        touch(&root.join("Other/C.0"));
        touch(&root.join("D.0"));

        let found = list_identifiers(root, "Bruker*").unwrap();
        assert_eq!(found, ids(&["A", "B"]));
    }

    #[test]
    fn test_list_identifiers_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let result = list_identifiers(&temp_dir.path().join("missing"), "Bruker*");
        assert!(matches!(result, Err(IndexError::RootNotFound(_))));
    }

    #[test]
    fn test_list_identifiers_no_matching_dirs() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("Spectra/A.0"));

        let found = list_identifiers(temp_dir.path(), "Bruker*").unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_remove_unpaired_exact_stems_only() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let a = touch(&root.join("Bruker_HTSXT/A.0"));
        let a2 = touch(&root.join("Bruker_MPA/A.0"));
        let ab = touch(&root.join("Bruker_HTSXT/AB.0"));
        let b = touch(&root.join("Bruker_HTSXT/B.0"));
        let junk = touch(&root.join("Bruker_HTSXT/notes.txt"));

        let deleted = remove_unpaired(root, "Bruker*", &ids(&["A"]), false).unwrap();

        assert_eq!(deleted.len(), 2);
        assert!(!a.exists());
        assert!(!a2.exists());
        assert!(ab.exists());
        assert!(b.exists());
        assert!(junk.exists());
    }

    #[test]
    fn test_remove_unpaired_ignores_nested_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let nested = touch(&root.join("Bruker_HTSXT/sub/A.0"));

        let deleted = remove_unpaired(root, "Bruker*", &ids(&["A"]), false).unwrap();

        assert!(deleted.is_empty());
        assert!(nested.exists());
    }

    #[test]
    fn test_remove_unpaired_dry_run() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let a = touch(&root.join("Bruker_HTSXT/A.0"));

        let deleted = remove_unpaired(root, "Bruker*", &ids(&["A"]), true).unwrap();

        assert_eq!(deleted, vec![a.clone()]);
        assert!(a.exists());
    }

    #[test]
    fn test_remove_unpaired_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let result = remove_unpaired(&temp_dir.path().join("missing"), "Bruker*", &IdSet::new(), false);
        assert!(matches!(result, Err(IndexError::RootNotFound(_))));
    }

    #[test]
    fn test_delete_failure_aborts() {
        let temp_dir = TempDir::new().unwrap();
        let first = touch(&temp_dir.path().join("Bruker_HTSXT/A.0"));
        let gone = temp_dir.path().join("Bruker_HTSXT/B.0");
        let last = touch(&temp_dir.path().join("Bruker_HTSXT/C.0"));

        let result = delete_files(&[first.clone(), gone.clone(), last.clone()], false);

        match result {
            Err(IndexError::Delete { path, .. }) => assert_eq!(path, gone),
            other => panic!("Expected Delete error, got {:?}", other),
        }
        // Earlier deletions stay committed, later ones never run
        assert!(!first.exists());
        assert!(last.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_neither_listed_nor_deleted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let target = touch(&root.join("elsewhere/A.0"));
        fs::create_dir_all(root.join("Bruker_HTSXT")).unwrap();
        let link = root.join("Bruker_HTSXT/A.0");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert!(list_identifiers(root, "Bruker*").unwrap().is_empty());

        let deleted = remove_unpaired(root, "Bruker*", &ids(&["A"]), false).unwrap();
        assert!(deleted.is_empty());
        assert!(link.symlink_metadata().is_ok());
        assert!(target.exists());
    }

    #[test]
    fn test_invalid_pattern() {
        let temp_dir = TempDir::new().unwrap();
        let result = list_identifiers(temp_dir.path(), "Bruker[");
        assert!(matches!(result, Err(IndexError::InvalidPattern { .. })));
    }
}
