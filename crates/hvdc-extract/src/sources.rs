//! Resolve extraction inputs (paths, globs, directories) into files.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use glob::glob;
use walkdir::WalkDir;

use crate::config::ExtractConfig;
use crate::error::{ExtractError, Result};

/// Expand `inputs` into a de-duplicated, order-preserving list of files.
///
/// Directories are walked recursively and filtered by the configured
/// extensions. Glob patterns match files only. A literal path that does
/// not exist is kept so the engine can report it as a failed document
/// instead of silently dropping it.
pub fn resolve_sources<S: AsRef<str>>(inputs: &[S], config: &ExtractConfig) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for input in inputs {
        let raw = input.as_ref().trim();
        if raw.is_empty() {
            continue;
        }
        let path = Path::new(raw);

        let files = if path.is_dir() {
            walk_dir(path, config)
        } else if path.exists() {
            vec![path.to_path_buf()]
        } else if looks_like_glob(raw) {
            glob_files(raw)?
        } else {
            tracing::warn!(path = %raw, "Source does not exist");
            vec![path.to_path_buf()]
        };

        for file in files {
            let key = fs::canonicalize(&file).unwrap_or_else(|_| file.clone());
            if seen.insert(key) {
                out.push(file);
            }
        }
    }

    tracing::debug!(inputs = inputs.len(), files = out.len(), "Resolved sources");
    Ok(out)
}

fn looks_like_glob(raw: &str) -> bool {
    ['*', '?', '['].iter().any(|ch| raw.contains(*ch))
}

fn walk_dir(dir: &Path, config: &ExtractConfig) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_candidate(path, config))
        .collect()
}

/// Spreadsheet with an accepted extension. Office lock files (`~$book.xlsx`)
/// are skipped.
fn is_candidate(path: &Path, config: &ExtractConfig) -> bool {
    let locked = path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with("~$"))
        .unwrap_or(false);
    let accepted = path
        .extension()
        .map(|e| config.accepts_extension(&e.to_string_lossy()))
        .unwrap_or(false);
    accepted && !locked
}

fn glob_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob(pattern).map_err(|e| ExtractError::Pattern {
        pattern: pattern.to_string(),
        reason: e.msg.to_string(),
    })?;

    let mut out = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => out.push(path),
            Ok(_) => {}
            Err(e) => {
                return Err(ExtractError::Pattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, "x").unwrap();
        path
    }

    #[test]
    fn test_directory_walk_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.csv");
        touch(dir.path(), "nested/b.xlsx");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "~$a.xlsx");

        let files = resolve_sources(&[dir.path().to_string_lossy()], &ExtractConfig::default()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.xlsx"]);
    }

    #[test]
    fn test_glob_and_literal_are_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let a = touch(dir.path(), "a.csv");
        touch(dir.path(), "b.csv");

        let pattern = dir.path().join("*.csv").to_string_lossy().into_owned();
        let literal = a.to_string_lossy().into_owned();
        let files = resolve_sources(&[literal, pattern], &ExtractConfig::default()).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0], a);
    }

    #[test]
    fn test_missing_literal_is_kept() {
        let files = resolve_sources(&["/nonexistent/report.xlsx"], &ExtractConfig::default()).unwrap();
        assert_eq!(files, vec![PathBuf::from("/nonexistent/report.xlsx")]);
    }

    #[test]
    fn test_invalid_glob_is_an_error() {
        let err = resolve_sources(&["/tmp/[abc"], &ExtractConfig::default()).unwrap_err();
        assert!(matches!(err, ExtractError::Pattern { .. }));
    }
}
