//! Temp folder cleaning and sorting files into folders by type.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::SortRules;
use crate::duplicates::SkippedFile;
use crate::error::{ConfigError, FileAccessError};
use crate::scanner::validate_dir;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<SkippedFile>,
    pub bytes: u64,
    pub dry_run: bool,
}

/// Removes every file beneath `dir`, leaving the directory tree in place.
///
/// Symlinks are removed as links, their targets are never touched. Anything
/// that cannot be removed is recorded in [`CleanReport::failed`].
pub fn clean_directory(dir: &Path, dry_run: bool) -> Result<CleanReport, ConfigError> {
    validate_dir(dir)?;
    info!("Cleaning '{}'", dir.display());

    let mut report = CleanReport {
        dry_run,
        ..CleanReport::default()
    };
    for entry in WalkDir::new(dir).follow_links(false).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                report.failed.push(FileAccessError::from(e).into());
                continue;
            }
        };
        let file_type = entry.file_type();
        if !(file_type.is_file() || file_type.is_symlink()) {
            continue;
        }
        let size = if file_type.is_file() {
            entry.metadata().map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };
        let path = entry.into_path();
        if dry_run {
            debug!("Would remove '{}'", path.display());
        } else if let Err(source) = fs::remove_file(&path) {
            let err = FileAccessError::Delete { path, source };
            warn!("{}", err);
            report.failed.push(err.into());
            continue;
        } else {
            debug!("Removed '{}'", path.display());
        }
        report.bytes += size;
        report.removed.push(path);
    }

    info!(
        "{} {} files from '{}', {} failed",
        if dry_run { "Would remove" } else { "Removed" },
        report.removed.len(),
        dir.display(),
        report.failed.len()
    );
    Ok(report)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SortReport {
    pub moved: Vec<(PathBuf, PathBuf)>,
    pub skipped: Vec<SkippedFile>,
    pub dry_run: bool,
}

/// Moves files directly inside `dir` into `dir/<folder>` according to their
/// extension. Files without a matching rule stay where they are, and an
/// existing destination is never overwritten.
pub fn sort_directory(
    dir: &Path,
    rules: &SortRules,
    dry_run: bool,
) -> Result<SortReport, ConfigError> {
    validate_dir(dir)?;
    info!("Sorting '{}' using {} rules", dir.display(), rules.len());

    let mut report = SortReport {
        dry_run,
        ..SortReport::default()
    };
    let entries = WalkDir::new(dir)
        .follow_links(false)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                report.skipped.push(FileAccessError::from(e).into());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(folder) = rules.folder_for(entry.path()) else {
            continue;
        };

        let target_dir = dir.join(folder);
        let target = target_dir.join(entry.file_name());
        let source = entry.into_path();
        if target.symlink_metadata().is_ok() {
            let err = FileAccessError::DestinationExists(target);
            warn!("Not moving '{}': {}", source.display(), err);
            report.skipped.push(err.into());
            continue;
        }
        if !dry_run {
            let moved = fs::create_dir_all(&target_dir).and_then(|()| fs::rename(&source, &target));
            if let Err(e) = moved {
                let err = FileAccessError::Move {
                    path: source,
                    source: e,
                };
                warn!("{}", err);
                report.skipped.push(err.into());
                continue;
            }
        }
        debug!("'{}' -> '{}'", source.display(), target.display());
        report.moved.push((source, target));
    }

    info!(
        "{} {} files in '{}'",
        if dry_run { "Would move" } else { "Moved" },
        report.moved.len(),
        dir.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn clean_removes_nested_files_and_keeps_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let a = write(temp_dir.path(), "a.tmp", "12345");
        let b = write(temp_dir.path(), "deep/er/b.tmp", "xyz");

        let report = clean_directory(temp_dir.path(), false).unwrap();

        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.bytes, 8);
        assert!(report.failed.is_empty());
        assert!(!a.exists());
        assert!(!b.exists());
        assert!(temp_dir.path().join("deep/er").is_dir());
    }

    #[test]
    fn clean_dry_run_keeps_files() {
        let temp_dir = TempDir::new().unwrap();
        let a = write(temp_dir.path(), "a.tmp", "12345");

        let report = clean_directory(temp_dir.path(), true).unwrap();

        assert_eq!(report.removed, vec![a.clone()]);
        assert!(a.exists());
    }

    #[cfg(unix)]
    #[test]
    fn clean_removes_links_but_not_their_targets() {
        let outside = TempDir::new().unwrap();
        let target = write(outside.path(), "keep.txt", "precious");
        let temp_dir = TempDir::new().unwrap();
        let link = temp_dir.path().join("link.txt");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        clean_directory(temp_dir.path(), false).unwrap();

        assert!(link.symlink_metadata().is_err());
        assert!(target.exists());
    }

    #[test]
    fn clean_rejects_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = write(temp_dir.path(), "a.tmp", "x");
        assert!(matches!(
            clean_directory(&file, false),
            Err(ConfigError::NotADirectory(_))
        ));
    }

    #[test]
    fn sort_moves_by_extension() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "photo.JPG", "img");
        write(temp_dir.path(), "notes.txt", "text");
        let other = write(temp_dir.path(), "archive.zip", "zip");
        let nested = write(temp_dir.path(), "sub/deep.png", "img");

        let report = sort_directory(temp_dir.path(), &SortRules::default(), false).unwrap();

        assert_eq!(report.moved.len(), 2);
        assert!(temp_dir.path().join("Images/photo.JPG").exists());
        assert!(temp_dir.path().join("Text/notes.txt").exists());
        assert!(!temp_dir.path().join("photo.JPG").exists());
        assert!(other.exists());
        assert!(nested.exists());
    }

    #[test]
    fn sort_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let source = write(temp_dir.path(), "report.pdf", "new");
        let existing = write(temp_dir.path(), "PDFs/report.pdf", "old");

        let report = sort_directory(temp_dir.path(), &SortRules::default(), false).unwrap();

        assert!(report.moved.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path.as_deref(), Some(existing.as_path()));
        assert_eq!(fs::read_to_string(&existing).unwrap(), "old");
        assert!(source.exists());
    }

    #[test]
    fn sort_dry_run_plans_without_moving() {
        let temp_dir = TempDir::new().unwrap();
        let source = write(temp_dir.path(), "script.py", "print()");
        let rules = SortRules::new([("py", "Code")]);

        let report = sort_directory(temp_dir.path(), &rules, true).unwrap();

        assert_eq!(
            report.moved,
            vec![(source.clone(), temp_dir.path().join("Code/script.py"))]
        );
        assert!(source.exists());
        assert!(!temp_dir.path().join("Code").exists());
    }
}
