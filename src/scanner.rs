use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::error::{ConfigError, FileAccessError};
use crate::utils::Fingerprint;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// A directory the caller asked to scan, checked to exist.
#[derive(Debug, Clone)]
pub struct Root {
    /// The path as given; reported paths are built on this.
    pub given: PathBuf,
    /// The same directory with symlinks and `..` resolved.
    pub resolved: PathBuf,
}

impl Root {
    /// Resolved location of a path found while walking this root.
    pub fn resolve(&self, walked: &Path) -> PathBuf {
        match walked.strip_prefix(&self.given) {
            Ok(relative) => self.resolved.join(relative),
            Err(_) => walked.to_path_buf(),
        }
    }
}

/// A regular file found by the walk, not yet hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub size: u64,
}

fn root_error(path: &Path, source: io::Error) -> ConfigError {
    match source.kind() {
        io::ErrorKind::NotFound => ConfigError::MissingRoot(path.to_path_buf()),
        _ => ConfigError::InaccessibleRoot {
            path: path.to_path_buf(),
            source,
        },
    }
}

/// Checks that `path` exists and is a directory.
pub fn validate_dir(path: &Path) -> Result<Root, ConfigError> {
    let metadata = fs::metadata(path).map_err(|e| root_error(path, e))?;
    if !metadata.is_dir() {
        return Err(ConfigError::NotADirectory(path.to_path_buf()));
    }
    let resolved = fs::canonicalize(path).map_err(|e| root_error(path, e))?;
    Ok(Root {
        given: path.to_path_buf(),
        resolved,
    })
}

/// Validates every root before anything is walked. The first bad root wins.
pub fn validate_roots<P: AsRef<Path>>(roots: &[P]) -> Result<Vec<Root>, ConfigError> {
    if roots.is_empty() {
        return Err(ConfigError::NoRoots);
    }
    roots.iter().map(|root| validate_dir(root.as_ref())).collect()
}

/// Walks `root` recursively and yields its regular files.
///
/// Entries are sorted by file name inside each directory, so a fixed tree is
/// always walked in the same order. Symlinks are neither followed nor
/// yielded, and neither are FIFOs, sockets or device nodes.
pub fn walk_files(root: &Path) -> impl Iterator<Item = Result<Candidate, FileAccessError>> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(FileAccessError::from(e))),
            };
            if !entry.file_type().is_file() {
                return None;
            }
            match entry.metadata() {
                Ok(metadata) => Some(Ok(Candidate {
                    path: entry.into_path(),
                    size: metadata.len(),
                })),
                Err(e) => Some(Err(FileAccessError::from(e))),
            }
        })
}

/// Hashes the full content of `file_path`.
pub fn calculate_file_hash(file_path: &Path) -> Result<Fingerprint, FileAccessError> {
    let read_error = |source| FileAccessError::Read {
        path: file_path.to_path_buf(),
        source,
    };

    let mut file = fs::File::open(file_path).map_err(read_error)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0; READ_BUFFER_SIZE];
    let mut total_bytes = 0u64;

    loop {
        let bytes_read = file.read(&mut buffer).map_err(read_error)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        total_bytes += bytes_read as u64;
    }

    let fingerprint = Fingerprint::from(hasher.finalize());
    debug!(
        "Hash calculated for '{}': {} ({} bytes)",
        file_path.display(),
        fingerprint,
        total_bytes
    );
    Ok(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn hash_matches_in_memory_digest() {
        let temp_dir = TempDir::new().unwrap();
        let content = vec![7u8; READ_BUFFER_SIZE * 2 + 13];
        let path = write(temp_dir.path(), "big.bin", &content);
        assert_eq!(calculate_file_hash(&path).unwrap(), Fingerprint::of_bytes(&content));
    }

    #[test]
    fn hashing_a_vanished_file_is_a_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gone.txt");
        let err = calculate_file_hash(&path).unwrap_err();
        assert!(matches!(err, FileAccessError::Read { .. }));
        assert_eq!(err.path(), Some(path.as_path()));
    }

    #[test]
    fn walk_is_sorted_and_recursive() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "b.txt", b"b");
        write(temp_dir.path(), "a/z.txt", b"z");
        write(temp_dir.path(), "a/y.txt", b"y");
        write(temp_dir.path(), "c.txt", b"c");

        let names: Vec<PathBuf> = walk_files(temp_dir.path())
            .map(|c| c.unwrap().path.strip_prefix(temp_dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a/y.txt"),
                PathBuf::from("a/z.txt"),
                PathBuf::from("b.txt"),
                PathBuf::from("c.txt"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn walk_skips_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let target = write(temp_dir.path(), "real.txt", b"data");
        std::os::unix::fs::symlink(&target, temp_dir.path().join("link.txt")).unwrap();

        let files: Vec<Candidate> = walk_files(temp_dir.path()).map(Result::unwrap).collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, target);
        assert_eq!(files[0].size, 4);
    }

    #[test]
    fn roots_are_validated_up_front() {
        let temp_dir = TempDir::new().unwrap();
        let file = write(temp_dir.path(), "plain.txt", b"x");
        let missing = temp_dir.path().join("missing");

        assert!(matches!(
            validate_roots::<PathBuf>(&[]),
            Err(ConfigError::NoRoots)
        ));
        assert!(matches!(
            validate_roots(&[temp_dir.path().to_path_buf(), missing.clone()]),
            Err(ConfigError::MissingRoot(p)) if p == missing
        ));
        assert!(matches!(
            validate_roots(&[file.clone()]),
            Err(ConfigError::NotADirectory(p)) if p == file
        ));
        assert_eq!(validate_roots(&[temp_dir.path()]).unwrap().len(), 1);
    }

    #[test]
    fn only_not_found_means_missing() {
        let path = Path::new("/srv/share");
        assert!(matches!(
            root_error(path, io::Error::from(io::ErrorKind::NotFound)),
            ConfigError::MissingRoot(p) if p == path
        ));
        let err = root_error(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(
            &err,
            ConfigError::InaccessibleRoot { path: p, source }
                if p == path && source.kind() == io::ErrorKind::PermissionDenied
        ));
        assert_eq!(err.to_string(), "cannot access '/srv/share'");
    }

    #[test]
    fn root_resolves_walked_paths() {
        let temp_dir = TempDir::new().unwrap();
        let root = validate_dir(temp_dir.path()).unwrap();
        let walked = temp_dir.path().join("sub").join("f.txt");
        assert_eq!(root.resolve(&walked), root.resolved.join("sub").join("f.txt"));
    }
}
