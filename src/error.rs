use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal problems with what the caller asked for. Raised before anything on
/// disk is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no directories given to scan")]
    NoRoots,

    #[error("path does not exist: '{}'", .0.display())]
    MissingRoot(PathBuf),

    #[error("cannot access '{}'", path.display())]
    InaccessibleRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("path is not a directory: '{}'", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to read config file '{}'", path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file '{}'", path.display())]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A failure confined to a single file. The run carries on without it.
#[derive(Debug, Error)]
pub enum FileAccessError {
    #[error("failed to read '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to delete '{}': {source}", path.display())]
    Delete { path: PathBuf, source: io::Error },

    #[error("failed to move '{}': {source}", path.display())]
    Move { path: PathBuf, source: io::Error },

    #[error("destination already exists: '{}'", .0.display())]
    DestinationExists(PathBuf),

    #[error("failed to read directory entry: {0}")]
    Walk(#[from] walkdir::Error),
}

impl FileAccessError {
    /// Best guess at the path the failure is about. Directory walk errors may
    /// not carry one.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            FileAccessError::Read { path, .. }
            | FileAccessError::Delete { path, .. }
            | FileAccessError::Move { path, .. } => Some(path),
            FileAccessError::DestinationExists(path) => Some(path),
            FileAccessError::Walk(err) => err.path(),
        }
    }
}
