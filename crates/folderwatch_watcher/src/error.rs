//! Error types for the watcher

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Watcher error type
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Cannot watch {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot watch {0}: not a directory")]
    NotADirectory(PathBuf),

    #[error("Watcher has no subscribed root")]
    NoRoot,

    #[error("Failed to spawn scan thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("Scan of {path} failed: {message}")]
    Scan { path: PathBuf, message: String },

    #[error("Watched root {0} was removed")]
    RootRemoved(PathBuf),
}

impl WatchError {
    /// True for errors raised before the scan loop started.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            WatchError::Setup { .. }
                | WatchError::NotADirectory(_)
                | WatchError::NoRoot
                | WatchError::Spawn(_)
        )
    }

    /// Path the error refers to, when there is one.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            WatchError::Setup { path, .. } | WatchError::Scan { path, .. } => Some(path),
            WatchError::NotADirectory(path) | WatchError::RootRemoved(path) => Some(path),
            WatchError::NoRoot | WatchError::Spawn(_) => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WatchError>;
