use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TabkeepError {
    #[error("Working directory is not configured")]
    DirectoryNotConfigured,

    #[error("Permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Content is not valid text: {}", .0.display())]
    Encoding(PathBuf),

    #[error("Could not find a free file name for '{0}'")]
    NameCollisionExhausted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl TabkeepError {
    /// Maps an I/O error on `path` into the closest variant of the taxonomy.
    pub fn from_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => TabkeepError::NotFound(path.into()),
            std::io::ErrorKind::PermissionDenied => TabkeepError::PermissionDenied(path.into()),
            std::io::ErrorKind::InvalidData => TabkeepError::Encoding(path.into()),
            _ => TabkeepError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, TabkeepError>;
