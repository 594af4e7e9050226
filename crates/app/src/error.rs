//! Application error types

use std::io;
use std::path::PathBuf;

/// Application result type
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Could not determine the {0} directory")]
    NoProjectDirs(&'static str),

    #[error("Failed to read config {path}: {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Core(#[from] boxoffice_core::Error),

    #[error(transparent)]
    Net(#[from] boxoffice_net::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
