use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid table name '{0}': expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidTableName(String),

    #[error("Invalid chunk size {0}: must be greater than zero")]
    InvalidChunkSize(usize),

    #[error("Unknown hash algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("Cannot read root directory {}: {source}", .path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
