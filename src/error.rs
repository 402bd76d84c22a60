//! Crate-level error type

use crate::client::PlayerError;
use crate::registry::SetupError;
use crate::upstream::DirectoryError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A shared stream could not be brought up
    #[error(transparent)]
    Setup(#[from] SetupError),

    /// Station directory failure outside of stream setup
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Remote player failure
    #[error(transparent)]
    Player(#[from] PlayerError),

    /// I/O error (bind, accept, stdout)
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("config: {0}")]
    Config(String),
}
