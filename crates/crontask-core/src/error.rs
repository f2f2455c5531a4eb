use thiserror::Error;

/// Errors surfaced by the configuration layer.
///
/// These are the only errors that are fatal at startup together with a
/// failed runtime connection; everything else in the daemon is contained
/// at its own boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file already exists: {0}")]
    ConfigExists(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
