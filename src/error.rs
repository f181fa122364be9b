//! Error types for request handling and tail sessions.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::http::HttpStatus;

/// Why a request could not be routed to a file.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("path {} is outside the served root", path.display())]
    PathEscape { path: PathBuf },

    #[error("{} does not exist or is a directory", path.display())]
    NotFound { path: PathBuf },

    #[error("invalid request target")]
    InvalidUri,

    #[error("unknown query discriminator: {0:?}")]
    UnknownDiscriminator(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<&ServeError> for HttpStatus {
    fn from(error: &ServeError) -> Self {
        match error {
            ServeError::PathEscape { .. } => Self::Forbidden,
            ServeError::NotFound { .. } => Self::NotFound,
            ServeError::InvalidUri | ServeError::UnknownDiscriminator(_) => Self::BadRequest,
            ServeError::Io(_) => Self::InternalServerError,
        }
    }
}

/// Ends a tail session. Neither variant is retried.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("client disconnected: {0}")]
    Disconnected(#[source] io::Error),

    #[error("failed to read watched file: {0}")]
    Read(#[source] io::Error),
}
