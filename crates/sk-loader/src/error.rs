use std::path::PathBuf;

use sk_core::SkError;
use thiserror::Error;

use crate::manifest::ManifestError;

/// Errors raised by a [`Platform`](crate::Platform).
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform unavailable: {0}")]
    Unavailable(String),
    #[error("failed to load driver library: {0}")]
    LibraryLoad(#[from] libloading::Error),
    #[error("library {} does not export `{symbol}`", .path.display())]
    MissingEntry { path: PathBuf, symbol: &'static str },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while the loader discovers and assembles objects.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("invalid loader state: {0}")]
    InvalidState(&'static str),
    #[error("{0}")]
    Sk(#[from] SkError),
}

impl From<PlatformError> for SkError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::MissingEntry { .. } => SkError::NotFound,
            PlatformError::Unavailable(_) | PlatformError::LibraryLoad(_) | PlatformError::Io(_) => {
                SkError::InitializationFailed
            }
        }
    }
}

impl From<LoaderError> for SkError {
    fn from(err: LoaderError) -> Self {
        match err {
            LoaderError::Manifest(err) => err.into(),
            LoaderError::Platform(err) => err.into(),
            LoaderError::InvalidState(_) => SkError::SystemInternal,
            LoaderError::Sk(err) => err,
        }
    }
}
