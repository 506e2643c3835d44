use std::path::{Path, PathBuf};

use sk_core::SkError;
use thiserror::Error;

/// Reasons a descriptor file is rejected as a whole.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not valid JSON: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },
    #[error("{}: unsupported file_format_version {version:?}", .path.display())]
    Unsupported { path: PathBuf, version: String },
    #[error("{}: `{field}` is {len} bytes, limit is {limit}", .path.display())]
    Overflow {
        path: PathBuf,
        field: String,
        len: usize,
        limit: usize,
    },
    #[error("{}: `{field}` must be {expected}", .path.display())]
    UnexpectedType {
        path: PathBuf,
        field: String,
        expected: &'static str,
    },
    #[error("{}: {kind} `{what}` is declared more than once", .path.display())]
    Duplicate {
        path: PathBuf,
        kind: &'static str,
        what: String,
    },
}

impl ManifestError {
    pub(crate) fn invalid(path: &Path, reason: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unexpected_type(
        path: &Path,
        field: impl Into<String>,
        expected: &'static str,
    ) -> Self {
        Self::UnexpectedType {
            path: path.to_path_buf(),
            field: field.into(),
            expected,
        }
    }

    /// Descriptor the error refers to.
    pub fn path(&self) -> &Path {
        match self {
            ManifestError::Io { path, .. }
            | ManifestError::Json { path, .. }
            | ManifestError::Invalid { path, .. }
            | ManifestError::Unsupported { path, .. }
            | ManifestError::Overflow { path, .. }
            | ManifestError::UnexpectedType { path, .. }
            | ManifestError::Duplicate { path, .. } => path,
        }
    }
}

impl From<ManifestError> for SkError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                SkError::NotFound
            }
            ManifestError::Unsupported { .. } => SkError::NotSupported,
            ManifestError::Io { .. }
            | ManifestError::Json { .. }
            | ManifestError::Invalid { .. }
            | ManifestError::Overflow { .. }
            | ManifestError::UnexpectedType { .. }
            | ManifestError::Duplicate { .. } => SkError::Invalid,
        }
    }
}
