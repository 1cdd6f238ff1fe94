use std::path::{Path, PathBuf};
use thiserror::Error;

pub type ModResult<T> = std::result::Result<T, ModError>;

/// Failure taxonomy shared by every core operation.
///
/// `Configuration` means the user has to fix settings before retrying;
/// the other variants describe what went wrong with the archive, the
/// package manifest or the filesystem.
#[derive(Debug, Error)]
pub enum ModError {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("archive error ({}): {message}", path.display())]
    Archive { path: PathBuf, message: String },

    #[error("manifest error: {message}")]
    Manifest { message: String, path: Option<PathBuf> },

    #[error("io error ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid load order {0:?}: expected 1 to 3 digits")]
    InvalidOrder(String),
}

impl ModError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn archive(path: impl AsRef<Path>, message: impl std::fmt::Display) -> Self {
        Self::Archive { path: path.as_ref().to_path_buf(), message: message.to_string() }
    }

    pub fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest { message: message.into(), path: None }
    }

    pub fn manifest_at(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Manifest { message: message.into(), path: Some(path.as_ref().to_path_buf()) }
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io { path: path.as_ref().to_path_buf(), source }
    }

    /// Path the failure refers to, when there is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Archive { path, .. } | Self::Io { path, .. } => Some(path),
            Self::Manifest { path, .. } => path.as_deref(),
            Self::Configuration { .. } | Self::InvalidOrder(_) => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// Attach the offending path to a raw `std::io::Result`.
pub trait IoResultExt<T> {
    fn at(self, path: impl AsRef<Path>) -> ModResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at(self, path: impl AsRef<Path>) -> ModResult<T> {
        self.map_err(|e| ModError::io(path, e))
    }
}
