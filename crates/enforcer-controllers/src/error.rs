//! Error types for controller loading.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`ControllerError`].
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors raised while resolving controllers.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// No controller exists under the requested name.
    #[error("controller \"{name}\" not found{}", .location.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
    NotFound {
        /// The controller name.
        name: String,
        /// Where the lookup happened, for directory sources.
        location: Option<PathBuf>,
    },

    /// A controller file could not be read.
    #[error("failed to read controller file {path}: {source}")]
    Read {
        /// The file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A controller file has invalid content.
    #[error("failed to parse controller file {path}: {message}")]
    Parse {
        /// The file path.
        path: PathBuf,
        /// What is wrong.
        message: String,
    },

    /// A factory did not produce controllers.
    #[error("controller factory for \"{name}\" returned no controllers")]
    EmptyFactory {
        /// The factory name.
        name: String,
    },

    /// A factory-backed source was used before its factory ran.
    #[error("controller factory \"{name}\" has not been invoked")]
    NotPrepared {
        /// The factory name.
        name: String,
    },

    /// A dependency requested by a factory is missing.
    #[error("dependency {type_name} is not registered")]
    MissingDependency {
        /// The requested type.
        type_name: &'static str,
    },
}

impl ControllerError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            name: name.into(),
            location: None,
        }
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}
