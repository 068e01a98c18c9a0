use pydesc_python::PythonError;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for the pydesc command line tool.
///
/// Wraps the library errors and adds the failures that only exist at the
/// command layer: configuration files and queries with no answer.
///
/// # Examples
///
/// ```
/// use pydesc::error::{Error, Result};
///
/// fn require_installed(version: Option<String>) -> Result<String> {
///     version.ok_or_else(|| Error::NotInstalled {
///         name: "requests".into(),
///         target: "site-packages".into(),
///     })
/// }
///
/// assert!(require_installed(None).is_err());
/// ```
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("'{name}' is not installed in {}", target.display())]
    NotInstalled { name: String, target: PathBuf },

    #[error(transparent)]
    Python(#[from] PythonError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
