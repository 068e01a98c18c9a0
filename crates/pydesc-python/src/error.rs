//! Errors specific to Python descriptor handling.
//!
//! These errors cover reading `setup.py` and `pyproject.toml`, validating
//! PEP 440/508 strings, talking to the package index, and the two failure
//! kinds of a packaging operation: dependency resolution and the
//! interpreter version gate.

use pep440_rs::{Version, VersionSpecifiers};
use pydesc_core::DescError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors specific to Python descriptor handling.
#[derive(Error, Debug)]
pub enum PythonError {
    /// Failed to parse pyproject.toml
    #[error("Failed to parse pyproject.toml: {source}")]
    TomlParseError {
        #[source]
        source: toml_edit::TomlError,
    },

    /// Failed to parse setup.py
    #[error("Failed to parse setup.py at line {line}: {message}")]
    SetupParse { line: usize, message: String },

    /// No supported manifest in the project root
    #[error("No setup.py or pyproject.toml with a [project] table in {}", root.display())]
    ManifestNotFound { root: PathBuf },

    /// Required descriptor field is absent
    #[error("Missing required field '{field}' in {manifest}")]
    MissingField { manifest: String, field: String },

    /// Descriptor field is not a literal value
    #[error("Field '{field}' in setup.py must be a literal value")]
    NonLiteralField { field: String },

    /// Descriptor field has the wrong shape
    #[error("Invalid value for '{field}': {message}")]
    InvalidField { field: String, message: String },

    /// Invalid PEP 440 version
    #[error("Invalid PEP 440 version '{version}': {source}")]
    InvalidVersion {
        version: String,
        #[source]
        source: pep440_rs::VersionParseError,
    },

    /// Invalid PEP 440 version specifier
    #[error("Invalid PEP 440 version specifier '{specifier}': {source}")]
    InvalidVersionSpecifier {
        specifier: String,
        #[source]
        source: pep440_rs::VersionSpecifiersParseError,
    },

    /// Invalid PEP 508 dependency specification
    #[error("Invalid PEP 508 dependency specification '{spec}': {message}")]
    InvalidDependencySpec { spec: String, message: String },

    /// Failed to deserialize index API response
    #[error("Failed to parse index response for '{package}': {source}")]
    ApiResponseError {
        package: String,
        #[source]
        source: serde_json::Error,
    },

    /// Index request failed
    #[error("Index request failed for '{package}': {source}")]
    RegistryError {
        package: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Interpreter version could not be determined
    #[error("Could not determine interpreter version: {message}")]
    InterpreterDetection { message: String },

    /// Dependency resolution failed
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Interpreter does not satisfy `python_requires`
    #[error(transparent)]
    IncompatibleEnvironment(#[from] IncompatibleEnvironmentError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core error
    #[error(transparent)]
    Core(#[from] DescError),
}

/// Result type alias for Python descriptor operations.
pub type Result<T> = std::result::Result<T, PythonError>;

impl PythonError {
    /// Create a registry error from any error type.
    pub fn registry_error(
        package: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::RegistryError {
            package: package.into(),
            source: Box::new(error),
        }
    }

    /// Create an API response error.
    pub fn api_response_error(package: impl Into<String>, error: serde_json::Error) -> Self {
        Self::ApiResponseError {
            package: package.into(),
            source: error,
        }
    }

    /// Create a setup.py parse error.
    pub fn setup_parse(line: usize, message: impl Into<String>) -> Self {
        Self::SetupParse {
            line,
            message: message.into(),
        }
    }

    /// Create a missing field error.
    pub fn missing_field(manifest: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            manifest: manifest.into(),
            field: field.into(),
        }
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A declared dependency could not be mapped to an installable version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// The index has no project with this name
    #[error("Package '{package}' not found in index {index}")]
    NotFound { package: String, index: String },

    /// The project exists but no release satisfies the requirement
    #[error("No version of '{package}' satisfies '{specifier}'")]
    NoMatchingVersion { package: String, specifier: String },

    /// The index could not be queried
    #[error("Could not query index for '{package}': {message}")]
    Index { package: String, message: String },
}

impl ResolutionError {
    /// Name of the dependency that failed to resolve.
    pub fn package(&self) -> &str {
        match self {
            Self::NotFound { package, .. }
            | Self::NoMatchingVersion { package, .. }
            | Self::Index { package, .. } => package,
        }
    }
}

/// The interpreter is outside the range declared by `python_requires`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Python {interpreter} does not satisfy requires-python '{requires}'")]
pub struct IncompatibleEnvironmentError {
    pub interpreter: Version,
    pub requires: VersionSpecifiers,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_missing_field_display() {
        let error = PythonError::missing_field("setup.py", "version");
        assert_eq!(
            error.to_string(),
            "Missing required field 'version' in setup.py"
        );
    }

    #[test]
    fn test_setup_parse_display() {
        let error = PythonError::setup_parse(4, "unterminated string literal");
        assert_eq!(
            error.to_string(),
            "Failed to parse setup.py at line 4: unterminated string literal"
        );
    }

    #[test]
    fn test_resolution_error_display() {
        let error = ResolutionError::NotFound {
            package: "requests".into(),
            index: "https://pypi.org/pypi".into(),
        };
        assert_eq!(error.package(), "requests");
        assert_eq!(
            error.to_string(),
            "Package 'requests' not found in index https://pypi.org/pypi"
        );

        let wrapped: PythonError = error.into();
        assert!(matches!(wrapped, PythonError::Resolution(_)));
    }

    #[test]
    fn test_incompatible_environment_display() {
        let error = IncompatibleEnvironmentError {
            interpreter: Version::from_str("3.6").unwrap(),
            requires: VersionSpecifiers::from_str(">=3.7").unwrap(),
        };
        assert_eq!(
            error.to_string(),
            "Python 3.6 does not satisfy requires-python '>=3.7'"
        );
    }

    #[test]
    fn test_core_error_conversion() {
        let error: PythonError = DescError::InsecureUrl("http://mirror.test".into()).into();
        assert_eq!(error.to_string(), "refusing non-HTTPS URL: http://mirror.test");
    }
}
