//! Interpreter version gate.

use crate::error::{IncompatibleEnvironmentError, PythonError, Result};
use crate::parser::parse_specifiers;
use pep440_rs::{Version, VersionSpecifiers};
use std::str::FromStr;
use tokio::process::Command;

/// Interpreter used when none is configured.
pub const DEFAULT_PYTHON: &str = "python3";

/// Checks `interpreter` against a descriptor's `python_requires`.
///
/// A descriptor without `python_requires` accepts every interpreter.
///
/// # Errors
///
/// Returns `PythonError::IncompatibleEnvironment` when the version falls
/// outside the declared range.
///
/// # Examples
///
/// ```
/// use pydesc_python::interpreter::check_python_requires;
/// use pep440_rs::Version;
/// use std::str::FromStr;
///
/// let py36 = Version::from_str("3.6").unwrap();
/// let py37 = Version::from_str("3.7").unwrap();
///
/// assert!(check_python_requires(Some(">=3.7"), &py36).is_err());
/// assert!(check_python_requires(Some(">=3.7"), &py37).is_ok());
/// ```
pub fn check_python_requires(requires: Option<&str>, interpreter: &Version) -> Result<()> {
    let Some(requires) = requires else {
        return Ok(());
    };
    check(&parse_specifiers(requires)?, interpreter)
}

/// Checks `interpreter` against already parsed specifiers.
pub fn check(requires: &VersionSpecifiers, interpreter: &Version) -> Result<()> {
    if requires.contains(interpreter) {
        tracing::debug!("Python {} satisfies '{}'", interpreter, requires);
        return Ok(());
    }
    Err(IncompatibleEnvironmentError {
        interpreter: interpreter.clone(),
        requires: requires.clone(),
    }
    .into())
}

/// Parses an interpreter version given on the command line or in config.
pub fn parse_interpreter_version(version: &str) -> Result<Version> {
    Version::from_str(version.trim()).map_err(|e| PythonError::InvalidVersion {
        version: version.to_string(),
        source: e,
    })
}

/// Runs `<python> --version` and parses its answer.
///
/// # Errors
///
/// Returns `PythonError::InterpreterDetection` if the interpreter cannot be
/// started, exits unsuccessfully, or prints something unexpected.
pub async fn detect_interpreter(python: &str) -> Result<Version> {
    let output = Command::new(python)
        .arg("--version")
        .output()
        .await
        .map_err(|e| PythonError::InterpreterDetection {
            message: format!("failed to run '{} --version': {}", python, e),
        })?;

    if !output.status.success() {
        return Err(PythonError::InterpreterDetection {
            message: format!("'{} --version' exited with {}", python, output.status),
        });
    }

    // Python 2 printed the version on stderr
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let text = if stdout.trim().is_empty() { stderr } else { stdout };

    let version = parse_version_output(&text)?;
    tracing::debug!("detected Python {} from {}", version, python);
    Ok(version)
}

/// Parses the `Python X.Y.Z` line printed by `python --version`.
pub fn parse_version_output(output: &str) -> Result<Version> {
    let trimmed = output.trim();
    let version = trimmed
        .strip_prefix("Python ")
        .and_then(|rest| rest.split_whitespace().next())
        .ok_or_else(|| PythonError::InterpreterDetection {
            message: format!("unexpected version output '{}'", trimmed),
        })?;

    Version::from_str(version).map_err(|e| PythonError::InterpreterDetection {
        message: format!("invalid interpreter version '{}': {}", version, e),
    })
}
