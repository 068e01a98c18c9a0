//! Manifest parsing.
//!
//! Two manifest styles are understood: the call-style `setup.py` and the
//! PEP 621 `[project]` table of `pyproject.toml`. Both are read into the
//! same [`PackageDescriptor`], after validating versions, specifiers,
//! requirements and discovery patterns.

mod pyproject;
mod setup_py;

use crate::discovery::PackageFinder;
use crate::error::{PythonError, Result};
use crate::registry::normalize_package_name;
use crate::types::{
    Dependency, DependencySource, ManifestFormat, PackageDescriptor, PackageSelection,
};
use pep440_rs::{Version, VersionSpecifiers};
use pep508_rs::{Requirement, VersionOrUrl};
use std::path::Path;
use std::str::FromStr;

/// Descriptor fields as read from a manifest, before validation.
#[derive(Debug, Clone, PartialEq)]
struct RawDescriptor {
    name: String,
    version: String,
    description: Option<String>,
    packages: PackageSelection,
    dependencies: Vec<String>,
    python_requires: Option<String>,
    format: ManifestFormat,
}

/// Parser for Python project manifests.
///
/// # Examples
///
/// ```
/// use pydesc_python::parser::DescriptorParser;
///
/// let content = r#"
/// from setuptools import setup, find_packages
///
/// setup(
///     name="test-python-project",
///     version="0.1.0",
///     packages=find_packages(),
///     install_requires=["requests"],
///     python_requires=">=3.7",
/// )
/// "#;
///
/// let descriptor = DescriptorParser::new().parse_setup_py(content).unwrap();
/// assert_eq!(descriptor.name, "test-python-project");
/// assert_eq!(descriptor.dependencies[0].name, "requests");
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct DescriptorParser;

impl DescriptorParser {
    /// Create a new descriptor parser.
    pub fn new() -> Self {
        Self
    }

    /// Parse `setup.py` source.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - there is no `setup(...)` call or the call is malformed
    /// - `name` or `version` is missing
    /// - a descriptor field holds a non-literal expression
    /// - a version, specifier or requirement is invalid
    pub fn parse_setup_py(&self, content: &str) -> Result<PackageDescriptor> {
        validate(setup_py::read_setup_py(content)?)
    }

    /// Parse `pyproject.toml` source.
    ///
    /// Returns `Ok(None)` if the file has no `[project]` table.
    pub fn parse_pyproject(&self, content: &str) -> Result<Option<PackageDescriptor>> {
        pyproject::read_pyproject(content)?.map(validate).transpose()
    }

    /// Load the descriptor of the project rooted at `root`.
    ///
    /// A `pyproject.toml` with a `[project]` table wins over `setup.py`.
    ///
    /// # Errors
    ///
    /// Returns `PythonError::ManifestNotFound` if neither manifest applies.
    pub fn load(&self, root: &Path) -> Result<PackageDescriptor> {
        let pyproject = root.join(ManifestFormat::PyProject.file_name());
        if pyproject.is_file() {
            let content = std::fs::read_to_string(&pyproject)?;
            if let Some(descriptor) = self.parse_pyproject(&content)? {
                tracing::debug!("loaded descriptor from {}", pyproject.display());
                return Ok(descriptor);
            }
            tracing::debug!("pyproject.toml has no [project] table, trying setup.py");
        }

        let setup = root.join(ManifestFormat::SetupPy.file_name());
        if setup.is_file() {
            let content = std::fs::read_to_string(&setup)?;
            let descriptor = self.parse_setup_py(&content)?;
            tracing::debug!("loaded descriptor from {}", setup.display());
            return Ok(descriptor);
        }

        Err(PythonError::ManifestNotFound {
            root: root.to_path_buf(),
        })
    }
}

fn validate(raw: RawDescriptor) -> Result<PackageDescriptor> {
    if raw.name.trim().is_empty() {
        return Err(PythonError::invalid_field("name", "must not be empty"));
    }

    Version::from_str(&raw.version).map_err(|e| PythonError::InvalidVersion {
        version: raw.version.clone(),
        source: e,
    })?;

    if let Some(specifier) = &raw.python_requires {
        parse_specifiers(specifier)?;
    }

    if let PackageSelection::Discover(rule) = &raw.packages {
        PackageFinder::new(rule)?;
    }

    let dependencies = raw
        .dependencies
        .iter()
        .map(|spec| Dependency::parse(spec))
        .collect::<Result<Vec<_>>>()?;

    Ok(PackageDescriptor {
        name: raw.name,
        version: raw.version,
        description: raw.description,
        packages: raw.packages,
        dependencies,
        python_requires: raw.python_requires,
        format: raw.format,
    })
}

/// Parses a PEP 440 specifier set such as `>=3.7,<4`.
pub fn parse_specifiers(specifier: &str) -> Result<VersionSpecifiers> {
    VersionSpecifiers::from_str(specifier).map_err(|e| PythonError::InvalidVersionSpecifier {
        specifier: specifier.to_string(),
        source: e,
    })
}

impl Dependency {
    /// Parses a PEP 508 requirement such as `requests[socks]>=2.28; python_version >= "3.8"`.
    ///
    /// # Errors
    ///
    /// Returns `PythonError::InvalidDependencySpec` for malformed requirements.
    pub fn parse(spec: &str) -> Result<Self> {
        let raw = spec.trim();
        let requirement: Requirement =
            Requirement::from_str(raw).map_err(|e| PythonError::InvalidDependencySpec {
                spec: raw.to_string(),
                message: e.to_string(),
            })?;

        let (version_req, source) = match &requirement.version_or_url {
            Some(VersionOrUrl::VersionSpecifier(specs)) if !specs.is_empty() => {
                (Some(specs.to_string()), DependencySource::Index)
            }
            Some(VersionOrUrl::VersionSpecifier(_)) | None => (None, DependencySource::Index),
            Some(VersionOrUrl::Url(url)) => (
                None,
                DependencySource::Url {
                    url: url.to_string(),
                },
            ),
        };

        let markers = requirement.marker.try_to_string();

        Ok(Self {
            name: normalize_package_name(&requirement.name.to_string()),
            raw: raw.to_string(),
            version_req,
            extras: requirement.extras.iter().map(|e| e.to_string()).collect(),
            markers,
            source,
        })
    }
}
