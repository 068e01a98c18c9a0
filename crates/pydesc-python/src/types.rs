use pydesc_core::VersionInfo;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Declarative metadata of a Python project.
///
/// Produced once by a manifest parser and never mutated afterwards; all
/// packaging operations read from it.
///
/// # Examples
///
/// ```
/// use pydesc_python::types::{ManifestFormat, PackageDescriptor, PackageSelection};
///
/// let descriptor = PackageDescriptor {
///     name: "test-python-project".into(),
///     version: "0.1.0".into(),
///     description: None,
///     packages: PackageSelection::default(),
///     dependencies: vec![],
///     python_requires: Some(">=3.7".into()),
///     format: ManifestFormat::SetupPy,
/// };
///
/// assert_eq!(descriptor.normalized_name(), "test-python-project");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageDescriptor {
    /// Project name as declared
    pub name: String,
    /// PEP 440 version string as declared
    pub version: String,
    /// One-line summary
    pub description: Option<String>,
    /// Which package directories make up the distribution
    pub packages: PackageSelection,
    /// Runtime dependencies in declaration order
    pub dependencies: Vec<Dependency>,
    /// PEP 440 specifier the interpreter must satisfy
    pub python_requires: Option<String>,
    /// Manifest the descriptor was read from
    pub format: ManifestFormat,
}

impl PackageDescriptor {
    /// Project name normalized according to PEP 503.
    pub fn normalized_name(&self) -> String {
        crate::registry::normalize_package_name(&self.name)
    }
}

/// Manifest file a descriptor was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestFormat {
    /// `setup.py` with a `setup(...)` call
    SetupPy,
    /// `pyproject.toml` with a PEP 621 `[project]` table
    PyProject,
}

impl ManifestFormat {
    /// File name of the manifest.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::SetupPy => "setup.py",
            Self::PyProject => "pyproject.toml",
        }
    }
}

impl fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// How the distribution's packages are chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PackageSelection {
    /// Packages found by walking the directory tree
    Discover(DiscoveryRule),
    /// Packages listed by hand
    Explicit { packages: Vec<String> },
}

impl Default for PackageSelection {
    fn default() -> Self {
        Self::Discover(DiscoveryRule::default())
    }
}

/// Directory-scan rule equivalent to `find_packages()`.
///
/// `include` and `exclude` are shell-style patterns matched against dotted
/// package names. With `namespaces` set every directory counts as a package,
/// otherwise only directories holding an `__init__.py`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryRule {
    /// Directory to search, relative to the project root
    pub root: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub namespaces: bool,
}

impl Default for DiscoveryRule {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            include: vec!["*".to_string()],
            exclude: Vec::new(),
            namespaces: false,
        }
    }
}

/// One declared runtime dependency.
///
/// # Examples
///
/// ```
/// use pydesc_python::types::Dependency;
///
/// let dep = Dependency::parse("requests").unwrap();
/// assert_eq!(dep.name, "requests");
/// assert!(dep.version_req.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    /// Package name (normalized per PEP 503)
    pub name: String,
    /// Declaration as written in the manifest
    pub raw: String,
    /// PEP 440 version specifier (e.g., ">=2.28.0,<3.0")
    pub version_req: Option<String>,
    /// PEP 508 extras (e.g., ["security", "socks"])
    pub extras: Vec<String>,
    /// PEP 508 environment markers (e.g., "python_version >= '3.8'")
    pub markers: Option<String>,
    /// Where the dependency is fetched from
    pub source: DependencySource,
}

/// Origin of a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DependencySource {
    /// Resolved against the configured package index
    Index,
    /// Direct reference (`name @ url`)
    Url { url: String },
}

/// One published version of a project on the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexVersion {
    /// Version string (PEP 440)
    pub version: String,
    /// Whether every file of this release is yanked
    pub yanked: bool,
}

impl VersionInfo for IndexVersion {
    fn version_string(&self) -> &str {
        &self.version
    }

    fn is_yanked(&self) -> bool {
        self.yanked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_discovery_rule() {
        let rule = DiscoveryRule::default();
        assert_eq!(rule.root, PathBuf::from("."));
        assert_eq!(rule.include, vec!["*"]);
        assert!(rule.exclude.is_empty());
        assert!(!rule.namespaces);
        assert_eq!(PackageSelection::default(), PackageSelection::Discover(rule));
    }

    #[test]
    fn test_manifest_format_file_names() {
        assert_eq!(ManifestFormat::SetupPy.to_string(), "setup.py");
        assert_eq!(ManifestFormat::PyProject.file_name(), "pyproject.toml");
    }

    #[test]
    fn test_index_version_info_trait() {
        let version = IndexVersion {
            version: "2.28.2".into(),
            yanked: true,
        };

        assert_eq!(version.version_string(), "2.28.2");
        assert!(version.is_yanked());
    }

    #[test]
    fn test_descriptor_normalized_name() {
        let descriptor = PackageDescriptor {
            name: "My_Project.Core".into(),
            version: "1.0".into(),
            description: None,
            packages: PackageSelection::default(),
            dependencies: vec![],
            python_requires: None,
            format: ManifestFormat::PyProject,
        };

        assert_eq!(descriptor.normalized_name(), "my-project-core");
    }
}
