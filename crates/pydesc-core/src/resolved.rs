//! Resolved package records.
//!
//! A resolution maps each declared dependency to one concrete version and
//! the place it comes from. The same records describe what is installed in
//! a target directory.

use serde::Serialize;
use std::collections::BTreeMap;

/// One dependency pinned to a concrete version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPackage {
    /// Normalized package name
    pub name: String,
    /// Exact version; `None` for direct references whose artifact does
    /// not name one (VCS checkouts, unversioned archives)
    pub version: Option<String>,
    /// Where the version comes from
    pub source: ResolvedSource,
}

/// Source of a resolved package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResolvedSource {
    /// A release listed on a package index
    Index {
        /// Index base URL
        url: String,
    },
    /// A direct URL reference (`name @ https://...`)
    Url {
        /// Artifact or VCS URL
        url: String,
    },
    /// A project recorded in a local site directory
    Local {
        /// Path of the dist-info directory
        path: String,
    },
}

/// Collection of resolved packages keyed by name.
///
/// Iteration is ordered by package name.
///
/// # Examples
///
/// ```
/// use pydesc_core::resolved::{ResolvedPackage, ResolvedPackages, ResolvedSource};
///
/// let mut packages = ResolvedPackages::new();
/// packages.insert(ResolvedPackage {
///     name: "requests".into(),
///     version: Some("2.31.0".into()),
///     source: ResolvedSource::Index {
///         url: "https://pypi.org/pypi".into(),
///     },
/// });
///
/// assert_eq!(packages.get_version("requests"), Some("2.31.0"));
/// assert_eq!(packages.len(), 1);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedPackages {
    packages: BTreeMap<String, ResolvedPackage>,
}

impl ResolvedPackages {
    /// Creates a new empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a resolved package, replacing any entry with the same name.
    pub fn insert(&mut self, package: ResolvedPackage) {
        self.packages.insert(package.name.clone(), package);
    }

    /// Gets a resolved package by name.
    pub fn get(&self, name: &str) -> Option<&ResolvedPackage> {
        self.packages.get(name)
    }

    /// Gets the resolved version string for a package.
    pub fn get_version(&self, name: &str) -> Option<&str> {
        self.packages.get(name).and_then(|p| p.version.as_deref())
    }

    /// Returns the number of resolved packages.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Returns true if there are no resolved packages.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Iterates over packages in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedPackage> {
        self.packages.values()
    }
}

impl FromIterator<ResolvedPackage> for ResolvedPackages {
    fn from_iter<T: IntoIterator<Item = ResolvedPackage>>(iter: T) -> Self {
        let mut packages = Self::new();
        for package in iter {
            packages.insert(package);
        }
        packages
    }
}
