//! Package discovery.
//!
//! Mirrors `setuptools.find_packages`: walk the search root top-down, treat
//! a directory as a package when it holds `__init__.py` (or always, in
//! namespace mode), and only descend through package directories.

use crate::error::{PythonError, Result};
use crate::types::{DiscoveryRule, PackageSelection};
use glob::Pattern;
use std::collections::BTreeSet;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// File marking a directory as a regular package.
pub const PACKAGE_MARKER: &str = "__init__.py";

/// Patterns excluded from every discovery, whatever the rule says.
pub const ALWAYS_EXCLUDE: [&str; 2] = ["ez_setup", "*__pycache__"];

const BYTECODE_DIR: &str = "__pycache__";

/// Compiled form of a [`DiscoveryRule`].
///
/// # Examples
///
/// ```no_run
/// use pydesc_python::discovery::PackageFinder;
/// use pydesc_python::types::DiscoveryRule;
/// use std::path::Path;
///
/// let finder = PackageFinder::new(&DiscoveryRule::default()).unwrap();
/// for package in finder.find(Path::new(".")) {
///     println!("{}", package);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct PackageFinder {
    rule: DiscoveryRule,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    always_exclude: Vec<Pattern>,
}

impl PackageFinder {
    /// Compiles the include/exclude patterns of `rule`.
    ///
    /// # Errors
    ///
    /// Returns `PythonError::InvalidField` for a malformed pattern.
    pub fn new(rule: &DiscoveryRule) -> Result<Self> {
        Ok(Self {
            rule: rule.clone(),
            include: compile(&rule.include, "include")?,
            exclude: compile(&rule.exclude, "exclude")?,
            always_exclude: ALWAYS_EXCLUDE
                .iter()
                .map(|p| Pattern::new(p))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| PythonError::invalid_field("packages.exclude", e.to_string()))?,
        })
    }

    /// Finds packages below `project_root.join(rule.root)`.
    ///
    /// A missing or unreadable search root yields an empty set.
    pub fn find(&self, project_root: &Path) -> BTreeSet<String> {
        let base = project_root.join(&self.rule.root);
        let mut packages = BTreeSet::new();

        let walker = WalkDir::new(&base)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| self.is_package_dir(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    if e.depth() == 0 {
                        tracing::debug!("search root {} not readable: {}", base.display(), e);
                    } else {
                        tracing::warn!("skipping entry during discovery: {}", e);
                    }
                    continue;
                }
            };

            let Some(name) = dotted_name(&base, entry.path()) else {
                tracing::warn!("skipping non UTF-8 path {}", entry.path().display());
                continue;
            };

            if self.is_selected(&name) {
                tracing::debug!("found package {}", name);
                packages.insert(name);
            }
        }

        packages
    }

    fn is_package_dir(&self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        if name.contains('.') || name == BYTECODE_DIR {
            return false;
        }
        self.rule.namespaces || entry.path().join(PACKAGE_MARKER).is_file()
    }

    fn is_selected(&self, name: &str) -> bool {
        self.include.iter().any(|p| p.matches(name))
            && !self
                .exclude
                .iter()
                .chain(&self.always_exclude)
                .any(|p| p.matches(name))
    }
}

fn compile(patterns: &[String], kind: &str) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| {
                PythonError::invalid_field(format!("packages.{}", kind), format!("'{}': {}", p, e))
            })
        })
        .collect()
}

fn dotted_name(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("."))
}

/// Returns the package names of a selection.
///
/// Explicit lists are returned as declared, without checking the filesystem.
///
/// # Errors
///
/// Returns an error if a discovery pattern is malformed.
pub fn discover_packages(project_root: &Path, selection: &PackageSelection) -> Result<BTreeSet<String>> {
    match selection {
        PackageSelection::Discover(rule) => Ok(PackageFinder::new(rule)?.find(project_root)),
        PackageSelection::Explicit { packages } => Ok(packages.iter().cloned().collect()),
    }
}

/// Top-level names of a package set (`demo.core` → `demo`).
pub fn top_level(packages: &BTreeSet<String>) -> BTreeSet<String> {
    packages
        .iter()
        .filter_map(|p| p.split('.').next())
        .map(String::from)
        .collect()
}
