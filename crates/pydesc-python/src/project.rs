//! A loaded project and the packaging operations over it.

use crate::discovery::discover_packages;
use crate::error::Result;
use crate::install::record_install;
use crate::interpreter::check_python_requires;
use crate::parser::DescriptorParser;
use crate::resolver::Resolver;
use crate::types::PackageDescriptor;
use pep440_rs::Version;
use pydesc_core::{PackageIndex, ResolvedPackages};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// A project root with its descriptor, read once at open time.
///
/// # Examples
///
/// ```no_run
/// use pydesc_python::Project;
/// use std::path::Path;
///
/// let project = Project::open(Path::new(".")).unwrap();
/// println!("{} {}", project.descriptor().name, project.descriptor().version);
/// for package in project.discover().unwrap() {
///     println!("  {}", package);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    descriptor: PackageDescriptor,
}

/// Outcome of [`Project::install`].
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub name: String,
    pub version: String,
    pub dist_info: PathBuf,
    pub packages: BTreeSet<String>,
    pub dependencies: ResolvedPackages,
}

impl Project {
    /// Loads the descriptor of the project at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        let descriptor = DescriptorParser::new().load(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            descriptor,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn descriptor(&self) -> &PackageDescriptor {
        &self.descriptor
    }

    /// Packages making up the distribution.
    pub fn discover(&self) -> Result<BTreeSet<String>> {
        discover_packages(&self.root, &self.descriptor.packages)
    }

    /// Fails unless `interpreter` satisfies `python_requires`.
    pub fn check_interpreter(&self, interpreter: &Version) -> Result<()> {
        check_python_requires(self.descriptor.python_requires.as_deref(), interpreter)
    }

    /// Resolves the declared dependencies against `index`.
    pub async fn resolve<I: PackageIndex>(&self, index: I) -> Result<ResolvedPackages> {
        let resolved = Resolver::new(index)
            .resolve(&self.descriptor.dependencies)
            .await?;
        Ok(resolved)
    }

    /// Runs a full install: version gate, discovery, resolution, then
    /// records the project into `target`.
    ///
    /// Nothing is written when any step before recording fails.
    pub async fn install<I: PackageIndex>(
        &self,
        target: &Path,
        interpreter: &Version,
        index: I,
    ) -> Result<InstallReport> {
        self.check_interpreter(interpreter)?;
        let packages = self.discover()?;
        let dependencies = self.resolve(index).await?;
        let dist_info = record_install(target, &self.descriptor, &packages)?;

        Ok(InstallReport {
            name: self.descriptor.name.clone(),
            version: self.descriptor.version.clone(),
            dist_info,
            packages,
            dependencies,
        })
    }
}
