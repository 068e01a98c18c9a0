//! Python project descriptor support for pydesc.
//!
//! This crate reads the declarative metadata of a Python project and
//! implements the packaging operations it implies.
//!
//! # Features
//!
//! - **Manifests**: static reading of `setup.py` `setup(...)` calls and PEP 621
//!   `[project]` tables in `pyproject.toml`
//! - **Discovery**: `find_packages` / `find_namespace_packages` semantics over
//!   the directory tree
//! - **Resolution**: direct dependencies resolved against the PyPI JSON API
//!   with HTTP caching
//! - **Version gate**: `python_requires` checked against the interpreter
//! - **Install records**: `.dist-info` directories written and queried
//!
//! # Examples
//!
//! ```no_run
//! use pydesc_core::HttpCache;
//! use pydesc_python::{Project, PypiIndex};
//! use pep440_rs::Version;
//! use std::path::Path;
//! use std::str::FromStr;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> pydesc_python::Result<()> {
//! let project = Project::open(Path::new("."))?;
//! project.check_interpreter(&Version::from_str("3.11").unwrap())?;
//!
//! let index = PypiIndex::new(Arc::new(HttpCache::new()));
//! let resolved = project.resolve(index).await?;
//! for package in resolved.iter() {
//!     println!("{} {:?}", package.name, package.version);
//! }
//! # Ok(())
//! # }
//! ```

pub mod discovery;
pub mod error;
pub mod install;
pub mod interpreter;
pub mod parser;
pub mod project;
pub mod registry;
pub mod resolver;
pub mod types;

// Re-export commonly used types
pub use discovery::{PackageFinder, discover_packages};
pub use error::{IncompatibleEnvironmentError, PythonError, ResolutionError, Result};
pub use install::{installed_version, read_installed, record_install};
pub use interpreter::{check_python_requires, detect_interpreter};
pub use parser::DescriptorParser;
pub use project::{InstallReport, Project};
pub use registry::PypiIndex;
pub use resolver::Resolver;
pub use types::{
    Dependency, DependencySource, DiscoveryRule, IndexVersion, ManifestFormat, PackageDescriptor,
    PackageSelection,
};
