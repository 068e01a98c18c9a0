use crate::error::Result;
use async_trait::async_trait;

/// Generic package index interface.
///
/// Implementors provide read access to a package index (PyPI or a private
/// mirror of it): the list of published versions of a project and the
/// newest version matching a requirement.
///
/// A project that does not exist on the index must be reported as
/// [`IndexLookup::NotFound`] rather than an error, so callers can tell a
/// missing project apart from an unreachable index.
///
/// # Examples
///
/// ```no_run
/// use pydesc_core::{IndexLookup, PackageIndex, VersionInfo};
/// use async_trait::async_trait;
///
/// #[derive(Clone)]
/// struct MyVersion {
///     version: String,
/// }
///
/// impl VersionInfo for MyVersion {
///     fn version_string(&self) -> &str {
///         &self.version
///     }
///
///     fn is_yanked(&self) -> bool {
///         false
///     }
/// }
///
/// struct MyIndex;
///
/// #[async_trait]
/// impl PackageIndex for MyIndex {
///     type Version = MyVersion;
///
///     async fn get_versions(&self, _name: &str) -> pydesc_core::Result<IndexLookup<MyVersion>> {
///         Ok(IndexLookup::Found(vec![MyVersion { version: "1.0.0".into() }]))
///     }
///
///     fn index_url(&self) -> &str {
///         "https://example.com/simple"
///     }
/// }
/// ```
#[async_trait]
pub trait PackageIndex: Send + Sync {
    /// Version information type for this index.
    type Version: VersionInfo + Clone + Send + Sync;

    /// Fetches all published versions for a project, newest first.
    ///
    /// May include yanked versions.
    ///
    /// # Errors
    ///
    /// Returns error if the network request or response parsing fails.
    async fn get_versions(&self, name: &str) -> Result<IndexLookup<Self::Version>>;

    /// Base URL of the index, used in diagnostics.
    fn index_url(&self) -> &str;
}

/// Outcome of looking a project up on an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexLookup<V> {
    /// The project exists; versions sorted newest first.
    Found(Vec<V>),
    /// The index has no project with this name.
    NotFound,
}

/// Version information trait.
pub trait VersionInfo {
    /// Version string (e.g., "2.31.0", "1.0.0rc1").
    fn version_string(&self) -> &str;

    /// Whether this version is yanked.
    fn is_yanked(&self) -> bool;
}
