//! PyPI index client.
//!
//! Versions are read from the JSON API (`{index}/{package}/json`). All
//! requests go through the shared [`HttpCache`] and are revalidated with
//! ETag/Last-Modified headers.

use crate::error::{PythonError, Result};
use crate::types::IndexVersion;
use async_trait::async_trait;
use pep440_rs::Version;
use pydesc_core::{DescError, HttpCache, IndexLookup, PackageIndex};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// Default index: the public PyPI JSON API.
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/pypi";

/// Normalize package name according to PEP 503.
///
/// Converts package name to lowercase and replaces underscores/dots with hyphens,
/// then filters out consecutive hyphens.
///
/// # Examples
///
/// ```
/// # use pydesc_python::registry::normalize_package_name;
/// assert_eq!(normalize_package_name("Flask"), "flask");
/// assert_eq!(normalize_package_name("django_rest_framework"), "django-rest-framework");
/// assert_eq!(normalize_package_name("Pillow.Image"), "pillow-image");
/// assert_eq!(normalize_package_name("my__package"), "my-package");
/// ```
pub fn normalize_package_name(name: &str) -> String {
    name.to_lowercase()
        .replace(&['_', '.'][..], "-")
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Client for a PyPI-compatible JSON index.
///
/// # Examples
///
/// ```no_run
/// # use pydesc_python::PypiIndex;
/// # use pydesc_core::{HttpCache, IndexLookup};
/// # use std::sync::Arc;
/// # #[tokio::main]
/// # async fn main() {
/// let cache = Arc::new(HttpCache::new());
/// let index = PypiIndex::new(cache);
///
/// let lookup = index.get_versions("requests").await.unwrap();
/// assert!(matches!(lookup, IndexLookup::Found(_)));
/// # }
/// ```
#[derive(Clone)]
pub struct PypiIndex {
    cache: Arc<HttpCache>,
    base_url: String,
}

impl PypiIndex {
    /// Creates a client for the public PyPI index.
    pub fn new(cache: Arc<HttpCache>) -> Self {
        Self::with_url(cache, DEFAULT_INDEX_URL)
    }

    /// Creates a client for the index at `base_url`.
    ///
    /// A trailing slash is ignored.
    pub fn with_url(cache: Arc<HttpCache>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { cache, base_url }
    }

    /// Base URL of this index.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches all versions of a project, newest first.
    ///
    /// Yanked versions are included and flagged. A 404 answer is reported as
    /// [`IndexLookup::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the HTTP request fails or the index answers with a non-404 error
    /// - the response is not valid index JSON
    pub async fn get_versions(&self, name: &str) -> Result<IndexLookup<IndexVersion>> {
        let normalized = normalize_package_name(name);
        let url = format!(
            "{}/{}/json",
            self.base_url,
            urlencoding::encode(&normalized)
        );

        let data = match self.cache.get_cached(&url).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} not found on {}", name, self.base_url);
                return Ok(IndexLookup::NotFound);
            }
            Err(e) => return Err(PythonError::registry_error(name, e)),
        };

        parse_package_versions(name, &data).map(IndexLookup::Found)
    }
}

#[async_trait]
impl PackageIndex for PypiIndex {
    type Version = IndexVersion;

    async fn get_versions(&self, name: &str) -> pydesc_core::Result<IndexLookup<IndexVersion>> {
        PypiIndex::get_versions(self, name)
            .await
            .map_err(|e| DescError::IndexError {
                package: name.to_string(),
                source: Box::new(e),
            })
    }

    fn index_url(&self) -> &str {
        &self.base_url
    }
}

// JSON response types

#[derive(Debug, Deserialize)]
struct PypiResponse {
    info: PypiInfo,
    #[serde(default)]
    releases: HashMap<String, Vec<PypiRelease>>,
}

#[derive(Debug, Deserialize)]
struct PypiInfo {
    version: String,
}

#[derive(Debug, Deserialize)]
struct PypiRelease {
    yanked: Option<bool>,
}

/// Parse the version list out of a JSON API response.
///
/// A release counts as yanked only when every file of it is yanked; releases
/// without files are skipped. Indexes that omit `releases` yield the single
/// version from `info`.
fn parse_package_versions(package_name: &str, data: &[u8]) -> Result<Vec<IndexVersion>> {
    let response: PypiResponse =
        serde_json::from_slice(data).map_err(|e| PythonError::api_response_error(package_name, e))?;

    if response.releases.is_empty() {
        return Ok(Version::from_str(&response.info.version)
            .ok()
            .map(|_| IndexVersion {
                version: response.info.version,
                yanked: false,
            })
            .into_iter()
            .collect());
    }

    let mut versions_with_parsed: Vec<(IndexVersion, Version)> = response
        .releases
        .into_iter()
        .filter(|(_, files)| !files.is_empty())
        .filter_map(|(version_str, files)| {
            let yanked = files.iter().all(|f| f.yanked.unwrap_or(false));

            // Legacy non-PEP 440 versions are dropped
            Version::from_str(&version_str).ok().map(|parsed| {
                (
                    IndexVersion {
                        version: version_str,
                        yanked,
                    },
                    parsed,
                )
            })
        })
        .collect();

    versions_with_parsed.sort_by(|a, b| b.1.cmp(&a.1));

    Ok(versions_with_parsed.into_iter().map(|(v, _)| v).collect())
}
