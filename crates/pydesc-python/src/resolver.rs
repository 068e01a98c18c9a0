//! Direct dependency resolution.
//!
//! Each declared dependency is mapped to one concrete version: the newest
//! non-yanked release on the index that satisfies its specifier. Only the
//! declared dependencies are resolved, not their own requirements.

use crate::error::ResolutionError;
use crate::types::{Dependency, DependencySource};
use futures::future::join_all;
use pep440_rs::{Operator, Version, VersionSpecifiers};
use pydesc_core::{IndexLookup, PackageIndex, ResolvedPackage, ResolvedPackages, ResolvedSource, VersionInfo};
use std::str::FromStr;

/// Resolves dependencies against a [`PackageIndex`].
///
/// # Examples
///
/// ```no_run
/// use pydesc_core::HttpCache;
/// use pydesc_python::{Dependency, PypiIndex, Resolver};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let index = PypiIndex::new(Arc::new(HttpCache::new()));
/// let resolver = Resolver::new(index);
///
/// let deps = vec![Dependency::parse("requests").unwrap()];
/// let resolved = resolver.resolve(&deps).await.unwrap();
/// assert!(resolved.get_version("requests").is_some());
/// # }
/// ```
pub struct Resolver<I> {
    index: I,
}

impl<I: PackageIndex> Resolver<I> {
    pub fn new(index: I) -> Self {
        Self { index }
    }

    /// Resolves every dependency, querying the index concurrently.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing dependency in declaration order.
    pub async fn resolve(&self, dependencies: &[Dependency]) -> Result<ResolvedPackages, ResolutionError> {
        let results = join_all(dependencies.iter().map(|dep| self.resolve_one(dep))).await;
        results.into_iter().collect()
    }

    /// Resolves a single dependency.
    pub async fn resolve_one(&self, dep: &Dependency) -> Result<ResolvedPackage, ResolutionError> {
        if let DependencySource::Url { url } = &dep.source {
            tracing::debug!("{} is a direct reference, skipping index", dep.name);
            return Ok(ResolvedPackage {
                name: dep.name.clone(),
                version: version_from_artifact_url(url),
                source: ResolvedSource::Url { url: url.clone() },
            });
        }

        let specifiers = dep
            .version_req
            .as_deref()
            .map(VersionSpecifiers::from_str)
            .transpose()
            .map_err(|e| ResolutionError::Index {
                package: dep.name.clone(),
                message: e.to_string(),
            })?;

        let versions = match self.index.get_versions(&dep.name).await {
            Ok(IndexLookup::Found(versions)) => versions,
            Ok(IndexLookup::NotFound) => {
                return Err(ResolutionError::NotFound {
                    package: dep.name.clone(),
                    index: self.index.index_url().to_string(),
                });
            }
            Err(e) => {
                tracing::warn!("index lookup for {} failed: {}", dep.name, e);
                return Err(ResolutionError::Index {
                    package: dep.name.clone(),
                    message: e.to_string(),
                });
            }
        };

        let selected = select_version(&versions, specifiers.as_ref()).ok_or_else(|| {
            ResolutionError::NoMatchingVersion {
                package: dep.name.clone(),
                specifier: dep.version_req.clone().unwrap_or_else(|| "*".to_string()),
            }
        })?;

        tracing::debug!("resolved {} to {}", dep.name, selected.version_string());

        Ok(ResolvedPackage {
            name: dep.name.clone(),
            version: Some(selected.version_string().to_string()),
            source: ResolvedSource::Index {
                url: self.index.index_url().to_string(),
            },
        })
    }
}

/// Picks the newest acceptable version.
///
/// Unparsable versions are never picked. Yanked versions are skipped unless
/// the specifier pins an exact version and only yanked releases match it
/// (PEP 592). Pre-releases are only considered when the specifier names one
/// or when no final release satisfies it.
pub fn select_version<'a, V: VersionInfo>(
    versions: &'a [V],
    specifiers: Option<&VersionSpecifiers>,
) -> Option<&'a V> {
    newest_matching(versions, specifiers, false).or_else(|| {
        specifiers
            .filter(|specs| is_exact_pin(specs))
            .and_then(|specs| newest_matching(versions, Some(specs), true))
    })
}

fn is_exact_pin(specifiers: &VersionSpecifiers) -> bool {
    !specifiers.is_empty()
        && specifiers
            .iter()
            .all(|s| matches!(s.operator(), Operator::Equal | Operator::ExactEqual))
}

fn newest_matching<'a, V: VersionInfo>(
    versions: &'a [V],
    specifiers: Option<&VersionSpecifiers>,
    include_yanked: bool,
) -> Option<&'a V> {
    let mut candidates: Vec<(&V, Version)> = versions
        .iter()
        .filter(|v| include_yanked || !v.is_yanked())
        .filter_map(|v| Version::from_str(v.version_string()).ok().map(|parsed| (v, parsed)))
        .filter(|(_, parsed)| specifiers.is_none_or(|specs| specs.contains(parsed)))
        .collect();

    candidates.sort_by(|a, b| b.1.cmp(&a.1));

    let allow_pre = specifiers.is_some_and(|specs| specs.iter().any(|s| s.version().any_prerelease()));

    candidates
        .iter()
        .find(|(_, parsed)| allow_pre || !parsed.any_prerelease())
        .or_else(|| candidates.first())
        .map(|(v, _)| *v)
}

/// Version named by a wheel or sdist file name in a direct reference.
///
/// Returns `None` for VCS references and archives without a PEP 440 version.
pub fn version_from_artifact_url(url: &str) -> Option<String> {
    if url.starts_with("git+") || url.starts_with("hg+") || url.starts_with("svn+") || url.starts_with("bzr+") {
        return None;
    }

    let path = url.split(['#', '?']).next()?;
    let file = path.rsplit('/').next()?;

    let candidate = if let Some(stem) = file.strip_suffix(".whl") {
        stem.split('-').nth(1)?
    } else {
        let stem = [".tar.gz", ".tar.bz2", ".tar.xz", ".zip"]
            .iter()
            .find_map(|ext| file.strip_suffix(ext))?;
        stem.rsplit_once('-')?.1
    };

    Version::from_str(candidate).ok().map(|_| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IndexVersion;
    use async_trait::async_trait;
    use pydesc_core::DescError;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockIndex {
        projects: HashMap<String, Vec<IndexVersion>>,
        broken: Option<String>,
    }

    impl MockIndex {
        fn with(mut self, name: &str, versions: &[(&str, bool)]) -> Self {
            self.projects.insert(
                name.to_string(),
                versions
                    .iter()
                    .map(|(v, yanked)| IndexVersion {
                        version: v.to_string(),
                        yanked: *yanked,
                    })
                    .collect(),
            );
            self
        }
    }

    #[async_trait]
    impl PackageIndex for MockIndex {
        type Version = IndexVersion;

        async fn get_versions(&self, name: &str) -> pydesc_core::Result<IndexLookup<IndexVersion>> {
            if self.broken.as_deref() == Some(name) {
                return Err(DescError::HttpStatus {
                    url: format!("https://mock.test/{}/json", name),
                    status: 503,
                });
            }
            Ok(match self.projects.get(name) {
                Some(versions) => IndexLookup::Found(versions.clone()),
                None => IndexLookup::NotFound,
            })
        }

        fn index_url(&self) -> &str {
            "https://mock.test"
        }
    }

    fn deps(specs: &[&str]) -> Vec<Dependency> {
        specs.iter().map(|s| Dependency::parse(s).unwrap()).collect()
    }

    fn versions(list: &[(&str, bool)]) -> Vec<IndexVersion> {
        list.iter()
            .map(|(v, yanked)| IndexVersion {
                version: v.to_string(),
                yanked: *yanked,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_unconstrained_resolves_latest_final() {
        let index = MockIndex::default().with(
            "requests",
            &[("2.32.0rc1", false), ("2.31.0", false), ("2.30.0", false)],
        );
        let resolver = Resolver::new(index);

        let resolved = resolver.resolve(&deps(&["requests"])).await.unwrap();

        assert_eq!(resolved.get_version("requests"), Some("2.31.0"));
        assert_eq!(
            resolved.get("requests").unwrap().source,
            ResolvedSource::Index {
                url: "https://mock.test".into()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_package_is_resolution_error() {
        let resolver = Resolver::new(MockIndex::default());

        let err = resolver.resolve(&deps(&["requests"])).await.unwrap_err();

        assert_eq!(
            err,
            ResolutionError::NotFound {
                package: "requests".into(),
                index: "https://mock.test".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_no_matching_version() {
        let index = MockIndex::default().with("requests", &[("2.31.0", false)]);
        let resolver = Resolver::new(index);

        let err = resolver.resolve(&deps(&["requests>=3"])).await.unwrap_err();

        assert!(matches!(err, ResolutionError::NoMatchingVersion { ref specifier, .. } if specifier == ">=3"));
    }

    #[tokio::test]
    async fn test_first_failure_in_declaration_order() {
        let index = MockIndex::default().with("flask", &[("3.0.0", false)]);
        let resolver = Resolver::new(index);

        let err = resolver
            .resolve(&deps(&["flask", "missing-one", "missing-two"]))
            .await
            .unwrap_err();

        assert_eq!(err.package(), "missing-one");
    }

    #[tokio::test]
    async fn test_index_failure() {
        let index = MockIndex {
            broken: Some("requests".into()),
            ..MockIndex::default()
        };
        let resolver = Resolver::new(index);

        let err = resolver.resolve(&deps(&["requests"])).await.unwrap_err();
        assert!(matches!(err, ResolutionError::Index { .. }));
    }

    #[tokio::test]
    async fn test_url_dependency_skips_index() {
        let resolver = Resolver::new(MockIndex::default());

        let resolved = resolver
            .resolve(&deps(&["demo @ https://example.com/demo-1.2.0-py3-none-any.whl"]))
            .await
            .unwrap();

        let demo = resolved.get("demo").unwrap();
        assert_eq!(demo.version.as_deref(), Some("1.2.0"));
        assert!(matches!(demo.source, ResolvedSource::Url { .. }));
    }

    #[tokio::test]
    async fn test_empty_dependencies() {
        let resolver = Resolver::new(MockIndex::default());
        let resolved = resolver.resolve(&[]).await.unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_select_skips_yanked() {
        let list = versions(&[("2.0.0", true), ("1.9.0", false)]);
        assert_eq!(select_version(&list, None).unwrap().version, "1.9.0");
    }

    #[test]
    fn test_select_all_yanked() {
        let list = versions(&[("2.0.0", true)]);
        assert!(select_version(&list, None).is_none());

        let specs = VersionSpecifiers::from_str(">=1.0").unwrap();
        assert!(select_version(&list, Some(&specs)).is_none());
    }

    #[test]
    fn test_select_yanked_exact_pin() {
        let list = versions(&[("2.0.0", true), ("1.9.0", false)]);
        let specs = VersionSpecifiers::from_str("==2.0.0").unwrap();
        assert_eq!(select_version(&list, Some(&specs)).unwrap().version, "2.0.0");

        let wildcard = VersionSpecifiers::from_str("==2.0.*").unwrap();
        assert!(select_version(&list, Some(&wildcard)).is_none());
    }

    #[test]
    fn test_exact_pin_prefers_non_yanked() {
        let list = versions(&[("2.0.0", true), ("2.0.0", false)]);
        let specs = VersionSpecifiers::from_str("==2.0.0").unwrap();
        assert!(!select_version(&list, Some(&specs)).unwrap().yanked);
    }

    #[test]
    fn test_select_prerelease_when_named() {
        let list = versions(&[("2.0.0b1", false), ("1.9.0", false)]);
        let specs = VersionSpecifiers::from_str(">=2.0.0b1").unwrap();
        assert_eq!(select_version(&list, Some(&specs)).unwrap().version, "2.0.0b1");
    }

    #[test]
    fn test_select_prerelease_when_nothing_final_matches() {
        let list = versions(&[("0.1.0a2", false), ("0.1.0a1", false)]);
        assert_eq!(select_version(&list, None).unwrap().version, "0.1.0a2");
    }

    #[test]
    fn test_select_orders_by_version() {
        let list = versions(&[("1.9.0", false), ("1.10.0", false), ("1.2.0", false)]);
        assert_eq!(select_version(&list, None).unwrap().version, "1.10.0");
    }

    #[test]
    fn test_version_from_artifact_url() {
        assert_eq!(
            version_from_artifact_url("https://example.com/demo-1.2.0-py3-none-any.whl"),
            Some("1.2.0".into())
        );
        assert_eq!(
            version_from_artifact_url("https://example.com/my-demo-0.4.tar.gz#sha256=abc"),
            Some("0.4".into())
        );
        assert_eq!(version_from_artifact_url("git+https://github.com/o/demo.git@v1.0"), None);
        assert_eq!(version_from_artifact_url("https://example.com/archive/main.zip"), None);
    }
}
