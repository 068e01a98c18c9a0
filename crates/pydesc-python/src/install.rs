//! Recording projects into a site directory.
//!
//! An install writes the `.dist-info` directory the way installers do
//! (`METADATA`, `top_level.txt`, `INSTALLER`). Queries read those
//! directories back. No distribution files are copied.

use crate::error::Result;
use crate::registry::normalize_package_name;
use crate::types::PackageDescriptor;
use pydesc_core::{ResolvedPackage, ResolvedPackages, ResolvedSource};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Core metadata version written to `METADATA`.
pub const METADATA_VERSION: &str = "2.1";

const INSTALLER: &str = "pydesc";
const DIST_INFO_SUFFIX: &str = ".dist-info";

/// Escapes a project name for use in a dist-info directory name.
///
/// Runs of `-`, `_` and `.` collapse into one `_`, and the result is
/// lowercased.
///
/// # Examples
///
/// ```
/// use pydesc_python::install::escape_name;
///
/// assert_eq!(escape_name("test-python-project"), "test_python_project");
/// assert_eq!(escape_name("Zope.Interface"), "zope_interface");
/// ```
pub fn escape_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                escaped.push('_');
            }
            in_separator = true;
        } else {
            escaped.extend(c.to_lowercase());
            in_separator = false;
        }
    }
    escaped
}

/// Renders the `METADATA` file of a descriptor.
pub fn render_core_metadata(descriptor: &PackageDescriptor) -> String {
    let mut out = String::new();
    out.push_str(&format!("Metadata-Version: {}\n", METADATA_VERSION));
    out.push_str(&format!("Name: {}\n", descriptor.name));
    out.push_str(&format!("Version: {}\n", descriptor.version));
    if let Some(summary) = &descriptor.description {
        let summary = summary.split_whitespace().collect::<Vec<_>>().join(" ");
        out.push_str(&format!("Summary: {}\n", summary));
    }
    if let Some(requires) = &descriptor.python_requires {
        out.push_str(&format!("Requires-Python: {}\n", requires));
    }
    for dep in &descriptor.dependencies {
        out.push_str(&format!("Requires-Dist: {}\n", dep.raw));
    }
    out
}

/// Records `descriptor` as installed in `target`.
///
/// Any dist-info of the same project already in `target` is replaced.
/// Returns the path of the new dist-info directory.
///
/// # Errors
///
/// Returns an error if the target directory cannot be written.
pub fn record_install(
    target: &Path,
    descriptor: &PackageDescriptor,
    packages: &BTreeSet<String>,
) -> Result<PathBuf> {
    fs::create_dir_all(target)?;

    let normalized = descriptor.normalized_name();
    for (path, metadata) in scan_dist_info(target)? {
        if normalize_package_name(&metadata.name) == normalized {
            tracing::debug!("removing previous install {}", path.display());
            fs::remove_dir_all(&path)?;
        }
    }

    let dist_info = target.join(format!(
        "{}-{}{}",
        escape_name(&descriptor.name),
        descriptor.version,
        DIST_INFO_SUFFIX
    ));
    fs::create_dir_all(&dist_info)?;

    fs::write(dist_info.join("METADATA"), render_core_metadata(descriptor))?;

    let mut top_level = crate::discovery::top_level(packages)
        .into_iter()
        .collect::<Vec<_>>()
        .join("\n");
    if !top_level.is_empty() {
        top_level.push('\n');
    }
    fs::write(dist_info.join("top_level.txt"), top_level)?;
    fs::write(dist_info.join("INSTALLER"), format!("{}\n", INSTALLER))?;

    tracing::info!(
        "recorded {} {} in {}",
        descriptor.name,
        descriptor.version,
        target.display()
    );
    Ok(dist_info)
}

/// Version of project `name` installed in `target`, if any.
///
/// # Errors
///
/// Returns an error if `target` exists but cannot be read.
pub fn installed_version(target: &Path, name: &str) -> Result<Option<String>> {
    let installed = read_installed(target)?;
    Ok(installed
        .get_version(&normalize_package_name(name))
        .map(String::from))
}

/// Every project recorded in `target`, keyed by normalized name.
///
/// # Errors
///
/// Returns an error if `target` exists but cannot be read.
pub fn read_installed(target: &Path) -> Result<ResolvedPackages> {
    Ok(scan_dist_info(target)?
        .into_iter()
        .map(|(path, metadata)| ResolvedPackage {
            name: normalize_package_name(&metadata.name),
            version: Some(metadata.version),
            source: ResolvedSource::Local {
                path: path.display().to_string(),
            },
        })
        .collect())
}

#[derive(Debug)]
struct InstalledMetadata {
    name: String,
    version: String,
}

fn scan_dist_info(target: &Path) -> Result<Vec<(PathBuf, InstalledMetadata)>> {
    let entries = match fs::read_dir(target) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut found = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_dist_info = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(DIST_INFO_SUFFIX));
        if !is_dist_info || !path.is_dir() {
            continue;
        }

        let content = match fs::read_to_string(path.join("METADATA")) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("skipping {}: {}", path.display(), e);
                continue;
            }
        };

        match parse_metadata_headers(&content) {
            Some(metadata) => found.push((path, metadata)),
            None => tracing::warn!("skipping {}: METADATA lacks Name or Version", path.display()),
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

fn parse_metadata_headers(content: &str) -> Option<InstalledMetadata> {
    let mut name = None;
    let mut version = None;

    for line in content.lines() {
        // Headers end at the first blank line; the body is the long description
        if line.trim().is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            match key.trim() {
                "Name" => name = Some(value.trim().to_string()),
                "Version" => version = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    Some(InstalledMetadata {
        name: name?,
        version: version?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DescriptorParser;
    use tempfile::TempDir;

    const REFERENCE: &str = r#"from setuptools import setup, find_packages

setup(
    name="test-python-project",
    version="0.1.0",
    description="A test Python project for Claude Nights Watch",
    packages=find_packages(),
    install_requires=[
        "requests",
    ],
    python_requires=">=3.7",
)
"#;

    fn reference() -> PackageDescriptor {
        DescriptorParser::new().parse_setup_py(REFERENCE).unwrap()
    }

    fn packages(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_core_metadata() {
        insta::assert_snapshot!(render_core_metadata(&reference()), @r"
        Metadata-Version: 2.1
        Name: test-python-project
        Version: 0.1.0
        Summary: A test Python project for Claude Nights Watch
        Requires-Python: >=3.7
        Requires-Dist: requests
        ");
    }

    #[test]
    fn test_install_then_query_version() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("site-packages");

        let dist_info = record_install(&target, &reference(), &packages(&["app", "app.core"])).unwrap();

        assert_eq!(
            dist_info.file_name().unwrap(),
            "test_python_project-0.1.0.dist-info"
        );
        assert_eq!(
            installed_version(&target, "test-python-project").unwrap().as_deref(),
            Some("0.1.0")
        );
        assert_eq!(
            installed_version(&target, "Test_Python.Project").unwrap().as_deref(),
            Some("0.1.0")
        );
        assert_eq!(fs::read_to_string(dist_info.join("top_level.txt")).unwrap(), "app\n");
        assert_eq!(fs::read_to_string(dist_info.join("INSTALLER")).unwrap(), "pydesc\n");
    }

    #[test]
    fn test_reinstall_replaces_previous_version() {
        let dir = TempDir::new().unwrap();
        let mut descriptor = reference();
        record_install(dir.path(), &descriptor, &BTreeSet::new()).unwrap();

        descriptor.version = "0.2.0".into();
        record_install(dir.path(), &descriptor, &BTreeSet::new()).unwrap();

        assert_eq!(
            installed_version(dir.path(), "test-python-project").unwrap().as_deref(),
            Some("0.2.0")
        );
        assert_eq!(read_installed(dir.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_not_installed() {
        let dir = TempDir::new().unwrap();
        assert_eq!(installed_version(dir.path(), "requests").unwrap(), None);
        assert_eq!(
            installed_version(&dir.path().join("missing"), "requests").unwrap(),
            None
        );
    }

    #[test]
    fn test_read_installed_skips_broken_dist_info() {
        let dir = TempDir::new().unwrap();
        record_install(dir.path(), &reference(), &BTreeSet::new()).unwrap();
        fs::create_dir_all(dir.path().join("broken-1.0.dist-info")).unwrap();
        fs::write(dir.path().join("stray.dist-info"), "not a directory").unwrap();

        let installed = read_installed(dir.path()).unwrap();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed.get_version("test-python-project"), Some("0.1.0"));
        assert!(matches!(
            installed.get("test-python-project").unwrap().source,
            ResolvedSource::Local { .. }
        ));
    }

    #[test]
    fn test_metadata_headers_stop_at_body() {
        let content = "Metadata-Version: 2.1\nName: demo\nVersion: 1.0\n\nName: not-a-header\n";
        let metadata = parse_metadata_headers(content).unwrap();
        assert_eq!(metadata.name, "demo");
        assert_eq!(metadata.version, "1.0");
    }

    #[test]
    fn test_escape_name() {
        assert_eq!(escape_name("a--b__c..d"), "a_b_c_d");
    }
}
