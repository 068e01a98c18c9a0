//! PEP 621 `[project]` reader for `pyproject.toml`.

use crate::error::{PythonError, Result};
use crate::types::{DiscoveryRule, ManifestFormat, PackageSelection};
use std::path::PathBuf;
use toml_edit::{DocumentMut, Item, TableLike};

use super::RawDescriptor;

const PYPROJECT: &str = "pyproject.toml";

/// Reads the descriptor fields out of `pyproject.toml` source.
///
/// Returns `Ok(None)` when the document has no `[project]` table, which is
/// the case for build-system-only files next to a `setup.py`.
pub(super) fn read_pyproject(content: &str) -> Result<Option<RawDescriptor>> {
    let doc = content
        .parse::<DocumentMut>()
        .map_err(|e| PythonError::TomlParseError { source: e })?;

    let Some(project) = doc.get("project").and_then(|i| i.as_table_like()) else {
        return Ok(None);
    };

    let dynamic = match project.get("dynamic") {
        Some(item) => string_array(item, "project.dynamic")?,
        None => Vec::new(),
    };

    let name = optional_string(project, "name")?
        .ok_or_else(|| PythonError::missing_field(PYPROJECT, "project.name"))?;

    let version = match optional_string(project, "version")? {
        Some(version) => version,
        None if dynamic.iter().any(|d| d == "version") => {
            return Err(PythonError::invalid_field(
                "project.version",
                "declared dynamic; only static versions can be read",
            ));
        }
        None => return Err(PythonError::missing_field(PYPROJECT, "project.version")),
    };

    let dependencies = match project.get("dependencies") {
        Some(item) => string_array(item, "project.dependencies")?,
        None => Vec::new(),
    };

    Ok(Some(RawDescriptor {
        name,
        version,
        description: optional_string(project, "description")?,
        packages: read_package_selection(&doc)?,
        dependencies,
        python_requires: optional_string(project, "requires-python")?,
        format: ManifestFormat::PyProject,
    }))
}

fn optional_string(table: &dyn TableLike, key: &str) -> Result<Option<String>> {
    match table.get(key) {
        None => Ok(None),
        Some(item) => item
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| PythonError::invalid_field(format!("project.{}", key), "expected a string")),
    }
}

fn string_array(item: &Item, field: &str) -> Result<Vec<String>> {
    let array = item
        .as_array()
        .ok_or_else(|| PythonError::invalid_field(field, "expected an array of strings"))?;

    array
        .iter()
        .map(|value| {
            value
                .as_str()
                .map(String::from)
                .ok_or_else(|| PythonError::invalid_field(field, "expected an array of strings"))
        })
        .collect()
}

/// `[tool.setuptools] packages`, as an explicit list or a `find` table.
fn read_package_selection(doc: &DocumentMut) -> Result<PackageSelection> {
    let packages = doc
        .get("tool")
        .and_then(|t| t.as_table_like())
        .and_then(|t| t.get("setuptools"))
        .and_then(|s| s.as_table_like())
        .and_then(|s| s.get("packages"));

    let Some(packages) = packages else {
        return Ok(PackageSelection::default());
    };

    if packages.is_array() {
        return Ok(PackageSelection::Explicit {
            packages: string_array(packages, "tool.setuptools.packages")?,
        });
    }

    let find = packages
        .as_table_like()
        .and_then(|p| p.get("find"))
        .and_then(|f| f.as_table_like())
        .ok_or_else(|| {
            PythonError::invalid_field(
                "tool.setuptools.packages",
                "expected an array or a [tool.setuptools.packages.find] table",
            )
        })?;

    // Namespace packages are on by default in pyproject-based configuration.
    let mut rule = DiscoveryRule {
        namespaces: true,
        ..DiscoveryRule::default()
    };

    if let Some(item) = find.get("where") {
        let mut roots = string_array(item, "tool.setuptools.packages.find.where")?;
        match roots.len() {
            0 => {}
            1 => rule.root = PathBuf::from(roots.remove(0)),
            _ => {
                return Err(PythonError::invalid_field(
                    "tool.setuptools.packages.find.where",
                    "only a single search directory is supported",
                ));
            }
        }
    }
    if let Some(item) = find.get("include") {
        rule.include = string_array(item, "tool.setuptools.packages.find.include")?;
    }
    if let Some(item) = find.get("exclude") {
        rule.exclude = string_array(item, "tool.setuptools.packages.find.exclude")?;
    }
    if let Some(item) = find.get("namespaces") {
        rule.namespaces = item.as_bool().ok_or_else(|| {
            PythonError::invalid_field("tool.setuptools.packages.find.namespaces", "expected a boolean")
        })?;
    }

    Ok(PackageSelection::Discover(rule))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pep621_project() {
        let content = r#"
[build-system]
requires = ["setuptools>=61"]
build-backend = "setuptools.build_meta"

[project]
name = "test-python-project"
version = "0.1.0"
description = "A test Python project"
requires-python = ">=3.7"
dependencies = ["requests"]
"#;

        let raw = read_pyproject(content).unwrap().unwrap();

        assert_eq!(raw.name, "test-python-project");
        assert_eq!(raw.version, "0.1.0");
        assert_eq!(raw.description.as_deref(), Some("A test Python project"));
        assert_eq!(raw.python_requires.as_deref(), Some(">=3.7"));
        assert_eq!(raw.dependencies, vec!["requests"]);
        assert_eq!(raw.packages, PackageSelection::default());
        assert_eq!(raw.format, ManifestFormat::PyProject);
    }

    #[test]
    fn test_build_system_only() {
        let content = r#"
[build-system]
requires = ["setuptools", "wheel"]
"#;
        assert!(read_pyproject(content).unwrap().is_none());
    }

    #[test]
    fn test_find_table() {
        let content = r#"
[project]
name = "demo"
version = "1.0"

[tool.setuptools.packages.find]
where = ["src"]
include = ["demo*"]
exclude = ["demo.tests*"]
namespaces = false
"#;

        let raw = read_pyproject(content).unwrap().unwrap();
        assert_eq!(
            raw.packages,
            PackageSelection::Discover(DiscoveryRule {
                root: PathBuf::from("src"),
                include: vec!["demo*".into()],
                exclude: vec!["demo.tests*".into()],
                namespaces: false,
            })
        );
    }

    #[test]
    fn test_find_table_defaults_to_namespaces() {
        let content = r#"
[project]
name = "demo"
version = "1.0"

[tool.setuptools.packages.find]
"#;

        let raw = read_pyproject(content).unwrap().unwrap();
        let PackageSelection::Discover(rule) = raw.packages else {
            panic!("expected discovery rule");
        };
        assert!(rule.namespaces);
        assert_eq!(rule.root, PathBuf::from("."));
    }

    #[test]
    fn test_explicit_packages() {
        let content = r#"
[project]
name = "demo"
version = "1.0"

[tool.setuptools]
packages = ["demo", "demo.core"]
"#;

        let raw = read_pyproject(content).unwrap().unwrap();
        assert_eq!(
            raw.packages,
            PackageSelection::Explicit {
                packages: vec!["demo".into(), "demo.core".into()]
            }
        );
    }

    #[test]
    fn test_dynamic_version_rejected() {
        let content = r#"
[project]
name = "demo"
dynamic = ["version"]
"#;

        let err = read_pyproject(content).unwrap_err();
        assert!(matches!(err, PythonError::InvalidField { field, .. } if field == "project.version"));
    }

    #[test]
    fn test_missing_name() {
        let content = r#"
[project]
version = "1.0"
"#;

        let err = read_pyproject(content).unwrap_err();
        assert!(matches!(err, PythonError::MissingField { field, .. } if field == "project.name"));
    }

    #[test]
    fn test_dependencies_must_be_strings() {
        let content = r#"
[project]
name = "demo"
version = "1.0"
dependencies = ["requests", 3]
"#;

        let err = read_pyproject(content).unwrap_err();
        assert!(matches!(err, PythonError::InvalidField { .. }));
    }

    #[test]
    fn test_malformed_toml() {
        let err = read_pyproject("[project\nname = ").unwrap_err();
        assert!(matches!(err, PythonError::TomlParseError { .. }));
    }
}
