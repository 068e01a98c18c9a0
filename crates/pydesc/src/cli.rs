//! Command line surface.
//!
//! Every command loads configuration, opens the project when it needs one,
//! and returns its report as text (or JSON with `--json`).

use crate::config::PydescConfig;
use crate::error::{Error, Result};
use clap::{Parser, Subcommand};
use pep440_rs::Version;
use pydesc_core::{HttpCache, ResolvedPackages, ResolvedSource};
use pydesc_python::interpreter::{detect_interpreter, parse_interpreter_version};
use pydesc_python::{PackageDescriptor, PackageSelection, Project, PypiIndex, installed_version};
use serde_json::json;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Inspect, check, resolve and record Python package descriptors
#[derive(Debug, Parser)]
#[command(name = "pydesc", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Project root holding setup.py or pyproject.toml
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Config file (default: <root>/pydesc.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Package index base URL
    #[arg(long, global = true, env = "PYDESC_INDEX_URL")]
    pub index_url: Option<String>,

    /// Interpreter used to detect the Python version
    #[arg(long, global = true, env = "PYDESC_PYTHON")]
    pub python: Option<String>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the project descriptor
    Show,
    /// List the packages that make up the distribution
    Discover,
    /// Check the interpreter against python_requires
    Check {
        /// Version to check instead of detecting the interpreter
        #[arg(long)]
        python_version: Option<String>,
    },
    /// Resolve declared dependencies against the index
    Resolve,
    /// Gate, discover, resolve and record the project into a site directory
    Install {
        /// Site directory receiving the dist-info record
        #[arg(long)]
        target: PathBuf,
        /// Version to check instead of detecting the interpreter
        #[arg(long)]
        python_version: Option<String>,
    },
    /// Print the installed version of a project
    Installed {
        name: String,
        /// Site directory to search
        #[arg(long)]
        target: PathBuf,
    },
}

/// Runs a parsed command line and returns what should be printed.
///
/// # Errors
///
/// Returns the first failure of the command; callers exit non-zero on it.
pub async fn run(cli: Cli) -> Result<String> {
    let config = PydescConfig::load(cli.config.as_deref(), &cli.root)?
        .with_overrides(cli.index_url.clone(), cli.python.clone());

    match &cli.command {
        Command::Show => {
            let project = Project::open(&cli.root)?;
            render_descriptor(project.descriptor(), cli.json)
        }
        Command::Discover => {
            let project = Project::open(&cli.root)?;
            render_packages(&project.discover()?, cli.json)
        }
        Command::Check { python_version } => {
            let project = Project::open(&cli.root)?;
            let interpreter = interpreter_version(python_version.as_deref(), &config).await?;
            project.check_interpreter(&interpreter)?;
            render_check(project.descriptor(), &interpreter, cli.json)
        }
        Command::Resolve => {
            let project = Project::open(&cli.root)?;
            let resolved = project.resolve(build_index(&config)).await?;
            render_resolved(&resolved, cli.json)
        }
        Command::Install {
            target,
            python_version,
        } => {
            let project = Project::open(&cli.root)?;
            let interpreter = interpreter_version(python_version.as_deref(), &config).await?;
            let report = project
                .install(target, &interpreter, build_index(&config))
                .await?;

            if cli.json {
                return Ok(serde_json::to_string_pretty(&report)?);
            }
            Ok(format!(
                "Installed {} {} into {}\n",
                report.name,
                report.version,
                report.dist_info.display()
            ))
        }
        Command::Installed { name, target } => {
            let version = installed_version(target, name)?.ok_or_else(|| Error::NotInstalled {
                name: name.clone(),
                target: target.clone(),
            })?;

            if cli.json {
                return Ok(serde_json::to_string_pretty(
                    &json!({ "name": name, "version": version }),
                )?);
            }
            Ok(format!("{}\n", version))
        }
    }
}

fn build_index(config: &PydescConfig) -> PypiIndex {
    let cache = Arc::new(HttpCache::with_options(config.cache_options()));
    PypiIndex::with_url(cache, config.index.url.clone())
}

async fn interpreter_version(explicit: Option<&str>, config: &PydescConfig) -> Result<Version> {
    match explicit {
        Some(version) => Ok(parse_interpreter_version(version)?),
        None => Ok(detect_interpreter(&config.interpreter.python).await?),
    }
}

fn render_descriptor(descriptor: &PackageDescriptor, as_json: bool) -> Result<String> {
    if as_json {
        return Ok(serde_json::to_string_pretty(descriptor)?);
    }

    let mut lines = vec![
        format!("name: {}", descriptor.name),
        format!("version: {}", descriptor.version),
    ];
    if let Some(description) = &descriptor.description {
        lines.push(format!("description: {}", description));
    }
    if let Some(requires) = &descriptor.python_requires {
        lines.push(format!("python_requires: {}", requires));
    }
    lines.push(format!("manifest: {}", descriptor.format));
    lines.push(match &descriptor.packages {
        PackageSelection::Discover(rule) => format!(
            "packages: discovered in {} (include: {}; exclude: {}{})",
            rule.root.display(),
            rule.include.join(", "),
            rule.exclude.join(", "),
            if rule.namespaces { "; namespaces" } else { "" }
        ),
        PackageSelection::Explicit { packages } => format!("packages: {}", packages.join(", ")),
    });
    lines.push("dependencies:".to_string());
    lines.extend(descriptor.dependencies.iter().map(|dep| format!("  {}", dep.raw)));

    Ok(lines.iter().map(|line| format!("{}\n", line)).collect())
}

fn render_packages(packages: &BTreeSet<String>, as_json: bool) -> Result<String> {
    if as_json {
        return Ok(serde_json::to_string_pretty(packages)?);
    }
    Ok(packages.iter().map(|p| format!("{}\n", p)).collect())
}

fn render_check(descriptor: &PackageDescriptor, interpreter: &Version, as_json: bool) -> Result<String> {
    if as_json {
        return Ok(serde_json::to_string_pretty(&json!({
            "interpreter": interpreter.to_string(),
            "requires_python": descriptor.python_requires,
            "compatible": true,
        }))?);
    }
    Ok(match &descriptor.python_requires {
        Some(requires) => format!("Python {} satisfies '{}'\n", interpreter, requires),
        None => format!("Python {} accepted (no python_requires)\n", interpreter),
    })
}

fn render_resolved(resolved: &ResolvedPackages, as_json: bool) -> Result<String> {
    if as_json {
        return Ok(serde_json::to_string_pretty(resolved)?);
    }

    Ok(resolved
        .iter()
        .map(|package| {
            let version = package.version.as_deref().unwrap_or("(unversioned)");
            match &package.source {
                ResolvedSource::Url { url } => format!("{} {} @ {}\n", package.name, version, url),
                ResolvedSource::Index { .. } | ResolvedSource::Local { .. } => {
                    format!("{} {}\n", package.name, version)
                }
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "pydesc",
            "check",
            "--python-version",
            "3.6",
            "--root",
            "/project",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.root, PathBuf::from("/project"));
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Command::Check { python_version: Some(ref v) } if v == "3.6"
        ));
    }

    #[test]
    fn test_install_requires_target() {
        assert!(Cli::try_parse_from(["pydesc", "install"]).is_err());
    }

    #[test]
    fn test_render_resolved() {
        let resolved: ResolvedPackages = [
            pydesc_core::ResolvedPackage {
                name: "requests".into(),
                version: Some("2.31.0".into()),
                source: ResolvedSource::Index {
                    url: "https://pypi.org/pypi".into(),
                },
            },
            pydesc_core::ResolvedPackage {
                name: "demo".into(),
                version: None,
                source: ResolvedSource::Url {
                    url: "git+https://example.com/demo.git".into(),
                },
            },
        ]
        .into_iter()
        .collect();

        assert_eq!(
            render_resolved(&resolved, false).unwrap(),
            "demo (unversioned) @ git+https://example.com/demo.git\nrequests 2.31.0\n"
        );
    }

    #[test]
    fn test_render_packages() {
        let packages: BTreeSet<String> = ["app", "app.core"].into_iter().map(String::from).collect();
        assert_eq!(render_packages(&packages, false).unwrap(), "app\napp.core\n");
        assert_eq!(
            serde_json::from_str::<Vec<String>>(&render_packages(&packages, true).unwrap()).unwrap(),
            vec!["app", "app.core"]
        );
    }
}
