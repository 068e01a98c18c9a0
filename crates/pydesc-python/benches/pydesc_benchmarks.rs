//! Benchmarks for manifest parsing, package discovery and version selection.
//!
//! Performance targets:
//! - Parsing a typical setup.py: < 1ms
//! - Parsing setup.py with 100+ requirements: < 10ms
//! - Discovery over a 200-package tree: < 20ms
//! - Version selection over 500 releases: < 1ms

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pep440_rs::VersionSpecifiers;
use pydesc_python::discovery::PackageFinder;
use pydesc_python::parser::DescriptorParser;
use pydesc_python::resolver::select_version;
use pydesc_python::types::{DiscoveryRule, IndexVersion};
use std::hint::black_box;
use std::str::FromStr;

const SMALL_SETUP_PY: &str = r#"from setuptools import setup, find_packages

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

const PEP621: &str = r#"
[build-system]
requires = ["setuptools>=61"]
build-backend = "setuptools.build_meta"

[project]
name = "medium-project"
version = "0.1.0"
description = "A medium sized project"
requires-python = ">=3.9"
dependencies = [
    "requests>=2.28.0",
    "flask[async]>=3.0.0",
    "pydantic>=2.0.0",
    "sqlalchemy>=2.0.0",
    "fastapi>=0.104.0",
    "uvicorn[standard]>=0.24.0",
    "httpx>=0.25.0",
    "redis>=5.0.0",
    "celery>=5.3.0",
    "numpy>=1.24; python_version>='3.9'"
]

[tool.setuptools.packages.find]
where = ["src"]
exclude = ["tests*"]
"#;

/// setup.py with many requirements and comments between them.
fn generate_large_setup_py() -> String {
    let mut content = String::from(
        "from setuptools import setup, find_packages\n\n# Generated\nsetup(\n    name=\"large-project\",\n    version=\"1.0.0\",\n    install_requires=[\n",
    );
    for i in 0..120 {
        content.push_str(&format!("        \"package-{}>={}.0,<{}.0\",  # dep {}\n", i, i % 10, i % 10 + 1, i));
    }
    content.push_str("    ],\n    packages=find_packages(exclude=[\"tests\", \"tests.*\"]),\n)\n");
    content
}

fn bench_parsing(c: &mut Criterion) {
    let parser = DescriptorParser::new();
    let mut group = c.benchmark_group("manifest_parsing");

    group.bench_function("setup_py_reference", |b| {
        b.iter(|| parser.parse_setup_py(black_box(SMALL_SETUP_PY)))
    });

    let large = generate_large_setup_py();
    group.bench_function("setup_py_120_deps", |b| {
        b.iter(|| parser.parse_setup_py(black_box(&large)))
    });

    group.bench_function("pyproject_pep621_10_deps", |b| {
        b.iter(|| parser.parse_pyproject(black_box(PEP621)))
    });

    group.finish();
}

fn bench_discovery(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().unwrap();
    for top in 0..20 {
        for sub in 0..10 {
            let path = dir.path().join(format!("pkg{}", top)).join(format!("sub{}", sub));
            std::fs::create_dir_all(&path).unwrap();
            std::fs::write(path.join("__init__.py"), "").unwrap();
            std::fs::write(path.join("module.py"), "").unwrap();
        }
        std::fs::write(dir.path().join(format!("pkg{}", top)).join("__init__.py"), "").unwrap();
    }

    let mut group = c.benchmark_group("discovery");

    let finder = PackageFinder::new(&DiscoveryRule::default()).unwrap();
    group.bench_function("find_packages_220", |b| {
        b.iter(|| finder.find(black_box(dir.path())))
    });

    let excluding = PackageFinder::new(&DiscoveryRule {
        exclude: vec!["*.sub1*".into(), "pkg1?".into()],
        ..DiscoveryRule::default()
    })
    .unwrap();
    group.bench_function("find_packages_with_exclude", |b| {
        b.iter(|| excluding.find(black_box(dir.path())))
    });

    group.finish();
}

fn bench_version_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("version_selection");

    for count in [10usize, 100, 500] {
        let versions: Vec<IndexVersion> = (0..count)
            .map(|i| IndexVersion {
                version: format!("{}.{}.{}", i / 100, (i / 10) % 10, i % 10),
                yanked: i % 17 == 0,
            })
            .collect();
        let specs = VersionSpecifiers::from_str(">=0.5,<3").unwrap();

        group.bench_with_input(BenchmarkId::new("constrained", count), &versions, |b, versions| {
            b.iter(|| select_version(black_box(versions), Some(&specs)))
        });
        group.bench_with_input(BenchmarkId::new("unconstrained", count), &versions, |b, versions| {
            b.iter(|| select_version(black_box(versions), None))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parsing, bench_discovery, bench_version_selection);
criterion_main!(benches);
