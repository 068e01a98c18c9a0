//! Core abstractions for pydesc.
//!
//! This crate provides the ecosystem-neutral pieces used by the Python
//! descriptor crate and the command-line tool.
//!
//! # Architecture
//!
//! pydesc-core defines:
//! - **Traits**: `PackageIndex`, `VersionInfo`
//! - **HTTP Cache**: Shared caching layer with ETag/Last-Modified validation
//! - **Resolved records**: `ResolvedPackages` produced by resolution and install queries
//! - **Error Types**: `DescError` for transport, cache, and decoding failures

pub mod cache;
pub mod error;
pub mod registry;
pub mod resolved;

// Re-export commonly used types
pub use cache::{CacheOptions, CachedResponse, HttpCache};
pub use error::{DescError, Result};
pub use registry::{IndexLookup, PackageIndex, VersionInfo};
pub use resolved::{ResolvedPackage, ResolvedPackages, ResolvedSource};
