use crate::error::{Error, Result};
use pydesc_core::CacheOptions;
use pydesc_python::interpreter::DEFAULT_PYTHON;
use pydesc_python::registry::DEFAULT_INDEX_URL;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Config file looked up in the project root when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "pydesc.toml";

/// Root configuration for pydesc.
///
/// Read from `pydesc.toml` in the project root or from the file passed with
/// `--config`. All fields use sensible defaults if not specified; command
/// line flags and environment variables override them.
///
/// # Examples
///
/// ```
/// use pydesc::config::PydescConfig;
///
/// let toml = r#"
/// [index]
/// url = "https://mirror.example.com/pypi"
///
/// [interpreter]
/// python = "python3.11"
/// "#;
///
/// let config: PydescConfig = toml::from_str(toml).unwrap();
/// assert_eq!(config.index.url, "https://mirror.example.com/pypi");
/// assert_eq!(config.cache.max_entries, 1000);
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PydescConfig {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub interpreter: InterpreterConfig,
}

/// Package index settings.
///
/// # Defaults
///
/// - `url`: `"https://pypi.org/pypi"`
/// - `allow_insecure`: `false`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    #[serde(default = "default_index_url")]
    pub url: String,
    /// Permit plain `http://` index URLs
    #[serde(default)]
    pub allow_insecure: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: default_index_url(),
            allow_insecure: false,
        }
    }
}

/// HTTP cache settings.
///
/// # Defaults
///
/// - `timeout_secs`: `30`
/// - `max_entries`: `1000`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_entries: default_max_entries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterpreterConfig {
    /// Interpreter run for version detection
    #[serde(default = "default_python")]
    pub python: String,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
        }
    }
}

// Default value functions
fn default_index_url() -> String {
    DEFAULT_INDEX_URL.to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_entries() -> usize {
    pydesc_core::cache::DEFAULT_MAX_ENTRIES
}

fn default_python() -> String {
    DEFAULT_PYTHON.to_string()
}

impl PydescConfig {
    /// Loads configuration.
    ///
    /// An explicit `path` must exist. Without one, `root/pydesc.toml` is used
    /// when present, otherwise the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid config TOML.
    pub fn load(path: Option<&Path>, root: &Path) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = root.join(CONFIG_FILE_NAME);
                if !candidate.is_file() {
                    tracing::debug!("no {} in {}, using defaults", CONFIG_FILE_NAME, root.display());
                    return Ok(Self::default());
                }
                candidate
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|e| Error::ConfigRead {
            path: path.clone(),
            source: e,
        })?;
        let config = toml::from_str(&content).map_err(|e| Error::ConfigParse {
            path: path.clone(),
            source: e,
        })?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Applies command line and environment overrides.
    pub fn with_overrides(mut self, index_url: Option<String>, python: Option<String>) -> Self {
        if let Some(url) = index_url {
            self.index.url = url;
        }
        if let Some(python) = python {
            self.interpreter.python = python;
        }
        self
    }

    /// HTTP cache options derived from this configuration.
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            timeout: Duration::from_secs(self.cache.timeout_secs),
            max_entries: self.cache.max_entries,
            allow_insecure: self.index.allow_insecure,
        }
    }
}
