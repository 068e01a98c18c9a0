use crate::error::{DescError, Result};
use dashmap::DashMap;
use reqwest::{Client, StatusCode, header};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default upper bound on cached entries.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("pydesc/", env!("CARGO_PKG_VERSION"));

/// Tunables for [`HttpCache`].
///
/// `allow_insecure` permits plain `http://` URLs, which is needed for
/// private indexes on a local network and for mock servers in tests.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub timeout: Duration,
    pub max_entries: usize,
    pub allow_insecure: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_entries: DEFAULT_MAX_ENTRIES,
            allow_insecure: false,
        }
    }
}

/// Cached HTTP response with validation headers.
///
/// The body is wrapped in `Arc` so that repeated lookups of the same URL
/// share one buffer.
///
/// # Examples
///
/// ```
/// use pydesc_core::cache::CachedResponse;
/// use std::sync::Arc;
/// use std::time::Instant;
///
/// let response = CachedResponse {
///     body: Arc::new(b"response data".to_vec()),
///     etag: Some("\"abc123\"".into()),
///     last_modified: None,
///     fetched_at: Instant::now(),
/// };
///
/// let cloned = response.clone();
/// assert!(Arc::ptr_eq(&response.body, &cloned.body));
/// ```
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub body: Arc<Vec<u8>>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub fetched_at: Instant,
}

/// HTTP cache with ETag and Last-Modified validation.
///
/// Implements RFC 7232 conditional requests: once a URL is cached, later
/// lookups send `If-None-Match` / `If-Modified-Since` and reuse the stored
/// body on `304 Not Modified`.
///
/// # Examples
///
/// ```no_run
/// use pydesc_core::cache::HttpCache;
///
/// # async fn example() -> pydesc_core::error::Result<()> {
/// let cache = HttpCache::new();
///
/// let data1 = cache.get_cached("https://pypi.org/pypi/requests/json").await?;
/// let data2 = cache.get_cached("https://pypi.org/pypi/requests/json").await?;
///
/// assert!(std::sync::Arc::ptr_eq(&data1, &data2));
/// # Ok(())
/// # }
/// ```
pub struct HttpCache {
    entries: DashMap<String, CachedResponse>,
    client: Client,
    options: CacheOptions,
}

impl HttpCache {
    /// Creates a cache with default options (30 s timeout, HTTPS only).
    pub fn new() -> Self {
        Self::with_options(CacheOptions::default())
    }

    /// Creates a cache with the given options.
    pub fn with_options(options: CacheOptions) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("failed to build configured HTTP client, using defaults: {}", e);
                Client::new()
            });

        Self {
            entries: DashMap::new(),
            client,
            options,
        }
    }

    /// Returns the options this cache was built with.
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Retrieves data from URL, revalidating any cached copy.
    ///
    /// On a cache miss the body is fetched and stored. On a hit a conditional
    /// GET is sent; `304` returns the cached body, `200` replaces it. If the
    /// revalidation request itself fails, the stale cached body is returned.
    ///
    /// # Errors
    ///
    /// Returns `DescError::HttpStatus` for non-2xx answers to a fresh fetch,
    /// `DescError::RegistryError` for transport failures, and
    /// `DescError::InsecureUrl` for refused plain-HTTP URLs.
    pub async fn get_cached(&self, url: &str) -> Result<Arc<Vec<u8>>> {
        self.ensure_https(url)?;

        if self.entries.len() >= self.options.max_entries {
            self.evict_entries();
        }

        let cached = self.entries.get(url).map(|entry| entry.value().clone());
        if let Some(cached) = cached {
            match self.conditional_request(url, &cached).await {
                Ok(Some(new_body)) => return Ok(new_body),
                Ok(None) => return Ok(Arc::clone(&cached.body)),
                Err(e) => {
                    tracing::warn!("conditional request failed, using cache: {}", e);
                    return Ok(Arc::clone(&cached.body));
                }
            }
        }

        self.fetch_and_store(url).await
    }

    fn ensure_https(&self, url: &str) -> Result<()> {
        if !self.options.allow_insecure && !url.starts_with("https://") {
            return Err(DescError::InsecureUrl(url.to_string()));
        }
        Ok(())
    }

    /// Sends a conditional GET for a cached URL.
    ///
    /// Returns `Ok(None)` on `304 Not Modified`, `Ok(Some(body))` when the
    /// content changed.
    async fn conditional_request(
        &self,
        url: &str,
        cached: &CachedResponse,
    ) -> Result<Option<Arc<Vec<u8>>>> {
        let mut request = self.client.get(url);

        if let Some(etag) = &cached.etag {
            request = request.header(header::IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = &cached.last_modified {
            request = request.header(header::IF_MODIFIED_SINCE, last_modified);
        }

        let response = request.send().await.map_err(|e| DescError::RegistryError {
            url: url.to_string(),
            source: e,
        })?;

        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(DescError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        self.store(url, response).await.map(Some)
    }

    /// Fetches a fresh response and stores it, bypassing any cached copy.
    pub(crate) async fn fetch_and_store(&self, url: &str) -> Result<Arc<Vec<u8>>> {
        tracing::debug!("fetching fresh: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DescError::RegistryError {
                url: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(DescError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        self.store(url, response).await
    }

    async fn store(&self, url: &str, response: reqwest::Response) -> Result<Arc<Vec<u8>>> {
        let etag = header_string(&response, header::ETAG);
        let last_modified = header_string(&response, header::LAST_MODIFIED);

        let body = response
            .bytes()
            .await
            .map_err(|e| DescError::RegistryError {
                url: url.to_string(),
                source: e,
            })?;

        let body_arc = Arc::new(body.to_vec());

        self.entries.insert(
            url.to_string(),
            CachedResponse {
                body: Arc::clone(&body_arc),
                etag,
                last_modified,
                fetched_at: Instant::now(),
            },
        );

        Ok(body_arc)
    }

    /// Clears all cached entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache contains no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evicts the oldest ~10% of entries.
    fn evict_entries(&self) {
        let target_removals = (self.options.max_entries / 10).max(1);

        let mut by_age: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().fetched_at))
            .collect();
        by_age.sort_by_key(|(_, time)| *time);

        let mut removed = 0;
        for (url, _) in by_age.iter().take(target_removals) {
            self.entries.remove(url);
            removed += 1;
        }

        tracing::debug!("evicted {} cache entries", removed);
    }
}

impl Default for HttpCache {
    fn default() -> Self {
        Self::new()
    }
}

fn header_string(response: &reqwest::Response, name: header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}
