use thiserror::Error;

/// Core error types for pydesc.
///
/// These cover the ecosystem-neutral plumbing: HTTP fetches through the
/// response cache and index lookups. Ecosystem crates wrap them in their own
/// error enums.
///
/// # Examples
///
/// ```
/// use pydesc_core::error::{DescError, Result};
///
/// fn check_status(url: &str, status: u16) -> Result<()> {
///     if status >= 400 {
///         return Err(DescError::HttpStatus {
///             url: url.into(),
///             status,
///         });
///     }
///     Ok(())
/// }
///
/// assert!(check_status("https://pypi.org/pypi/nope/json", 404).unwrap_err().is_not_found());
/// ```
#[derive(Error, Debug)]
pub enum DescError {
    #[error("request failed for {url}: {source}")]
    RegistryError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("index lookup failed for {package}: {source}")]
    IndexError {
        package: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("refusing non-HTTPS URL: {0}")]
    InsecureUrl(String),
}

impl DescError {
    /// Returns `true` if the server answered with 404 Not Found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HttpStatus { status: 404, .. })
    }
}

/// Convenience type alias for `Result<T, DescError>`.
pub type Result<T> = std::result::Result<T, DescError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status() {
        let error = DescError::HttpStatus {
            url: "https://pypi.org/pypi/nope/json".into(),
            status: 404,
        };
        assert_eq!(
            error.to_string(),
            "HTTP 404 for https://pypi.org/pypi/nope/json"
        );
        assert!(error.is_not_found());
    }

    #[test]
    fn test_server_error_is_not_not_found() {
        let error = DescError::HttpStatus {
            url: "https://pypi.org/pypi/requests/json".into(),
            status: 503,
        };
        assert!(!error.is_not_found());
    }

    #[test]
    fn test_insecure_url() {
        let error = DescError::InsecureUrl("http://example.com".into());
        assert_eq!(error.to_string(), "refusing non-HTTPS URL: http://example.com");
        assert!(!error.is_not_found());
    }

    #[test]
    fn test_index_error_keeps_source() {
        use std::error::Error as _;

        let inner = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad json");
        let error = DescError::IndexError {
            package: "requests".into(),
            source: Box::new(inner),
        };
        assert_eq!(error.to_string(), "index lookup failed for requests: bad json");
        assert_eq!(error.source().unwrap().to_string(), "bad json");
    }
}
