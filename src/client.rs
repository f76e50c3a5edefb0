// src/client.rs

//! HTTP client for repository operations
//!
//! Wraps reqwest with a request timeout, basic-auth support and retry on
//! transport errors. Source adapters use it to fetch repository indexes
//! and remote metadata files.

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::warn;

use crate::error::{Error, Result};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed requests
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Join a path onto a base URL, normalizing the separating slash
pub fn url_join(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

/// Whether the URL uses the http or https scheme
pub fn scheme_is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// HTTP client wrapper with retry support
pub struct RepositoryClient {
    client: Client,
    max_retries: u32,
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::DownloadError(format!("error creating HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Fetch a URL and return the response body as text
    ///
    /// Transport errors are retried with backoff; HTTP error statuses are
    /// returned immediately.
    pub fn get_text(&self, url: &str, credentials: Option<(&str, &str)>) -> Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut request = self.client.get(url);
            if let Some((user, pass)) = credentials {
                request = request.basic_auth(user, Some(pass));
            }
            match request.send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "unexpected status code {} from {}",
                            response.status().as_u16(),
                            url
                        )));
                    }
                    return response
                        .text()
                        .map_err(|e| Error::DownloadError(format!("error reading response from {url}: {e}")));
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "request to {url} failed after {attempt} attempts: {e}"
                        )));
                    }
                    warn!("Request to {} failed (attempt {}): {}, retrying...", url, attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    /// Get a reference to the inner HTTP client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join_handles_slashes() {
        assert_eq!(url_join("https://repo.io/charts", "index.yaml"), "https://repo.io/charts/index.yaml");
        assert_eq!(url_join("https://repo.io/charts/", "index.yaml"), "https://repo.io/charts/index.yaml");
        assert_eq!(url_join("https://repo.io/charts/", "/index.yaml"), "https://repo.io/charts/index.yaml");
    }

    #[test]
    fn test_scheme_is_http() {
        assert!(scheme_is_http("https://repo.io/charts"));
        assert!(scheme_is_http("http://repo.io/charts"));
        assert!(!scheme_is_http("oci://registry.io/ns/repo"));
        assert!(!scheme_is_http("git@github.com:org/repo.git"));
    }
}
