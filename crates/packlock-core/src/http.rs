//! Shared HTTP transport for provider adapters.
//!
//! One pooled [`reqwest::Client`] serves every adapter in a session, so the
//! connection pool is what bounds concurrent provider traffic. Canonical
//! results are memoized one level up, in [`crate::cache::QueryCache`].

use crate::error::{PacklockError, Result};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub use reqwest::header::HeaderMap;

const DEFAULT_USER_AGENT: &str = concat!("packlock/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_IDLE_PER_HOST: usize = 8;

/// Builder for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientBuilder {
    user_agent: String,
    timeout: Duration,
    max_idle_per_host: usize,
    allow_insecure: bool,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_idle_per_host: DEFAULT_MAX_IDLE_PER_HOST,
            allow_insecure: false,
        }
    }
}

impl HttpClientBuilder {
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_idle_per_host(mut self, max: usize) -> Self {
        self.max_idle_per_host = max;
        self
    }

    /// Permits plain `http://` URLs. Only meant for local mock servers.
    pub fn allow_insecure(mut self, allow: bool) -> Self {
        self.allow_insecure = allow;
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let client = Client::builder()
            .user_agent(self.user_agent)
            .timeout(self.timeout)
            .pool_max_idle_per_host(self.max_idle_per_host)
            .build()
            .map_err(|e| PacklockError::Http {
                url: String::new(),
                source: e,
            })?;

        Ok(HttpClient {
            inner: Arc::new(Inner {
                client,
                allow_insecure: self.allow_insecure,
            }),
        })
    }
}

struct Inner {
    client: Client,
    allow_insecure: bool,
}

/// Pooled HTTP client shared by all adapters.
///
/// Cloning is cheap; clones share the connection pool.
///
/// # Examples
///
/// ```no_run
/// use packlock_core::http::HttpClient;
///
/// # async fn example() -> packlock_core::error::Result<()> {
/// let http = HttpClient::builder().build()?;
/// let body = http.get("https://api.modrinth.com/v2/project/sodium", None).await?;
/// assert!(body.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Validates that a URL uses HTTPS, unless insecure URLs were allowed.
    fn ensure_https(&self, url: &str) -> Result<()> {
        if !self.inner.allow_insecure && !url.starts_with("https://") {
            return Err(PacklockError::InsecureUrl(url.to_string()));
        }
        Ok(())
    }

    /// Performs a `GET` request.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(body))` - 2xx response
    /// - `Ok(None)` - 404, the object does not exist on this provider
    /// - `Err(_)` - transport failure or any other status
    pub async fn get(&self, url: &str, headers: Option<&HeaderMap>) -> Result<Option<Vec<u8>>> {
        self.ensure_https(url)?;
        tracing::debug!("GET {}", url);

        let mut request = self.inner.client.get(url);
        if let Some(headers) = headers {
            request = request.headers(headers.clone());
        }

        let response = request.send().await.map_err(|e| PacklockError::Http {
            url: url.to_string(),
            source: e,
        })?;

        read_body(url, response).await
    }

    /// Performs a `POST` request with a JSON body. Same status mapping as [`HttpClient::get`].
    pub async fn post_json<B: Serialize + Sync>(
        &self,
        url: &str,
        body: &B,
        headers: Option<&HeaderMap>,
    ) -> Result<Option<Vec<u8>>> {
        self.ensure_https(url)?;
        tracing::debug!("POST {}", url);

        let mut request = self.inner.client.post(url).json(body);
        if let Some(headers) = headers {
            request = request.headers(headers.clone());
        }

        let response = request.send().await.map_err(|e| PacklockError::Http {
            url: url.to_string(),
            source: e,
        })?;

        read_body(url, response).await
    }
}

async fn read_body(url: &str, response: reqwest::Response) -> Result<Option<Vec<u8>>> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        tracing::debug!("404 for {}", url);
        return Ok(None);
    }
    if !status.is_success() {
        return Err(PacklockError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes().await.map_err(|e| PacklockError::Http {
        url: url.to_string(),
        source: e,
    })?;
    Ok(Some(body.to_vec()))
}

/// Builds a header map from static name/value pairs, skipping invalid values.
pub fn header_map<'a>(pairs: impl IntoIterator<Item = (&'static str, &'a str)>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                map.insert(HeaderName::from_static(name), value);
            }
            Err(_) => tracing::warn!("ignoring invalid value for header {}", name),
        }
    }
    map
}
