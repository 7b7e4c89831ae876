//! Session configuration loaded from an optional JSON file.

use packlock_core::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
use packlock_core::{HttpClient, PacklockError, Platform, Provider, QueryCache, Result};
use packlock_curseforge::CurseForgePlatform;
use packlock_modrinth::ModrinthPlatform;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable that overrides `curseforge.api_key`.
pub const CURSEFORGE_API_KEY_ENV: &str = "PACKLOCK_CURSEFORGE_API_KEY";

/// Session configuration.
///
/// Read from an optional JSON file. Every field has a default, so an empty
/// object (or no file at all) is a valid configuration. The resolution
/// context (providers, target versions, loaders) is not configured here: it
/// lives in the lock file.
///
/// # Examples
///
/// ```
/// use packlock::config::PacklockConfig;
///
/// let json = r#"{
///     "http": { "timeout_secs": 10 },
///     "curseforge": { "api_key": "secret" }
/// }"#;
///
/// let config: PacklockConfig = serde_json::from_str(json).unwrap();
/// assert_eq!(config.http.timeout_secs, 10);
/// assert_eq!(config.cache.ttl_secs, 300);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PacklockConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub modrinth: ModrinthConfig,
    #[serde(default)]
    pub curseforge: CurseForgeConfig,
}

/// Transport settings shared by every provider.
///
/// # Defaults
///
/// - `timeout_secs`: `30`
/// - `user_agent`: `packlock/<version>`
/// - `max_concurrent_requests`: `10`
/// - `allow_insecure`: `false`
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Bound on concurrently resolving requests and dependency branches.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Permits `http://` base URLs. Only meant for local mock servers.
    #[serde(default)]
    pub allow_insecure: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: None,
            max_concurrent_requests: default_max_concurrent(),
            allow_insecure: false,
        }
    }
}

/// Query cache settings.
///
/// # Defaults
///
/// - `ttl_secs`: `300` (5 minutes)
/// - `max_entries`: `1000`
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModrinthConfig {
    #[serde(default = "default_modrinth_url")]
    pub base_url: String,
}

impl Default for ModrinthConfig {
    fn default() -> Self {
        Self {
            base_url: default_modrinth_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurseForgeConfig {
    #[serde(default = "default_curseforge_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for CurseForgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_curseforge_url(),
            api_key: None,
        }
    }
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_concurrent() -> usize {
    crate::resolver::DEFAULT_MAX_CONCURRENT
}

const fn default_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

const fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

fn default_modrinth_url() -> String {
    packlock_modrinth::platform::API_BASE.to_string()
}

fn default_curseforge_url() -> String {
    packlock_curseforge::platform::API_BASE.to_string()
}

impl PacklockConfig {
    /// Loads the config file at `path`, or the defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// - `PacklockError::Config` - the file cannot be read or is not valid JSON
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        tracing::debug!("loading config: {}", path.display());

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            PacklockError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            PacklockError::config(format!("malformed config {}: {}", path.display(), e))
        })
    }

    /// Replaces the CurseForge key when `key` is set and non-empty.
    pub fn override_api_key(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.curseforge.api_key = Some(key);
        }
    }

    pub fn cache(&self) -> QueryCache {
        QueryCache::new(
            Duration::from_secs(self.cache.ttl_secs),
            self.cache.max_entries,
        )
    }

    pub fn http_client(&self) -> Result<HttpClient> {
        let mut builder = HttpClient::builder()
            .timeout(Duration::from_secs(self.http.timeout_secs))
            .allow_insecure(self.http.allow_insecure);
        if let Some(user_agent) = &self.http.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        builder.build()
    }

    /// Builds one adapter per provider, in the given order, sharing one
    /// HTTP client.
    pub fn platforms(&self, providers: &[Provider]) -> Result<Vec<Arc<dyn Platform>>> {
        let http = self.http_client()?;
        Ok(providers
            .iter()
            .map(|provider| -> Arc<dyn Platform> {
                match provider {
                    Provider::Modrinth => Arc::new(ModrinthPlatform::with_base_url(
                        http.clone(),
                        self.modrinth.base_url.clone(),
                    )),
                    Provider::CurseForge => Arc::new(CurseForgePlatform::with_base_url(
                        http.clone(),
                        self.curseforge.api_key.as_deref().unwrap_or_default(),
                        self.curseforge.base_url.clone(),
                    )),
                }
            })
            .collect())
    }
}
