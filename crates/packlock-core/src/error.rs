use crate::model::Provider;
use std::sync::Arc;
use thiserror::Error;

/// Core error types for packlock.
///
/// Provider adapters, the HTTP transport and the lock state all report
/// failures through this enum. Adapter faults are recoverable per call: the
/// resolver downgrades them to "no match" for retry purposes. Configuration
/// and lock-file I/O faults are fatal for a whole command.
///
/// # Examples
///
/// ```
/// use packlock_core::error::{PacklockError, Result};
///
/// fn require_versions(versions: &[String]) -> Result<()> {
///     if versions.is_empty() {
///         return Err(PacklockError::Config("no target versions".into()));
///     }
///     Ok(())
/// }
///
/// assert!(require_versions(&[]).is_err());
/// ```
#[derive(Error, Debug)]
pub enum PacklockError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("URL must use HTTPS: {0}")]
    InsecureUrl(String),

    #[error("{provider} project '{project}' has unrecognized category '{category}'")]
    UnrecognizedCategory {
        provider: Provider,
        project: String,
        category: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A fault observed by a coalesced request; every waiter shares it.
    #[error("{0}")]
    Shared(Arc<PacklockError>),
}

impl PacklockError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Convenience type alias for `Result<T, PacklockError>`.
pub type Result<T> = std::result::Result<T, PacklockError>;
