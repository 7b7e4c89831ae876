//! The `add` operation: resolve a batch of requests into the lock file.

use crate::config::PacklockConfig;
use crate::resolver::{BatchReport, Handler, Resolver};
use packlock_core::{LockState, Result};
use std::path::Path;

/// Loads the lock at `lock_path`, resolves `inputs` into it and writes it
/// back once.
///
/// The lock is validated before any adapter is built, so an incomplete
/// resolution context fails without touching the network. The lock file is
/// written after every request has finished, including when some of them
/// failed.
///
/// # Errors
///
/// - `PacklockError::Config` - lock file missing, malformed or lacking context
/// - `PacklockError::Io` - the lock file cannot be written
pub async fn add_projects(
    config: &PacklockConfig,
    lock_path: &Path,
    inputs: &[String],
    handler: &dyn Handler,
) -> Result<BatchReport> {
    let mut lock = LockState::load(lock_path).await?;
    lock.validate_context()?;

    let platforms = config.platforms(lock.providers()?)?;
    let resolver = Resolver::with_cache(platforms, config.cache())
        .with_max_concurrent(config.http.max_concurrent_requests);

    let report = resolver.resolve(&mut lock, inputs, handler).await?;
    lock.persist().await?;
    Ok(report)
}
