use crate::error::{PacklockError, Result};
use crate::model::{Project, ProjectFile, Provider};
use crate::platform::Platform;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

/// Default lifetime of a cached lookup.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of cached lookups.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Which adapter operation produced a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Freeform,
    Id,
    Slug,
    Many,
    Files,
    FilesMany,
}

/// Cache key: (provider, lookup kind, key).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub provider: Provider,
    pub kind: LookupKind,
    pub key: String,
}

impl QueryKey {
    pub fn new(provider: Provider, kind: LookupKind, key: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            key: key.into(),
        }
    }
}

/// A canonical lookup result.
#[derive(Debug, Clone)]
pub enum Cached {
    Project(Option<Project>),
    Projects(Vec<Project>),
    Files(Vec<ProjectFile>),
}

type SharedResult = std::result::Result<Cached, Arc<PacklockError>>;

struct Slot {
    cell: Arc<OnceCell<SharedResult>>,
    created_at: Instant,
}

impl Slot {
    fn new() -> Self {
        Self {
            cell: Arc::new(OnceCell::new()),
            created_at: Instant::now(),
        }
    }

    /// In-flight slots never expire, so waiters always join the running fetch.
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cell.initialized() && self.created_at.elapsed() > ttl
    }
}

/// Session-scoped memo of provider lookups with request coalescing.
///
/// Concurrent callers asking for the same [`QueryKey`] while a fetch is in
/// flight wait on that fetch instead of issuing their own, so each key costs
/// at most one provider call per lifetime window. Failed fetches are shared
/// with the callers already waiting, then dropped so the next call goes back
/// to the provider.
///
/// `max_entries` is a soft bound. In-flight slots count toward it but are
/// never evicted, since evicting one would let a later caller start a second
/// fetch for the same key. A burst of concurrent misses can therefore hold
/// more than `max_entries` slots until those fetches complete; the next
/// insertion after that evicts completed entries again.
///
/// # Examples
///
/// ```
/// use packlock_core::cache::{Cached, LookupKind, QueryCache, QueryKey};
/// use packlock_core::model::Provider;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> packlock_core::error::Result<()> {
/// let cache = QueryCache::default();
/// let key = QueryKey::new(Provider::Modrinth, LookupKind::Slug, "sodium");
///
/// let first = cache.get_or_fetch(key.clone(), || async { Ok(Cached::Project(None)) }).await?;
/// assert!(matches!(first, Cached::Project(None)));
/// assert_eq!(cache.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct QueryCache {
    entries: DashMap<QueryKey, Slot>,
    ttl: Duration,
    max_entries: usize,
}

impl QueryCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Returns the cached value for `key`, or runs `fetch` to produce it.
    pub async fn get_or_fetch<F, Fut>(&self, key: QueryKey, fetch: F) -> Result<Cached>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Cached>>,
    {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.evict_entries();
        }

        let cell = {
            let mut slot = self.entries.entry(key.clone()).or_insert_with(Slot::new);
            if slot.is_expired(self.ttl) {
                tracing::trace!("cache entry expired: {:?}", key);
                *slot = Slot::new();
            }
            Arc::clone(&slot.cell)
        };

        let result = cell
            .get_or_init(|| async { fetch().await.map_err(Arc::new) })
            .await;

        match result {
            Ok(value) => Ok(value.clone()),
            Err(error) => {
                self.entries
                    .remove_if(&key, |_, slot| Arc::ptr_eq(&slot.cell, &cell));
                Err(PacklockError::Shared(Arc::clone(error)))
            }
        }
    }

    /// Clears all cached entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Returns the number of cached entries, including in-flight ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evicts the oldest ~10% of completed entries.
    fn evict_entries(&self) {
        let target_removals = (self.max_entries / 10).max(1);

        let mut candidates: Vec<(QueryKey, Instant)> = self
            .entries
            .iter()
            .filter(|entry| entry.value().cell.initialized())
            .map(|entry| (entry.key().clone(), entry.value().created_at))
            .collect();
        candidates.sort_by_key(|(_, created_at)| *created_at);

        let mut removed = 0;
        for (key, _) in candidates.into_iter().take(target_removals) {
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }

        tracing::debug!("evicted {} query cache entries", removed);
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }
}

/// A [`Platform`] whose lookups go through a shared [`QueryCache`].
///
/// Every lookup the resolver makes goes through this wrapper, so repeated and
/// concurrent requests within a session reach the provider at most once.
#[derive(Clone)]
pub struct CachedPlatform {
    platform: Arc<dyn Platform>,
    cache: Arc<QueryCache>,
}

impl CachedPlatform {
    pub fn new(platform: Arc<dyn Platform>, cache: Arc<QueryCache>) -> Self {
        Self { platform, cache }
    }

    pub fn provider(&self) -> Provider {
        self.platform.provider()
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    fn key(&self, kind: LookupKind, key: impl Into<String>) -> QueryKey {
        QueryKey::new(self.provider(), kind, key)
    }

    async fn project(&self, kind: LookupKind, input: &str) -> Result<Option<Project>> {
        let platform = &self.platform;
        let cached = self
            .cache
            .get_or_fetch(self.key(kind, input), || async move {
                let project = match kind {
                    LookupKind::Id => platform.lookup_by_id(input).await?,
                    LookupKind::Slug => platform.lookup_by_slug(input).await?,
                    _ => platform.lookup_by_freeform(input).await?,
                };
                Ok(Cached::Project(project))
            })
            .await?;

        match cached {
            Cached::Project(project) => Ok(project),
            _ => Ok(None),
        }
    }

    pub async fn lookup_by_freeform(&self, input: &str) -> Result<Option<Project>> {
        self.project(LookupKind::Freeform, input).await
    }

    pub async fn lookup_by_id(&self, id: &str) -> Result<Option<Project>> {
        self.project(LookupKind::Id, id).await
    }

    pub async fn lookup_by_slug(&self, slug: &str) -> Result<Option<Project>> {
        self.project(LookupKind::Slug, slug).await
    }

    pub async fn lookup_many(&self, ids: &[String]) -> Result<Vec<Project>> {
        let platform = &self.platform;
        let cached = self
            .cache
            .get_or_fetch(self.key(LookupKind::Many, ids.join(",")), || async move {
                Ok(Cached::Projects(platform.lookup_many(ids).await?))
            })
            .await?;

        match cached {
            Cached::Projects(projects) => Ok(projects),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn list_files(
        &self,
        target_versions: &[String],
        target_loaders: &[String],
        project_id: &str,
        file_id: Option<&str>,
    ) -> Result<Vec<ProjectFile>> {
        let key = format!(
            "{}|{}|{}|{}",
            project_id,
            file_id.unwrap_or_default(),
            target_versions.join(","),
            target_loaders.join(",")
        );
        let platform = &self.platform;
        let cached = self
            .cache
            .get_or_fetch(self.key(LookupKind::Files, key), || async move {
                let files = platform
                    .list_files(target_versions, target_loaders, project_id, file_id)
                    .await?;
                Ok(Cached::Files(files))
            })
            .await?;

        match cached {
            Cached::Files(files) => Ok(files),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn list_files_many(&self, file_ids: &[String]) -> Result<Vec<ProjectFile>> {
        let platform = &self.platform;
        let cached = self
            .cache
            .get_or_fetch(
                self.key(LookupKind::FilesMany, file_ids.join(",")),
                || async move { Ok(Cached::Files(platform.list_files_many(file_ids).await?)) },
            )
            .await?;

        match cached {
            Cached::Files(files) => Ok(files),
            _ => Ok(Vec::new()),
        }
    }

    /// Looks up `input` and attaches its compatible files on this provider.
    pub async fn lookup_with_files(
        &self,
        input: &str,
        target_versions: &[String],
        target_loaders: &[String],
    ) -> Result<Option<Project>> {
        let project = self.lookup_by_freeform(input).await?;
        self.with_files(project, target_versions, target_loaders)
            .await
    }

    /// Looks up a provider id and attaches its compatible files.
    pub async fn lookup_id_with_files(
        &self,
        id: &str,
        target_versions: &[String],
        target_loaders: &[String],
    ) -> Result<Option<Project>> {
        let project = self.lookup_by_id(id).await?;
        self.with_files(project, target_versions, target_loaders)
            .await
    }

    /// Looks up a slug and attaches its compatible files.
    pub async fn lookup_slug_with_files(
        &self,
        slug: &str,
        target_versions: &[String],
        target_loaders: &[String],
    ) -> Result<Option<Project>> {
        let project = self.lookup_by_slug(slug).await?;
        self.with_files(project, target_versions, target_loaders)
            .await
    }

    async fn with_files(
        &self,
        project: Option<Project>,
        target_versions: &[String],
        target_loaders: &[String],
    ) -> Result<Option<Project>> {
        let Some(mut project) = project else {
            return Ok(None);
        };
        if let Some(id) = project.id_on(self.provider()).map(str::to_owned) {
            let files = self
                .list_files(target_versions, target_loaders, &id, None)
                .await?;
            project.add_files(files);
        }
        Ok(Some(project))
    }
}
