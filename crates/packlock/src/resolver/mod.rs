//! Dependency resolution.
//!
//! A [`Resolver`] turns a batch of user requests into lock entries:
//!
//! 1. each request is tried on the providers in priority order, asking the
//!    [`Handler`] which provider to try next after a miss;
//! 2. a match is offered to the handler, which accepts or rejects it;
//! 3. accepted projects have their required dependencies expanded through a
//!    worklist, each dependency dispatched to the provider that declared it.
//!
//! Requests and dependency branches run concurrently. Lookups go through a
//! session-scoped [`QueryCache`], and every lock mutation is handed to a single
//! coordinator that owns the [`LockState`] for the duration of the batch.

mod handler;
mod outcome;
mod recommend;

pub use handler::{AutoAccept, Candidate, Decision, Handler};
pub use outcome::{DependencyReport, Miss, MissCause, Outcome, RequestReport};
pub use recommend::{ExactMatch, Recommender};

use crate::error::{ResolveError, SkipReason};
use dashmap::{DashMap, DashSet};
use futures::stream::{self, StreamExt};
use packlock_core::{
    CachedPlatform, LockState, PacklockError, Platform, Project, ProjectRef, Provider,
    QueryCache, Result,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Default bound on concurrently resolving requests and dependency branches.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Everything a batch did.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// One entry per request, in request order.
    pub requests: Vec<RequestReport>,
    /// Dependencies discovered while expanding accepted projects.
    pub dependencies: Vec<DependencyReport>,
    /// Lock ids of the projects this batch inserted.
    pub added: Vec<String>,
}

impl BatchReport {
    /// Every condition reported for requests and dependencies.
    pub fn failures(&self) -> impl Iterator<Item = &ResolveError> {
        self.requests
            .iter()
            .map(|r| &r.outcome)
            .chain(self.dependencies.iter().map(|d| &d.outcome))
            .filter_map(|outcome| match outcome {
                Outcome::Failed(error) => Some(error),
                _ => None,
            })
    }

    pub fn accepted(&self) -> usize {
        self.requests
            .iter()
            .map(|r| &r.outcome)
            .chain(self.dependencies.iter().map(|d| &d.outcome))
            .filter(|o| o.is_accepted())
            .count()
    }
}

/// Resolves requests against a fixed set of provider adapters.
///
/// One `Resolver` is one session: its query cache lives as long as it does
/// and is never shared with another resolver.
///
/// # Examples
///
/// ```no_run
/// use packlock::{AutoAccept, Resolver};
/// use packlock_core::{HttpClient, LockState};
/// use packlock_modrinth::ModrinthPlatform;
/// use std::sync::Arc;
///
/// # async fn run() -> packlock_core::Result<()> {
/// let http = HttpClient::builder().build()?;
/// let resolver = Resolver::new(vec![Arc::new(ModrinthPlatform::new(http))]);
///
/// let mut lock = LockState::load("packlock.json").await?;
/// let report = resolver
///     .resolve(&mut lock, &["sodium".to_string()], &AutoAccept)
///     .await?;
/// lock.persist().await?;
///
/// println!("added {} projects", report.added.len());
/// # Ok(())
/// # }
/// ```
pub struct Resolver {
    platforms: Vec<CachedPlatform>,
    recommender: Arc<dyn Recommender>,
    max_concurrent: usize,
}

impl Resolver {
    pub fn new(platforms: Vec<Arc<dyn Platform>>) -> Self {
        Self::with_cache(platforms, QueryCache::default())
    }

    pub fn with_cache(platforms: Vec<Arc<dyn Platform>>, cache: QueryCache) -> Self {
        let cache = Arc::new(cache);
        Self {
            platforms: platforms
                .into_iter()
                .map(|platform| CachedPlatform::new(platform, Arc::clone(&cache)))
                .collect(),
            recommender: Arc::new(ExactMatch),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    #[must_use]
    pub fn with_recommender(mut self, recommender: impl Recommender + 'static) -> Self {
        self.recommender = Arc::new(recommender);
        self
    }

    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    fn platform(&self, provider: Provider) -> Option<&CachedPlatform> {
        self.platforms.iter().find(|p| p.provider() == provider)
    }

    /// Resolves `inputs` and their dependency closure into `lock`.
    ///
    /// The lock is only mutated through accepted matches; it is not written
    /// to disk. Callers persist once the batch has returned.
    ///
    /// # Errors
    ///
    /// - `PacklockError::Config` - the lock has no providers, target versions
    ///   or loaders, or a listed provider has no adapter. Nothing is fetched.
    ///
    /// Per-request failures never abort the batch; they are reported through
    /// [`Handler::on_error`] and the returned [`BatchReport`].
    pub async fn resolve(
        &self,
        lock: &mut LockState,
        inputs: &[String],
        handler: &dyn Handler,
    ) -> Result<BatchReport> {
        lock.validate_context()?;
        let providers = lock.providers()?.to_vec();
        if let Some(missing) = providers.iter().find(|p| self.platform(**p).is_none()) {
            return Err(PacklockError::config(format!(
                "no adapter configured for provider '{}'",
                missing
            )));
        }

        let before: BTreeSet<String> = lock.projects().iter().map(|p| p.lock_id.clone()).collect();
        let known = lock.refs();
        let (updates, receiver) = mpsc::unbounded_channel();

        let session = Session {
            resolver: self,
            handler,
            updates,
            target_versions: lock.target_versions()?.to_vec(),
            target_loaders: lock.target_loaders()?.to_vec(),
            providers,
            visited: known.iter().cloned().collect(),
            accepted: known.into_iter().collect(),
            offers: DashMap::new(),
        };

        tracing::debug!("resolving {} requests", inputs.len());

        // The session owns the only sender; dropping it at the end of this
        // future is what lets the coordinator finish.
        let resolution = async move {
            let session = session;
            let session = &session;
            let mut results: Vec<_> = stream::iter(inputs.iter().enumerate())
                .map(|(index, input)| async move {
                    let (request, dependencies) = session.resolve_request(input).await;
                    (index, request, dependencies)
                })
                .buffer_unordered(self.max_concurrent)
                .collect()
                .await;
            results.sort_by_key(|(index, ..)| *index);
            results
        };

        let (results, touched) = tokio::join!(resolution, apply_updates(lock, receiver));

        let mut report = BatchReport::default();
        for (_, request, dependencies) in results {
            report.requests.push(request);
            report.dependencies.extend(dependencies);
        }
        report.added = touched
            .into_iter()
            .filter(|id| !before.contains(id) && lock.get_by_lock_id(id).is_some())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        tracing::debug!(
            "batch done: {} accepted, {} new lock entries",
            report.accepted(),
            report.added.len()
        );
        Ok(report)
    }
}

/// A lock mutation produced by a resolution branch.
enum LockUpdate {
    Add(Box<Project>),
    Link { parent: ProjectRef, child: ProjectRef },
}

/// Applies updates in arrival order until every sender is gone. Returns the
/// lock ids of the entries that received a project.
async fn apply_updates(
    lock: &mut LockState,
    mut updates: mpsc::UnboundedReceiver<LockUpdate>,
) -> Vec<String> {
    let mut touched = Vec::new();
    let mut links = Vec::new();

    while let Some(update) = updates.recv().await {
        match update {
            LockUpdate::Add(project) => {
                let lock_id = lock.add(*project);
                lock.link_dependants(&lock_id);
                touched.push(lock_id);
            }
            LockUpdate::Link { parent, child } => links.push((parent, child)),
        }
    }

    // A link can arrive before the dependency it names has been added.
    for (parent, child) in links {
        let parent = lock.get(&parent).map(|p| p.lock_id.clone());
        let child = lock.get(&child).map(|p| p.lock_id.clone());
        if let (Some(parent), Some(child)) = (parent, child) {
            lock.link_dependant(&parent, &child);
        }
    }

    touched
}

/// What offering a match to the handler produced.
enum Attempt {
    /// Committed; carries the dependencies it introduced.
    Accepted(ProjectRef, Vec<Pending>),
    Outcome(Outcome),
}

/// A dependency waiting to be resolved.
struct Pending {
    dependency: ProjectRef,
    required_by: ProjectRef,
}

/// State shared by every branch of one batch.
struct Session<'a> {
    resolver: &'a Resolver,
    handler: &'a dyn Handler,
    updates: mpsc::UnboundedSender<LockUpdate>,
    target_versions: Vec<String>,
    target_loaders: Vec<String>,
    providers: Vec<Provider>,
    /// Provider/id pairs in the lock or already queued in this batch.
    visited: DashSet<ProjectRef>,
    /// Provider/id pairs in the lock or accepted in this batch.
    accepted: DashSet<ProjectRef>,
    /// One offer at a time per project, so a request and a dependency branch
    /// that find the same project do not both ask the handler.
    offers: DashMap<ProjectRef, Arc<Mutex<()>>>,
}

impl Session<'_> {
    async fn resolve_request(&self, input: &str) -> (RequestReport, Vec<DependencyReport>) {
        let input = input.trim();
        let report = |outcome| RequestReport {
            input: input.to_string(),
            outcome,
        };

        let Some((&first, rest)) = self.providers.split_first() else {
            return (report(self.fail(input, &[])), Vec::new());
        };
        let mut provider = first;
        let mut remaining = rest.to_vec();
        let mut misses = Vec::new();

        let attempt = loop {
            match self.attempt(input, provider, &remaining).await {
                Attempt::Outcome(Outcome::Retry(miss)) => {
                    misses.push(miss);
                    let next = if remaining.is_empty() {
                        None
                    } else {
                        self.handler.on_retry(input, provider, &remaining).await
                    };
                    match next {
                        Some(next) if remaining.contains(&next) => {
                            remaining.retain(|p| *p != next);
                            provider = next;
                        }
                        Some(next) => {
                            tracing::warn!("{} was already tried for '{}'", next, input);
                            break Attempt::Outcome(self.fail(input, &misses));
                        }
                        None => break Attempt::Outcome(self.fail(input, &misses)),
                    }
                }
                other => break other,
            }
        };

        match attempt {
            Attempt::Accepted(reference, frontier) => {
                let dependencies = self.expand(frontier).await;
                (report(Outcome::Accepted(reference)), dependencies)
            }
            Attempt::Outcome(outcome) => (report(outcome), Vec::new()),
        }
    }

    fn fail(&self, input: &str, misses: &[Miss]) -> Outcome {
        let error = outcome::failure(input, misses);
        self.handler.on_error(input, &error);
        Outcome::Failed(error)
    }

    async fn attempt(&self, input: &str, provider: Provider, remaining: &[Provider]) -> Attempt {
        let miss = |cause| Attempt::Outcome(Outcome::Retry(Miss { provider, cause }));

        let Some(platform) = self.resolver.platform(provider) else {
            return miss(MissCause::Fault(format!("no adapter for {}", provider)));
        };
        let project = match platform
            .lookup_with_files(input, &self.target_versions, &self.target_loaders)
            .await
        {
            Ok(Some(project)) => project,
            Ok(None) => {
                tracing::debug!("'{}' not found on {}", input, provider);
                return miss(MissCause::NotFound);
            }
            Err(e) => {
                tracing::warn!("{} lookup for '{}' failed: {}", provider, input, e);
                return miss(MissCause::Fault(e.to_string()));
            }
        };

        if !project.has_files_on(provider) {
            tracing::debug!("'{}' has no compatible files on {}", input, provider);
            return miss(MissCause::NoFiles);
        }

        let recommended = self.resolver.recommender.is_recommended(input, provider, &project);
        self.offer(Candidate {
            project,
            provider,
            recommended,
            remaining: remaining.to_vec(),
            required_by: None,
        })
        .await
    }

    /// Offers a match to the handler and commits it if accepted.
    ///
    /// Offers of the same provider/id pair are serialized. A branch that
    /// waited on another offer sees its outcome: if that one was accepted,
    /// this one is skipped as already added.
    async fn offer(&self, candidate: Candidate) -> Attempt {
        let provider = candidate.provider;
        let key = ProjectRef::new(
            provider,
            candidate.project.id_on(provider).unwrap_or_default(),
        );
        let claim = Arc::clone(self.offers.entry(key).or_default().value());
        let _claim = claim.lock().await;

        if candidate.project.refs().any(|r| self.accepted.contains(&r)) {
            tracing::info!("{} is already added", candidate.project.display_slug());
            return Attempt::Outcome(Outcome::Skipped(SkipReason::AlreadyAdded));
        }

        match self.decide(candidate).await {
            Ok(project) => {
                let (reference, frontier) = self.commit(project, provider);
                Attempt::Accepted(reference, frontier)
            }
            Err(reason) => Attempt::Outcome(Outcome::Skipped(reason)),
        }
    }

    async fn decide(&self, candidate: Candidate) -> std::result::Result<Project, SkipReason> {
        match self.handler.on_success(&candidate).await {
            Decision::Accept => Ok(candidate.project),
            Decision::AcceptWithAlternates(alternates) => {
                let mut project = candidate.project;
                self.merge_alternates(
                    &mut project,
                    candidate.provider,
                    &alternates,
                    &candidate.remaining,
                )
                .await;
                Ok(project)
            }
            Decision::Reject if candidate.recommended => Err(SkipReason::Declined),
            Decision::Reject => Err(SkipReason::AmbiguousNoConfirmation),
        }
    }

    /// Fetches the same project by slug from each requested provider and
    /// merges every copy that has compatible files.
    async fn merge_alternates(
        &self,
        project: &mut Project,
        from: Provider,
        alternates: &[Provider],
        remaining: &[Provider],
    ) {
        let Some(slug) = project.slug_on(from).map(str::to_owned) else {
            return;
        };

        for &alternate in alternates {
            if alternate == from || !remaining.contains(&alternate) {
                tracing::debug!("ignoring alternate provider {} for {}", alternate, slug);
                continue;
            }
            let Some(platform) = self.resolver.platform(alternate) else {
                continue;
            };
            match platform
                .lookup_slug_with_files(&slug, &self.target_versions, &self.target_loaders)
                .await
            {
                Ok(Some(copy)) if copy.has_files_on(alternate) => {
                    tracing::debug!("merging {} copy of {}", alternate, slug);
                    project.merge(copy);
                }
                Ok(Some(_)) => tracing::debug!("{} has no compatible files on {}", slug, alternate),
                Ok(None) => tracing::debug!("{} not found on {}", slug, alternate),
                Err(e) => tracing::warn!("{} lookup for '{}' failed: {}", alternate, slug, e),
            }
        }
    }

    /// Hands an accepted project to the coordinator and returns the
    /// dependencies it introduces to this batch.
    fn commit(&self, project: Project, provider: Provider) -> (ProjectRef, Vec<Pending>) {
        let reference = ProjectRef::new(provider, project.id_on(provider).unwrap_or_default());
        for r in project.refs() {
            self.accepted.insert(r.clone());
            self.visited.insert(r);
        }

        let mut frontier = Vec::new();
        for dependency in project.required_dependencies() {
            if project.has_ref(&dependency) {
                continue;
            }
            self.send(LockUpdate::Link {
                parent: reference.clone(),
                child: dependency.clone(),
            });
            if self.visited.insert(dependency.clone()) {
                frontier.push(Pending {
                    dependency,
                    required_by: reference.clone(),
                });
            }
        }

        tracing::info!("{} added from {}", project.display_slug(), provider);
        self.send(LockUpdate::Add(Box::new(project)));
        (reference, frontier)
    }

    fn send(&self, update: LockUpdate) {
        if self.updates.send(update).is_err() {
            tracing::error!("lock coordinator stopped before the batch finished");
        }
    }

    /// Resolves dependencies level by level until no new ones appear.
    async fn expand(&self, mut frontier: Vec<Pending>) -> Vec<DependencyReport> {
        let mut reports = Vec::new();
        while !frontier.is_empty() {
            let results: Vec<_> = stream::iter(std::mem::take(&mut frontier))
                .map(|pending| self.resolve_dependency(pending))
                .buffer_unordered(self.resolver.max_concurrent)
                .collect()
                .await;
            for (report, next) in results {
                reports.push(report);
                frontier.extend(next);
            }
        }
        reports
    }

    async fn resolve_dependency(&self, pending: Pending) -> (DependencyReport, Vec<Pending>) {
        let Pending {
            dependency,
            required_by,
        } = pending;
        let provider = dependency.provider;
        let input = dependency.to_string();

        let cause = match self.resolver.platform(provider) {
            None => MissCause::Fault(format!("no adapter for {}", provider)),
            Some(platform) => match platform
                .lookup_id_with_files(&dependency.id, &self.target_versions, &self.target_loaders)
                .await
            {
                Err(e) => {
                    tracing::warn!("{} lookup for dependency {} failed: {}", provider, input, e);
                    MissCause::Fault(e.to_string())
                }
                Ok(None) => MissCause::NotFound,
                Ok(Some(project)) if !project.has_files_on(provider) => MissCause::NoFiles,
                Ok(Some(project)) => {
                    let (outcome, next) = self.offer_dependency(project, provider, &required_by).await;
                    let report = DependencyReport {
                        dependency,
                        required_by,
                        outcome,
                    };
                    return (report, next);
                }
            },
        };

        let outcome = self.fail(&input, &[Miss { provider, cause }]);
        let report = DependencyReport {
            dependency,
            required_by,
            outcome,
        };
        (report, Vec::new())
    }

    async fn offer_dependency(
        &self,
        project: Project,
        provider: Provider,
        required_by: &ProjectRef,
    ) -> (Outcome, Vec<Pending>) {
        let id = project.id_on(provider).unwrap_or_default().to_string();
        let recommended = self.resolver.recommender.is_recommended(&id, provider, &project);
        let remaining = self
            .providers
            .iter()
            .copied()
            .filter(|p| *p != provider)
            .collect();
        let candidate = Candidate {
            project,
            provider,
            recommended,
            remaining,
            required_by: Some(required_by.clone()),
        };

        match self.offer(candidate).await {
            Attempt::Accepted(reference, next) => (Outcome::Accepted(reference), next),
            Attempt::Outcome(outcome) => (outcome, Vec::new()),
        }
    }
}
