//! In-memory platform and handler for resolver tests.

use crate::error::ResolveError;
use crate::resolver::{Candidate, Decision, Handler};
use async_trait::async_trait;
use packlock_core::{LockState, PacklockError, Platform, Project, ProjectFile, Provider, Result};
use std::collections::HashMap;
use std::sync::Mutex;

pub(crate) use packlock_core::model::fixtures::{file, project};

/// An empty lock targeting 1.20.1 / fabric.
pub(crate) fn lock(providers: &[Provider]) -> LockState {
    LockState::new(
        "packlock.json",
        vec!["1.20.1".to_string()],
        vec!["fabric".to_string()],
        providers.to_vec(),
    )
}

/// A provider backed by a fixed project list. Every call is logged.
pub(crate) struct FakePlatform {
    provider: Provider,
    projects: Vec<Project>,
    failing: bool,
    calls: Mutex<Vec<String>>,
}

impl FakePlatform {
    pub(crate) fn new(provider: Provider) -> Self {
        Self {
            provider,
            projects: Vec::new(),
            failing: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Serves `project`; its files are what `list_files` filters.
    pub(crate) fn with_project(mut self, project: Project) -> Self {
        self.projects.push(project);
        self
    }

    /// Every call fails with HTTP 500.
    pub(crate) fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of calls logged as `what`, e.g. `id:AAAAAAAA` or `files:AAAAAAAA`.
    pub(crate) fn calls_for(&self, what: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == what).count()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing {
            return Err(PacklockError::Status {
                url: format!("https://{}.invalid", self.provider),
                status: 500,
            });
        }
        Ok(())
    }

    fn bare(&self, project: &Project) -> Project {
        Project {
            files: Vec::new(),
            ..project.clone()
        }
    }

    fn all_files(&self) -> impl Iterator<Item = &ProjectFile> {
        self.projects.iter().flat_map(|p| p.files.iter())
    }
}

#[async_trait]
impl Platform for FakePlatform {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn lookup_by_id(&self, id: &str) -> Result<Option<Project>> {
        self.record(format!("id:{}", id))?;
        Ok(self
            .projects
            .iter()
            .find(|p| p.id_on(self.provider) == Some(id))
            .map(|p| self.bare(p)))
    }

    async fn lookup_by_slug(&self, slug: &str) -> Result<Option<Project>> {
        self.record(format!("slug:{}", slug))?;
        Ok(self
            .projects
            .iter()
            .find(|p| p.slug_on(self.provider) == Some(slug))
            .map(|p| self.bare(p)))
    }

    async fn lookup_many(&self, ids: &[String]) -> Result<Vec<Project>> {
        self.record(format!("many:{}", ids.join(",")))?;
        Ok(self
            .projects
            .iter()
            .filter(|p| ids.iter().any(|id| p.id_on(self.provider) == Some(id.as_str())))
            .map(|p| self.bare(p))
            .collect())
    }

    async fn list_files(
        &self,
        target_versions: &[String],
        target_loaders: &[String],
        project_id: &str,
        file_id: Option<&str>,
    ) -> Result<Vec<ProjectFile>> {
        self.record(format!("files:{}", project_id))?;
        Ok(self
            .all_files()
            .filter(|f| f.parent_id == project_id)
            .filter(|f| match file_id {
                Some(file_id) => f.id == file_id,
                None => f.is_compatible(target_versions, target_loaders),
            })
            .cloned()
            .collect())
    }

    async fn list_files_many(&self, file_ids: &[String]) -> Result<Vec<ProjectFile>> {
        self.record(format!("files_many:{}", file_ids.join(",")))?;
        Ok(self
            .all_files()
            .filter(|f| file_ids.contains(&f.id))
            .cloned()
            .collect())
    }
}

/// Accepts everything unless told otherwise and records what it was asked.
///
/// Every `on_success` yields once, so concurrent branches interleave the way
/// they do behind a real prompt.
pub(crate) struct ScriptedHandler {
    decisions: HashMap<String, Decision>,
    retry: bool,
    errors: Mutex<Vec<ResolveError>>,
    retries: Mutex<Vec<(Provider, Vec<Provider>)>>,
    offers: Mutex<Vec<String>>,
}

impl Default for ScriptedHandler {
    fn default() -> Self {
        Self {
            decisions: HashMap::new(),
            retry: true,
            errors: Mutex::new(Vec::new()),
            retries: Mutex::new(Vec::new()),
            offers: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedHandler {
    /// Answers `decision` for candidates whose slug is `slug`.
    pub(crate) fn with_decision(mut self, slug: &str, decision: Decision) -> Self {
        self.decisions.insert(slug.to_string(), decision);
        self
    }

    /// Gives up after the first miss instead of trying the next provider.
    pub(crate) fn without_retry(mut self) -> Self {
        self.retry = false;
        self
    }

    pub(crate) fn errors(&self) -> Vec<ResolveError> {
        self.errors.lock().unwrap().clone()
    }

    pub(crate) fn retries(&self) -> Vec<(Provider, Vec<Provider>)> {
        self.retries.lock().unwrap().clone()
    }

    /// Slugs of every candidate offered, in offer order.
    pub(crate) fn offers(&self) -> Vec<String> {
        self.offers.lock().unwrap().clone()
    }
}

#[async_trait]
impl Handler for ScriptedHandler {
    fn on_error(&self, _input: &str, error: &ResolveError) {
        self.errors.lock().unwrap().push(error.clone());
    }

    async fn on_retry(
        &self,
        _input: &str,
        previous: Provider,
        remaining: &[Provider],
    ) -> Option<Provider> {
        self.retries
            .lock()
            .unwrap()
            .push((previous, remaining.to_vec()));
        if self.retry { remaining.first().copied() } else { None }
    }

    async fn on_success(&self, candidate: &Candidate) -> Decision {
        let slug = candidate.project.display_slug().to_string();
        self.offers.lock().unwrap().push(slug);
        // Let other branches run while this one "waits for the user".
        tokio::task::yield_now().await;
        self.decisions
            .get(candidate.project.display_slug())
            .cloned()
            .unwrap_or(Decision::Accept)
    }
}
