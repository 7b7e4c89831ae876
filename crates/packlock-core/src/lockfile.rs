//! Lock state: the resolved project set plus the resolution context.
//!
//! The lock file is JSON:
//!
//! ```json
//! {
//!   "targetVersions": ["1.20.1"],
//!   "targetLoaders": ["fabric"],
//!   "providerPriority": ["modrinth", "curseforge"],
//!   "projects": [
//!     {
//!       "lockId": "modrinth:AANobbMI",
//!       "type": "mod",
//!       "name": { "modrinth": "Sodium" },
//!       "slug": { "modrinth": "sodium" },
//!       "id": { "modrinth": "AANobbMI" },
//!       "files": []
//!     }
//!   ],
//!   "requiredBy": { "modrinth:P7dR8mSH": ["modrinth:AANobbMI"] }
//! }
//! ```
//!
//! It is read once per command, mutated in memory, and written back once per
//! completed resolution batch.

use crate::error::{PacklockError, Result};
use crate::model::{Project, ProjectRef, Provider};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Default lock file name.
pub const LOCK_FILE_NAME: &str = "packlock.json";

/// On-disk shape. Context fields are optional here so that a missing field
/// is reported as a configuration error instead of a parse error.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LockFile {
    target_versions: Option<Vec<String>>,
    target_loaders: Option<Vec<String>>,
    provider_priority: Option<Vec<Provider>>,
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    required_by: BTreeMap<String, BTreeSet<String>>,
}

/// Mutable, persisted record of all resolved projects.
///
/// No two stored projects share a provider/id pair: [`LockState::add`]
/// merges instead of duplicating.
///
/// # Examples
///
/// ```
/// use packlock_core::lockfile::LockState;
/// use packlock_core::model::{Project, ProjectType, Provider};
///
/// let mut lock = LockState::new(
///     "packlock.json",
///     vec!["1.20.1".into()],
///     vec!["fabric".into()],
///     vec![Provider::Modrinth],
/// );
///
/// let sodium = Project::new(Provider::Modrinth, ProjectType::Mod, "AANobbMI", "sodium", "Sodium");
/// lock.add(sodium.clone());
/// lock.add(sodium);
///
/// assert_eq!(lock.len(), 1);
/// assert_eq!(lock.provider().unwrap(), Provider::Modrinth);
/// ```
#[derive(Debug, Clone)]
pub struct LockState {
    path: PathBuf,
    target_versions: Vec<String>,
    target_loaders: Vec<String>,
    provider_priority: Vec<Provider>,
    projects: Vec<Project>,
    /// child lock id -> lock ids of the projects that require it
    required_by: BTreeMap<String, BTreeSet<String>>,
}

impl LockState {
    /// Creates an empty lock state with the given context.
    pub fn new(
        path: impl Into<PathBuf>,
        target_versions: Vec<String>,
        target_loaders: Vec<String>,
        provider_priority: Vec<Provider>,
    ) -> Self {
        Self {
            path: path.into(),
            target_versions,
            target_loaders,
            provider_priority,
            projects: Vec::new(),
            required_by: BTreeMap::new(),
        }
    }

    /// Reads and validates the lock file at `path`.
    ///
    /// # Errors
    ///
    /// - `PacklockError::Config` - file missing, malformed, or lacking any of
    ///   `providerPriority`, `targetVersions`, `targetLoaders`
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("loading lock file: {}", path.display());

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            PacklockError::config(format!("cannot read {}: {}", path.display(), e))
        })?;

        Self::from_json(path, &content)
    }

    /// Parses lock file content. See [`LockState::load`].
    pub fn from_json(path: impl Into<PathBuf>, content: &str) -> Result<Self> {
        let path = path.into();
        let file: LockFile = serde_json::from_str(content).map_err(|e| {
            PacklockError::config(format!("malformed lock file {}: {}", path.display(), e))
        })?;

        let missing = |field: &str| {
            PacklockError::config(format!("{} is missing '{}'", path.display(), field))
        };
        let target_versions = file.target_versions.ok_or_else(|| missing("targetVersions"))?;
        let target_loaders = file.target_loaders.ok_or_else(|| missing("targetLoaders"))?;
        let provider_priority = file
            .provider_priority
            .ok_or_else(|| missing("providerPriority"))?;

        let mut lock = Self {
            path,
            target_versions,
            target_loaders,
            provider_priority,
            projects: Vec::new(),
            required_by: file.required_by,
        };
        for project in file.projects {
            lock.add(project);
        }

        tracing::debug!("loaded {} projects", lock.projects.len());
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Providers to try, in priority order.
    pub fn providers(&self) -> Result<&[Provider]> {
        if self.provider_priority.is_empty() {
            return Err(PacklockError::config("no providers configured"));
        }
        Ok(&self.provider_priority)
    }

    /// The default provider: first in priority order.
    pub fn provider(&self) -> Result<Provider> {
        self.providers().map(|p| p[0])
    }

    pub fn target_versions(&self) -> Result<&[String]> {
        if self.target_versions.is_empty() {
            return Err(PacklockError::config("no target versions configured"));
        }
        Ok(&self.target_versions)
    }

    pub fn target_loaders(&self) -> Result<&[String]> {
        if self.target_loaders.is_empty() {
            return Err(PacklockError::config("no target loaders configured"));
        }
        Ok(&self.target_loaders)
    }

    /// Validates the whole resolution context at once.
    pub fn validate_context(&self) -> Result<()> {
        self.providers()?;
        self.target_versions()?;
        self.target_loaders()?;
        Ok(())
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Finds the project known under `reference`.
    pub fn get(&self, reference: &ProjectRef) -> Option<&Project> {
        self.projects.iter().find(|p| p.has_ref(reference))
    }

    pub fn get_by_lock_id(&self, lock_id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.lock_id == lock_id)
    }

    /// Whether a project sharing any provider/id pair with `project` is stored.
    pub fn is_added(&self, project: &Project) -> bool {
        self.projects.iter().any(|p| p.shares_identity(project))
    }

    /// Every provider/id pair currently stored.
    pub fn refs(&self) -> BTreeSet<ProjectRef> {
        self.projects.iter().flat_map(Project::refs).collect()
    }

    /// Inserts `project`, merging it with every stored project that shares a
    /// provider/id pair. Returns the lock id of the stored entry.
    ///
    /// Adding a project that is already fully present changes nothing.
    pub fn add(&mut self, mut project: Project) -> String {
        let matching: Vec<usize> = self
            .projects
            .iter()
            .enumerate()
            .filter(|(_, p)| p.shares_identity(&project))
            .map(|(i, _)| i)
            .collect();

        let Some((&first, rest)) = matching.split_first() else {
            if project.lock_id.is_empty() {
                let lock_id = project.refs().next().map(|r| r.to_string());
                project.lock_id = lock_id.unwrap_or_default();
            }
            tracing::debug!("adding {} to lock", project.lock_id);
            let lock_id = project.lock_id.clone();
            self.projects.push(project);
            return lock_id;
        };

        // Remove from the back so earlier indices stay valid.
        let mut absorbed = Vec::with_capacity(rest.len());
        for &index in rest.iter().rev() {
            absorbed.push(self.projects.remove(index));
        }

        let base_id = self.projects[first].lock_id.clone();
        for other in absorbed {
            self.rename_links(&other.lock_id, &base_id);
            self.projects[first].merge(other);
        }
        project.lock_id.clear();
        self.projects[first].merge(project);
        base_id
    }

    fn rename_links(&mut self, from: &str, to: &str) {
        if from.is_empty() || from == to {
            return;
        }
        if let Some(parents) = self.required_by.remove(from) {
            self.required_by
                .entry(to.to_string())
                .or_default()
                .extend(parents);
        }
        for parents in self.required_by.values_mut() {
            if parents.remove(from) {
                parents.insert(to.to_string());
            }
        }
        if let Some(parents) = self.required_by.get_mut(to) {
            parents.remove(to);
        }
    }

    /// Records that `parent` requires `child`. Returns `true` if the link is new.
    pub fn link_dependant(&mut self, parent: &str, child: &str) -> bool {
        if parent == child || parent.is_empty() || child.is_empty() {
            return false;
        }
        self.required_by
            .entry(child.to_string())
            .or_default()
            .insert(parent.to_string())
    }

    /// Links the stored project `lock_id` with every stored project that
    /// requires it, and with every stored project it requires.
    pub fn link_dependants(&mut self, lock_id: &str) -> usize {
        let Some(project) = self.get_by_lock_id(lock_id) else {
            return 0;
        };
        let own_refs: BTreeSet<ProjectRef> = project.refs().collect();
        let own_deps = project.required_dependencies();

        let mut links = Vec::new();
        for other in &self.projects {
            if other.lock_id == lock_id {
                continue;
            }
            if other
                .required_dependencies()
                .iter()
                .any(|dep| own_refs.contains(dep))
            {
                links.push((other.lock_id.clone(), lock_id.to_string()));
            }
            if own_deps.iter().any(|dep| other.has_ref(dep)) {
                links.push((lock_id.to_string(), other.lock_id.clone()));
            }
        }

        links
            .into_iter()
            .filter(|(parent, child)| self.link_dependant(parent, child))
            .count()
    }

    /// Lock ids of the projects that require `lock_id`.
    pub fn required_by(&self, lock_id: &str) -> impl Iterator<Item = &str> {
        self.required_by
            .get(lock_id)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Lock ids of the projects `lock_id` requires.
    pub fn requires(&self, lock_id: &str) -> Vec<&str> {
        self.required_by
            .iter()
            .filter(|(_, parents)| parents.contains(lock_id))
            .map(|(child, _)| child.as_str())
            .collect()
    }

    fn to_file(&self) -> LockFile {
        let mut projects = self.projects.clone();
        projects.sort_by(|a, b| a.lock_id.cmp(&b.lock_id));

        LockFile {
            target_versions: Some(self.target_versions.clone()),
            target_loaders: Some(self.target_loaders.clone()),
            provider_priority: Some(self.provider_priority.clone()),
            projects,
            required_by: self.required_by.clone(),
        }
    }

    /// Serializes the current state.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_file())?)
    }

    /// Writes the full state in one atomic replace of the lock file.
    pub async fn persist(&self) -> Result<()> {
        let json = self.to_json()?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        tokio::fs::write(&tmp_path, json.as_bytes()).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;

        tracing::info!(
            "wrote {} projects to {}",
            self.projects.len(),
            self.path.display()
        );
        Ok(())
    }
}
