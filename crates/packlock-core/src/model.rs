//! Canonical entity model shared by every provider adapter.
//!
//! Each content host answers with its own payload shape; adapters normalize
//! those payloads into [`Project`] and [`ProjectFile`] so the resolver and the
//! lock state never see provider-specific types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// A content-hosting service.
///
/// The provider set is closed: adding a host means adding a variant and an
/// adapter crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Modrinth,
    CurseForge,
}

impl Provider {
    pub const ALL: [Self; 2] = [Self::Modrinth, Self::CurseForge];

    /// Serialized identifier used in lock files and config.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Modrinth => "modrinth",
            Self::CurseForge => "curseforge",
        }
    }

    /// Human-readable name.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Modrinth => "Modrinth",
            Self::CurseForge => "CurseForge",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "modrinth" => Ok(Self::Modrinth),
            "curseforge" => Ok(Self::CurseForge),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// Supported project categories.
///
/// Provider categories outside this set (plugins, data packs, modpacks) are
/// rejected during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    Mod,
    ResourcePack,
    Shader,
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mod => "mod",
            Self::ResourcePack => "resource pack",
            Self::Shader => "shader",
        })
    }
}

/// Release channel of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    #[default]
    Release,
    Beta,
    Alpha,
}

impl ReleaseType {
    /// Normalizes a provider-reported channel.
    ///
    /// Missing, blank and literal `"null"` values become [`ReleaseType::Release`],
    /// as do channels this crate does not know.
    ///
    /// # Examples
    ///
    /// ```
    /// use packlock_core::model::ReleaseType;
    ///
    /// assert_eq!(ReleaseType::normalize(Some("beta")), ReleaseType::Beta);
    /// assert_eq!(ReleaseType::normalize(Some("null")), ReleaseType::Release);
    /// assert_eq!(ReleaseType::normalize(None), ReleaseType::Release);
    /// ```
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
            Some("beta") => Self::Beta,
            Some("alpha") => Self::Alpha,
            _ => Self::Release,
        }
    }
}

/// A provider-scoped project identity: the pair every dedup check keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectRef {
    pub provider: Provider,
    pub id: String,
}

impl ProjectRef {
    pub fn new(provider: Provider, id: impl Into<String>) -> Self {
        Self {
            provider,
            id: id.into(),
        }
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.id)
    }
}

/// One downloadable artifact of a project.
///
/// `id` is the provider's file (or version) id and `parent_id` the owning
/// project id on the same provider. An empty `loaders` set means the file
/// works with any loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    pub provider: Provider,
    pub file_name: String,
    pub url: String,
    pub id: String,
    pub parent_id: String,
    #[serde(default)]
    pub mc_versions: BTreeSet<String>,
    #[serde(default)]
    pub loaders: BTreeSet<String>,
    #[serde(default)]
    pub release_type: ReleaseType,
    #[serde(default)]
    pub hashes: BTreeMap<String, String>,
    #[serde(default)]
    pub required_dependencies: BTreeSet<String>,
}

impl ProjectFile {
    /// Identity of the artifact within a project.
    ///
    /// Modrinth attaches several artifacts to one version id, so the file name
    /// is part of the key.
    pub fn key(&self) -> (Provider, &str, &str) {
        (self.provider, &self.id, &self.file_name)
    }

    /// Required dependencies as provider-scoped references.
    pub fn required_refs(&self) -> impl Iterator<Item = ProjectRef> + '_ {
        self.required_dependencies
            .iter()
            .map(|id| ProjectRef::new(self.provider, id.clone()))
    }
}

/// A content package, possibly known under several providers at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Stable key assigned by the lock state on first insertion.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lock_id: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    pub name: BTreeMap<Provider, String>,
    pub slug: BTreeMap<Provider, String>,
    pub id: BTreeMap<Provider, String>,
    #[serde(default)]
    pub files: Vec<ProjectFile>,
}

impl Project {
    /// Creates a project known on a single provider, with no files.
    pub fn new(
        provider: Provider,
        project_type: ProjectType,
        id: impl Into<String>,
        slug: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            lock_id: String::new(),
            project_type,
            name: BTreeMap::from([(provider, name.into())]),
            slug: BTreeMap::from([(provider, slug.into())]),
            id: BTreeMap::from([(provider, id.into())]),
            files: Vec::new(),
        }
    }

    /// All provider/id pairs this project is known under.
    pub fn refs(&self) -> impl Iterator<Item = ProjectRef> + '_ {
        self.id
            .iter()
            .map(|(provider, id)| ProjectRef::new(*provider, id.clone()))
    }

    pub fn id_on(&self, provider: Provider) -> Option<&str> {
        self.id.get(&provider).map(String::as_str)
    }

    pub fn slug_on(&self, provider: Provider) -> Option<&str> {
        self.slug.get(&provider).map(String::as_str)
    }

    /// Whether this project is known under `reference`.
    pub fn has_ref(&self, reference: &ProjectRef) -> bool {
        self.id_on(reference.provider) == Some(reference.id.as_str())
    }

    /// Whether the two projects share any provider/id pair.
    pub fn shares_identity(&self, other: &Self) -> bool {
        other.refs().any(|r| self.has_ref(&r))
    }

    /// Providers this project is known on.
    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.id.keys().copied()
    }

    /// A slug suitable for messages, preferring the first provider that has one.
    pub fn display_slug(&self) -> &str {
        self.slug.values().next().map_or("<unnamed>", String::as_str)
    }

    /// Adds a file unless one with the same key is already present.
    ///
    /// Returns `true` when the file was inserted.
    pub fn add_file(&mut self, file: ProjectFile) -> bool {
        if self.files.iter().any(|f| f.key() == file.key()) {
            return false;
        }
        self.files.push(file);
        true
    }

    pub fn add_files(&mut self, files: impl IntoIterator<Item = ProjectFile>) {
        for file in files {
            self.add_file(file);
        }
    }

    /// Whether any file comes from `provider`.
    pub fn has_files_on(&self, provider: Provider) -> bool {
        self.files.iter().any(|f| f.provider == provider)
    }

    /// Absorbs another copy of the same project.
    ///
    /// Provider identifiers and files are unioned. Entries already present on
    /// `self` win; the lock id of `self` is kept unless it has none.
    pub fn merge(&mut self, other: Self) {
        for (provider, name) in other.name {
            self.name.entry(provider).or_insert(name);
        }
        for (provider, slug) in other.slug {
            self.slug.entry(provider).or_insert(slug);
        }
        for (provider, id) in other.id {
            self.id.entry(provider).or_insert(id);
        }
        if self.lock_id.is_empty() {
            self.lock_id = other.lock_id;
        }
        self.add_files(other.files);
    }

    /// Union of required dependencies declared by the project's files.
    pub fn required_dependencies(&self) -> BTreeSet<ProjectRef> {
        self.files.iter().flat_map(ProjectFile::required_refs).collect()
    }
}

/// Builders for tests, shared with dependent crates through the
/// `test-utils` feature.
#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures {
    use super::*;

    /// A file compatible with 1.20.1 / fabric that requires `deps`.
    pub fn file(provider: Provider, parent: &str, id: &str, deps: &[&str]) -> ProjectFile {
        ProjectFile {
            provider,
            file_name: format!("{}-{}.jar", parent, id),
            url: format!("https://cdn.example/{}/{}.jar", parent, id),
            id: id.into(),
            parent_id: parent.into(),
            mc_versions: BTreeSet::from(["1.20.1".to_string()]),
            loaders: BTreeSet::from(["fabric".to_string()]),
            release_type: ReleaseType::Release,
            hashes: BTreeMap::from([("sha1".to_string(), format!("{}{}", parent, id))]),
            required_dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// A mod known on `provider` only, with no files.
    pub fn project(provider: Provider, id: &str, slug: &str) -> Project {
        Project::new(provider, ProjectType::Mod, id, slug, slug.to_uppercase())
    }
}
