use crate::error::{PacklockError, Result};
use crate::model::{Project, ProjectFile, Provider};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// Loader names that providers attach to content which does not run inside a
/// mod loader (vanilla resource packs, shader packs, data packs). Files
/// carrying any of them pass the loader check whatever loaders were requested.
pub const PASS_THROUGH_LOADERS: [&str; 4] = ["minecraft", "iris", "optifine", "datapack"];

/// How a freeform request string should be looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Provider-specific id.
    Id,
    /// Human-readable slug.
    Slug,
    /// An id shape that cannot name a project on this provider.
    Unsupported,
}

/// Classifies input the way id-keyed hosts with 8-character ids expect.
///
/// - exactly six digits: a short numeric id belonging to another host, unsupported
/// - eight ASCII alphanumerics: an id
/// - anything else: a slug
///
/// # Examples
///
/// ```
/// use packlock_core::platform::{InputKind, classify_input};
///
/// assert_eq!(classify_input("AANobbMI"), InputKind::Id);
/// assert_eq!(classify_input("sodium"), InputKind::Slug);
/// assert_eq!(classify_input("394468"), InputKind::Unsupported);
/// ```
pub fn classify_input(input: &str) -> InputKind {
    static SHORT_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{6}$").unwrap());
    static ALPHANUMERIC_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-zA-Z]{8}$").unwrap());

    if SHORT_NUMERIC.is_match(input) {
        InputKind::Unsupported
    } else if ALPHANUMERIC_ID.is_match(input) {
        InputKind::Id
    } else {
        InputKind::Slug
    }
}

/// Compatibility filter applied when listing a project's files.
///
/// A version record is kept iff its runtime versions intersect
/// `target_versions` and its loaders are empty, intersect `target_loaders`,
/// or contain one of [`PASS_THROUGH_LOADERS`]. Loader names compare
/// case-insensitively.
///
/// # Examples
///
/// ```
/// use packlock_core::platform::is_compatible;
///
/// let versions = ["1.20.1".to_string()];
/// let loaders = ["fabric".to_string()];
///
/// assert!(is_compatible(["1.20.1"], ["iris"], &versions, &loaders));
/// assert!(is_compatible(["1.20.1"], [], &versions, &loaders));
/// assert!(!is_compatible(["1.20.1"], ["forge"], &versions, &loaders));
/// assert!(!is_compatible(["1.19.2"], ["fabric"], &versions, &loaders));
/// ```
pub fn is_compatible<'a>(
    mc_versions: impl IntoIterator<Item = &'a str>,
    loaders: impl IntoIterator<Item = &'a str>,
    target_versions: &[String],
    target_loaders: &[String],
) -> bool {
    let version_match = mc_versions
        .into_iter()
        .any(|v| target_versions.iter().any(|t| t == v));
    if !version_match {
        return false;
    }

    let mut loaders = loaders.into_iter().peekable();
    if loaders.peek().is_none() {
        return true;
    }

    loaders.any(|loader| {
        let loader = loader.to_ascii_lowercase();
        PASS_THROUGH_LOADERS.contains(&loader.as_str())
            || target_loaders
                .iter()
                .any(|t| t.eq_ignore_ascii_case(&loader))
    })
}

impl ProjectFile {
    /// Applies [`is_compatible`] to this file's metadata.
    pub fn is_compatible(&self, target_versions: &[String], target_loaders: &[String]) -> bool {
        is_compatible(
            self.mc_versions.iter().map(String::as_str),
            self.loaders.iter().map(String::as_str),
            target_versions,
            target_loaders,
        )
    }
}

/// Turns a normalization result into a lookup result.
///
/// A [`PacklockError::UnrecognizedCategory`] is logged and skipped; it
/// never fails the lookup. Any other error propagates.
///
/// # Examples
///
/// ```
/// use packlock_core::platform::skip_unrecognized;
/// use packlock_core::{PacklockError, Provider};
///
/// let plugin = Err(PacklockError::UnrecognizedCategory {
///     provider: Provider::Modrinth,
///     project: "essentialsx".into(),
///     category: "plugin".into(),
/// });
/// assert!(skip_unrecognized(plugin).unwrap().is_none());
/// ```
pub fn skip_unrecognized(normalized: Result<Project>) -> Result<Option<Project>> {
    match normalized {
        Ok(project) => Ok(Some(project)),
        Err(e @ PacklockError::UnrecognizedCategory { .. }) => {
            tracing::warn!("{}, skipping", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// A content host, normalized into the canonical model.
///
/// One implementation exists per [`Provider`]. Implementations perform
/// exactly one provider request per lookup and never panic on bad payloads:
/// a missing object is `Ok(None)` / an empty list, a transport or parse fault
/// is `Err`, which callers above the adapter treat as "no result" for that
/// call. Unrecognized categories are skipped with a warning.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Which host this adapter talks to.
    fn provider(&self) -> Provider;

    /// Classifies freeform input for this host.
    fn classify(&self, input: &str) -> InputKind {
        classify_input(input)
    }

    /// Fetches one project by provider id, with no files attached.
    async fn lookup_by_id(&self, id: &str) -> Result<Option<Project>>;

    /// Fetches one project by slug, with no files attached.
    async fn lookup_by_slug(&self, slug: &str) -> Result<Option<Project>>;

    /// Batched lookup. Modpack entries are dropped silently.
    async fn lookup_many(&self, ids: &[String]) -> Result<Vec<Project>>;

    /// Lists a project's files.
    ///
    /// With `file_id`, fetches exactly that file's version record, unfiltered.
    /// Otherwise fetches every version record and keeps those passing
    /// [`is_compatible`].
    async fn list_files(
        &self,
        target_versions: &[String],
        target_loaders: &[String],
        project_id: &str,
        file_id: Option<&str>,
    ) -> Result<Vec<ProjectFile>>;

    /// Batched file fetch, unfiltered.
    async fn list_files_many(&self, file_ids: &[String]) -> Result<Vec<ProjectFile>>;

    /// Dispatches freeform input to the matching lookup.
    async fn lookup_by_freeform(&self, input: &str) -> Result<Option<Project>> {
        match self.classify(input) {
            InputKind::Id => self.lookup_by_id(input).await,
            InputKind::Slug => self.lookup_by_slug(input).await,
            InputKind::Unsupported => {
                tracing::debug!("{} cannot resolve id shape '{}'", self.provider(), input);
                Ok(None)
            }
        }
    }

    /// Attaches the compatible files of `project` on this provider.
    async fn attach_files(
        &self,
        mut project: Project,
        target_versions: &[String],
        target_loaders: &[String],
    ) -> Result<Project> {
        let Some(id) = project.id_on(self.provider()).map(str::to_owned) else {
            return Ok(project);
        };
        let files = self
            .list_files(target_versions, target_loaders, &id, None)
            .await?;
        project.add_files(files);
        Ok(project)
    }
}
