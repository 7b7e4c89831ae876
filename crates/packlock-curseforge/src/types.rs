use packlock_core::{PacklockError, Project, ProjectFile, ProjectType, Provider, ReleaseType, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// Minecraft game id on CurseForge.
pub const MINECRAFT_GAME_ID: u32 = 432;

/// `classId` of modpacks, which are never resolvable content.
pub const MODPACK_CLASS_ID: u32 = 4471;

/// `relationType` of a required dependency.
const REQUIRED_DEPENDENCY: u8 = 3;

/// Loader names that appear mixed into a file's `gameVersions`.
const KNOWN_LOADERS: [&str; 6] = ["forge", "neoforge", "fabric", "quilt", "liteloader", "rift"];

/// Every CurseForge response wraps its payload in `data`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub(crate) data: T,
    #[serde(default)]
    pub(crate) pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Pagination {
    pub(crate) index: u32,
    pub(crate) result_count: u32,
    pub(crate) total_count: u32,
}

impl Pagination {
    pub(crate) fn is_last_page(&self) -> bool {
        self.result_count == 0 || self.index.saturating_add(self.result_count) >= self.total_count
    }
}

/// Mod payload from `GET mods/{id}`, `GET mods/search` and `POST mods`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfMod {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub class_id: Option<u32>,
}

impl CfMod {
    pub fn is_modpack(&self) -> bool {
        self.class_id == Some(MODPACK_CLASS_ID)
    }

    /// Maps into the canonical model.
    ///
    /// Classes other than mods, resource packs and shaders (modpacks,
    /// worlds, or a missing `classId`) are an `UnrecognizedCategory` error.
    pub fn normalize(self) -> Result<Project> {
        let Some(project_type) = self.class_id.and_then(project_type) else {
            return Err(PacklockError::UnrecognizedCategory {
                provider: Provider::CurseForge,
                category: self
                    .class_id
                    .map_or_else(|| "none".to_string(), |id| format!("class {}", id)),
                project: self.slug,
            });
        };
        Ok(Project::new(
            Provider::CurseForge,
            project_type,
            self.id.to_string(),
            self.slug,
            self.name,
        ))
    }
}

fn project_type(class_id: u32) -> Option<ProjectType> {
    match class_id {
        6 => Some(ProjectType::Mod),
        12 => Some(ProjectType::ResourcePack),
        6552 => Some(ProjectType::Shader),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CfHash {
    pub value: String,
    pub algo: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfDependency {
    pub mod_id: u64,
    pub relation_type: u8,
}

/// File payload from `GET mods/{id}/files`, `GET mods/{id}/files/{fileId}`
/// and `POST mods/files`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CfFile {
    pub id: u64,
    pub mod_id: u64,
    pub file_name: String,
    #[serde(default)]
    pub release_type: Option<u8>,
    #[serde(default)]
    pub hashes: Vec<CfHash>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<CfDependency>,
}

impl CfFile {
    /// Splits `gameVersions` into runtime versions and loader names.
    ///
    /// Environment tags such as `Client` or `Server` are dropped.
    pub fn split_game_versions(&self) -> (BTreeSet<String>, BTreeSet<String>) {
        let mut mc_versions = BTreeSet::new();
        let mut loaders = BTreeSet::new();
        for entry in &self.game_versions {
            let lower = entry.to_ascii_lowercase();
            if KNOWN_LOADERS.contains(&lower.as_str()) {
                loaders.insert(lower);
            } else if entry.starts_with(|c: char| c.is_ascii_digit()) {
                mc_versions.insert(entry.clone());
            }
        }
        (mc_versions, loaders)
    }

    pub fn is_compatible(&self, target_versions: &[String], target_loaders: &[String]) -> bool {
        let (mc_versions, loaders) = self.split_game_versions();
        packlock_core::is_compatible(
            mc_versions.iter().map(String::as_str),
            loaders.iter().map(String::as_str),
            target_versions,
            target_loaders,
        )
    }

    /// Download url, falling back to the CDN path when the author disabled
    /// third-party distribution and the API omits it.
    fn url(&self) -> String {
        match &self.download_url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => format!(
                "https://edge.forgecdn.net/files/{}/{}/{}",
                self.id / 1000,
                self.id % 1000,
                urlencoding::encode(&self.file_name)
            ),
        }
    }

    pub fn into_project_file(self) -> ProjectFile {
        let (mc_versions, loaders) = self.split_game_versions();
        let release_type = match self.release_type {
            Some(2) => ReleaseType::Beta,
            Some(3) => ReleaseType::Alpha,
            _ => ReleaseType::Release,
        };
        let hashes: BTreeMap<String, String> = self
            .hashes
            .iter()
            .filter_map(|h| match h.algo {
                1 => Some(("sha1".to_string(), h.value.clone())),
                2 => Some(("md5".to_string(), h.value.clone())),
                _ => None,
            })
            .collect();
        let required_dependencies = self
            .dependencies
            .iter()
            .filter(|d| d.relation_type == REQUIRED_DEPENDENCY)
            .map(|d| d.mod_id.to_string())
            .collect();

        ProjectFile {
            provider: Provider::CurseForge,
            url: self.url(),
            file_name: self.file_name,
            id: self.id.to_string(),
            parent_id: self.mod_id.to_string(),
            mc_versions,
            loaders,
            release_type,
            hashes,
            required_dependencies,
        }
    }
}
