use packlock_core::{PacklockError, Project, ProjectFile, ProjectType, Provider, ReleaseType, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Project payload from `GET project/{id|slug}` and `GET projects?ids=`.
///
/// # Examples
///
/// ```
/// use packlock_modrinth::types::MrProject;
///
/// let json = r#"{"id": "AANobbMI", "slug": "sodium", "title": "Sodium", "project_type": "mod"}"#;
/// let project: MrProject = serde_json::from_str(json).unwrap();
///
/// assert_eq!(project.slug, "sodium");
/// assert!(project.normalize().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct MrProject {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub project_type: String,
}

impl MrProject {
    pub fn is_modpack(&self) -> bool {
        self.project_type == "modpack"
    }

    /// Maps into the canonical model.
    ///
    /// Project types outside mods, resource packs and shaders (modpacks,
    /// plugins, data packs) are an `UnrecognizedCategory` error.
    pub fn normalize(self) -> Result<Project> {
        let Some(project_type) = project_type(&self.project_type) else {
            return Err(PacklockError::UnrecognizedCategory {
                provider: Provider::Modrinth,
                project: self.slug,
                category: self.project_type,
            });
        };
        Ok(Project::new(
            Provider::Modrinth,
            project_type,
            self.id,
            self.slug,
            self.title,
        ))
    }
}

fn project_type(raw: &str) -> Option<ProjectType> {
    match raw {
        "mod" => Some(ProjectType::Mod),
        "resourcepack" => Some(ProjectType::ResourcePack),
        "shader" => Some(ProjectType::Shader),
        _ => None,
    }
}

/// Version record from `GET project/{id}/version`, `GET version/{id}` and
/// `GET versions?ids=`.
#[derive(Debug, Clone, Deserialize)]
pub struct MrVersion {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub version_type: Option<String>,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub loaders: Vec<String>,
    #[serde(default)]
    pub files: Vec<MrVersionFile>,
    #[serde(default)]
    pub dependencies: Vec<MrDependency>,
}

/// One artifact attached to a version record.
#[derive(Debug, Clone, Deserialize)]
pub struct MrVersionFile {
    #[serde(default)]
    pub hashes: BTreeMap<String, String>,
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub primary: bool,
}

/// Dependency declaration on a version record.
#[derive(Debug, Clone, Deserialize)]
pub struct MrDependency {
    #[serde(default)]
    pub version_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub dependency_type: String,
}

impl MrVersion {
    /// Whether this record passes the compatibility filter.
    pub fn is_compatible(&self, target_versions: &[String], target_loaders: &[String]) -> bool {
        packlock_core::is_compatible(
            self.game_versions.iter().map(String::as_str),
            self.loaders.iter().map(String::as_str),
            target_versions,
            target_loaders,
        )
    }

    /// Builds one canonical file per artifact on this record.
    pub fn into_files(self) -> Vec<ProjectFile> {
        let release_type = ReleaseType::normalize(self.version_type.as_deref());
        let required_dependencies = self
            .dependencies
            .iter()
            .filter(|d| d.dependency_type == "required")
            .filter_map(|d| d.project_id.clone())
            .collect();
        let mc_versions = self.game_versions.into_iter().collect();
        let loaders = self.loaders.into_iter().collect();

        let template = ProjectFile {
            provider: Provider::Modrinth,
            file_name: String::new(),
            url: String::new(),
            id: self.id,
            parent_id: self.project_id,
            mc_versions,
            loaders,
            release_type,
            hashes: BTreeMap::new(),
            required_dependencies,
        };

        self.files
            .into_iter()
            .map(|file| ProjectFile {
                file_name: file.filename,
                url: file.url,
                hashes: file.hashes,
                ..template.clone()
            })
            .collect()
    }
}
