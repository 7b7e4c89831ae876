//! Modrinth API client.
//!
//! Provides access to Modrinth via:
//! - `GET project/{id|slug}` and `GET projects?ids=[...]` for project lookups
//! - `GET project/{id}/version`, `GET version/{id}` and `GET versions?ids=[...]`
//!   for version records
//!
//! # Examples
//!
//! ```no_run
//! use packlock_core::{HttpClient, Platform};
//! use packlock_modrinth::ModrinthPlatform;
//!
//! #[tokio::main]
//! async fn main() {
//!     let http = HttpClient::builder().build().unwrap();
//!     let modrinth = ModrinthPlatform::new(http);
//!
//!     let sodium = modrinth.lookup_by_freeform("sodium").await.unwrap();
//!     println!("{:?}", sodium.map(|p| p.id));
//! }
//! ```

use crate::types::{MrProject, MrVersion};
use async_trait::async_trait;
use packlock_core::{
    HttpClient, Platform, Project, ProjectFile, ProjectType, Provider, Result, skip_unrecognized,
};
use serde::de::DeserializeOwned;

/// Modrinth API v2 base URL.
pub const API_BASE: &str = "https://api.modrinth.com/v2";

/// Base URL for project pages on modrinth.com
pub const MODRINTH_URL: &str = "https://modrinth.com";

/// Returns the URL for a project's page on modrinth.com.
pub fn project_url(project_type: ProjectType, slug: &str) -> String {
    let section = match project_type {
        ProjectType::Mod => "mod",
        ProjectType::ResourcePack => "resourcepack",
        ProjectType::Shader => "shader",
    };
    format!("{}/{}/{}", MODRINTH_URL, section, urlencoding::encode(slug))
}

/// Encodes ids as the URL-encoded JSON array Modrinth's batch endpoints take.
fn encode_ids(ids: &[String]) -> Result<String> {
    let json = serde_json::to_string(ids)?;
    Ok(urlencoding::encode(&json).into_owned())
}

/// Modrinth platform adapter.
#[derive(Clone)]
pub struct ModrinthPlatform {
    http: HttpClient,
    base_url: String,
}

impl ModrinthPlatform {
    /// Creates an adapter against the public API.
    pub fn new(http: HttpClient) -> Self {
        Self::with_base_url(http, API_BASE)
    }

    /// Creates an adapter against another API root (mirrors, mock servers).
    pub fn with_base_url(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}/{}", self.base_url, path);
        let Some(body) = self.http.get(&url, None).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&body)?))
    }

    async fn project(&self, id_or_slug: &str) -> Result<Option<Project>> {
        let path = format!("project/{}", urlencoding::encode(id_or_slug));
        let Some(response) = self.get_json::<MrProject>(&path).await? else {
            return Ok(None);
        };

        skip_unrecognized(response.normalize())
    }
}

#[async_trait]
impl Platform for ModrinthPlatform {
    fn provider(&self) -> Provider {
        Provider::Modrinth
    }

    async fn lookup_by_id(&self, id: &str) -> Result<Option<Project>> {
        self.project(id).await
    }

    async fn lookup_by_slug(&self, slug: &str) -> Result<Option<Project>> {
        self.project(slug).await
    }

    async fn lookup_many(&self, ids: &[String]) -> Result<Vec<Project>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let path = format!("projects?ids={}", encode_ids(ids)?);
        let response: Vec<MrProject> = self.get_json(&path).await?.unwrap_or_default();

        let mut projects = Vec::with_capacity(response.len());
        for project in response.into_iter().filter(|p| !p.is_modpack()) {
            projects.extend(skip_unrecognized(project.normalize())?);
        }
        Ok(projects)
    }

    async fn list_files(
        &self,
        target_versions: &[String],
        target_loaders: &[String],
        project_id: &str,
        file_id: Option<&str>,
    ) -> Result<Vec<ProjectFile>> {
        if let Some(file_id) = file_id {
            let path = format!("version/{}", urlencoding::encode(file_id));
            let version: Option<MrVersion> = self.get_json(&path).await?;
            return Ok(version.map(MrVersion::into_files).unwrap_or_default());
        }

        let path = format!("project/{}/version", urlencoding::encode(project_id));
        let versions: Vec<MrVersion> = self.get_json(&path).await?.unwrap_or_default();

        let files: Vec<ProjectFile> = versions
            .into_iter()
            .filter(|v| v.is_compatible(target_versions, target_loaders))
            .flat_map(MrVersion::into_files)
            .collect();

        if files.is_empty() {
            tracing::debug!(
                "no modrinth files for {} matching {:?} / {:?}",
                project_id,
                target_versions,
                target_loaders
            );
        }
        Ok(files)
    }

    async fn list_files_many(&self, file_ids: &[String]) -> Result<Vec<ProjectFile>> {
        if file_ids.is_empty() {
            return Ok(Vec::new());
        }
        let path = format!("versions?ids={}", encode_ids(file_ids)?);
        let versions: Vec<MrVersion> = self.get_json(&path).await?.unwrap_or_default();

        Ok(versions.into_iter().flat_map(MrVersion::into_files).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use packlock_core::{PacklockError, ProjectType};

    fn s(items: &[&str]) -> Vec<String> {
        items.iter().map(|i| i.to_string()).collect()
    }

    async fn platform(server: &mockito::ServerGuard) -> ModrinthPlatform {
        let http = HttpClient::builder().allow_insecure(true).build().unwrap();
        ModrinthPlatform::with_base_url(http, server.url())
    }

    fn project_json(id: &str, slug: &str, project_type: &str) -> String {
        format!(
            r#"{{"id": "{}", "slug": "{}", "title": "{}", "project_type": "{}"}}"#,
            id,
            slug,
            slug.to_uppercase(),
            project_type
        )
    }

    #[test]
    fn test_encode_ids() {
        let encoded = encode_ids(&s(&["AAAAAAAA", "BBBBBBBB"])).unwrap();
        assert_eq!(encoded, "%5B%22AAAAAAAA%22%2C%22BBBBBBBB%22%5D");
    }

    #[test]
    fn test_project_url() {
        assert_eq!(
            project_url(ProjectType::Mod, "sodium"),
            "https://modrinth.com/mod/sodium"
        );
        assert_eq!(
            project_url(ProjectType::Shader, "complementary-reimagined"),
            "https://modrinth.com/shader/complementary-reimagined"
        );
    }

    #[tokio::test]
    async fn test_freeform_slug_dispatch() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/project/sodium")
            .with_status(200)
            .with_body(project_json("AANobbMI", "sodium", "mod"))
            .create_async()
            .await;

        let project = platform(&server)
            .await
            .lookup_by_freeform("sodium")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(project.id_on(Provider::Modrinth), Some("AANobbMI"));
        assert_eq!(project.slug_on(Provider::Modrinth), Some("sodium"));
        assert_eq!(project.project_type, ProjectType::Mod);
        assert!(project.files.is_empty());
    }

    #[tokio::test]
    async fn test_freeform_six_digits_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let result = platform(&server).await.lookup_by_freeform("394468").await;
        assert!(result.unwrap().is_none());
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_unsupported_type_is_none() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/project/PLUGIN01")
            .with_status(200)
            .with_body(project_json("PLUGIN01", "some-plugin", "plugin"))
            .create_async()
            .await;

        let result = platform(&server).await.lookup_by_id("PLUGIN01").await;
        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_project_is_none() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/project/nope")
            .with_status(404)
            .create_async()
            .await;

        assert!(platform(&server).await.lookup_by_slug("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/project/broken")
            .with_status(200)
            .with_body("{\"id\": 1")
            .create_async()
            .await;

        let result = platform(&server).await.lookup_by_slug("broken").await;
        assert!(matches!(result, Err(PacklockError::Json(_))));
    }

    #[tokio::test]
    async fn test_lookup_many_drops_modpacks() {
        let mut server = mockito::Server::new_async().await;
        let body = format!(
            "[{}, {}]",
            project_json("AAAAAAAA", "a", "mod"),
            project_json("BBBBBBBB", "b", "modpack")
        );
        let _m = server
            .mock("GET", "/projects")
            .match_query(Matcher::UrlEncoded(
                "ids".into(),
                r#"["AAAAAAAA","BBBBBBBB"]"#.into(),
            ))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let projects = platform(&server)
            .await
            .lookup_many(&s(&["AAAAAAAA", "BBBBBBBB"]))
            .await
            .unwrap();

        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id_on(Provider::Modrinth), Some("AAAAAAAA"));
    }

    #[tokio::test]
    async fn test_list_files_filters_versions() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"[
            {"id": "fabric01", "project_id": "AANobbMI", "version_type": "release",
             "game_versions": ["1.20.1"], "loaders": ["fabric"],
             "files": [{"url": "https://cdn/f.jar", "filename": "f.jar", "hashes": {"sha1": "1"}}],
             "dependencies": [{"project_id": "P7dR8mSH", "dependency_type": "required"}]},
            {"id": "forge001", "project_id": "AANobbMI", "version_type": "release",
             "game_versions": ["1.20.1"], "loaders": ["forge"],
             "files": [{"url": "https://cdn/g.jar", "filename": "g.jar", "hashes": {}}]},
            {"id": "oldfab01", "project_id": "AANobbMI", "version_type": "",
             "game_versions": ["1.19.2"], "loaders": ["fabric"],
             "files": [{"url": "https://cdn/h.jar", "filename": "h.jar", "hashes": {}}]},
            {"id": "shader01", "project_id": "AANobbMI", "version_type": "null",
             "game_versions": ["1.20.1"], "loaders": ["iris"],
             "files": [{"url": "https://cdn/s.zip", "filename": "s.zip", "hashes": {}}]}
        ]"#;
        let _m = server
            .mock("GET", "/project/AANobbMI/version")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let files = platform(&server)
            .await
            .list_files(&s(&["1.20.1"]), &s(&["fabric"]), "AANobbMI", None)
            .await
            .unwrap();

        let ids: Vec<_> = files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["fabric01", "shader01"]);
        assert!(files[0].required_dependencies.contains("P7dR8mSH"));
    }

    #[tokio::test]
    async fn test_list_files_single_version_unfiltered() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"{"id": "forge001", "project_id": "AANobbMI",
             "game_versions": ["1.16.5"], "loaders": ["forge"],
             "files": [{"url": "https://cdn/g.jar", "filename": "g.jar", "hashes": {}}]}"#;
        let _m = server
            .mock("GET", "/version/forge001")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let files = platform(&server)
            .await
            .list_files(&s(&["1.20.1"]), &s(&["fabric"]), "AANobbMI", Some("forge001"))
            .await
            .unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "g.jar");
    }

    #[tokio::test]
    async fn test_list_files_many() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"[
            {"id": "v1", "project_id": "A", "game_versions": ["1.12.2"], "loaders": ["forge"],
             "files": [{"url": "https://cdn/a.jar", "filename": "a.jar"}]},
            {"id": "v2", "project_id": "B", "game_versions": ["1.20.1"], "loaders": [],
             "files": [{"url": "https://cdn/b.zip", "filename": "b.zip"}]}
        ]"#;
        let _m = server
            .mock("GET", "/versions")
            .match_query(Matcher::UrlEncoded("ids".into(), r#"["v1","v2"]"#.into()))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let files = platform(&server)
            .await
            .list_files_many(&s(&["v1", "v2"]))
            .await
            .unwrap();
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_server_error_propagates() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/project/AANobbMI/version")
            .with_status(500)
            .create_async()
            .await;

        let result = platform(&server)
            .await
            .list_files(&s(&["1.20.1"]), &s(&["fabric"]), "AANobbMI", None)
            .await;
        assert!(matches!(result, Err(PacklockError::Status { status: 500, .. })));
    }
}
