//! CurseForge API client.
//!
//! Provides access to CurseForge via:
//! - `GET mods/{id}`, `GET mods/search?gameId=432&slug=` and `POST mods` for mods
//! - `GET mods/{id}/files`, `GET mods/{id}/files/{fileId}` and `POST mods/files`
//!   for files
//!
//! CurseForge ids are numeric; any all-digit input is treated as an id and
//! everything else as a slug.

use crate::types::{CfFile, CfMod, Envelope, MINECRAFT_GAME_ID};
use async_trait::async_trait;
use packlock_core::http::{HeaderMap, header_map};
use packlock_core::{
    HttpClient, InputKind, Platform, Project, ProjectFile, ProjectType, Provider, Result,
    skip_unrecognized,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// CurseForge API v1 base URL.
pub const API_BASE: &str = "https://api.curseforge.com/v1";

/// Base URL for Minecraft project pages on curseforge.com
pub const CURSEFORGE_URL: &str = "https://www.curseforge.com/minecraft";

/// Files requested per page when listing a mod's files.
const PAGE_SIZE: u32 = 50;

/// Upper bound on pages fetched for one mod.
const MAX_PAGES: u32 = 20;

/// Returns the URL for a project's page on curseforge.com.
pub fn project_url(project_type: ProjectType, slug: &str) -> String {
    let section = match project_type {
        ProjectType::Mod => "mc-mods",
        ProjectType::ResourcePack => "texture-packs",
        ProjectType::Shader => "shaders",
    };
    format!("{}/{}/{}", CURSEFORGE_URL, section, urlencoding::encode(slug))
}

fn parse_ids(ids: &[String]) -> Vec<u64> {
    ids.iter()
        .filter_map(|id| match id.parse::<u64>() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!("ignoring non-numeric curseforge id '{}'", id);
                None
            }
        })
        .collect()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModIdsRequest {
    mod_ids: Vec<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileIdsRequest {
    file_ids: Vec<u64>,
}

/// CurseForge platform adapter.
#[derive(Clone)]
pub struct CurseForgePlatform {
    http: HttpClient,
    base_url: String,
    headers: HeaderMap,
}

impl CurseForgePlatform {
    /// Creates an adapter against the public API.
    pub fn new(http: HttpClient, api_key: &str) -> Self {
        Self::with_base_url(http, api_key, API_BASE)
    }

    /// Creates an adapter against another API root (mirrors, mock servers).
    pub fn with_base_url(http: HttpClient, api_key: &str, base_url: impl Into<String>) -> Self {
        if api_key.is_empty() {
            tracing::warn!("no CurseForge API key configured; requests will be rejected");
        }
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers: header_map([("x-api-key", api_key), ("accept", "application/json")]),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}/{}", self.base_url, path);
        let Some(body) = self.http.get(&url, Some(&self.headers)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&body)?))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let Some(body) = self.http.post_json(&url, body, Some(&self.headers)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&body)?))
    }

    /// Fetches every page of a mod's files.
    async fn all_files(&self, project_id: &str) -> Result<Vec<CfFile>> {
        let mut files = Vec::new();
        let mut index = 0usize;
        for _ in 0..MAX_PAGES {
            let path = format!(
                "mods/{}/files?index={}&pageSize={}",
                urlencoding::encode(project_id),
                index,
                PAGE_SIZE
            );
            let Some(response) = self.get_json::<Envelope<Vec<CfFile>>>(&path).await? else {
                break;
            };
            let fetched = response.data.len();
            files.extend(response.data);
            index += fetched;
            if fetched == 0 || response.pagination.is_none_or(|p| p.is_last_page()) {
                break;
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl Platform for CurseForgePlatform {
    fn provider(&self) -> Provider {
        Provider::CurseForge
    }

    fn classify(&self, input: &str) -> InputKind {
        if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
            InputKind::Id
        } else {
            InputKind::Slug
        }
    }

    async fn lookup_by_id(&self, id: &str) -> Result<Option<Project>> {
        let path = format!("mods/{}", urlencoding::encode(id));
        let Some(response) = self.get_json::<Envelope<CfMod>>(&path).await? else {
            return Ok(None);
        };

        skip_unrecognized(response.data.normalize())
    }

    async fn lookup_by_slug(&self, slug: &str) -> Result<Option<Project>> {
        let path = format!(
            "mods/search?gameId={}&slug={}",
            MINECRAFT_GAME_ID,
            urlencoding::encode(slug)
        );
        let response: Option<Envelope<Vec<CfMod>>> = self.get_json(&path).await?;
        let candidates: Vec<CfMod> = response
            .map(|r| r.data)
            .unwrap_or_default()
            .into_iter()
            .filter(|m| m.slug == slug && !m.is_modpack())
            .collect();

        let mut unrecognized = None;
        for candidate in candidates {
            match candidate.normalize() {
                Ok(project) => return Ok(Some(project)),
                Err(e) => unrecognized = unrecognized.or(Some(e)),
            }
        }
        match unrecognized {
            Some(e) => skip_unrecognized(Err(e)),
            None => Ok(None),
        }
    }

    async fn lookup_many(&self, ids: &[String]) -> Result<Vec<Project>> {
        let mod_ids = parse_ids(ids);
        if mod_ids.is_empty() {
            return Ok(Vec::new());
        }
        let response: Option<Envelope<Vec<CfMod>>> =
            self.post_json("mods", &ModIdsRequest { mod_ids }).await?;

        let mods = response.map(|r| r.data).unwrap_or_default();
        let mut projects = Vec::with_capacity(mods.len());
        for m in mods.into_iter().filter(|m| !m.is_modpack()) {
            projects.extend(skip_unrecognized(m.normalize())?);
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
            let path = format!(
                "mods/{}/files/{}",
                urlencoding::encode(project_id),
                urlencoding::encode(file_id)
            );
            let response: Option<Envelope<CfFile>> = self.get_json(&path).await?;
            return Ok(response
                .map(|r| vec![r.data.into_project_file()])
                .unwrap_or_default());
        }

        let files: Vec<ProjectFile> = self
            .all_files(project_id)
            .await?
            .into_iter()
            .filter(|f| f.is_compatible(target_versions, target_loaders))
            .map(CfFile::into_project_file)
            .collect();

        if files.is_empty() {
            tracing::debug!(
                "no curseforge files for {} matching {:?} / {:?}",
                project_id,
                target_versions,
                target_loaders
            );
        }
        Ok(files)
    }

    async fn list_files_many(&self, file_ids: &[String]) -> Result<Vec<ProjectFile>> {
        let file_ids = parse_ids(file_ids);
        if file_ids.is_empty() {
            return Ok(Vec::new());
        }
        let response: Option<Envelope<Vec<CfFile>>> = self
            .post_json("mods/files", &FileIdsRequest { file_ids })
            .await?;

        Ok(response
            .map(|r| r.data)
            .unwrap_or_default()
            .into_iter()
            .map(CfFile::into_project_file)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use packlock_core::{PacklockError, ProjectType};
    use serde_json::json;

    fn s(items: &[&str]) -> Vec<String> {
        items.iter().map(|i| i.to_string()).collect()
    }

    fn platform(server: &mockito::ServerGuard) -> CurseForgePlatform {
        let http = HttpClient::builder().allow_insecure(true).build().unwrap();
        CurseForgePlatform::with_base_url(http, "test-key", server.url())
    }

    fn mod_json(id: u64, slug: &str, class_id: u32) -> serde_json::Value {
        json!({"id": id, "name": slug.to_uppercase(), "slug": slug, "classId": class_id})
    }

    fn file_json(id: u64, mod_id: u64, versions: &[&str]) -> serde_json::Value {
        json!({
            "id": id,
            "modId": mod_id,
            "fileName": format!("{}.jar", id),
            "releaseType": 1,
            "hashes": [{"value": "h", "algo": 1}],
            "downloadUrl": format!("https://edge.forgecdn.net/{}.jar", id),
            "gameVersions": versions,
            "dependencies": []
        })
    }

    #[test]
    fn test_classify() {
        let http = HttpClient::builder().build().unwrap();
        let cf = CurseForgePlatform::new(http, "k");
        assert_eq!(cf.classify("238222"), InputKind::Id);
        assert_eq!(cf.classify("jei"), InputKind::Slug);
        assert_eq!(cf.classify("AANobbMI"), InputKind::Slug);
    }

    #[test]
    fn test_project_url() {
        assert_eq!(
            project_url(ProjectType::Mod, "jei"),
            "https://www.curseforge.com/minecraft/mc-mods/jei"
        );
        assert_eq!(
            project_url(ProjectType::ResourcePack, "faithful-32x"),
            "https://www.curseforge.com/minecraft/texture-packs/faithful-32x"
        );
    }

    #[tokio::test]
    async fn test_unrecognized_class_is_skipped() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/mods/4471")
            .with_status(200)
            .with_body(json!({"data": mod_json(4471, "all-the-mods", 4471)}).to_string())
            .create_async()
            .await;

        let result = platform(&server).lookup_by_id("4471").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_lookup_by_id_sends_api_key() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/mods/238222")
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_body(json!({"data": mod_json(238222, "jei", 6)}).to_string())
            .create_async()
            .await;

        let project = platform(&server)
            .lookup_by_freeform("238222")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(project.id_on(Provider::CurseForge), Some("238222"));
        assert_eq!(project.project_type, ProjectType::Mod);
    }

    #[tokio::test]
    async fn test_lookup_by_slug_requires_exact_match() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({"data": [mod_json(1, "jei-addon", 6), mod_json(238222, "jei", 6)]});
        let _m = server
            .mock("GET", "/mods/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("gameId".into(), "432".into()),
                Matcher::UrlEncoded("slug".into(), "jei".into()),
            ]))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let project = platform(&server).lookup_by_slug("jei").await.unwrap().unwrap();
        assert_eq!(project.id_on(Provider::CurseForge), Some("238222"));
    }

    #[tokio::test]
    async fn test_lookup_many_drops_modpacks() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({"data": [mod_json(1, "a", 6), mod_json(2, "b", 4471)]});
        let _m = server
            .mock("POST", "/mods")
            .match_body(Matcher::Json(json!({"modIds": [1, 2]})))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let projects = platform(&server).lookup_many(&s(&["1", "2"])).await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].slug_on(Provider::CurseForge), Some("a"));
    }

    #[tokio::test]
    async fn test_list_files_paginates_and_filters() {
        let mut server = mockito::Server::new_async().await;
        let page1 = json!({
            "data": [file_json(10, 5, &["1.20.1", "Fabric"]), file_json(11, 5, &["1.20.1", "Forge"])],
            "pagination": {"index": 0, "pageSize": 2, "resultCount": 2, "totalCount": 3}
        });
        let page2 = json!({
            "data": [file_json(12, 5, &["1.20.1"])],
            "pagination": {"index": 2, "pageSize": 50, "resultCount": 1, "totalCount": 3}
        });
        let _m1 = server
            .mock("GET", "/mods/5/files")
            .match_query(Matcher::UrlEncoded("index".into(), "0".into()))
            .with_status(200)
            .with_body(page1.to_string())
            .create_async()
            .await;
        let _m2 = server
            .mock("GET", "/mods/5/files")
            .match_query(Matcher::UrlEncoded("index".into(), "2".into()))
            .with_status(200)
            .with_body(page2.to_string())
            .create_async()
            .await;

        let files = platform(&server)
            .list_files(&s(&["1.20.1"]), &s(&["fabric"]), "5", None)
            .await
            .unwrap();
        let ids: Vec<_> = files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["10", "12"]);
    }

    #[tokio::test]
    async fn test_list_files_survives_malformed_pagination() {
        let mut server = mockito::Server::new_async().await;
        let page = json!({
            "data": [file_json(10, 5, &["1.20.1", "Fabric"])],
            "pagination": {"index": 4_294_967_295_u64, "resultCount": 1, "totalCount": 3}
        });
        let m = server
            .mock("GET", "/mods/5/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(page.to_string())
            .expect(1)
            .create_async()
            .await;

        let files = platform(&server)
            .list_files(&s(&["1.20.1"]), &s(&["fabric"]), "5", None)
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_single_file() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/mods/5/files/11")
            .with_status(200)
            .with_body(json!({"data": file_json(11, 5, &["1.16.5", "Forge"])}).to_string())
            .create_async()
            .await;

        let files = platform(&server)
            .list_files(&s(&["1.20.1"]), &s(&["fabric"]), "5", Some("11"))
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].parent_id, "5");
    }

    #[tokio::test]
    async fn test_list_files_many() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/mods/files")
            .match_body(Matcher::Json(json!({"fileIds": [10, 12]})))
            .with_status(200)
            .with_body(
                json!({"data": [file_json(10, 5, &["1.20.1"]), file_json(12, 6, &["1.12.2"])]})
                    .to_string(),
            )
            .create_async()
            .await;

        let files = platform(&server)
            .list_files_many(&s(&["10", "12"]))
            .await
            .unwrap();
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_forbidden_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/mods/1")
            .with_status(403)
            .create_async()
            .await;

        let result = platform(&server).lookup_by_id("1").await;
        assert!(matches!(result, Err(PacklockError::Status { status: 403, .. })));
    }
}
