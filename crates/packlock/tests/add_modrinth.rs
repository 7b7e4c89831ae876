//! End-to-end `add` against a mocked Modrinth API.

use mockito::{Matcher, ServerGuard};
use packlock::{AutoAccept, Outcome, PacklockConfig, ResolveError, add_projects};
use packlock_core::{LockState, PacklockError, ProjectRef, Provider};
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;

fn config(server: &ServerGuard) -> PacklockConfig {
    let mut config = PacklockConfig::default();
    config.http.allow_insecure = true;
    config.modrinth.base_url = server.url();
    config
}

async fn write_lock(dir: &TempDir, content: serde_json::Value) -> PathBuf {
    let path = dir.path().join("packlock.json");
    tokio::fs::write(&path, content.to_string()).await.unwrap();
    path
}

fn empty_lock() -> serde_json::Value {
    json!({
        "targetVersions": ["1.20.1"],
        "targetLoaders": ["fabric"],
        "providerPriority": ["modrinth"],
        "projects": []
    })
}

fn version(id: &str, project_id: &str, deps: &[&str]) -> serde_json::Value {
    json!({
        "id": id,
        "project_id": project_id,
        "version_type": "release",
        "game_versions": ["1.20.1"],
        "loaders": ["fabric"],
        "files": [{
            "hashes": {"sha1": format!("{}-sha1", id)},
            "url": format!("https://cdn.modrinth.com/data/{}/versions/{}/{}.jar", project_id, id, id),
            "filename": format!("{}.jar", id),
            "primary": true
        }],
        "dependencies": deps
            .iter()
            .map(|d| json!({"project_id": d, "dependency_type": "required"}))
            .collect::<Vec<_>>()
    })
}

async fn mock_project(
    server: &mut ServerGuard,
    path: &str,
    id: &str,
    slug: &str,
    versions: serde_json::Value,
) -> (mockito::Mock, mockito::Mock) {
    let project = server
        .mock("GET", path)
        .with_status(200)
        .with_body(json!({"id": id, "slug": slug, "title": slug, "project_type": "mod"}).to_string())
        .expect(1)
        .create_async()
        .await;
    let versions = server
        .mock("GET", format!("/project/{}/version", id).as_str())
        .with_status(200)
        .with_body(versions.to_string())
        .expect(1)
        .create_async()
        .await;
    (project, versions)
}

#[tokio::test]
async fn test_add_resolves_dependencies_and_writes_lock() {
    let mut server = mockito::Server::new_async().await;
    let (sodium, sodium_versions) = mock_project(
        &mut server,
        "/project/sodium",
        "AANobbMI",
        "sodium",
        json!([version("sodium01", "AANobbMI", &["P7dR8mSH"])]),
    )
    .await;
    let (fabric_api, fabric_api_versions) = mock_project(
        &mut server,
        "/project/P7dR8mSH",
        "P7dR8mSH",
        "fabric-api",
        json!([version("fapi0001", "P7dR8mSH", &[])]),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let lock_path = write_lock(&dir, empty_lock()).await;

    let report = add_projects(&config(&server), &lock_path, &["sodium".to_string()], &AutoAccept)
        .await
        .unwrap();

    assert_eq!(
        report.requests[0].outcome,
        Outcome::Accepted(ProjectRef::new(Provider::Modrinth, "AANobbMI"))
    );
    assert_eq!(report.added.len(), 2);
    for mock in [&sodium, &sodium_versions, &fabric_api, &fabric_api_versions] {
        mock.assert_async().await;
    }

    let lock = LockState::load(&lock_path).await.unwrap();
    assert_eq!(lock.len(), 2);
    let sodium = lock
        .get(&ProjectRef::new(Provider::Modrinth, "AANobbMI"))
        .unwrap();
    assert_eq!(sodium.files.len(), 1);
    assert_eq!(sodium.files[0].file_name, "sodium01.jar");
    assert_eq!(
        lock.required_by("modrinth:P7dR8mSH").collect::<Vec<_>>(),
        vec!["modrinth:AANobbMI"]
    );
}

#[tokio::test]
async fn test_missing_project_still_writes_lock() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/project/nope")
        .with_status(404)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let lock_path = write_lock(&dir, empty_lock()).await;

    let report = add_projects(&config(&server), &lock_path, &["nope".to_string()], &AutoAccept)
        .await
        .unwrap();

    assert_eq!(
        report.requests[0].outcome,
        Outcome::Failed(ResolveError::NotFound {
            input: "nope".into()
        })
    );
    let written: serde_json::Value =
        serde_json::from_str(&tokio::fs::read_to_string(&lock_path).await.unwrap()).unwrap();
    assert_eq!(written["projects"], json!([]));
    assert_eq!(written["providerPriority"], json!(["modrinth"]));
}

#[tokio::test]
async fn test_incomplete_lock_makes_no_requests() {
    let mut server = mockito::Server::new_async().await;
    let any = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let lock_path = write_lock(
        &dir,
        json!({"targetVersions": ["1.20.1"], "providerPriority": ["modrinth"]}),
    )
    .await;

    let result = add_projects(&config(&server), &lock_path, &["sodium".to_string()], &AutoAccept).await;

    assert!(matches!(result, Err(PacklockError::Config(_))));
    any.assert_async().await;
}

#[tokio::test]
async fn test_missing_lock_file_is_config_error() {
    let server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    let result = add_projects(
        &config(&server),
        &dir.path().join("absent.json"),
        &["sodium".to_string()],
        &AutoAccept,
    )
    .await;

    assert!(matches!(result, Err(PacklockError::Config(_))));
}
