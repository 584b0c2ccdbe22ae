//! Full pipeline runs against a mock GitHub API, raw CDN, and Steam store.

use std::time::Duration;
use steam_manifest::config::Endpoints;
use steam_manifest::engine::{Chooser, Engine, EngineOptions};
use steam_manifest::fetch::Fetcher;
use steam_manifest::steam_store::SearchHit;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct NoChoice;
impl Chooser for NoChoice {
    fn choose(&self, _hits: &[SearchHit]) -> Option<usize> {
        None
    }
}

fn endpoints(server: &MockServer) -> Endpoints {
    Endpoints {
        github_api: server.uri(),
        github_raw: format!("{}/raw", server.uri()),
        steam_store: format!("{}/store", server.uri()),
    }
}

fn engine(server: &MockServer, install: &std::path::Path, fixed: bool) -> Engine {
    Engine::with_fetcher(
        EngineOptions {
            token: None,
            repo_override: Some("test/repo".to_string()),
            fixed_manifests: fixed,
            endpoints: endpoints(server),
            install_dir: Some(install.to_path_buf()),
            dlc_delay: Duration::ZERO,
        },
        Fetcher::with_policy(None, 2, Duration::ZERO).unwrap(),
    )
}

async fn mount_rate_limit(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "rate": { "remaining": 4999, "reset": 1893456000 }
        })))
        .mount(server)
        .await;
}

async fn mount_branch(server: &MockServer, branch: &str, files: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/test/repo/branches/{branch}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "commit": { "commit": {
                "committer": { "date": "2024-05-01T12:00:00Z" },
                "tree": { "url": format!("{}/trees/{branch}", server.uri()) }
            }}
        })))
        .mount(server)
        .await;
    let tree: Vec<_> = files
        .iter()
        .map(|f| serde_json::json!({ "path": f }))
        .collect();
    Mock::given(method("GET"))
        .and(path(format!("/trees/{branch}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "tree": tree })))
        .mount(server)
        .await;
}

async fn mount_raw(server: &MockServer, branch: &str, file: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/raw/test/repo/{branch}/{file}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

const KEY_VDF: &str = r#"
"depots"
{
    "440" { "DecryptionKey" "ABCDEF0123456789" }
}
"#;

const APPINFO_VDF: &str = r#"
"common"
{
    "name" "Team Fortress 2"
}
"#;

#[tokio::test]
async fn test_numeric_app_without_dlc_config_queries_the_store() {
    let server = MockServer::start().await;
    let install = tempfile::tempdir().unwrap();
    std::fs::write(install.path().join("steam.exe"), b"").unwrap();

    mount_rate_limit(&server).await;
    mount_branch(&server, "440", &["key.vdf", "440_8888.manifest", "appinfo.vdf"]).await;
    mount_raw(&server, "440", "key.vdf", KEY_VDF.as_bytes()).await;
    mount_raw(&server, "440", "appinfo.vdf", APPINFO_VDF.as_bytes()).await;
    mount_raw(&server, "440", "440_8888.manifest", b"binary manifest payload").await;

    // No config.json in the tree, so the engine must consult the store.
    Mock::given(method("GET"))
        .and(path("/store/appdetails"))
        .and(query_param("appids", "440"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "440": { "success": true, "data": { "name": "Team Fortress 2" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    engine(&server, install.path(), false)
        .run("440", &NoChoice)
        .await
        .unwrap();

    let manifest = install
        .path()
        .join("config/depotcache/440_8888.manifest");
    assert_eq!(
        std::fs::read(&manifest).unwrap(),
        b"binary manifest payload"
    );

    let lua = std::fs::read_to_string(
        install.path().join("config/stplug-in/440.lua"),
    )
    .unwrap();
    assert!(lua.starts_with("-- Team Fortress 2\n"));
    assert!(lua.contains("addappid(440, 1, \"ABCDEF0123456789\")\n"));
    assert!(!lua.contains("setManifestid"));
}

#[tokio::test]
async fn test_fixed_mode_pins_manifest_ids() {
    let server = MockServer::start().await;
    let install = tempfile::tempdir().unwrap();
    std::fs::write(install.path().join("steam.exe"), b"").unwrap();

    mount_rate_limit(&server).await;
    mount_branch(&server, "730", &["730_42.manifest"]).await;
    mount_raw(&server, "730", "730_42.manifest", b"m").await;
    // Store knows nothing about this app: absence, not an error.

    engine(&server, install.path(), true)
        .run("730", &NoChoice)
        .await
        .unwrap();

    let lua = std::fs::read_to_string(
        install.path().join("config/stplug-in/730.lua"),
    )
    .unwrap();
    assert!(lua.contains("addappid(730, 1)\n"));
    assert!(lua.contains("setManifestid(730, \"42\")\n"));
}

#[tokio::test]
async fn test_dlc_config_expands_packaged_branches() {
    let server = MockServer::start().await;
    let install = tempfile::tempdir().unwrap();
    std::fs::write(install.path().join("steam.exe"), b"").unwrap();

    mount_rate_limit(&server).await;
    mount_branch(&server, "100", &["config.json", "100_1.manifest"]).await;
    mount_raw(&server, "100", "100_1.manifest", b"root").await;
    mount_raw(
        &server,
        "100",
        "config.json",
        br#"{ "dlcs": [200], "packagedlcs": [300] }"#,
    )
    .await;

    // The packaged DLC is a full branch of its own.
    mount_branch(&server, "300", &["300_7.manifest"]).await;
    mount_raw(&server, "300", "300_7.manifest", b"dlc").await;

    engine(&server, install.path(), false)
        .run("100", &NoChoice)
        .await
        .unwrap();

    let lua = std::fs::read_to_string(
        install.path().join("config/stplug-in/100.lua"),
    )
    .unwrap();
    assert!(lua.contains("addappid(100, 1)\n"));
    assert!(lua.contains("addappid(200, 1)\n"));
    assert!(lua.contains("addappid(300, 1)\n"));
    assert!(install
        .path()
        .join("config/depotcache/300_7.manifest")
        .exists());
}

#[tokio::test]
async fn test_store_catalog_dlc_list_drives_recursion() {
    let server = MockServer::start().await;
    let install = tempfile::tempdir().unwrap();
    std::fs::write(install.path().join("steam.exe"), b"").unwrap();

    mount_rate_limit(&server).await;
    mount_branch(&server, "10", &["10_1.manifest"]).await;
    mount_raw(&server, "10", "10_1.manifest", b"root").await;
    mount_branch(&server, "20", &["20_2.manifest"]).await;
    mount_raw(&server, "20", "20_2.manifest", b"dlc").await;

    // No config.json anywhere, so the root's DLC list comes from the store.
    Mock::given(method("GET"))
        .and(path("/store/appdetails"))
        .and(query_param("appids", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "10": { "success": true, "data": { "name": "Tiny Game", "dlc": [20] } }
        })))
        .mount(&server)
        .await;

    engine(&server, install.path(), false)
        .run("10", &NoChoice)
        .await
        .unwrap();

    assert!(install
        .path()
        .join("config/depotcache/20_2.manifest")
        .exists());
    let lua = std::fs::read_to_string(
        install.path().join("config/stplug-in/10.lua"),
    )
    .unwrap();
    assert!(lua.starts_with("-- Tiny Game\n"));
    assert!(lua.contains("addappid(20, 1)\n"));
}

#[tokio::test]
async fn test_dlc_store_name_never_becomes_the_header() {
    let server = MockServer::start().await;
    let install = tempfile::tempdir().unwrap();
    std::fs::write(install.path().join("steam.exe"), b"").unwrap();

    mount_rate_limit(&server).await;
    // The root ships its own DLC document, so it never asks the store.
    mount_branch(&server, "100", &["config.json", "100_1.manifest"]).await;
    mount_raw(&server, "100", "100_1.manifest", b"root").await;
    mount_raw(&server, "100", "config.json", br#"{ "packagedlcs": [300] }"#).await;

    // The packaged DLC lacks one, so its catalog lookup does run.
    mount_branch(&server, "300", &["300_7.manifest"]).await;
    mount_raw(&server, "300", "300_7.manifest", b"dlc").await;
    Mock::given(method("GET"))
        .and(path("/store/appdetails"))
        .and(query_param("appids", "300"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "300": { "success": true, "data": { "name": "The DLC Pack" } }
        })))
        .mount(&server)
        .await;

    engine(&server, install.path(), false)
        .run("100", &NoChoice)
        .await
        .unwrap();

    // The root app discovered no name of its own: no header at all, and
    // certainly not the DLC's.
    let lua = std::fs::read_to_string(
        install.path().join("config/stplug-in/100.lua"),
    )
    .unwrap();
    assert!(!lua.contains("The DLC Pack"));
    assert!(lua.starts_with("addappid(100, 1)\n"));
}

#[tokio::test]
async fn test_missing_root_branch_is_fatal() {
    let server = MockServer::start().await;
    let install = tempfile::tempdir().unwrap();
    std::fs::write(install.path().join("steam.exe"), b"").unwrap();

    mount_rate_limit(&server).await;
    // No branch mocks at all: every repository candidate misses.

    let err = engine(&server, install.path(), false)
        .run("999", &NoChoice)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no repository"));
}

#[tokio::test]
async fn test_cached_manifest_is_not_redownloaded() {
    let server = MockServer::start().await;
    let install = tempfile::tempdir().unwrap();
    std::fs::write(install.path().join("steam.exe"), b"").unwrap();
    let cache = install.path().join("config/depotcache");
    std::fs::create_dir_all(&cache).unwrap();
    std::fs::write(cache.join("50_5.manifest"), b"already here").unwrap();

    mount_rate_limit(&server).await;
    mount_branch(&server, "50", &["50_5.manifest"]).await;
    // Deliberately no raw mock: a download attempt would 404 but the
    // pre-seeded file must short-circuit before any request.

    engine(&server, install.path(), false)
        .run("50", &NoChoice)
        .await
        .unwrap();

    assert_eq!(
        std::fs::read(cache.join("50_5.manifest")).unwrap(),
        b"already here"
    );
}
