//! End-to-end discovery tests over fixture store layouts.
//!
//! Each test builds a throwaway Steam and/or Epic installation with
//! `tempfile`, serves CDN and catalog endpoints from `wiremock`, and runs a
//! full pass through `GameLibrary`.

use game_library_core::{
    DiscoveryConfig, GameLibrary, LibraryRoot, RegistryHive, ScanOptions, StaticRegistry, Store,
    StoreLocator, StoreStatus, SteamScanner,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn vdf_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "\\\\")
}

fn write_app_manifest(library: &Path, appid: &str, name: &str, state: &str) {
    let steamapps = library.join("steamapps");
    fs::create_dir_all(&steamapps).unwrap();
    let body = format!(
        r#""AppState"
{{
    "appid"         "{appid}"
    "Universe"      "1"
    "name"          "{name}"
    "StateFlags"    "{state}"
    "installdir"    "{name}"
    "LastUpdated"   "1700000000"
    "UserConfig"
    {{
        "language"  "english"
    }}
}}
"#
    );
    fs::write(steamapps.join(format!("appmanifest_{appid}.acf")), body).unwrap();
}

fn base_config(cache: &Path, server: &MockServer) -> DiscoveryConfig {
    let mut config = DiscoveryConfig::default();
    config.cache_root = Some(cache.to_path_buf());
    config.steam.cdn_base_url = server.uri();
    config.epic.catalog_base_url = server.uri();
    config.epic.store_content_base_url = server.uri();
    config.epic.manifest_dirs = Vec::new();
    config.epic.local_image_dirs = Vec::new();
    config.network.api_timeout_secs = 2;
    config.network.cdn_timeout_secs = 2;
    config.network.image_timeout_secs = 2;
    config
}

fn library(config: DiscoveryConfig, registry: StaticRegistry) -> GameLibrary {
    let locator = StoreLocator::new(Arc::new(registry), None, &config);
    GameLibrary::with_locator(config, locator).expect("library")
}

#[test]
fn scan_returns_only_the_fully_installed_manifest() {
    let root = TempDir::new().unwrap();
    write_app_manifest(root.path(), "620", "Portal 2", "4");
    write_app_manifest(root.path(), "400", "Portal", "1026");

    let games = SteamScanner::new().scan(&[LibraryRoot::new(root.path())]);
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].store_id, "620");
    assert_eq!(games[0].display_name, "Portal 2");
    assert_eq!(games[0].install_dir, Path::new("Portal 2"));
}

#[tokio::test]
async fn steam_pass_resolves_executable_and_cdn_artwork() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/620/library_600x900.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"grid-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/620/header.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"header-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let steam_root = TempDir::new().unwrap();
    let second_library = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();

    fs::create_dir_all(steam_root.path().join("steamapps")).unwrap();
    fs::write(
        steam_root.path().join("steamapps").join("libraryfolders.vdf"),
        format!(
            "\"libraryfolders\"\n{{\n\t\"0\"\n\t{{\n\t\t\"path\"\t\t\"{}\"\n\t}}\n\
             \t\"1\"\n\t{{\n\t\t\"path\"\t\t\"{}\"\n\t}}\n}}\n",
            vdf_path(steam_root.path()),
            vdf_path(second_library.path())
        ),
    )
    .unwrap();
    write_app_manifest(steam_root.path(), "70", "Half-Life", "6");
    write_app_manifest(second_library.path(), "620", "Portal 2", "4");

    let install = second_library.path().join("steamapps").join("common").join("Portal 2");
    fs::create_dir_all(&install).unwrap();
    fs::write(install.join("setup.exe"), b"MZ").unwrap();
    fs::write(install.join("portal2.exe"), b"MZ").unwrap();

    let mut config = base_config(cache.path(), &server);
    config.steam.install_path = Some(steam_root.path().to_path_buf());
    let library = library(config, StaticRegistry::new());

    for _ in 0..2 {
        let scan = library.discover(Store::Steam, &ScanOptions::default()).await;
        assert_eq!(
            scan.status,
            StoreStatus::Available {
                root: steam_root.path().to_path_buf()
            }
        );
        assert!(!scan.cancelled);
        assert_eq!(scan.games.len(), 1);

        let game = &scan.games[0];
        assert_eq!(game.manifest.store_id, "620");
        assert_eq!(game.manifest.library_root, LibraryRoot::new(second_library.path()));
        assert_eq!(game.executable_path, Some(install.join("portal2.exe")));
        assert_eq!(game.launch_command.as_deref(), Some("steam://rungameid/620"));

        let images_dir = cache.path().join("steam_images");
        assert_eq!(game.images.grid, Some(images_dir.join("620_grid.jpg")));
        assert_eq!(game.images.header, Some(images_dir.join("620_header.jpg")));
        assert!(game.images.icon.is_none());
    }

    assert_eq!(
        fs::read(cache.path().join("steam_images").join("620_grid.jpg")).unwrap(),
        b"grid-bytes"
    );
}

#[tokio::test]
async fn epic_pass_uses_catalog_and_borrows_steam_art_when_catalog_is_empty() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/catalog/api/shared/namespace/min/bulk/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "abc": {"keyImages": [
                {"type": "DieselGameBoxTall", "url": format!("{base}/art/tall.jpg")},
                {"type": "Thumbnail", "url": format!("{base}/art/thumb.png")}
            ]}
        })))
        .mount(&server)
        .await;
    for file in ["tall.jpg", "thumb.png"] {
        Mock::given(method("GET"))
            .and(path(format!("/art/{file}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(file.as_bytes().to_vec()))
            .mount(&server)
            .await;
    }

    let epic_data = TempDir::new().unwrap();
    let manifests = epic_data.path().join("Manifests");
    fs::create_dir_all(&manifests).unwrap();
    let catalogued_install = TempDir::new().unwrap();
    let bare_install = TempDir::new().unwrap();
    fs::write(catalogued_install.path().join("Hades.exe"), b"MZ").unwrap();

    fs::write(
        manifests.join("A.item"),
        serde_json::json!({
            "AppName": "Sugar",
            "DisplayName": "Hades",
            "InstallLocation": catalogued_install.path().to_string_lossy(),
            "LaunchExecutable": "Hades.exe",
            "CatalogNamespace": "min",
            "CatalogItemId": "abc"
        })
        .to_string(),
    )
    .unwrap();
    fs::write(
        manifests.join("B.item"),
        serde_json::json!({
            "AppName": "Robin",
            "DisplayName": "Celeste",
            "InstallLocation": bare_install.path().to_string_lossy()
        })
        .to_string(),
    )
    .unwrap();

    let steam_root = TempDir::new().unwrap();
    write_app_manifest(steam_root.path(), "504230", "Celeste", "4");
    let library_cache = steam_root.path().join("appcache").join("librarycache");
    fs::create_dir_all(&library_cache).unwrap();
    fs::write(library_cache.join("504230_library_600x900.jpg"), b"steam-grid").unwrap();
    fs::write(library_cache.join("504230_header.jpg"), b"steam-header").unwrap();

    let cache = TempDir::new().unwrap();
    let mut config = base_config(cache.path(), &server);
    config.steam.install_path = Some(steam_root.path().to_path_buf());
    let registry = StaticRegistry::new().with(
        RegistryHive::LocalMachine,
        "SOFTWARE\\WOW6432Node\\Epic Games\\EpicGamesLauncher",
        "AppDataPath",
        epic_data.path().to_string_lossy(),
    );
    let library = library(config, registry);

    let scan = library.discover(Store::Epic, &ScanOptions::default()).await;
    assert_eq!(scan.status, StoreStatus::Available { root: manifests.clone() });
    assert_eq!(scan.games.len(), 2);

    let hades = &scan.games[0];
    let epic_images = cache.path().join("epic_images");
    assert_eq!(hades.manifest.store_id, "Sugar");
    assert_eq!(hades.executable_path, Some(catalogued_install.path().join("Hades.exe")));
    assert_eq!(
        hades.launch_command.as_deref(),
        Some("com.epicgames.launcher://apps/Sugar?action=launch&silent=true")
    );
    assert_eq!(hades.images.grid, Some(epic_images.join("abc_grid.jpg")));
    assert_eq!(hades.images.header, Some(epic_images.join("abc_header.jpg")));
    assert_eq!(hades.images.icon, Some(epic_images.join("abc_icon.png")));

    let celeste = &scan.games[1];
    assert_eq!(celeste.manifest.store_id, "Robin");
    assert!(celeste.executable_path.is_none());
    assert_eq!(
        celeste.images.grid,
        Some(library_cache.join("504230_library_600x900.jpg"))
    );
    assert_eq!(celeste.images.header, Some(library_cache.join("504230_header.jpg")));
    assert!(celeste.images.icon.is_none());
}

#[tokio::test]
async fn no_store_installed_is_reported_as_unavailable() {
    let server = MockServer::start().await;
    let cache = TempDir::new().unwrap();
    let library = library(base_config(cache.path(), &server), StaticRegistry::new());

    for store in [Store::Steam, Store::Epic] {
        let scan = library.discover(store, &ScanOptions::default()).await;
        assert_eq!(scan.status, StoreStatus::Unavailable);
        assert!(scan.games.is_empty());
    }
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
