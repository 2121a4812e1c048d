use super::catalog::EpicCatalog;
use super::heuristic::{ImageHeuristic, ScoredFile};
use crate::cache::{CacheKey, ImageCache};
use crate::config::{DiscoveryConfig, EpicOptions};
use crate::http::{FetchError, HttpFetcher};
use crate::model::{GameManifest, ImageCandidate, ImageRole, ImageSet, Store};
use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Source URL chosen for each role from a `keyImages` list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleUrls {
    pub grid: Option<String>,
    pub header: Option<String>,
    pub icon: Option<String>,
}

impl RoleUrls {
    pub fn get(&self, role: ImageRole) -> Option<&str> {
        match role {
            ImageRole::Grid => self.grid.as_deref(),
            ImageRole::Header => self.header.as_deref(),
            ImageRole::Icon => self.icon.as_deref(),
        }
    }
}

/// Ranked `keyImages` types per role.
#[derive(Debug, Clone)]
struct RolePreferences {
    grid: Vec<String>,
    header: Vec<String>,
    icon: Vec<String>,
}

impl RolePreferences {
    fn from_options(options: &EpicOptions) -> Self {
        Self {
            grid: options.grid_image_types.clone(),
            header: options.header_image_types.clone(),
            icon: options.icon_image_types.clone(),
        }
    }

    fn for_role(&self, role: ImageRole) -> &[String] {
        match role {
            ImageRole::Grid => &self.grid,
            ImageRole::Header => &self.header,
            ImageRole::Icon => &self.icon,
        }
    }
}

/// Artwork resolution for Epic apps.
///
/// Images are looked up in the catalog by item id, then by offer search over
/// title variants, then by product search. Selected URLs are downloaded into
/// the `epic_images` cache. When nothing at all could be downloaded, scored
/// local files are copied in instead. A last pass retries every empty role
/// with the URLs chosen for the other roles.
#[derive(Debug, Clone)]
pub struct EpicArtwork {
    catalog: EpicCatalog,
    http: HttpFetcher,
    cache: ImageCache,
    heuristic: ImageHeuristic,
    preferences: RolePreferences,
    image_timeout: Duration,
}

impl EpicArtwork {
    pub fn new(config: &DiscoveryConfig, http: HttpFetcher, cache_root: &Path) -> Self {
        Self {
            catalog: EpicCatalog::new(&config.epic, http.clone(), config.network.api_timeout()),
            http,
            cache: ImageCache::for_store(cache_root, Store::Epic),
            heuristic: ImageHeuristic::new(
                &config.heuristics,
                config.epic.local_image_dirs.clone(),
            ),
            preferences: RolePreferences::from_options(&config.epic),
            image_timeout: config.network.image_timeout(),
        }
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub async fn resolve(&self, manifest: &GameManifest) -> ImageSet {
        let item_id = manifest.cache_item_id().trim().to_string();
        let mut images = ImageSet::default();
        if item_id.is_empty() {
            return images;
        }

        let candidates = self.lookup_candidates(manifest).await;
        let urls = self.select_urls(&candidates);

        images.header = self.download(&item_id, "header", urls.header.as_deref()).await;
        images.icon = self.download(&item_id, "icon", urls.icon.as_deref()).await;
        images.grid = match self.download(&item_id, "grid", urls.grid.as_deref()).await {
            Some(path) => Some(path),
            None => self.download(&item_id, "grid", urls.header.as_deref()).await,
        };
        if images.header.is_none() {
            images.header = self.download(&item_id, "header", urls.grid.as_deref()).await;
        }

        if images.is_empty() {
            self.apply_local_files(manifest, &item_id, &mut images).await;
        }

        for role in ImageRole::ALL {
            if images.get(role).is_some() {
                continue;
            }
            for other in ImageRole::ALL.into_iter().filter(|other| *other != role) {
                let retried = self.download(&item_id, role.as_str(), urls.get(other)).await;
                if retried.is_some() {
                    images.set(role, retried);
                    break;
                }
            }
        }

        images
    }

    /// Catalog item, then offer search, then product search.
    pub async fn lookup_candidates(&self, manifest: &GameManifest) -> Vec<ImageCandidate> {
        let namespace = manifest
            .catalog_namespace
            .as_deref()
            .filter(|value| !value.trim().is_empty());
        let item_id = manifest
            .catalog_item_id
            .as_deref()
            .filter(|value| !value.trim().is_empty());

        if let (Some(namespace), Some(item_id)) = (namespace, item_id) {
            let images = self.catalog.item_images(namespace, item_id).await;
            if !images.is_empty() {
                return images;
            }
        }

        let title = search_title(manifest);
        let images = self.catalog.search_offers(title, &manifest.store_id).await;
        if !images.is_empty() {
            return images;
        }
        self.catalog.search_products(title).await
    }

    pub fn select_urls(&self, candidates: &[ImageCandidate]) -> RoleUrls {
        let pick = |role: ImageRole| {
            select_url(candidates, self.preferences.for_role(role)).map(str::to_string)
        };
        RoleUrls {
            grid: pick(ImageRole::Grid),
            header: pick(ImageRole::Header),
            icon: pick(ImageRole::Icon),
        }
    }

    async fn download(&self, item_id: &str, suffix: &str, url: Option<&str>) -> Option<PathBuf> {
        let url = url?;
        let key = CacheKey::new(item_id, suffix, extension_for_url(url));
        self.cache
            .get_or_fetch(&key, || self.http.bytes(url, self.image_timeout))
            .await
    }

    async fn apply_local_files(
        &self,
        manifest: &GameManifest,
        item_id: &str,
        images: &mut ImageSet,
    ) {
        let heuristic = self.heuristic.clone();
        let owned = manifest.clone();
        let ranked = match tokio::task::spawn_blocking(move || heuristic.rank(&owned)).await {
            Ok(ranked) => ranked,
            Err(err) => {
                warn!("local artwork search for {} failed: {}", manifest.store_id, err);
                return;
            }
        };

        let Some(best) = ranked.first() else {
            debug!("no local artwork for {}", manifest.store_id);
            return;
        };
        if images.grid.is_none() {
            images.grid = self.copy_local(best, item_id, "grid_local").await;
        }
        if images.header.is_none() {
            images.header = self.copy_local(best, item_id, "header_local").await;
        }
        if images.icon.is_none() {
            if let Some(small) = self.heuristic.icon_candidate(&ranked) {
                images.icon = self.copy_local(small, item_id, "icon_local").await;
            }
        }
    }

    async fn copy_local(&self, file: &ScoredFile, item_id: &str, suffix: &str) -> Option<PathBuf> {
        let key = CacheKey::new(item_id, suffix, file.extension());
        let source = file.path.clone();
        self.cache
            .get_or_fetch(&key, || async move {
                tokio::task::spawn_blocking(move || fs::read(&source))
                    .await
                    .unwrap_or_else(|err| Err(io::Error::new(io::ErrorKind::Other, err)))
                    .map_err(FetchError::from)
            })
            .await
    }
}

/// Title used for searches: the display name, else the app name.
fn search_title(manifest: &GameManifest) -> &str {
    let display = manifest.display_name.trim();
    if display.is_empty() {
        manifest.store_id.trim()
    } else {
        display
    }
}

/// First URL whose type ranks highest in `preferred`, else the first usable URL.
pub fn select_url<'a>(candidates: &'a [ImageCandidate], preferred: &[String]) -> Option<&'a str> {
    preferred
        .iter()
        .find_map(|wanted| {
            candidates
                .iter()
                .filter(|candidate| candidate.role_hint == *wanted)
                .find_map(ImageCandidate::usable_url)
        })
        .or_else(|| candidates.iter().find_map(ImageCandidate::usable_url))
}

fn extension_for_url(url: &str) -> &'static str {
    if url.contains(".jpg") || url.contains(".jpeg") {
        "jpg"
    } else {
        "png"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LibraryRoot;
    use serde_json::json;
    use std::time::Instant;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candidate(kind: &str, url: &str) -> ImageCandidate {
        ImageCandidate {
            role_hint: kind.into(),
            url: Some(url.into()),
        }
    }

    fn manifest(install: &Path, namespace: Option<&str>, item_id: Option<&str>) -> GameManifest {
        GameManifest {
            store: Store::Epic,
            store_id: "Sugar".into(),
            display_name: "Hades".into(),
            install_dir: install.to_path_buf(),
            executable_hint: None,
            library_root: LibraryRoot::new(install),
            catalog_namespace: namespace.map(str::to_string),
            catalog_item_id: item_id.map(str::to_string),
            version: None,
            icon_hash: None,
        }
    }

    fn config(base: &str, local_dirs: Vec<PathBuf>) -> DiscoveryConfig {
        let mut config = DiscoveryConfig::default();
        config.epic.catalog_base_url = base.to_string();
        config.epic.store_content_base_url = base.to_string();
        config.epic.local_image_dirs = local_dirs;
        config.network.api_timeout_secs = 1;
        config.network.image_timeout_secs = 1;
        config
    }

    fn artwork(config: &DiscoveryConfig, cache_root: &Path) -> EpicArtwork {
        let http = HttpFetcher::new(&config.network).unwrap();
        EpicArtwork::new(config, http, cache_root)
    }

    #[test]
    fn ranked_type_wins_over_list_order() {
        let candidates = vec![
            candidate("Screenshot", "https://img/shot.jpg"),
            candidate("DieselGameBox", ""),
            candidate("OfferImageWide", "https://img/wide.jpg"),
            candidate("DieselGameBoxWide", "https://img/boxwide.jpg"),
        ];
        let preferred = EpicOptions::default().grid_image_types;
        assert_eq!(select_url(&candidates, &preferred), Some("https://img/boxwide.jpg"));

        let icon_types = EpicOptions::default().icon_image_types;
        assert_eq!(select_url(&candidates, &icon_types), Some("https://img/shot.jpg"));
        assert_eq!(select_url(&[], &icon_types), None);
    }

    #[test]
    fn url_extension_detection() {
        assert_eq!(extension_for_url("https://cdn/a/b.JPEG"), "png");
        assert_eq!(extension_for_url("https://cdn/a/b.jpeg?h=1"), "jpg");
        assert_eq!(extension_for_url("https://cdn/a/b.jpg"), "jpg");
        assert_eq!(extension_for_url("https://cdn/a/b"), "png");
    }

    #[tokio::test]
    async fn offline_item_without_catalog_ids_resolves_nothing() {
        let cache_root = tempdir().unwrap();
        let install = tempdir().unwrap();
        let config = config("http://127.0.0.1:9", Vec::new());
        let artwork = artwork(&config, cache_root.path());

        let started = Instant::now();
        let images = artwork.resolve(&manifest(install.path(), None, None)).await;
        assert!(images.is_empty());
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn catalog_images_are_downloaded_per_role() {
        let server = MockServer::start().await;
        let base = server.uri();
        Mock::given(method("GET"))
            .and(path("/catalog/api/shared/namespace/min/bulk/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "abc": {"keyImages": [
                    {"type": "DieselGameBox", "url": format!("{base}/img/box.jpg")},
                    {"type": "DieselGameBoxWide", "url": format!("{base}/img/wide.jpg")},
                    {"type": "Thumbnail", "url": format!("{base}/img/thumb.png")}
                ]}
            })))
            .mount(&server)
            .await;
        for file in ["box.jpg", "wide.jpg", "thumb.png"] {
            Mock::given(method("GET"))
                .and(path(format!("/img/{file}")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(file.as_bytes().to_vec()))
                .mount(&server)
                .await;
        }

        let cache_root = tempdir().unwrap();
        let install = tempdir().unwrap();
        let artwork = artwork(&config(&base, Vec::new()), cache_root.path());
        let images = artwork
            .resolve(&manifest(install.path(), Some("min"), Some("abc")))
            .await;

        let dir = cache_root.path().join("epic_images");
        assert_eq!(images.grid, Some(dir.join("abc_grid.jpg")));
        assert_eq!(images.header, Some(dir.join("abc_header.jpg")));
        assert_eq!(images.icon, Some(dir.join("abc_icon.png")));
        assert_eq!(fs::read(dir.join("abc_header.jpg")).unwrap(), b"wide.jpg");
    }

    #[tokio::test]
    async fn failed_grid_download_falls_back_to_header_url() {
        let server = MockServer::start().await;
        let base = server.uri();
        Mock::given(method("GET"))
            .and(path("/catalog/api/shared/namespace/min/bulk/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "abc": {"keyImages": [
                    {"type": "DieselGameBox", "url": format!("{base}/img/missing.jpg")},
                    {"type": "OfferImageWide", "url": format!("{base}/img/wide.jpg")}
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/wide.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"wide".to_vec()))
            .mount(&server)
            .await;

        let cache_root = tempdir().unwrap();
        let install = tempdir().unwrap();
        let artwork = artwork(&config(&base, Vec::new()), cache_root.path());
        let images = artwork
            .resolve(&manifest(install.path(), Some("min"), Some("abc")))
            .await;

        let dir = cache_root.path().join("epic_images");
        assert_eq!(images.grid, Some(dir.join("abc_grid.jpg")));
        assert_eq!(fs::read(dir.join("abc_grid.jpg")).unwrap(), b"wide");
        assert_eq!(images.header, Some(dir.join("abc_header.jpg")));
        // icon had no ranked type; it takes the first usable URL, which 404s,
        // then the last pass retries it with the header URL
        assert_eq!(images.icon, Some(dir.join("abc_icon.jpg")));
    }

    #[tokio::test]
    async fn failed_header_download_falls_back_to_grid_url() {
        let server = MockServer::start().await;
        let base = server.uri();
        Mock::given(method("GET"))
            .and(path("/catalog/api/shared/namespace/min/bulk/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "abc": {"keyImages": [
                    {"type": "DieselGameBox", "url": format!("{base}/img/box.jpg")},
                    {"type": "OfferImageWide", "url": format!("{base}/img/gone.jpg")},
                    {"type": "Thumbnail", "url": format!("{base}/img/thumb.png")}
                ]}
            })))
            .mount(&server)
            .await;
        for file in ["box.jpg", "thumb.png"] {
            Mock::given(method("GET"))
                .and(path(format!("/img/{file}")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(file.as_bytes().to_vec()))
                .mount(&server)
                .await;
        }

        let cache_root = tempdir().unwrap();
        let install = tempdir().unwrap();
        let artwork = artwork(&config(&base, Vec::new()), cache_root.path());
        let images = artwork
            .resolve(&manifest(install.path(), Some("min"), Some("abc")))
            .await;

        let dir = cache_root.path().join("epic_images");
        assert_eq!(images.header, Some(dir.join("abc_header.jpg")));
        assert_eq!(fs::read(dir.join("abc_header.jpg")).unwrap(), b"box.jpg");
        assert_eq!(images.grid, Some(dir.join("abc_grid.jpg")));
        assert_eq!(images.icon, Some(dir.join("abc_icon.png")));
    }

    #[tokio::test]
    async fn local_files_fill_in_when_nothing_downloads() {
        let cache_root = tempdir().unwrap();
        let install = tempdir().unwrap();
        fs::write(install.path().join("cover.jpg"), vec![1u8; 200_000]).unwrap();
        fs::write(install.path().join("box.png"), vec![2u8; 60_000]).unwrap();

        let config = config("http://127.0.0.1:9", Vec::new());
        let artwork = artwork(&config, cache_root.path());
        let images = artwork
            .resolve(&manifest(install.path(), None, Some("abc")))
            .await;

        let dir = cache_root.path().join("epic_images");
        assert_eq!(images.grid, Some(dir.join("abc_grid_local.jpg")));
        assert_eq!(images.header, Some(dir.join("abc_header_local.jpg")));
        assert_eq!(images.icon, Some(dir.join("abc_icon_local.png")));
        assert_eq!(fs::read(dir.join("abc_icon_local.png")).unwrap().len(), 60_000);
    }
}
