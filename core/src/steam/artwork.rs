use crate::cache::{CacheKey, ImageCache};
use crate::config::DiscoveryConfig;
use crate::http::HttpFetcher;
use crate::model::{GameManifest, ImageRole, ImageSet, Store};
use log::debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-role file names: Steam client cache, public CDN, our cache extension.
struct RoleFiles {
    client_suffix: &'static str,
    cdn_file: &'static str,
    extension: &'static str,
}

fn role_files(role: ImageRole) -> RoleFiles {
    match role {
        ImageRole::Grid => RoleFiles {
            client_suffix: "library_600x900.jpg",
            cdn_file: "library_600x900.jpg",
            extension: "jpg",
        },
        ImageRole::Header => RoleFiles {
            client_suffix: "header.jpg",
            cdn_file: "header.jpg",
            extension: "jpg",
        },
        ImageRole::Icon => RoleFiles {
            client_suffix: "icon.jpg",
            cdn_file: "logo.png",
            extension: "png",
        },
    }
}

/// Two-tier artwork lookup for Steam apps: local caches, then the CDN.
#[derive(Debug, Clone)]
pub struct SteamArtwork {
    http: HttpFetcher,
    cache: ImageCache,
    client_cache: Option<PathBuf>,
    cdn_base_url: String,
    timeout: Duration,
}

impl SteamArtwork {
    pub fn new(
        config: &DiscoveryConfig,
        http: HttpFetcher,
        cache_root: &Path,
        steam_root: Option<&Path>,
    ) -> Self {
        let client_cache = steam_root
            .filter(|_| config.steam.use_client_cache)
            .map(|root| root.join("appcache").join("librarycache"));
        Self {
            http,
            cache: ImageCache::for_store(cache_root, Store::Steam),
            client_cache,
            cdn_base_url: config.steam.cdn_base_url.trim_end_matches('/').to_string(),
            timeout: config.network.cdn_timeout(),
        }
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub async fn resolve(&self, manifest: &GameManifest) -> ImageSet {
        let mut images = ImageSet::default();
        let app_id = manifest.store_id.trim();
        if app_id.is_empty() {
            return images;
        }
        let hashed_icon = manifest
            .icon_hash
            .as_deref()
            .and_then(|hash| self.client_icon(app_id, hash));
        for role in ImageRole::ALL {
            let resolved = match (role, &hashed_icon) {
                (ImageRole::Icon, Some(icon)) => Some(icon.clone()),
                _ => self.resolve_role(app_id, role).await,
            };
            images.set(role, resolved);
        }
        images
    }

    pub async fn resolve_role(&self, app_id: &str, role: ImageRole) -> Option<PathBuf> {
        if let Some(hit) = self.client_cached(app_id, role) {
            return Some(hit);
        }

        let files = role_files(role);
        let key = CacheKey::new(app_id, role.as_str(), files.extension);
        let url = self.cdn_url(app_id, role);
        let resolved = self
            .cache
            .get_or_fetch(&key, || self.http.bytes(&url, self.timeout))
            .await;
        if resolved.is_none() {
            debug!("no {} artwork for app {}", role.as_str(), app_id);
        }
        resolved
    }

    pub fn cdn_url(&self, app_id: &str, role: ImageRole) -> String {
        format!("{}/{}/{}", self.cdn_base_url, app_id, role_files(role).cdn_file)
    }

    /// Artwork the Steam client already downloaded for its own library view.
    pub fn client_cached(&self, app_id: &str, role: ImageRole) -> Option<PathBuf> {
        let dir = self.client_cache.as_ref()?;
        let path = dir.join(format!("{}_{}", app_id, role_files(role).client_suffix));
        path.is_file().then_some(path)
    }

    /// The app's own icon, stored by newer clients as `{appid}/{icon hash}.jpg`.
    pub fn client_icon(&self, app_id: &str, icon_hash: &str) -> Option<PathBuf> {
        let hash = icon_hash.trim();
        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let path = self
            .client_cache
            .as_ref()?
            .join(app_id)
            .join(format!("{}.jpg", hash));
        path.is_file().then_some(path)
    }
}
