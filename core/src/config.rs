//! Configuration for library discovery and artwork resolution.
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkOptions {
    /// Timeout for catalog and search API calls.
    pub api_timeout_secs: u64,
    /// Timeout for Steam CDN image downloads.
    pub cdn_timeout_secs: u64,
    /// Timeout for Epic image downloads.
    pub image_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            api_timeout_secs: 10,
            cdn_timeout_secs: 10,
            image_timeout_secs: 15,
            user_agent: format!("game-library/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl NetworkOptions {
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn cdn_timeout(&self) -> Duration {
        Duration::from_secs(self.cdn_timeout_secs)
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SteamOptions {
    /// Install root used instead of registry and default-path lookup.
    pub install_path: Option<PathBuf>,
    pub cdn_base_url: String,
    /// Consult the client's own `appcache/librarycache` before downloading.
    pub use_client_cache: bool,
}

impl Default for SteamOptions {
    fn default() -> Self {
        Self {
            install_path: None,
            cdn_base_url: "https://cdn.cloudflare.steamstatic.com/steam/apps".into(),
            use_client_cache: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EpicOptions {
    /// Launcher data directory used instead of registry lookup.
    pub install_path: Option<PathBuf>,
    /// Manifest folders tried when the registry gives no data path.
    pub manifest_dirs: Vec<PathBuf>,
    pub catalog_base_url: String,
    pub store_content_base_url: String,
    pub search_locales: Vec<String>,
    pub product_locale: String,
    pub country: String,
    /// Launcher image caches searched by the local fallback.
    pub local_image_dirs: Vec<PathBuf>,
    pub grid_image_types: Vec<String>,
    pub header_image_types: Vec<String>,
    pub icon_image_types: Vec<String>,
}

impl Default for EpicOptions {
    fn default() -> Self {
        Self {
            install_path: None,
            manifest_dirs: vec![PathBuf::from(
                "C:/ProgramData/Epic/EpicGamesLauncher/Data/Manifests",
            )],
            catalog_base_url: "https://catalog-public-service-prod06.ol.epicgames.com".into(),
            store_content_base_url: "https://store-content-public-service-prod06.ol.epicgames.com"
                .into(),
            search_locales: vec!["en-US".into(), "es-ES".into()],
            product_locale: "en-US".into(),
            country: "US".into(),
            local_image_dirs: vec![
                PathBuf::from("C:/ProgramData/Epic/EpicGamesLauncher/Data/Images/CatalogImages"),
                PathBuf::from("C:/ProgramData/Epic/EpicGamesLauncher/Data/Images/ManifestImages"),
            ],
            grid_image_types: strings(&[
                "DieselGameBox",
                "DieselGameBoxWide",
                "OfferImageWide",
                "OfferImageTall",
                "Screenshot",
                "Featured",
            ]),
            header_image_types: strings(&["DieselGameBoxWide", "OfferImageWide", "Featured"]),
            icon_image_types: strings(&["Thumbnail", "DieselSmallBox", "Logo"]),
        }
    }
}

/// Declarative tables and thresholds behind the file heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeuristicOptions {
    /// Substrings that disqualify an executable file name.
    pub excluded_executable_terms: Vec<String>,
    pub executable_extensions: Vec<String>,
    /// Words that suggest a file is cover art.
    pub image_name_hints: Vec<String>,
    pub image_extensions: Vec<String>,
    /// Install-tree images at or below this size are ignored.
    pub min_install_image_bytes: u64,
    pub large_image_bytes: u64,
    pub medium_image_bytes: u64,
    /// Icon candidates must be smaller than this.
    pub max_icon_bytes: u64,
    /// Cached icons narrower or shorter than this are treated as corrupt.
    pub min_icon_pixels: u32,
}

impl Default for HeuristicOptions {
    fn default() -> Self {
        Self {
            excluded_executable_terms: strings(&[
                "unins", "crash", "report", "launcher", "setup", "config", "redist",
            ]),
            executable_extensions: strings(&["exe"]),
            image_name_hints: strings(&[
                "cover", "splash", "header", "art", "poster", "box", "wide",
            ]),
            image_extensions: strings(&["jpg", "jpeg", "png"]),
            min_install_image_bytes: 50_000,
            large_image_bytes: 150_000,
            medium_image_bytes: 80_000,
            max_icon_bytes: 120_000,
            min_icon_pixels: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscoveryConfig {
    /// Root of the on-disk caches; `~/.game_library` when unset.
    pub cache_root: Option<PathBuf>,
    pub network: NetworkOptions,
    pub steam: SteamOptions,
    pub epic: EpicOptions,
    pub heuristics: HeuristicOptions,
    /// Games resolved at the same time within one pass.
    pub max_concurrent_resolutions: usize,
    /// Borrow Steam artwork for Epic games that end up without a cover.
    pub cross_store_artwork: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            cache_root: None,
            network: NetworkOptions::default(),
            steam: SteamOptions::default(),
            epic: EpicOptions::default(),
            heuristics: HeuristicOptions::default(),
            max_concurrent_resolutions: 4,
            cross_store_artwork: true,
        }
    }
}

impl DiscoveryConfig {
    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Applies `STEAM_PATH` and `GAME_LIBRARY_CACHE` from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(path) = non_empty("STEAM_PATH") {
            self.steam.install_path = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty("GAME_LIBRARY_CACHE") {
            self.cache_root = Some(PathBuf::from(path));
        }
    }

    pub fn resolved_cache_root(&self) -> Option<PathBuf> {
        self.cache_root
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".game_library")))
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
