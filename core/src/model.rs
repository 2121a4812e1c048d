use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Game stores whose local installations can be discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Store {
    Steam,
    Epic,
}

impl Store {
    pub fn label(&self) -> &'static str {
        match self {
            Store::Steam => "Steam",
            Store::Epic => "Epic Games Store",
        }
    }

    /// Subdirectory of the cache root holding this store's artwork.
    pub fn image_cache_dir(&self) -> &'static str {
        match self {
            Store::Steam => "steam_images",
            Store::Epic => "epic_images",
        }
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Semantic image slot of a game record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageRole {
    Grid,
    Header,
    Icon,
}

impl ImageRole {
    pub const ALL: [ImageRole; 3] = [ImageRole::Grid, ImageRole::Header, ImageRole::Icon];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageRole::Grid => "grid",
            ImageRole::Header => "header",
            ImageRole::Icon => "icon",
        }
    }
}

/// A directory under which a store keeps installed games.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LibraryRoot(PathBuf);

impl LibraryRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Case-insensitive, separator-agnostic form used to detect duplicate roots.
    pub fn comparison_key(&self) -> String {
        comparison_key(&self.0)
    }
}

impl AsRef<Path> for LibraryRoot {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

pub(crate) fn comparison_key(path: &Path) -> String {
    let raw = dunce::simplified(path)
        .to_string_lossy()
        .replace('\\', "/");
    let absolute = raw.starts_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for part in raw.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    let key = if absolute { format!("/{joined}") } else { joined };
    key.to_lowercase()
}

/// One installed game as declared by its store manifest.
///
/// Produced by a manifest scanner and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameManifest {
    pub store: Store,
    /// Steam app id or Epic `AppName`.
    pub store_id: String,
    pub display_name: String,
    /// Relative `installdir` for Steam, absolute `InstallLocation` for Epic.
    pub install_dir: PathBuf,
    pub executable_hint: Option<String>,
    pub library_root: LibraryRoot,
    pub catalog_namespace: Option<String>,
    pub catalog_item_id: Option<String>,
    pub version: Option<String>,
    /// Steam client icon hash, when the manifest carries one.
    pub icon_hash: Option<String>,
}

impl GameManifest {
    /// Directory the game is installed in.
    pub fn install_path(&self) -> PathBuf {
        match self.store {
            Store::Steam => self
                .library_root
                .path()
                .join("steamapps")
                .join("common")
                .join(&self.install_dir),
            Store::Epic => self.install_dir.clone(),
        }
    }

    /// Store protocol URI that asks the client to start the game.
    pub fn launch_command(&self) -> Option<String> {
        if self.store_id.trim().is_empty() {
            return None;
        }
        match self.store {
            Store::Steam => Some(format!("steam://rungameid/{}", self.store_id)),
            Store::Epic => Some(format!(
                "com.epicgames.launcher://apps/{}?action=launch&silent=true",
                self.store_id
            )),
        }
    }

    /// Identifier artwork is cached under.
    pub fn cache_item_id(&self) -> &str {
        self.catalog_item_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(&self.store_id)
    }
}

/// Why a manifest file did not yield a [`GameManifest`].
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} has no `{section}` section")]
    MissingSection {
        path: PathBuf,
        section: &'static str,
    },
    #[error("{path} is missing `{field}`")]
    MissingField { path: PathBuf, field: &'static str },
    #[error("{path} is not fully installed (state {state})")]
    NotInstalled { path: PathBuf, state: String },
    #[error("{path} points at missing install location {location}")]
    MissingInstall { path: PathBuf, location: PathBuf },
}

impl ManifestError {
    /// Exclusions are expected outcomes (partial installs, DLC stubs) rather
    /// than damaged files.
    pub fn is_exclusion(&self) -> bool {
        matches!(
            self,
            ManifestError::MissingField { .. }
                | ManifestError::NotInstalled { .. }
                | ManifestError::MissingInstall { .. }
        )
    }
}

/// An unresolved pointer to a store image, as listed in catalog `keyImages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCandidate {
    #[serde(rename = "type", default)]
    pub role_hint: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl ImageCandidate {
    pub fn usable_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

/// Local files chosen for each image role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSet {
    pub grid: Option<PathBuf>,
    pub header: Option<PathBuf>,
    pub icon: Option<PathBuf>,
}

impl ImageSet {
    pub fn get(&self, role: ImageRole) -> Option<&PathBuf> {
        match role {
            ImageRole::Grid => self.grid.as_ref(),
            ImageRole::Header => self.header.as_ref(),
            ImageRole::Icon => self.icon.as_ref(),
        }
    }

    pub fn set(&mut self, role: ImageRole, value: Option<PathBuf>) {
        match role {
            ImageRole::Grid => self.grid = value,
            ImageRole::Header => self.header = value,
            ImageRole::Icon => self.icon = value,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_none() && self.header.is_none() && self.icon.is_none()
    }

    /// Cover art for a card: grid first, header otherwise.
    pub fn cover(&self) -> Option<&PathBuf> {
        self.grid.as_ref().or(self.header.as_ref())
    }
}

/// A manifest together with everything resolved for it during one pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedGame {
    pub manifest: GameManifest,
    pub executable_path: Option<PathBuf>,
    pub images: ImageSet,
    pub launch_command: Option<String>,
    pub discovered_at: DateTime<Utc>,
}

impl ResolvedGame {
    pub fn new(manifest: GameManifest, executable_path: Option<PathBuf>, images: ImageSet) -> Self {
        let launch_command = manifest.launch_command().or_else(|| {
            executable_path
                .as_ref()
                .map(|path| path.to_string_lossy().to_string())
        });
        Self {
            manifest,
            executable_path,
            images,
            launch_command,
            discovered_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum StoreStatus {
    Available { root: PathBuf },
    Unavailable,
}

/// Outcome of one discovery pass over one store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreScan {
    pub store: Store,
    pub status: StoreStatus,
    pub games: Vec<ResolvedGame>,
    pub cancelled: bool,
}

impl StoreScan {
    pub fn unavailable(store: Store) -> Self {
        Self {
            store,
            status: StoreStatus::Unavailable,
            games: Vec::new(),
            cancelled: false,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.status, StoreStatus::Available { .. })
    }
}
