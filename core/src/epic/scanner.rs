use crate::model::{GameManifest, LibraryRoot, ManifestError, Store};
use log::{debug, warn};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const MANIFEST_EXTENSION: &str = "item";

/// Reads the launcher's `*.item` manifests into [`GameManifest`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct EpicScanner;

impl EpicScanner {
    pub fn new() -> Self {
        Self
    }

    pub fn scan(&self, folder: &Path) -> Vec<GameManifest> {
        let mut games = Vec::new();
        for path in self.manifest_files(folder) {
            match self.parse_manifest(&path, folder) {
                Ok(manifest) => games.push(manifest),
                Err(err) if err.is_exclusion() => debug!("excluded: {}", err),
                Err(err) => warn!("skipping manifest: {}", err),
            }
        }
        games
    }

    pub fn manifest_files(&self, folder: &Path) -> Vec<PathBuf> {
        let entries = match fs::read_dir(folder) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("cannot list {}: {}", folder.to_string_lossy(), err);
                return Vec::new();
            }
        };
        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .map(|ext| ext.eq_ignore_ascii_case(MANIFEST_EXTENSION))
                        .unwrap_or(false)
            })
            .collect();
        files.sort();
        files
    }

    pub fn parse_manifest(
        &self,
        path: &Path,
        folder: &Path,
    ) -> Result<GameManifest, ManifestError> {
        let bytes = fs::read(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        let data: Value = serde_json::from_str(text.trim_start_matches('\u{feff}')).map_err(
            |source| ManifestError::Json {
                path: path.to_path_buf(),
                source,
            },
        )?;

        let text_field = |name: &str| {
            data.get(name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let app_name = text_field("AppName").ok_or_else(|| ManifestError::MissingField {
            path: path.to_path_buf(),
            field: "AppName",
        })?;
        let location = text_field("InstallLocation").ok_or_else(|| ManifestError::MissingField {
            path: path.to_path_buf(),
            field: "InstallLocation",
        })?;
        let install_dir = PathBuf::from(location);
        if !install_dir.exists() {
            return Err(ManifestError::MissingInstall {
                path: path.to_path_buf(),
                location: install_dir,
            });
        }

        Ok(GameManifest {
            store: Store::Epic,
            display_name: text_field("DisplayName").unwrap_or_else(|| app_name.clone()),
            store_id: app_name,
            install_dir,
            executable_hint: text_field("LaunchExecutable"),
            library_root: LibraryRoot::new(folder),
            catalog_namespace: text_field("CatalogNamespace"),
            catalog_item_id: text_field("CatalogItemId"),
            version: text_field("AppVersionString"),
            icon_hash: None,
        })
    }
}
