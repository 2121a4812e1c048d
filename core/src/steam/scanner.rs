use crate::model::{GameManifest, LibraryRoot, ManifestError, Store};
use crate::vdf;
use log::{debug, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// `StateFlags` value of a fully installed app.
pub const FULLY_INSTALLED: &str = "4";

const MANIFEST_PREFIX: &str = "appmanifest_";
const MANIFEST_EXTENSION: &str = "acf";

/// Reads `steamapps/appmanifest_*.acf` files into [`GameManifest`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct SteamScanner;

impl SteamScanner {
    pub fn new() -> Self {
        Self
    }

    /// Scans every library in order. An app id seen in an earlier library
    /// shadows the same id in later ones.
    pub fn scan(&self, libraries: &[LibraryRoot]) -> Vec<GameManifest> {
        let mut seen = HashSet::new();
        let mut games = Vec::new();

        for library in libraries {
            for path in self.manifest_files(library) {
                match self.parse_manifest(&path, library) {
                    Ok(manifest) => {
                        if seen.insert(manifest.store_id.clone()) {
                            games.push(manifest);
                        } else {
                            debug!(
                                "app {} already found in an earlier library; skipping {}",
                                manifest.store_id,
                                path.to_string_lossy()
                            );
                        }
                    }
                    Err(err) if err.is_exclusion() => debug!("excluded: {}", err),
                    Err(err) => warn!("skipping manifest: {}", err),
                }
            }
        }

        games
    }

    /// Manifest files of one library, sorted by name.
    pub fn manifest_files(&self, library: &LibraryRoot) -> Vec<PathBuf> {
        let steamapps = library.path().join("steamapps");
        let entries = match fs::read_dir(&steamapps) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("cannot list {}: {}", steamapps.to_string_lossy(), err);
                return Vec::new();
            }
        };

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_app_manifest(path))
            .collect();
        files.sort();
        files
    }

    pub fn parse_manifest(
        &self,
        path: &Path,
        library: &LibraryRoot,
    ) -> Result<GameManifest, ManifestError> {
        let bytes = fs::read(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let tree = vdf::parse(&String::from_utf8_lossy(&bytes));
        let app = tree
            .get_object("AppState")
            .ok_or_else(|| ManifestError::MissingSection {
                path: path.to_path_buf(),
                section: "AppState",
            })?;

        let state = app.get_str("StateFlags").unwrap_or_default().trim();
        if state != FULLY_INSTALLED {
            return Err(ManifestError::NotInstalled {
                path: path.to_path_buf(),
                state: state.to_string(),
            });
        }

        let field = |name: &'static str| -> Result<String, ManifestError> {
            app.get_str(name)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ManifestError::MissingField {
                    path: path.to_path_buf(),
                    field: name,
                })
        };
        let optional = |name: &str| {
            app.get_str(name)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let store_id = field("appid")?;
        let install_dir = field("installdir")?;
        let display_name = optional("name").unwrap_or_else(|| install_dir.clone());

        Ok(GameManifest {
            store: Store::Steam,
            store_id,
            display_name,
            install_dir: PathBuf::from(install_dir),
            executable_hint: None,
            library_root: library.clone(),
            catalog_namespace: None,
            catalog_item_id: None,
            version: optional("buildid"),
            icon_hash: optional("icon"),
        })
    }
}

fn is_app_manifest(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|name| name.to_string_lossy()) else {
        return false;
    };
    let extension_matches = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(MANIFEST_EXTENSION))
        .unwrap_or(false);
    name.starts_with(MANIFEST_PREFIX) && extension_matches
}
