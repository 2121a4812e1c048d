use crate::config::DiscoveryConfig;
use crate::model::Store;
use dirs::home_dir;
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(target_os = "windows")]
use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE};
#[cfg(target_os = "windows")]
use winreg::RegKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryHive {
    CurrentUser,
    LocalMachine,
}

/// Read access to a registry-like key/value store.
pub trait RegistryReader: Send + Sync {
    fn read_string(&self, hive: RegistryHive, key: &str, value: &str) -> Option<String>;
}

/// The Windows registry; reads nothing on other platforms.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRegistry;

impl RegistryReader for SystemRegistry {
    #[cfg(target_os = "windows")]
    fn read_string(&self, hive: RegistryHive, key: &str, value: &str) -> Option<String> {
        let root = match hive {
            RegistryHive::CurrentUser => RegKey::predef(HKEY_CURRENT_USER),
            RegistryHive::LocalMachine => RegKey::predef(HKEY_LOCAL_MACHINE),
        };
        let key = root.open_subkey(key).ok()?;
        key.get_value::<String, _>(value).ok()
    }

    #[cfg(not(target_os = "windows"))]
    fn read_string(&self, _hive: RegistryHive, _key: &str, _value: &str) -> Option<String> {
        None
    }
}

/// In-memory registry, for callers that already know the values and for tests.
/// Key and value names compare case-insensitively.
#[derive(Debug, Default, Clone)]
pub struct StaticRegistry {
    values: HashMap<(RegistryHive, String, String), String>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        hive: RegistryHive,
        key: &str,
        value: &str,
        data: impl Into<String>,
    ) -> Self {
        self.values
            .insert((hive, key.to_lowercase(), value.to_lowercase()), data.into());
        self
    }
}

impl RegistryReader for StaticRegistry {
    fn read_string(&self, hive: RegistryHive, key: &str, value: &str) -> Option<String> {
        self.values
            .get(&(hive, key.to_lowercase(), value.to_lowercase()))
            .cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RegistryProbe {
    hive: RegistryHive,
    key: &'static str,
    value: &'static str,
}

const STEAM_PROBES: &[RegistryProbe] = &[
    RegistryProbe {
        hive: RegistryHive::CurrentUser,
        key: "Software\\Valve\\Steam",
        value: "SteamPath",
    },
    RegistryProbe {
        hive: RegistryHive::LocalMachine,
        key: "SOFTWARE\\WOW6432Node\\Valve\\Steam",
        value: "InstallPath",
    },
];

const EPIC_PROBES: &[RegistryProbe] = &[RegistryProbe {
    hive: RegistryHive::LocalMachine,
    key: "SOFTWARE\\WOW6432Node\\Epic Games\\EpicGamesLauncher",
    value: "AppDataPath",
}];

/// One way of finding a store's install root.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LookupStrategy {
    Configured(PathBuf),
    Registry(RegistryProbe),
    DefaultPath(PathBuf),
}

/// Finds store installations by trying lookup strategies in order.
#[derive(Clone)]
pub struct StoreLocator {
    registry: Arc<dyn RegistryReader>,
    home: Option<PathBuf>,
    steam_override: Option<PathBuf>,
    epic_override: Option<PathBuf>,
    epic_manifest_dirs: Vec<PathBuf>,
}

impl std::fmt::Debug for StoreLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLocator")
            .field("home", &self.home)
            .field("steam_override", &self.steam_override)
            .field("epic_override", &self.epic_override)
            .field("epic_manifest_dirs", &self.epic_manifest_dirs)
            .finish()
    }
}

impl StoreLocator {
    pub fn new(
        registry: Arc<dyn RegistryReader>,
        home: Option<PathBuf>,
        config: &DiscoveryConfig,
    ) -> Self {
        Self {
            registry,
            home,
            steam_override: config.steam.install_path.clone(),
            epic_override: config.epic.install_path.clone(),
            epic_manifest_dirs: config.epic.manifest_dirs.clone(),
        }
    }

    /// Locator backed by the system registry and the current user's profile.
    pub fn system(config: &DiscoveryConfig) -> Self {
        Self::new(Arc::new(SystemRegistry), home_dir(), config)
    }

    /// Install root of `store`, or `None` when the store is not installed.
    pub fn locate(&self, store: Store) -> Option<PathBuf> {
        let found = self
            .strategies(store)
            .into_iter()
            .find_map(|strategy| self.probe(&strategy));
        if found.is_none() {
            debug!("{} installation not found", store);
        }
        found
    }

    /// Folder holding Epic's `*.item` manifests.
    pub fn locate_epic_manifests(&self) -> Option<PathBuf> {
        let from_data_path = self
            .locate(Store::Epic)
            .map(|root| root.join("Manifests"))
            .filter(|path| path.is_dir());

        from_data_path.or_else(|| {
            self.epic_manifest_dirs
                .iter()
                .find(|path| path.is_dir())
                .cloned()
        })
    }

    fn strategies(&self, store: Store) -> Vec<LookupStrategy> {
        let (configured, probes) = match store {
            Store::Steam => (self.steam_override.as_ref(), STEAM_PROBES),
            Store::Epic => (self.epic_override.as_ref(), EPIC_PROBES),
        };

        let mut strategies = Vec::new();
        if let Some(path) = configured {
            strategies.push(LookupStrategy::Configured(path.clone()));
        }
        strategies.extend(probes.iter().copied().map(LookupStrategy::Registry));
        strategies.extend(
            self.default_roots(store)
                .into_iter()
                .map(LookupStrategy::DefaultPath),
        );
        strategies
    }

    fn probe(&self, strategy: &LookupStrategy) -> Option<PathBuf> {
        let candidate = match strategy {
            LookupStrategy::Configured(path) | LookupStrategy::DefaultPath(path) => path.clone(),
            LookupStrategy::Registry(probe) => {
                let raw = self
                    .registry
                    .read_string(probe.hive, probe.key, probe.value)?;
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return None;
                }
                PathBuf::from(trimmed)
            }
        };

        if candidate.exists() {
            Some(candidate)
        } else {
            debug!("lookup {:?} points at missing {:?}", strategy, candidate);
            None
        }
    }

    fn default_roots(&self, store: Store) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        let Some(home) = self.home.as_deref() else {
            return candidates;
        };

        match store {
            Store::Steam => push_steam_defaults(home, &mut candidates),
            Store::Epic => push_epic_defaults(home, &mut candidates),
        }
        candidates
    }
}

fn push_steam_defaults(home: &Path, candidates: &mut Vec<PathBuf>) {
    #[cfg(target_os = "windows")]
    {
        candidates.push(PathBuf::from("C:/Program Files (x86)/Steam"));
        candidates.push(home.join("AppData/Local/Steam"));
    }

    #[cfg(target_os = "linux")]
    {
        candidates.push(home.join(".steam/steam"));
        candidates.push(home.join(".local/share/Steam"));
    }

    #[cfg(target_os = "macos")]
    {
        candidates.push(home.join("Library/Application Support/Steam"));
    }
}

fn push_epic_defaults(home: &Path, candidates: &mut Vec<PathBuf>) {
    candidates.push(home.join("AppData/Local/EpicGamesLauncher"));
}
