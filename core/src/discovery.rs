use crate::cache::IconCache;
use crate::config::DiscoveryConfig;
use crate::epic::{EpicArtwork, EpicScanner};
use crate::executable::ExecutableResolver;
use crate::http::HttpFetcher;
use crate::locator::StoreLocator;
use crate::model::{GameManifest, ImageRole, ImageSet, ResolvedGame, Store, StoreScan, StoreStatus};
use crate::steam::{enumerate_libraries, SteamArtwork, SteamScanner};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("no cache directory configured and no home directory found")]
    NoCacheRoot,
}

/// Per-pass options supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Store ids already in the caller's library; skipped before resolution.
    pub known_ids: HashSet<String>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl ScanOptions {
    pub fn with_known_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

/// Steam games an Epic record may borrow artwork from.
struct CrossStore {
    artwork: SteamArtwork,
    games: Vec<GameManifest>,
}

enum Artwork {
    Steam(SteamArtwork),
    Epic {
        artwork: EpicArtwork,
        cross_store: Option<CrossStore>,
    },
}

/// Shared, read-only state of one discovery pass.
struct PassContext {
    executables: ExecutableResolver,
    icons: IconCache,
    artwork: Artwork,
}

/// Entry point: finds a store, scans its manifests and resolves every game.
///
/// Each call to [`GameLibrary::discover`] is an independent pass. Nothing is
/// retained between passes except files in the image caches.
#[derive(Debug, Clone)]
pub struct GameLibrary {
    config: DiscoveryConfig,
    locator: StoreLocator,
    http: HttpFetcher,
    cache_root: PathBuf,
}

impl GameLibrary {
    /// Library backed by the system registry and the user's profile.
    pub fn new(config: DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let locator = StoreLocator::system(&config);
        Self::with_locator(config, locator)
    }

    pub fn with_locator(
        config: DiscoveryConfig,
        locator: StoreLocator,
    ) -> Result<Self, DiscoveryError> {
        let http = HttpFetcher::new(&config.network)?;
        let cache_root = config
            .resolved_cache_root()
            .ok_or(DiscoveryError::NoCacheRoot)?;
        Ok(Self {
            config,
            locator,
            http,
            cache_root,
        })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Steam root and its fully installed games, without resolving anything.
    pub fn scan_steam_manifests(&self) -> Option<(PathBuf, Vec<GameManifest>)> {
        steam_manifests(&self.locator)
    }

    /// Epic manifest folder and its installed games, without resolving anything.
    pub fn scan_epic_manifests(&self) -> Option<(PathBuf, Vec<GameManifest>)> {
        epic_manifests(&self.locator)
    }

    pub async fn discover(&self, store: Store, options: &ScanOptions) -> StoreScan {
        match store {
            Store::Steam => self.discover_steam(options).await,
            Store::Epic => self.discover_epic(options).await,
        }
    }

    pub async fn discover_steam(&self, options: &ScanOptions) -> StoreScan {
        let locator = self.locator.clone();
        let Some((root, manifests)) = blocking("steam scan", move || steam_manifests(&locator))
            .await
            .flatten()
        else {
            return StoreScan::unavailable(Store::Steam);
        };

        let artwork =
            SteamArtwork::new(&self.config, self.http.clone(), &self.cache_root, Some(&root));
        let context = self.context(Artwork::Steam(artwork));
        self.run_pass(Store::Steam, root, manifests, context, options).await
    }

    pub async fn discover_epic(&self, options: &ScanOptions) -> StoreScan {
        let locator = self.locator.clone();
        let cross_store_wanted = self.config.cross_store_artwork;
        let scanned = blocking("epic scan", move || {
            let epic = epic_manifests(&locator)?;
            let steam = if cross_store_wanted {
                steam_manifests(&locator)
            } else {
                None
            };
            Some((epic, steam))
        })
        .await
        .flatten();
        let Some(((folder, manifests), steam)) = scanned else {
            return StoreScan::unavailable(Store::Epic);
        };

        let cross_store = steam.map(|(steam_root, games)| CrossStore {
            artwork: SteamArtwork::new(
                &self.config,
                self.http.clone(),
                &self.cache_root,
                Some(&steam_root),
            ),
            games,
        });
        let artwork = EpicArtwork::new(&self.config, self.http.clone(), &self.cache_root);
        let context = self.context(Artwork::Epic {
            artwork,
            cross_store,
        });
        self.run_pass(Store::Epic, folder, manifests, context, options).await
    }

    fn context(&self, artwork: Artwork) -> Arc<PassContext> {
        Arc::new(PassContext {
            executables: ExecutableResolver::new(&self.config.heuristics),
            icons: IconCache::new(&self.cache_root, self.config.heuristics.min_icon_pixels),
            artwork,
        })
    }

    async fn run_pass(
        &self,
        store: Store,
        root: PathBuf,
        mut manifests: Vec<GameManifest>,
        context: Arc<PassContext>,
        options: &ScanOptions,
    ) -> StoreScan {
        let found = manifests.len();
        manifests.retain(|manifest| !options.known_ids.contains(&manifest.store_id));
        info!(
            "{}: {} installed, {} new",
            store,
            found,
            manifests.len()
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_resolutions.max(1)));
        let mut tasks = JoinSet::new();
        let mut cancelled = false;

        for (index, manifest) in manifests.into_iter().enumerate() {
            if options.is_cancelled() {
                cancelled = true;
                break;
            }
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            if options.is_cancelled() {
                cancelled = true;
                break;
            }
            let context = Arc::clone(&context);
            tasks.spawn(async move {
                let _permit = permit;
                (index, resolve_game(&context, manifest).await)
            });
        }

        let mut resolved = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => resolved.push(entry),
                Err(err) => warn!("{} resolution task failed: {}", store, err),
            }
        }
        resolved.sort_by_key(|(index, _)| *index);

        if cancelled {
            info!("{} pass cancelled after {} games", store, resolved.len());
        }
        StoreScan {
            store,
            status: StoreStatus::Available { root },
            games: resolved.into_iter().map(|(_, game)| game).collect(),
            cancelled,
        }
    }
}

async fn resolve_game(context: &PassContext, manifest: GameManifest) -> ResolvedGame {
    let resolver = context.executables.clone();
    let owned = manifest.clone();
    let executable = blocking("executable search", move || resolver.resolve(&owned))
        .await
        .flatten();
    let exe_icon = executable
        .as_deref()
        .and_then(|path| context.icons.cached(path));

    let images = match &context.artwork {
        Artwork::Steam(artwork) => steam_images(artwork, &manifest, exe_icon).await,
        Artwork::Epic {
            artwork,
            cross_store,
        } => epic_images(artwork, cross_store.as_ref(), &manifest, exe_icon).await,
    };

    ResolvedGame::new(manifest, executable, images)
}

/// Steam records prefer the executable's own icon over the CDN logo.
async fn steam_images(
    artwork: &SteamArtwork,
    manifest: &GameManifest,
    exe_icon: Option<PathBuf>,
) -> ImageSet {
    let app_id = manifest.store_id.trim();
    let mut images = ImageSet::default();
    if app_id.is_empty() {
        return images;
    }
    images.grid = artwork.resolve_role(app_id, ImageRole::Grid).await;
    images.header = artwork.resolve_role(app_id, ImageRole::Header).await;
    images.icon = match exe_icon {
        Some(icon) => Some(icon),
        None => artwork.resolve_role(app_id, ImageRole::Icon).await,
    };
    images
}

async fn epic_images(
    artwork: &EpicArtwork,
    cross_store: Option<&CrossStore>,
    manifest: &GameManifest,
    exe_icon: Option<PathBuf>,
) -> ImageSet {
    let mut images = artwork.resolve(manifest).await;
    if images.icon.is_none() {
        images.icon = exe_icon;
    }

    if images.grid.is_none() && images.header.is_none() {
        if let Some(cross) = cross_store {
            if let Some(twin) = match_steam_title(&manifest.display_name, &cross.games) {
                debug!(
                    "borrowing Steam artwork of {} for {}",
                    twin.store_id, manifest.display_name
                );
                let borrowed = cross.artwork.resolve(twin).await;
                images.grid = borrowed.grid;
                images.header = borrowed.header;
                if images.icon.is_none() {
                    images.icon = borrowed.icon;
                }
            }
        }
    }
    images
}

/// Steam game with the same title: equal ignoring case, else the first whose
/// name contains the title's first two words longer than three characters.
pub fn match_steam_title<'a>(
    title: &str,
    steam_games: &'a [GameManifest],
) -> Option<&'a GameManifest> {
    let wanted = title.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    if let Some(exact) = steam_games
        .iter()
        .find(|game| game.display_name.trim().to_lowercase() == wanted)
    {
        return Some(exact);
    }

    let key_words: Vec<&str> = wanted
        .split_whitespace()
        .filter(|word| word.chars().count() > 3)
        .take(2)
        .collect();
    if key_words.is_empty() {
        return None;
    }
    steam_games.iter().find(|game| {
        let name = game.display_name.to_lowercase();
        key_words.iter().all(|word| name.contains(word))
    })
}

fn steam_manifests(locator: &StoreLocator) -> Option<(PathBuf, Vec<GameManifest>)> {
    let root = locator.locate(Store::Steam)?;
    let libraries = enumerate_libraries(&root);
    debug!("steam libraries: {:?}", libraries);
    let games = SteamScanner::new().scan(&libraries);
    Some((root, games))
}

fn epic_manifests(locator: &StoreLocator) -> Option<(PathBuf, Vec<GameManifest>)> {
    let folder = locator.locate_epic_manifests()?;
    let games = EpicScanner::new().scan(&folder);
    Some((folder, games))
}

/// Runs filesystem-bound work off the async workers.
async fn blocking<T, F>(label: &str, work: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("{} failed: {}", label, err);
            None
        }
    }
}
