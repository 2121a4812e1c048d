pub mod cache;
pub mod config;
pub mod discovery;
pub mod epic;
pub mod executable;
pub mod http;
pub mod locator;
pub mod model;
pub mod steam;
pub mod vdf;

pub use cache::{validate_cached_image, CacheError, CacheKey, IconCache, ImageCache};
pub use config::{
    ConfigError, DiscoveryConfig, EpicOptions, HeuristicOptions, NetworkOptions, SteamOptions,
};
pub use discovery::{match_steam_title, DiscoveryError, GameLibrary, ScanOptions};
pub use epic::{EpicArtwork, EpicCatalog, EpicScanner, ImageHeuristic, ScoredFile};
pub use executable::ExecutableResolver;
pub use http::{FetchError, HttpFetcher};
pub use locator::{RegistryHive, RegistryReader, StaticRegistry, StoreLocator, SystemRegistry};
pub use model::{
    GameManifest, ImageCandidate, ImageRole, ImageSet, LibraryRoot, ManifestError, ResolvedGame,
    Store, StoreScan, StoreStatus,
};
pub use steam::{dedupe_library_roots, enumerate_libraries, SteamArtwork, SteamScanner};
