//! Steam: multiple library roots, one `appmanifest_<appid>.acf` per game,
//! artwork from the client cache or the public CDN.

pub mod artwork;
pub mod libraries;
pub mod scanner;

pub use artwork::SteamArtwork;
pub use libraries::{dedupe_library_roots, enumerate_libraries};
pub use scanner::SteamScanner;
