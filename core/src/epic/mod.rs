//! Epic Games Store: one JSON `*.item` manifest per installed app, artwork from
//! the public catalog services with local fallbacks.

pub mod artwork;
pub mod catalog;
pub mod heuristic;
pub mod scanner;

pub use artwork::EpicArtwork;
pub use catalog::{CatalogItem, EpicCatalog};
pub use heuristic::{ImageHeuristic, ScoredFile};
pub use scanner::EpicScanner;
