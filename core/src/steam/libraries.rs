use crate::model::LibraryRoot;
use crate::vdf::{self, Node};
use log::{debug, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Folder-list manifest, relative to the Steam install root.
pub const LIBRARY_FOLDERS_MANIFEST: &str = "steamapps/libraryfolders.vdf";

/// All library roots of a Steam installation, starting with `root` itself.
///
/// Entries of `libraryfolders.vdf` are kept when their `path` is an existing
/// directory. The result is deduplicated case-insensitively in first-seen order.
pub fn enumerate_libraries(root: &Path) -> Vec<LibraryRoot> {
    let manifest = root.join(LIBRARY_FOLDERS_MANIFEST);
    let contents = match fs::read(&manifest) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            debug!("no folder list at {}: {}", manifest.to_string_lossy(), err);
            return vec![LibraryRoot::new(root)];
        }
    };

    let mut candidates = vec![root.to_path_buf()];
    let tree = vdf::parse(&contents);
    match tree.get_ignore_case("libraryfolders").and_then(Node::as_object) {
        Some(folders) => {
            for (key, node) in folders.iter() {
                if key.is_empty() || !key.chars().all(|c| c.is_ascii_digit()) {
                    continue;
                }
                // older clients store the path directly under the numeric key
                let raw = match node {
                    Node::Object(entry) => entry.get_str("path"),
                    Node::Leaf(path) => Some(path.as_str()),
                };
                let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
                    continue;
                };

                let path = PathBuf::from(raw);
                if path.is_dir() {
                    candidates.push(path);
                } else {
                    debug!("library folder {} does not exist", raw);
                }
            }
        }
        None => warn!(
            "{} has no libraryfolders section",
            manifest.to_string_lossy()
        ),
    }

    dedupe_library_roots(candidates)
}

/// Removes roots that compare equal ignoring case and separator style,
/// keeping the first spelling seen.
pub fn dedupe_library_roots<I>(paths: I) -> Vec<LibraryRoot>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut seen = HashSet::new();
    let mut results = Vec::new();
    for path in paths {
        let root = LibraryRoot::new(path);
        if seen.insert(root.comparison_key()) {
            results.push(root);
        }
    }
    results
}
