use crate::config::HeuristicOptions;
use crate::model::GameManifest;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A local image file with its heuristic score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredFile {
    pub path: PathBuf,
    pub score: i32,
    pub size: u64,
}

impl ScoredFile {
    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }
}

/// Last-resort artwork search over files already on disk.
///
/// Candidates come from the launcher's own image folders (any size) and from
/// the install tree (only files above `min_install_image_bytes`). Each one is
/// scored on its name and size:
///
/// * +2 for every hint word contained in the lowercased file name
/// * +2 above `large_image_bytes`, else +1 above `medium_image_bytes`
/// * +2 when the lowercased app name appears in the file name
/// * +1 when the catalog item id appears in the file name
///
/// Files scoring zero are dropped.
#[derive(Debug, Clone)]
pub struct ImageHeuristic {
    name_hints: Vec<String>,
    extensions: Vec<String>,
    store_dirs: Vec<PathBuf>,
    min_install_bytes: u64,
    large_bytes: u64,
    medium_bytes: u64,
    max_icon_bytes: u64,
}

impl ImageHeuristic {
    pub fn new(options: &HeuristicOptions, store_dirs: Vec<PathBuf>) -> Self {
        let lower = |values: &[String]| -> Vec<String> {
            values
                .iter()
                .map(|value| value.trim().trim_start_matches('.').to_lowercase())
                .filter(|value| !value.is_empty())
                .collect()
        };
        Self {
            name_hints: lower(&options.image_name_hints),
            extensions: lower(&options.image_extensions),
            store_dirs,
            min_install_bytes: options.min_install_image_bytes,
            large_bytes: options.large_image_bytes,
            medium_bytes: options.medium_image_bytes,
            max_icon_bytes: options.max_icon_bytes,
        }
    }

    /// Scored candidates for `manifest`, best first. Ties go to the smaller
    /// file name, then the smaller path.
    pub fn rank(&self, manifest: &GameManifest) -> Vec<ScoredFile> {
        let app_name = manifest.store_id.trim().to_lowercase();
        let item_id = manifest
            .catalog_item_id
            .as_deref()
            .map(|id| id.trim().to_lowercase())
            .unwrap_or_default();

        let mut scored: Vec<ScoredFile> = self
            .candidates(&manifest.install_path())
            .into_iter()
            .filter_map(|(path, size)| {
                let name = path.file_name()?.to_string_lossy().to_lowercase();
                let score = self.score(&name, size, &app_name, &item_id);
                (score > 0).then_some(ScoredFile { path, score, size })
            })
            .collect();

        scored.sort();
        scored
    }

    pub fn score(&self, file_name: &str, size: u64, app_name: &str, item_id: &str) -> i32 {
        let mut score = 0;
        for hint in &self.name_hints {
            if file_name.contains(hint.as_str()) {
                score += 2;
            }
        }
        match size {
            size if size > self.large_bytes => score += 2,
            size if size > self.medium_bytes => score += 1,
            _ => {}
        }
        if !app_name.is_empty() && file_name.contains(app_name) {
            score += 2;
        }
        if !item_id.is_empty() && file_name.contains(item_id) {
            score += 1;
        }
        score
    }

    /// Lowest-ranked candidate small enough to serve as an icon.
    pub fn icon_candidate<'a>(&self, ranked: &'a [ScoredFile]) -> Option<&'a ScoredFile> {
        ranked
            .iter()
            .rev()
            .find(|file| file.size < self.max_icon_bytes)
    }

    fn candidates(&self, install: &Path) -> Vec<(PathBuf, u64)> {
        let mut found = Vec::new();
        for dir in &self.store_dirs {
            self.collect_images(dir, 0, &mut found);
        }
        self.collect_images(install, self.min_install_bytes, &mut found);
        found
    }

    fn collect_images(&self, dir: &Path, min_bytes: u64, found: &mut Vec<(PathBuf, u64)>) {
        if !dir.is_dir() {
            return;
        }
        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file());
        for entry in walker {
            if !self.has_image_extension(entry.path()) {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if min_bytes > 0 && metadata.len() <= min_bytes {
                continue;
            }
            found.push((entry.into_path(), metadata.len()));
        }
    }

    fn has_image_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                self.extensions.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false)
    }
}

impl PartialOrd for ScoredFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredFile {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.file_name().cmp(&other.file_name()))
            .then_with(|| self.path.cmp(&other.path))
    }
}
