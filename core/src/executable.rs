use crate::config::HeuristicOptions;
use crate::model::GameManifest;
use log::debug;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Picks the most likely primary executable of an installed game.
#[derive(Debug, Clone)]
pub struct ExecutableResolver {
    excluded_terms: Vec<String>,
    extensions: Vec<String>,
}

impl ExecutableResolver {
    pub fn new(options: &HeuristicOptions) -> Self {
        Self {
            excluded_terms: lowercase_all(&options.excluded_executable_terms),
            extensions: options
                .executable_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn resolve(&self, manifest: &GameManifest) -> Option<PathBuf> {
        let install = manifest.install_path();
        if !install.is_dir() {
            debug!(
                "install directory {} is missing",
                install.to_string_lossy()
            );
            return None;
        }

        if let Some(hint) = manifest
            .executable_hint
            .as_deref()
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
        {
            if let Some(found) = self.find_hinted(&install, hint) {
                return Some(found);
            }
            debug!("launch executable {} not found under {}", hint, install.to_string_lossy());
        }

        self.search(&install)
    }

    /// Heuristic search of `install`. A match directly in the folder wins over
    /// anything nested; otherwise the first nested match in name order.
    pub fn search(&self, install: &Path) -> Option<PathBuf> {
        let mut nested = None;
        let walker = WalkDir::new(install)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file());

        for entry in walker {
            if !self.is_candidate(entry.path()) {
                continue;
            }
            if entry.depth() == 1 {
                return Some(entry.into_path());
            }
            if nested.is_none() {
                nested = Some(entry.into_path());
            }
        }
        nested
    }

    pub fn is_candidate(&self, path: &Path) -> bool {
        let extension_ok = path
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                self.extensions.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false);
        if !extension_ok {
            return false;
        }
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().to_lowercase(),
            None => return false,
        };
        !self.excluded_terms.iter().any(|term| name.contains(term.as_str()))
    }

    /// The hint joined onto the install folder, else any file in the tree
    /// whose trailing path components equal the hint's.
    fn find_hinted(&self, install: &Path, hint: &str) -> Option<PathBuf> {
        let normalized = hint.replace('\\', "/");
        let direct = install.join(&normalized);
        if direct.is_file() {
            return Some(direct);
        }

        let wanted = path_components(&normalized);
        if wanted.is_empty() {
            return None;
        }
        WalkDir::new(install)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .find(|entry| {
                entry
                    .path()
                    .strip_prefix(install)
                    .map(|relative| {
                        path_components(&relative.to_string_lossy()).ends_with(&wanted)
                    })
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
    }
}

/// Lowercased path components, with `.` and empty segments dropped.
fn path_components(path: &str) -> Vec<String> {
    path.split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .map(str::to_lowercase)
        .collect()
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .collect()
}
