use crate::http::FetchError;
use crate::model::Store;
use image::GenericImageView;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

static UNSAFE_FILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid file name sanitizer regex"));

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("executable path {0:?} has no file stem")]
    NoStem(PathBuf),
}

/// Identifies one cached image: `{item_id}_{role_suffix}.{extension}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    item_id: String,
    role_suffix: String,
    extension: String,
}

impl CacheKey {
    pub fn new(
        item_id: impl Into<String>,
        role_suffix: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            role_suffix: role_suffix.into(),
            extension: extension.into(),
        }
    }

    pub fn file_name(&self) -> String {
        let extension = self.extension.trim_start_matches('.');
        format!(
            "{}_{}.{}",
            sanitize(&self.item_id),
            sanitize(&self.role_suffix),
            sanitize(extension).to_lowercase()
        )
    }
}

fn sanitize(value: &str) -> String {
    UNSAFE_FILE_CHARS.replace_all(value.trim(), "_").into_owned()
}

/// Per-store image cache. Entries are permanent once written.
#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: PathBuf,
}

impl ImageCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn for_store(cache_root: &Path, store: Store) -> Self {
        Self::new(cache_root.join(store.image_cache_dir()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<PathBuf> {
        let path = self.path_for(key);
        path.is_file().then_some(path)
    }

    /// Returns the cached file for `key`, invoking `fetch` only when it is absent.
    ///
    /// The file is written to a temporary name and renamed into place, so a
    /// concurrent reader never sees a partial image. Any failure yields `None`
    /// and leaves nothing behind.
    pub async fn get_or_fetch<F, Fut>(&self, key: &CacheKey, fetch: F) -> Option<PathBuf>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, FetchError>>,
    {
        if let Some(hit) = self.lookup(key) {
            return Some(hit);
        }

        let bytes = match fetch().await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                debug!("nothing to cache for {}", key.file_name());
                return None;
            }
            Err(err) => {
                debug!("fetch for {} failed: {}", key.file_name(), err);
                return None;
            }
        };

        let target = self.path_for(key);
        let destination = target.clone();
        let written = tokio::task::spawn_blocking(move || write_atomic(&destination, &bytes))
            .await
            .unwrap_or_else(|err| Err(io::Error::new(io::ErrorKind::Other, err)));
        match written {
            Ok(()) => Some(target),
            Err(err) => {
                warn!("failed to cache {}: {}", target.to_string_lossy(), err);
                None
            }
        }
    }
}

/// Writes `contents` next to `target` under a unique name, then renames it
/// into place. A rename lost to a concurrent writer keeps the winner's file.
pub(crate) fn write_atomic(target: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = target.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "cache target has no parent directory")
    })?;
    fs::create_dir_all(parent)?;

    let temp_path = build_temp_path(target);
    let written = (|| {
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()
    })();
    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }

    if let Err(err) = fs::rename(&temp_path, target) {
        let _ = fs::remove_file(&temp_path);
        if target.is_file() {
            return Ok(());
        }
        return Err(err);
    }
    Ok(())
}

fn build_temp_path(target: &Path) -> PathBuf {
    let mut temp = target.to_path_buf();
    let suffix = format!(".{}.tmp", Uuid::new_v4().simple());
    match temp.file_name() {
        Some(name) => {
            let mut os_string = name.to_os_string();
            os_string.push(suffix);
            temp.set_file_name(os_string);
        }
        None => temp.push(format!("cache{suffix}")),
    }
    temp
}

/// Checks a cached image by decoding it. Files that fail to decode or are
/// smaller than `min_pixels` in either dimension are deleted so the next
/// pass produces them again.
pub fn validate_cached_image(path: &Path, min_pixels: u32) -> Option<PathBuf> {
    if !path.is_file() {
        return None;
    }

    let reason = match image::open(path) {
        Ok(decoded) => {
            let (width, height) = decoded.dimensions();
            if width >= min_pixels && height >= min_pixels {
                return Some(path.to_path_buf());
            }
            format!("{width}x{height} is below {min_pixels}px")
        }
        Err(err) => err.to_string(),
    };

    warn!(
        "discarding corrupt cached image {}: {}",
        path.to_string_lossy(),
        reason
    );
    if let Err(err) = fs::remove_file(path) {
        warn!("failed to delete {}: {}", path.to_string_lossy(), err);
    }
    None
}

/// Icons extracted from game executables, stored as PNG under `icons/`.
#[derive(Debug, Clone)]
pub struct IconCache {
    dir: PathBuf,
    min_pixels: u32,
}

impl IconCache {
    pub fn new(cache_root: &Path, min_pixels: u32) -> Self {
        Self {
            dir: cache_root.join("icons"),
            min_pixels,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{stem}_{hash}_icon.png`; the hash keeps same-named executables of
    /// different games apart.
    pub fn path_for(&self, executable: &Path) -> Option<PathBuf> {
        let stem = executable.file_stem()?.to_string_lossy();
        let digest = Sha256::digest(executable.to_string_lossy().as_bytes());
        let short = hex::encode(&digest[..4]);
        Some(
            self.dir
                .join(format!("{}_{}_icon.png", sanitize(&stem), short)),
        )
    }

    /// A previously stored icon for `executable`, if it is still usable.
    pub fn cached(&self, executable: &Path) -> Option<PathBuf> {
        let path = self.path_for(executable)?;
        validate_cached_image(&path, self.min_pixels)
    }

    /// Stores PNG bytes produced by the caller's icon extractor.
    pub fn store(&self, executable: &Path, png: &[u8]) -> Result<PathBuf, CacheError> {
        let path = self
            .path_for(executable)
            .ok_or_else(|| CacheError::NoStem(executable.to_path_buf()))?;
        write_atomic(&path, png)?;
        Ok(path)
    }
}
