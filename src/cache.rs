//! Thumbnail cache for fast grid display.
//!
//! Decoding and resampling a full-size photo for every grid cell is the
//! bottleneck of browsing a large directory. This module keeps rendered
//! thumbnails on disk so each (image, size) pair is rendered once.
//!
//! # Design
//!
//! ## Cache keys
//!
//! The cache is **addressed by source identity**, not by output path:
//! every entry lives at `<cache_dir>/<key>.jpg` where `key` is the SHA-256
//! of:
//!
//! - the source path,
//! - the source modification time (nanoseconds since the epoch),
//! - the requested bounding box and JPEG quality.
//!
//! Editing an image changes its mtime, so the next request computes a new
//! key and renders afresh. The old entry is never revalidated or deleted; it
//! just becomes unreachable until [`ThumbnailCache::clear`] sweeps it.
//!
//! If the mtime cannot be read the key falls back to the SHA-256 of the path
//! alone. Such entries are never invalidated by edits.
//!
//! A hit requires only that `<key>.jpg` exists. Its bytes are served as-is.
//!
//! ## Writes
//!
//! Rendered bytes go to a temporary file inside the cache directory and are
//! renamed into place, so a reader never sees a half-written entry and a
//! failed render leaves nothing behind. Two concurrent misses for the same
//! key both render and both rename; the result is identical either way.
//!
//! ## Storage
//!
//! The default location is `<system temp>/pigeonhole_thumbnails`, created
//! when the cache is opened. Nothing is ever expired automatically.

use crate::imaging::{BackendError, Quality, ThumbnailBackend, ThumbnailParams};
use crate::media::{self, MediaError};
use crate::types::{ErrorKind, Warning};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory name of the default cache under the system temp dir.
const DEFAULT_CACHE_DIR_NAME: &str = "pigeonhole_thumbnails";

/// Extension of cache entries.
const ENTRY_EXTENSION: &str = "jpg";

/// Prefix of in-flight writes. These are never counted or swept.
const PARTIAL_PREFIX: &str = ".partial-";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Source(#[from] MediaError),
    #[error("Thumbnail size must be at least 1, got {0}")]
    InvalidSize(u32),
    #[error("Failed to generate thumbnail for {path}: {source}")]
    Render {
        path: PathBuf,
        source: BackendError,
    },
    #[error("Failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read cache entry {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write cache entry {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to scan cache directory {path}: {source}")]
    Scan {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl CacheError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::Source(e) => e.kind(),
            CacheError::InvalidSize(_) => ErrorKind::InvalidArgument,
            CacheError::Render { .. }
            | CacheError::CreateDir { .. }
            | CacheError::Read { .. }
            | CacheError::Write { .. }
            | CacheError::Scan { .. } => ErrorKind::Io,
        }
    }
}

/// A thumbnail returned by [`ThumbnailCache::get_or_create`].
#[derive(Debug, Clone)]
pub struct Thumbnail {
    /// JPEG bytes.
    pub bytes: Vec<u8>,
    pub key: String,
    /// Location of the cache entry.
    pub path: PathBuf,
    /// `true` when served from disk without rendering.
    pub cached: bool,
}

/// Result of [`ThumbnailCache::clear`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClearOutcome {
    pub deleted: usize,
    /// Entries that could not be removed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

/// Size of the cache, from [`ThumbnailCache::stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheUsage {
    pub cache_dir: PathBuf,
    pub count: usize,
    pub total_bytes: u64,
}

impl CacheUsage {
    /// Total size in MiB, rounded to two decimals.
    pub fn total_size_mb(&self) -> f64 {
        (self.total_bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
    }
}

impl fmt::Display for CacheUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} thumbnails, {:.2} MB",
            self.count,
            self.total_size_mb()
        )
    }
}

/// Default cache location under the system temp directory.
pub fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_CACHE_DIR_NAME)
}

/// Cache key for a thumbnail of `source` rendered with `params`.
///
/// Falls back to a path-only key when the source mtime is unavailable.
pub fn thumbnail_key(source: &Path, params: &ThumbnailParams) -> String {
    let source = std::path::absolute(source).unwrap_or_else(|_| source.to_path_buf());
    match fs::metadata(&source).and_then(|m| m.modified()) {
        Ok(mtime) => hash_source_params(&source, mtime, params),
        Err(_) => hash_path(&source),
    }
}

/// SHA-256 over path, mtime, box size and quality.
fn hash_source_params(source: &Path, mtime: SystemTime, params: &ThumbnailParams) -> String {
    let nanos = mtime
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mut hasher = Sha256::new();
    hasher.update(b"thumbnail\0");
    hasher.update(source.as_os_str().as_encoded_bytes());
    hasher.update(b"\0");
    hasher.update(nanos.to_le_bytes());
    hasher.update(params.max_dimension.to_le_bytes());
    hasher.update(params.quality.value().to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of the path alone.
fn hash_path(source: &Path) -> String {
    format!("{:x}", Sha256::digest(source.as_os_str().as_encoded_bytes()))
}

/// A finished cache file, as opposed to a directory or an in-flight write.
fn is_entry(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_file()
        && !entry
            .file_name()
            .to_string_lossy()
            .starts_with(PARTIAL_PREFIX)
}

/// On-disk thumbnail store.
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    dir: PathBuf,
    quality: Quality,
}

impl ThumbnailCache {
    /// Open the cache at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CacheError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            quality: Quality::default(),
        })
    }

    /// Open the cache at [`default_cache_dir`].
    pub fn open_default() -> Result<Self, CacheError> {
        Self::open(default_cache_dir())
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Render parameters this cache uses for a given box size.
    pub fn params(&self, max_dimension: u32) -> ThumbnailParams {
        ThumbnailParams::new(max_dimension).with_quality(self.quality)
    }

    /// Path of the entry for a key.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{ENTRY_EXTENSION}"))
    }

    /// Return the cached thumbnail of `source`, rendering it on a miss.
    pub fn get_or_create(
        &self,
        backend: &impl ThumbnailBackend,
        source: &Path,
        max_dimension: u32,
    ) -> Result<Thumbnail, CacheError> {
        media::ensure_image_file(source)?;
        if max_dimension == 0 {
            return Err(CacheError::InvalidSize(max_dimension));
        }

        let params = self.params(max_dimension);
        let key = thumbnail_key(source, &params);
        let path = self.entry_path(&key);

        match fs::read(&path) {
            Ok(bytes) => {
                debug!(source = %source.display(), key = %key, "thumbnail cache hit");
                return Ok(Thumbnail {
                    bytes,
                    key,
                    path,
                    cached: true,
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(CacheError::Read { path, source }),
        }

        let bytes = backend
            .render(source, &params)
            .map_err(|e| CacheError::Render {
                path: source.to_path_buf(),
                source: e,
            })?;
        self.persist(&path, &bytes)?;
        debug!(source = %source.display(), key = %key, "thumbnail generated");

        Ok(Thumbnail {
            bytes,
            key,
            path,
            cached: false,
        })
    }

    /// Write `bytes` to a temp file in the cache dir and rename it to `path`.
    fn persist(&self, path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
        let write_err = |source: std::io::Error| CacheError::Write {
            path: path.to_path_buf(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;
        let mut tmp = tempfile::Builder::new()
            .prefix(PARTIAL_PREFIX)
            .tempfile_in(&self.dir)
            .map_err(write_err)?;
        tmp.write_all(bytes).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    /// Delete every regular file directly inside the cache directory.
    ///
    /// In-flight `.partial-*` writes are left alone so a concurrent
    /// [`get_or_create`](Self::get_or_create) can still persist. Per-file failures are collected as warnings and the sweep continues.
    /// A missing cache directory deletes nothing.
    pub fn clear(&self) -> Result<ClearOutcome, CacheError> {
        let mut outcome = ClearOutcome::default();
        for entry in self.entries()? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable cache entry");
                    outcome.warnings.push(Warning::new(&self.dir, e.to_string()));
                    continue;
                }
            };
            if !is_entry(&entry) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => outcome.deleted += 1,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "failed to delete thumbnail");
                    outcome.warnings.push(Warning::new(entry.path(), e.to_string()));
                }
            }
        }
        debug!(deleted = outcome.deleted, "thumbnail cache cleared");
        Ok(outcome)
    }

    /// Count and total size of the files in the cache directory.
    pub fn stats(&self) -> Result<CacheUsage, CacheError> {
        let mut usage = CacheUsage {
            cache_dir: self.dir.clone(),
            count: 0,
            total_bytes: 0,
        };
        for entry in self.entries()?.filter_map(|e| e.ok()) {
            if !is_entry(&entry) {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                usage.count += 1;
                usage.total_bytes += meta.len();
            }
        }
        Ok(usage)
    }

    /// Direct children of the cache dir. Empty when the dir does not exist;
    /// an error when it exists but cannot be read.
    fn entries(
        &self,
    ) -> Result<impl Iterator<Item = Result<walkdir::DirEntry, walkdir::Error>>, CacheError> {
        let exists = self.dir.try_exists().map_err(|source| CacheError::Scan {
            path: self.dir.clone(),
            source,
        })?;
        if exists {
            fs::read_dir(&self.dir).map_err(|source| CacheError::Scan {
                path: self.dir.clone(),
                source,
            })?;
        }
        let walker = exists.then(|| {
            WalkDir::new(&self.dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
        });
        Ok(walker.into_iter().flatten())
    }
}
