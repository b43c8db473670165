//! Directory listing with classification annotations.
//!
//! Lists the images directly inside a source directory (no recursion),
//! newest-name-first: filenames are sorted case-insensitively in descending
//! order, which puts `IMG_0300.jpg` above `IMG_0299.jpg` for camera-style
//! names. Each listing is annotated with the current class of every image,
//! derived by [`classify::reconcile`](crate::classify::reconcile).

use crate::classify;
use crate::media;
use crate::types::ErrorKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ListError {
    #[error("Directory not found: {0}")]
    NotFound(PathBuf),
    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Failed to read directory {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ListError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ListError::NotFound(_) => ErrorKind::NotFound,
            ListError::NotADirectory(_) => ErrorKind::InvalidArgument,
            ListError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            ListError::Io { .. } => ErrorKind::Io,
        }
    }

    fn from_io(path: &Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => ListError::PermissionDenied(path.to_path_buf()),
            _ => ListError::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// Images of one source directory plus their classes.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub path: PathBuf,
    /// File names, case-insensitive descending.
    pub images: Vec<String>,
    /// Image file name → class name, for classified images only.
    pub classifications: BTreeMap<String, String>,
}

impl Listing {
    /// Class of an image in this listing, if it has one.
    pub fn class_of(&self, image: &str) -> Option<&str> {
        self.classifications.get(image).map(String::as_str)
    }

    /// Full path of a listed image.
    pub fn image_path(&self, image: &str) -> PathBuf {
        self.path.join(image)
    }
}

/// List the images in `source_dir` and annotate them with their classes.
pub fn list(source_dir: &Path) -> Result<Listing, ListError> {
    let meta = match fs::metadata(source_dir) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ListError::NotFound(source_dir.to_path_buf()));
        }
        Err(e) => return Err(ListError::from_io(source_dir, e)),
    };
    if !meta.is_dir() {
        return Err(ListError::NotADirectory(source_dir.to_path_buf()));
    }

    let mut images = collect_images(source_dir)?;
    sort_descending(&mut images);

    let classifications = classify::reconcile(source_dir, &images);

    Ok(Listing {
        path: source_dir.to_path_buf(),
        images,
        classifications,
    })
}

/// Names of regular files in `dir` with a recognized image extension.
///
/// Names that are not valid UTF-8 are skipped: they cannot be carried in
/// the string-keyed listing.
fn collect_images(dir: &Path) -> Result<Vec<String>, ListError> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| ListError::from_io(dir, e))? {
        let entry = entry.map_err(|e| ListError::from_io(dir, e))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if media::is_image_name(&name) && entry.path().is_file() {
            images.push(name);
        }
    }
    Ok(images)
}

/// Sort by lowercased name, descending.
pub fn sort_descending(names: &mut [String]) {
    names.sort_by_cached_key(|name| std::cmp::Reverse(name.to_lowercase()));
}
