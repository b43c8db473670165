//! Recognized image files and raw image fetch.
//!
//! The set of extensions here is the single definition of "is an image" for
//! listing, thumbnailing and raw fetch. Matching is case-insensitive on the
//! final extension only (`photo.tar.PNG` is an image, `photo` is not).

use crate::types::ErrorKind;
use image::ImageFormat;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extensions (without the dot, lowercase) that count as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "ico"];

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Image not found: {0}")]
    NotFound(PathBuf),
    #[error("Not a file: {0}")]
    NotAFile(PathBuf),
    #[error("Not an image file: {0}")]
    NotAnImage(PathBuf),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl MediaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::NotFound(_) => ErrorKind::NotFound,
            MediaError::NotAFile(_) | MediaError::NotAnImage(_) => ErrorKind::InvalidArgument,
            MediaError::Io { source, .. } => ErrorKind::from_io(source),
        }
    }
}

/// Raw bytes of an image plus the media type to serve them with.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
}

/// Whether the file name carries a recognized image extension.
pub fn is_image_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Whether the path carries a recognized image extension.
pub fn is_image(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(is_image_name)
}

/// Media type for a path, derived from its extension.
pub fn media_type(path: &Path) -> &'static str {
    path.extension()
        .and_then(ImageFormat::from_extension)
        .map(|format| format.to_mime_type())
        .unwrap_or(FALLBACK_MEDIA_TYPE)
}

/// Check that `path` is an existing regular file with an image extension.
///
/// Shared precondition of raw fetch and thumbnail generation.
pub fn ensure_image_file(path: &Path) -> Result<(), MediaError> {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MediaError::NotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(MediaError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if !meta.is_file() {
        return Err(MediaError::NotAFile(path.to_path_buf()));
    }
    if !is_image(path) {
        return Err(MediaError::NotAnImage(path.to_path_buf()));
    }
    Ok(())
}

/// Read an image file as-is.
pub fn read_image(path: &Path) -> Result<RawImage, MediaError> {
    ensure_image_file(path)?;
    let bytes = fs::read(path).map_err(|source| MediaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(RawImage {
        bytes,
        media_type: media_type(path),
    })
}
