//! Thumbnail rendering backend trait and shared types.
//!
//! The [`ThumbnailBackend`] trait is the seam between the cache and the
//! image library: it maps a source file plus [`ThumbnailParams`] to encoded
//! JPEG bytes. The cache never looks at pixels.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate.

use super::params::ThumbnailParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for thumbnail rendering backends.
///
/// `Sync` so one backend can serve a rayon warm-up pass.
pub trait ThumbnailBackend: Sync {
    /// Decode `source`, fit it inside the params' box, and encode as JPEG.
    fn render(&self, source: &Path, params: &ThumbnailParams) -> Result<Vec<u8>, BackendError>;
}
