//! Parameter types for thumbnail rendering.
//!
//! These structs describe *what* to render, not *how*. They are the
//! interface between the [`cache`](crate::cache) (which decides when a
//! thumbnail must be rendered) and the [`backend`](super::backend) (which
//! does the pixel work). Swapping the backend for a mock in tests leaves
//! the cache logic untouched.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1–100, default 85). Clamped on construction.
//! - [`ThumbnailParams`]: Bounding box and quality for one render.

/// Default bounding box for grid thumbnails.
pub const DEFAULT_MAX_DIMENSION: u32 = 300;

/// Quality setting for lossy JPEG encoding (1-100).
///
/// Only constructible through [`Quality::new`], which clamps; the encoder
/// narrows the value to `u8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Parameters for a thumbnail render: fit inside a square box, encode as JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailParams {
    /// Neither output edge exceeds this.
    pub max_dimension: u32,
    pub quality: Quality,
}

impl ThumbnailParams {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension,
            quality: Quality::default(),
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }
}

impl Default for ThumbnailParams {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION)
    }
}
