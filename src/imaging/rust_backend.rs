//! Pure Rust thumbnail backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, BMP, WebP, TIFF, ICO) | `image::ImageReader` |
//! | Alpha flattening | per-pixel blend onto white |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//!
//! Thumbnails are always opaque RGB JPEG. Transparent and palette images
//! are composited onto a white background first, so transparency is lost.

use super::backend::{BackendError, ThumbnailBackend};
use super::calculations::{fit_within, needs_resize};
use super::params::{Quality, ThumbnailParams};
use image::imageops::FilterType;
use image::{DynamicImage, ImageEncoder, ImageReader, RgbImage};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
///
/// The decoder is chosen from the file's leading bytes, falling back to the
/// extension, so a PNG saved as `.jpg` still decodes.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Convert to opaque RGB8, compositing any alpha channel over white.
fn flatten_onto_white(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }
    let rgba = img.into_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        image::Rgb([blend(r, a), blend(g, a), blend(b, a)])
    })
}

/// Blend one channel over white with straight (non-premultiplied) alpha.
#[inline]
fn blend(channel: u8, alpha: u8) -> u8 {
    let c = channel as u32;
    let a = alpha as u32;
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

/// Encode an RGB buffer as baseline JPEG.
fn encode_jpeg(img: &RgbImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let mut bytes = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality.value() as u8)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))?;
    Ok(bytes)
}

impl ThumbnailBackend for RustBackend {
    fn render(&self, source: &Path, params: &ThumbnailParams) -> Result<Vec<u8>, BackendError> {
        let rgb = flatten_onto_white(load_image(source)?);

        let fitted = if needs_resize(rgb.dimensions(), params.max_dimension) {
            let (width, height) = fit_within(rgb.dimensions(), params.max_dimension);
            image::imageops::resize(&rgb, width, height, FilterType::Lanczos3)
        } else {
            rgb
        };

        encode_jpeg(&fitted, params.quality)
    }
}
