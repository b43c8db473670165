//! Thumbnail rendering in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Render** | decode → flatten alpha → Lanczos3 fit → JPEG |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing a render
//! - **Backend**: [`ThumbnailBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ThumbnailBackend};
pub use calculations::{fit_within, needs_resize};
pub use params::{DEFAULT_MAX_DIMENSION, Quality, ThumbnailParams};
pub use rust_backend::RustBackend;
