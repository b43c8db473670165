//! # Pigeonhole
//!
//! Sort a directory of images into mutually exclusive class folders.
//! The filesystem is the only database: an image's class is the sibling
//! folder that holds a copy of it.
//!
//! ```text
//! photos/
//! ├── batch/          ← source directory, read-only to this crate
//! │   ├── a.png
//! │   └── b.png
//! ├── zhengbao/       ← class folder: a.png is classified "zhengbao"
//! │   └── a.png
//! └── wubao/
//! ```
//!
//! Alongside the ledger sits a disk cache of JPEG thumbnails for grid
//! display, keyed by source path, modification time and size.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`classify`] | The ledger: classify, unclassify, and reconcile classes from disk |
//! | [`listing`] | Lists the images of a directory in display order with their classes |
//! | [`cache`] | Content-keyed thumbnail store with atomic writes, sweep and usage stats |
//! | [`imaging`] | Thumbnail rendering behind the [`imaging::ThumbnailBackend`] trait |
//! | [`warm`] | Parallel thumbnail pre-rendering for a whole listing |
//! | [`media`] | Image extension rules and raw image fetch |
//! | [`config`] | `config.toml` loading, merging, validation and the shared config handle |
//! | [`types`] | Error taxonomy and warnings shared across modules |
//! | [`output`] | CLI output formatting |
//!
//! # Consistency
//!
//! Nothing here is transactional. A classify that fails midway can leave the
//! image in no class, and two concurrent classify calls for the same image
//! can leave it in two. Callers that need exclusivity under concurrency
//! serialize operations per image.

pub mod cache;
pub mod classify;
pub mod config;
pub mod imaging;
pub mod listing;
pub mod media;
pub mod output;
pub mod types;
pub mod warm;

#[cfg(test)]
pub(crate) mod test_helpers;
