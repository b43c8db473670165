//! Pre-render the thumbnails of a directory listing.
//!
//! `warm` walks every image of a [`Listing`] in parallel with
//! [rayon](https://docs.rs/rayon) and asks the cache for its thumbnail, so
//! the grid can later be served from disk. Progress is reported through an
//! optional channel of [`WarmEvent`]s; the CLI drains it on a printer thread
//! while workers keep going.
//!
//! One image failing to render does not stop the pass: it becomes a
//! [`WarmEvent::Failed`] and counts towards [`WarmStats::failed`].

use crate::cache::ThumbnailCache;
use crate::imaging::ThumbnailBackend;
use crate::listing::Listing;
use rayon::prelude::*;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::mpsc::Sender;
use tracing::warn;

/// Progress of one image during a warm-up pass.
#[derive(Debug, Clone, PartialEq)]
pub enum WarmEvent {
    /// A thumbnail for the current version of the image was already on disk.
    Cached { index: usize, source: PathBuf },
    /// The thumbnail was rendered and stored.
    Generated {
        index: usize,
        source: PathBuf,
        bytes: usize,
    },
    /// Rendering or storing failed.
    Failed {
        index: usize,
        source: PathBuf,
        error: String,
    },
}

/// Summary of a warm-up pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WarmStats {
    pub cached: u32,
    pub generated: u32,
    pub failed: u32,
}

impl WarmStats {
    fn record(&mut self, event: &WarmEvent) {
        match event {
            WarmEvent::Cached { .. } => self.cached += 1,
            WarmEvent::Generated { .. } => self.generated += 1,
            WarmEvent::Failed { .. } => self.failed += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.cached + self.generated + self.failed
    }
}

impl fmt::Display for WarmStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cached > 0 {
            write!(
                f,
                "{} cached, {} generated ({} total)",
                self.cached,
                self.generated,
                self.total()
            )?;
        } else {
            write!(f, "{} generated", self.generated)?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        Ok(())
    }
}

/// Ensure every image of `listing` has a thumbnail of `max_dimension` in `cache`.
///
/// Runs on the current rayon pool. Events arrive in completion order, not
/// listing order; `index` is the image's position in the listing.
pub fn warm(
    backend: &impl ThumbnailBackend,
    cache: &ThumbnailCache,
    listing: &Listing,
    max_dimension: u32,
    progress: Option<Sender<WarmEvent>>,
) -> WarmStats {
    let stats = Mutex::new(WarmStats::default());
    let progress = progress.map(Mutex::new);

    listing
        .images
        .par_iter()
        .enumerate()
        .for_each(|(index, name)| {
            let source = listing.image_path(name);
            let event = match cache.get_or_create(backend, &source, max_dimension) {
                Ok(thumb) if thumb.cached => WarmEvent::Cached { index, source },
                Ok(thumb) => WarmEvent::Generated {
                    index,
                    source,
                    bytes: thumb.bytes.len(),
                },
                Err(e) => {
                    warn!(source = %source.display(), error = %e, "thumbnail warm-up failed");
                    WarmEvent::Failed {
                        index,
                        source,
                        error: e.to_string(),
                    }
                }
            };

            stats
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .record(&event);
            if let Some(tx) = &progress {
                // A dropped receiver only means nobody is listening.
                let _ = tx
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .send(event);
            }
        });

    stats
        .into_inner()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
