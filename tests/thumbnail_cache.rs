//! Thumbnail cache tests against the real `image`-backed renderer.

use image::{GenericImageView, RgbImage};
use pigeonhole::cache::{CacheError, ThumbnailCache};
use pigeonhole::imaging::{Quality, RustBackend};
use pigeonhole::listing;
use pigeonhole::media;
use pigeonhole::warm::{self, WarmStats};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn write_png(path: &Path, width: u32, height: u32, shade: u8) {
    RgbImage::from_fn(width, height, |x, _| image::Rgb([shade, (x % 256) as u8, 40]))
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

fn setup() -> (TempDir, PathBuf, ThumbnailCache) {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("batch");
    std::fs::create_dir(&source).unwrap();
    let cache = ThumbnailCache::open(tmp.path().join("thumbs")).unwrap();
    (tmp, source, cache)
}

#[test]
fn thumbnail_fits_the_requested_box() {
    let (_tmp, source, cache) = setup();
    let image = source.join("wide.png");
    write_png(&image, 600, 300, 10);

    let thumb = cache.get_or_create(&RustBackend::new(), &image, 300).unwrap();

    let decoded = image::load_from_memory(&thumb.bytes).unwrap();
    assert_eq!(decoded.dimensions(), (300, 150));
    assert!(!thumb.cached);
}

#[test]
fn repeated_request_is_served_from_disk() {
    let (_tmp, source, cache) = setup();
    let image = source.join("a.png");
    write_png(&image, 64, 64, 10);
    let backend = RustBackend::new();

    let first = cache.get_or_create(&backend, &image, 32).unwrap();
    let second = cache.get_or_create(&backend, &image, 32).unwrap();

    assert!(second.cached);
    assert_eq!(first.bytes, second.bytes);
    assert_eq!(first.path, second.path);
}

#[test]
fn editing_the_source_renders_a_new_entry() {
    let (_tmp, source, cache) = setup();
    let image = source.join("a.png");
    write_png(&image, 64, 64, 10);
    let backend = RustBackend::new();
    let before = cache.get_or_create(&backend, &image, 32).unwrap();

    write_png(&image, 64, 64, 250);
    std::fs::OpenOptions::new()
        .write(true)
        .open(&image)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
    let after = cache.get_or_create(&backend, &image, 32).unwrap();

    assert!(!after.cached);
    assert_ne!(before.key, after.key);
    assert_ne!(before.bytes, after.bytes);
    assert_eq!(cache.stats().unwrap().count, 2);
}

#[test]
fn sizes_and_qualities_are_separate_entries() {
    let (tmp, source, cache) = setup();
    let image = source.join("a.png");
    write_png(&image, 64, 64, 10);
    let backend = RustBackend::new();

    let small = cache.get_or_create(&backend, &image, 16).unwrap();
    let large = cache.get_or_create(&backend, &image, 48).unwrap();
    let low = ThumbnailCache::open(tmp.path().join("thumbs"))
        .unwrap()
        .with_quality(Quality::new(20))
        .get_or_create(&backend, &image, 48)
        .unwrap();

    assert_ne!(small.key, large.key);
    assert_ne!(large.key, low.key);
    assert!(!low.cached);
}

#[test]
fn corrupt_source_leaves_no_entry() {
    let (_tmp, source, cache) = setup();
    let image = source.join("broken.png");
    std::fs::write(&image, b"not really a png").unwrap();

    let err = cache
        .get_or_create(&RustBackend::new(), &image, 32)
        .unwrap_err();

    assert!(matches!(err, CacheError::Render { .. }));
    assert_eq!(err.kind().status_code(), 500);
    assert_eq!(std::fs::read_dir(cache.dir()).unwrap().count(), 0);
}

#[test]
fn missing_and_unsupported_sources_are_rejected() {
    let (_tmp, source, cache) = setup();
    let notes = source.join("notes.txt");
    std::fs::write(&notes, "text").unwrap();
    let backend = RustBackend::new();

    let missing = cache
        .get_or_create(&backend, &source.join("ghost.png"), 32)
        .unwrap_err();
    let unsupported = cache.get_or_create(&backend, &notes, 32).unwrap_err();

    assert_eq!(missing.kind().status_code(), 404);
    assert_eq!(unsupported.kind().status_code(), 400);
}

#[test]
fn clear_empties_the_cache() {
    let (_tmp, source, cache) = setup();
    let backend = RustBackend::new();
    for name in ["a.png", "b.png", "c.png"] {
        let image = source.join(name);
        write_png(&image, 20, 20, 10);
        cache.get_or_create(&backend, &image, 10).unwrap();
    }

    let outcome = cache.clear().unwrap();

    assert_eq!(outcome.deleted, 3);
    assert!(outcome.warnings.is_empty());
    let usage = cache.stats().unwrap();
    assert_eq!(usage.count, 0);
    assert_eq!(usage.total_size_mb(), 0.0);
}

#[test]
fn warm_fills_the_cache_for_a_listing() {
    let (_tmp, source, cache) = setup();
    for name in ["a.png", "b.png"] {
        write_png(&source.join(name), 40, 30, 10);
    }
    std::fs::write(source.join("c.png"), b"garbage").unwrap();
    let listing = listing::list(&source).unwrap();
    let backend = RustBackend::new();

    let first = warm::warm(&backend, &cache, &listing, 20, None);
    let second = warm::warm(&backend, &cache, &listing, 20, None);

    assert_eq!(
        first,
        WarmStats {
            cached: 0,
            generated: 2,
            failed: 1
        }
    );
    assert_eq!(second.cached, 2);
    assert_eq!(second.failed, 1);
}

#[test]
fn raw_fetch_returns_bytes_and_media_type() {
    let (_tmp, source, _cache) = setup();
    let image = source.join("a.png");
    write_png(&image, 4, 4, 10);

    let raw = media::read_image(&image).unwrap();

    assert_eq!(raw.media_type, "image/png");
    assert_eq!(raw.bytes, std::fs::read(&image).unwrap());
}
