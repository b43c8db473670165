//! Pure calculation functions for thumbnail dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the dimensions of an image scaled to fit inside a square box.
///
/// Aspect ratio is preserved and the image is never enlarged: a source that
/// already fits is returned unchanged. Each output edge is at least 1px.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `max_dimension` - Side of the bounding box in pixels
///
/// # Returns
/// * `(width, height)` - Output dimensions, neither exceeding `max_dimension`
///
/// # Examples
/// ```
/// # use pigeonhole::imaging::fit_within;
/// // 1200x800 landscape into a 300px box → 300x200
/// assert_eq!(fit_within((1200, 800), 300), (300, 200));
///
/// // Small images are left alone
/// assert_eq!(fit_within((120, 80), 300), (120, 80));
/// ```
pub fn fit_within(source: (u32, u32), max_dimension: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    let max_dimension = max_dimension.max(1);

    if src_w <= max_dimension && src_h <= max_dimension {
        return source;
    }

    let scale = max_dimension as f64 / src_w.max(src_h) as f64;
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_dimension);
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_dimension);
    (w, h)
}

/// Whether rendering at `max_dimension` requires a resize at all.
pub fn needs_resize(source: (u32, u32), max_dimension: u32) -> bool {
    fit_within(source, max_dimension) != source
}
