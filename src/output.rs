//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Each image leads with its positional index and file name; the class (if
//! any) follows in brackets. Paths are secondary context on indented lines.
//!
//! # Output Format
//!
//! ## List
//!
//! ```text
//! /photos/batch (3 images, 2 classified)
//! 001 c.gif [zhengbao]
//! 002 b.png
//! 003 A.JPG [wubao]
//! ```
//!
//! ## Classify / Unclassify
//!
//! ```text
//! a.png → zhengbao
//!     Target: /photos/zhengbao/a.png
//!     Warning: /photos/wubao/a.png: Permission denied
//! ```
//!
//! ## Warm
//!
//! ```text
//! 001 c.gif: cached
//! 002 b.png: generated (12.4 KB)
//! 003 A.JPG: failed
//!     Error: ...
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::cache::{CacheUsage, ClearOutcome};
use crate::classify::{ClassifyOutcome, UnclassifyOutcome};
use crate::config::AppConfig;
use crate::listing::Listing;
use crate::types::Warning;
use crate::warm::WarmEvent;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn warning_lines(warnings: &[Warning]) -> impl Iterator<Item = String> + '_ {
    warnings.iter().map(|w| format!("    Warning: {}", w))
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Listing
// ============================================================================

/// Format a directory listing, one image per line in listing order.
pub fn format_listing(listing: &Listing) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({}, {} classified)",
        listing.path.display(),
        plural(listing.images.len(), "image", "images"),
        listing.classifications.len()
    )];
    for (i, name) in listing.images.iter().enumerate() {
        match listing.class_of(name) {
            Some(class) => lines.push(format!("{} {} [{}]", format_index(i + 1), name, class)),
            None => lines.push(format!("{} {}", format_index(i + 1), name)),
        }
    }
    lines
}

pub fn print_listing(listing: &Listing) {
    for line in format_listing(listing) {
        println!("{}", line);
    }
}

// ============================================================================
// Ledger
// ============================================================================

pub fn format_classify(outcome: &ClassifyOutcome) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{} → {}",
            file_name(&outcome.target_path),
            outcome.class_name
        ),
        format!("    Target: {}", outcome.target_path.display()),
    ];
    lines.extend(warning_lines(&outcome.warnings));
    lines
}

pub fn print_classify(outcome: &ClassifyOutcome) {
    for line in format_classify(outcome) {
        println!("{}", line);
    }
}

pub fn format_unclassify(outcome: &UnclassifyOutcome) -> Vec<String> {
    if outcome.removed {
        vec![format!("Removed {}", outcome.target_path.display())]
    } else {
        vec![format!(
            "Nothing to remove at {}",
            outcome.target_path.display()
        )]
    }
}

pub fn print_unclassify(outcome: &UnclassifyOutcome) {
    for line in format_unclassify(outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Cache
// ============================================================================

pub fn format_usage(usage: &CacheUsage) -> Vec<String> {
    vec![
        format!("Cache: {}", usage.cache_dir.display()),
        format!("    {}", usage),
    ]
}

pub fn print_usage(usage: &CacheUsage) {
    for line in format_usage(usage) {
        println!("{}", line);
    }
}

pub fn format_clear(outcome: &ClearOutcome) -> Vec<String> {
    let mut lines = vec![format!(
        "Deleted {}",
        plural(outcome.deleted, "thumbnail", "thumbnails")
    )];
    lines.extend(warning_lines(&outcome.warnings));
    lines
}

pub fn print_clear(outcome: &ClearOutcome) {
    for line in format_clear(outcome) {
        println!("{}", line);
    }
}

/// Format one warm-up event. Indices are shown 1-based.
pub fn format_warm_event(event: &WarmEvent) -> Vec<String> {
    match event {
        WarmEvent::Cached { index, source } => {
            vec![format!(
                "{} {}: cached",
                format_index(index + 1),
                file_name(source)
            )]
        }
        WarmEvent::Generated {
            index,
            source,
            bytes,
        } => vec![format!(
            "{} {}: generated ({:.1} KB)",
            format_index(index + 1),
            file_name(source),
            *bytes as f64 / 1024.0
        )],
        WarmEvent::Failed {
            index,
            source,
            error,
        } => vec![
            format!("{} {}: failed", format_index(index + 1), file_name(source)),
            format!("    Error: {}", error),
        ],
    }
}

// ============================================================================
// Config
// ============================================================================

/// Format the key bindings of a config, with each class's color.
pub fn format_shortcuts(config: &AppConfig) -> Vec<String> {
    let shortcuts = &config.shortcuts;
    let mut lines = vec![
        "Shortcuts".to_string(),
        format!("    next: {}", shortcuts.next),
        format!("    prev: {}", shortcuts.prev),
        format!("    clear: {}", shortcuts.clear),
    ];
    if !shortcuts.classes.is_empty() {
        lines.push("Classes".to_string());
    }
    for (key, class) in &shortcuts.classes {
        match shortcuts.class_colors.get(key) {
            Some(color) => lines.push(format!("    {} → {} ({})", key, class, color)),
            None => lines.push(format!("    {} → {}", key, class)),
        }
    }
    lines
}

pub fn print_shortcuts(config: &AppConfig) {
    for line in format_shortcuts(config) {
        println!("{}", line);
    }
}
