//! Application configuration.
//!
//! Handles loading, validating, and merging `config.toml`. The config is a
//! passive settings record: key bindings for the browsing UI, the color of
//! each class, and thumbnail settings. Nothing in the ledger or the cache
//! reads it implicitly; callers pass the values they need.
//!
//! ## Config File Location
//!
//! `config.toml` is read from the config directory (`--config-dir`,
//! defaulting to the current directory). A missing file means stock
//! defaults.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [shortcuts]
//! next = "ArrowDown"        # Move to the next image
//! prev = "ArrowUp"          # Move to the previous image
//! clear = "c"               # Remove the current image's class
//!
//! [shortcuts.classes]       # Key → class folder name
//! 1 = "zhengbao"
//! 2 = "wubao"
//!
//! [shortcuts.class_colors]  # Key → badge color
//! 1 = "#28a745"
//! 2 = "#dc3545"
//!
//! [thumbnails]
//! size = 300                # Longest edge of grid thumbnails
//! quality = 85              # JPEG quality (1-100)
//! # cache_dir = "/var/cache/pigeonhole"
//!
//! [processing]
//! max_processes = 4         # Max parallel warm-up workers (omit for auto)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want. Tables are
//! merged key by key, except the `classes` and `class_colors` maps, which
//! replace the defaults whole so a config can drop a default binding.
//!
//! Unknown keys are rejected to catch typos early.
//!
//! ## Sharing
//!
//! [`SharedConfig`] holds the active config behind an `Arc`. Readers take a
//! snapshot; writers validate and swap the whole value, so a reader sees
//! either the old config or the new one, never a mix.

use crate::classify::validate_class_name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

const CONFIG_FILENAME: &str = "config.toml";

/// Tables that an overlay replaces whole instead of merging.
const REPLACED_TABLES: &[&str] = &["classes", "class_colors"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Key bindings and class colors for the browsing UI.
    pub shortcuts: ShortcutConfig,
    /// Thumbnail size, quality and cache location.
    pub thumbnails: ThumbnailsConfig,
    /// Parallel warm-up settings.
    pub processing: ProcessingConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let shortcuts = &self.shortcuts;
        for (name, key) in [
            ("next", &shortcuts.next),
            ("prev", &shortcuts.prev),
            ("clear", &shortcuts.clear),
        ] {
            if key.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "shortcuts.{name} must not be empty"
                )));
            }
        }
        for (key, class) in &shortcuts.classes {
            if key.is_empty() {
                return Err(ConfigError::Validation(
                    "shortcuts.classes keys must not be empty".into(),
                ));
            }
            if validate_class_name(class).is_err() {
                return Err(ConfigError::Validation(format!(
                    "shortcuts.classes.{key} = {class:?} is not a valid folder name"
                )));
            }
        }
        for (key, color) in &shortcuts.class_colors {
            if !is_hex_color(color) {
                return Err(ConfigError::Validation(format!(
                    "shortcuts.class_colors.{key} = {color:?} must look like #rrggbb"
                )));
            }
        }
        if self.thumbnails.size == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.size must be at least 1".into(),
            ));
        }
        if !(1..=100).contains(&self.thumbnails.quality) {
            return Err(ConfigError::Validation(
                "thumbnails.quality must be 1-100".into(),
            ));
        }
        Ok(())
    }

    /// Class bound to a key, if any.
    pub fn class_for_key(&self, key: &str) -> Option<&str> {
        self.shortcuts.classes.get(key).map(String::as_str)
    }

    /// Key bound to a class, if any. Used to find the class's color.
    pub fn key_for_class(&self, class: &str) -> Option<&str> {
        self.shortcuts
            .classes
            .iter()
            .find(|(_, c)| c.as_str() == class)
            .map(|(k, _)| k.as_str())
    }

    /// Badge color of a class, looked up through its key.
    pub fn color_for_class(&self, class: &str) -> Option<&str> {
        let key = self.key_for_class(class)?;
        self.shortcuts.class_colors.get(key).map(String::as_str)
    }

    /// Serialize as TOML (the effective config, not the commented stock file).
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Key bindings for the browsing UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShortcutConfig {
    pub next: String,
    pub prev: String,
    pub clear: String,
    /// Key → class folder name.
    pub classes: BTreeMap<String, String>,
    /// Key → `#rrggbb` badge color.
    pub class_colors: BTreeMap<String, String>,
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        let classes = [("1", "zhengbao"), ("2", "wubao")];
        let colors = [
            ("1", "#28a745"),
            ("2", "#dc3545"),
            ("3", "#007bff"),
            ("4", "#fd7e14"),
            ("5", "#6f42c1"),
        ];
        Self {
            next: "ArrowDown".to_string(),
            prev: "ArrowUp".to_string(),
            clear: "c".to_string(),
            classes: classes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            class_colors: colors
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Thumbnail settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    /// Longest edge of a thumbnail in pixels.
    pub size: u32,
    /// JPEG quality (1-100).
    pub quality: u32,
    /// Cache location. When absent, a directory under the system temp dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            size: crate::imaging::DEFAULT_MAX_DIMENSION,
            quality: 85,
            cache_dir: None,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel thumbnail workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Shared, replace-whole config
// =============================================================================

/// The active config, replaced atomically as a whole.
#[derive(Debug, Default)]
pub struct SharedConfig {
    current: RwLock<Arc<AppConfig>>,
}

impl SharedConfig {
    pub fn new(config: AppConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// The config as of now. Later replacements do not affect the snapshot.
    pub fn snapshot(&self) -> Arc<AppConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validate `config` and make it the active value.
    ///
    /// An invalid config is rejected and the previous value stays active.
    pub fn replace(&self, config: AppConfig) -> Result<Arc<AppConfig>, ConfigError> {
        config.validate()?;
        let next = Arc::new(config);
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);
        Ok(next)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Tables named in `REPLACED_TABLES` are replaced whole.
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) if !REPLACED_TABLES.contains(&key.as_str()) => {
                        merge_toml(base_val, overlay_val)
                    }
                    _ => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Path of `config.toml` inside a config directory.
pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILENAME)
}

/// Load a `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let path = config_path(dir);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Validate and write `config` as `config.toml` in the given directory.
pub fn save_config(dir: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    config.validate()?;
    fs::create_dir_all(dir)?;
    fs::write(config_path(dir), config.to_toml_string()?)?;
    Ok(())
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Pigeonhole Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Key bindings
# ---------------------------------------------------------------------------
[shortcuts]
# Move to the next / previous image.
next = "ArrowDown"
prev = "ArrowUp"

# Remove the current image from its class.
clear = "c"

# Key -> class folder name. Class folders are created next to the source
# directory on first use. This table replaces the defaults whole.
[shortcuts.classes]
1 = "zhengbao"
2 = "wubao"

# Key -> badge color (#rrggbb). A class takes the color of its key.
[shortcuts.class_colors]
1 = "#28a745"
2 = "#dc3545"
3 = "#007bff"
4 = "#fd7e14"
5 = "#6f42c1"

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# Longest edge of grid thumbnails, in pixels.
size = 300

# JPEG encoding quality (1 = worst, 100 = best).
quality = 85

# Where rendered thumbnails are kept.
# Omit to use a directory under the system temp dir.
# cache_dir = "/var/cache/pigeonhole"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for `warm`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
