//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! serialized to a TOML table, the user's file is merged on top of it key by
//! key, and the result is deserialized and validated before anything touches
//! the output directory.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! title = "Portfolio"
//! author = ""
//! description = ""
//!
//! [grid]
//! columns = 3               # Thumbnails per row on album pages
//!
//! [image]
//! quality = 90              # Display-size quality (0-100)
//! thumbnail_quality = 80    # Thumbnail quality (0-100)
//! progressive = true        # Progressive JPEG output
//! formats = ["jpeg", "avif"]
//!
//! [image.max_dimensions]
//! thumbnail = 400           # Longer edge, pixels
//! display = 2048
//!
//! [exif]
//! strip = true              # Remove EXIF from every derivative
//! display = false           # Show camera details on album pages
//!
//! [sorting]
//! key = "filename"          # or "metadata-timestamp"
//! missing_timestamp = "last"
//!
//! [albums]
//! allow_empty = true
//! nesting = "flatten"       # or "reject"
//! default_title = "Main"
//!
//! [footer]
//! text = "© {year} {author}"
//! links = []
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::types::{OutputFormat, SizeClass};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub site: SiteInfo,
    pub grid: GridConfig,
    pub image: ImageConfig,
    pub exif: ExifConfig,
    pub sorting: SortingConfig,
    pub albums: AlbumsConfig,
    pub footer: FooterConfig,
    pub processing: ProcessingConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image.quality > 100 {
            return Err(ConfigError::Validation("image.quality must be 0-100".into()));
        }
        if self.image.thumbnail_quality > 100 {
            return Err(ConfigError::Validation(
                "image.thumbnail_quality must be 0-100".into(),
            ));
        }
        for (name, value) in [
            ("thumbnail", self.image.max_dimensions.thumbnail),
            ("display", self.image.max_dimensions.display),
        ] {
            if value == 0 || value > MAX_DIMENSION_LIMIT {
                return Err(ConfigError::Validation(format!(
                    "image.max_dimensions.{name} must be 1-{MAX_DIMENSION_LIMIT}"
                )));
            }
        }
        let formats = &self.image.formats;
        if !formats.contains(&OutputFormat::Jpeg) {
            return Err(ConfigError::Validation(
                "image.formats must include \"jpeg\" as the legacy fallback".into(),
            ));
        }
        if !formats.iter().any(|f| f.is_modern()) {
            return Err(ConfigError::Validation(
                "image.formats must include at least one of \"webp\" or \"avif\"".into(),
            ));
        }
        for (i, format) in formats.iter().enumerate() {
            if formats[..i].contains(format) {
                return Err(ConfigError::Validation(format!(
                    "image.formats lists \"{format}\" more than once"
                )));
            }
        }
        if self.grid.columns == 0 || self.grid.columns > 12 {
            return Err(ConfigError::Validation("grid.columns must be 1-12".into()));
        }
        if self.albums.default_title.trim().is_empty() {
            return Err(ConfigError::Validation(
                "albums.default_title must not be empty".into(),
            ));
        }
        if let Some(link) = self
            .footer
            .links
            .iter()
            .find(|l| l.label.trim().is_empty() || l.url.trim().is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "footer.links entries need both a label and a url (got label {:?}, url {:?})",
                link.label, link.url
            )));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Largest edge a derivative may have; baseline JPEG stores dimensions as u16.
pub const MAX_DIMENSION_LIMIT: u32 = 65_535;

/// Site identity shown in page titles and the footer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteInfo {
    pub title: String,
    pub author: String,
    pub description: String,
}

impl Default for SiteInfo {
    fn default() -> Self {
        Self {
            title: "Portfolio".to_string(),
            author: String::new(),
            description: String::new(),
        }
    }
}

/// Album page grid layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub columns: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { columns: 3 }
    }
}

/// Derivative generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageConfig {
    /// Quality for display-size derivatives (0-100).
    pub quality: u32,
    /// Quality for thumbnails (0-100).
    pub thumbnail_quality: u32,
    /// Write progressive JPEGs.
    pub progressive: bool,
    /// Output formats. Must contain `jpeg` plus at least one modern format.
    pub formats: Vec<OutputFormat>,
    pub max_dimensions: MaxDimensions,
}

impl ImageConfig {
    pub fn max_dimension(&self, size: SizeClass) -> u32 {
        match size {
            SizeClass::Thumbnail => self.max_dimensions.thumbnail,
            SizeClass::Display => self.max_dimensions.display,
        }
    }

    pub fn quality_for(&self, size: SizeClass) -> u32 {
        match size {
            SizeClass::Thumbnail => self.thumbnail_quality,
            SizeClass::Display => self.quality,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            quality: 90,
            thumbnail_quality: 80,
            progressive: true,
            formats: vec![OutputFormat::Jpeg, OutputFormat::Avif],
            max_dimensions: MaxDimensions::default(),
        }
    }
}

/// Longer-edge bound per size class, in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaxDimensions {
    pub thumbnail: u32,
    pub display: u32,
}

impl Default for MaxDimensions {
    fn default() -> Self {
        Self {
            thumbnail: 400,
            display: 2048,
        }
    }
}

/// EXIF handling. `strip` and `display` are independent: camera details can
/// be shown on the page while the files themselves carry no metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExifConfig {
    pub strip: bool,
    pub display: bool,
}

impl Default for ExifConfig {
    fn default() -> Self {
        Self {
            strip: true,
            display: false,
        }
    }
}

/// Photo ordering within an album.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SortingConfig {
    pub key: SortKey,
    /// Where photos without a capture timestamp go under `metadata-timestamp`.
    pub missing_timestamp: MissingTimestamp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    Filename,
    MetadataTimestamp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingTimestamp {
    #[default]
    Last,
    First,
}

/// Album discovery policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlbumsConfig {
    /// Keep albums that end up with no photos. When false, an empty album
    /// (or an empty site) fails the build.
    pub allow_empty: bool,
    pub nesting: NestingPolicy,
    /// Title of the album formed by images at the top of the photo root.
    pub default_title: String,
}

impl Default for AlbumsConfig {
    fn default() -> Self {
        Self {
            allow_empty: true,
            nesting: NestingPolicy::default(),
            default_title: "Main".to_string(),
        }
    }
}

/// What to do with directories nested inside an album directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NestingPolicy {
    /// Images at any depth belong to their top-level album.
    #[default]
    Flatten,
    /// Nested directories are a scan error.
    Reject,
}

/// Page footer: a text template plus social/contact links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FooterConfig {
    /// `{year}` and `{author}` are substituted at render time.
    pub text: String,
    pub links: Vec<FooterLink>,
}

impl FooterConfig {
    pub fn render_text(&self, year: i32, author: &str) -> String {
        self.text
            .replace("{year}", &year.to_string())
            .replace("{author}", author)
    }
}

impl Default for FooterConfig {
    fn default() -> Self {
        Self {
            text: "© {year} {author}".to_string(),
            links: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FooterLink {
    pub label: String,
    pub url: String,
}

/// Links that render as an icon instead of their label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkIcon {
    Instagram,
    Email,
}

impl FooterLink {
    pub fn icon(&self) -> Option<LinkIcon> {
        let label = self.label.trim();
        if label.eq_ignore_ascii_case("instagram") {
            Some(LinkIcon::Instagram)
        } else if label.eq_ignore_ascii_case("email") {
            Some(LinkIcon::Email)
        } else {
            None
        }
    }

    /// Link target; bare addresses on an Email link get a `mailto:` scheme.
    pub fn href(&self) -> String {
        let url = self.url.trim();
        if self.icon() == Some(LinkIcon::Email) && !url.contains(':') {
            format!("mailto:{url}")
        } else {
            url.to_string()
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
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

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, arrays included.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(config_path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given `config.toml` path.
///
/// A missing file yields the stock defaults. Otherwise user values are merged
/// on top of the defaults, unknown keys are rejected, and the result is
/// validated.
pub fn load_config(config_path: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(config_path)?;
    if overlay.is_none() {
        tracing::debug!(path = %config_path.display(), "no config file, using stock defaults");
    }
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Photfolio Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Site identity
# ---------------------------------------------------------------------------
[site]
title = "Portfolio"
author = ""
description = ""

# ---------------------------------------------------------------------------
# Album page layout
# ---------------------------------------------------------------------------
[grid]
# Thumbnails per row (1-12).
columns = 3

# ---------------------------------------------------------------------------
# Derivative images
# ---------------------------------------------------------------------------
[image]
# Encoding quality for display-size images (0-100).
quality = 90

# Encoding quality for thumbnails (0-100).
thumbnail_quality = 80

# Write progressive JPEGs (render coarse-to-fine while loading).
progressive = true

# Output formats. "jpeg" is required as the fallback; at least one of
# "webp" or "avif" must be present.
formats = ["jpeg", "avif"]

# Longer-edge limit per size class. Images are never upscaled.
[image.max_dimensions]
thumbnail = 400
display = 2048

# ---------------------------------------------------------------------------
# EXIF metadata
# ---------------------------------------------------------------------------
[exif]
# Remove EXIF (camera, GPS, orientation) from every derivative.
strip = true

# Show a camera/lens/exposure summary under each photo.
display = false

# ---------------------------------------------------------------------------
# Photo ordering
# ---------------------------------------------------------------------------
[sorting]
# "filename" (natural order: img2 before img10) or "metadata-timestamp"
# (EXIF capture time).
key = "filename"

# With "metadata-timestamp": put photos lacking a timestamp "last" or "first".
missing_timestamp = "last"

# ---------------------------------------------------------------------------
# Albums
# ---------------------------------------------------------------------------
[albums]
# Keep albums without photos. When false, an empty album fails the build.
allow_empty = true

# Directories inside an album: "flatten" into the album, or "reject".
nesting = "flatten"

# Title of the album made from images at the top of the photo directory.
default_title = "Main"

# ---------------------------------------------------------------------------
# Footer
# ---------------------------------------------------------------------------
[footer]
# {year} and {author} are replaced when pages are rendered.
text = "© {year} {author}"

# Links shown in the footer. "Instagram" and "Email" render as icons.
# links = [
#     { label = "Instagram", url = "https://instagram.com/you" },
#     { label = "Email", url = "you@example.com" },
# ]
links = []

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image workers. Omit to use all CPU cores.
# max_processes = 4
"##
}
