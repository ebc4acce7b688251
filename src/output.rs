//! CLI output formatting for the build pipeline.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. The primary display
//! for every entity (album, photo) is its semantic identity (positional index
//! and title or slug) with source paths shown as secondary context via
//! indented `Source:` lines. This makes the output readable as a content
//! inventory while still letting users trace data back to specific files.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Albums
//! 001 Main (2 photos)
//!     001 dusk
//!         Source: dusk.jpg
//! 002 Landscapes (5 photos)
//!     Source: 010-Landscapes/
//!     001 dawn
//!         Source: 010-Landscapes/dawn.jpg
//!         Captured: 2024-05-01 06:12:00
//! ```
//!
//! ## Process
//!
//! ```text
//! Landscapes (5 photos)
//!     001 dawn
//!         Source: 010-Landscapes/dawn.jpg
//!         thumbnail-jpeg: cached
//!         display-avif: encoded
//!     002 (broken.jpg)
//!         Skipped: cannot decode ...
//! ```
//!
//! Albums are processed concurrently, so the album header is repeated
//! whenever a photo from a different album than the previous line finishes.
//!
//! ## Generate
//!
//! ```text
//! Home → index.html
//! 001 Landscapes → landscapes.html
//! Generated 1 album, 5 photos
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects. The one piece of state, the album whose header
//! was printed last, lives in [`ProcessPrinter`].

use crate::manifest::SiteModel;
use crate::pipeline::BuildReport;
use crate::process::{AlbumLabel, ProcessEvent, VariantStatus};
use crate::resolve::AlbumPlan;
use std::path::Path;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Format an entity header: positional index + title, with optional photo count.
///
/// ```text
/// 001 Landscapes (5 photos)
/// 001 Landscapes
/// ```
fn entity_header(index: usize, title: &str, count: Option<usize>) -> String {
    match count {
        Some(n) => format!("{} {} ({})", format_index(index), title, photo_count(n)),
        None => format!("{} {}", format_index(index), title),
    }
}

fn photo_count(n: usize) -> String {
    if n == 1 {
        "1 photo".to_string()
    } else {
        format!("{n} photos")
    }
}

/// Format a photo line: the slug when known, the filename in parens otherwise.
///
/// ```text
/// 001 dawn
/// 001 (broken.jpg)
/// ```
fn image_line(index: usize, slug: Option<&str>, filename: &str) -> String {
    match slug {
        Some(s) if !s.is_empty() => format!("{} {}", format_index(index), s),
        _ => format!("{} ({})", format_index(index), filename),
    }
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// Scan output
// ============================================================================

/// Format the resolved album inventory.
pub fn format_scan_output(plans: &[AlbumPlan]) -> Vec<String> {
    let mut lines = vec!["Albums".to_string()];
    if plans.is_empty() {
        lines.push(format!("{}(no photos found)", indent(1)));
    }

    for (i, plan) in plans.iter().enumerate() {
        lines.push(entity_header(i + 1, &plan.title, Some(plan.photos.len())));
        if !plan.rel_path.as_os_str().is_empty() {
            lines.push(format!("{}Source: {}/", indent(1), slash_path(&plan.rel_path)));
        }
        for (j, photo) in plan.photos.iter().enumerate() {
            lines.push(format!(
                "{}{}",
                indent(1),
                image_line(j + 1, Some(photo.slug.as_str()), &photo.file_name)
            ));
            lines.push(format!("{}Source: {}", indent(2), slash_path(&photo.rel_path)));
            match photo.captured_at {
                Some(at) => lines.push(format!("{}Captured: {}", indent(2), at)),
                None if photo.sort_fallback => {
                    lines.push(format!("{}Captured: unknown (sorted by filename)", indent(2)))
                }
                None => {}
            }
        }
    }
    lines
}

/// Print scan output to stdout.
pub fn print_scan_output(plans: &[AlbumPlan]) {
    for line in format_scan_output(plans) {
        println!("{}", line);
    }
}

// ============================================================================
// Process output
// ============================================================================

/// Format a single process progress event as display lines, without the
/// album header.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::PhotoProcessed {
            index,
            slug,
            source_path,
            variants,
            ..
        } => {
            let mut lines = vec![
                format!("{}{}", indent(1), image_line(*index, Some(slug.as_str()), source_path)),
                format!("{}Source: {}", indent(2), source_path),
            ];
            for variant in variants {
                let status_str = match variant.status {
                    VariantStatus::Cached => "cached",
                    VariantStatus::Copied => "copied",
                    VariantStatus::Encoded => "encoded",
                };
                lines.push(format!("{}{}: {}", indent(2), variant.label, status_str));
            }
            lines
        }
        ProcessEvent::PhotoSkipped {
            index,
            source_path,
            reason,
            ..
        } => {
            let filename = Path::new(source_path)
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| source_path.clone());
            vec![
                format!("{}{}", indent(1), image_line(*index, None, &filename)),
                format!("{}Skipped: {}", indent(2), reason),
            ]
        }
    }
}

/// Groups photo lines under their album header as events arrive.
#[derive(Debug, Default)]
pub struct ProcessPrinter {
    current: Option<AlbumLabel>,
}

impl ProcessPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines for `event`, led by the album header if the album changed.
    pub fn format(&mut self, event: &ProcessEvent) -> Vec<String> {
        let album = event.album();
        let mut lines = Vec::new();
        if self.current.as_ref() != Some(album) {
            lines.push(format!("{} ({})", album.title, photo_count(album.photo_count)));
            self.current = Some(album.clone());
        }
        lines.extend(format_process_event(event));
        lines
    }

    pub fn print(&mut self, event: &ProcessEvent) {
        for line in self.format(event) {
            println!("{}", line);
        }
    }
}

// ============================================================================
// Generate output
// ============================================================================

/// Format the generated pages.
pub fn format_generate_output(model: &SiteModel) -> Vec<String> {
    let mut lines = vec!["Home \u{2192} index.html".to_string()];
    for (i, album) in model.albums.iter().enumerate() {
        lines.push(format!(
            "{} \u{2192} {}",
            entity_header(i + 1, &album.title, Some(album.photo_count)),
            album.page_name()
        ));
    }
    let albums = match model.albums.len() {
        1 => "1 album".to_string(),
        n => format!("{n} albums"),
    };
    lines.push(format!("Generated {}, {}", albums, photo_count(model.photo_count)));
    lines
}

/// Print generate output to stdout.
pub fn print_generate_output(model: &SiteModel) {
    for line in format_generate_output(model) {
        println!("{}", line);
    }
}

// ============================================================================
// Run summary
// ============================================================================

/// Cache statistics, pruning and the skipped-photo warnings.
pub fn format_build_summary(report: &BuildReport) -> Vec<String> {
    let mut lines = vec![format!("Cache: {}", report.cache_stats)];
    if report.pruned > 0 {
        lines.push(format!("Pruned: {} stale derivatives", report.pruned));
    }
    if !report.skipped.is_empty() {
        lines.push(format!(
            "Warning: skipped {}",
            photo_count(report.skipped.len())
        ));
        for skipped in &report.skipped {
            lines.push(format!(
                "{}{}: {}",
                indent(1),
                slash_path(&skipped.source),
                skipped.error
            ));
        }
    }
    lines
}

/// Print the run summary to stdout.
pub fn print_build_summary(report: &BuildReport) {
    for line in format_build_summary(report) {
        println!("{}", line);
    }
}
