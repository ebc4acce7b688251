//! HTML site generation.
//!
//! Final stage of the photfolio build pipeline. Takes the [`SiteModel`] and
//! writes the static HTML pages next to the derivatives.
//!
//! ## Generated Pages
//!
//! - **Index page** (`/index.html`): Album grid, one cover thumbnail per album
//! - **Album pages** (`/{album-slug}.html`): Photo grid for one album
//!
//! ## Features
//!
//! - **Modern formats with a fallback**: every photo is a `<picture>` with AVIF
//!   and/or WebP `<source>`s and a JPEG `<img>`
//! - **Configurable grid**: `grid.columns` becomes the `--grid-columns` custom property
//! - **Footer**: text template plus links, Instagram and Email rendered as icons
//! - **Optional EXIF captions** when `exif.display` is on
//!
//! ## Output Structure
//!
//! ```text
//! dist/
//! ├── index.html                 # Album grid
//! ├── landscapes.html            # Album page
//! ├── images/landscapes/...      # Derivatives (written by the variant generator)
//! ├── styles/                    # Copied from --styles, *.css linked from every page
//! └── assets/                    # Copied from --assets (favicon etc.)
//! ```
//!
//! ## HTML Generation
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! Templates are type-safe Rust code with automatic XSS escaping. The base
//! stylesheet `static/style.css` is embedded at compile time.

use crate::config::{FooterConfig, LinkIcon};
use crate::manifest::{Album, Photo, SiteModel};
use crate::types::SizeClass;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const CSS_STATIC: &str = include_str!("../static/style.css");

/// Output subdirectory for copied stylesheets.
pub const STYLES_DIR: &str = "styles";
/// Output subdirectory for copied assets.
pub const ASSETS_DIR: &str = "assets";

const INSTAGRAM_ICON: &str = r#"<svg viewBox="0 0 24 24" aria-hidden="true"><rect x="3" y="3" width="18" height="18" rx="5"/><circle cx="12" cy="12" r="4"/><circle cx="17.5" cy="6.5" r="0.5"/></svg>"#;
const EMAIL_ICON: &str = r#"<svg viewBox="0 0 24 24" aria-hidden="true"><rect x="3" y="5" width="18" height="14" rx="2"/><polyline points="3,7 12,13 21,7"/></svg>"#;

/// Static files staged into the output directory, as pages reference them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticFiles {
    /// `styles/**/*.css`, sorted.
    pub stylesheets: Vec<String>,
    /// First `assets/favicon.*`, if any.
    pub favicon: Option<String>,
}

/// Copy the styles and assets directories into the output directory.
///
/// Missing source directories are skipped. Hidden files are not copied.
pub fn copy_static_dirs(
    styles: &Path,
    assets: &Path,
    output_dir: &Path,
) -> Result<StaticFiles, GenerateError> {
    let mut staged = StaticFiles::default();

    for (src, name) in [(styles, STYLES_DIR), (assets, ASSETS_DIR)] {
        if !src.is_dir() {
            debug!(path = %src.display(), "static directory not found, skipping");
            continue;
        }
        let mut copied = Vec::new();
        copy_dir_recursive(src, &output_dir.join(name), Path::new(name), &mut copied)?;
        copied.sort();
        info!(from = %src.display(), files = copied.len(), "copied static files");

        if name == STYLES_DIR {
            staged.stylesheets = copied
                .iter()
                .filter(|p| p.ends_with(".css"))
                .cloned()
                .collect();
        } else {
            staged.favicon = copied.into_iter().find(|p| {
                Path::new(p)
                    .file_stem()
                    .is_some_and(|stem| stem == "favicon")
            });
        }
    }
    Ok(staged)
}

fn copy_dir_recursive(
    src: &Path,
    dst: &Path,
    rel: &Path,
    copied: &mut Vec<String>,
) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        let src_path = entry.path();
        let dst_path = dst.join(&name);
        let rel_path: PathBuf = rel.join(&name);

        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path, &rel_path, copied)?;
        } else if src_path.is_file() {
            fs::copy(&src_path, &dst_path)?;
            copied.push(
                rel_path
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/"),
            );
        }
    }
    Ok(())
}

/// Generate CSS custom properties from the layout settings.
pub fn generate_layout_css(grid_columns: u32) -> String {
    format!(
        r#":root {{
    --grid-columns: {grid_columns};
    --thumbnail-gap: 0.5rem;
    --grid-padding: clamp(1rem, 3vw, 2.5rem);
}}"#
    )
}

/// Write `index.html` and one page per album. Returns the page file names.
pub fn generate(
    model: &SiteModel,
    statics: &StaticFiles,
    output_dir: &Path,
    year: i32,
) -> Result<Vec<String>, GenerateError> {
    let css = format!("{}\n\n{}", generate_layout_css(model.grid_columns), CSS_STATIC);
    let page = PageContext {
        model,
        statics,
        css: &css,
        year,
    };

    fs::create_dir_all(output_dir)?;
    let mut written = Vec::with_capacity(model.albums.len() + 1);

    let index_html = render_index(&page);
    fs::write(output_dir.join("index.html"), index_html.into_string())?;
    written.push("index.html".to_string());

    for album in &model.albums {
        let name = album.page_name();
        let album_html = render_album_page(&page, album);
        fs::write(output_dir.join(&name), album_html.into_string())?;
        debug!(album = %album.slug, page = %name, "generated album page");
        written.push(name);
    }

    info!(pages = written.len(), "site generated at {}", output_dir.display());
    Ok(written)
}

/// Everything shared by every page.
struct PageContext<'a> {
    model: &'a SiteModel,
    statics: &'a StaticFiles,
    css: &'a str,
    year: i32,
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(page: &PageContext<'_>, title: &str, content: Markup) -> Markup {
    let description = &page.model.site.description;
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                @if !description.is_empty() {
                    meta name="description" content=(description);
                }
                @if let Some(favicon) = &page.statics.favicon {
                    link rel="icon" href=(favicon);
                }
                style { (PreEscaped(page.css)) }
                @for sheet in &page.statics.stylesheets {
                    link rel="stylesheet" href=(sheet);
                }
            }
            body {
                (content)
                (render_footer(&page.model.footer, &page.model.site.author, page.year))
            }
        }
    }
}

/// Renders the site header with the album navigation
fn site_header(model: &SiteModel, current: Option<&str>) -> Markup {
    html! {
        header.site-header {
            div {
                p.site-title { a href="index.html" { (model.site.title) } }
                @if !model.site.description.is_empty() {
                    p.site-description { (model.site.description) }
                }
            }
            @if !model.albums.is_empty() {
                nav.album-nav {
                    ul {
                        @for album in &model.albums {
                            @let is_current = current == Some(album.slug.as_str());
                            li class=[is_current.then_some("current")] {
                                a href=(album.page_name()) { (album.title) }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn icon_svg(icon: LinkIcon) -> Markup {
    match icon {
        LinkIcon::Instagram => PreEscaped(INSTAGRAM_ICON.to_string()),
        LinkIcon::Email => PreEscaped(EMAIL_ICON.to_string()),
    }
}

/// Renders the footer: substituted text, then links (icons where known)
pub fn render_footer(footer: &FooterConfig, author: &str, year: i32) -> Markup {
    let text = footer.render_text(year, author);
    let text = text.trim();
    html! {
        footer.site-footer {
            @if !text.is_empty() {
                p.footer-text { (text) }
            }
            @if !footer.links.is_empty() {
                ul.footer-links {
                    @for link in &footer.links {
                        li {
                            @match link.icon() {
                                Some(icon) => {
                                    a href=(link.href()) title=(link.label) aria-label=(link.label) {
                                        (icon_svg(icon))
                                    }
                                }
                                None => {
                                    a href=(link.href()) { (link.label) }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// `<picture>` for one size: modern sources first, JPEG as the `<img>`
fn render_picture(photo: &Photo, size: SizeClass, alt: &str) -> Markup {
    let sources = photo.modern_sources(size);
    html! {
        picture {
            @for (format, asset) in &sources {
                source type=(format.mime_type()) srcset=(asset.path);
            }
            @if let Some(fallback) = photo.fallback(size) {
                img src=(fallback.path) width=(fallback.width) height=(fallback.height) alt=(alt) loading="lazy";
            }
        }
    }
}

// ============================================================================
// Page Renderers
// ============================================================================

/// Renders the index/home page with album grid
fn render_index(page: &PageContext<'_>) -> Markup {
    let model = page.model;
    let content = html! {
        (site_header(model, None))
        main.index-page {
            @if model.albums.is_empty() {
                p.empty-album { "No albums yet." }
            }
            div.album-grid {
                @for album in &model.albums {
                    a.album-card href=(album.page_name()) {
                        @match album.cover_photo() {
                            Some(cover) => { (render_picture(cover, SizeClass::Thumbnail, &album.title)) }
                            None => { div.album-placeholder {} }
                        }
                        span.album-title { (album.title) }
                        span.album-count { (photo_count_label(album.photo_count)) }
                    }
                }
            }
        }
    };

    base_document(page, &model.site.title, content)
}

fn photo_count_label(count: usize) -> String {
    match count {
        1 => "1 photo".to_string(),
        n => format!("{n} photos"),
    }
}

/// Renders an album page with the photo grid
fn render_album_page(page: &PageContext<'_>, album: &Album) -> Markup {
    let model = page.model;
    let content = html! {
        (site_header(model, Some(&album.slug)))
        main.album-page {
            header.album-header {
                h1 { (album.title) }
            }
            @if album.photos.is_empty() {
                p.empty-album { "This album has no photos." }
            }
            div.photo-grid {
                @for (idx, photo) in album.photos.iter().enumerate() {
                    @let alt = format!("{} - Photo {}", album.title, idx + 1);
                    figure.photo id=(photo.slug) {
                        @match photo.fallback(SizeClass::Display) {
                            Some(display) => {
                                a href=(display.path) { (render_picture(photo, SizeClass::Thumbnail, &alt)) }
                            }
                            None => { (render_picture(photo, SizeClass::Thumbnail, &alt)) }
                        }
                        @if model.exif_display {
                            @if let Some(exif) = &photo.exif {
                                figcaption {
                                    dl.exif {
                                        @for entry in &exif.entries {
                                            dt { (entry.label) }
                                            dd { (entry.value) }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    };

    let title = format!("{} · {}", album.title, model.site.title);
    base_document(page, &title, content)
}

// ============================================================================
// Tests
// ============================================================================
