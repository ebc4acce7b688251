//! # Photfolio
//!
//! A static site generator for photography portfolios. Your filesystem is the
//! data source: the photo root's top-level images form a default album, every
//! subdirectory becomes an album, and each photo is turned into a fixed set of
//! derivatives (thumbnail and display size, JPEG plus WebP and/or AVIF).
//!
//! # Architecture: Linear Pipeline
//!
//! ```text
//! 1. Scan      photos/   →  ScanResult      (filesystem → album buckets)
//! 2. Resolve   scan      →  AlbumPlan       (slugs, titles, photo order)
//! 3. Process   plans     →  images/         (derivatives, fingerprint index)
//! 4. Model     results   →  manifest.json   (SiteModel + resolved config)
//! 5. Generate  model     →  *.html          (final HTML site)
//! ```
//!
//! Scanning and resolving never touch the output directory, so a config or
//! scan error leaves the previous build alone. Processing is incremental:
//! a derivative is only re-encoded when its source bytes or encode parameters
//! changed, and derivatives of removed sources are pruned.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`types`] | Output formats, size classes and the variant matrix |
//! | [`naming`] | Natural ordering, slugs, collision resolution, album titles |
//! | [`scan`] | Stage 1: walks the photo root into album buckets |
//! | [`resolve`] | Stage 2: stable photo and album identities, sort order |
//! | [`metadata`] | EXIF: orientation, capture time, display summary |
//! | [`imaging`] | `ImageBackend` trait and the pure-Rust implementation |
//! | [`cache`] | Content-addressed fingerprint index for incremental builds |
//! | [`process`] | Stage 3: parallel variant generation, atomic writes, pruning |
//! | [`manifest`] | Stage 4: the `SiteModel` handed to the renderer |
//! | [`generate`] | Stage 5: Maud HTML pages, static file copying |
//! | [`pipeline`] | Drives the stages in order |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Decode Once
//!
//! Each photo is decoded a single time regardless of how many variants it
//! needs, resized once per size class, then encoded once per format.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/), a compile-time HTML
//! macro system. Malformed templates are a build error, and all interpolation
//! is auto-escaped.
//!
//! ## Self-Contained Imaging
//!
//! The [`imaging`] module uses the `image` crate (Lanczos3 resampling, AVIF
//! encoding), `jpeg-encoder` (progressive JPEG with EXIF segments) and the
//! `webp` crate (lossy WebP). No system libraries are needed.

pub mod cache;
pub mod config;
pub mod generate;
pub mod imaging;
pub mod manifest;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod resolve;
pub mod scan;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
