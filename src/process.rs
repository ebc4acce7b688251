//! Variant generation.
//!
//! Stage 3 of the photfolio build pipeline. Turns every resolved photo into
//! its fixed matrix of derivatives (thumbnail and display size, in every
//! configured format) under `<output>/images/<album-slug>/`.
//!
//! ## Per photo
//!
//! ```text
//! read bytes ─► sha256 ─► EXIF ─► identify ─► per kind: cache lookup
//!                                               │
//!                       any miss ─► decode once ─► orient ─► resize per size ─► encode ─► atomic write
//! ```
//!
//! A photo that cannot be read, decoded, encoded or written is skipped with a
//! [`VariantError`]; the rest of the site still builds.
//!
//! ## Output Structure
//!
//! ```text
//! images/
//! └── landscapes/
//!     ├── dawn-thumb.jpg
//!     ├── dawn-thumb.avif
//!     ├── dawn-display.jpg
//!     └── dawn-display.avif
//! ```
//!
//! ## Parallel Processing
//!
//! Every photo of every album goes through one bounded
//! [rayon](https://docs.rs/rayon) pool as a single flat work list. Workers
//! only read the cache index loaded at the start; the entries and statistics
//! each photo produces are merged on the calling thread once all are done.
//! A derivative another worker may have rewritten in the meantime is caught
//! by its fingerprint before it is reused.

use crate::cache::{self, CacheEntry, CacheManifest, CacheStats, VariantParams};
use crate::config::SiteConfig;
use crate::imaging::{EncodeParams, ImageBackend, Quality, fit_within, oriented};
use crate::manifest::VariantAsset;
use crate::metadata::{self, ExifSummary, PhotoMetadata};
use crate::resolve::{AlbumPlan, ResolvedPhoto};
use crate::types::{OutputFormat, SizeClass, VariantKind, variant_kinds};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Directory under the output root holding every derivative.
pub const IMAGES_DIR: &str = "images";

const RETRY_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Why one photo was skipped.
#[derive(Error, Debug)]
pub enum VariantError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },
    #[error("cannot encode {kind} of {}: {reason}", path.display())]
    Encode {
        path: PathBuf,
        kind: VariantKind,
        reason: String,
    },
    #[error("cannot write {} for {}: {source}", output.display(), path.display())]
    Write {
        path: PathBuf,
        output: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl VariantError {
    /// The source image the error is about.
    pub fn source_path(&self) -> &Path {
        match self {
            VariantError::Read { path, .. }
            | VariantError::Decode { path, .. }
            | VariantError::Encode { path, .. }
            | VariantError::Write { path, .. } => path,
        }
    }
}

/// Cooperative cancellation, checked before each photo starts.
///
/// Cancelled either explicitly (Ctrl-C) or by passing the deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(after: Duration) -> Self {
        Self {
            flag: Arc::default(),
            deadline: Some(Instant::now() + after),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// How a variant was obtained in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantStatus {
    /// Already on disk at its path with matching fingerprints.
    Cached,
    /// Found under another path (renamed album or photo) and copied.
    Copied,
    /// Decoded, resized and encoded.
    Encoded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantInfo {
    pub label: String,
    pub status: VariantStatus,
}

/// Progress events sent to the CLI printer while processing.
///
/// Photos of different albums finish in any order, so each event names its
/// album.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    PhotoProcessed {
        album: AlbumLabel,
        /// 1-based position in the album.
        index: usize,
        slug: String,
        source_path: String,
        variants: Vec<VariantInfo>,
    },
    PhotoSkipped {
        album: AlbumLabel,
        index: usize,
        source_path: String,
        reason: String,
    },
}

impl ProcessEvent {
    pub fn album(&self) -> &AlbumLabel {
        match self {
            ProcessEvent::PhotoProcessed { album, .. } | ProcessEvent::PhotoSkipped { album, .. } => {
                album
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumLabel {
    pub title: String,
    pub photo_count: usize,
}

/// Everything the manifest needs about a successfully processed photo.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedPhoto {
    /// Source dimensions after EXIF orientation.
    pub width: u32,
    pub height: u32,
    pub variants: BTreeMap<VariantKind, VariantAsset>,
    /// Present only when `exif.display` is on and the source had any.
    pub exif: Option<ExifSummary>,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct SkippedPhoto {
    pub album: String,
    /// Relative to the photo root.
    pub source: PathBuf,
    pub error: VariantError,
}

#[derive(Debug)]
pub struct ProcessReport {
    /// Keyed by (album index, photo index) into the plans.
    pub photos: HashMap<(usize, usize), ProcessedPhoto>,
    pub skipped: Vec<SkippedPhoto>,
    pub cache_stats: CacheStats,
    /// Photos never started because the run was cancelled.
    pub cancelled: usize,
    /// The index updated with every variant produced this run.
    pub cache: CacheManifest,
}

impl ProcessReport {
    pub fn was_cancelled(&self) -> bool {
        self.cancelled > 0
    }
}

/// Result of one photo, merged on the driver thread.
#[derive(Debug)]
struct PhotoResult {
    photo: ProcessedPhoto,
    statuses: Vec<(VariantKind, VariantStatus)>,
    cache_entries: Vec<(String, CacheEntry)>,
    stats: CacheStats,
}

struct Context<'a> {
    output_dir: &'a Path,
    config: &'a SiteConfig,
    kinds: &'a [VariantKind],
    cache: &'a CacheManifest,
}

/// A variant that has to be encoded.
struct Pending {
    kind: VariantKind,
    target: crate::imaging::Dimensions,
    rel_path: String,
    params_hash: String,
    quality: u32,
}

/// `images/<album>/<photo>-<size>.<ext>`, relative to the output root.
pub fn variant_path(album_slug: &str, photo_slug: &str, kind: VariantKind) -> String {
    format!("{IMAGES_DIR}/{album_slug}/{}", kind.file_name(photo_slug))
}

/// Every derivative path the plans should produce.
pub fn expected_outputs(plans: &[AlbumPlan], kinds: &[VariantKind]) -> BTreeSet<String> {
    plans
        .iter()
        .flat_map(|plan| {
            plan.photos.iter().flat_map(move |photo| {
                kinds
                    .iter()
                    .map(move |&kind| variant_path(&plan.slug, &photo.slug, kind))
            })
        })
        .collect()
}

/// Generate derivatives for every photo in `plans`.
#[allow(clippy::too_many_arguments)]
pub fn process_site(
    plans: &[AlbumPlan],
    output_dir: &Path,
    config: &SiteConfig,
    cache: CacheManifest,
    backend: &impl ImageBackend,
    threads: usize,
    cancel: &CancelToken,
    events: Option<&Sender<ProcessEvent>>,
) -> Result<ProcessReport, ProcessError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build()?;
    let kinds = variant_kinds(&config.image.formats);
    let work: Vec<(usize, usize)> = plans
        .iter()
        .enumerate()
        .flat_map(|(album_index, plan)| (0..plan.photos.len()).map(move |i| (album_index, i)))
        .collect();

    let ctx = Context {
        output_dir,
        config,
        kinds: &kinds,
        cache: &cache,
    };
    let outcomes: Vec<Option<Result<PhotoResult, VariantError>>> = pool.install(|| {
        work.par_iter()
            .map(|&(album_index, photo_index)| {
                if cancel.is_cancelled() {
                    return None;
                }
                let plan = &plans[album_index];
                let photo = &plan.photos[photo_index];
                let outcome = process_photo(&plan.slug, photo, &ctx, backend);
                if let Some(tx) = events {
                    tx.send(progress_event(plan, photo_index + 1, photo, &outcome))
                        .ok();
                }
                Some(outcome)
            })
            .collect()
    });

    let mut report = ProcessReport {
        photos: HashMap::new(),
        skipped: Vec::new(),
        cache_stats: CacheStats::default(),
        cancelled: 0,
        cache,
    };
    for (&(album_index, photo_index), outcome) in work.iter().zip(outcomes) {
        let plan = &plans[album_index];
        let photo = &plan.photos[photo_index];
        match outcome {
            None => report.cancelled += 1,
            Some(Ok(result)) => {
                report.cache_stats.merge(&result.stats);
                for (path, entry) in result.cache_entries {
                    report.cache.insert(path, entry);
                }
                report
                    .photos
                    .insert((album_index, photo_index), result.photo);
            }
            Some(Err(error)) => {
                warn!(album = %plan.slug, photo = %photo.slug, %error, "skipping photo");
                report.skipped.push(SkippedPhoto {
                    album: plan.slug.clone(),
                    source: photo.rel_path.clone(),
                    error,
                });
            }
        }
    }

    info!(
        processed = report.photos.len(),
        skipped = report.skipped.len(),
        cancelled = report.cancelled,
        cache = %report.cache_stats,
        "variant generation finished"
    );
    Ok(report)
}

fn progress_event(
    plan: &AlbumPlan,
    index: usize,
    photo: &ResolvedPhoto,
    outcome: &Result<PhotoResult, VariantError>,
) -> ProcessEvent {
    let album = AlbumLabel {
        title: plan.title.clone(),
        photo_count: plan.photos.len(),
    };
    let source_path = photo.rel_path.to_string_lossy().into_owned();
    match outcome {
        Ok(result) => ProcessEvent::PhotoProcessed {
            album,
            index,
            slug: photo.slug.clone(),
            source_path,
            variants: result
                .statuses
                .iter()
                .map(|(kind, status)| VariantInfo {
                    label: kind.to_string(),
                    status: *status,
                })
                .collect(),
        },
        Err(error) => ProcessEvent::PhotoSkipped {
            album,
            index,
            source_path,
            reason: error.to_string(),
        },
    }
}

fn asset(rel_path: String, entry: &CacheEntry) -> VariantAsset {
    VariantAsset {
        path: rel_path,
        width: entry.width,
        height: entry.height,
        bytes: entry.bytes,
        fingerprint: entry.fingerprint.clone(),
    }
}

/// Produce every variant of one photo, reusing cached files where possible.
fn process_photo(
    album_slug: &str,
    photo: &ResolvedPhoto,
    ctx: &Context<'_>,
    backend: &impl ImageBackend,
) -> Result<PhotoResult, VariantError> {
    let source = photo.path.as_path();
    let bytes = fs::read(source).map_err(|e| VariantError::Read {
        path: source.to_path_buf(),
        source: e,
    })?;
    let modified = fs::metadata(source)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from);
    let source_hash = cache::hash_bytes(&bytes);
    let meta = PhotoMetadata::from_bytes(&bytes);
    let decode_error = |e: crate::imaging::BackendError| VariantError::Decode {
        path: source.to_path_buf(),
        reason: e.to_string(),
    };

    let raw = backend.identify(&bytes).map_err(decode_error)?;
    let dims = oriented(raw, meta.swaps_dimensions());

    let image_config = &ctx.config.image;
    let keep_exif = !ctx.config.exif.strip;

    let mut result = PhotoResult {
        photo: ProcessedPhoto {
            width: dims.width,
            height: dims.height,
            variants: BTreeMap::new(),
            exif: if ctx.config.exif.display {
                meta.summary.clone()
            } else {
                None
            },
            modified,
        },
        statuses: Vec::new(),
        cache_entries: Vec::new(),
        stats: CacheStats::default(),
    };
    let mut pending = Vec::new();

    for &kind in ctx.kinds {
        let max_dimension = image_config.max_dimension(kind.size);
        let quality = image_config.quality_for(kind.size);
        let params_hash = cache::hash_variant_params(&VariantParams {
            kind,
            max_dimension,
            quality,
            progressive: image_config.progressive,
            keep_exif,
        });
        let rel_path = variant_path(album_slug, &photo.slug, kind);

        if let Some(entry) = ctx
            .cache
            .find_at(&rel_path, &source_hash, &params_hash, ctx.output_dir)
        {
            result.stats.hit();
            result.statuses.push((kind, VariantStatus::Cached));
            result.photo.variants.insert(kind, asset(rel_path, &entry));
            continue;
        }

        if let Some((stored, entry)) =
            ctx.cache
                .find_cached(&source_hash, &params_hash, ctx.output_dir)
        {
            let copied = copy_verified(
                &ctx.output_dir.join(&stored),
                &ctx.output_dir.join(&rel_path),
                &entry,
            );
            match copied {
                Ok(()) => {
                    debug!(from = %stored, to = %rel_path, "reused cached variant");
                    result.stats.copy();
                    result.statuses.push((kind, VariantStatus::Copied));
                    result
                        .photo
                        .variants
                        .insert(kind, asset(rel_path.clone(), &entry));
                    result.cache_entries.push((rel_path, entry));
                    continue;
                }
                Err(e) => {
                    debug!(from = %stored, to = %rel_path, error = %e, "copy failed, re-encoding");
                }
            }
        }

        pending.push(Pending {
            kind,
            target: fit_within(dims, max_dimension),
            rel_path,
            params_hash,
            quality,
        });
    }

    if pending.is_empty() {
        return Ok(result);
    }

    let decoded = backend.decode(&bytes).map_err(decode_error)?;
    let image = metadata::apply_orientation(decoded, meta.orientation);
    let app1 = if keep_exif { meta.app1_payload() } else { None };

    for size in SizeClass::ALL {
        let jobs: Vec<&Pending> = pending.iter().filter(|p| p.kind.size == size).collect();
        let Some(first) = jobs.first() else {
            continue;
        };
        let target = first.target;
        let resized;
        let pixels = if image.width() == target.width && image.height() == target.height {
            &image
        } else {
            resized = backend
                .resize(&image, target)
                .map_err(|e| VariantError::Encode {
                    path: source.to_path_buf(),
                    kind: first.kind,
                    reason: e.to_string(),
                })?;
            &resized
        };

        for job in jobs {
            let encoded = backend
                .encode(
                    pixels,
                    &EncodeParams {
                        format: job.kind.format,
                        quality: Quality::new(job.quality),
                        progressive: image_config.progressive,
                        exif: match job.kind.format {
                            OutputFormat::Jpeg => app1.as_deref(),
                            _ => None,
                        },
                    },
                )
                .map_err(|e| VariantError::Encode {
                    path: source.to_path_buf(),
                    kind: job.kind,
                    reason: e.to_string(),
                })?;

            let output = ctx.output_dir.join(&job.rel_path);
            write_atomic(&output, &encoded).map_err(|e| VariantError::Write {
                path: source.to_path_buf(),
                output: output.clone(),
                source: e,
            })?;
            debug!(photo = %photo.slug, kind = %job.kind, bytes = encoded.len(), "encoded variant");

            let entry = CacheEntry {
                source_hash: source_hash.clone(),
                params_hash: job.params_hash.clone(),
                width: target.width,
                height: target.height,
                bytes: encoded.len() as u64,
                fingerprint: cache::hash_bytes(&encoded),
            };
            result.stats.miss();
            result.statuses.push((job.kind, VariantStatus::Encoded));
            result
                .photo
                .variants
                .insert(job.kind, asset(job.rel_path.clone(), &entry));
            result.cache_entries.push((job.rel_path.clone(), entry));
        }
    }

    // Report statuses in kind order regardless of how they were obtained.
    result.statuses.sort_by_key(|(kind, _)| *kind);
    Ok(result)
}

fn is_transient(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::StorageFull
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ResourceBusy
    )
}

/// Run `op`, retrying once after a short pause if it hits a transient error.
fn with_retry<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    match op() {
        Err(e) if is_transient(e.kind()) => {
            warn!(error = %e, "transient IO error, retrying once");
            std::thread::sleep(RETRY_BACKOFF);
            op()
        }
        other => other,
    }
}

fn write_once(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "output path has no parent")
    })?;
    fs::create_dir_all(parent)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let partial = parent.join(format!(".{name}.partial"));
    let written = fs::write(&partial, bytes).and_then(|()| fs::rename(&partial, path));
    if written.is_err() {
        let _ = fs::remove_file(&partial);
    }
    written
}

/// Write via a hidden temp file in the same directory, then rename, so a
/// reader never sees a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    with_retry(|| write_once(path, bytes))
}

/// Copy a cached derivative, refusing bytes that no longer match `entry`.
/// `from` may have been rewritten for another photo earlier in this run.
fn copy_verified(from: &Path, to: &Path, entry: &CacheEntry) -> io::Result<()> {
    with_retry(|| {
        let bytes = fs::read(from)?;
        if !entry.matches(&bytes) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "cached derivative no longer matches its fingerprint",
            ));
        }
        write_once(to, &bytes)
    })
}

/// `/`-separated path of `path` relative to `root`.
fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

/// Delete every file under `<output>/images/` that is not in `expected`,
/// then any directory left empty. Returns the number of files removed.
pub fn prune_orphans(output_dir: &Path, expected: &BTreeSet<String>) -> io::Result<usize> {
    let images = output_dir.join(IMAGES_DIR);
    if !images.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in WalkDir::new(&images).min_depth(1).contents_first(true) {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();
        if entry.file_type().is_dir() {
            if fs::read_dir(path)?.next().is_none() {
                fs::remove_dir(path)?;
            }
            continue;
        }
        let keep = relative_slash_path(output_dir, path).is_some_and(|rel| expected.contains(&rel));
        if !keep {
            fs::remove_file(path)?;
            debug!(path = %path.display(), "pruned orphaned derivative");
            removed += 1;
        }
    }
    Ok(removed)
}
