//! Build driver: config → scan → resolve → variants → model → HTML.
//!
//! Nothing under the output directory is touched until the config has been
//! validated and the photo root scanned, so a typo or a missing directory
//! leaves the previous build intact.
//!
//! ```text
//! config.toml ─► SiteConfig
//! photos/     ─► scan ─► plan_site ─► process_site ─► prune ─► build_site_model
//!                                                                   │
//!                                     manifest.json ◄───────────────┤
//!                                     index.html, <album>.html ◄────┘
//! ```

use crate::cache::{CacheManifest, CacheStats};
use crate::config::{self, ConfigError, SiteConfig};
use crate::generate::{self, GenerateError, StaticFiles};
use crate::imaging::ImageBackend;
use crate::manifest::{self, ManifestDocument, ManifestError, SiteModel};
use crate::metadata;
use crate::process::{self, CancelToken, ProcessError, ProcessEvent, SkippedPhoto};
use crate::resolve::{self, AlbumPlan};
use crate::scan::{self, ScanError};
use crate::types::variant_kinds;
use chrono::Datelike;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::info;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("build cancelled with {remaining} photos left; finished variants were kept")]
    Cancelled { remaining: usize },
}

/// Where to read from and write to, and how hard to work.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub photos: PathBuf,
    pub output: PathBuf,
    pub config: PathBuf,
    pub styles: PathBuf,
    pub assets: PathBuf,
    /// `false` starts from an empty fingerprint index.
    pub use_cache: bool,
    /// Caps the worker count further than `processing.max_processes`.
    pub jobs: Option<usize>,
    /// Substituted for `{year}` in the footer.
    pub year: i32,
}

impl BuildOptions {
    /// Options with the CLI defaults resolved against `photos` and `output`.
    pub fn new(photos: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            photos: photos.into(),
            output: output.into(),
            config: PathBuf::from("config.toml"),
            styles: PathBuf::from("styles"),
            assets: PathBuf::from("assets"),
            use_cache: true,
            jobs: None,
            year: chrono::Local::now().year(),
        }
    }
}

#[derive(Debug)]
pub struct BuildReport {
    pub model: SiteModel,
    pub skipped: Vec<SkippedPhoto>,
    pub cache_stats: CacheStats,
    /// Orphaned derivatives deleted from `images/`.
    pub pruned: usize,
    pub pages: Vec<String>,
    pub statics: StaticFiles,
}

/// Validate the config and resolve the photo root without writing anything.
pub fn check(options: &BuildOptions) -> Result<(SiteConfig, Vec<AlbumPlan>), PipelineError> {
    let config = config::load_config(&options.config)?;
    let plans = plan(&options.photos, &config)?;
    Ok((config, plans))
}

fn plan(photos: &Path, config: &SiteConfig) -> Result<Vec<AlbumPlan>, PipelineError> {
    let scanned = scan::scan(photos, config.albums.nesting)?;
    Ok(resolve::plan_site(
        &scanned,
        config,
        metadata::read_capture_time,
    ))
}

/// Run a full build.
pub fn build(
    options: &BuildOptions,
    backend: &impl ImageBackend,
    cancel: &CancelToken,
    events: Option<&Sender<ProcessEvent>>,
) -> Result<BuildReport, PipelineError> {
    let (config, plans) = check(options)?;
    build_with_plans(options, &config, &plans, backend, cancel, events)
}

/// Everything after [`check`]: variants, pruning, manifest and pages.
pub fn build_with_plans(
    options: &BuildOptions,
    config: &SiteConfig,
    plans: &[AlbumPlan],
    backend: &impl ImageBackend,
    cancel: &CancelToken,
    events: Option<&Sender<ProcessEvent>>,
) -> Result<BuildReport, PipelineError> {
    let output = options.output.as_path();
    std::fs::create_dir_all(output)?;

    let cache = if options.use_cache {
        CacheManifest::load(output)
    } else {
        CacheManifest::empty()
    };
    let cores = config::effective_threads(&config.processing);
    let threads = options.jobs.map_or(cores, |jobs| jobs.clamp(1, cores));

    let report = process::process_site(
        plans, output, config, cache, backend, threads, cancel, events,
    )?;
    let mut cache = report.cache;

    if report.cancelled > 0 {
        cache.save(output)?;
        return Err(PipelineError::Cancelled {
            remaining: report.cancelled,
        });
    }

    let expected = process::expected_outputs(plans, &variant_kinds(&config.image.formats));
    let pruned = process::prune_orphans(output, &expected)?;
    cache.retain_paths(&expected);

    let model = manifest::build_site_model(plans, &report.photos, config)?;
    let document = ManifestDocument {
        model: &model,
        config,
    };
    process::write_atomic(&output.join(MANIFEST_FILE), document.to_json()?.as_bytes())?;
    cache.save(output)?;

    let statics = generate::copy_static_dirs(&options.styles, &options.assets, output)?;
    let pages = generate::generate(&model, &statics, output, options.year)?;

    info!(
        albums = model.albums.len(),
        photos = model.photo_count,
        skipped = report.skipped.len(),
        pruned,
        "build complete"
    );
    Ok(BuildReport {
        model,
        skipped: report.skipped,
        cache_stats: report.cache_stats,
        pruned,
        pages,
        statics,
    })
}
