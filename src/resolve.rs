//! Photo identity and ordering.
//!
//! Stage 2 of the build pipeline. Takes scanned albums and decides, for each
//! photo, the slug its derivatives are named after and its position in the
//! album. Albums get their slugs and titles here too. Everything in this
//! module is pure: capture timestamps are looked up by the caller.
//!
//! ## Stability
//!
//! Slugs are handed out in natural filename order no matter which sort key
//! is configured. Re-ordering by capture time, or a camera clock fix, never
//! renames a derivative; only adding or removing a colliding file can.

use crate::config::{MissingTimestamp, SiteConfig, SortKey, SortingConfig};
use crate::naming::{SlugAllocator, album_title, natural_cmp, photo_slug_base, slugify};
use crate::scan::{ScanResult, ScannedAlbum};
use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Album slug that would clash with the site's `index.html`.
pub const RESERVED_ALBUM_SLUGS: &[&str] = &["index"];

/// Input to [`resolve_album`]: one scanned file plus its capture time.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntry {
    pub path: PathBuf,
    pub rel_path: PathBuf,
    pub file_name: String,
    pub captured_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPhoto {
    pub slug: String,
    pub path: PathBuf,
    pub rel_path: PathBuf,
    pub file_name: String,
    pub captured_at: Option<NaiveDateTime>,
    /// Sorted by filename because no capture timestamp was available.
    pub sort_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumIdentity {
    pub slug: String,
    pub title: String,
}

/// An album ready for variant generation.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumPlan {
    pub rel_path: PathBuf,
    pub slug: String,
    pub title: String,
    pub photos: Vec<ResolvedPhoto>,
}

fn filename_order(a: &SourceEntry, b: &SourceEntry) -> Ordering {
    natural_cmp(&a.file_name, &b.file_name).then_with(|| {
        natural_cmp(
            &a.rel_path.to_string_lossy(),
            &b.rel_path.to_string_lossy(),
        )
    })
}

/// Assign slugs and order the photos of one album.
pub fn resolve_album(mut entries: Vec<SourceEntry>, sorting: &SortingConfig) -> Vec<ResolvedPhoto> {
    entries.sort_by(filename_order);

    let mut slugs = SlugAllocator::new();
    let by_metadata = sorting.key == SortKey::MetadataTimestamp;
    let mut photos: Vec<ResolvedPhoto> = entries
        .into_iter()
        .map(|e| ResolvedPhoto {
            slug: slugs.allocate(&photo_slug_base(&e.file_name)),
            sort_fallback: by_metadata && e.captured_at.is_none(),
            path: e.path,
            rel_path: e.rel_path,
            file_name: e.file_name,
            captured_at: e.captured_at,
        })
        .collect();

    if by_metadata {
        // Stable: equal timestamps, and all untimed photos, keep filename order.
        photos.sort_by(|a, b| match (a.captured_at, b.captured_at) {
            (Some(ta), Some(tb)) => ta.cmp(&tb),
            (Some(_), None) => match sorting.missing_timestamp {
                MissingTimestamp::Last => Ordering::Less,
                MissingTimestamp::First => Ordering::Greater,
            },
            (None, Some(_)) => match sorting.missing_timestamp {
                MissingTimestamp::Last => Ordering::Greater,
                MissingTimestamp::First => Ordering::Less,
            },
            (None, None) => Ordering::Equal,
        });
    }
    photos
}

/// Titles and slugs for every album, in the given order.
///
/// The default album takes `default_title`; named albums derive theirs from
/// the directory name.
pub fn resolve_albums(albums: &[ScannedAlbum], default_title: &str) -> Vec<AlbumIdentity> {
    let mut slugs = SlugAllocator::with_reserved(RESERVED_ALBUM_SLUGS.iter().copied());
    albums
        .iter()
        .map(|album| {
            let title = match album.dir_name() {
                Some(name) => album_title(&name),
                None => default_title.to_string(),
            };
            let base = match slugify(&title) {
                s if s.is_empty() => "album".to_string(),
                s => s,
            };
            AlbumIdentity {
                slug: slugs.allocate(&base),
                title,
            }
        })
        .collect()
}

/// Resolve a whole scan into album plans.
///
/// `capture_time` is only consulted when sorting by metadata timestamp.
pub fn plan_site(
    scan: &ScanResult,
    config: &SiteConfig,
    capture_time: impl Fn(&Path) -> Option<NaiveDateTime>,
) -> Vec<AlbumPlan> {
    let by_metadata = config.sorting.key == SortKey::MetadataTimestamp;
    let identities = resolve_albums(&scan.albums, &config.albums.default_title);

    scan.albums
        .iter()
        .zip(identities)
        .map(|(album, identity)| {
            let entries = album
                .files
                .iter()
                .map(|f| SourceEntry {
                    path: f.path.clone(),
                    rel_path: f.rel_path.clone(),
                    file_name: f.file_name.clone(),
                    captured_at: if by_metadata {
                        capture_time(&f.path)
                    } else {
                        None
                    },
                })
                .collect();
            AlbumPlan {
                rel_path: album.rel_path.clone(),
                slug: identity.slug,
                title: identity.title,
                photos: resolve_album(entries, &config.sorting),
            }
        })
        .collect()
}
