//! The site model: albums, photos and their variants.
//!
//! Stage 4 of the build pipeline. Joins the album plans with the per-photo
//! processing results into a [`SiteModel`], which is everything the renderer
//! needs. Building it does no I/O and is deterministic, so the same inputs
//! always serialize to the same `manifest.json`.
//!
//! Skipped photos are simply absent. Albums that end up empty are kept,
//! unless `albums.allow_empty` is off, in which case they fail the build.

use crate::config::{FooterConfig, SiteConfig, SiteInfo};
use crate::metadata::ExifSummary;
use crate::process::ProcessedPhoto;
use crate::resolve::AlbumPlan;
use crate::types::{OutputFormat, SizeClass, VariantKind};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ManifestError {
    #[error("the site has no photos and empty albums are not allowed")]
    EmptySite,
    #[error("album '{0}' has no photos and empty albums are not allowed")]
    EmptyAlbum(String),
}

/// One derivative file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantAsset {
    /// Relative to the output root, `/`-separated.
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
    /// SHA-256 of the file contents.
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub slug: String,
    pub file_name: String,
    /// Relative to the photo root, `/`-separated.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sort_fallback: bool,
    pub width: u32,
    pub height: u32,
    pub variants: BTreeMap<VariantKind, VariantAsset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exif: Option<ExifSummary>,
}

impl Photo {
    pub fn variant(&self, size: SizeClass, format: OutputFormat) -> Option<&VariantAsset> {
        self.variants.get(&VariantKind::new(size, format))
    }

    /// The JPEG every browser can show.
    pub fn fallback(&self, size: SizeClass) -> Option<&VariantAsset> {
        self.variant(size, OutputFormat::Jpeg)
    }

    /// Modern-format variants of one size, best compression first.
    pub fn modern_sources(&self, size: SizeClass) -> Vec<(OutputFormat, &VariantAsset)> {
        let mut sources: Vec<(OutputFormat, &VariantAsset)> = self
            .variants
            .iter()
            .filter(|(kind, _)| kind.size == size && kind.format.is_modern())
            .map(|(kind, asset)| (kind.format, asset))
            .collect();
        // AVIF before WebP: browsers take the first <source> they support.
        sources.sort_by_key(|(format, _)| std::cmp::Reverse(*format));
        sources
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    /// Directory relative to the photo root; empty for the default album.
    pub path: String,
    pub slug: String,
    pub title: String,
    /// Slug of the first photo, shown on the index page.
    pub cover: Option<String>,
    pub photo_count: usize,
    pub photos: Vec<Photo>,
}

impl Album {
    pub fn cover_photo(&self) -> Option<&Photo> {
        let cover = self.cover.as_deref()?;
        self.photos.iter().find(|p| p.slug == cover)
    }

    /// Page file name relative to the output root.
    pub fn page_name(&self) -> String {
        format!("{}.html", self.slug)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteModel {
    pub site: SiteInfo,
    pub footer: FooterConfig,
    pub grid_columns: u32,
    pub exif_display: bool,
    pub albums: Vec<Album>,
    pub photo_count: usize,
}

/// The `manifest.json` document: the model plus the resolved configuration.
#[derive(Debug, Serialize)]
pub struct ManifestDocument<'a> {
    pub model: &'a SiteModel,
    pub config: &'a SiteConfig,
}

impl ManifestDocument<'_> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Assemble the site model from the plans and the processed photos.
///
/// `photos` is keyed by (album index, photo index) into `plans`; plan entries
/// without a result were skipped and are left out.
pub fn build_site_model(
    plans: &[AlbumPlan],
    photos: &HashMap<(usize, usize), ProcessedPhoto>,
    config: &SiteConfig,
) -> Result<SiteModel, ManifestError> {
    let albums: Vec<Album> = plans
        .iter()
        .enumerate()
        .map(|(album_index, plan)| {
            let photos: Vec<Photo> = plan
                .photos
                .iter()
                .enumerate()
                .filter_map(|(photo_index, resolved)| {
                    let processed = photos.get(&(album_index, photo_index))?;
                    Some(Photo {
                        slug: resolved.slug.clone(),
                        file_name: resolved.file_name.clone(),
                        source: slash_path(&resolved.rel_path),
                        modified: processed.modified,
                        captured_at: resolved.captured_at,
                        sort_fallback: resolved.sort_fallback,
                        width: processed.width,
                        height: processed.height,
                        variants: processed.variants.clone(),
                        exif: processed.exif.clone(),
                    })
                })
                .collect();
            Album {
                path: slash_path(&plan.rel_path),
                slug: plan.slug.clone(),
                title: plan.title.clone(),
                cover: photos.first().map(|p| p.slug.clone()),
                photo_count: photos.len(),
                photos,
            }
        })
        .collect();

    let photo_count = albums.iter().map(|a| a.photo_count).sum();
    if !config.albums.allow_empty {
        if photo_count == 0 {
            return Err(ManifestError::EmptySite);
        }
        if let Some(empty) = albums.iter().find(|a| a.photos.is_empty()) {
            return Err(ManifestError::EmptyAlbum(empty.slug.clone()));
        }
    }

    Ok(SiteModel {
        site: config.site.clone(),
        footer: config.footer.clone(),
        grid_columns: config.grid.columns,
        exif_display: config.exif.display,
        albums,
        photo_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ExifEntry;
    use crate::resolve::ResolvedPhoto;
    use crate::test_helpers::{find_album, find_photo, photo_slugs};
    use std::path::PathBuf;

    fn resolved(album: &str, slug: &str) -> ResolvedPhoto {
        ResolvedPhoto {
            slug: slug.to_string(),
            path: PathBuf::from("/photos").join(album).join(format!("{slug}.jpg")),
            rel_path: PathBuf::from(album).join(format!("{slug}.jpg")),
            file_name: format!("{slug}.jpg"),
            captured_at: None,
            sort_fallback: false,
        }
    }

    fn plan(slug: &str, photos: &[&str]) -> AlbumPlan {
        AlbumPlan {
            rel_path: PathBuf::from(slug),
            slug: slug.to_string(),
            title: slug.to_uppercase(),
            photos: photos.iter().map(|p| resolved(slug, p)).collect(),
        }
    }

    fn processed(album: &str, slug: &str) -> ProcessedPhoto {
        let mut variants = BTreeMap::new();
        for kind in crate::types::variant_kinds(&[OutputFormat::Jpeg, OutputFormat::Webp, OutputFormat::Avif]) {
            variants.insert(
                kind,
                VariantAsset {
                    path: format!("images/{album}/{}", kind.file_name(slug)),
                    width: 40,
                    height: 30,
                    bytes: 100,
                    fingerprint: "0".repeat(64),
                },
            );
        }
        ProcessedPhoto {
            width: 40,
            height: 30,
            variants,
            exif: None,
            modified: None,
        }
    }

    /// Results for every photo of every plan except those listed in `skip`.
    fn results(plans: &[AlbumPlan], skip: &[(usize, usize)]) -> HashMap<(usize, usize), ProcessedPhoto> {
        let mut map = HashMap::new();
        for (ai, plan) in plans.iter().enumerate() {
            for (pi, photo) in plan.photos.iter().enumerate() {
                if !skip.contains(&(ai, pi)) {
                    map.insert((ai, pi), processed(&plan.slug, &photo.slug));
                }
            }
        }
        map
    }

    // =========================================================================
    // Assembly
    // =========================================================================

    #[test]
    fn albums_and_photos_keep_plan_order() {
        let plans = vec![plan("b", &["z", "a"]), plan("a", &["m"])];
        let model = build_site_model(&plans, &results(&plans, &[]), &SiteConfig::default()).unwrap();

        let slugs: Vec<&str> = model.albums.iter().map(|a| a.slug.as_str()).collect();
        assert_eq!(slugs, vec!["b", "a"]);
        assert_eq!(photo_slugs(find_album(&model, "b")), vec!["z", "a"]);
        assert_eq!(model.photo_count, 3);
    }

    #[test]
    fn cover_is_first_photo() {
        let plans = vec![plan("a", &["first", "second"])];
        let model = build_site_model(&plans, &results(&plans, &[]), &SiteConfig::default()).unwrap();
        let album = find_album(&model, "a");
        assert_eq!(album.cover.as_deref(), Some("first"));
        assert_eq!(album.cover_photo().unwrap().slug, "first");
        assert_eq!(album.page_name(), "a.html");
    }

    #[test]
    fn skipped_photos_are_omitted_and_cover_moves_on() {
        let plans = vec![plan("a", &["broken", "fine"])];
        let model = build_site_model(&plans, &results(&plans, &[(0, 0)]), &SiteConfig::default()).unwrap();
        let album = find_album(&model, "a");
        assert_eq!(photo_slugs(album), vec!["fine"]);
        assert_eq!(album.cover.as_deref(), Some("fine"));
        assert_eq!(album.photo_count, 1);
    }

    #[test]
    fn photo_carries_source_and_variants() {
        let plans = vec![plan("trips", &["dawn"])];
        let model = build_site_model(&plans, &results(&plans, &[]), &SiteConfig::default()).unwrap();
        let photo = find_photo(find_album(&model, "trips"), "dawn");
        assert_eq!(photo.source, "trips/dawn.jpg");
        assert_eq!(
            photo.fallback(SizeClass::Thumbnail).unwrap().path,
            "images/trips/dawn-thumb.jpg"
        );
        let modern: Vec<OutputFormat> = photo
            .modern_sources(SizeClass::Display)
            .into_iter()
            .map(|(f, _)| f)
            .collect();
        assert_eq!(modern, vec![OutputFormat::Avif, OutputFormat::Webp]);
    }

    #[test]
    fn site_settings_copied_from_config() {
        let mut config = SiteConfig::default();
        config.site.title = "Light".into();
        config.grid.columns = 4;
        config.exif.display = true;
        let model = build_site_model(&[], &HashMap::new(), &config).unwrap();
        assert_eq!(model.site.title, "Light");
        assert_eq!(model.grid_columns, 4);
        assert!(model.exif_display);
        assert!(model.albums.is_empty());
    }

    // =========================================================================
    // Empty policy
    // =========================================================================

    #[test]
    fn empty_albums_kept_by_default() {
        let plans = vec![plan("a", &["x"]), plan("empty", &[])];
        let model = build_site_model(&plans, &results(&plans, &[]), &SiteConfig::default()).unwrap();
        let empty = find_album(&model, "empty");
        assert_eq!(empty.photo_count, 0);
        assert_eq!(empty.cover, None);
    }

    #[test]
    fn empty_site_rejected_when_disallowed() {
        let mut config = SiteConfig::default();
        config.albums.allow_empty = false;
        assert_eq!(
            build_site_model(&[], &HashMap::new(), &config),
            Err(ManifestError::EmptySite)
        );
    }

    #[test]
    fn album_emptied_by_skips_rejected_when_disallowed() {
        let mut config = SiteConfig::default();
        config.albums.allow_empty = false;
        let plans = vec![plan("a", &["x"]), plan("b", &["y"])];
        assert_eq!(
            build_site_model(&plans, &results(&plans, &[(1, 0)]), &config),
            Err(ManifestError::EmptyAlbum("b".into()))
        );
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    #[test]
    fn manifest_json_is_deterministic_and_keyed_by_kind() {
        let plans = vec![plan("a", &["x", "y"])];
        let config = SiteConfig::default();
        let model = build_site_model(&plans, &results(&plans, &[]), &config).unwrap();
        let doc = ManifestDocument {
            model: &model,
            config: &config,
        };
        let first = doc.to_json().unwrap();
        let again = build_site_model(&plans, &results(&plans, &[]), &config).unwrap();
        let second = ManifestDocument {
            model: &again,
            config: &config,
        }
        .to_json()
        .unwrap();
        assert_eq!(first, second);

        let value: serde_json::Value = serde_json::from_str(&first).unwrap();
        let photo = &value["model"]["albums"][0]["photos"][0];
        assert_eq!(
            photo["variants"]["thumbnail-jpeg"]["path"],
            "images/a/x-thumb.jpg"
        );
        assert!(photo.get("exif").is_none());
        assert!(photo.get("sort_fallback").is_none());
        assert_eq!(value["config"]["grid"]["columns"], 3);
    }

    #[test]
    fn model_round_trips_through_json() {
        let plans = vec![plan("a", &["x"])];
        let mut photos = results(&plans, &[]);
        photos.get_mut(&(0, 0)).unwrap().exif = Some(ExifSummary {
            entries: vec![ExifEntry {
                label: "Camera".into(),
                value: "TestCam".into(),
            }],
        });
        let model = build_site_model(&plans, &photos, &SiteConfig::default()).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let back: SiteModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, model);
    }
}
