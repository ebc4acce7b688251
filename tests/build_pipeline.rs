//! End-to-end builds with the real pure-Rust imaging backend.
//!
//! Sources are tiny synthetic JPEGs and the config keeps the derivatives
//! small (JPEG + WebP, 16/32 px) so a full build stays fast.

use photfolio::imaging::RustBackend;
use photfolio::pipeline::{self, BuildOptions, BuildReport, MANIFEST_FILE, PipelineError};
use photfolio::process::CancelToken;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FAST_CONFIG: &str = r#"
[site]
title = "Test Portfolio"
author = "Ada"

[image]
formats = ["jpeg", "webp"]

[image.max_dimensions]
thumbnail = 16
display = 32
"#;

// =========================================================================
// Fixtures
// =========================================================================

fn jpeg(width: u32, height: u32, app1: Option<&[u8]>) -> Vec<u8> {
    let pixels = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 7) as u8, (y * 11) as u8, 90])
    });
    let mut out = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut out, 90);
    if let Some(payload) = app1 {
        encoder.add_app_segment(1, payload).unwrap();
    }
    encoder
        .encode(
            pixels.as_raw(),
            width as u16,
            height as u16,
            jpeg_encoder::ColorType::Rgb,
        )
        .unwrap();
    out
}

/// `Exif\0\0` + a little-endian TIFF with Make ("Cam") and Orientation.
fn exif_app1(orientation: u16) -> Vec<u8> {
    let mut p = b"Exif\0\0II".to_vec();
    p.extend_from_slice(&42u16.to_le_bytes());
    p.extend_from_slice(&8u32.to_le_bytes());
    p.extend_from_slice(&2u16.to_le_bytes());
    // Make, ASCII, 4 bytes inline
    p.extend_from_slice(&0x010Fu16.to_le_bytes());
    p.extend_from_slice(&2u16.to_le_bytes());
    p.extend_from_slice(&4u32.to_le_bytes());
    p.extend_from_slice(b"Cam\0");
    // Orientation, SHORT
    p.extend_from_slice(&0x0112u16.to_le_bytes());
    p.extend_from_slice(&3u16.to_le_bytes());
    p.extend_from_slice(&1u32.to_le_bytes());
    p.extend_from_slice(&orientation.to_le_bytes());
    p.extend_from_slice(&[0, 0]);
    p.extend_from_slice(&0u32.to_le_bytes());
    p
}

struct Site {
    _root: TempDir,
    options: BuildOptions,
}

impl Site {
    fn new(config: &str) -> Self {
        let root = TempDir::new().unwrap();
        let mut options = BuildOptions::new(root.path().join("photos"), root.path().join("dist"));
        options.config = root.path().join("config.toml");
        options.styles = root.path().join("styles");
        options.assets = root.path().join("assets");
        options.jobs = Some(2);
        options.year = 2026;
        fs::create_dir_all(&options.photos).unwrap();
        fs::write(&options.config, config).unwrap();
        Self {
            _root: root,
            options,
        }
    }

    fn photo(&self, rel: &str, bytes: &[u8]) {
        let path = self.options.photos.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    fn build(&self) -> Result<BuildReport, PipelineError> {
        pipeline::build(&self.options, &RustBackend::new(), &CancelToken::new(), None)
    }

    fn out(&self, rel: &str) -> PathBuf {
        self.options.output.join(rel)
    }
}

fn read_dimensions(path: &Path) -> (u32, u32) {
    image::ImageReader::open(path)
        .unwrap()
        .with_guessed_format()
        .unwrap()
        .into_dimensions()
        .unwrap()
}

fn png(color: [u8; 3]) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image::RgbImage::from_pixel(40, 30, image::Rgb(color))
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn mean_channel(path: &Path, channel: usize) -> f64 {
    let pixels = image::open(path).unwrap().to_rgb8();
    let sum: u64 = pixels.pixels().map(|p| p.0[channel] as u64).sum();
    sum as f64 / (pixels.width() * pixels.height()) as f64
}

/// Per-channel mean absolute difference of two same-sized images.
fn mean_abs_diff(a: &Path, b: &Path) -> f64 {
    let a = image::open(a).unwrap().to_rgb8();
    let b = image::open(b).unwrap().to_rgb8();
    assert_eq!(a.dimensions(), b.dimensions());
    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(x, y)| x.abs_diff(*y) as u64)
        .sum();
    total as f64 / a.as_raw().len() as f64
}

fn has_exif(path: &Path) -> bool {
    let bytes = fs::read(path).unwrap();
    exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .is_ok()
}

// =========================================================================
// Full builds
// =========================================================================

#[test]
fn builds_site_from_photo_tree() {
    let site = Site::new(FAST_CONFIG);
    site.photo("cover.jpg", &jpeg(48, 32, None));
    site.photo("010-Landscapes/img2.jpg", &jpeg(40, 30, None));
    site.photo("010-Landscapes/img10.jpg", &jpeg(40, 30, None));
    site.photo("010-Landscapes/img1.jpg", &jpeg(40, 30, None));
    site.photo("010-Landscapes/notes.txt", b"not a photo");

    let report = site.build().unwrap();

    let titles: Vec<&str> = report.model.albums.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Main", "Landscapes"]);
    let slugs: Vec<&str> = report.model.albums[1]
        .photos
        .iter()
        .map(|p| p.slug.as_str())
        .collect();
    assert_eq!(slugs, vec!["img1", "img2", "img10"]);

    for album in &report.model.albums {
        for photo in &album.photos {
            assert_eq!(photo.variants.len(), 4);
            for variant in photo.variants.values() {
                let (w, h) = read_dimensions(&site.out(&variant.path));
                assert_eq!((w, h), (variant.width, variant.height), "{}", variant.path);
                assert!(w <= photo.width && h <= photo.height);
                assert!(w.max(h) <= 32);
            }
        }
    }

    let index = fs::read_to_string(site.out("index.html")).unwrap();
    assert!(index.contains("Test Portfolio"));
    assert!(index.contains("© 2026 Ada"));
    let album = fs::read_to_string(site.out("landscapes.html")).unwrap();
    assert!(album.contains(r#"type="image/webp""#));
    assert!(site.out(MANIFEST_FILE).is_file());
}

#[test]
fn rebuild_is_idempotent() {
    let site = Site::new(FAST_CONFIG);
    site.photo("a/one.jpg", &jpeg(40, 30, None));
    site.photo("a/two.jpg", &jpeg(30, 40, None));

    site.build().unwrap();
    let manifest = fs::read(site.out(MANIFEST_FILE)).unwrap();
    let thumb = fs::read(site.out("images/a/one-thumb.jpg")).unwrap();

    let report = site.build().unwrap();

    assert_eq!(report.cache_stats.misses, 0);
    assert_eq!(report.cache_stats.hits, 8);
    assert_eq!(fs::read(site.out(MANIFEST_FILE)).unwrap(), manifest);
    assert_eq!(fs::read(site.out("images/a/one-thumb.jpg")).unwrap(), thumb);
}

#[test]
fn one_corrupt_file_among_nine_is_skipped() {
    let site = Site::new(FAST_CONFIG);
    for i in 1..=9 {
        site.photo(&format!("a/p{i}.jpg"), &jpeg(20, 20, None));
    }
    site.photo("a/p10.jpg", b"\xFF\xD8\xFF garbage");

    let report = site.build().unwrap();

    assert_eq!(report.model.photo_count, 9);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].source, PathBuf::from("a/p10.jpg"));
}

// =========================================================================
// Policies
// =========================================================================

#[test]
fn empty_root_builds_empty_site_by_default() {
    let site = Site::new(FAST_CONFIG);
    let report = site.build().unwrap();
    assert!(report.model.albums.is_empty());
    assert!(site.out("index.html").is_file());
}

#[test]
fn empty_root_fails_when_disallowed() {
    let site = Site::new(&format!("{FAST_CONFIG}\n[albums]\nallow_empty = false\n"));
    let err = site.build().unwrap_err();
    assert!(matches!(err, PipelineError::Manifest(_)));
}

#[test]
fn exif_strip_controls_metadata_not_pixels() {
    let stripped = Site::new(FAST_CONFIG);
    let kept = Site::new(&format!("{FAST_CONFIG}\n[exif]\nstrip = false\n"));
    let source = jpeg(40, 20, Some(&exif_app1(6)));
    stripped.photo("a/rotated.jpg", &source);
    kept.photo("a/rotated.jpg", &source);

    stripped.build().unwrap();
    kept.build().unwrap();

    let display = "images/a/rotated-display.jpg";
    assert!(!has_exif(&stripped.out(display)));
    assert!(has_exif(&kept.out(display)));
    // Orientation is applied to the pixels either way.
    assert_eq!(read_dimensions(&stripped.out(display)), (16, 32));
    assert_eq!(read_dimensions(&kept.out(display)), (16, 32));
    let diff = mean_abs_diff(&stripped.out(display), &kept.out(display));
    assert!(diff < 2.0, "stripped and kept pixels differ by {diff:.2} on average");
}

#[test]
fn swapped_sources_each_keep_their_own_pixels() {
    let mut site = Site::new(FAST_CONFIG);
    site.options.jobs = Some(1);
    let red = png([250, 0, 0]);
    let blue = png([0, 0, 250]);
    site.photo("a/x.png", &red);
    site.photo("a/y.png", &blue);
    site.build().unwrap();
    assert!(mean_channel(&site.out("images/a/x-display.jpg"), 0) > 200.0);

    site.photo("a/x.png", &blue);
    site.photo("a/y.png", &red);
    site.build().unwrap();

    for kind in ["display.jpg", "thumb.jpg", "display.webp", "thumb.webp"] {
        let x = site.out(&format!("images/a/x-{kind}"));
        let y = site.out(&format!("images/a/y-{kind}"));
        assert!(mean_channel(&x, 2) > 200.0, "x-{kind} should be blue");
        assert!(mean_channel(&y, 0) > 200.0, "y-{kind} should be red");
    }

    // And the index recorded them correctly: a third build changes nothing.
    let report = site.build().unwrap();
    assert_eq!(report.cache_stats.hits, 8);
    assert!(mean_channel(&site.out("images/a/y-display.jpg"), 0) > 200.0);
}

#[test]
fn removing_a_source_prunes_its_derivatives() {
    let site = Site::new(FAST_CONFIG);
    site.photo("a/keep.jpg", &jpeg(20, 20, None));
    site.photo("a/drop.jpg", &jpeg(20, 20, None));
    site.build().unwrap();
    assert!(site.out("images/a/drop-display.webp").is_file());

    fs::remove_file(site.options.photos.join("a/drop.jpg")).unwrap();
    let report = site.build().unwrap();

    assert_eq!(report.pruned, 4);
    assert!(!site.out("images/a/drop-display.webp").exists());
    assert!(site.out("images/a/keep-display.webp").is_file());
}

// =========================================================================
// Fatal errors and cancellation
// =========================================================================

#[test]
fn missing_photo_root_leaves_output_untouched() {
    let site = Site::new(FAST_CONFIG);
    fs::create_dir_all(&site.options.output).unwrap();
    fs::write(site.out("index.html"), "previous build").unwrap();
    fs::remove_dir_all(&site.options.photos).unwrap();

    let err = site.build().unwrap_err();

    assert!(matches!(err, PipelineError::Scan(_)));
    assert_eq!(fs::read_to_string(site.out("index.html")).unwrap(), "previous build");
}

#[test]
fn cancelled_build_writes_no_pages() {
    let site = Site::new(FAST_CONFIG);
    site.photo("a/one.jpg", &jpeg(20, 20, None));
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = pipeline::build(&site.options, &RustBackend::new(), &cancel, None).unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled { remaining: 1 }));
    assert!(!site.out("index.html").exists());
}
