//! Shared test utilities for the photfolio test suite.
//!
//! Provides synthetic image builders (real JPEG/PNG bytes, hand-assembled
//! EXIF blocks), photo-tree fixtures, and lookup helpers over the site model.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_file(tmp.path(), "Landscapes/dawn.jpg", &jpeg_bytes(40, 30));
//!
//! let model = /* build the site */;
//! let album = find_album(&model, "landscapes");
//! let photo = find_photo(album, "dawn");
//! assert_eq!(photo.width, 40);
//! ```

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

use crate::manifest::{Album, Photo, SiteModel};

// =========================================================================
// Synthetic images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

fn encode_jpeg(width: u32, height: u32, app1: Option<&[u8]>) -> Vec<u8> {
    let pixels = gradient(width, height);
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

/// A real baseline JPEG with a colour gradient.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode_jpeg(width, height, None)
}

/// A JPEG carrying `tiff` (see [`exif_tiff`]) in an APP1 segment.
pub fn jpeg_bytes_with_exif(width: u32, height: u32, tiff: &[u8]) -> Vec<u8> {
    let mut payload = b"Exif\0\0".to_vec();
    payload.extend_from_slice(tiff);
    encode_jpeg(width, height, Some(&payload))
}

/// A PNG; with `transparent` every pixel is fully transparent black.
pub fn png_bytes(width: u32, height: u32, transparent: bool) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    if transparent {
        RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
    } else {
        gradient(width, height)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
    }
    out.into_inner()
}

/// Little-endian TIFF block with a single IFD holding Make, Orientation and,
/// optionally, DateTime (`"YYYY:MM:DD HH:MM:SS"`).
pub fn exif_tiff(orientation: u16, make: &str, datetime: Option<&str>) -> Vec<u8> {
    const ASCII: u16 = 2;
    const SHORT: u16 = 3;

    let ascii = |s: &str| {
        let mut v = s.as_bytes().to_vec();
        v.push(0);
        v
    };
    let mut fields: Vec<(u16, u16, u32, Vec<u8>)> = vec![
        (0x010F, ASCII, make.len() as u32 + 1, ascii(make)),
        (0x0112, SHORT, 1, orientation.to_le_bytes().to_vec()),
    ];
    if let Some(dt) = datetime {
        fields.push((0x0132, ASCII, dt.len() as u32 + 1, ascii(dt)));
    }

    let ifd_len = 2 + fields.len() * 12 + 4;
    let mut data_offset = (8 + ifd_len) as u32;
    let mut tiff = b"II".to_vec();
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&(fields.len() as u16).to_le_bytes());

    let mut data = Vec::new();
    for (tag, typ, count, value) in &fields {
        tiff.extend_from_slice(&tag.to_le_bytes());
        tiff.extend_from_slice(&typ.to_le_bytes());
        tiff.extend_from_slice(&count.to_le_bytes());
        if value.len() <= 4 {
            let mut inline = value.clone();
            inline.resize(4, 0);
            tiff.extend_from_slice(&inline);
        } else {
            tiff.extend_from_slice(&data_offset.to_le_bytes());
            data.extend_from_slice(value);
            if value.len() % 2 == 1 {
                data.push(0);
            }
            data_offset = (8 + ifd_len + data.len()) as u32;
        }
    }
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff.extend_from_slice(&data);
    tiff
}

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `bytes` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, bytes).unwrap();
    path
}

// =========================================================================
// Site model lookups, panic with a clear message on miss
// =========================================================================

/// Find an album by slug. Panics if not found.
pub fn find_album<'a>(model: &'a SiteModel, slug: &str) -> &'a Album {
    model
        .albums
        .iter()
        .find(|a| a.slug == slug)
        .unwrap_or_else(|| {
            let slugs: Vec<&str> = model.albums.iter().map(|a| a.slug.as_str()).collect();
            panic!("album '{slug}' not found. Available: {slugs:?}")
        })
}

/// Find a photo by slug within an album. Panics if not found.
pub fn find_photo<'a>(album: &'a Album, slug: &str) -> &'a Photo {
    album
        .photos
        .iter()
        .find(|p| p.slug == slug)
        .unwrap_or_else(|| {
            let slugs: Vec<&str> = album.photos.iter().map(|p| p.slug.as_str()).collect();
            panic!(
                "photo '{slug}' not found in album '{}'. Available: {slugs:?}",
                album.slug
            )
        })
}

/// Photo slugs in album order.
pub fn photo_slugs(album: &Album) -> Vec<&str> {
    album.photos.iter().map(|p| p.slug.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exif_tiff_parses_with_kamadak() {
        let tiff = exif_tiff(6, "TestCam", Some("2020:01:02 03:04:05"));
        let exif = exif::Reader::new().read_raw(tiff).unwrap();
        let orientation = exif
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|f| f.value.get_uint(0));
        assert_eq!(orientation, Some(6));
        assert!(
            exif.get_field(exif::Tag::DateTime, exif::In::PRIMARY)
                .is_some()
        );
    }

    #[test]
    fn jpeg_bytes_are_real_jpeg() {
        let bytes = jpeg_bytes(10, 7);
        assert!(bytes.starts_with(&[0xFF, 0xD8]));
        assert_eq!(image::load_from_memory(&bytes).unwrap().width(), 10);
    }
}
