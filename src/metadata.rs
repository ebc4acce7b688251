//! EXIF metadata: orientation, capture time, and a display summary.
//!
//! Parsing goes through `kamadak-exif`, which understands JPEG, PNG (`eXIf`)
//! and WebP containers. Metadata is best effort everywhere: a file without
//! EXIF, or with a block the parser rejects, simply has none. Corrupt image
//! data is detected later, at decode time.
//!
//! When derivatives keep their metadata (`exif.strip = false`), the source's
//! TIFF block is re-embedded into JPEG outputs as an APP1 segment with the
//! orientation tag reset to 1, because the pixels have already been rotated.

use chrono::NaiveDateTime;
use exif::{Exif, In, Tag, Value};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

/// Largest APP1 payload a JPEG segment can carry (u16 length minus itself).
const MAX_APP1_PAYLOAD: usize = 65_533;

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Camera details shown under a photo when `exif.display` is on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExifSummary {
    pub entries: Vec<ExifEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExifEntry {
    pub label: String,
    pub value: String,
}

impl ExifSummary {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.value.as_str())
    }
}

/// Everything the variant generator needs from a source's EXIF block.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoMetadata {
    /// EXIF orientation, 1-8. 1 when absent or out of range.
    pub orientation: u16,
    pub captured_at: Option<NaiveDateTime>,
    pub summary: Option<ExifSummary>,
    raw_tiff: Option<Vec<u8>>,
}

impl Default for PhotoMetadata {
    fn default() -> Self {
        Self {
            orientation: 1,
            captured_at: None,
            summary: None,
            raw_tiff: None,
        }
    }
}

impl PhotoMetadata {
    /// Extract metadata from an in-memory image file.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match read_exif(bytes) {
            Some(exif) => Self::from_exif(&exif),
            None => Self::default(),
        }
    }

    fn from_exif(exif: &Exif) -> Self {
        let orientation = exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|f| f.value.get_uint(0))
            .map(|v| v as u16)
            .filter(|v| (1..=8).contains(v))
            .unwrap_or(1);
        let summary = summarize(exif);
        Self {
            orientation,
            captured_at: capture_time(exif),
            summary: (!summary.is_empty()).then_some(summary),
            raw_tiff: Some(exif.buf().to_vec()),
        }
    }

    /// Orientations 5-8 rotate by a quarter turn, swapping width and height.
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self.orientation, 5..=8)
    }

    /// APP1 payload (`Exif\0\0` + TIFF) with orientation reset to 1.
    ///
    /// `None` when the source had no EXIF or the block does not fit in a
    /// single JPEG segment.
    pub fn app1_payload(&self) -> Option<Vec<u8>> {
        let tiff = self.raw_tiff.as_ref()?;
        if tiff.len() + EXIF_HEADER.len() > MAX_APP1_PAYLOAD {
            tracing::debug!(bytes = tiff.len(), "EXIF block too large for APP1, dropping");
            return None;
        }
        let mut payload = Vec::with_capacity(tiff.len() + EXIF_HEADER.len());
        payload.extend_from_slice(EXIF_HEADER);
        payload.extend_from_slice(tiff);
        normalize_orientation(&mut payload[EXIF_HEADER.len()..]);
        Some(payload)
    }
}

fn read_exif(bytes: &[u8]) -> Option<Exif> {
    exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()
}

/// Capture timestamp of a file on disk, for timestamp ordering.
///
/// Reads only as much of the file as the EXIF parser needs.
pub fn read_capture_time(path: &Path) -> Option<NaiveDateTime> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;
    capture_time(&exif)
}

fn capture_time(exif: &Exif) -> Option<NaiveDateTime> {
    [Tag::DateTimeOriginal, Tag::DateTime]
        .into_iter()
        .filter_map(|tag| ascii_field(exif, tag))
        .find_map(|text| NaiveDateTime::parse_from_str(&text, EXIF_DATETIME_FORMAT).ok())
}

fn summarize(exif: &Exif) -> ExifSummary {
    let mut entries = Vec::new();
    let mut push = |label: &str, value: Option<String>| {
        if let Some(value) = value {
            entries.push(ExifEntry {
                label: label.to_string(),
                value,
            });
        }
    };

    push("Camera", camera_description(exif));
    push("Lens", ascii_field(exif, Tag::LensModel));
    push("Focal length", display_field(exif, Tag::FocalLength));
    push("Aperture", display_field(exif, Tag::FNumber));
    push("Shutter speed", display_field(exif, Tag::ExposureTime));
    push("ISO", display_field(exif, Tag::PhotographicSensitivity));
    push("Date", ascii_field(exif, Tag::DateTimeOriginal));

    ExifSummary { entries }
}

fn camera_description(exif: &Exif) -> Option<String> {
    let make = ascii_field(exif, Tag::Make);
    let model = ascii_field(exif, Tag::Model);
    match (make, model) {
        (Some(make), Some(model)) => {
            if model.to_lowercase().starts_with(&make.to_lowercase()) {
                Some(model)
            } else {
                Some(format!("{make} {model}"))
            }
        }
        (make, model) => make.or(model),
    }
}

fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let Value::Ascii(parts) = &field.value else {
        return None;
    };
    let text = parts
        .iter()
        .map(|p| String::from_utf8_lossy(p))
        .collect::<Vec<_>>()
        .join(" ");
    let text = text.trim_matches(char::from(0)).trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn display_field(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let text = field.display_value().with_unit(exif).to_string();
    (!text.is_empty()).then_some(text)
}

/// Rotate/flip decoded pixels so they display upright.
pub fn apply_orientation(image: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Set the IFD0 orientation tag of a TIFF block to 1, in place.
fn normalize_orientation(tiff: &mut [u8]) {
    if tiff.len() < 8 {
        return;
    }
    let le = match &tiff[0..2] {
        b"II" => true,
        b"MM" => false,
        _ => return,
    };
    let read_u16 = |b: &[u8]| {
        if le {
            u16::from_le_bytes([b[0], b[1]])
        } else {
            u16::from_be_bytes([b[0], b[1]])
        }
    };
    let ifd = if le {
        u32::from_le_bytes([tiff[4], tiff[5], tiff[6], tiff[7]])
    } else {
        u32::from_be_bytes([tiff[4], tiff[5], tiff[6], tiff[7]])
    } as usize;
    if ifd + 2 > tiff.len() {
        return;
    }
    let count = read_u16(&tiff[ifd..ifd + 2]) as usize;
    for i in 0..count {
        let entry = ifd + 2 + i * 12;
        if entry + 12 > tiff.len() {
            return;
        }
        if read_u16(&tiff[entry..entry + 2]) == 0x0112 {
            let one = if le { 1u16.to_le_bytes() } else { 1u16.to_be_bytes() };
            tiff[entry + 8..entry + 10].copy_from_slice(&one);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{exif_tiff, jpeg_bytes, jpeg_bytes_with_exif};
    use tempfile::TempDir;

    #[test]
    fn no_exif_means_defaults() {
        let bytes = jpeg_bytes(8, 6);
        let meta = PhotoMetadata::from_bytes(&bytes);
        assert_eq!(meta, PhotoMetadata::default());
        assert_eq!(meta.app1_payload(), None);
    }

    #[test]
    fn garbage_bytes_mean_defaults() {
        let meta = PhotoMetadata::from_bytes(b"definitely not an image");
        assert_eq!(meta.orientation, 1);
        assert!(meta.summary.is_none());
    }

    #[test]
    fn reads_orientation_camera_and_time() {
        let tiff = exif_tiff(6, "TestCam", Some("2021:07:04 18:30:00"));
        let bytes = jpeg_bytes_with_exif(8, 6, &tiff);

        let meta = PhotoMetadata::from_bytes(&bytes);
        assert_eq!(meta.orientation, 6);
        assert!(meta.swaps_dimensions());
        assert_eq!(
            meta.captured_at,
            NaiveDateTime::parse_from_str("2021:07:04 18:30:00", EXIF_DATETIME_FORMAT).ok()
        );
        let summary = meta.summary.unwrap();
        assert_eq!(summary.get("Camera"), Some("TestCam"));
    }

    #[test]
    fn out_of_range_orientation_is_ignored() {
        let tiff = exif_tiff(42, "TestCam", None);
        let meta = PhotoMetadata::from_bytes(&jpeg_bytes_with_exif(4, 4, &tiff));
        assert_eq!(meta.orientation, 1);
    }

    #[test]
    fn app1_payload_resets_orientation() {
        let tiff = exif_tiff(8, "TestCam", None);
        let meta = PhotoMetadata::from_bytes(&jpeg_bytes_with_exif(4, 4, &tiff));

        let payload = meta.app1_payload().unwrap();
        assert!(payload.starts_with(EXIF_HEADER));

        let reparsed = exif::Reader::new()
            .read_raw(payload[EXIF_HEADER.len()..].to_vec())
            .unwrap();
        let orientation = reparsed
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|f| f.value.get_uint(0));
        assert_eq!(orientation, Some(1));
        assert_eq!(ascii_field(&reparsed, Tag::Make).as_deref(), Some("TestCam"));
    }

    #[test]
    fn normalize_orientation_handles_big_endian() {
        // MM, magic 42, IFD at 8, one entry: Orientation SHORT 1 = 3
        let mut tiff = vec![
            b'M', b'M', 0, 42, 0, 0, 0, 8, //
            0, 1, //
            0x01, 0x12, 0, 3, 0, 0, 0, 1, 0, 3, 0, 0, //
            0, 0, 0, 0,
        ];
        normalize_orientation(&mut tiff);
        assert_eq!(&tiff[18..20], &[0, 1]);
    }

    #[test]
    fn normalize_orientation_ignores_truncated_data() {
        let mut tiff = b"II*\0\xff\x00\x00\x00".to_vec();
        let before = tiff.clone();
        normalize_orientation(&mut tiff);
        assert_eq!(tiff, before);
    }

    #[test]
    fn read_capture_time_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dated.jpg");
        let tiff = exif_tiff(1, "TestCam", Some("2019:01:02 03:04:05"));
        std::fs::write(&path, jpeg_bytes_with_exif(4, 4, &tiff)).unwrap();

        let ts = read_capture_time(&path).unwrap();
        assert_eq!(ts.to_string(), "2019-01-02 03:04:05");
    }

    #[test]
    fn read_capture_time_missing_file_is_none() {
        assert!(read_capture_time(Path::new("/nonexistent/photo.jpg")).is_none());
    }

    #[test]
    fn apply_orientation_rotates_quarter_turns() {
        let img = DynamicImage::new_rgb8(40, 20);
        let rotated = apply_orientation(img.clone(), 6);
        assert_eq!((rotated.width(), rotated.height()), (20, 40));
        let same = apply_orientation(img, 3);
        assert_eq!((same.width(), same.height()), (40, 20));
    }
}
