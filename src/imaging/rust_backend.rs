//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary. libwebp is the one C
//! library, built from source by the `webp` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify / decode (JPEG, PNG, WebP) | `image::ImageReader` with content sniffing |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `jpeg-encoder` (progressive scans, APP1 segments) |
//! | Encode → WebP | `webp::Encoder` (lossy libwebp at the configured quality) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::EncodeParams;
use crate::types::OutputFormat;
use image::codecs::avif::AvifEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, RgbImage};
use std::io::Cursor;
use std::sync::LazyLock;

/// rav1e speed preset: 1 is slowest/best, 10 fastest.
const AVIF_SPEED: u8 = 6;

/// Extensions the scanner accepts, and the decoder each one expects.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, BackendError> {
    Ok(ImageReader::new(Cursor::new(bytes)).with_guessed_format()?)
}

/// Composite any transparency onto white; JPEG has no alpha channel.
fn flatten_to_rgb(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = a as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a)) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

/// 8-bit RGB or RGBA copy, the layouts the WebP and AVIF encoders accept.
fn to_8bit(image: &DynamicImage) -> DynamicImage {
    if image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    }
}

fn encode_jpeg(image: &DynamicImage, params: &EncodeParams<'_>) -> Result<Vec<u8>, BackendError> {
    let rgb = flatten_to_rgb(image);
    let (w, h) = rgb.dimensions();
    let (Ok(width), Ok(height)) = (u16::try_from(w), u16::try_from(h)) else {
        return Err(BackendError::Encode(format!(
            "{w}x{h} exceeds the JPEG size limit"
        )));
    };

    let mut out = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut out, params.quality.value() as u8);
    encoder.set_progressive(params.progressive);
    if let Some(exif) = params.exif {
        encoder
            .add_app_segment(1, exif)
            .map_err(|e| BackendError::Encode(format!("EXIF segment: {e}")))?;
    }
    encoder
        .encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| BackendError::Encode(format!("JPEG: {e}")))?;
    Ok(out)
}

fn encode_webp(image: &DynamicImage, params: &EncodeParams<'_>) -> Result<Vec<u8>, BackendError> {
    let pixels = to_8bit(image);
    let encoder = webp::Encoder::from_image(&pixels)
        .map_err(|e| BackendError::Encode(format!("WebP: {e}")))?;
    Ok(encoder.encode(params.quality.value() as f32).to_vec())
}

fn encode_avif(image: &DynamicImage, params: &EncodeParams<'_>) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::new();
    let encoder =
        AvifEncoder::new_with_speed_quality(&mut out, AVIF_SPEED, params.quality.value() as u8);
    to_8bit(image)
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode(format!("AVIF: {e}")))?;
    Ok(out)
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = reader(bytes)?
            .into_dimensions()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(Dimensions { width, height })
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        reader(bytes)?
            .decode()
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn resize(
        &self,
        image: &DynamicImage,
        target: Dimensions,
    ) -> Result<DynamicImage, BackendError> {
        if image.width() == target.width && image.height() == target.height {
            return Ok(image.clone());
        }
        Ok(image.resize_exact(target.width, target.height, FilterType::Lanczos3))
    }

    fn encode(
        &self,
        image: &DynamicImage,
        params: &EncodeParams<'_>,
    ) -> Result<Vec<u8>, BackendError> {
        match params.format {
            OutputFormat::Jpeg => encode_jpeg(image, params),
            OutputFormat::Webp => encode_webp(image, params),
            OutputFormat::Avif => encode_avif(image, params),
        }
    }
}
