//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. They sit between the
//! variant generator (which decides which derivatives a photo needs) and the
//! [`backend`](super::backend) (which does the pixel work), so the generator
//! can be exercised against a mock backend.
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`EncodeParams`]: Output format, quality, progressive flag, and an optional
//!   EXIF APP1 payload for JPEG output.

use crate::types::OutputFormat;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    /// Configured quality 0 still encodes, at the lowest setting encoders take.
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// How to encode one derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams<'a> {
    pub format: OutputFormat,
    pub quality: Quality,
    /// Progressive scan; JPEG only.
    pub progressive: bool,
    /// `Exif\0\0`-prefixed APP1 payload to embed; JPEG only.
    pub exif: Option<&'a [u8]>,
}
