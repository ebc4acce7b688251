//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four operations the variant
//! generator needs: identify, decode, resize, and encode. All of them work on
//! in-memory buffers; reading sources and writing derivatives is the
//! generator's job, so a backend never touches the filesystem.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust and statically
//! linked. Tests use the recording `MockBackend` below.

use super::params::EncodeParams;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Implementations must be `Sync`: one backend is shared by every worker
/// in the processing pool.
pub trait ImageBackend: Sync {
    /// Read dimensions from the header without decoding pixels.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode a whole image. The format is detected from content, not from
    /// the file extension.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError>;

    /// Resample to exactly `target`.
    fn resize(&self, image: &DynamicImage, target: Dimensions)
    -> Result<DynamicImage, BackendError>;

    /// Encode pixels into a derivative file's bytes.
    fn encode(&self, image: &DynamicImage, params: &EncodeParams<'_>)
    -> Result<Vec<u8>, BackendError>;
}
