//! Image processing, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Decode** | `image` (JPEG, PNG, WebP), sniffed from content |
//! | **Resize** | Lanczos3 |
//! | **Encode** | `jpeg-encoder` for JPEG, `image` codecs for WebP and AVIF |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing an encode
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{fit_within, oriented};
pub use params::{EncodeParams, Quality};
pub use rust_backend::{RustBackend, supported_input_extensions};
