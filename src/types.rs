//! Variant identity types shared by config, processing, and the manifest.
//!
//! A derivative image is identified by its [`VariantKind`]: a [`SizeClass`]
//! (how large) crossed with an [`OutputFormat`] (how encoded). The set of
//! kinds produced for every photo is the cross product of both size classes
//! with the configured formats.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Encoded output format of a derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Legacy fallback understood by every browser.
    Jpeg,
    Webp,
    Avif,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Jpeg, OutputFormat::Webp, OutputFormat::Avif];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    /// File extension used for derivatives of this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Webp => "image/webp",
            OutputFormat::Avif => "image/avif",
        }
    }

    pub fn is_modern(self) -> bool {
        !matches!(self, OutputFormat::Jpeg)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size bucket of a derivative, each with its own max dimension and quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Thumbnail,
    Display,
}

impl SizeClass {
    pub const ALL: [SizeClass; 2] = [SizeClass::Thumbnail, SizeClass::Display];

    pub fn as_str(self) -> &'static str {
        match self {
            SizeClass::Thumbnail => "thumbnail",
            SizeClass::Display => "display",
        }
    }

    /// Suffix appended to the photo slug in derivative file names.
    pub fn file_suffix(self) -> &'static str {
        match self {
            SizeClass::Thumbnail => "thumb",
            SizeClass::Display => "display",
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cell of the size × format matrix.
///
/// Serialized as `"<size>-<format>"` (e.g. `"thumbnail-jpeg"`) so it can be
/// used as a JSON object key in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct VariantKind {
    pub size: SizeClass,
    pub format: OutputFormat,
}

impl VariantKind {
    pub fn new(size: SizeClass, format: OutputFormat) -> Self {
        Self { size, format }
    }

    /// File name of this variant for a photo slug: `dawn-thumb.jpg`.
    pub fn file_name(self, photo_slug: &str) -> String {
        format!(
            "{}-{}.{}",
            photo_slug,
            self.size.file_suffix(),
            self.format.extension()
        )
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.size, self.format)
    }
}

impl FromStr for VariantKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (size, format) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid variant kind '{s}'"))?;
        let size = SizeClass::ALL
            .into_iter()
            .find(|c| c.as_str() == size)
            .ok_or_else(|| format!("unknown size class '{size}'"))?;
        let format = OutputFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == format)
            .ok_or_else(|| format!("unknown output format '{format}'"))?;
        Ok(Self { size, format })
    }
}

impl From<VariantKind> for String {
    fn from(kind: VariantKind) -> Self {
        kind.to_string()
    }
}

impl TryFrom<String> for VariantKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Every kind to produce for the given formats, thumbnails first.
pub fn variant_kinds(formats: &[OutputFormat]) -> Vec<VariantKind> {
    SizeClass::ALL
        .into_iter()
        .flat_map(|size| formats.iter().map(move |&format| VariantKind::new(size, format)))
        .collect()
}
