//! Fingerprint index for incremental builds.
//!
//! Every photo fans out into a derivative per size class and format, and the
//! AVIF ones dominate build time. The index remembers what each derivative
//! under `images/` was produced from so an unchanged photo costs a hash and
//! a few file reads instead of a decode and several encodes.
//!
//! ## What an entry records
//!
//! Entries are keyed by output path and looked up by content: the pair of
//! `source_hash` (SHA-256 of the photo's bytes) and `params_hash` (SHA-256 of
//! the size class, format, bounding box and the knobs that format honours).
//! Both are content based, so touching a file or checking it out again does
//! not invalidate anything, while editing the pixels or the config does.
//!
//! Alongside the keys each entry keeps the derivative's dimensions, byte
//! count and `fingerprint`, the SHA-256 of the derivative file. The manifest
//! is built from these without re-reading the image.
//!
//! ## Trusting a file on disk
//!
//! A recorded file is only reused when its current bytes still hash to the
//! recorded fingerprint. That covers files edited by hand, truncated by a
//! crashed run, or rewritten earlier in the same run for another photo
//! (two sources swapping contents, a new photo taking a renamed one's slug).
//! [`find_at`](CacheManifest::find_at) serves a photo whose derivative is
//! already at its path; [`find_cached`](CacheManifest::find_cached) finds the
//! same derivative under an old path after an album or photo was renamed,
//! and the caller copies it over.
//!
//! ## Storage
//!
//! `<output_dir>/.photfolio-cache.json`, entries ordered by path, so a build
//! with unchanged inputs writes it back byte for byte. `build --no-cache`
//! starts from an empty index and overwrites every derivative.

use crate::types::{OutputFormat, VariantKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::io;
use std::path::Path;

/// Name of the index file within the output directory.
const MANIFEST_FILENAME: &str = ".photfolio-cache.json";

/// Version of the index format. Bump this to invalidate all existing caches
/// when the format or key computation changes.
const MANIFEST_VERSION: u32 = 1;

/// Bumped whenever resampling or encoder setup changes in a way that alters
/// output bytes for identical parameters.
const ENCODER_REVISION: u32 = 1;

/// A single derivative recorded in the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
    /// SHA-256 of the derivative file.
    pub fingerprint: String,
}

impl CacheEntry {
    /// `bytes` is the derivative this entry describes.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        bytes.len() as u64 == self.bytes && hash_bytes(bytes) == self.fingerprint
    }
}

/// On-disk index mapping output paths (relative to the output directory,
/// `/`-separated) to their cache entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: BTreeMap<String, CacheEntry>,
    /// `"{source_hash}:{params_hash}"` to the path last recorded for it.
    /// Derived from `entries`, never written out.
    #[serde(skip)]
    content_index: HashMap<String, String>,
}

impl CacheManifest {
    /// Create an empty index (used for `--no-cache` or a first build).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
            content_index: HashMap::new(),
        }
    }

    /// Load from the output directory. Returns an empty index if the file
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(output_dir: &Path) -> Self {
        let path = output_dir.join(MANIFEST_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let mut manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable cache index");
                return Self::empty();
            }
        };
        if manifest.version != MANIFEST_VERSION {
            tracing::info!(
                found = manifest.version,
                expected = MANIFEST_VERSION,
                "cache index version changed, starting fresh"
            );
            return Self::empty();
        }
        manifest.content_index = build_content_index(&manifest.entries);
        manifest
    }

    /// Save to the output directory.
    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let path = output_dir.join(MANIFEST_FILENAME);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry recorded at exactly `output_path`, if it was produced from
    /// this source with these parameters and the file still hashes to its
    /// fingerprint.
    pub fn find_at(
        &self,
        output_path: &str,
        source_hash: &str,
        params_hash: &str,
        output_dir: &Path,
    ) -> Option<CacheEntry> {
        let entry = self.entries.get(output_path)?;
        if entry.source_hash != source_hash || entry.params_hash != params_hash {
            return None;
        }
        file_matches(output_dir, output_path, entry).then(|| entry.clone())
    }

    /// The path and entry of a derivative made from this source with these
    /// parameters, wherever it was written.
    ///
    /// The file is verified against its fingerprint now, but another photo
    /// may overwrite it before the caller copies it, so the copy has to check
    /// the bytes it read again.
    pub fn find_cached(
        &self,
        source_hash: &str,
        params_hash: &str,
        output_dir: &Path,
    ) -> Option<(String, CacheEntry)> {
        let content_key = format!("{}:{}", source_hash, params_hash);
        let stored_path = self.content_index.get(&content_key)?;
        let entry = self.entries.get(stored_path)?;
        file_matches(output_dir, stored_path, entry).then(|| (stored_path.clone(), entry.clone()))
    }

    /// Record a derivative.
    ///
    /// Content lookups resolve to the most recently inserted path. Entries at
    /// other paths stay until [`retain_paths`](Self::retain_paths) drops them,
    /// so two photos with identical bytes each keep their own entry.
    pub fn insert(&mut self, output_path: String, entry: CacheEntry) {
        let content_key = format!("{}:{}", entry.source_hash, entry.params_hash);

        if let Some(replaced) = self.entries.get(&output_path) {
            let replaced_key = format!("{}:{}", replaced.source_hash, replaced.params_hash);
            if self.content_index.get(&replaced_key) == Some(&output_path) {
                self.content_index.remove(&replaced_key);
            }
        }

        self.content_index.insert(content_key, output_path.clone());
        self.entries.insert(output_path, entry);
    }

    /// Drop every entry whose path is not in `live`. Returns how many went.
    pub fn retain_paths(&mut self, live: &BTreeSet<String>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| live.contains(path));
        self.content_index = build_content_index(&self.entries);
        before - self.entries.len()
    }
}

/// The file at `output_path` still holds the recorded derivative.
fn file_matches(output_dir: &Path, output_path: &str, entry: &CacheEntry) -> bool {
    let path = output_dir.join(output_path);
    let sized = std::fs::metadata(&path)
        .is_ok_and(|meta| meta.is_file() && meta.len() == entry.bytes);
    sized && std::fs::read(&path).is_ok_and(|bytes| entry.matches(&bytes))
}

fn build_content_index(entries: &BTreeMap<String, CacheEntry>) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(output_path, entry)| {
            let content_key = format!("{}:{}", entry.source_hash, entry.params_hash);
            (content_key, output_path.clone())
        })
        .collect()
}

/// SHA-256 of a byte buffer, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Encoding inputs of one variant, hashed into its `params_hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantParams {
    pub kind: VariantKind,
    pub max_dimension: u32,
    pub quality: u32,
    pub progressive: bool,
    pub keep_exif: bool,
}

/// SHA-256 of a variant's encoding parameters.
///
/// Only the knobs a format reads go in: toggling progressive JPEG leaves the
/// WebP and AVIF files alone.
pub fn hash_variant_params(params: &VariantParams) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"variant\0");
    hasher.update(ENCODER_REVISION.to_le_bytes());
    hasher.update(params.kind.to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(params.max_dimension.to_le_bytes());
    match params.kind.format {
        OutputFormat::Jpeg => {
            hasher.update(params.quality.to_le_bytes());
            hasher.update([params.progressive as u8, params.keep_exif as u8]);
        }
        OutputFormat::Webp | OutputFormat::Avif => {
            hasher.update(params.quality.to_le_bytes());
        }
    }
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for a build run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub copies: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn copy(&mut self) {
        self.copies += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn merge(&mut self, other: &CacheStats) {
        self.hits += other.hits;
        self.copies += other.copies;
        self.misses += other.misses;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.copies + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} encoded", self.misses)?;
        if self.hits > 0 {
            write!(f, ", {} up to date", self.hits)?;
        }
        if self.copies > 0 {
            write!(f, ", {} copied from old paths", self.copies)?;
        }
        Ok(())
    }
}
