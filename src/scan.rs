//! Filesystem scanning.
//!
//! Stage 1 of the photfolio build pipeline. Walks the photo root and returns
//! every supported source image grouped by album, in a deterministic order.
//!
//! ## Directory Structure
//!
//! ```text
//! photos/                          # Photo root
//! ├── cover.jpg                    # Top-level files → default album
//! ├── 010-Landscapes/              # Album "Landscapes"
//! │   ├── img1.jpg
//! │   ├── img2.jpg
//! │   └── img10.jpg
//! ├── Travel/                      # Album "Travel"
//! │   ├── tokyo.jpg
//! │   └── 2019/                    # Nested: flattened into "Travel",
//! │       └── kyoto.jpg            #   or an error under `nesting = "reject"`
//! ├── Drafts/                      # No images → empty album
//! └── .git/                        # Hidden → ignored
//! ```
//!
//! ## Rules
//!
//! - Supported extensions (case-insensitive): jpg, jpeg, png, webp. Anything
//!   else is ignored. Whether the bytes really are an image is decided later,
//!   at decode time.
//! - Hidden entries (`.` prefix) are skipped at every level.
//! - Symlinks and other non-regular files are never followed or collected.
//!
//! ## Ordering
//!
//! Pass one collects paths into ordered sets; pass two sorts albums (default
//! album first, then natural order of directory name) and files (natural
//! order of file name, ties by relative path). The result never depends on
//! the order the OS returns directory entries in.

use crate::config::NestingPolicy;
use crate::imaging::supported_input_extensions;
use crate::naming::natural_cmp;
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("photo root does not exist: {0}")]
    RootMissing(PathBuf),
    #[error("photo root is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("nested directory inside an album: {0}")]
    NestedAlbum(PathBuf),
}

/// A source image found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the photo root.
    pub rel_path: PathBuf,
    pub file_name: String,
}

/// One album's worth of source images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedAlbum {
    /// Directory relative to the photo root; empty for the default album.
    pub rel_path: PathBuf,
    pub files: Vec<ScannedFile>,
}

impl ScannedAlbum {
    pub fn is_default(&self) -> bool {
        self.rel_path.as_os_str().is_empty()
    }

    /// Directory name, or `None` for the default album.
    pub fn dir_name(&self) -> Option<String> {
        self.rel_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }
}

#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Canonicalized photo root.
    pub root: PathBuf,
    pub albums: Vec<ScannedAlbum>,
}

impl ScanResult {
    /// Flat `(album path, absolute file path)` list in scan order.
    pub fn pairs(&self) -> Vec<(&Path, &Path)> {
        self.albums
            .iter()
            .flat_map(|album| {
                album
                    .files
                    .iter()
                    .map(move |f| (album.rel_path.as_path(), f.path.as_path()))
            })
            .collect()
    }

    pub fn file_count(&self) -> usize {
        self.albums.iter().map(|a| a.files.len()).sum()
    }
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| supported_input_extensions().contains(&ext.as_str()))
}

fn unreadable(path: &Path) -> impl FnOnce(io::Error) -> ScanError + '_ {
    move |source| ScanError::Unreadable {
        path: path.to_path_buf(),
        source,
    }
}

/// Scan `root` for albums and source images.
pub fn scan(root: &Path, nesting: NestingPolicy) -> Result<ScanResult, ScanError> {
    let meta = match fs::metadata(root) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ScanError::RootMissing(root.to_path_buf()));
        }
        Err(e) => return Err(unreadable(root)(e)),
    };
    if !meta.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    let root = root.canonicalize().map_err(unreadable(root))?;

    // Pass one: album path → relative file paths.
    let mut buckets: BTreeMap<PathBuf, BTreeSet<PathBuf>> = BTreeMap::new();
    for entry in fs::read_dir(&root).map_err(unreadable(&root))? {
        let entry = entry.map_err(unreadable(&root))?;
        let name = entry.file_name();
        if is_hidden(&name) {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type().map_err(unreadable(&path))?;
        if file_type.is_dir() {
            let album = PathBuf::from(&name);
            let files = collect_album(&root, &album, nesting)?;
            buckets.entry(album).or_default().extend(files);
        } else if file_type.is_file() && is_supported(&path) {
            buckets
                .entry(PathBuf::new())
                .or_default()
                .insert(PathBuf::from(&name));
        }
    }

    // Pass two: deterministic order.
    let mut albums: Vec<ScannedAlbum> = buckets
        .into_iter()
        .map(|(rel_path, files)| ScannedAlbum {
            files: order_files(&root, files),
            rel_path,
        })
        .collect();
    albums.sort_by(|a, b| {
        b.is_default().cmp(&a.is_default()).then_with(|| {
            natural_cmp(
                &a.rel_path.to_string_lossy(),
                &b.rel_path.to_string_lossy(),
            )
        })
    });

    for album in &albums {
        debug!(album = %album.rel_path.display(), files = album.files.len(), "scanned album");
    }
    let result = ScanResult { root, albums };
    info!(
        albums = result.albums.len(),
        files = result.file_count(),
        "scan complete"
    );
    Ok(result)
}

/// Every supported file under one top-level album directory.
fn collect_album(
    root: &Path,
    album: &Path,
    nesting: NestingPolicy,
) -> Result<Vec<PathBuf>, ScanError> {
    let album_dir = root.join(album);
    let mut files = Vec::new();
    let walker = WalkDir::new(&album_dir)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_hidden(e.file_name()));

    for entry in walker {
        let entry = entry.map_err(|e| ScanError::Unreadable {
            path: e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| album_dir.clone()),
            source: io::Error::from(e),
        })?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            if nesting == NestingPolicy::Reject {
                return Err(ScanError::NestedAlbum(entry.into_path()));
            }
            continue;
        }
        if file_type.is_file() && is_supported(entry.path()) {
            if let Ok(rel) = entry.path().strip_prefix(root) {
                files.push(rel.to_path_buf());
            }
        }
    }
    Ok(files)
}

fn order_files(root: &Path, files: BTreeSet<PathBuf>) -> Vec<ScannedFile> {
    let mut files: Vec<ScannedFile> = files
        .into_iter()
        .map(|rel_path| ScannedFile {
            path: root.join(&rel_path),
            file_name: rel_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            rel_path,
        })
        .collect();
    files.sort_by(|a, b| {
        natural_cmp(&a.file_name, &b.file_name)
            .then_with(|| natural_cmp(&a.rel_path.to_string_lossy(), &b.rel_path.to_string_lossy()))
    });
    files
}
