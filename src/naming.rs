//! Name handling shared by albums and photos: natural ordering, URL slugs,
//! collision resolution, and readable album titles.
//!
//! ## Natural order
//!
//! File and directory names are compared the way people read them: runs of
//! digits compare by numeric value and letters compare case-insensitively, so
//! `img2.jpg` sorts before `img10.jpg` and `Beach.jpg` sits next to
//! `beach-2.jpg`. Names that are equal under those rules fall back to a plain
//! byte comparison so the order is total and never depends on the filesystem.
//!
//! ## Slugs
//!
//! - `My Photo.jpg` → `my-photo`
//! - `Café au lait.png` → `cafe-au-lait`
//! - `IMG_0042.JPG` → `img-0042`
//!
//! Duplicates get `-2`, `-3`, … in the order they are allocated.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

/// Compare two names in natural order.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_cmp_folded(a, b).then_with(|| a.cmp(b))
}

fn natural_cmp_folded(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();
    loop {
        let ord = match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let run_a = take_digits(&mut a);
                let run_b = take_digits(&mut b);
                compare_digit_runs(&run_a, &run_b)
            }
            (Some(ca), Some(cb)) => {
                a.next();
                b.next();
                ca.to_lowercase().cmp(cb.to_lowercase())
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        run.push(c);
    }
    run
}

/// Numeric comparison of two digit strings of any length.
fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Lowercase ASCII slug: transliterated, with every run of other characters
/// collapsed into a single `-`. May be empty.
pub fn slugify(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut need_dash = false;
    for ch in input.chars() {
        for b in deunicode::deunicode_char(ch).unwrap_or("-").bytes() {
            if b.is_ascii_alphanumeric() {
                if need_dash {
                    output.push('-');
                    need_dash = false;
                }
                output.push(b.to_ascii_lowercase() as char);
            } else {
                need_dash = !output.is_empty();
            }
        }
    }
    output
}

/// Base slug for a photo: the file name without extension, slugified.
/// Falls back to `photo` when nothing usable remains.
pub fn photo_slug_base(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let slug = slugify(&stem);
    if slug.is_empty() {
        "photo".to_string()
    } else {
        slug
    }
}

/// Hands out unique slugs, appending `-2`, `-3`, … on collision.
#[derive(Debug, Default)]
pub struct SlugAllocator {
    taken: HashSet<String>,
}

impl SlugAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator that never hands out any of `reserved` verbatim.
    pub fn with_reserved<'a>(reserved: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            taken: reserved.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn allocate(&mut self, base: &str) -> String {
        if self.taken.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 2u32;
        loop {
            let candidate = format!("{base}-{n}");
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Readable album title from a directory name.
///
/// An optional numeric ordering prefix is dropped and `-`/`_` become spaces:
/// - `020-My-Best-Photos` → `My Best Photos`
/// - `street_photography` → `street photography`
/// - `2019` → `2019` (a bare number is kept as the title)
pub fn album_title(dir_name: &str) -> String {
    let name = match dir_name.split_once('-') {
        Some((prefix, rest))
            if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) =>
        {
            rest
        }
        _ => dir_name,
    };
    let title = name
        .split(['-', '_', ' '])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if title.is_empty() {
        dir_name.to_string()
    } else {
        title
    }
}
