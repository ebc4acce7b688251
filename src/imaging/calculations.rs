//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;

/// Fit `source` within a square of side `max_dimension`, preserving aspect
/// ratio. Never upscales: a source already inside the bound is returned as is.
///
/// The longer edge lands exactly on `max_dimension`; the shorter edge is
/// rounded and kept at least 1 pixel.
///
/// ```
/// # use photfolio::imaging::{Dimensions, fit_within};
/// let fitted = fit_within(Dimensions { width: 4000, height: 3000 }, 400);
/// assert_eq!(fitted, Dimensions { width: 400, height: 300 });
/// ```
pub fn fit_within(source: Dimensions, max_dimension: u32) -> Dimensions {
    let Dimensions { width, height } = source;
    let longer = width.max(height);
    if longer <= max_dimension || longer == 0 {
        return source;
    }

    let scale = |edge: u32| -> u32 {
        let scaled = (edge as f64 * max_dimension as f64 / longer as f64).round() as u32;
        scaled.clamp(1, max_dimension)
    };

    if width >= height {
        Dimensions {
            width: max_dimension,
            height: scale(height),
        }
    } else {
        Dimensions {
            width: scale(width),
            height: max_dimension,
        }
    }
}

/// Dimensions after EXIF orientation: quarter turns swap the edges.
pub fn oriented(raw: Dimensions, swap: bool) -> Dimensions {
    if swap {
        Dimensions {
            width: raw.height,
            height: raw.width,
        }
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    // =========================================================================
    // fit_within tests
    // =========================================================================

    #[test]
    fn fit_landscape() {
        // 2000x1500 into 1000 → 1000x750
        assert_eq!(fit_within(dims(2000, 1500), 1000), dims(1000, 750));
    }

    #[test]
    fn fit_portrait() {
        // 1500x2000 into 1000 → 750x1000
        assert_eq!(fit_within(dims(1500, 2000), 1000), dims(750, 1000));
    }

    #[test]
    fn fit_square() {
        assert_eq!(fit_within(dims(800, 800), 400), dims(400, 400));
    }

    #[test]
    fn fit_never_upscales() {
        assert_eq!(fit_within(dims(300, 200), 400), dims(300, 200));
        assert_eq!(fit_within(dims(400, 100), 400), dims(400, 100));
    }

    #[test]
    fn fit_rounds_shorter_edge() {
        // 1000x333 into 100 → 100x33.3 → 33
        assert_eq!(fit_within(dims(1000, 333), 100), dims(100, 33));
        // 1000x335 into 100 → 33.5 → 34
        assert_eq!(fit_within(dims(1000, 335), 100), dims(100, 34));
    }

    #[test]
    fn fit_extreme_panorama_keeps_one_pixel() {
        assert_eq!(fit_within(dims(10000, 2), 100), dims(100, 1));
    }

    #[test]
    fn fit_never_exceeds_bounds() {
        let sources = [
            (1, 1),
            (7, 3),
            (3, 7),
            (640, 480),
            (4032, 3024),
            (3024, 4032),
            (5000, 5001),
            (65535, 1),
        ];
        for (w, h) in sources {
            for max in [1, 16, 400, 2048] {
                let out = fit_within(dims(w, h), max);
                assert!(out.width <= w && out.height <= h, "{w}x{h} @ {max}: {out:?}");
                assert!(out.width.max(out.height) <= max, "{w}x{h} @ {max}: {out:?}");
                assert!(out.width >= 1 && out.height >= 1);
            }
        }
    }

    // =========================================================================
    // oriented tests
    // =========================================================================

    #[test]
    fn oriented_swaps_for_quarter_turns() {
        assert_eq!(oriented(dims(40, 20), true), dims(20, 40));
        assert_eq!(oriented(dims(40, 20), false), dims(40, 20));
    }
}
