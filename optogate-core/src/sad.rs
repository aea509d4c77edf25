//! C1: sum-of-absolute-differences, with an optional small horizontal
//! drift search.

use crate::frame::Frame;

/// Plain SAD between two equally-shaped frames.
pub fn sad(a: &Frame, b: &Frame) -> u64 {
    debug_assert_eq!(a.shape(), b.shape());
    let mut total = 0u64;
    let n = a.pixels.len();
    for i in 0..n {
        let da = a.pixels.get(i);
        let db = b.pixels.get(i);
        total += (da - db).abs() as u64;
    }
    total
}

/// SAD at a horizontal pixel shift `delta` (columns). Pixels shifted out
/// of frame are skipped (compared over the overlapping region only).
pub fn sad_shifted(a: &Frame, b: &Frame, delta: i32) -> u64 {
    debug_assert_eq!(a.shape(), b.shape());
    let (h, w) = a.shape();
    let mut total = 0u64;
    for row in 0..h {
        for col in 0..w {
            let shifted_col = col as i64 + delta as i64;
            if shifted_col < 0 || shifted_col >= w as i64 {
                continue;
            }
            let ia = row * w + col;
            let ib = row * w + shifted_col as usize;
            let da = a.pixels.get(ia);
            let db = b.pixels.get(ib);
            total += (da - db).abs() as u64;
        }
    }
    total
}

/// Minimum SAD between `frame` and `reference` over drift shifts
/// `-max_drift..=max_drift`, returning `(min_sad, best_delta)`.
pub fn sad_with_drift(frame: &Frame, reference: &Frame, max_drift: i32) -> (u64, i32) {
    if max_drift == 0 {
        return (sad(frame, reference), 0);
    }
    let mut best = (u64::MAX, 0i32);
    for delta in -max_drift..=max_drift {
        let s = sad_shifted(frame, reference, delta);
        if s < best.0 {
            best = (s, delta);
        }
    }
    best
}

/// SAD of `frame` against every frame in `references`, no drift search.
pub fn sad_vector(frame: &Frame, references: &[Frame]) -> Vec<u64> {
    references.iter().map(|r| sad(frame, r)).collect()
}

/// SAD of `frame` against every frame in `references`, minimised over
/// drift shifts; returns the per-reference `(sad, delta)` pairs.
pub fn sad_vector_with_drift(
    frame: &Frame,
    references: &[Frame],
    max_drift: i32,
) -> Vec<(u64, i32)> {
    references
        .iter()
        .map(|r| sad_with_drift(frame, r, max_drift))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelData;

    fn mono8(height: usize, width: usize, data: Vec<u8>, t: f64) -> Frame {
        Frame::new(height, width, PixelData::Mono8(data), t)
    }

    #[test]
    fn identical_frames_have_zero_sad() {
        let a = mono8(2, 2, vec![1, 2, 3, 4], 0.0);
        let b = a.clone();
        assert_eq!(sad(&a, &b), 0);
    }

    #[test]
    fn sad_sums_absolute_differences() {
        let a = mono8(1, 3, vec![10, 20, 30], 0.0);
        let b = mono8(1, 3, vec![12, 18, 33], 1.0);
        assert_eq!(sad(&a, &b), 2 + 2 + 3);
    }

    #[test]
    fn drift_search_finds_best_shift() {
        let a = mono8(1, 4, vec![0, 10, 20, 30], 0.0);
        // b is a shifted by +1 column
        let b = mono8(1, 4, vec![0, 0, 10, 20], 1.0);
        let (best_sad, best_delta) = sad_with_drift(&a, &b, 2);
        assert_eq!(best_delta, 1);
        assert_eq!(best_sad, 0);
    }
}
