//! C3: phase matcher. Locates the position of an incoming frame within
//! the reference cycle by arg-min SAD, refined to sub-frame resolution.

use crate::frame::Frame;
use crate::sad::sad_vector_with_drift;
use crate::vfit::v_fit_offset;

/// Result of matching one frame against the reference cycle.
#[derive(Debug, Clone)]
pub struct PhaseMatch {
    /// Sub-frame position within the reference cycle, in `[E - 0.5, N_ref - E - 0.5]`.
    pub phase_in_frames: f64,
    /// Full per-reference-frame SAD vector (drift-minimised).
    pub sad: Vec<u64>,
    /// Best horizontal drift shift at the arg-min index.
    pub drift: i32,
}

/// Match `frame` against `reference_cycle`, searching only the
/// non-padded region `[num_extra_ref_frames, n_ref - num_extra_ref_frames - 1]`
/// for the arg-min, since the padding frames belong to neighbouring
/// cycles and exist only to support the V-fit and barrier bookkeeping.
pub fn match_phase(
    frame: &Frame,
    reference_cycle: &[Frame],
    num_extra_ref_frames: usize,
    max_drift: i32,
) -> Option<PhaseMatch> {
    let n_ref = reference_cycle.len();
    if n_ref < 2 * num_extra_ref_frames + 3 {
        // not enough room for a non-padded region plus V-fit neighbours
        return None;
    }
    let with_drift = sad_vector_with_drift(frame, reference_cycle, max_drift);
    let sad: Vec<u64> = with_drift.iter().map(|(s, _)| *s).collect();

    let lo = num_extra_ref_frames;
    let hi = n_ref - num_extra_ref_frames - 1;
    let (i_star, _) = sad[lo..=hi]
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| **v)
        .map(|(i, v)| (i + lo, *v))?;

    let v = if i_star == 0 || i_star + 1 >= n_ref {
        0.0
    } else {
        v_fit_offset(
            sad[i_star - 1] as f64,
            sad[i_star] as f64,
            sad[i_star + 1] as f64,
        )
    };

    Some(PhaseMatch {
        phase_in_frames: i_star as f64 + v,
        sad,
        drift: with_drift[i_star].1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelData;

    fn mono8(val: u8, t: f64) -> Frame {
        Frame::new(1, 1, PixelData::Mono8(vec![val]), t)
    }

    #[test]
    fn picks_closest_reference_frame_within_non_padded_region() {
        let reference_cycle = vec![
            mono8(0, 0.0),
            mono8(0, 1.0),
            mono8(10, 2.0),
            mono8(50, 3.0),
            mono8(10, 4.0),
            mono8(0, 5.0),
            mono8(0, 6.0),
        ];
        let frame = mono8(51, 10.0);
        let m = match_phase(&frame, &reference_cycle, 2, 0).unwrap();
        assert!((m.phase_in_frames - 3.0).abs() < 0.6);
    }

    #[test]
    fn too_short_reference_cycle_returns_none() {
        let reference_cycle = vec![mono8(0, 0.0), mono8(1, 1.0)];
        let frame = mono8(0, 2.0);
        assert!(match_phase(&frame, &reference_cycle, 2, 0).is_none());
    }
}
