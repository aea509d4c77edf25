//! Alignment oracle: keeps phase-lock across reference-cycle
//! regenerations in `ADAPT` by mapping each new reference cycle onto a
//! fixed normalised phase axis shared across generations.
//!
//! The accumulating state this needs (`sequence_history`, `shift_history`,
//! `drift_history`, a running `global_solution`) is kept private behind a
//! single [`AlignmentOracle::update`] method, rather than exposed as the
//! tuple-of-five-arrays the opaque external function it replaces returns.

use crate::frame::Frame;
use crate::sad::sad_vector_with_drift;

/// Collaborator invoked on every accepted `ADAPT` reference cycle.
pub trait AlignmentOracle {
    /// The number of samples the normalised phase axis is divided into.
    fn axis_len(&self) -> u8;

    /// Fold in a newly accepted reference cycle and return the target
    /// index (on `0..axis_len()`) that continues the phase-lock
    /// established by prior generations.
    fn update(&mut self, reference_cycle: &[Frame], period: f64, drift: i32) -> u8;
}

/// Default implementation: resample each new cycle's self-SAD profile
/// onto the fixed axis and cross-correlate it against the previous
/// generation's resampled profile to find the shift that keeps the
/// chosen target phase-locked.
pub struct CrossCorrelationOracle {
    axis_len: u8,
    max_drift: i32,
    previous_profile: Option<Vec<f64>>,
    previous_target: Option<u8>,
    sequence_history: Vec<Vec<f64>>,
    shift_history: Vec<i32>,
    drift_history: Vec<i32>,
}

impl CrossCorrelationOracle {
    pub fn new(axis_len: u8, max_drift: i32) -> Self {
        Self {
            axis_len,
            max_drift,
            previous_profile: None,
            previous_target: None,
            sequence_history: Vec::new(),
            shift_history: Vec::new(),
            drift_history: Vec::new(),
        }
    }

    /// Resample a cycle's self-similarity profile (SAD of each frame
    /// against the cycle's first frame) onto `axis_len` evenly-spaced
    /// samples covering one period.
    fn resample_profile(&self, reference_cycle: &[Frame], period: f64) -> Vec<f64> {
        if reference_cycle.is_empty() {
            return vec![0.0; self.axis_len as usize];
        }
        let anchor = &reference_cycle[0];
        let raw: Vec<f64> = sad_vector_with_drift(anchor, reference_cycle, self.max_drift)
            .into_iter()
            .map(|(s, _)| s as f64)
            .collect();

        (0..self.axis_len)
            .map(|i| {
                let frac = i as f64 / self.axis_len as f64 * period;
                let lo = frac.floor() as usize;
                let hi = (lo + 1).min(raw.len().saturating_sub(1));
                let lo = lo.min(raw.len().saturating_sub(1));
                let t = frac - frac.floor();
                raw[lo] * (1.0 - t) + raw[hi] * t
            })
            .collect()
    }

    /// Circular cross-correlation: the shift that best aligns `profile`
    /// with `previous`.
    fn best_circular_shift(previous: &[f64], profile: &[f64]) -> u8 {
        let n = previous.len();
        if n == 0 {
            return 0;
        }
        let mut best_shift = 0usize;
        let mut best_score = f64::MAX;
        for shift in 0..n {
            let score: f64 = (0..n)
                .map(|i| {
                    let a = previous[i];
                    let b = profile[(i + shift) % n];
                    (a - b).abs()
                })
                .sum();
            if score < best_score {
                best_score = score;
                best_shift = shift;
            }
        }
        best_shift as u8
    }
}

impl AlignmentOracle for CrossCorrelationOracle {
    fn axis_len(&self) -> u8 {
        self.axis_len
    }

    fn update(&mut self, reference_cycle: &[Frame], period: f64, drift: i32) -> u8 {
        let profile = self.resample_profile(reference_cycle, period);
        self.drift_history.push(drift);

        let target = match (&self.previous_profile, self.previous_target) {
            (Some(previous), Some(previous_target)) => {
                let shift = Self::best_circular_shift(previous, &profile);
                self.shift_history.push(shift as i32);
                (previous_target as i32 + shift as i32).rem_euclid(self.axis_len as i32) as u8
            }
            _ => 0,
        };

        self.sequence_history.push(profile.clone());
        self.previous_profile = Some(profile);
        self.previous_target = Some(target);
        target
    }
}
