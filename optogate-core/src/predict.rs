//! C4: trigger predictor. Fits a line to recent (time, unwrapped phase)
//! samples and extrapolates the next crossing of the target phase.

use crate::frame::{FrameHistory, FrameRecord};
use crate::settings::GaterSettings;
use nalgebra::{OMatrix, OVector, U2};

/// Outcome of a single predict-and-decide pass over the frame history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Predicted crossing is too close to reliably schedule.
    Missed { predicted_at: f64 },
    /// Fire now; the sink should be asked to schedule at `at`.
    Fire { at: f64, target_cycle: i64 },
    /// Nothing actionable yet; reconsider next frame.
    Wait,
}

/// Least-squares fit of `phi = gain*t + offset` over `(t, phi)` pairs,
/// mirroring the camera clock-model fit used elsewhere in this stack.
fn fit_line(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.len() < 2 {
        return None;
    }
    let mut a: Vec<f64> = Vec::with_capacity(points.len() * 2);
    let mut b: Vec<f64> = Vec::with_capacity(points.len());
    for &(t, phi) in points {
        a.push(t);
        a.push(1.0);
        b.push(phi);
    }
    let a = OMatrix::<f64, nalgebra::Dyn, U2>::from_row_slice(&a);
    let b = OVector::<f64, nalgebra::Dyn>::from_row_slice(&b);
    let epsilon = 1e-10;
    let results = lstsq::lstsq(&a, &b, epsilon).ok()?;
    Some((results.solution[0], results.solution[1]))
}

/// Select the fit window: walk backwards from the newest record,
/// stopping at the barrier phase (the portion of the previous cycle
/// already past the target is excluded), capped at `max_frames_for_fit`.
fn select_fit_window<'a>(
    history: &'a FrameHistory,
    barrier_phase: f64,
    max_frames_for_fit: usize,
) -> Vec<&'a FrameRecord> {
    let mut window: Vec<&FrameRecord> = Vec::new();
    for record in history.iter().rev() {
        if window.len() >= max_frames_for_fit {
            break;
        }
        if !window.is_empty() && record.unwrapped_phase < barrier_phase {
            break;
        }
        window.push(record);
    }
    window.reverse();
    window
}

/// Predict the next crossing of `targetSyncPhase`, in absolute time.
/// Returns `None` ("no prediction") if there isn't enough history, the
/// fit slope is non-positive, or the extrapolation distance exceeds the
/// configured bound.
pub fn predict_trigger_time(history: &FrameHistory, settings: &GaterSettings) -> Option<f64> {
    let reference = settings.reference()?;
    let spec = settings.spec();
    let last = history.last()?;

    let barrier_phase = last.unwrapped_phase
        - 2.0
            * std::f64::consts::PI
            * (((last.sad_min_index - reference.barrier_frame as f64)
                .rem_euclid(reference.n_ref as f64))
                / reference.reference_period);

    let window = select_fit_window(history, barrier_phase, spec.max_frames_for_fit);
    if window.len() < spec.min_frames_for_fit {
        return None;
    }

    let points: Vec<(f64, f64)> = window
        .iter()
        .map(|r| (r.timestamp_s, r.unwrapped_phase))
        .collect();
    let (gain, offset) = fit_line(&points)?;
    if gain <= 0.0 {
        return None;
    }

    let target_sync_phase = reference.target_sync_phase();
    let two_pi = 2.0 * std::f64::consts::PI;
    let k = ((last.unwrapped_phase - target_sync_phase) / two_pi).floor() + 1.0;
    let target_phase = target_sync_phase + two_pi * k;

    let t_hat = (target_phase - offset) / gain;
    let max_extrapolation =
        spec.extrapolation_factor * reference.reference_period / spec.framerate;
    if t_hat - last.timestamp_s > max_extrapolation {
        return None;
    }
    Some(t_hat)
}

/// Arbitrate whether to actually fire given a predicted absolute time.
/// `target_cycle` identifies the target-phase crossing this decision
/// pertains to, so callers can suppress a second fire for the same
/// cycle.
pub fn decide_trigger(
    predicted_at: f64,
    now: f64,
    settings: &GaterSettings,
    target_cycle: i64,
) -> Decision {
    let spec = settings.spec();
    let reference = settings
        .reference()
        .expect("decide_trigger requires an established reference");
    let delta = predicted_at - now;
    let period_s = reference.reference_period / spec.framerate;

    if delta < spec.prediction_latency_s {
        Decision::Missed {
            predicted_at: predicted_at,
        }
    } else if delta <= 2.0 * period_s {
        Decision::Fire {
            at: predicted_at,
            target_cycle,
        }
    } else {
        Decision::Wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{GaterSettings, GaterSettingsSpec};
    use approx::assert_relative_eq;

    fn settings_with_reference() -> GaterSettings {
        let base = GaterSettings::new(GaterSettingsSpec {
            framerate: 80.0,
            prediction_latency_s: 0.0,
            min_frames_for_fit: 3,
            ..GaterSettingsSpec::default()
        })
        .unwrap();
        base.with_reference(20.0, 0.0)
    }

    #[test]
    fn predicts_linear_phase_crossing() {
        let settings = settings_with_reference();
        let mut history = FrameHistory::new(50);
        // phase advances at a constant rate of pi/10 per frame (1/80s apart)
        for i in 0..10 {
            let t = i as f64 / 80.0;
            let phase = (i as f64) * std::f64::consts::PI / 10.0;
            history
                .push(FrameRecord {
                    timestamp_s: t,
                    unwrapped_phase: phase,
                    sad_min_index: 0.0,
                })
                .unwrap();
        }
        let t_hat = predict_trigger_time(&history, &settings).expect("prediction");
        assert!(t_hat > history.last().unwrap().timestamp_s);
    }

    #[test]
    fn flat_phase_yields_no_prediction() {
        let settings = settings_with_reference();
        let mut history = FrameHistory::new(50);
        for i in 0..10 {
            history
                .push(FrameRecord {
                    timestamp_s: i as f64 / 80.0,
                    unwrapped_phase: 1.0,
                    sad_min_index: 0.0,
                })
                .unwrap();
        }
        assert!(predict_trigger_time(&history, &settings).is_none());
    }

    #[test]
    fn zero_latency_fires_any_positive_prediction_within_window() {
        let settings = settings_with_reference();
        let decision = decide_trigger(1.0, 0.99, &settings, 0);
        assert!(matches!(decision, Decision::Fire { .. }));
        let _ = assert_relative_eq;
    }

    #[test]
    fn too_close_prediction_is_missed() {
        let settings = GaterSettings::new(GaterSettingsSpec {
            prediction_latency_s: 0.05,
            framerate: 80.0,
            ..GaterSettingsSpec::default()
        })
        .unwrap()
        .with_reference(20.0, 0.0);
        let decision = decide_trigger(1.01, 1.0, &settings, 0);
        assert!(matches!(decision, Decision::Missed { .. }));
    }
}
