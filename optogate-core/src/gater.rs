//! C5: the gater state machine. Owns the reference cycle, frame
//! history, and period history, and drives `RESET -> DETERMINE -> SYNC
//! <-> ADAPT`. Depends on every other component in this crate; nothing
//! in this crate depends on it.

use std::collections::VecDeque;
use std::f64::consts::PI;

use crate::align::{AlignmentOracle, CrossCorrelationOracle};
use crate::error::{Error, Result};
use crate::frame::{Frame, FrameHistory, FrameRecord};
use crate::observer::{GaterObserver, TracingObserver};
use crate::period::{calculate_period_length, PeriodHistory};
use crate::phase::match_phase;
use crate::predict::{decide_trigger, predict_trigger_time, Decision};
use crate::sad::sad;
use crate::settings::GaterSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaterStateTag {
    Reset,
    Determine,
    Sync,
    Adapt,
}

/// Result of folding one frame into the gater.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOutcome {
    pub state: GaterStateTag,
    /// Always present; `0.0` while not yet in `SYNC`, matching the wire
    /// protocol's `sync.phase` field.
    pub phase: f64,
    pub send_trigger: bool,
    pub trigger_time: Option<f64>,
    pub needs_user_selection: bool,
}

enum Mode {
    Reset,
    Determine {
        ref_buffer: Vec<Frame>,
    },
    Adapt {
        ref_buffer: Vec<Frame>,
    },
    Sync {
        reference_cycle: Vec<Frame>,
        frame_history: FrameHistory,
        last_phase: Option<f64>,
        last_fired_target_cycle: Option<i64>,
        frame_num: usize,
    },
}

pub struct Gater {
    settings: GaterSettings,
    mode: Mode,
    trigger_num: u32,
    period_history: PeriodHistory,
    needs_user_selection: bool,
    last_timestamp: Option<f64>,
    alignment_oracle: Box<dyn AlignmentOracle + Send>,
    observer: Box<dyn GaterObserver>,
    processing_durations_ms: VecDeque<f64>,
}

impl Gater {
    pub fn new(settings: GaterSettings) -> Self {
        let axis_len = settings.spec().alignment_axis_len;
        let max_drift = settings.spec().max_drift;
        Self::with_collaborators(
            settings,
            Box::new(CrossCorrelationOracle::new(axis_len, max_drift)),
            Box::new(TracingObserver),
        )
    }

    pub fn with_collaborators(
        settings: GaterSettings,
        alignment_oracle: Box<dyn AlignmentOracle + Send>,
        observer: Box<dyn GaterObserver>,
    ) -> Self {
        Self {
            settings,
            mode: Mode::Reset,
            trigger_num: 0,
            period_history: PeriodHistory::new(),
            needs_user_selection: false,
            last_timestamp: None,
            alignment_oracle,
            observer,
            processing_durations_ms: VecDeque::with_capacity(64),
        }
    }

    /// Start directly in `SYNC` with a pre-supplied reference cycle
    /// (e.g. loaded from a previous session's persisted reference).
    /// Barrier and target geometry are (re-)derived here exactly as on
    /// any other acceptance, so a pre-supplied reference never leaves
    /// `barrier_frame` at a stale default.
    pub fn with_reference_cycle(
        settings: GaterSettings,
        reference_cycle: Vec<Frame>,
        period: f64,
        reference_frame: f64,
    ) -> Self {
        let settings = settings.with_reference(period, reference_frame);
        let frame_buffer_length = settings.spec().frame_buffer_length;
        let mut gater = Self::new(settings);
        gater.mode = Mode::Sync {
            reference_cycle,
            frame_history: FrameHistory::new(frame_buffer_length),
            last_phase: None,
            last_fired_target_cycle: None,
            frame_num: 0,
        };
        gater.needs_user_selection = true;
        gater
    }

    pub fn state(&self) -> GaterStateTag {
        match &self.mode {
            Mode::Reset => GaterStateTag::Reset,
            Mode::Determine { .. } => GaterStateTag::Determine,
            Mode::Adapt { .. } => GaterStateTag::Adapt,
            Mode::Sync { .. } => GaterStateTag::Sync,
        }
    }

    pub fn trigger_num(&self) -> u32 {
        self.trigger_num
    }

    pub fn needs_user_selection(&self) -> bool {
        self.needs_user_selection
    }

    pub fn settings(&self) -> &GaterSettings {
        &self.settings
    }

    /// Record how long the caller's most recent `process_frame` call
    /// took, in milliseconds, for the rolling processing-rate monitor.
    pub fn record_processing_duration_ms(&mut self, ms: f64) {
        if self.processing_durations_ms.len() == 50 {
            self.processing_durations_ms.pop_front();
        }
        self.processing_durations_ms.push_back(ms);
    }

    /// Mean frames-per-second implied by recent processing durations, or
    /// `None` until at least one has been recorded.
    pub fn mean_processing_rate_fps(&self) -> Option<f64> {
        if self.processing_durations_ms.is_empty() {
            return None;
        }
        let mean_ms: f64 =
            self.processing_durations_ms.iter().sum::<f64>() / self.processing_durations_ms.len() as f64;
        if mean_ms <= 0.0 {
            None
        } else {
            Some(1000.0 / mean_ms)
        }
    }

    /// The UI's response to a `needs_user_selection` request: `Some(f)`
    /// picks reference-frame index `f`; `None` (the "negative index"
    /// sentinel in the source this is grounded on) aborts back to
    /// `RESET`.
    pub fn select_target_frame(&mut self, choice: Option<f64>) {
        self.needs_user_selection = false;
        match choice {
            None => {
                self.mode = Mode::Reset;
            }
            Some(reference_frame) => {
                if let Some(reference) = self.settings.reference() {
                    let period = reference.reference_period;
                    self.settings = self.settings.with_reference(period, reference_frame);
                }
            }
        }
    }

    /// Fold one new frame into the gater and advance its state machine.
    pub fn process_frame(&mut self, frame: Frame) -> Result<FrameOutcome> {
        if let Some(last) = self.last_timestamp {
            if frame.timestamp_s <= last {
                return Err(Error::OutOfOrderTimestamp {
                    last,
                    new: frame.timestamp_s,
                });
            }
        }
        self.last_timestamp = Some(frame.timestamp_s);

        if matches!(self.mode, Mode::Reset) {
            self.enter_reset();
        }

        match std::mem::replace(&mut self.mode, Mode::Reset) {
            Mode::Reset => unreachable!("enter_reset always leaves Determine or Adapt"),
            Mode::Determine { ref_buffer } => self.process_determine(frame, ref_buffer, false),
            Mode::Adapt { ref_buffer } => self.process_determine(frame, ref_buffer, true),
            Mode::Sync {
                reference_cycle,
                frame_history,
                last_phase,
                last_fired_target_cycle,
                frame_num,
            } => self.process_sync(
                frame,
                reference_cycle,
                frame_history,
                last_phase,
                last_fired_target_cycle,
                frame_num,
            ),
        }
    }

    fn enter_reset(&mut self) {
        self.period_history.clear();
        let spec = self.settings.spec();
        if spec.update_after_n_triggers > 0 && self.trigger_num >= spec.update_after_n_triggers {
            self.trigger_num = 0;
            self.mode = Mode::Adapt {
                ref_buffer: Vec::new(),
            };
        } else {
            self.mode = Mode::Determine {
                ref_buffer: Vec::new(),
            };
        }
    }

    fn process_determine(
        &mut self,
        frame: Frame,
        mut ref_buffer: Vec<Frame>,
        is_adapt: bool,
    ) -> Result<FrameOutcome> {
        if let Some(first) = ref_buffer.first() {
            if first.shape() != frame.shape() {
                return Err(Error::ShapeMismatch {
                    expected_h: first.height,
                    expected_w: first.width,
                    got_h: frame.height,
                    got_w: frame.width,
                });
            }
        }
        self.observer.on_frame(frame.timestamp_s, None);
        ref_buffer.push(frame);

        let min_period = self.settings.spec().min_period;
        let lower = self.settings.spec().lower_threshold_factor;
        let upper = self.settings.spec().upper_threshold_factor;
        let num_extra = self.settings.spec().num_extra_ref_frames;

        let n = ref_buffer.len();
        if n >= 2 {
            let latest = &ref_buffer[n - 1];
            let diffs: Vec<f64> = (0..n)
                .map(|j| sad(latest, &ref_buffer[n - 1 - j]) as f64)
                .collect();
            if let Some(period) = calculate_period_length(&diffs, min_period, lower, upper) {
                self.period_history.push(period);
            }
        }

        let state_tag = if is_adapt {
            GaterStateTag::Adapt
        } else {
            GaterStateTag::Determine
        };

        let Some(period) = self.period_history.stable_period(num_extra) else {
            self.mode = if is_adapt {
                Mode::Adapt { ref_buffer }
            } else {
                Mode::Determine { ref_buffer }
            };
            return Ok(FrameOutcome {
                state: state_tag,
                phase: 0.0,
                send_trigger: false,
                trigger_time: None,
                needs_user_selection: false,
            });
        };

        let n_ref = period.ceil() as usize + 1 + 2 * num_extra;
        if ref_buffer.len() < n_ref {
            self.mode = if is_adapt {
                Mode::Adapt { ref_buffer }
            } else {
                Mode::Determine { ref_buffer }
            };
            return Ok(FrameOutcome {
                state: state_tag,
                phase: 0.0,
                send_trigger: false,
                trigger_time: None,
                needs_user_selection: false,
            });
        }

        let reference_cycle: Vec<Frame> = ref_buffer[ref_buffer.len() - n_ref..].to_vec();

        let reference_frame = if is_adapt {
            let target = self.alignment_oracle.update(&reference_cycle, period, 0);
            let axis_len = self.alignment_oracle.axis_len() as f64;
            (period * target as f64 / axis_len).rem_euclid(period)
        } else {
            num_extra as f64
        };

        self.settings = self.settings.with_reference(period, reference_frame);
        self.observer.on_reference_change(&reference_cycle, period);
        self.needs_user_selection = true;
        self.period_history.clear();

        let frame_buffer_length = self.settings.spec().frame_buffer_length;
        self.mode = Mode::Sync {
            reference_cycle,
            frame_history: FrameHistory::new(frame_buffer_length),
            last_phase: None,
            last_fired_target_cycle: None,
            frame_num: 0,
        };

        Ok(FrameOutcome {
            state: GaterStateTag::Sync,
            phase: 0.0,
            send_trigger: false,
            trigger_time: None,
            needs_user_selection: true,
        })
    }

    fn process_sync(
        &mut self,
        frame: Frame,
        reference_cycle: Vec<Frame>,
        mut frame_history: FrameHistory,
        mut last_phase: Option<f64>,
        mut last_fired_target_cycle: Option<i64>,
        mut frame_num: usize,
    ) -> Result<FrameOutcome> {
        if let Some(first) = reference_cycle.first() {
            if first.shape() != frame.shape() {
                return Err(Error::ShapeMismatch {
                    expected_h: first.height,
                    expected_w: first.width,
                    got_h: frame.height,
                    got_w: frame.width,
                });
            }
        }

        let num_extra = self.settings.spec().num_extra_ref_frames;
        let max_drift = self.settings.spec().max_drift;

        let Some(m) = match_phase(&frame, &reference_cycle, num_extra, max_drift) else {
            let timestamp_s = frame.timestamp_s;
            self.mode = Mode::Sync {
                reference_cycle,
                frame_history,
                last_phase,
                last_fired_target_cycle,
                frame_num,
            };
            self.observer.on_frame(timestamp_s, None);
            return Ok(FrameOutcome {
                state: GaterStateTag::Sync,
                phase: 0.0,
                send_trigger: false,
                trigger_time: None,
                needs_user_selection: self.needs_user_selection,
            });
        };

        let reference = *self
            .settings
            .reference()
            .expect("SYNC state always has an established reference");
        let period = reference.reference_period;

        let current_phase =
            (2.0 * PI * (m.phase_in_frames - num_extra as f64) / period).rem_euclid(2.0 * PI);

        let unwrapped = match last_phase {
            None => current_phase,
            Some(prev) => {
                let mut delta = current_phase - prev.rem_euclid(2.0 * PI);
                while delta < -PI {
                    delta += 2.0 * PI;
                }
                prev + delta
            }
        };
        last_phase = Some(unwrapped);
        frame_num += 1;

        frame_history.push(FrameRecord {
            timestamp_s: frame.timestamp_s,
            unwrapped_phase: unwrapped,
            sad_min_index: m.phase_in_frames,
        })?;
        self.observer.on_frame(frame.timestamp_s, Some(unwrapped));

        let mut send_trigger = false;
        let mut trigger_time = None;

        if (frame_num as f64) > period {
            if let Some(t_hat) = predict_trigger_time(&frame_history, &self.settings) {
                let target_sync_phase = reference.target_sync_phase();
                let target_cycle = ((unwrapped - target_sync_phase) / (2.0 * PI)).floor() as i64;
                if last_fired_target_cycle != Some(target_cycle) {
                    match decide_trigger(t_hat, frame.timestamp_s, &self.settings, target_cycle) {
                        Decision::Fire { at, target_cycle } => {
                            send_trigger = true;
                            trigger_time = Some(at);
                            self.trigger_num += 1;
                            last_fired_target_cycle = Some(target_cycle);
                            self.observer.on_trigger(at, self.trigger_num);
                        }
                        Decision::Missed { .. } | Decision::Wait => {}
                    }
                }
            }
        }

        let update_after_n_triggers = self.settings.spec().update_after_n_triggers;
        if update_after_n_triggers > 0 && self.trigger_num >= update_after_n_triggers {
            self.mode = Mode::Reset;
            return Ok(FrameOutcome {
                state: GaterStateTag::Reset,
                phase: current_phase,
                send_trigger,
                trigger_time,
                needs_user_selection: false,
            });
        }

        self.mode = Mode::Sync {
            reference_cycle,
            frame_history,
            last_phase,
            last_fired_target_cycle,
            frame_num,
        };

        Ok(FrameOutcome {
            state: GaterStateTag::Sync,
            phase: current_phase,
            send_trigger,
            trigger_time,
            needs_user_selection: self.needs_user_selection,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelData;
    use crate::observer::RecordingObserver;
    use crate::settings::GaterSettingsSpec;

    fn synthetic_frame(t: f64, intensity_hz: f64) -> Frame {
        let phase = 2.0 * PI * t * intensity_hz;
        let value = (128.0 + 100.0 * phase.sin()).round().clamp(0.0, 255.0) as u8;
        Frame::new(1, 1, PixelData::Mono8(vec![value]), t)
    }

    fn default_gater() -> Gater {
        let settings = GaterSettings::new(GaterSettingsSpec {
            min_period: 5,
            prediction_latency_s: 0.0,
            min_frames_for_fit: 3,
            framerate: 80.0,
            ..GaterSettingsSpec::default()
        })
        .unwrap();
        Gater::with_collaborators(
            settings,
            Box::new(CrossCorrelationOracle::new(80, 0)),
            Box::new(RecordingObserver::default()),
        )
    }

    #[test]
    fn starts_in_reset_and_moves_to_determine() {
        let mut gater = default_gater();
        let outcome = gater
            .process_frame(synthetic_frame(0.0, 1.6))
            .expect("first frame processed");
        assert_eq!(outcome.state, GaterStateTag::Determine);
    }

    #[test]
    fn out_of_order_timestamp_is_fatal() {
        let mut gater = default_gater();
        gater.process_frame(synthetic_frame(1.0, 1.6)).unwrap();
        let err = gater.process_frame(synthetic_frame(0.5, 1.6)).unwrap_err();
        assert!(matches!(err, Error::OutOfOrderTimestamp { .. }));
    }

    #[test]
    fn sinusoid_eventually_reaches_sync_and_fires() {
        let mut gater = default_gater();
        let framerate = 80.0_f64;
        let mut reached_sync = false;
        let mut fired = false;
        for i in 0..1000 {
            let t = i as f64 / framerate;
            let outcome = gater.process_frame(synthetic_frame(t, 1.6)).unwrap();
            if outcome.state == GaterStateTag::Sync {
                reached_sync = true;
            }
            if outcome.send_trigger {
                fired = true;
            }
        }
        assert!(reached_sync, "gater should reach SYNC on a clean sinusoid");
        assert!(fired, "gater should fire at least one trigger over 1000 frames");
    }
}
