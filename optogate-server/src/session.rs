//! Glue shared by the WebSocket server and the offline emulation mode: one
//! [`GatingSession`] owns a `Gater`, a `TriggerSink`, and persists each
//! accepted reference cycle. Neither caller needs to know how the core
//! picks a target frame; the session auto-confirms the auto-pick rule
//! (§4.5) on every `needs_user_selection`, since neither adapter offers an
//! interactive UI.

use std::path::PathBuf;

use optogate_core::observer::GaterObserver;
use optogate_core::{Frame, FrameOutcome, Gater, GaterSettings};
use optogate_trigger::TriggerSink;

use crate::persistence;

/// Observer that persists every accepted reference cycle and forwards
/// everything else to `tracing`, replacing the plot-methods-on-the-gater
/// pattern the Design Notes flag for removal (§9).
pub struct PersistingObserver {
    period_dir: PathBuf,
}

impl PersistingObserver {
    pub fn new(period_dir: PathBuf) -> Self {
        Self { period_dir }
    }
}

impl GaterObserver for PersistingObserver {
    fn on_frame(&mut self, timestamp_s: f64, phase: Option<f64>) {
        tracing::trace!(timestamp_s, ?phase, "frame processed");
    }

    fn on_trigger(&mut self, at: f64, trigger_num: u32) {
        tracing::info!(at, trigger_num, "trigger fired");
    }

    fn on_reference_change(&mut self, reference_cycle: &[Frame], period: f64) {
        tracing::info!(
            n_ref = reference_cycle.len(),
            period,
            "reference cycle accepted"
        );
        match persistence::save_reference_cycle(&self.period_dir, reference_cycle) {
            Ok(dir) => tracing::info!(dir = %dir.display(), "reference cycle persisted"),
            Err(e) => tracing::error!(error = %e, "failed to persist reference cycle"),
        }
    }
}

/// One session: one `Gater`, one `TriggerSink`. Owns the decision to fire
/// hardware on a trigger and to auto-confirm target selection.
pub struct GatingSession {
    gater: Gater,
    sink: Box<dyn TriggerSink>,
}

impl GatingSession {
    pub fn new(settings: GaterSettings, period_dir: PathBuf, sink: Box<dyn TriggerSink>) -> Self {
        let observer = PersistingObserver::new(period_dir);
        let axis_len = settings.spec().alignment_axis_len;
        let max_drift = settings.spec().max_drift;
        let gater = Gater::with_collaborators(
            settings,
            Box::new(optogate_core::align::CrossCorrelationOracle::new(
                axis_len, max_drift,
            )),
            Box::new(observer),
        );
        Self { gater, sink }
    }

    /// Fold one frame into the gater, firing the trigger sink and
    /// auto-confirming target selection as needed. Returns the outcome
    /// the caller should report upstream (e.g. as a `sync` wire message).
    pub fn process_frame(&mut self, frame: Frame) -> optogate_core::Result<FrameOutcome> {
        let outcome = self.gater.process_frame(frame)?;

        if outcome.needs_user_selection {
            if let Some(reference) = self.gater.settings().reference() {
                let default_choice = reference.reference_frame;
                self.gater.select_target_frame(Some(default_choice));
            }
        }

        if outcome.send_trigger {
            if let Some(at) = outcome.trigger_time {
                if let Err(e) = self.sink.schedule_trigger(at) {
                    tracing::error!(error = %e, "trigger sink failed to schedule trigger");
                }
            }
        }

        Ok(outcome)
    }
}
