//! Observability collaborator, extracted out of the state machine itself
//! (the original kept plotting methods directly on the gater class).
//! A real deployment wires this to `tracing` events; tests can swap in
//! a recording implementation.

use crate::frame::Frame;

pub trait GaterObserver: Send {
    fn on_frame(&mut self, _timestamp_s: f64, _phase: Option<f64>) {}
    fn on_trigger(&mut self, _at: f64, _trigger_num: u32) {}
    fn on_reference_change(&mut self, _reference_cycle: &[Frame], _period: f64) {}
}

/// Default observer: forwards every event to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl GaterObserver for TracingObserver {
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
    }
}

#[cfg(test)]
pub(crate) struct RecordingObserver {
    pub frames: usize,
    pub triggers: usize,
    pub reference_changes: usize,
}

#[cfg(test)]
impl Default for RecordingObserver {
    fn default() -> Self {
        Self {
            frames: 0,
            triggers: 0,
            reference_changes: 0,
        }
    }
}

#[cfg(test)]
impl GaterObserver for RecordingObserver {
    fn on_frame(&mut self, _timestamp_s: f64, _phase: Option<f64>) {
        self.frames += 1;
    }
    fn on_trigger(&mut self, _at: f64, _trigger_num: u32) {
        self.triggers += 1;
    }
    fn on_reference_change(&mut self, _reference_cycle: &[Frame], _period: f64) {
        self.reference_changes += 1;
    }
}
