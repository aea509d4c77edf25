//! Trigger-emission adapters: concrete [`sink::TriggerSink`] implementations
//! that sit outside the synchronisation core and actually fire the
//! fluorescence acquisition hardware (or, for offline/demo use, merely log
//! the scheduled time).

pub mod log_sink;
pub mod serial;
pub mod sink;

pub use log_sink::LoggingTriggerSink;
pub use serial::{SerialTriggerSink, DEFAULT_BAUD_RATE};
pub use sink::{NoopStageSink, StageSink, TriggerSink, TriggerSinkError};
