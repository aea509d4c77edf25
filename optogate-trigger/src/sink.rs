//! Out-of-core collaborator that actually fires a trigger. The gater
//! only ever calls [`TriggerSink::schedule_trigger`]; everything about
//! *how* the signal reaches hardware lives behind this trait.

#[derive(thiserror::Error, Debug)]
pub enum TriggerSinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

pub trait TriggerSink: Send {
    /// Ask the sink to fire at `absolute_time_s` (same clock as frame
    /// timestamps). Best-effort: the sink is not expected to guarantee
    /// sub-microsecond precision.
    fn schedule_trigger(&mut self, absolute_time_s: f64) -> Result<(), TriggerSinkError>;
}

/// Stage-motion control is out of scope for this crate; this trait is
/// declared so adapters have somewhere to plug in, but ships with no
/// built-in implementation beyond [`NoopStageSink`].
pub trait StageSink: Send {
    fn move_to(&mut self, position: f64) -> Result<(), TriggerSinkError>;
}

#[derive(Debug, Default)]
pub struct NoopStageSink;

impl StageSink for NoopStageSink {
    fn move_to(&mut self, _position: f64) -> Result<(), TriggerSinkError> {
        Ok(())
    }
}
