//! Default sink: logs the scheduled time instead of driving hardware.
//! Used whenever no serial device is attached, and by the offline
//! emulation/test scenarios.

use crate::sink::{TriggerSink, TriggerSinkError};

#[derive(Debug, Default)]
pub struct LoggingTriggerSink {
    pub fired: Vec<f64>,
}

impl TriggerSink for LoggingTriggerSink {
    fn schedule_trigger(&mut self, absolute_time_s: f64) -> Result<(), TriggerSinkError> {
        tracing::info!(absolute_time_s, "scheduling trigger");
        self.fired.push(absolute_time_s);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_every_scheduled_time() {
        let mut sink = LoggingTriggerSink::default();
        sink.schedule_trigger(1.0).unwrap();
        sink.schedule_trigger(2.5).unwrap();
        assert_eq!(sink.fired, vec![1.0, 2.5]);
    }
}
