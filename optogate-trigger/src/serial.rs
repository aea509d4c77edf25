//! Serial-port trigger sink: frames an outbound "fire" command over a
//! JSON-lines protocol on a `tokio-serial` port, the same way the
//! hardware link in this stack's LED-box controller is driven.

use std::time::{Duration, Instant};

use futures::sink::SinkExt;
use json_lines::codec::JsonLinesCodec;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_serial::SerialPortBuilderExt;
use tokio_util::codec::Decoder;

use crate::sink::{TriggerSink, TriggerSinkError};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ToDevice {
    /// Fire after waiting `wait_ms` milliseconds from receipt.
    Fire { wait_ms: u32 },
}

/// Drives a serial-attached trigger device. `schedule_trigger` is
/// synchronous from the gater's perspective: it converts the requested
/// absolute time into a relative wait and hands it to a background task
/// that owns the actual port.
pub struct SerialTriggerSink {
    sender: mpsc::UnboundedSender<ToDevice>,
    /// Frame-timestamp-clock origin, established on first use, paired
    /// with the `Instant` it corresponded to, so later absolute times
    /// can be converted to a wall-clock wait.
    clock_origin: Option<(f64, Instant)>,
}

impl SerialTriggerSink {
    pub fn spawn(serial_device: &str, baud_rate: u32) -> Result<Self, TriggerSinkError> {
        let mut port = tokio_serial::new(serial_device, baud_rate)
            .open_native_async()
            .map_err(|e| TriggerSinkError::Other(e.to_string()))?;
        #[cfg(unix)]
        {
            use tokio_serial::SerialPort;
            let _ = port.set_exclusive(false);
        }
        let mut writer = JsonLinesCodec::<ToDevice, ToDevice>::default().framed(port);
        let (sender, mut receiver) = mpsc::unbounded_channel::<ToDevice>();

        tokio::spawn(async move {
            while let Some(cmd) = receiver.recv().await {
                if let Err(e) = writer.send(cmd).await {
                    tracing::error!(error = %e, "serial trigger sink write failed");
                }
            }
        });

        Ok(Self {
            sender,
            clock_origin: None,
        })
    }

    fn wait_ms_for(&mut self, absolute_time_s: f64) -> u32 {
        let now = Instant::now();
        let (origin_ts, origin_instant) = *self.clock_origin.get_or_insert((absolute_time_s, now));
        let target_instant =
            origin_instant + Duration::from_secs_f64((absolute_time_s - origin_ts).max(0.0));
        target_instant
            .saturating_duration_since(now)
            .as_millis()
            .min(u32::MAX as u128) as u32
    }
}

impl TriggerSink for SerialTriggerSink {
    fn schedule_trigger(&mut self, absolute_time_s: f64) -> Result<(), TriggerSinkError> {
        let wait_ms = self.wait_ms_for(absolute_time_s);
        self.sender
            .send(ToDevice::Fire { wait_ms })
            .map_err(|e| TriggerSinkError::Other(e.to_string()))
    }
}
