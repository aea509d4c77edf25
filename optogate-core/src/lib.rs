//! Real-time cardiac-synchronised optical gating core: frame-by-frame
//! period detection, phase matching, trigger prediction, and the state
//! machine tying them together.

pub mod align;
pub mod error;
pub mod frame;
pub mod gater;
pub mod observer;
pub mod period;
pub mod phase;
pub mod predict;
pub mod sad;
pub mod settings;
pub mod vfit;

pub use error::{Error, Result};
pub use frame::{Frame, FrameHistory, FrameRecord, PixelData};
pub use gater::{FrameOutcome, Gater, GaterStateTag};
pub use settings::{GaterSettings, GaterSettingsSpec, ReferenceGeometry};
