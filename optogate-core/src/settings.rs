//! Typed, immutable replacement for the free-form settings dictionary the
//! original gater threaded through every function call. A [`GaterSettings`]
//! is validated once at construction; a reference-cycle update produces a
//! fresh value via [`GaterSettings::with_reference`] rather than mutating
//! one in place.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

fn default_num_extra_ref_frames() -> usize {
    2
}
fn default_min_period() -> usize {
    5
}
fn default_lower_threshold_factor() -> f64 {
    0.5
}
fn default_upper_threshold_factor() -> f64 {
    0.75
}
fn default_prediction_latency() -> f64 {
    0.0
}
fn default_frame_buffer_length() -> usize {
    100
}
fn default_update_after_n_triggers() -> u32 {
    0
}
fn default_min_frames_for_fit() -> usize {
    5
}
fn default_max_frames_for_fit() -> usize {
    80
}
fn default_extrapolation_factor() -> f64 {
    1.5
}
fn default_framerate() -> f64 {
    80.0
}
fn default_alignment_axis_len() -> u8 {
    80
}
fn default_max_drift() -> i32 {
    0
}

/// User/config-supplied knobs. Everything derivable from these (target
/// phase in radians, reference-cycle length) is computed, not stored
/// redundantly by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GaterSettingsSpec {
    #[serde(default = "default_num_extra_ref_frames")]
    pub num_extra_ref_frames: usize,
    #[serde(default = "default_min_period")]
    pub min_period: usize,
    #[serde(default = "default_lower_threshold_factor")]
    pub lower_threshold_factor: f64,
    #[serde(default = "default_upper_threshold_factor")]
    pub upper_threshold_factor: f64,
    #[serde(default = "default_prediction_latency")]
    pub prediction_latency_s: f64,
    #[serde(default = "default_frame_buffer_length")]
    pub frame_buffer_length: usize,
    #[serde(default = "default_update_after_n_triggers")]
    pub update_after_n_triggers: u32,
    #[serde(default = "default_min_frames_for_fit")]
    pub min_frames_for_fit: usize,
    #[serde(default = "default_max_frames_for_fit")]
    pub max_frames_for_fit: usize,
    #[serde(default = "default_extrapolation_factor")]
    pub extrapolation_factor: f64,
    #[serde(default = "default_framerate")]
    pub framerate: f64,
    #[serde(default = "default_alignment_axis_len")]
    pub alignment_axis_len: u8,
    /// Maximum horizontal drift-shift candidate searched by the SAD kernel.
    #[serde(default = "default_max_drift")]
    pub max_drift: i32,
}

impl Default for GaterSettingsSpec {
    fn default() -> Self {
        Self {
            num_extra_ref_frames: default_num_extra_ref_frames(),
            min_period: default_min_period(),
            lower_threshold_factor: default_lower_threshold_factor(),
            upper_threshold_factor: default_upper_threshold_factor(),
            prediction_latency_s: default_prediction_latency(),
            frame_buffer_length: default_frame_buffer_length(),
            update_after_n_triggers: default_update_after_n_triggers(),
            min_frames_for_fit: default_min_frames_for_fit(),
            max_frames_for_fit: default_max_frames_for_fit(),
            extrapolation_factor: default_extrapolation_factor(),
            framerate: default_framerate(),
            alignment_axis_len: default_alignment_axis_len(),
            max_drift: default_max_drift(),
        }
    }
}

/// Reference-cycle-dependent quantities, recomputed whenever a new
/// reference is accepted. Never mutated in place: [`GaterSettings::with_reference`]
/// produces a new value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReferenceGeometry {
    pub reference_period: f64,
    pub reference_frame: f64,
    pub barrier_frame: usize,
    pub n_ref: usize,
}

impl ReferenceGeometry {
    pub fn target_sync_phase(&self) -> f64 {
        2.0 * std::f64::consts::PI * self.reference_frame / self.reference_period
    }
}

/// Fully validated, immutable settings in force for the current reference
/// cycle.
#[derive(Debug, Clone)]
pub struct GaterSettings {
    spec: GaterSettingsSpec,
    reference: Option<ReferenceGeometry>,
}

impl GaterSettings {
    pub fn new(spec: GaterSettingsSpec) -> Result<Self> {
        Self::validate(&spec)?;
        Ok(Self {
            spec,
            reference: None,
        })
    }

    fn validate(spec: &GaterSettingsSpec) -> Result<()> {
        if spec.min_period < 2 {
            return Err(Error::InvalidConfig("min_period must be >= 2".into()));
        }
        if !(spec.lower_threshold_factor < spec.upper_threshold_factor) {
            return Err(Error::InvalidConfig(
                "lower_threshold_factor must be < upper_threshold_factor".into(),
            ));
        }
        if spec.framerate <= 0.0 {
            return Err(Error::InvalidConfig("framerate must be positive".into()));
        }
        if spec.min_frames_for_fit < 2 {
            return Err(Error::InvalidConfig(
                "min_frames_for_fit must be >= 2".into(),
            ));
        }
        if spec.max_frames_for_fit < spec.min_frames_for_fit {
            return Err(Error::InvalidConfig(
                "max_frames_for_fit must be >= min_frames_for_fit".into(),
            ));
        }
        if spec.alignment_axis_len == 0 {
            return Err(Error::InvalidConfig(
                "alignment_axis_len must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Produce a new, fully-revised settings value for a freshly accepted
    /// reference cycle. Called on every acceptance (including a
    /// pre-supplied reference), so `barrier_frame` is always derived
    /// rather than left at a stale default.
    pub fn with_reference(&self, reference_period: f64, reference_frame: f64) -> Self {
        let n_ref = reference_period.ceil() as usize + 1 + 2 * self.spec.num_extra_ref_frames;
        let barrier_frame = ((reference_frame.round() as usize) + n_ref / 2) % n_ref;
        Self {
            spec: self.spec.clone(),
            reference: Some(ReferenceGeometry {
                reference_period,
                reference_frame,
                barrier_frame,
                n_ref,
            }),
        }
    }

    pub fn spec(&self) -> &GaterSettingsSpec {
        &self.spec
    }

    pub fn reference(&self) -> Option<&ReferenceGeometry> {
        self.reference.as_ref()
    }
}
