//! DSP settings owned by the engine
//!
//! These are the values the user last chose. They outlive any one graph: every
//! rebuild reads them to initialise its nodes, so switching tracks keeps the
//! listener's EQ, tone, width, ambience and vocal cut.

use crate::nodes::{DAMP_MAX_HZ, EQ_BAND_COUNT};
use serde::{Deserialize, Serialize};

/// Stereo width to delay mapping (seconds of right-channel delay at full width)
pub const WIDTH_DELAY_SECS: f32 = 0.03;

/// Per-band equalizer gains in dB
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EqualizerState {
    pub gains: [f32; EQ_BAND_COUNT],
}

impl EqualizerState {
    pub fn gain(&self, index: usize) -> Option<f32> {
        self.gains.get(index).copied()
    }

    pub fn is_flat(&self) -> bool {
        self.gains.iter().all(|&g| g == 0.0)
    }
}

/// Bass and treble shelf gains in dB
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ToneState {
    pub bass_db: f32,
    pub treble_db: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StereoWidthState {
    /// 0.0 = untouched, 1.0 = widest
    pub width: f32,
}

impl StereoWidthState {
    /// Right-channel delay for this width
    pub fn delay_secs(&self) -> f32 {
        self.width * WIDTH_DELAY_SECS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbienceState {
    /// Wet proportion; dry gets `1 - mix`
    pub mix: f32,
    /// Seconds before the reverb tail starts
    pub pre_delay: f32,
    /// Damping lowpass cutoff in Hz
    pub damp: f32,
}

impl Default for AmbienceState {
    fn default() -> Self {
        Self {
            mix: 0.0,
            pre_delay: 0.0,
            damp: DAMP_MAX_HZ,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VocalCutState {
    pub enabled: bool,
}

/// Everything the user can adjust, grouped by stage
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DspSettings {
    #[serde(default)]
    pub equalizer: EqualizerState,
    #[serde(default)]
    pub tone: ToneState,
    #[serde(default)]
    pub stereo_width: StereoWidthState,
    #[serde(default)]
    pub ambience: AmbienceState,
    #[serde(default)]
    pub vocal_cut: VocalCutState,
}
