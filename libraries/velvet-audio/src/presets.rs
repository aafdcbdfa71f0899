//! Equalizer and ambience presets
//!
//! Presets are plain records. The built-in tables ship with the engine; a
//! [`PresetLibrary`] can also be loaded from JSON so users can bring their own.

use crate::error::{AudioError, Result};
use crate::nodes::{DAMP_MAX_HZ, DAMP_MIN_HZ, EQ_BAND_COUNT, PRE_DELAY_MAX_SECS};
use crate::settings::AmbienceState;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Named set of equalizer band gains (dB, low to high)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqPreset {
    pub name: String,
    pub gains: [f32; EQ_BAND_COUNT],
}

impl EqPreset {
    pub fn new(name: impl Into<String>, gains: [f32; EQ_BAND_COUNT]) -> Self {
        Self {
            name: name.into(),
            gains,
        }
    }
}

/// Named ambience setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiencePreset {
    pub name: String,
    pub mix: f32,
    /// Seconds
    #[serde(alias = "preDelay")]
    pub pre_delay: f32,
    /// Damping cutoff (Hz)
    pub damp: f32,
}

impl AmbiencePreset {
    pub fn new(name: impl Into<String>, mix: f32, pre_delay: f32, damp: f32) -> Self {
        Self {
            name: name.into(),
            mix,
            pre_delay,
            damp,
        }
    }

    pub fn state(&self) -> AmbienceState {
        AmbienceState {
            mix: self.mix,
            pre_delay: self.pre_delay,
            damp: self.damp,
        }
    }

    fn validate(&self) -> Result<()> {
        let in_range = (0.0..=1.0).contains(&self.mix)
            && (0.0..=PRE_DELAY_MAX_SECS).contains(&self.pre_delay)
            && (DAMP_MIN_HZ..=DAMP_MAX_HZ).contains(&self.damp);
        if in_range {
            Ok(())
        } else {
            Err(AudioError::InvalidConfig(format!(
                "ambience preset '{}' out of range (mix {}, pre-delay {} s, damp {} Hz)",
                self.name, self.mix, self.pre_delay, self.damp
            )))
        }
    }
}

/// Built-in equalizer presets
pub fn builtin_eq_presets() -> Vec<EqPreset> {
    vec![
        EqPreset::new("Flat", [0.0; EQ_BAND_COUNT]),
        EqPreset::new("Perfect", [6.0, 5.0, 4.0, 2.0, 1.0, 1.0, 3.0, 4.0, 5.0, 6.0]),
        EqPreset::new("Rock", [5.0, 4.0, 2.0, -2.0, -3.0, 0.0, 3.0, 4.0, 5.0, 6.0]),
        EqPreset::new("Pop", [-1.0, 0.0, 1.0, 3.0, 4.0, 3.0, 1.0, 0.0, -1.0, -2.0]),
        EqPreset::new("Jazz", [4.0, 2.0, 1.0, 2.0, -1.0, -1.0, 0.0, 1.0, 2.0, 3.0]),
        EqPreset::new("Classical", [5.0, 4.0, 3.0, 2.0, -1.0, -1.0, -1.0, 0.0, 2.0, 4.0]),
        EqPreset::new("Vocal Boost", [-2.0, -1.0, 0.0, 2.0, 4.0, 4.0, 2.0, 0.0, -1.0, -2.0]),
    ]
}

/// Built-in ambience presets
pub fn builtin_ambience_presets() -> Vec<AmbiencePreset> {
    vec![
        AmbiencePreset::new("Off", 0.0, 0.0, 22050.0),
        AmbiencePreset::new("Small Room", 0.25, 0.02, 10000.0),
        AmbiencePreset::new("Large Hall", 0.4, 0.08, 6500.0),
        AmbiencePreset::new("Cavern", 0.6, 0.15, 4000.0),
        AmbiencePreset::new("Studio Plate", 0.35, 0.01, 15000.0),
    ]
}

/// Collection of presets, looked up by name
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PresetLibrary {
    #[serde(default)]
    pub equalizer: Vec<EqPreset>,
    #[serde(default)]
    pub ambience: Vec<AmbiencePreset>,
}

impl PresetLibrary {
    pub fn builtin() -> Self {
        Self {
            equalizer: builtin_eq_presets(),
            ambience: builtin_ambience_presets(),
        }
    }

    /// Parse a library from JSON, rejecting out-of-range ambience values
    pub fn from_json_str(json: &str) -> Result<Self> {
        let library: Self = serde_json::from_str(json)?;
        for preset in &library.ambience {
            preset.validate()?;
        }
        Ok(library)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn eq(&self, name: &str) -> Option<&EqPreset> {
        self.equalizer.iter().find(|p| p.name == name)
    }

    pub fn ambience(&self, name: &str) -> Option<&AmbiencePreset> {
        self.ambience.iter().find(|p| p.name == name)
    }
}
