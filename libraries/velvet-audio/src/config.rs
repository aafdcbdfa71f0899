//! Engine configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use crate::error::{AudioError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub smoothing: SmoothingSettings,

    #[serde(default)]
    pub impulse: ImpulseSettings,

    #[serde(default)]
    pub convolution: ConvolutionSettings,

    #[serde(default)]
    pub analyser: AnalyserSettings,

    #[serde(default)]
    pub resume: ResumeSettings,

    #[serde(default)]
    pub offline: OfflineSettings,
}

/// Parameter ramp settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SmoothingSettings {
    /// Time constant of the exponential approach to a new target (seconds)
    #[serde(default = "default_time_constant")]
    pub time_constant_secs: f32,
}

/// Synthetic reverb impulse settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ImpulseSettings {
    #[serde(default = "default_impulse_duration")]
    pub duration_secs: f32,

    /// Exponent of the `(1 - i/len)` decay envelope
    #[serde(default = "default_impulse_decay")]
    pub decay: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConvolutionSettings {
    /// Partition size in frames; also the length of the direct-convolution head
    #[serde(default = "default_block_size")]
    pub block_size: usize,
}

/// Analysis tap settings (Web Audio `AnalyserNode` semantics)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnalyserSettings {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,

    #[serde(default = "default_analyser_smoothing")]
    pub smoothing_time_constant: f32,

    #[serde(default = "default_min_decibels")]
    pub min_decibels: f32,

    #[serde(default = "default_max_decibels")]
    pub max_decibels: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResumeSettings {
    /// Consecutive failed resumes tolerated before the UI should prompt
    #[serde(default = "default_silent_retry_limit")]
    pub silent_retry_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OfflineSettings {
    #[serde(default = "default_offline_sample_rate")]
    pub sample_rate: u32,
}

impl EngineConfig {
    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        let tc = self.smoothing.time_constant_secs;
        if !tc.is_finite() || tc < 0.0 {
            return Err(AudioError::InvalidConfig(format!(
                "smoothing.time_constant_secs must be >= 0, got {}",
                tc
            )));
        }

        if !(self.impulse.duration_secs.is_finite() && self.impulse.duration_secs > 0.0) {
            return Err(AudioError::InvalidConfig(format!(
                "impulse.duration_secs must be > 0, got {}",
                self.impulse.duration_secs
            )));
        }
        if !(self.impulse.decay.is_finite() && self.impulse.decay >= 0.0) {
            return Err(AudioError::InvalidConfig(format!(
                "impulse.decay must be >= 0, got {}",
                self.impulse.decay
            )));
        }

        let block = self.convolution.block_size;
        if block < 32 || !block.is_power_of_two() {
            return Err(AudioError::InvalidConfig(format!(
                "convolution.block_size must be a power of two >= 32, got {}",
                block
            )));
        }

        let fft = self.analyser.fft_size;
        if !(32..=32768).contains(&fft) || !fft.is_power_of_two() {
            return Err(AudioError::InvalidConfig(format!(
                "analyser.fft_size must be a power of two in 32..=32768, got {}",
                fft
            )));
        }
        let smoothing = self.analyser.smoothing_time_constant;
        if !(0.0..=1.0).contains(&smoothing) {
            return Err(AudioError::InvalidConfig(format!(
                "analyser.smoothing_time_constant must be in [0, 1], got {}",
                smoothing
            )));
        }
        if self.analyser.min_decibels >= self.analyser.max_decibels {
            return Err(AudioError::InvalidConfig(format!(
                "analyser.min_decibels ({}) must be below max_decibels ({})",
                self.analyser.min_decibels, self.analyser.max_decibels
            )));
        }

        if self.offline.sample_rate == 0 {
            return Err(AudioError::InvalidConfig(
                "offline.sample_rate must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for SmoothingSettings {
    fn default() -> Self {
        Self {
            time_constant_secs: default_time_constant(),
        }
    }
}

impl Default for ImpulseSettings {
    fn default() -> Self {
        Self {
            duration_secs: default_impulse_duration(),
            decay: default_impulse_decay(),
        }
    }
}

impl Default for ConvolutionSettings {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
        }
    }
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            smoothing_time_constant: default_analyser_smoothing(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
        }
    }
}

impl Default for ResumeSettings {
    fn default() -> Self {
        Self {
            silent_retry_limit: default_silent_retry_limit(),
        }
    }
}

impl Default for OfflineSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_offline_sample_rate(),
        }
    }
}

fn default_time_constant() -> f32 {
    0.01
}

fn default_impulse_duration() -> f32 {
    2.0
}

fn default_impulse_decay() -> f32 {
    2.0
}

fn default_block_size() -> usize {
    512
}

fn default_fft_size() -> usize {
    256
}

fn default_analyser_smoothing() -> f32 {
    0.8
}

fn default_min_decibels() -> f32 {
    -100.0
}

fn default_max_decibels() -> f32 {
    -30.0
}

fn default_silent_retry_limit() -> u32 {
    3
}

fn default_offline_sample_rate() -> u32 {
    44100
}
