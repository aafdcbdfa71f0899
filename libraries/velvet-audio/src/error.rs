/// Audio engine errors
use thiserror::Error;

/// Result type alias using `AudioError`
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio engine error types
#[derive(Error, Debug)]
pub enum AudioError {
    /// The processing context could not be created (no device, unsupported
    /// environment, platform restriction)
    #[error("Audio engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The source handle could not be adapted into a processing input
    #[error("Unsupported audio source: {0}")]
    SourceUnsupported(String),

    /// The context is suspended by platform policy until the next user gesture
    #[error("Audio output suspended: {0}")]
    TransientSuspension(String),

    /// Equalizer band index outside the fixed band table
    #[error("Band index {index} out of range (expected 0..{count})")]
    InvalidBandIndex { index: usize, count: usize },

    /// Parameter value that cannot be clamped into range (NaN, infinity)
    #[error("Invalid value for {parameter}: {value}")]
    InvalidParameter { parameter: &'static str, value: f32 },

    /// Equalizer preset with the wrong number of gains
    #[error("Preset has {actual} band gains, expected {expected}")]
    PresetLength { expected: usize, actual: usize },

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error while loading presets or configuration
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AudioError {
    /// Whether the failure is expected to clear on its own (retry on next gesture)
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientSuspension(_))
    }

    /// Whether the failure was a rejected control value with no effect on the graph
    pub fn is_rejected_parameter(&self) -> bool {
        matches!(
            self,
            Self::InvalidBandIndex { .. } | Self::InvalidParameter { .. } | Self::PresetLength { .. }
        )
    }
}
