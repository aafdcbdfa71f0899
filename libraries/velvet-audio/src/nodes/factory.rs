/// Node construction for one processing context
///
/// Nodes are always built against the context that will run them: the factory
/// carries its sample rate and the engine-wide smoothing, convolution and
/// analyser settings.
use super::analyser::AnalyserNode;
use super::biquad::{BiquadNode, FilterKind};
use super::convolver::ConvolverNode;
use super::delay::DelayNode;
use super::gain::GainNode;
use super::param::SmoothedParam;
use crate::config::{AnalyserSettings, EngineConfig};
use crate::error::{AudioError, Result};
use std::f32::consts::FRAC_1_SQRT_2;

/// Number of graphic equalizer bands
pub const EQ_BAND_COUNT: usize = 10;

/// Equalizer band center frequencies (Hz), low to high
pub const EQ_FREQUENCIES: [f32; EQ_BAND_COUNT] = [
    60.0, 170.0, 310.0, 600.0, 1000.0, 3000.0, 6000.0, 12000.0, 14000.0, 16000.0,
];

/// Q shared by all equalizer bands
pub const EQ_Q: f32 = 1.5;

/// Equalizer gain limit in dB (applies to both boost and cut)
pub const EQ_GAIN_LIMIT_DB: f32 = 15.0;

/// Bass shelf corner frequency (Hz)
pub const BASS_FREQUENCY: f32 = 200.0;

/// Treble shelf corner frequency (Hz)
pub const TREBLE_FREQUENCY: f32 = 5000.0;

/// Capacity of the stereo width delay line (seconds)
pub const STEREO_DELAY_MAX_SECS: f32 = 0.1;

/// Capacity of the ambience pre-delay line (seconds)
pub const PRE_DELAY_MAX_SECS: f32 = 1.0;

/// Damping lowpass range (Hz)
pub const DAMP_MIN_HZ: f32 = 10.0;
pub const DAMP_MAX_HZ: f32 = 22050.0;

/// Snap scale for parameters measured in seconds
const SECONDS_SNAP_SCALE: f32 = 1e-3;

pub struct NodeFactory {
    sample_rate: u32,
    time_constant: f32,
    block_size: usize,
    analyser: AnalyserSettings,
}

impl NodeFactory {
    pub fn new(sample_rate: u32, config: &EngineConfig) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AudioError::EngineUnavailable(
                "context reported a sample rate of 0 Hz".to_string(),
            ));
        }
        config.validate()?;

        Ok(Self {
            sample_rate,
            time_constant: config.smoothing.time_constant_secs,
            block_size: config.convolution.block_size,
            analyser: config.analyser.clone(),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// A parameter resting at `value` with the engine's ramp time
    pub fn param(&self, value: f32) -> SmoothedParam {
        SmoothedParam::new(value, self.time_constant, self.sample_rate)
    }

    fn filter(&self, kind: FilterKind, frequency: f32, q: f32, gain_db: f32) -> BiquadNode {
        let nyquist = self.sample_rate as f32 / 2.0;
        BiquadNode::new(
            kind,
            self.sample_rate,
            self.param(frequency).with_range(0.0, nyquist),
            self.param(q),
            self.param(gain_db),
        )
    }

    pub fn eq_band(&self, frequency: f32, gain_db: f32) -> BiquadNode {
        self.filter(FilterKind::Peaking, frequency, EQ_Q, gain_db)
    }

    pub fn bass_shelf(&self, gain_db: f32) -> BiquadNode {
        self.filter(FilterKind::LowShelf, BASS_FREQUENCY, 1.0, gain_db)
    }

    pub fn treble_shelf(&self, gain_db: f32) -> BiquadNode {
        self.filter(FilterKind::HighShelf, TREBLE_FREQUENCY, 1.0, gain_db)
    }

    /// Lowpass used to darken the wet signal
    pub fn damping_filter(&self, frequency: f32) -> BiquadNode {
        self.filter(FilterKind::Lowpass, frequency, FRAC_1_SQRT_2, 0.0)
    }

    pub fn gain(&self, gain: f32) -> GainNode {
        GainNode::new(self.param(gain))
    }

    /// Single-channel delay for the stereo width stage
    pub fn stereo_delay(&self, seconds: f32) -> DelayNode {
        DelayNode::new(
            1,
            self.sample_rate,
            STEREO_DELAY_MAX_SECS,
            self.param(seconds).with_snap_scale(SECONDS_SNAP_SCALE),
        )
    }

    /// Stereo delay ahead of the convolver
    pub fn pre_delay(&self, seconds: f32) -> DelayNode {
        DelayNode::new(
            2,
            self.sample_rate,
            PRE_DELAY_MAX_SECS,
            self.param(seconds).with_snap_scale(SECONDS_SNAP_SCALE),
        )
    }

    pub fn convolver(&self) -> ConvolverNode {
        ConvolverNode::new(self.block_size)
    }

    pub fn analyser(&self) -> AnalyserNode {
        AnalyserNode::new(&self.analyser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_sample_rate() {
        let result = NodeFactory::new(0, &EngineConfig::default());
        assert!(matches!(result, Err(AudioError::EngineUnavailable(_))));
    }

    #[test]
    fn nodes_start_at_requested_values() {
        let factory = NodeFactory::new(48000, &EngineConfig::default()).unwrap();

        let band = factory.eq_band(EQ_FREQUENCIES[3], -4.0);
        assert_eq!(band.frequency().value(), 600.0);
        assert_eq!(band.q().value(), EQ_Q);
        assert_eq!(band.gain_db().value(), -4.0);

        let damp = factory.damping_filter(DAMP_MAX_HZ);
        assert_eq!(damp.kind(), FilterKind::Lowpass);
        assert_eq!(damp.q().value(), FRAC_1_SQRT_2);

        let delay = factory.stereo_delay(0.015);
        assert_eq!(delay.delay_time().value(), 0.015);
    }

    #[test]
    fn band_table_is_ascending() {
        assert!(EQ_FREQUENCIES.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
