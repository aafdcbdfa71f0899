use super::Stage;
use crate::nodes::{BiquadNode, NodeFactory, EQ_BAND_COUNT, EQ_FREQUENCIES};
use crate::settings::EqualizerState;

/// Ten-band graphic equalizer (peaking filters in series)
pub struct EqualizerStage {
    bands: Vec<BiquadNode>,
}

impl EqualizerStage {
    pub fn new(factory: &NodeFactory, state: &EqualizerState) -> Self {
        let bands = EQ_FREQUENCIES
            .iter()
            .zip(state.gains.iter())
            .map(|(&frequency, &gain)| factory.eq_band(frequency, gain))
            .collect();
        Self { bands }
    }

    /// Retarget one band; returns false if the index is out of range
    pub fn set_band_gain(&mut self, index: usize, gain_db: f32) -> bool {
        match self.bands.get_mut(index) {
            Some(band) => {
                band.set_gain_db(gain_db);
                true
            }
            None => false,
        }
    }

    pub fn set_gains(&mut self, gains: &[f32; EQ_BAND_COUNT]) {
        for (band, &gain) in self.bands.iter_mut().zip(gains) {
            band.set_gain_db(gain);
        }
    }

    pub fn bands(&self) -> &[BiquadNode] {
        &self.bands
    }
}

impl Stage for EqualizerStage {
    fn process(&mut self, buffer: &mut [f32]) {
        for band in &mut self.bands {
            band.process_block(buffer);
        }
    }

    fn name(&self) -> &'static str {
        "Equalizer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn rms(samples: impl Iterator<Item = f32>) -> f32 {
        let (sum, count) = samples.fold((0.0f64, 0usize), |(s, n), x| (s + f64::from(x * x), n + 1));
        (sum / count as f64).sqrt() as f32
    }

    #[test]
    fn builds_ten_bands_in_order() {
        let factory = NodeFactory::new(44100, &EngineConfig::default()).unwrap();
        let stage = EqualizerStage::new(&factory, &EqualizerState::default());

        assert_eq!(stage.bands().len(), EQ_BAND_COUNT);
        for (band, &freq) in stage.bands().iter().zip(EQ_FREQUENCIES.iter()) {
            assert_eq!(band.frequency().value(), freq);
            assert_eq!(band.gain_db().value(), 0.0);
        }
    }

    #[test]
    fn out_of_range_band_is_refused() {
        let factory = NodeFactory::new(44100, &EngineConfig::default()).unwrap();
        let mut stage = EqualizerStage::new(&factory, &EqualizerState::default());
        assert!(!stage.set_band_gain(EQ_BAND_COUNT, 3.0));
        assert!(stage.set_band_gain(0, 3.0));
    }

    #[test]
    fn boosted_band_raises_its_frequency() {
        let sample_rate = 44100;
        let factory = NodeFactory::new(sample_rate, &EngineConfig::default()).unwrap();
        let mut state = EqualizerState::default();
        state.gains[4] = 6.0; // 1 kHz
        let mut stage = EqualizerStage::new(&factory, &state);

        let frames = sample_rate as usize;
        let mut buffer: Vec<f32> = (0..frames)
            .flat_map(|i| {
                let s = 0.25
                    * (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sample_rate as f32).sin();
                [s, s]
            })
            .collect();
        let input_rms = rms(buffer.iter().step_by(2).skip(frames / 2).copied());

        stage.process(&mut buffer);
        let output_rms = rms(buffer.iter().step_by(2).skip(frames / 2).copied());

        let gain_db = 20.0 * (output_rms / input_rms).log10();
        assert!((gain_db - 6.0).abs() < 0.2, "measured {} dB", gain_db);
    }
}
