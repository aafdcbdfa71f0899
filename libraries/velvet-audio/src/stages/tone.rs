use super::Stage;
use crate::nodes::{BiquadNode, NodeFactory};
use crate::settings::ToneState;

/// Bass and treble shelving filters
pub struct ToneStage {
    bass: BiquadNode,
    treble: BiquadNode,
}

impl ToneStage {
    pub fn new(factory: &NodeFactory, state: &ToneState) -> Self {
        Self {
            bass: factory.bass_shelf(state.bass_db),
            treble: factory.treble_shelf(state.treble_db),
        }
    }

    pub fn set_bass(&mut self, gain_db: f32) {
        self.bass.set_gain_db(gain_db);
    }

    pub fn set_treble(&mut self, gain_db: f32) {
        self.treble.set_gain_db(gain_db);
    }

    pub fn bass(&self) -> &BiquadNode {
        &self.bass
    }

    pub fn treble(&self) -> &BiquadNode {
        &self.treble
    }
}

impl Stage for ToneStage {
    fn process(&mut self, buffer: &mut [f32]) {
        self.bass.process_block(buffer);
        self.treble.process_block(buffer);
    }

    fn name(&self) -> &'static str {
        "Tone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::nodes::{BASS_FREQUENCY, TREBLE_FREQUENCY};

    #[test]
    fn shelves_sit_at_fixed_corners() {
        let factory = NodeFactory::new(44100, &EngineConfig::default()).unwrap();
        let stage = ToneStage::new(
            &factory,
            &ToneState {
                bass_db: 4.0,
                treble_db: -2.0,
            },
        );

        assert_eq!(stage.bass().frequency().value(), BASS_FREQUENCY);
        assert_eq!(stage.treble().frequency().value(), TREBLE_FREQUENCY);
        assert_eq!(stage.bass().gain_db().value(), 4.0);
        assert_eq!(stage.treble().gain_db().value(), -2.0);
    }

    #[test]
    fn bass_boost_raises_low_frequencies() {
        let factory = NodeFactory::new(44100, &EngineConfig::default()).unwrap();
        let stage = ToneStage::new(
            &factory,
            &ToneState {
                bass_db: 10.0,
                treble_db: 0.0,
            },
        );

        let low = 20.0 * stage.bass().magnitude_at(40.0).log10();
        let high = 20.0 * stage.bass().magnitude_at(8000.0).log10();
        assert!(low > 9.0);
        assert!(high.abs() < 0.2);
    }
}
