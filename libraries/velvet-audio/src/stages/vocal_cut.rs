use super::Stage;
use crate::nodes::{GainNode, NodeFactory};
use crate::settings::VocalCutState;

/// Center-channel cancellation by phase inversion
///
/// The right channel is inverted and summed with the left, cancelling whatever
/// is identical on both sides (usually the lead vocal). The difference signal is
/// sent to both outputs. Two crossfaded gains blend between the processed path
/// and the untouched bypass, so toggling never clicks.
pub struct VocalCutStage {
    inverter: GainNode,
    processed: GainNode,
    bypass: GainNode,
}

impl VocalCutStage {
    pub fn new(factory: &NodeFactory, state: &VocalCutState) -> Self {
        let (processed, bypass) = Self::gains_for(state.enabled);
        Self {
            inverter: factory.gain(-1.0),
            processed: factory.gain(processed),
            bypass: factory.gain(bypass),
        }
    }

    fn gains_for(enabled: bool) -> (f32, f32) {
        if enabled {
            (1.0, 0.0)
        } else {
            (0.0, 1.0)
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        let (processed, bypass) = Self::gains_for(enabled);
        self.processed.set_gain(processed);
        self.bypass.set_gain(bypass);
    }

    pub fn processed_gain(&self) -> &GainNode {
        &self.processed
    }

    pub fn bypass_gain(&self) -> &GainNode {
        &self.bypass
    }
}

impl Stage for VocalCutStage {
    fn process(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            let (left, right) = (frame[0], frame[1]);
            let difference = left + self.inverter.process(right);

            let wet = self.processed.advance();
            let dry = self.bypass.advance();

            frame[0] = difference * wet + left * dry;
            frame[1] = difference * wet + right * dry;
        }
    }

    fn name(&self) -> &'static str {
        "Vocal Cut"
    }
}
