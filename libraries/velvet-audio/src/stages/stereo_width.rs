use super::Stage;
use crate::nodes::{DelayNode, NodeFactory};
use crate::settings::StereoWidthState;

/// Haas-effect widener: the right channel is delayed relative to the left
pub struct StereoWidthStage {
    delay: DelayNode,
}

impl StereoWidthStage {
    pub fn new(factory: &NodeFactory, state: &StereoWidthState) -> Self {
        Self {
            delay: factory.stereo_delay(state.delay_secs()),
        }
    }

    /// Retarget the right-channel delay (seconds)
    pub fn set_delay(&mut self, seconds: f32) {
        self.delay.set_delay_time(seconds);
    }

    pub fn delay(&self) -> &DelayNode {
        &self.delay
    }
}

impl Stage for StereoWidthStage {
    fn process(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            frame[1] = self.delay.process_mono(frame[1]);
        }
    }

    fn name(&self) -> &'static str {
        "Stereo Width"
    }
}
