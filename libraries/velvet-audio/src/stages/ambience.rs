use super::Stage;
use crate::nodes::{BiquadNode, ConvolutionKernel, ConvolverNode, DelayNode, GainNode, NodeFactory};
use crate::settings::AmbienceState;

/// Convolution reverb with pre-delay, damping and a dry/wet crossfade
///
/// ```text
///        +--> dry gain -------------------------------------+
/// in ----+                                                  +--> out
///        +--> pre-delay --> convolver --> damping --> wet --+
/// ```
///
/// The convolver stays silent until the impulse response job delivers a kernel,
/// so the stage starts out as a plain dry path. It adds no latency of its own,
/// so the reverb onset trails the dry sound by exactly the pre-delay.
pub struct AmbienceStage {
    dry: GainNode,
    pre_delay: DelayNode,
    convolver: ConvolverNode,
    damping: BiquadNode,
    wet: GainNode,
}

impl AmbienceStage {
    pub fn new(factory: &NodeFactory, state: &AmbienceState) -> Self {
        Self {
            dry: factory.gain(1.0 - state.mix),
            pre_delay: factory.pre_delay(state.pre_delay),
            convolver: factory.convolver(),
            damping: factory.damping_filter(state.damp),
            wet: factory.gain(state.mix),
        }
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.dry.set_gain(1.0 - mix);
        self.wet.set_gain(mix);
    }

    pub fn set_pre_delay(&mut self, seconds: f32) {
        self.pre_delay.set_delay_time(seconds);
    }

    pub fn set_damp(&mut self, frequency: f32) {
        self.damping.set_frequency(frequency);
    }

    /// Retarget mix, pre-delay and damping together
    pub fn apply(&mut self, state: &AmbienceState) {
        self.set_mix(state.mix);
        self.set_pre_delay(state.pre_delay);
        self.set_damp(state.damp);
    }

    /// Install a prepared kernel; returns the one it replaced
    pub fn set_impulse(&mut self, kernel: ConvolutionKernel) -> Option<ConvolutionKernel> {
        self.convolver.set_kernel(kernel)
    }

    pub fn has_impulse(&self) -> bool {
        self.convolver.has_kernel()
    }

    pub fn dry_gain(&self) -> &GainNode {
        &self.dry
    }

    pub fn wet_gain(&self) -> &GainNode {
        &self.wet
    }

    pub fn pre_delay(&self) -> &DelayNode {
        &self.pre_delay
    }

    pub fn damping(&self) -> &BiquadNode {
        &self.damping
    }
}

impl Stage for AmbienceStage {
    fn process(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            let (left, right) = (frame[0], frame[1]);

            let (pl, pr) = self.pre_delay.process_stereo(left, right);
            let (cl, cr) = self.convolver.process_frame(pl, pr);
            let (wl, wr) = self.damping.process_frame(cl, cr);

            let dry = self.dry.advance();
            let wet = self.wet.advance();

            frame[0] = left * dry + wl * wet;
            frame[1] = right * dry + wr * wet;
        }
    }

    fn name(&self) -> &'static str {
        "Ambience"
    }
}
