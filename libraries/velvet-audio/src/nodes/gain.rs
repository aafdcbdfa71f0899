use super::param::SmoothedParam;

/// Smoothed gain stage
#[derive(Debug, Clone)]
pub struct GainNode {
    gain: SmoothedParam,
}

impl GainNode {
    pub fn new(gain: SmoothedParam) -> Self {
        Self { gain }
    }

    pub fn gain(&self) -> &SmoothedParam {
        &self.gain
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain.set_target(gain);
    }

    /// Gain for the next frame; call once per frame and apply to every channel
    #[inline]
    pub fn advance(&mut self) -> f32 {
        self.gain.next()
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        input * self.gain.next()
    }
}
