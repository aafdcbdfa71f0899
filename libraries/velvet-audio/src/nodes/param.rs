//! Smoothed (ramped) parameters
//!
//! A `SmoothedParam` approaches its target exponentially, one step per sample:
//!
//! ```text
//! v[n+1] = v[n] + c * (target - v[n]),   c = 1 - exp(-1 / (tau * fs))
//! ```
//!
//! which is the discrete form of Web Audio's `setTargetAtTime`. Once the value is
//! within a small relative distance of the target (or stops moving in f32) it
//! snaps onto the target exactly, so a settled parameter reads back the value
//! that was set.

/// Relative distance at which a ramp snaps onto its target
const SNAP_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    /// Per-sample smoothing coefficient (1.0 = jump immediately)
    coeff: f32,
    min: f32,
    max: f32,
    /// Magnitude below which the snap distance stops shrinking
    snap_scale: f32,
}

impl SmoothedParam {
    /// Create a parameter resting at `value`
    ///
    /// A time constant of zero (or a zero sample rate) makes every target change
    /// take effect on the next sample.
    pub fn new(value: f32, time_constant_secs: f32, sample_rate: u32) -> Self {
        let coeff = if time_constant_secs > 0.0 && sample_rate > 0 {
            let samples = f64::from(time_constant_secs) * f64::from(sample_rate);
            (1.0 - (-1.0 / samples).exp()) as f32
        } else {
            1.0
        };

        Self {
            current: value,
            target: value,
            coeff,
            min: f32::NEG_INFINITY,
            max: f32::INFINITY,
            snap_scale: 1.0,
        }
    }

    /// Restrict the parameter to `[min, max]`; targets outside are clamped
    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self.current = self.current.clamp(min, max);
        self.target = self.target.clamp(min, max);
        self
    }

    /// Set the magnitude used for the snap distance of values near zero.
    ///
    /// Parameters measured in small units (delay seconds) need a smaller scale
    /// than gains so the final snap stays below one sample.
    pub fn with_snap_scale(mut self, scale: f32) -> Self {
        self.snap_scale = scale.abs();
        self
    }

    /// Ramp toward `value` from wherever the parameter currently is
    pub fn set_target(&mut self, value: f32) {
        self.target = value.clamp(self.min, self.max);
    }

    /// Advance one sample and return the value to use for it
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.current != self.target {
            let step = self.current + self.coeff * (self.target - self.current);
            let snap_distance = SNAP_EPSILON * self.target.abs().max(self.snap_scale);
            if step == self.current || (self.target - step).abs() <= snap_distance {
                self.current = self.target;
            } else {
                self.current = step;
            }
        }
        self.current
    }

    /// Value as of the last processed sample
    pub fn value(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }
}
