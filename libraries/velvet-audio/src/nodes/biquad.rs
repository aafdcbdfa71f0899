/// Biquad filter node
///
/// Coefficients follow the Audio EQ Cookbook with Web Audio's conventions: gain
/// in dB, shelves with slope S = 1, and fixed responses when the frequency sits
/// at 0 Hz or at/above Nyquist.
///
/// Frequency, Q and gain are smoothed parameters. While any of them is moving the
/// coefficients are recomputed every sample, so sweeps stay free of zipper noise.
use super::param::SmoothedParam;
use std::f64::consts::PI;

/// Filter response type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Boost/cut around the frequency with Q bandwidth
    Peaking,
    /// Boost/cut below the frequency
    LowShelf,
    /// Boost/cut above the frequency
    HighShelf,
    /// Second-order lowpass with Q resonance
    Lowpass,
}

/// Normalized direct form I coefficients (a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    const IDENTITY: Self = Self::gain(1.0);

    const fn gain(k: f32) -> Self {
        Self {
            b0: k,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Design coefficients for `kind` at the given sample rate
    pub(crate) fn design(
        kind: FilterKind,
        sample_rate: u32,
        frequency: f32,
        q: f32,
        gain_db: f32,
    ) -> Self {
        if sample_rate == 0 {
            return Self::IDENTITY;
        }

        let nyquist = f64::from(sample_rate) / 2.0;
        let w = (f64::from(frequency) / nyquist).clamp(0.0, 1.0);
        let a = 10.0_f64.powf(f64::from(gain_db) / 40.0);
        let q = f64::from(q);

        match kind {
            FilterKind::Lowpass => {
                if w >= 1.0 {
                    return Self::IDENTITY;
                }
                if w <= 0.0 {
                    return Self::gain(0.0);
                }
                let omega = PI * w;
                let (sin, cos) = omega.sin_cos();
                let alpha = sin / (2.0 * q.max(f64::EPSILON));

                let b1 = 1.0 - cos;
                let b0 = b1 / 2.0;
                Self::normalize(b0, b1, b0, 1.0 + alpha, -2.0 * cos, 1.0 - alpha)
            }
            FilterKind::Peaking => {
                if w <= 0.0 || w >= 1.0 {
                    return Self::IDENTITY;
                }
                if q <= 0.0 {
                    return Self::gain((a * a) as f32);
                }
                let omega = PI * w;
                let (sin, cos) = omega.sin_cos();
                let alpha = sin / (2.0 * q);

                Self::normalize(
                    1.0 + alpha * a,
                    -2.0 * cos,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos,
                    1.0 - alpha / a,
                )
            }
            FilterKind::LowShelf => {
                if w >= 1.0 {
                    return Self::gain((a * a) as f32);
                }
                if w <= 0.0 {
                    return Self::IDENTITY;
                }
                let omega = PI * w;
                let (sin, cos) = omega.sin_cos();
                let beta = a.sqrt() * sin * std::f64::consts::SQRT_2;

                Self::normalize(
                    a * ((a + 1.0) - (a - 1.0) * cos + beta),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
                    a * ((a + 1.0) - (a - 1.0) * cos - beta),
                    (a + 1.0) + (a - 1.0) * cos + beta,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos),
                    (a + 1.0) + (a - 1.0) * cos - beta,
                )
            }
            FilterKind::HighShelf => {
                if w >= 1.0 {
                    return Self::IDENTITY;
                }
                if w <= 0.0 {
                    return Self::gain((a * a) as f32);
                }
                let omega = PI * w;
                let (sin, cos) = omega.sin_cos();
                let beta = a.sqrt() * sin * std::f64::consts::SQRT_2;

                Self::normalize(
                    a * ((a + 1.0) + (a - 1.0) * cos + beta),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
                    a * ((a + 1.0) + (a - 1.0) * cos - beta),
                    (a + 1.0) - (a - 1.0) * cos + beta,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos),
                    (a + 1.0) - (a - 1.0) * cos - beta,
                )
            }
        }
    }

    fn normalize(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        // 0 dB peaking and shelf filters: numerator equals denominator
        if b0 == a0 && b1 == a1 && b2 == a2 {
            return Self::IDENTITY;
        }
        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (a1 / a0) as f32,
            a2: (a2 / a0) as f32,
        }
    }

    /// Magnitude response at `frequency`
    pub(crate) fn magnitude_at(&self, frequency: f32, sample_rate: u32) -> f32 {
        let omega = 2.0 * PI * f64::from(frequency) / f64::from(sample_rate);
        let (s1, c1) = omega.sin_cos();
        let (s2, c2) = (2.0 * omega).sin_cos();

        let (b0, b1, b2) = (f64::from(self.b0), f64::from(self.b1), f64::from(self.b2));
        let (a1, a2) = (f64::from(self.a1), f64::from(self.a2));

        let num_re = b0 + b1 * c1 + b2 * c2;
        let num_im = -(b1 * s1 + b2 * s2);
        let den_re = 1.0 + a1 * c1 + a2 * c2;
        let den_im = -(a1 * s1 + a2 * s2);

        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt() as f32
    }
}

/// Per-channel filter memory
#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl ChannelState {
    #[inline]
    fn tick(&mut self, c: &Coefficients, input: f32) -> f32 {
        let mut out = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        // Flush denormals
        if out.abs() < 1e-15 {
            out = 0.0;
        }

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = out;
        out
    }
}

/// Stereo biquad filter with smoothed frequency, Q and gain
#[derive(Debug, Clone)]
pub struct BiquadNode {
    kind: FilterKind,
    sample_rate: u32,
    frequency: SmoothedParam,
    q: SmoothedParam,
    gain_db: SmoothedParam,
    coefficients: Coefficients,
    left: ChannelState,
    right: ChannelState,
}

impl BiquadNode {
    pub fn new(
        kind: FilterKind,
        sample_rate: u32,
        frequency: SmoothedParam,
        q: SmoothedParam,
        gain_db: SmoothedParam,
    ) -> Self {
        let coefficients = Coefficients::design(
            kind,
            sample_rate,
            frequency.value(),
            q.value(),
            gain_db.value(),
        );

        Self {
            kind,
            sample_rate,
            frequency,
            q,
            gain_db,
            coefficients,
            left: ChannelState::default(),
            right: ChannelState::default(),
        }
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn frequency(&self) -> &SmoothedParam {
        &self.frequency
    }

    pub fn q(&self) -> &SmoothedParam {
        &self.q
    }

    pub fn gain_db(&self) -> &SmoothedParam {
        &self.gain_db
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency.set_target(frequency);
    }

    pub fn set_gain_db(&mut self, gain_db: f32) {
        self.gain_db.set_target(gain_db);
    }

    fn refresh(&mut self) {
        self.coefficients = Coefficients::design(
            self.kind,
            self.sample_rate,
            self.frequency.value(),
            self.q.value(),
            self.gain_db.value(),
        );
    }

    /// Magnitude response of the filter as currently configured
    pub fn magnitude_at(&self, frequency: f32) -> f32 {
        self.coefficients.magnitude_at(frequency, self.sample_rate)
    }

    /// Process one stereo frame
    #[inline]
    pub fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        if !(self.frequency.is_settled() && self.q.is_settled() && self.gain_db.is_settled()) {
            self.frequency.next();
            self.q.next();
            self.gain_db.next();
            self.refresh();
        }

        let c = self.coefficients;
        (self.left.tick(&c, left), self.right.tick(&c, right))
    }

    /// Filter an interleaved stereo buffer in place
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        for frame in buffer.chunks_exact_mut(2) {
            let (l, r) = self.process_frame(frame[0], frame[1]);
            frame[0] = l;
            frame[1] = r;
        }
    }
}
