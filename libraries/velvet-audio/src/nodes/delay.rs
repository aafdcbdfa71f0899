/// Fractional delay line node
///
/// One ring buffer per channel sharing a single smoothed delay time. Reads use
/// linear interpolation between the two neighbouring samples; the sample is
/// written before it is read, so a delay of zero passes the input through
/// unchanged.
use super::param::SmoothedParam;

#[derive(Debug, Clone)]
struct DelayLine {
    buffer: Vec<f32>,
    write: usize,
}

impl DelayLine {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity],
            write: 0,
        }
    }

    #[inline]
    fn tick(&mut self, input: f32, delay_samples: f32) -> f32 {
        let len = self.buffer.len();
        self.buffer[self.write] = input;

        let whole = delay_samples.floor();
        let frac = delay_samples - whole;
        let whole = whole as usize;

        let newer = (self.write + len - whole) % len;
        let older = (newer + len - 1) % len;
        let a = self.buffer[newer];
        let b = self.buffer[older];

        self.write = (self.write + 1) % len;
        a + (b - a) * frac
    }
}

#[derive(Debug, Clone)]
pub struct DelayNode {
    lines: Vec<DelayLine>,
    delay_time: SmoothedParam,
    sample_rate: f32,
    /// Largest delay in samples that still leaves room for interpolation
    max_delay_samples: f32,
}

impl DelayNode {
    /// Create a delay with `channels` lines holding up to `max_delay_secs`
    ///
    /// `delay_time` is in seconds and is clamped to `[0, max_delay_secs]`.
    pub fn new(
        channels: usize,
        sample_rate: u32,
        max_delay_secs: f32,
        delay_time: SmoothedParam,
    ) -> Self {
        let max_delay_samples = (max_delay_secs * sample_rate as f32).ceil();
        let capacity = max_delay_samples as usize + 2;

        Self {
            lines: (0..channels.max(1)).map(|_| DelayLine::new(capacity)).collect(),
            delay_time: delay_time.with_range(0.0, max_delay_secs),
            sample_rate: sample_rate as f32,
            max_delay_samples,
        }
    }

    pub fn delay_time(&self) -> &SmoothedParam {
        &self.delay_time
    }

    pub fn set_delay_time(&mut self, seconds: f32) {
        self.delay_time.set_target(seconds);
    }

    #[inline]
    fn next_delay_samples(&mut self) -> f32 {
        (self.delay_time.next() * self.sample_rate).min(self.max_delay_samples)
    }

    /// Delay a single-channel sample
    #[inline]
    pub fn process_mono(&mut self, input: f32) -> f32 {
        debug_assert_eq!(self.lines.len(), 1);
        let delay = self.next_delay_samples();
        self.lines[0].tick(input, delay)
    }

    /// Delay one stereo frame (both channels by the same amount)
    #[inline]
    pub fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        debug_assert_eq!(self.lines.len(), 2);
        let delay = self.next_delay_samples();
        let l = self.lines[0].tick(left, delay);
        let r = self.lines[1].tick(right, delay);
        (l, r)
    }
}
