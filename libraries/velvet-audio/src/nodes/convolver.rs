//! Convolution node for the ambience path
//!
//! The impulse response is split at `B` frames. The head (taps `0..B`) is
//! convolved directly in the time domain, so the wet signal has no latency.
//! The tail is cut into blocks of `B` frames, each transformed once with a `2B`
//! point FFT, and run through uniformly partitioned overlap-save: every `B`
//! input frames the node transforms the newest input window, pushes it onto a
//! frequency-domain delay line and multiply-accumulates it against all tail
//! partitions. That output lags by `B` frames, which is exactly the offset of
//! the tail within the response.
//!
//! The impulse response is normalized the way Web Audio's `ConvolverNode` does
//! with `normalize = true`, so convolving with a noisy synthetic tail gives a
//! usable wet level regardless of its length.

use crate::impulse::ImpulseResponse;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;
use tracing::warn;

/// Reference gain applied after power normalization (-58 dB)
const GAIN_CALIBRATION: f32 = 0.00125;

/// Sample rate the calibration gain was measured at
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44100.0;

/// Power floor so near-silent responses are not blown up
const MIN_POWER: f32 = 0.000125;

const ZERO: Complex<f32> = Complex { re: 0.0, im: 0.0 };

/// Web Audio normalization scale for an impulse response
pub fn normalization_scale(ir: &ImpulseResponse) -> f32 {
    let mut power = 0.0f64;
    for channel in ir.channels() {
        power += channel.iter().map(|&s| f64::from(s) * f64::from(s)).sum::<f64>();
    }

    let count = (ir.channel_count() * ir.len()).max(1) as f64;
    let mut power = (power / count).sqrt() as f32;
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }

    let mut scale = 1.0 / power;
    scale *= GAIN_CALIBRATION;
    if ir.sample_rate() > 0 {
        scale *= GAIN_CALIBRATION_SAMPLE_RATE / ir.sample_rate() as f32;
    }
    scale
}

/// A prepared impulse response, ready to swap into a node
///
/// Preparing a kernel does all the FFT work and every allocation the node
/// needs up front, so it can run on any thread and installing it is a move.
pub struct ConvolutionKernel {
    block_size: usize,
    /// `[channel]`: the first `B` taps reversed and zero-padded to `B`
    head: [Vec<f32>; 2],
    /// `[channel][partition][bin]`, bins `0..=B`, for taps from `B` on
    partitions: [Vec<Vec<Complex<f32>>>; 2],
    /// Zeroed frequency-domain delay lines matching `partitions`
    history: [Vec<Vec<Complex<f32>>>; 2],
    scale: f32,
    frames: usize,
}

impl ConvolutionKernel {
    /// Transform `ir` into a direct head and tail partitions of `block_size`
    ///
    /// A mono response is used for both channels.
    pub fn prepare(ir: &ImpulseResponse, block_size: usize) -> Self {
        let fft_size = block_size * 2;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let mut scratch = vec![ZERO; fft.get_inplace_scratch_len()];

        let frames = ir.len();
        let count = frames.saturating_sub(block_size).div_ceil(block_size);

        let head = |samples: &[f32]| -> Vec<f32> {
            let mut taps = vec![0.0; block_size];
            for (i, &s) in samples.iter().take(block_size).enumerate() {
                taps[block_size - 1 - i] = s;
            }
            taps
        };

        let mut transform = |samples: &[f32]| -> Vec<Vec<Complex<f32>>> {
            (0..count)
                .map(|p| {
                    let mut buffer = vec![ZERO; fft_size];
                    let start = ((p + 1) * block_size).min(samples.len());
                    let end = ((p + 2) * block_size).min(samples.len());
                    for (slot, &s) in buffer.iter_mut().zip(&samples[start..end]) {
                        slot.re = s;
                    }
                    fft.process_with_scratch(&mut buffer, &mut scratch);
                    buffer.truncate(block_size + 1);
                    buffer
                })
                .collect()
        };

        let second = if ir.channel_count() > 1 { 1 } else { 0 };
        let left = transform(ir.channel(0));
        let right = if second == 1 {
            transform(ir.channel(1))
        } else {
            left.clone()
        };
        let history = || vec![vec![ZERO; block_size + 1]; count];

        Self {
            block_size,
            head: [head(ir.channel(0)), head(ir.channel(second))],
            partitions: [left, right],
            history: [history(), history()],
            scale: normalization_scale(ir),
            frames,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of FFT partitions after the direct head
    pub fn partition_count(&self) -> usize {
        self.partitions[0].len()
    }

    /// Output gain from normalization
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Length of the source impulse response in frames
    pub fn frames(&self) -> usize {
        self.frames
    }
}

struct ChannelState {
    /// Last `B` input frames, written twice so any window is contiguous
    recent: Vec<f32>,
    input: Vec<f32>,
    previous: Vec<f32>,
    output: Vec<f32>,
    /// Frequency-domain delay line, one spectrum per tail partition
    history: Vec<Vec<Complex<f32>>>,
}

impl ChannelState {
    fn new(block_size: usize) -> Self {
        Self {
            recent: vec![0.0; block_size * 2],
            input: vec![0.0; block_size],
            previous: vec![0.0; block_size],
            output: vec![0.0; block_size],
            history: Vec::new(),
        }
    }

    fn clear(&mut self) {
        self.recent.fill(0.0);
        self.input.fill(0.0);
        self.previous.fill(0.0);
        self.output.fill(0.0);
    }

    /// Direct convolution of the newest `B` frames with the reversed head
    #[inline]
    fn head(&self, position: usize, taps: &[f32]) -> f32 {
        let b = taps.len();
        self.recent[position + 1..position + 1 + b]
            .iter()
            .zip(taps)
            .map(|(x, h)| x * h)
            .sum()
    }
}

/// Stereo convolver; silent until a kernel is assigned
pub struct ConvolverNode {
    block_size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    kernel: Option<ConvolutionKernel>,
    channels: [ChannelState; 2],
    spectrum: Vec<Complex<f32>>,
    accumulator: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    position: usize,
    head: usize,
}

impl ConvolverNode {
    pub fn new(block_size: usize) -> Self {
        let fft_size = block_size * 2;
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Self {
            block_size,
            forward,
            inverse,
            kernel: None,
            channels: [ChannelState::new(block_size), ChannelState::new(block_size)],
            spectrum: vec![ZERO; fft_size],
            accumulator: vec![ZERO; fft_size],
            scratch: vec![ZERO; scratch_len],
            position: 0,
            head: 0,
        }
    }

    pub fn has_kernel(&self) -> bool {
        self.kernel.is_some()
    }

    /// Swap in a prepared kernel, clearing all convolution history
    ///
    /// Returns the previous kernel so the caller can drop it outside any lock
    /// the render path shares.
    pub fn set_kernel(&mut self, mut kernel: ConvolutionKernel) -> Option<ConvolutionKernel> {
        if kernel.block_size() != self.block_size {
            warn!(
                "Ignoring convolution kernel with block size {} (node uses {})",
                kernel.block_size(),
                self.block_size
            );
            return None;
        }

        let mut previous = self.kernel.take();
        for (index, channel) in self.channels.iter_mut().enumerate() {
            let fresh = std::mem::take(&mut kernel.history[index]);
            let old = std::mem::replace(&mut channel.history, fresh);
            if let Some(previous) = previous.as_mut() {
                previous.history[index] = old;
            }
            channel.clear();
        }
        self.position = 0;
        self.head = 0;
        self.kernel = Some(kernel);
        previous
    }

    /// Convolve one stereo frame
    #[inline]
    pub fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        let Some(kernel) = &self.kernel else {
            return (0.0, 0.0);
        };

        let pos = self.position;
        let b = self.block_size;
        let mut out = [0.0f32; 2];
        for ((channel, sample), (taps, slot)) in self
            .channels
            .iter_mut()
            .zip([left, right])
            .zip(kernel.head.iter().zip(&mut out))
        {
            channel.recent[pos] = sample;
            channel.recent[pos + b] = sample;
            channel.input[pos] = sample;
            *slot = channel.head(pos, taps) * kernel.scale + channel.output[pos];
        }

        self.position += 1;
        if self.position == b {
            self.process_block();
            self.position = 0;
        }
        (out[0], out[1])
    }

    fn process_block(&mut self) {
        let Some(kernel) = &self.kernel else {
            return;
        };

        let b = self.block_size;
        let n = 2 * b;
        let parts = kernel.partition_count();
        if parts == 0 {
            return;
        }
        let norm = kernel.scale / n as f32;

        for (index, channel) in self.channels.iter_mut().enumerate() {
            for i in 0..b {
                self.spectrum[i] = Complex::new(channel.previous[i], 0.0);
                self.spectrum[b + i] = Complex::new(channel.input[i], 0.0);
            }
            self.forward
                .process_with_scratch(&mut self.spectrum, &mut self.scratch);
            channel.history[self.head].copy_from_slice(&self.spectrum[..=b]);

            self.accumulator[..=b].fill(ZERO);
            for (p, h) in kernel.partitions[index].iter().enumerate() {
                let x = &channel.history[(self.head + parts - p) % parts];
                for ((acc, &xk), &hk) in self.accumulator[..=b].iter_mut().zip(x).zip(h) {
                    *acc += xk * hk;
                }
            }
            for k in 1..b {
                self.accumulator[n - k] = self.accumulator[k].conj();
            }

            self.inverse
                .process_with_scratch(&mut self.accumulator, &mut self.scratch);
            for (out, acc) in channel.output.iter_mut().zip(&self.accumulator[b..]) {
                *out = acc.re * norm;
            }

            channel.previous.copy_from_slice(&channel.input);
        }

        self.head = (self.head + 1) % parts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(node: &mut ConvolverNode, input: &[f32]) -> Vec<f32> {
        input.iter().map(|&x| node.process_frame(x, x).0).collect()
    }

    #[test]
    fn silent_without_kernel() {
        let mut node = ConvolverNode::new(64);
        let out = run(&mut node, &[1.0; 256]);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn unit_impulse_passes_input_without_latency() {
        let block = 32;
        let ir = ImpulseResponse::new(vec![vec![1.0]], 44100).unwrap();
        let kernel = ConvolutionKernel::prepare(&ir, block);
        let scale = kernel.scale();
        assert!((scale - GAIN_CALIBRATION).abs() < 1e-9);
        assert_eq!(kernel.partition_count(), 0);

        let mut node = ConvolverNode::new(block);
        node.set_kernel(kernel);

        let input: Vec<f32> = (0..256).map(|i| ((i * 7 % 13) as f32 - 6.0) / 6.0).collect();
        let out = run(&mut node, &input);

        for (i, (&y, &x)) in out.iter().zip(&input).enumerate() {
            assert!((y / scale - x).abs() < 1e-4, "frame {}: {} vs {}", i, y / scale, x);
        }
    }

    fn direct(taps: &[f32], input: &[f32], n: usize) -> f32 {
        (0..taps.len())
            .filter(|&k| k <= n)
            .map(|k| taps[k] * input[n - k])
            .sum()
    }

    #[test]
    fn matches_direct_convolution_across_partitions() {
        let block = 32;
        let taps: Vec<f32> = (0..100).map(|i| ((i * 31 % 17) as f32 - 8.0) / 10.0).collect();
        let ir = ImpulseResponse::new(vec![taps.clone()], 44100).unwrap();
        let kernel = ConvolutionKernel::prepare(&ir, block);
        assert_eq!(kernel.partition_count(), 3);
        let scale = kernel.scale();

        let mut node = ConvolverNode::new(block);
        node.set_kernel(kernel);

        let input: Vec<f32> = (0..400).map(|i| (i as f32 * 0.1).sin()).collect();
        let out = run(&mut node, &input);

        for (i, &y) in out.iter().enumerate() {
            let expected = direct(&taps, &input, i);
            assert!(
                (y / scale - expected).abs() < 1e-3,
                "frame {}: {} vs {}",
                i,
                y / scale,
                expected
            );
        }
    }

    #[test]
    fn delayed_tap_lands_on_its_own_frame() {
        let block = 16;
        let mut taps = vec![0.0; 40];
        taps[21] = 1.0;
        let ir = ImpulseResponse::new(vec![taps], 44100).unwrap();

        let mut node = ConvolverNode::new(block);
        node.set_kernel(ConvolutionKernel::prepare(&ir, block));

        let mut input = vec![0.0; 128];
        input[5] = 1.0;
        let out = run(&mut node, &input);
        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(26));
    }

    #[test]
    fn kernel_arrives_with_its_delay_lines() {
        let taps = vec![0.1; 1000];
        let ir = ImpulseResponse::new(vec![taps.clone(), taps], 44100).unwrap();
        let kernel = ConvolutionKernel::prepare(&ir, 64);
        assert_eq!(kernel.partition_count(), 15);
        for history in &kernel.history {
            assert_eq!(history.len(), 15);
            assert!(history.iter().all(|bins| bins.len() == 65));
        }

        let mut node = ConvolverNode::new(64);
        assert!(node.set_kernel(kernel).is_none());
        assert_eq!(node.channels[0].history.len(), 15);

        let replacement = ConvolutionKernel::prepare(&ir, 64);
        let previous = node.set_kernel(replacement).unwrap();
        assert_eq!(previous.history[1].len(), 15);
        assert_eq!(node.channels[1].history.len(), 15);
    }

    #[test]
    fn normalization_follows_power_and_rate() {
        let quiet = ImpulseResponse::new(vec![vec![0.5; 100]], 44100).unwrap();
        assert!((normalization_scale(&quiet) - GAIN_CALIBRATION / 0.5).abs() < 1e-6);

        let silent = ImpulseResponse::new(vec![vec![0.0; 100]], 48000).unwrap();
        let expected = (1.0 / MIN_POWER) * GAIN_CALIBRATION * 44100.0 / 48000.0;
        assert!((normalization_scale(&silent) - expected).abs() < 1e-3);
    }

    #[test]
    fn rejects_kernel_with_other_block_size() {
        let ir = ImpulseResponse::new(vec![vec![1.0]], 44100).unwrap();
        let mut node = ConvolverNode::new(64);
        node.set_kernel(ConvolutionKernel::prepare(&ir, 128));
        assert!(!node.has_kernel());
    }
}
