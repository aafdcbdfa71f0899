/// Analysis tap producing visualizer data
///
/// Mirrors Web Audio's `AnalyserNode`: a mono down-mix of the last `fft_size`
/// frames is Blackman-windowed, transformed, smoothed over time and mapped from
/// the `[min_decibels, max_decibels]` range onto bytes. The tap never alters the
/// signal passing through it.
use crate::config::AnalyserSettings;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

pub struct AnalyserNode {
    fft_size: usize,
    history: Vec<f32>,
    write: usize,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    fft: Arc<dyn Fft<f32>>,
}

impl AnalyserNode {
    pub fn new(settings: &AnalyserSettings) -> Self {
        let fft_size = settings.fft_size;
        let mut planner = FftPlanner::<f32>::new();

        Self {
            fft_size,
            history: vec![0.0; fft_size],
            write: 0,
            window: blackman_window(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            smoothing: settings.smoothing_time_constant,
            min_decibels: settings.min_decibels,
            max_decibels: settings.max_decibels,
            fft: planner.plan_fft_forward(fft_size),
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of values returned by the frequency data getters
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Record an interleaved stereo block without modifying it
    pub fn capture(&mut self, buffer: &[f32]) {
        for frame in buffer.chunks_exact(2) {
            self.history[self.write] = 0.5 * (frame[0] + frame[1]);
            self.write = (self.write + 1) % self.fft_size;
        }
    }

    /// Advance the smoothed spectrum from the current time-domain window
    fn update_spectrum(&mut self) {
        let n = self.fft_size;
        let mut buffer: Vec<Complex<f32>> = (0..n)
            .map(|i| {
                let sample = self.history[(self.write + i) % n];
                Complex::new(sample * self.window[i], 0.0)
            })
            .collect();
        self.fft.process(&mut buffer);

        let tau = self.smoothing;
        let scale = 1.0 / n as f32;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(&buffer) {
            let magnitude = bin.norm() * scale;
            let mut value = tau * *smoothed + (1.0 - tau) * magnitude;
            if !value.is_finite() {
                value = 0.0;
            }
            *smoothed = value;
        }
    }

    /// Smoothed spectrum in dB (Web Audio `getFloatFrequencyData`)
    pub fn float_frequency_data(&mut self) -> Vec<f32> {
        self.update_spectrum();
        self.smoothed.iter().map(|&m| linear_to_decibels(m)).collect()
    }

    /// Smoothed spectrum as bytes (Web Audio `getByteFrequencyData`)
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        let range_scale = 255.0 / (self.max_decibels - self.min_decibels);
        let min_decibels = self.min_decibels;

        self.float_frequency_data()
            .into_iter()
            .map(|db| {
                let scaled = (range_scale * (db - min_decibels)).floor();
                if scaled.is_nan() {
                    0
                } else {
                    scaled.clamp(0.0, 255.0) as u8
                }
            })
            .collect()
    }

    /// Most recent `fft_size` down-mixed samples, oldest first
    pub fn time_domain_data(&self) -> Vec<f32> {
        let n = self.fft_size;
        (0..n).map(|i| self.history[(self.write + i) % n]).collect()
    }
}

fn linear_to_decibels(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    let alpha = 0.16f64;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5;
    let a2 = 0.5 * alpha;

    (0..size)
        .map(|i| {
            let x = i as f64 / size as f64;
            let w = a0 - a1 * (2.0 * std::f64::consts::PI * x).cos()
                + a2 * (4.0 * std::f64::consts::PI * x).cos();
            w as f32
        })
        .collect()
}
