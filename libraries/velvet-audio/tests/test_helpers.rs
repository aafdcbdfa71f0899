#![allow(dead_code)]

use std::sync::Once;
use velvet_audio::{AudioEngine, BufferSource, EngineConfig};

static INIT: Once = Once::new();

pub const SAMPLE_RATE: u32 = 44100;

/// Frames rendered per call, like a device callback would request
pub const CHUNK_FRAMES: usize = 512;

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Default config with a short impulse so background generation is quick
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.impulse.duration_secs = 0.05;
    config
}

/// Identical sine on both channels
pub fn center_sine(frequency: f32, seconds: f32, amplitude: f32) -> BufferSource {
    let frames = (seconds * SAMPLE_RATE as f32) as usize;
    let samples = (0..frames)
        .flat_map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            let s = (2.0 * std::f32::consts::PI * frequency * t).sin() * amplitude;
            [s, s]
        })
        .collect();
    BufferSource::stereo("center sine", samples, SAMPLE_RATE)
}

/// Single unit sample on both channels, then silence
pub fn impulse(seconds: f32) -> BufferSource {
    let frames = (seconds * SAMPLE_RATE as f32) as usize;
    let mut samples = vec![0.0; frames * 2];
    samples[0] = 1.0;
    samples[1] = 1.0;
    BufferSource::stereo("impulse", samples, SAMPLE_RATE)
}

/// Render `frames` frames in device-sized chunks
pub fn render_frames(engine: &mut AudioEngine, frames: usize) -> Vec<f32> {
    let mut output = Vec::with_capacity(frames * 2);
    let mut chunk = vec![0.0f32; CHUNK_FRAMES * 2];
    let mut remaining = frames;
    while remaining > 0 {
        let n = remaining.min(CHUNK_FRAMES);
        engine.render(&mut chunk[..n * 2]);
        output.extend_from_slice(&chunk[..n * 2]);
        remaining -= n;
    }
    output
}

pub fn left(buffer: &[f32]) -> Vec<f32> {
    buffer.iter().step_by(2).copied().collect()
}

pub fn right(buffer: &[f32]) -> Vec<f32> {
    buffer.iter().skip(1).step_by(2).copied().collect()
}

pub fn peak(buffer: &[f32]) -> f32 {
    buffer.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

pub fn rms(buffer: &[f32]) -> f32 {
    if buffer.is_empty() {
        return 0.0;
    }
    (buffer.iter().map(|s| s * s).sum::<f32>() / buffer.len() as f32).sqrt()
}

/// Index of the loudest sample
pub fn argmax_abs(buffer: &[f32]) -> usize {
    buffer
        .iter()
        .enumerate()
        .fold((0, 0.0f32), |(best, best_abs), (i, s)| {
            if s.abs() > best_abs {
                (i, s.abs())
            } else {
                (best, best_abs)
            }
        })
        .0
}
