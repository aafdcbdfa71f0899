//! Audio sources feeding the processing graph
//!
//! A [`SourceHandle`] is whatever the player hands the engine (a decoded track,
//! a stream); opening it against a context's sample rate yields the
//! [`SampleStream`] the render thread pulls from.

use crate::error::{AudioError, Result};
use std::sync::Arc;

/// Something that can be adapted into a graph input
pub trait SourceHandle: Send + Sync {
    /// Human-readable name for logs
    fn label(&self) -> &str;

    /// Open a stream producing interleaved stereo at `sample_rate`
    ///
    /// Fails with [`AudioError::SourceUnsupported`] if the source cannot be
    /// delivered in that shape.
    fn open(&self, sample_rate: u32) -> Result<Box<dyn SampleStream>>;
}

/// Interleaved stereo sample stream pulled by the render thread
pub trait SampleStream: Send {
    /// Fill `out` with interleaved stereo samples
    ///
    /// Returns the number of samples written; anything short of `out.len()`
    /// means the stream has ended.
    fn read(&mut self, out: &mut [f32]) -> usize;

    fn is_finished(&self) -> bool;
}

/// In-memory source backed by decoded samples
#[derive(Debug, Clone)]
pub struct BufferSource {
    label: String,
    samples: Arc<[f32]>,
    channels: usize,
    sample_rate: u32,
}

impl BufferSource {
    /// Wrap interleaved samples with `channels` channels at `sample_rate`
    pub fn new(
        label: impl Into<String>,
        samples: Vec<f32>,
        channels: usize,
        sample_rate: u32,
    ) -> Self {
        Self {
            label: label.into(),
            samples: samples.into(),
            channels,
            sample_rate,
        }
    }

    pub fn stereo(label: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(label, samples, 2, sample_rate)
    }

    pub fn mono(label: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(label, samples, 1, sample_rate)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in frames
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }
}

impl SourceHandle for BufferSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn open(&self, sample_rate: u32) -> Result<Box<dyn SampleStream>> {
        if !(1..=2).contains(&self.channels) {
            return Err(AudioError::SourceUnsupported(format!(
                "{}: {} channels (only mono and stereo are supported)",
                self.label, self.channels
            )));
        }
        if self.samples.is_empty() {
            return Err(AudioError::SourceUnsupported(format!(
                "{}: no samples",
                self.label
            )));
        }
        if self.samples.len() % self.channels != 0 {
            return Err(AudioError::SourceUnsupported(format!(
                "{}: {} samples is not a whole number of {}-channel frames",
                self.label,
                self.samples.len(),
                self.channels
            )));
        }
        if self.sample_rate != sample_rate {
            return Err(AudioError::SourceUnsupported(format!(
                "{}: recorded at {} Hz, context runs at {} Hz",
                self.label, self.sample_rate, sample_rate
            )));
        }

        Ok(Box::new(BufferStream {
            samples: Arc::clone(&self.samples),
            channels: self.channels,
            frame: 0,
        }))
    }
}

struct BufferStream {
    samples: Arc<[f32]>,
    channels: usize,
    frame: usize,
}

impl SampleStream for BufferStream {
    fn read(&mut self, out: &mut [f32]) -> usize {
        let total = self.samples.len() / self.channels;
        let frames = (out.len() / 2).min(total - self.frame);

        for (i, frame) in out.chunks_exact_mut(2).take(frames).enumerate() {
            let index = (self.frame + i) * self.channels;
            if self.channels == 1 {
                frame[0] = self.samples[index];
                frame[1] = self.samples[index];
            } else {
                frame[0] = self.samples[index];
                frame[1] = self.samples[index + 1];
            }
        }

        self.frame += frames;
        frames * 2
    }

    fn is_finished(&self) -> bool {
        self.frame * self.channels >= self.samples.len()
    }
}
