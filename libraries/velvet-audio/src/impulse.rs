//! Reverb impulse responses
//!
//! The ambience stage convolves with a synthetic tail: white noise shaped by a
//! `(1 - i/len)^decay` envelope, independent per channel. Generating it and
//! transforming it into convolution partitions happens off the control path in
//! an [`ImpulseJob`]; the result is only installed if the graph it was built
//! for is still the live one.

use crate::config::ImpulseSettings;
use crate::error::{AudioError, Result};
use crate::graph::{lock_core, GraphCore};
use crate::nodes::ConvolutionKernel;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, warn};

/// Multi-channel impulse response
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl ImpulseResponse {
    /// Wrap per-channel samples (one or two channels of equal, non-zero length)
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if channels.is_empty() || channels.len() > 2 {
            return Err(AudioError::InvalidParameter {
                parameter: "impulse response channels",
                value: channels.len() as f32,
            });
        }
        let len = channels[0].len();
        if len == 0 || channels.iter().any(|c| c.len() != len) {
            return Err(AudioError::InvalidParameter {
                parameter: "impulse response length",
                value: len as f32,
            });
        }

        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Stereo decaying noise using the thread-local RNG
    pub fn generate(sample_rate: u32, duration_secs: f32, decay: f32) -> Self {
        Self::generate_with_rng(&mut rand::thread_rng(), sample_rate, duration_secs, decay)
    }

    /// Stereo decaying noise from `rng`
    pub fn generate_with_rng<R: Rng>(
        rng: &mut R,
        sample_rate: u32,
        duration_secs: f32,
        decay: f32,
    ) -> Self {
        let len = ((sample_rate as f32 * duration_secs) as usize).max(1);

        let mut generate = || -> Vec<f32> {
            (0..len)
                .map(|i| {
                    let envelope = (1.0 - i as f32 / len as f32).powf(decay);
                    (rng.gen::<f32>() * 2.0 - 1.0) * envelope
                })
                .collect()
        };
        let left = generate();
        let right = generate();

        Self {
            channels: vec![left, right],
            sample_rate,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Length in frames
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Background generation of the ambience impulse for one graph generation
pub(crate) struct ImpulseJob {
    generation: u64,
    live_generation: Arc<AtomicU64>,
    target: Weak<Mutex<GraphCore>>,
    sample_rate: u32,
    settings: ImpulseSettings,
    block_size: usize,
}

impl ImpulseJob {
    pub(crate) fn new(
        generation: u64,
        live_generation: Arc<AtomicU64>,
        target: Weak<Mutex<GraphCore>>,
        sample_rate: u32,
        settings: ImpulseSettings,
        block_size: usize,
    ) -> Self {
        Self {
            generation,
            live_generation,
            target,
            sample_rate,
            settings,
            block_size,
        }
    }

    /// Run on the tokio blocking pool when inside a runtime, else a named thread
    pub(crate) fn spawn(self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || self.run());
            }
            Err(_) => {
                let spawned = std::thread::Builder::new()
                    .name("impulse-response".to_string())
                    .spawn(move || self.run());
                if let Err(e) = spawned {
                    warn!("Failed to start impulse response thread: {}", e);
                }
            }
        }
    }

    fn run(self) {
        let ir = ImpulseResponse::generate(
            self.sample_rate,
            self.settings.duration_secs,
            self.settings.decay,
        );
        let kernel = ConvolutionKernel::prepare(&ir, self.block_size);
        self.deliver(kernel);
    }

    /// Install `kernel` if this job's graph is still live; returns whether it was
    pub(crate) fn deliver(&self, kernel: ConvolutionKernel) -> bool {
        if self.live_generation.load(Ordering::Acquire) != self.generation {
            debug!(
                "Discarding impulse response for stale graph generation {}",
                self.generation
            );
            return false;
        }

        let Some(core) = self.target.upgrade() else {
            debug!(
                "Discarding impulse response: graph generation {} already released",
                self.generation
            );
            return false;
        };

        let mut core = lock_core(&core);
        if core.generation() != self.generation {
            debug!(
                "Discarding impulse response: graph is generation {}, job was {}",
                core.generation(),
                self.generation
            );
            return false;
        }
        // Teardown bumps the live generation before it takes this lock
        if self.live_generation.load(Ordering::Acquire) != self.generation {
            debug!(
                "Discarding impulse response: graph generation {} torn down",
                self.generation
            );
            return false;
        }

        debug!(
            "Impulse response ready: {} frames in {} partitions (generation {})",
            kernel.frames(),
            kernel.partition_count(),
            self.generation
        );
        let previous = core.ambience.set_impulse(kernel);
        drop(core);
        drop(previous);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn synthetic_tail_has_expected_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let ir = ImpulseResponse::generate_with_rng(&mut rng, 44100, 2.0, 2.0);

        assert_eq!(ir.channel_count(), 2);
        assert_eq!(ir.len(), 88200);
        assert!(ir
            .channels()
            .iter()
            .flatten()
            .all(|&s| (-1.0..=1.0).contains(&s)));
        assert_ne!(ir.channel(0), ir.channel(1));

        // Energy decays: the first tenth is much louder than the last tenth
        let energy = |samples: &[f32]| samples.iter().map(|s| s * s).sum::<f32>();
        let tenth = ir.len() / 10;
        let head = energy(&ir.channel(0)[..tenth]);
        let tail = energy(&ir.channel(0)[ir.len() - tenth..]);
        assert!(head > tail * 100.0);
    }

    #[test]
    fn rejects_malformed_responses() {
        assert!(ImpulseResponse::new(vec![], 44100).is_err());
        assert!(ImpulseResponse::new(vec![vec![1.0], vec![1.0, 2.0]], 44100).is_err());
        assert!(ImpulseResponse::new(vec![vec![]], 44100).is_err());
        assert!(ImpulseResponse::new(vec![vec![0.0]; 3], 44100).is_err());
    }

    #[test]
    fn delivery_after_teardown_is_discarded() {
        let live_generation = Arc::new(AtomicU64::new(1));
        let job = ImpulseJob::new(
            1,
            Arc::clone(&live_generation),
            Weak::new(),
            44100,
            ImpulseSettings::default(),
            64,
        );
        let ir = ImpulseResponse::new(vec![vec![1.0]], 44100).unwrap();

        // Graph already released
        assert!(!job.deliver(ConvolutionKernel::prepare(&ir, 64)));

        // Generation moved on
        live_generation.store(2, Ordering::Release);
        assert!(!job.deliver(ConvolutionKernel::prepare(&ir, 64)));
    }

    fn live_core(generation: u64) -> Arc<Mutex<GraphCore>> {
        use crate::config::EngineConfig;
        use crate::nodes::NodeFactory;
        use crate::settings::DspSettings;
        use crate::source::{BufferSource, SourceHandle};

        let factory = NodeFactory::new(44100, &EngineConfig::default()).unwrap();
        let stream = BufferSource::stereo("test", vec![0.0; 64], 44100)
            .open(44100)
            .unwrap();
        Arc::new(Mutex::new(GraphCore::new(
            &factory,
            &DspSettings::default(),
            stream,
            generation,
        )))
    }

    #[test]
    fn delivery_installs_into_the_live_graph() {
        let core = live_core(3);
        let job = ImpulseJob::new(
            3,
            Arc::new(AtomicU64::new(3)),
            Arc::downgrade(&core),
            44100,
            ImpulseSettings::default(),
            512,
        );
        let ir = ImpulseResponse::new(vec![vec![1.0]], 44100).unwrap();

        assert!(job.deliver(ConvolutionKernel::prepare(&ir, 512)));
        assert!(lock_core(&core).ambience.has_impulse());
    }

    #[test]
    fn teardown_while_delivery_waits_on_the_lock() {
        let core = live_core(3);
        let live_generation = Arc::new(AtomicU64::new(3));
        let job = ImpulseJob::new(
            3,
            Arc::clone(&live_generation),
            Arc::downgrade(&core),
            44100,
            ImpulseSettings::default(),
            512,
        );
        let ir = ImpulseResponse::new(vec![vec![1.0]], 44100).unwrap();
        let kernel = ConvolutionKernel::prepare(&ir, 512);

        // Hold the lock the way teardown does, and retire the generation
        // after the job has passed its first check
        let guard = lock_core(&core);
        let delivery = std::thread::spawn(move || job.deliver(kernel));
        std::thread::sleep(std::time::Duration::from_millis(50));
        live_generation.store(4, Ordering::Release);
        drop(guard);

        assert!(!delivery.join().unwrap());
        assert!(!lock_core(&core).ambience.has_impulse());
    }
}
