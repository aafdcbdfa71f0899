//! Audio engine: graph lifecycle and control API
//!
//! `AudioEngine` owns the user's DSP settings, the backend that creates
//! processing contexts, and (while a track is loaded) one built graph. Setters
//! validate their input, record it in the settings, then retarget the live
//! graph's parameters under a single lock. Settings survive rebuilds, so a new
//! graph always starts where the listener left off.
//!
//! ```text
//! Uninitialized --build_graph--> Built --ensure_running--> Running
//!       ^                          |                          |
//!       +---- build failure        +--------teardown----------+--> TornDown
//! ```

use crate::config::EngineConfig;
use crate::context::{AudioBackend, ContextState, ProcessingContext};
use crate::error::{AudioError, Result};
use crate::graph::{lock_core, GraphCore, GraphSnapshot, RenderHandle};
use crate::impulse::ImpulseJob;
use crate::nodes::{
    NodeFactory, DAMP_MAX_HZ, DAMP_MIN_HZ, EQ_BAND_COUNT, EQ_GAIN_LIMIT_DB, PRE_DELAY_MAX_SECS,
};
use crate::presets::{AmbiencePreset, EqPreset};
use crate::settings::{AmbienceState, DspSettings};
use crate::source::SourceHandle;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Lifecycle state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No graph has been built (or the last build failed)
    Uninitialized,
    /// Graph built; context not yet running
    Built,
    /// Context running; audio flows through the graph
    Running,
    /// Graph released; a new build may follow
    TornDown,
}

struct LiveGraph {
    context: Box<dyn ProcessingContext>,
    core: Arc<Mutex<GraphCore>>,
    source_label: String,
}

/// Owner of the DSP settings and the live graph, if any
pub struct AudioEngine {
    backend: Box<dyn AudioBackend>,
    config: EngineConfig,
    settings: DspSettings,
    graph: Option<LiveGraph>,
    state: EngineState,
    generation: u64,
    live_generation: Arc<AtomicU64>,
    resume_failures: u32,
}

/// Reject NaN and infinities before they reach a parameter
fn finite(parameter: &'static str, value: f32) -> Result<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        warn!("Rejected non-finite value for {}: {}", parameter, value);
        Err(AudioError::InvalidParameter { parameter, value })
    }
}

impl AudioEngine {
    pub fn new(backend: impl AudioBackend + 'static) -> Self {
        Self::with_config(backend, EngineConfig::default())
    }

    pub fn with_config(backend: impl AudioBackend + 'static, config: EngineConfig) -> Self {
        Self {
            backend: Box::new(backend),
            config,
            settings: DspSettings::default(),
            graph: None,
            state: EngineState::Uninitialized,
            generation: 0,
            live_generation: Arc::new(AtomicU64::new(0)),
            resume_failures: 0,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn settings(&self) -> &DspSettings {
        &self.settings
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `f` against the live graph, if any, under one lock
    fn with_graph(&self, f: impl FnOnce(&mut GraphCore)) {
        if let Some(live) = &self.graph {
            let mut core = lock_core(&live.core);
            f(&mut core);
        }
    }

    fn read_graph<T>(&self, f: impl FnOnce(&mut GraphCore) -> T) -> Option<T> {
        self.graph.as_ref().map(|live| {
            let mut core = lock_core(&live.core);
            f(&mut core)
        })
    }

    // ===== Lifecycle =====

    /// Build a fresh graph for `source`, replacing any existing one
    ///
    /// Every parameter starts exactly at the persisted settings. On failure the
    /// engine is left `Uninitialized` with no context held.
    pub fn build_graph(&mut self, source: &dyn SourceHandle) -> Result<()> {
        if self.graph.is_some() {
            self.teardown();
        }

        let mut context = match self.backend.create_context() {
            Ok(context) => context,
            Err(e) => {
                error!("Failed to create processing context: {}", e);
                self.state = EngineState::Uninitialized;
                return Err(e);
            }
        };

        let generation = self.generation + 1;
        let core = match self.assemble(context.as_mut(), source, generation) {
            Ok(core) => core,
            Err(e) => {
                error!("Failed to build graph for {}: {}", source.label(), e);
                context.close();
                self.state = EngineState::Uninitialized;
                return Err(e);
            }
        };

        self.generation = generation;
        self.live_generation.store(generation, Ordering::Release);
        self.resume_failures = 0;

        ImpulseJob::new(
            generation,
            Arc::clone(&self.live_generation),
            Arc::downgrade(&core),
            context.sample_rate(),
            self.config.impulse.clone(),
            self.config.convolution.block_size,
        )
        .spawn();

        info!(
            "Built graph {} for {} at {} Hz on {}",
            generation,
            source.label(),
            context.sample_rate(),
            self.backend.name()
        );

        self.graph = Some(LiveGraph {
            context,
            core,
            source_label: source.label().to_string(),
        });
        self.state = EngineState::Built;
        Ok(())
    }

    fn assemble(
        &self,
        context: &mut dyn ProcessingContext,
        source: &dyn SourceHandle,
        generation: u64,
    ) -> Result<Arc<Mutex<GraphCore>>> {
        let factory = NodeFactory::new(context.sample_rate(), &self.config)?;
        let stream = source.open(factory.sample_rate())?;

        let core = Arc::new(Mutex::new(GraphCore::new(
            &factory,
            &self.settings,
            stream,
            generation,
        )));
        context.connect(RenderHandle::new(Arc::clone(&core)))?;
        Ok(core)
    }

    /// Make sure the context is running; call from a user gesture
    ///
    /// A no-op without a graph. A refused resume is reported as
    /// [`AudioError::TransientSuspension`] and counted toward
    /// [`needs_user_interaction`](Self::needs_user_interaction).
    pub async fn ensure_running(&mut self) -> Result<()> {
        let Some(live) = self.graph.as_mut() else {
            debug!("ensure_running called without a graph");
            return Ok(());
        };

        if live.context.state() != ContextState::Running {
            if let Err(e) = live.context.resume().await {
                self.resume_failures += 1;
                warn!(
                    "Failed to resume output ({} consecutive failures): {}",
                    self.resume_failures, e
                );
                return Err(e);
            }
            info!("Output resumed for {}", live.source_label);
        }

        lock_core(&live.core).set_running(true);
        self.resume_failures = 0;
        self.state = EngineState::Running;
        Ok(())
    }

    /// Whether silent resume retries are exhausted and the UI should prompt
    pub fn needs_user_interaction(&self) -> bool {
        self.resume_failures >= self.config.resume.silent_retry_limit
    }

    /// Release the graph and its context; safe to call repeatedly
    pub fn teardown(&mut self) {
        self.generation += 1;
        self.live_generation.store(self.generation, Ordering::Release);

        if let Some(mut live) = self.graph.take() {
            lock_core(&live.core).set_running(false);
            live.context.close();
            info!("Tore down graph for {}", live.source_label);
            self.state = EngineState::TornDown;
        }
    }

    /// Built, running, and the context agrees
    pub fn is_ready(&self) -> bool {
        self.state == EngineState::Running
            && self
                .graph
                .as_ref()
                .is_some_and(|live| live.context.state() == ContextState::Running)
    }

    /// Sample rate of the running output, if any
    pub fn current_output_sample_rate(&self) -> Option<u32> {
        if self.is_ready() {
            self.graph.as_ref().map(|live| live.context.sample_rate())
        } else {
            None
        }
    }

    /// Render interleaved stereo for device-less contexts
    ///
    /// Fills `out` with silence (and returns 0) when there is no running graph
    /// or the context is driven by its own device callback.
    pub fn render(&mut self, out: &mut [f32]) -> usize {
        if let Some(live) = self.graph.as_mut() {
            if let Some(frames) = live.context.pull(out) {
                return frames;
            }
        }
        out.fill(0.0);
        0
    }

    // ===== Introspection =====

    pub fn snapshot(&self) -> Option<GraphSnapshot> {
        self.read_graph(|core| core.snapshot())
    }

    /// Visualizer bytes, one per frequency bin
    pub fn frequency_data(&self) -> Option<Vec<u8>> {
        self.read_graph(|core| core.analyser.byte_frequency_data())
    }

    /// Whether the ambience impulse has been delivered to the live graph
    pub fn impulse_loaded(&self) -> bool {
        self.read_graph(|core| core.ambience.has_impulse()).unwrap_or(false)
    }

    // ===== Equalizer =====

    /// Set one band's gain (clamped to ±15 dB)
    pub fn set_eq_band_gain(&mut self, index: usize, gain_db: f32) -> Result<()> {
        if index >= EQ_BAND_COUNT {
            warn!("Rejected EQ band index {}", index);
            return Err(AudioError::InvalidBandIndex {
                index,
                count: EQ_BAND_COUNT,
            });
        }
        let gain_db = finite("eq band gain", gain_db)?.clamp(-EQ_GAIN_LIMIT_DB, EQ_GAIN_LIMIT_DB);

        self.settings.equalizer.gains[index] = gain_db;
        self.with_graph(|core| {
            core.equalizer.set_band_gain(index, gain_db);
        });
        debug!("EQ band {} -> {} dB", index, gain_db);
        Ok(())
    }

    /// Apply ten band gains at once
    pub fn apply_eq_preset(&mut self, gains: &[f32]) -> Result<()> {
        if gains.len() != EQ_BAND_COUNT {
            warn!(
                "Rejected EQ preset with {} gains (expected {})",
                gains.len(),
                EQ_BAND_COUNT
            );
            return Err(AudioError::PresetLength {
                expected: EQ_BAND_COUNT,
                actual: gains.len(),
            });
        }

        let mut clamped = [0.0; EQ_BAND_COUNT];
        for (slot, &gain) in clamped.iter_mut().zip(gains) {
            *slot = finite("eq band gain", gain)?.clamp(-EQ_GAIN_LIMIT_DB, EQ_GAIN_LIMIT_DB);
        }

        self.settings.equalizer.gains = clamped;
        self.with_graph(|core| core.equalizer.set_gains(&clamped));
        debug!("EQ preset applied: {:?}", clamped);
        Ok(())
    }

    pub fn apply_named_eq_preset(&mut self, preset: &EqPreset) -> Result<()> {
        debug!("Applying EQ preset '{}'", preset.name);
        self.apply_eq_preset(&preset.gains)
    }

    pub fn reset_eq(&mut self) -> Result<()> {
        self.apply_eq_preset(&[0.0; EQ_BAND_COUNT])
    }

    // ===== Tone =====

    pub fn set_bass_gain(&mut self, gain_db: f32) -> Result<()> {
        let gain_db = finite("bass gain", gain_db)?;
        self.settings.tone.bass_db = gain_db;
        self.with_graph(|core| core.tone.set_bass(gain_db));
        debug!("Bass -> {} dB", gain_db);
        Ok(())
    }

    pub fn set_treble_gain(&mut self, gain_db: f32) -> Result<()> {
        let gain_db = finite("treble gain", gain_db)?;
        self.settings.tone.treble_db = gain_db;
        self.with_graph(|core| core.tone.set_treble(gain_db));
        debug!("Treble -> {} dB", gain_db);
        Ok(())
    }

    /// Flatten bass and treble and collapse stereo width to zero
    pub fn reset_tone(&mut self) -> Result<()> {
        self.settings.tone = Default::default();
        self.settings.stereo_width.width = 0.0;
        self.with_graph(|core| {
            core.tone.set_bass(0.0);
            core.tone.set_treble(0.0);
            core.stereo_width.set_delay(0.0);
        });
        debug!("Tone reset");
        Ok(())
    }

    // ===== Stereo width =====

    /// Set stereo width in `[0, 1]` (right channel delayed up to 30 ms)
    pub fn set_stereo_width(&mut self, width: f32) -> Result<()> {
        let width = finite("stereo width", width)?.clamp(0.0, 1.0);
        self.settings.stereo_width.width = width;
        let delay = self.settings.stereo_width.delay_secs();
        self.with_graph(|core| core.stereo_width.set_delay(delay));
        debug!("Stereo width -> {} ({} s delay)", width, delay);
        Ok(())
    }

    // ===== Ambience =====

    /// Wet proportion in `[0, 1]`; dry follows as `1 - mix`
    pub fn set_reverb_mix(&mut self, mix: f32) -> Result<()> {
        let mix = finite("reverb mix", mix)?.clamp(0.0, 1.0);
        self.settings.ambience.mix = mix;
        self.with_graph(|core| core.ambience.set_mix(mix));
        debug!("Reverb mix -> {}", mix);
        Ok(())
    }

    /// Pre-delay in seconds, `[0, 1]`
    pub fn set_reverb_pre_delay(&mut self, seconds: f32) -> Result<()> {
        let seconds = finite("reverb pre-delay", seconds)?.clamp(0.0, PRE_DELAY_MAX_SECS);
        self.settings.ambience.pre_delay = seconds;
        self.with_graph(|core| core.ambience.set_pre_delay(seconds));
        debug!("Reverb pre-delay -> {} s", seconds);
        Ok(())
    }

    /// Damping cutoff in Hz, `[10, 22050]`
    pub fn set_reverb_damp(&mut self, frequency: f32) -> Result<()> {
        let frequency = finite("reverb damp", frequency)?.clamp(DAMP_MIN_HZ, DAMP_MAX_HZ);
        self.settings.ambience.damp = frequency;
        self.with_graph(|core| core.ambience.set_damp(frequency));
        debug!("Reverb damp -> {} Hz", frequency);
        Ok(())
    }

    fn apply_ambience(&mut self, state: AmbienceState) -> Result<()> {
        let state = AmbienceState {
            mix: finite("reverb mix", state.mix)?.clamp(0.0, 1.0),
            pre_delay: finite("reverb pre-delay", state.pre_delay)?
                .clamp(0.0, PRE_DELAY_MAX_SECS),
            damp: finite("reverb damp", state.damp)?.clamp(DAMP_MIN_HZ, DAMP_MAX_HZ),
        };

        self.settings.ambience = state;
        self.with_graph(|core| core.ambience.apply(&state));
        Ok(())
    }

    /// Dry only: mix 0, no pre-delay, damping fully open
    pub fn reset_ambience(&mut self) -> Result<()> {
        self.apply_ambience(AmbienceState::default())?;
        debug!("Ambience reset");
        Ok(())
    }

    pub fn apply_ambience_preset(&mut self, preset: &AmbiencePreset) -> Result<()> {
        self.apply_ambience(preset.state())?;
        debug!("Ambience preset '{}' applied", preset.name);
        Ok(())
    }

    // ===== Vocal cut =====

    pub fn set_vocal_cut(&mut self, enabled: bool) -> Result<()> {
        self.settings.vocal_cut.enabled = enabled;
        self.with_graph(|core| core.vocal_cut.set_enabled(enabled));
        debug!("Vocal cut {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OfflineBackend;
    use crate::source::BufferSource;

    fn test_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.impulse.duration_secs = 0.05;
        config
    }

    fn clip() -> BufferSource {
        BufferSource::stereo("clip", vec![0.1; 44100], 44100)
    }

    #[test]
    fn setters_work_without_a_graph() {
        let mut engine = AudioEngine::new(OfflineBackend::new(44100));
        engine.set_eq_band_gain(3, 20.0).unwrap();
        engine.set_stereo_width(-0.5).unwrap();
        engine.set_reverb_damp(5.0).unwrap();

        assert_eq!(engine.settings().equalizer.gains[3], 15.0);
        assert_eq!(engine.settings().stereo_width.width, 0.0);
        assert_eq!(engine.settings().ambience.damp, 10.0);
        assert!(engine.snapshot().is_none());
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn non_finite_values_change_nothing() {
        let mut engine = AudioEngine::new(OfflineBackend::new(44100));
        let before = *engine.settings();

        assert!(engine.set_bass_gain(f32::NAN).is_err());
        assert!(engine.set_reverb_mix(f32::INFINITY).is_err());
        let mut gains = [0.0; EQ_BAND_COUNT];
        gains[9] = f32::NAN;
        assert!(engine.apply_eq_preset(&gains).is_err());

        assert_eq!(*engine.settings(), before);
    }

    #[test]
    fn build_then_teardown_moves_through_states() {
        let backend = OfflineBackend::new(44100);
        let probe = backend.probe();
        let mut engine = AudioEngine::with_config(backend, test_config());

        engine.build_graph(&clip()).unwrap();
        assert_eq!(engine.state(), EngineState::Built);
        assert!(!engine.is_ready());
        assert_eq!(probe.live_contexts(), 1);

        engine.teardown();
        engine.teardown();
        assert_eq!(engine.state(), EngineState::TornDown);
        assert_eq!(probe.live_contexts(), 0);
    }

    #[test]
    fn rebuild_replaces_the_context() {
        let backend = OfflineBackend::new(44100);
        let probe = backend.probe();
        let mut engine = AudioEngine::with_config(backend, test_config());

        engine.build_graph(&clip()).unwrap();
        let first = engine.snapshot().unwrap().generation;
        engine.build_graph(&clip()).unwrap();
        let second = engine.snapshot().unwrap().generation;

        assert!(second > first);
        assert_eq!(probe.contexts_created(), 2);
        assert_eq!(probe.live_contexts(), 1);
    }

    #[test]
    fn dropping_the_engine_releases_the_context() {
        let backend = OfflineBackend::new(44100);
        let probe = backend.probe();
        {
            let mut engine = AudioEngine::with_config(backend, test_config());
            engine.build_graph(&clip()).unwrap();
        }
        assert_eq!(probe.live_contexts(), 0);
    }
}
