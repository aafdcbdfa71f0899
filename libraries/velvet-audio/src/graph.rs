//! The processing graph
//!
//! `GraphCore` owns every node of one built graph. It is shared between the
//! control side (the engine's setters) and the render side (the output device
//! callback) behind a mutex; the render side only ever locks it for the length
//! of one buffer.

use crate::nodes::{AnalyserNode, NodeFactory, SmoothedParam};
use crate::settings::DspSettings;
use crate::source::SampleStream;
use crate::stages::{
    AmbienceStage, EqualizerStage, Stage, StereoWidthStage, ToneStage, VocalCutStage,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lock the graph, recovering from a panic on another thread
///
/// A render callback that panicked mid-buffer leaves the nodes in a usable (if
/// glitched) state, so the poison flag is ignored.
pub(crate) fn lock_core(core: &Mutex<GraphCore>) -> MutexGuard<'_, GraphCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct GraphCore {
    generation: u64,
    sample_rate: u32,
    running: bool,
    source: Box<dyn SampleStream>,
    pub(crate) vocal_cut: VocalCutStage,
    pub(crate) tone: ToneStage,
    pub(crate) equalizer: EqualizerStage,
    pub(crate) stereo_width: StereoWidthStage,
    pub(crate) ambience: AmbienceStage,
    pub(crate) analyser: AnalyserNode,
}

impl GraphCore {
    /// Assemble a graph whose parameters start exactly at `settings`
    pub(crate) fn new(
        factory: &NodeFactory,
        settings: &DspSettings,
        source: Box<dyn SampleStream>,
        generation: u64,
    ) -> Self {
        Self {
            generation,
            sample_rate: factory.sample_rate(),
            running: false,
            source,
            vocal_cut: VocalCutStage::new(factory, &settings.vocal_cut),
            tone: ToneStage::new(factory, &settings.tone),
            equalizer: EqualizerStage::new(factory, &settings.equalizer),
            stereo_width: StereoWidthStage::new(factory, &settings.stereo_width),
            ambience: AmbienceStage::new(factory, &settings.ambience),
            analyser: factory.analyser(),
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Stages in signal order
    fn stages_mut(&mut self) -> [&mut dyn Stage; 5] {
        [
            &mut self.vocal_cut,
            &mut self.tone,
            &mut self.equalizer,
            &mut self.stereo_width,
            &mut self.ambience,
        ]
    }

    /// Render one interleaved stereo buffer
    ///
    /// Returns the number of frames taken from the source. Once the source has
    /// ended the stages keep running on silence so reverb tails decay naturally.
    pub(crate) fn render(&mut self, out: &mut [f32]) -> usize {
        if !self.running {
            out.fill(0.0);
            return 0;
        }

        let written = if self.source.is_finished() {
            0
        } else {
            self.source.read(out)
        };
        let len = out.len();
        out[written.min(len)..].fill(0.0);

        for stage in self.stages_mut() {
            stage.process(out);
        }
        self.analyser.capture(out);

        written / 2
    }

    pub(crate) fn snapshot(&self) -> GraphSnapshot {
        let eq_bands = self
            .equalizer
            .bands()
            .iter()
            .map(|band| ParamSnapshot::of(band.gain_db()))
            .collect();

        GraphSnapshot {
            generation: self.generation,
            sample_rate: self.sample_rate,
            running: self.running,
            source_finished: self.source.is_finished(),
            impulse_loaded: self.ambience.has_impulse(),
            stage_order: [
                self.vocal_cut.name(),
                self.tone.name(),
                self.equalizer.name(),
                self.stereo_width.name(),
                self.ambience.name(),
            ],
            vocal_cut_processed: ParamSnapshot::of(self.vocal_cut.processed_gain().gain()),
            vocal_cut_bypass: ParamSnapshot::of(self.vocal_cut.bypass_gain().gain()),
            bass_db: ParamSnapshot::of(self.tone.bass().gain_db()),
            treble_db: ParamSnapshot::of(self.tone.treble().gain_db()),
            eq_bands,
            stereo_delay: ParamSnapshot::of(self.stereo_width.delay().delay_time()),
            ambience_dry: ParamSnapshot::of(self.ambience.dry_gain().gain()),
            ambience_wet: ParamSnapshot::of(self.ambience.wet_gain().gain()),
            pre_delay: ParamSnapshot::of(self.ambience.pre_delay().delay_time()),
            damp: ParamSnapshot::of(self.ambience.damping().frequency()),
        }
    }
}

/// Handle the processing context uses to pull rendered audio
#[derive(Clone)]
pub struct RenderHandle {
    core: Arc<Mutex<GraphCore>>,
}

impl RenderHandle {
    pub(crate) fn new(core: Arc<Mutex<GraphCore>>) -> Self {
        Self { core }
    }

    /// Render interleaved stereo into `out`; returns frames taken from the source
    pub fn render(&self, out: &mut [f32]) -> usize {
        lock_core(&self.core).render(out)
    }
}

/// A parameter's position on its ramp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSnapshot {
    pub current: f32,
    pub target: f32,
}

impl ParamSnapshot {
    fn of(param: &SmoothedParam) -> Self {
        Self {
            current: param.value(),
            target: param.target(),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }
}

/// Read-only view of a built graph
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSnapshot {
    pub generation: u64,
    pub sample_rate: u32,
    pub running: bool,
    pub source_finished: bool,
    pub impulse_loaded: bool,
    pub stage_order: [&'static str; 5],
    pub vocal_cut_processed: ParamSnapshot,
    pub vocal_cut_bypass: ParamSnapshot,
    pub bass_db: ParamSnapshot,
    pub treble_db: ParamSnapshot,
    pub eq_bands: Vec<ParamSnapshot>,
    /// Right-channel delay of the stereo width stage (seconds)
    pub stereo_delay: ParamSnapshot,
    pub ambience_dry: ParamSnapshot,
    pub ambience_wet: ParamSnapshot,
    /// Seconds
    pub pre_delay: ParamSnapshot,
    /// Damping cutoff (Hz)
    pub damp: ParamSnapshot,
}
