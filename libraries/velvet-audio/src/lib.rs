//! Velvet Player Audio
//!
//! Real-time DSP graph for Velvet Player.
//!
//! This crate provides:
//! - A fixed processing chain: vocal cut, bass/treble tone, 10-band EQ,
//!   stereo width (Haas delay), convolution ambience, analysis tap
//! - Click-free parameter changes through per-sample smoothed parameters
//! - An engine that builds, resumes, and tears down graphs while keeping the
//!   listener's settings across tracks
//! - An offline backend for tests and export, and a cpal backend behind the
//!   `desktop` feature
//!
//! # Example: Rendering Offline
//!
//! ```rust
//! use velvet_audio::{AudioEngine, BufferSource, OfflineBackend};
//!
//! # async fn example() -> velvet_audio::Result<()> {
//! let mut engine = AudioEngine::new(OfflineBackend::new(44100));
//! engine.set_bass_gain(6.0)?;
//! engine.set_stereo_width(0.5)?;
//!
//! let track = BufferSource::stereo("tone", vec![0.25; 44100 * 2], 44100);
//! engine.build_graph(&track)?;
//! engine.ensure_running().await?;
//!
//! let mut buffer = vec![0.0f32; 1024];
//! let frames = engine.render(&mut buffer);
//! assert_eq!(frames, 512);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
#[cfg(feature = "desktop")]
pub mod desktop;
pub mod engine;
mod error;
pub mod graph;
pub mod impulse;
pub mod nodes;
pub mod presets;
pub mod settings;
pub mod source;
pub mod stages;

pub use config::EngineConfig;
pub use context::{AudioBackend, BackendProbe, ContextState, OfflineBackend, ProcessingContext};
#[cfg(feature = "desktop")]
pub use desktop::CpalBackend;
pub use engine::{AudioEngine, EngineState};
pub use error::{AudioError, Result};
pub use graph::{GraphSnapshot, ParamSnapshot, RenderHandle};
pub use impulse::ImpulseResponse;
pub use presets::{
    builtin_ambience_presets, builtin_eq_presets, AmbiencePreset, EqPreset, PresetLibrary,
};
pub use settings::DspSettings;
pub use source::{BufferSource, SampleStream, SourceHandle};
