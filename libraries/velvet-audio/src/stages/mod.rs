//! Processing stages
//!
//! Each stage owns the nodes for one part of the signal path and exposes typed
//! setters that retarget their parameters. Stages run in a fixed order:
//!
//! ```text
//! source -> vocal cut -> tone -> equalizer -> stereo width -> ambience -> analysis -> output
//! ```

mod ambience;
mod equalizer;
mod stereo_width;
mod tone;
mod vocal_cut;

pub use ambience::AmbienceStage;
pub use equalizer::EqualizerStage;
pub use stereo_width::StereoWidthStage;
pub use tone::ToneStage;
pub use vocal_cut::VocalCutStage;

/// A stage in the processing graph
///
/// # Real-time constraints
/// `process` runs on the render thread under the graph lock: no allocation, no
/// blocking, no I/O.
pub trait Stage: Send {
    /// Process an interleaved stereo buffer (L, R, L, R, ...) in place
    fn process(&mut self, buffer: &mut [f32]);

    /// Stage name (for logging and snapshots)
    fn name(&self) -> &'static str;
}
