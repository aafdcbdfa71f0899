//! Processing nodes
//!
//! The building blocks stages are assembled from. Every node processes audio in
//! place on the render thread and never allocates once constructed (the
//! analyser's spectrum read is the exception, and it runs on a caller thread).

pub mod analyser;
pub mod biquad;
pub mod convolver;
pub mod delay;
pub mod factory;
pub mod gain;
pub mod param;

pub use analyser::AnalyserNode;
pub use biquad::{BiquadNode, FilterKind};
pub use convolver::{ConvolutionKernel, ConvolverNode};
pub use delay::DelayNode;
pub use factory::{
    NodeFactory, BASS_FREQUENCY, DAMP_MAX_HZ, DAMP_MIN_HZ, EQ_BAND_COUNT, EQ_FREQUENCIES,
    EQ_GAIN_LIMIT_DB, EQ_Q, PRE_DELAY_MAX_SECS, STEREO_DELAY_MAX_SECS, TREBLE_FREQUENCY,
};
pub use gain::GainNode;
pub use param::SmoothedParam;
