//! Property-based tests for the processing graph
//!
//! These tests use proptest to check invariants across random settings and input.

mod test_helpers;

use proptest::prelude::*;
use test_helpers::*;
use velvet_audio::{AudioEngine, BufferSource, EngineConfig, OfflineBackend};

fn all_finite(buffer: &[f32]) -> bool {
    buffer.iter().all(|s| s.is_finite())
}

/// Build and start a graph without an async runtime
fn start(engine: &mut AudioEngine, source: &BufferSource) {
    engine.build_graph(source).unwrap();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    runtime.block_on(engine.ensure_running()).unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: no combination of settings produces NaN or Inf
    #[test]
    fn graph_never_produces_nan_or_inf(
        gains in prop::array::uniform10(-20.0f32..20.0),
        bass in -20.0f32..20.0,
        treble in -20.0f32..20.0,
        width in -0.5f32..1.5,
        mix in 0.0f32..1.0,
        pre_delay in 0.0f32..1.0,
        damp in 0.0f32..30000.0,
        vocal_cut in any::<bool>(),
        samples in prop::collection::vec(-1.0f32..1.0, 256..2048),
    ) {
        let mut engine = AudioEngine::with_config(OfflineBackend::new(SAMPLE_RATE), test_config());
        engine.apply_eq_preset(&gains).unwrap();
        engine.set_bass_gain(bass).unwrap();
        engine.set_treble_gain(treble).unwrap();
        engine.set_stereo_width(width).unwrap();
        engine.set_reverb_mix(mix).unwrap();
        engine.set_reverb_pre_delay(pre_delay).unwrap();
        engine.set_reverb_damp(damp).unwrap();
        engine.set_vocal_cut(vocal_cut).unwrap();

        let mut samples = samples;
        samples.truncate(samples.len() & !1);
        start(&mut engine, &BufferSource::stereo("noise", samples, SAMPLE_RATE));

        let output = render_frames(&mut engine, 4096);
        prop_assert!(all_finite(&output), "graph produced NaN or Inf");
    }

    /// Property: stored settings always sit inside their documented ranges
    #[test]
    fn settings_are_always_clamped(
        band in 0usize..10,
        gain in -100.0f32..100.0,
        width in -10.0f32..10.0,
        mix in -10.0f32..10.0,
        damp in -1000.0f32..100000.0,
    ) {
        let mut engine = AudioEngine::new(OfflineBackend::new(SAMPLE_RATE));
        engine.set_eq_band_gain(band, gain).unwrap();
        engine.set_stereo_width(width).unwrap();
        engine.set_reverb_mix(mix).unwrap();
        engine.set_reverb_damp(damp).unwrap();

        let settings = engine.settings();
        prop_assert!(settings.equalizer.gains[band].abs() <= 15.0);
        prop_assert!((0.0..=1.0).contains(&settings.stereo_width.width));
        prop_assert!((0.0..=1.0).contains(&settings.ambience.mix));
        prop_assert!((10.0..=22050.0).contains(&settings.ambience.damp));
    }

    /// Property: neutral settings pass audio through unchanged
    #[test]
    fn neutral_graph_is_transparent(
        samples in prop::collection::vec(-1.0f32..1.0, 64..1024),
    ) {
        let mut engine = AudioEngine::with_config(OfflineBackend::new(SAMPLE_RATE), test_config());
        let mut samples = samples;
        samples.truncate(samples.len() & !1);
        let frames = samples.len() / 2;
        start(&mut engine, &BufferSource::stereo("noise", samples.clone(), SAMPLE_RATE));

        let output = render_frames(&mut engine, frames);
        for (out, input) in output.iter().zip(&samples) {
            prop_assert!((out - input).abs() < 1e-5, "{} != {}", out, input);
        }
    }
}

#[test]
fn config_default_is_valid() {
    EngineConfig::default().validate().unwrap();
}
