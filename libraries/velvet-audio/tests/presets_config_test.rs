//! Loading presets and engine configuration from disk

mod test_helpers;

use std::io::Write;
use tempfile::NamedTempFile;
use test_helpers::*;
use velvet_audio::{AudioEngine, AudioError, EngineConfig, OfflineBackend, PresetLibrary};

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn config_file_overrides_selected_settings() {
    let file = write_temp(
        r#"{
            "smoothing": { "time_constant_secs": 0.02 },
            "analyser": { "fft_size": 1024 },
            "resume": { "silent_retry_limit": 5 }
        }"#,
    );

    let config = EngineConfig::from_file(file.path()).unwrap();
    assert_eq!(config.smoothing.time_constant_secs, 0.02);
    assert_eq!(config.analyser.fft_size, 1024);
    assert_eq!(config.resume.silent_retry_limit, 5);
    assert_eq!(config.convolution.block_size, 512);
    assert_eq!(config.impulse.duration_secs, 2.0);
}

#[test]
fn invalid_config_file_is_rejected() {
    let file = write_temp(r#"{ "convolution": { "block_size": 300 } }"#);
    assert!(matches!(
        EngineConfig::from_file(file.path()),
        Err(AudioError::InvalidConfig(_))
    ));
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    assert!(matches!(
        EngineConfig::from_file(&path),
        Err(AudioError::Io(_))
    ));
}

#[tokio::test]
async fn analyser_size_comes_from_config() {
    init_tracing();
    let mut config = test_config();
    config.analyser.fft_size = 2048;
    let mut engine = AudioEngine::with_config(OfflineBackend::new(SAMPLE_RATE), config);
    engine.build_graph(&center_sine(440.0, 1.0, 0.5)).unwrap();
    engine.ensure_running().await.unwrap();
    render_frames(&mut engine, 4096);

    assert_eq!(engine.frequency_data().unwrap().len(), 1024);
}

#[test]
fn preset_library_round_trips_through_a_file() {
    let library = PresetLibrary::builtin();
    let file = write_temp(&serde_json::to_string_pretty(&library).unwrap());

    let loaded = PresetLibrary::from_file(file.path()).unwrap();
    assert_eq!(loaded, library);
}

#[test]
fn user_presets_drive_the_engine() {
    let file = write_temp(
        r#"{
            "equalizer": [
                { "name": "Late Night", "gains": [-4, -3, -2, 0, 1, 1, 0, -1, -2, -3] }
            ],
            "ambience": [
                { "name": "Booth", "mix": 0.15, "preDelay": 0.004, "damp": 9000 }
            ]
        }"#,
    );
    let library = PresetLibrary::from_file(file.path()).unwrap();
    let mut engine = AudioEngine::new(OfflineBackend::new(SAMPLE_RATE));

    engine
        .apply_named_eq_preset(library.eq("Late Night").unwrap())
        .unwrap();
    engine
        .apply_ambience_preset(library.ambience("Booth").unwrap())
        .unwrap();

    let settings = engine.settings();
    assert_eq!(settings.equalizer.gains[0], -4.0);
    assert_eq!(settings.equalizer.gains[9], -3.0);
    assert_eq!(settings.ambience.mix, 0.15);
    assert_eq!(settings.ambience.pre_delay, 0.004);
    assert_eq!(settings.ambience.damp, 9000.0);
}

#[test]
fn settings_serialize_for_persistence() {
    let mut engine = AudioEngine::new(OfflineBackend::new(SAMPLE_RATE));
    engine.set_eq_band_gain(2, 3.5).unwrap();
    engine.set_stereo_width(0.8).unwrap();
    engine.set_vocal_cut(true).unwrap();

    let json = serde_json::to_string(engine.settings()).unwrap();
    let restored: velvet_audio::DspSettings = serde_json::from_str(&json).unwrap();
    assert_eq!(&restored, engine.settings());
}
