//! Desktop output through cpal
//!
//! `cpal::Stream` is not `Send`, so each context runs a small host thread that
//! owns the stream for its whole life. The context talks to it over a command
//! channel; the device callback pulls audio through the connected
//! [`RenderHandle`].

use crate::context::{AudioBackend, ContextState, ProcessingContext};
use crate::error::{AudioError, Result};
use crate::graph::RenderHandle;
use async_trait::async_trait;
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, Stream, StreamConfig,
};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Commands sent to the host thread
enum HostCommand {
    Connect(RenderHandle),
    Resume(oneshot::Sender<Result<()>>),
    Close,
}

type OutputSlot = Arc<Mutex<Option<RenderHandle>>>;

/// Backend for the system's default output device
#[derive(Debug, Clone, Default)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn create_context(&self) -> Result<Box<dyn ProcessingContext>> {
        Ok(Box::new(CpalContext::open()?))
    }
}

struct CpalContext {
    sample_rate: u32,
    state: ContextState,
    commands: Sender<HostCommand>,
    host: Option<JoinHandle<()>>,
}

impl CpalContext {
    fn open() -> Result<Self> {
        let (command_tx, command_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);

        let host = thread::Builder::new()
            .name("cpal-output".to_string())
            .spawn(move || host_thread(command_rx, ready_tx))
            .map_err(|e| AudioError::EngineUnavailable(format!("output thread: {}", e)))?;

        let sample_rate = ready_rx.recv().map_err(|_| {
            AudioError::EngineUnavailable("output thread exited during startup".to_string())
        })??;

        info!("Opened cpal output at {} Hz", sample_rate);
        Ok(Self {
            sample_rate,
            state: ContextState::Suspended,
            commands: command_tx,
            host: Some(host),
        })
    }
}

#[async_trait]
impl ProcessingContext for CpalContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn connect(&mut self, output: RenderHandle) -> Result<()> {
        self.commands
            .send(HostCommand::Connect(output))
            .map_err(|_| AudioError::EngineUnavailable("output thread is gone".to_string()))
    }

    async fn resume(&mut self) -> Result<()> {
        if self.state == ContextState::Closed {
            return Err(AudioError::EngineUnavailable(
                "output context is closed".to_string(),
            ));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(HostCommand::Resume(reply_tx))
            .map_err(|_| AudioError::EngineUnavailable("output thread is gone".to_string()))?;

        reply_rx.await.map_err(|_| {
            AudioError::EngineUnavailable("output thread dropped the resume request".to_string())
        })??;

        self.state = ContextState::Running;
        Ok(())
    }

    fn close(&mut self) {
        if self.state == ContextState::Closed {
            return;
        }
        self.state = ContextState::Closed;
        // The thread may already be gone after a device failure
        self.commands.send(HostCommand::Close).ok();
        if let Some(host) = self.host.take() {
            if host.join().is_err() {
                warn!("Output thread panicked during shutdown");
            }
        }
        debug!("Closed cpal output");
    }
}

impl Drop for CpalContext {
    fn drop(&mut self) {
        self.close();
    }
}

fn host_thread(commands: Receiver<HostCommand>, ready: Sender<Result<u32>>) {
    let output: OutputSlot = Arc::new(Mutex::new(None));

    let stream = match build_stream(Arc::clone(&output)) {
        Ok((stream, sample_rate)) => {
            ready.send(Ok(sample_rate)).ok();
            stream
        }
        Err(e) => {
            ready.send(Err(e)).ok();
            return;
        }
    };

    while let Ok(command) = commands.recv() {
        match command {
            HostCommand::Connect(handle) => {
                *output.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
            }
            HostCommand::Resume(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| AudioError::TransientSuspension(e.to_string()));
                reply.send(result).ok();
            }
            HostCommand::Close => break,
        }
    }

    drop(stream);
}

fn build_stream(output: OutputSlot) -> Result<(Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::EngineUnavailable("no default output device".to_string()))?;

    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::EngineUnavailable(e.to_string()))?;
    if supported.sample_format() != SampleFormat::F32 {
        return Err(AudioError::EngineUnavailable(format!(
            "output device uses {:?} samples (f32 required)",
            supported.sample_format()
        )));
    }

    let sample_rate = supported.sample_rate();
    let config: StreamConfig = supported.config();
    let channels = usize::from(config.channels);
    let mut stereo = Vec::new();

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels.max(1);
                stereo.resize(frames * 2, 0.0);

                match output.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
                    Some(handle) => {
                        handle.render(&mut stereo);
                    }
                    None => stereo.fill(0.0),
                }
                spread_stereo(&stereo, data, channels);
            },
            |err| warn!("Output stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::EngineUnavailable(e.to_string()))?;

    // Streams may start playing on creation; stay silent until resumed
    if let Err(e) = stream.pause() {
        debug!("Could not pause new output stream: {}", e);
    }

    Ok((stream, sample_rate))
}

/// Copy interleaved stereo onto a device buffer with `channels` channels
///
/// Mono devices get the average of both sides; extra channels are silent.
fn spread_stereo(stereo: &[f32], out: &mut [f32], channels: usize) {
    if channels == 0 {
        return;
    }
    for (frame, pair) in out.chunks_exact_mut(channels).zip(stereo.chunks_exact(2)) {
        if channels == 1 {
            frame[0] = 0.5 * (pair[0] + pair[1]);
        } else {
            frame[0] = pair[0];
            frame[1] = pair[1];
            frame[2..].fill(0.0);
        }
    }
}
