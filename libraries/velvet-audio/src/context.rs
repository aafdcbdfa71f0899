//! Processing contexts
//!
//! A context is the clocked environment a graph runs in: it fixes the sample
//! rate, can be suspended by platform policy, and pulls audio through the
//! graph's [`RenderHandle`]. Backends create contexts; the engine owns at most
//! one at a time.
//!
//! [`OfflineBackend`] renders on demand with no device attached, which is what
//! tests and file export use. The cpal backend lives behind the `desktop`
//! feature.

use crate::config::EngineConfig;
use crate::error::{AudioError, Result};
use crate::graph::RenderHandle;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Lifecycle state of a processing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Created or suspended; audio is not being pulled
    Suspended,
    Running,
    /// Released; cannot be resumed
    Closed,
}

/// Factory for processing contexts
pub trait AudioBackend: Send {
    fn name(&self) -> &str;

    /// Create a new, suspended context
    ///
    /// Fails with [`AudioError::EngineUnavailable`] when no output can be opened.
    fn create_context(&self) -> Result<Box<dyn ProcessingContext>>;
}

#[async_trait]
pub trait ProcessingContext: Send {
    fn sample_rate(&self) -> u32;

    fn state(&self) -> ContextState;

    /// Route the graph output to this context's destination
    fn connect(&mut self, output: RenderHandle) -> Result<()>;

    /// Ask the context to start (or restart) pulling audio
    ///
    /// May fail with [`AudioError::TransientSuspension`] when the platform
    /// requires a user gesture first.
    async fn resume(&mut self) -> Result<()>;

    /// Release the context; idempotent
    fn close(&mut self);

    /// Render into `out` on the caller's thread, for contexts without a device
    ///
    /// Device-backed contexts return `None`: their own callback pulls audio.
    fn pull(&mut self, _out: &mut [f32]) -> Option<usize> {
        None
    }
}

#[derive(Debug, Default)]
struct ProbeCounters {
    created: AtomicUsize,
    closed: AtomicUsize,
    resume_attempts: AtomicUsize,
}

/// Counters shared by an [`OfflineBackend`] and every context it creates
#[derive(Debug, Clone, Default)]
pub struct BackendProbe {
    counters: Arc<ProbeCounters>,
}

impl BackendProbe {
    pub fn contexts_created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn contexts_closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Contexts created and not yet closed
    pub fn live_contexts(&self) -> usize {
        self.contexts_created() - self.contexts_closed()
    }

    pub fn resume_attempts(&self) -> usize {
        self.counters.resume_attempts.load(Ordering::SeqCst)
    }
}

/// Backend producing device-less contexts rendered by the caller
#[derive(Debug, Clone)]
pub struct OfflineBackend {
    sample_rate: u32,
    unavailable: Option<String>,
    refused_resumes: Arc<AtomicU32>,
    probe: BackendProbe,
}

impl OfflineBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            unavailable: None,
            refused_resumes: Arc::new(AtomicU32::new(0)),
            probe: BackendProbe::default(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.offline.sample_rate)
    }

    /// A backend whose context creation always fails
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let mut backend = Self::new(0);
        backend.unavailable = Some(reason.into());
        backend
    }

    /// Refuse the next `count` resume calls, as a browser-style autoplay policy would
    pub fn with_refused_resumes(self, count: u32) -> Self {
        self.refused_resumes.store(count, Ordering::SeqCst);
        self
    }

    pub fn probe(&self) -> BackendProbe {
        self.probe.clone()
    }
}

impl AudioBackend for OfflineBackend {
    fn name(&self) -> &str {
        "offline"
    }

    fn create_context(&self) -> Result<Box<dyn ProcessingContext>> {
        if let Some(reason) = &self.unavailable {
            return Err(AudioError::EngineUnavailable(reason.clone()));
        }

        self.probe.counters.created.fetch_add(1, Ordering::SeqCst);
        debug!("Created offline context at {} Hz", self.sample_rate);

        Ok(Box::new(OfflineContext {
            sample_rate: self.sample_rate,
            state: ContextState::Suspended,
            output: None,
            refused_resumes: Arc::clone(&self.refused_resumes),
            probe: self.probe.clone(),
        }))
    }
}

struct OfflineContext {
    sample_rate: u32,
    state: ContextState,
    output: Option<RenderHandle>,
    refused_resumes: Arc<AtomicU32>,
    probe: BackendProbe,
}

#[async_trait]
impl ProcessingContext for OfflineContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn connect(&mut self, output: RenderHandle) -> Result<()> {
        if self.state == ContextState::Closed {
            return Err(AudioError::EngineUnavailable(
                "offline context is closed".to_string(),
            ));
        }
        self.output = Some(output);
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        self.probe
            .counters
            .resume_attempts
            .fetch_add(1, Ordering::SeqCst);

        match self.state {
            ContextState::Closed => Err(AudioError::EngineUnavailable(
                "offline context is closed".to_string(),
            )),
            ContextState::Running => Ok(()),
            ContextState::Suspended => {
                let refused = self
                    .refused_resumes
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if refused {
                    return Err(AudioError::TransientSuspension(
                        "resume refused until the next user gesture".to_string(),
                    ));
                }
                self.state = ContextState::Running;
                Ok(())
            }
        }
    }

    fn close(&mut self) {
        if self.state != ContextState::Closed {
            self.state = ContextState::Closed;
            self.output = None;
            self.probe.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pull(&mut self, out: &mut [f32]) -> Option<usize> {
        match (&self.output, self.state) {
            (Some(output), ContextState::Running) => Some(output.render(out)),
            _ => {
                out.fill(0.0);
                Some(0)
            }
        }
    }
}

impl Drop for OfflineContext {
    fn drop(&mut self) {
        self.close();
    }
}
