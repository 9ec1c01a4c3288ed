//! Control-side engine.

use crate::builder::EngineBuilder;
use crate::config::EngineConfig;
use crate::drain::{DrainTask, InstructionCallback};
use crate::error::{Error, Result};
use crate::source::KernelSource;
use crate::stats::{EngineMetrics, EngineStats};
use parking_lot::Mutex;
use r303_core::{codec, Bootstrap, Instruction, Producer, RingBuffer};
use r303_render::{BootstrapFailure, KernelFactory, OutputTap, RenderMetrics, RenderThread};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Bootstrap handshake progress.
///
/// ```text
/// Uninitialized → LoadingKernel → CreatingRenderThread → AwaitingAck → Ready
///                       └──────────────┴───────────────────┴──→ Failed
/// ```
///
/// `Failed` and `Closed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    Uninitialized,
    LoadingKernel,
    CreatingRenderThread,
    AwaitingAck,
    Ready,
    Failed(String),
    Closed,
}

impl HandshakeState {
    /// Instructions can be queued once the outbound segment exists, before the
    /// kernel has acknowledged. They are applied after its `initialize`.
    pub fn accepts_instructions(&self) -> bool {
        matches!(
            self,
            Self::CreatingRenderThread | Self::AwaitingAck | Self::Ready
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Closed)
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::LoadingKernel => write!(f, "loading kernel"),
            Self::CreatingRenderThread => write!(f, "creating render thread"),
            Self::AwaitingAck => write!(f, "awaiting acknowledgement"),
            Self::Ready => write!(f, "ready"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

struct Pending<F> {
    factory: F,
    tap: Option<OutputTap>,
}

/// Control side of the bridge.
///
/// Owns the kernel source, both shared segments, the render thread and the
/// drain task. All methods take `&self`, so an engine can be shared behind an
/// `Arc` between the UI code that sends instructions and the code awaiting
/// [`initialize`](Self::initialize).
///
/// [`shutdown`](Self::shutdown) is the supported teardown. Dropping an engine
/// without it joins the render thread in place, which blocks the dropping
/// thread for up to one quantum, or until a kernel still being instantiated
/// comes up.
///
/// # Example
///
/// ```ignore
/// use r303::prelude::*;
///
/// let engine = Engine::builder(MyKernelFactory::default())
///     .kernel_path("kernel.wasm")
///     .build()?;
///
/// engine.initialize(|instruction| {
///     if instruction.is(Opcode::SetSequencerStep) {
///         println!("step {:?}", instruction.as_u32());
///     }
/// }).await?;
///
/// engine.send_instruction(&Instruction::f32(Opcode::SetCutoff, 2000.0))?;
/// engine.toggle_start()?;
/// ```
pub struct Engine<F: KernelFactory> {
    config: EngineConfig,
    kernel: KernelSource,
    pending: Mutex<Option<Pending<F>>>,
    state: Arc<Mutex<HandshakeState>>,
    outbound: Mutex<Option<Producer>>,
    render: Mutex<Option<RenderThread>>,
    drain: Mutex<Option<DrainTask>>,
    stats: Arc<EngineStats>,
}

impl<F: KernelFactory> Engine<F> {
    pub fn builder(factory: F) -> EngineBuilder<F> {
        EngineBuilder::new(factory)
    }

    pub(crate) fn new(
        config: EngineConfig,
        kernel: KernelSource,
        factory: F,
        tap: Option<OutputTap>,
    ) -> Self {
        Self {
            config,
            kernel,
            pending: Mutex::new(Some(Pending { factory, tap })),
            state: Arc::new(Mutex::new(HandshakeState::Uninitialized)),
            outbound: Mutex::new(None),
            render: Mutex::new(None),
            drain: Mutex::new(None),
            stats: Arc::new(EngineStats::default()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> HandshakeState {
        self.state.lock().clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.state.lock() == HandshakeState::Ready
    }

    /// Load the kernel, start the render thread and wait for its acknowledgement.
    ///
    /// `callback` receives every instruction the kernel emits after the
    /// handshake, on a tokio worker. The engine is already `Ready` when the
    /// callback first runs. Valid exactly once; any failure leaves the engine
    /// in [`HandshakeState::Failed`] with every resource released.
    ///
    /// Dropping the returned future before it completes abandons the
    /// handshake: unless the acknowledgement has already arrived, the engine
    /// fails and releases the render thread and drain task.
    pub async fn initialize<C>(&self, callback: C) -> Result<()>
    where
        C: FnMut(Instruction) + Send + 'static,
    {
        self.advance(
            "initialize",
            |s| *s == HandshakeState::Uninitialized,
            HandshakeState::LoadingKernel,
        )?;
        tracing::info!(source = ?self.kernel, "initializing engine");

        let mut guard = InitializeGuard {
            engine: self,
            armed: true,
        };
        let result = match self.bootstrap(Box::new(callback)).await {
            Ok(()) if self.is_ready() => Ok(()),
            Ok(()) => Err(Error::BootstrapAborted),
            Err(e) => Err(e),
        };
        guard.armed = false;

        match result {
            Ok(()) => {
                tracing::info!("engine ready");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "engine bootstrap failed");
                self.fail(e.to_string());
                self.teardown().await;
                Err(e)
            }
        }
    }

    async fn bootstrap(&self, callback: InstructionCallback) -> Result<()> {
        let kernel = self.kernel.load().await?;
        tracing::debug!(bytes = kernel.len(), "kernel loaded");
        self.advance(
            "create render thread",
            |s| *s == HandshakeState::LoadingKernel,
            HandshakeState::CreatingRenderThread,
        )?;

        let Pending { factory, tap } = self.pending.lock().take().ok_or(Error::BootstrapAborted)?;

        let to_render = RingBuffer::new(self.config.segment_bytes)?;
        let to_control = RingBuffer::new(self.config.segment_bytes)?;
        let producer = to_render.producer()?;
        let consumer = to_control.consumer()?;

        // Locals tear themselves down if anything below fails.
        let mut render = RenderThread::spawn(factory, self.config.render_config(), tap)?;
        let failure = render.take_bootstrap_failure();
        let (ack_tx, ack_rx) = oneshot::channel();
        let drain = DrainTask::spawn(
            consumer,
            self.config.program_capacity,
            callback,
            ack_tx,
            Arc::clone(&self.state),
            Arc::clone(&self.stats),
        );

        *self.outbound.lock() = Some(producer);
        *self.render.lock() = Some(render);
        *self.drain.lock() = Some(drain);
        self.advance(
            "await acknowledgement",
            |s| *s == HandshakeState::CreatingRenderThread,
            HandshakeState::AwaitingAck,
        )?;

        // Posted only once the drain loop can see AwaitingAck.
        {
            let slot = self.render.lock();
            let Some(render) = slot.as_ref() else {
                return Err(Error::BootstrapAborted);
            };
            render.bootstrap(Bootstrap::new(kernel, to_render, to_control))?;
        }

        self.await_ack(ack_rx, failure).await
    }

    async fn await_ack(
        &self,
        ack: oneshot::Receiver<()>,
        failure: Option<BootstrapFailure>,
    ) -> Result<()> {
        let render_failed = async move {
            if let Some(failure) = failure {
                if let Ok(e) = failure.await {
                    return e;
                }
            }
            std::future::pending().await
        };
        let handshake = async move {
            tokio::select! {
                acked = ack => acked.map_err(|_| Error::BootstrapAborted),
                e = render_failed => Err(Error::Render(e)),
            }
        };

        match self.config.bootstrap_timeout() {
            Some(limit) => tokio::time::timeout(limit, handshake)
                .await
                .map_err(|_| Error::BootstrapTimeout {
                    timeout_ms: self.config.bootstrap_timeout_ms,
                })?,
            None => handshake.await,
        }
    }

    /// Queue one instruction for the kernel.
    ///
    /// Never blocks. Either the whole encoding lands in the segment or nothing
    /// does and [`Error::BufferSaturated`] is returned.
    pub fn send_instruction(&self, instruction: &Instruction) -> Result<()> {
        let encoded = codec::encode(instruction)?;
        self.write_outbound("send instruction", &encoded, 1)?;
        tracing::trace!(?instruction, "instruction sent");
        Ok(())
    }

    /// Queue several instructions as one all-or-nothing write.
    pub fn send_batch(&self, instructions: &[Instruction]) -> Result<()> {
        let encoded = codec::encode_all(instructions)?;
        if encoded.is_empty() {
            return Ok(());
        }
        self.write_outbound("send batch", &encoded, instructions.len())?;
        tracing::trace!(count = instructions.len(), bytes = encoded.len(), "batch sent");
        Ok(())
    }

    fn write_outbound(&self, operation: &'static str, bytes: &[u8], count: usize) -> Result<()> {
        {
            let state = self.state.lock();
            if !state.accepts_instructions() {
                return Err(Error::InvalidState {
                    operation,
                    state: state.clone(),
                });
            }
        }

        let mut outbound = self.outbound.lock();
        let Some(producer) = outbound.as_mut() else {
            return Err(Error::InvalidState {
                operation,
                state: self.state(),
            });
        };
        if !producer.write_exact(bytes) {
            let free = producer.free_space();
            self.stats.record_saturated();
            tracing::warn!(needed = bytes.len(), free, "instruction buffer saturated");
            return Err(Error::BufferSaturated {
                needed: bytes.len(),
                free,
            });
        }
        self.stats.record_sent(count, bytes.len());
        Ok(())
    }

    /// Start or stop rendering. Returns whether the engine is now running.
    pub fn toggle_start(&self) -> Result<bool> {
        self.require_ready("toggle start")?;
        let render = self.render.lock();
        let Some(render) = render.as_ref() else {
            return Err(Error::InvalidState {
                operation: "toggle start",
                state: self.state(),
            });
        };
        let running = !render.is_running();
        render.set_running(running);
        tracing::info!(running, "render state toggled");
        Ok(running)
    }

    pub fn is_running(&self) -> bool {
        self.render
            .lock()
            .as_ref()
            .is_some_and(RenderThread::is_running)
    }

    pub fn stats(&self) -> EngineMetrics {
        self.stats.snapshot()
    }

    /// Render-side counters, once the render thread exists.
    pub fn render_stats(&self) -> Option<RenderMetrics> {
        self.render.lock().as_ref().map(RenderThread::stats)
    }

    /// Stop the drain loop and the render thread. No callback runs after this returns.
    pub async fn shutdown(&self) {
        *self.state.lock() = HandshakeState::Closed;
        self.teardown().await;
        tracing::info!("engine shut down");
    }

    async fn teardown(&self) {
        let drain = self.drain.lock().take();
        if let Some(drain) = drain {
            drain.stop().await;
        }
        self.outbound.lock().take();

        let render = self.render.lock().take();
        if let Some(render) = render {
            // Joining waits out at most one quantum.
            if tokio::task::spawn_blocking(move || drop(render)).await.is_err() {
                tracing::error!("render thread teardown panicked");
            }
        }
    }

    /// Mark the handshake failed unless it already ended.
    fn fail(&self, reason: String) {
        let mut state = self.state.lock();
        if !state.is_terminal() {
            *state = HandshakeState::Failed(reason);
        }
    }

    /// Synchronous teardown for an `initialize` future dropped mid-handshake.
    fn abandon_initialize(&self) {
        {
            let mut state = self.state.lock();
            if state.is_terminal() || *state == HandshakeState::Ready {
                return;
            }
            let current: &HandshakeState = &state;
            tracing::warn!(state = %current, "initialize dropped before the handshake finished");
            *state = HandshakeState::Failed("initialization cancelled".to_string());
        }

        self.drain.lock().take();
        self.outbound.lock().take();
        let render = self.render.lock().take();
        if let Some(render) = render {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn_blocking(move || drop(render));
                }
                Err(_) => drop(render),
            }
        }
    }

    fn require_ready(&self, operation: &'static str) -> Result<()> {
        let state = self.state.lock();
        if *state == HandshakeState::Ready {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: state.clone(),
            })
        }
    }

    fn advance(
        &self,
        operation: &'static str,
        from: impl FnOnce(&HandshakeState) -> bool,
        to: HandshakeState,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if !from(&state) {
            return Err(Error::InvalidState {
                operation,
                state: state.clone(),
            });
        }
        let current: &HandshakeState = &state;
        tracing::debug!(from = %current, to = %to, "handshake transition");
        *state = to;
        Ok(())
    }
}

/// Runs [`Engine::abandon_initialize`] if `initialize` is dropped while armed.
struct InitializeGuard<'a, F: KernelFactory> {
    engine: &'a Engine<F>,
    armed: bool,
}

impl<F: KernelFactory> Drop for InitializeGuard<'_, F> {
    fn drop(&mut self) {
        if self.armed {
            self.engine.abandon_initialize();
        }
    }
}

impl<F: KernelFactory> fmt::Debug for Engine<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("state", &*self.state.lock())
            .field("kernel", &self.kernel)
            .field("config", &self.config)
            .finish()
    }
}
