//! Dedicated render thread.
//!
//! Stands in for the audio callback: a named OS thread that wakes once per
//! quantum, drains its message port without blocking, and drives a
//! [`Processor`] while the engine is running.

use crate::error::{Error, Result};
use crate::kernel::{HostImports, KernelFactory};
use crate::processor::Processor;
use crate::stats::{RenderMetrics, RenderStats};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use futures::channel::oneshot;
use r303_core::Bootstrap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Out-of-band messages to the render thread.
#[derive(Debug)]
pub enum PortMessage {
    Bootstrap(Bootstrap),
    Shutdown,
}

/// Receives every rendered quantum (left, right).
pub type OutputTap = Box<dyn FnMut(&[f32], &[f32]) + Send + 'static>;

/// Resolves with the bootstrap error, or `Canceled` if there is none to report.
pub type BootstrapFailure = oneshot::Receiver<Error>;

/// Render thread settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    pub sample_rate: f32,
    pub quantum_frames: usize,
    /// Whether quanta are rendered as soon as the kernel is up.
    pub start_running: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            quantum_frames: 128,
            start_running: false,
        }
    }
}

impl RenderConfig {
    /// Wall-clock length of one quantum.
    pub fn quantum_duration(&self) -> Duration {
        Duration::from_secs_f64(self.quantum_frames as f64 / f64::from(self.sample_rate))
    }
}

/// Handle to the render thread.
///
/// Dropping it sends a shutdown and joins the thread in place, which waits for
/// the current quantum or for a kernel still being instantiated. From async
/// code, drop it on a blocking thread.
pub struct RenderThread {
    port: Sender<PortMessage>,
    running: Arc<AtomicBool>,
    stats: Arc<RenderStats>,
    failure: Option<BootstrapFailure>,
    handle: Option<thread::JoinHandle<()>>,
}

impl RenderThread {
    /// Spawn the thread. The kernel is not created until a bootstrap message arrives.
    pub fn spawn<F: KernelFactory>(
        factory: F,
        config: RenderConfig,
        tap: Option<OutputTap>,
    ) -> Result<Self> {
        let (port, inbox) = crossbeam_channel::unbounded();
        let running = Arc::new(AtomicBool::new(config.start_running));
        let stats = Arc::new(RenderStats::new());
        let (failure_tx, failure_rx) = oneshot::channel();

        let worker = Worker {
            processor: Processor::with_stats(
                factory,
                HostImports::new(config.sample_rate, config.quantum_frames),
                Arc::clone(&stats),
            ),
            inbox,
            running: Arc::clone(&running),
            tap,
            failure: Some(failure_tx),
            config,
        };

        let handle = thread::Builder::new()
            .name("r303-render".to_string())
            .spawn(move || worker.run())
            .map_err(Error::ThreadSpawn)?;

        Ok(Self {
            port,
            running,
            stats,
            failure: Some(failure_rx),
            handle: Some(handle),
        })
    }

    pub fn post(&self, message: PortMessage) -> Result<()> {
        self.port.send(message).map_err(|_| Error::PortClosed)
    }

    pub fn bootstrap(&self, message: Bootstrap) -> Result<()> {
        self.post(PortMessage::Bootstrap(message))
    }

    /// Resolves with the error if bootstrap fails on the render thread.
    ///
    /// Can be taken once. Resolves to `Canceled` if the thread exits or the
    /// bootstrap succeeds.
    pub fn take_bootstrap_failure(&mut self) -> Option<BootstrapFailure> {
        self.failure.take()
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> RenderMetrics {
        self.stats.snapshot()
    }

    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait for it to exit.
    pub fn shutdown(&mut self) {
        let _ = self.port.send(PortMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("render thread panicked");
            }
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker<F: KernelFactory> {
    processor: Processor<F>,
    inbox: Receiver<PortMessage>,
    running: Arc<AtomicBool>,
    tap: Option<OutputTap>,
    failure: Option<oneshot::Sender<Error>>,
    config: RenderConfig,
}

impl<F: KernelFactory> Worker<F> {
    fn run(mut self) {
        let quantum = self.config.quantum_duration();
        let mut left = vec![0.0f32; self.config.quantum_frames];
        let mut right = vec![0.0f32; self.config.quantum_frames];
        let mut deadline = Instant::now();

        while self.drain_port() {
            if self.running.load(Ordering::Acquire) && self.processor.is_bootstrapped() {
                let started = Instant::now();
                self.processor.process(&mut left, &mut right);
                if let Some(tap) = self.tap.as_mut() {
                    tap(&left, &right);
                }
                if started.elapsed() > quantum {
                    self.processor.stats().record_overrun();
                }
            }

            deadline += quantum;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else {
                deadline = now;
            }
        }
    }

    /// Handle pending port messages. Returns `false` once the thread should exit.
    fn drain_port(&mut self) -> bool {
        loop {
            match self.inbox.try_recv() {
                Ok(PortMessage::Bootstrap(message)) => match self.processor.bootstrap(message) {
                    Ok(()) => {
                        tracing::debug!("kernel bootstrapped");
                        self.failure = None;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "kernel bootstrap failed");
                        if let Some(tx) = self.failure.take() {
                            let _ = tx.send(e);
                        }
                    }
                },
                Ok(PortMessage::Shutdown) | Err(TryRecvError::Disconnected) => return false,
                Err(TryRecvError::Empty) => return true,
            }
        }
    }
}
