//! Builder for configuring and constructing an [`Engine`].

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::source::KernelSource;
use r303_render::{KernelFactory, OutputTap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A kernel source is required; everything else defaults to [`EngineConfig::default`].
///
/// # Example
///
/// ```ignore
/// use r303::prelude::*;
///
/// let engine = Engine::builder(factory)
///     .kernel_path("public/kernel.wasm")
///     .bootstrap_timeout(Duration::from_secs(2))
///     .output_tap(|left, right| meter.push(left, right))
///     .build()?;
/// ```
pub struct EngineBuilder<F: KernelFactory> {
    factory: F,
    kernel: Option<KernelSource>,
    config: EngineConfig,
    tap: Option<OutputTap>,
}

impl<F: KernelFactory> EngineBuilder<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            kernel: None,
            config: EngineConfig::default(),
            tap: None,
        }
    }

    /// Read the kernel binary from `path` during `initialize`.
    pub fn kernel_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.kernel = Some(KernelSource::Path(path.into()));
        self
    }

    pub fn kernel_bytes(mut self, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.kernel = Some(KernelSource::Bytes(bytes.into()));
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 4096
    pub fn segment_bytes(mut self, bytes: usize) -> Self {
        self.config.segment_bytes = bytes;
        self
    }

    /// Default: 1024
    pub fn program_capacity(mut self, bytes: usize) -> Self {
        self.config.program_capacity = bytes;
        self
    }

    /// Default: 5s. `Duration::ZERO` waits forever.
    pub fn bootstrap_timeout(mut self, timeout: Duration) -> Self {
        self.config.bootstrap_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Default: 44100.0
    pub fn sample_rate(mut self, rate: f32) -> Self {
        self.config.sample_rate = rate;
        self
    }

    /// Default: 128
    pub fn quantum_frames(mut self, frames: usize) -> Self {
        self.config.quantum_frames = frames;
        self
    }

    /// Default: false
    pub fn autostart(mut self, enabled: bool) -> Self {
        self.config.autostart = enabled;
        self
    }

    /// Observe every rendered quantum on the render thread.
    pub fn output_tap<T>(mut self, tap: T) -> Self
    where
        T: FnMut(&[f32], &[f32]) + Send + 'static,
    {
        self.tap = Some(Box::new(tap));
        self
    }

    pub fn build(self) -> Result<Engine<F>> {
        self.config.validate()?;
        let kernel = self
            .kernel
            .ok_or_else(|| Error::InvalidConfig("no kernel source given".into()))?;
        Ok(Engine::new(self.config, kernel, self.factory, self.tap))
    }
}
