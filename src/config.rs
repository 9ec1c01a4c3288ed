//! Engine configuration.

use crate::error::{Error, Result};
use r303_core::{HEADER_BYTES, MAX_INSTRUCTION_LEN};
use r303_render::RenderConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sizing and timing for one engine.
///
/// The defaults hold a full pattern upload (8 patterns × 16 steps of 5 bytes)
/// plus a parameter sweep in a single segment without saturating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Total bytes per shared segment, header included. One per direction.
    pub segment_bytes: usize,
    /// Control-side drain buffer.
    pub program_capacity: usize,
    /// How long to wait for the kernel's acknowledgement. 0 waits forever.
    pub bootstrap_timeout_ms: u64,
    pub sample_rate: f32,
    pub quantum_frames: usize,
    /// Render quanta as soon as the kernel is up instead of waiting for `toggle_start`.
    pub autostart: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            segment_bytes: 4096,
            program_capacity: 1024,
            bootstrap_timeout_ms: 5000,
            sample_rate: 44_100.0,
            quantum_frames: 128,
            autostart: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.segment_bytes < HEADER_BYTES + 2 * MAX_INSTRUCTION_LEN {
            return Err(Error::InvalidConfig(format!(
                "segment_bytes {} too small (minimum {})",
                self.segment_bytes,
                HEADER_BYTES + 2 * MAX_INSTRUCTION_LEN
            )));
        }
        if u32::try_from(self.segment_bytes).is_err() {
            return Err(Error::InvalidConfig(format!(
                "segment_bytes {} exceeds u32 range",
                self.segment_bytes
            )));
        }
        if self.program_capacity <= MAX_INSTRUCTION_LEN {
            return Err(Error::InvalidConfig(format!(
                "program_capacity {} cannot hold an instruction",
                self.program_capacity
            )));
        }
        if self.quantum_frames == 0 {
            return Err(Error::InvalidConfig("quantum_frames must be > 0".into()));
        }
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} must be positive",
                self.sample_rate
            )));
        }
        Ok(())
    }

    /// `None` means wait forever.
    pub fn bootstrap_timeout(&self) -> Option<Duration> {
        (self.bootstrap_timeout_ms > 0).then(|| Duration::from_millis(self.bootstrap_timeout_ms))
    }

    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            sample_rate: self.sample_rate,
            quantum_frames: self.quantum_frames,
            start_running: self.autostart,
        }
    }
}
