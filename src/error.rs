//! Centralized error type for the r303 umbrella crate.
//!
//! Wraps the core and render errors so `?` propagates across crate boundaries.

use crate::engine::HandshakeState;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] r303_core::Error),

    #[error("Render: {0}")]
    Render(#[from] r303_render::Error),

    #[error("Failed to load kernel from {path}: {source}")]
    KernelLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Kernel binary is empty")]
    EmptyKernel,

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: HandshakeState,
    },

    #[error("Instruction buffer saturated: {needed} bytes needed, {free} free")]
    BufferSaturated { needed: usize, free: usize },

    #[error("Kernel did not acknowledge bootstrap within {timeout_ms}ms")]
    BootstrapTimeout { timeout_ms: u64 },

    #[error("Bootstrap aborted before the kernel acknowledged")]
    BootstrapAborted,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
