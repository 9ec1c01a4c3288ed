//! Error types for r303-render

use thiserror::Error;

/// Result type for render-side operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Render-side error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Kernel instantiation failed: {0}")]
    KernelInstantiation(String),

    #[error("Kernel rejected: {0}")]
    KernelShape(String),

    #[error("Processor already bootstrapped")]
    AlreadyBootstrapped,

    #[error("No room in the outbound ring for the bootstrap acknowledgement")]
    AckRejected,

    #[error("Failed to spawn render thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    #[error("Render port closed")]
    PortClosed,

    #[error(transparent)]
    Core(#[from] r303_core::Error),
}

impl Error {
    /// Convenience for kernel factories reporting a failure.
    pub fn instantiation(reason: impl Into<String>) -> Self {
        Self::KernelInstantiation(reason.into())
    }
}
