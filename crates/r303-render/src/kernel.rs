//! Kernel interface.
//!
//! A kernel is the compiled synthesis program. It owns a program buffer the
//! processor fills with inbound instructions before each quantum, and it
//! writes its own outbound instructions back into the same buffer.

use crate::error::Result;

/// A live kernel instance.
///
/// Every call happens on the render thread, once per quantum, so
/// implementations must not block, allocate or lock inside [`process`](Self::process).
pub trait Kernel: Send {
    /// One-time setup after instantiation, before any quantum.
    fn initialize(&mut self);

    /// Consume `inbound` instruction bytes at the front of the program
    /// buffer, render one quantum into the sample buffers, and return how
    /// many outbound instruction bytes were written to the front of the
    /// program buffer.
    fn process(&mut self, inbound: usize) -> usize;

    /// Left channel of the last rendered quantum.
    fn left(&self) -> &[f32];

    /// Right channel of the last rendered quantum.
    fn right(&self) -> &[f32];

    /// Program buffer shared between processor and kernel.
    ///
    /// Fetched again on every quantum; the kernel may move it between calls.
    fn program(&mut self) -> &mut [u8];
}

/// Turns a kernel binary into a running [`Kernel`].
pub trait KernelFactory: Send + 'static {
    type Kernel: Kernel + 'static;

    fn instantiate(&mut self, binary: &[u8], imports: HostImports) -> Result<Self::Kernel>;
}

impl<F, K> KernelFactory for F
where
    F: FnMut(&[u8], HostImports) -> Result<K> + Send + 'static,
    K: Kernel + 'static,
{
    type Kernel = K;

    fn instantiate(&mut self, binary: &[u8], imports: HostImports) -> Result<K> {
        self(binary, imports)
    }
}

/// Host functions exposed to a kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostImports {
    sample_rate: f32,
    quantum_frames: usize,
}

impl HostImports {
    pub fn new(sample_rate: f32, quantum_frames: usize) -> Self {
        Self {
            sample_rate,
            quantum_frames,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Frames the kernel must render per quantum.
    pub fn quantum_frames(&self) -> usize {
        self.quantum_frames
    }

    /// Log a kernel-owned UTF-8 string.
    pub fn log(&self, message: &[u8]) {
        tracing::info!(target: "r303::kernel", "{}", String::from_utf8_lossy(message));
    }

    pub fn log_f32(&self, value: f32) {
        tracing::info!(target: "r303::kernel", value, "kernel f32");
    }

    pub fn log_u32(&self, value: u32) {
        tracing::info!(target: "r303::kernel", value, "kernel u32");
    }
}
