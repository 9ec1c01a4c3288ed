//! # r303 Render
//!
//! The real-time half of the r303 bridge.
//!
//! - [`Kernel`] / [`KernelFactory`]: the synthesis program and how it is instantiated
//! - [`Processor`]: bootstrap handling and the per-quantum drain → run → forward cycle
//! - [`RenderThread`]: paced OS thread hosting a processor behind a message port
//! - [`RenderStats`]: counters the render side bumps instead of logging
//!
//! The render side only ever talks to the control side through the two
//! segments handed over in [`Bootstrap`](r303_core::Bootstrap), plus the
//! one-shot port message that carries them.

pub mod error;
pub mod kernel;
pub mod processor;
pub mod stats;
pub mod thread;

pub use error::{Error, Result};
pub use kernel::{HostImports, Kernel, KernelFactory};
pub use processor::Processor;
pub use stats::{RenderMetrics, RenderStats};
pub use thread::{BootstrapFailure, OutputTap, PortMessage, RenderConfig, RenderThread};
