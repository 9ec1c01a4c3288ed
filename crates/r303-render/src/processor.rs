//! Render-side processor.
//!
//! Waits for a [`Bootstrap`] message, brings the kernel up, acknowledges over
//! the outbound ring, then runs once per quantum:
//!
//! 1. drain inbound bytes into the kernel's program buffer
//! 2. run the kernel
//! 3. copy its samples to the output
//! 4. forward any response bytes to the control side
//!
//! Nothing in [`Processor::process`] allocates, locks or logs.

use crate::error::{Error, Result};
use crate::kernel::{HostImports, Kernel, KernelFactory};
use crate::stats::RenderStats;
use r303_core::{
    codec, Bootstrap, Consumer, Instruction, Opcode, Producer, Reassembler, MAX_INSTRUCTION_LEN,
};
use std::sync::Arc;

struct Session<K> {
    kernel: K,
    inbound: Consumer,
    outbound: Producer,
    carry: Reassembler,
}

/// Per-quantum driver for one kernel.
pub struct Processor<F: KernelFactory> {
    factory: F,
    imports: HostImports,
    session: Option<Session<F::Kernel>>,
    stats: Arc<RenderStats>,
}

impl<F: KernelFactory> Processor<F> {
    pub fn new(factory: F, imports: HostImports) -> Self {
        Self::with_stats(factory, imports, Arc::new(RenderStats::new()))
    }

    pub fn with_stats(factory: F, imports: HostImports, stats: Arc<RenderStats>) -> Self {
        Self {
            factory,
            imports,
            session: None,
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<RenderStats> {
        &self.stats
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.session.is_some()
    }

    pub fn kernel(&self) -> Option<&F::Kernel> {
        self.session.as_ref().map(|s| &s.kernel)
    }

    /// Instantiate and initialize the kernel, claim the render ends of both
    /// segments, and write the bootstrap acknowledgement.
    ///
    /// Only the first bootstrap is accepted.
    pub fn bootstrap(&mut self, message: Bootstrap) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::AlreadyBootstrapped);
        }

        let inbound = message.to_render.consumer()?;
        let mut outbound = message.to_control.producer()?;

        let mut kernel = self.factory.instantiate(&message.kernel, self.imports)?;
        kernel.initialize();

        let frames = self.imports.quantum_frames();
        if kernel.left().len() < frames || kernel.right().len() < frames {
            return Err(Error::KernelShape(format!(
                "sample buffers hold {}/{} frames, quantum is {frames}",
                kernel.left().len(),
                kernel.right().len()
            )));
        }
        if kernel.program().len() <= MAX_INSTRUCTION_LEN {
            return Err(Error::KernelShape(format!(
                "program buffer of {} bytes cannot hold an instruction",
                kernel.program().len()
            )));
        }

        let ack = codec::encode(&Instruction::bare(Opcode::BootstrapFinished))?;
        if !outbound.write_exact(&ack) {
            return Err(Error::AckRejected);
        }

        self.session = Some(Session {
            kernel,
            inbound,
            outbound,
            carry: Reassembler::new(),
        });
        Ok(())
    }

    /// Render one quantum into `left` and `right`.
    ///
    /// Before bootstrap the output is silence. Returns `true` to stay scheduled.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) -> bool {
        let Some(session) = self.session.as_mut() else {
            left.fill(0.0);
            right.fill(0.0);
            return true;
        };
        let Session {
            kernel,
            inbound,
            outbound,
            carry,
        } = session;

        let fill = carry.fill(kernel.program(), |dst| inbound.read(dst));
        let produced = kernel.process(fill.complete);

        copy_channel(kernel.left(), left);
        copy_channel(kernel.right(), right);

        if produced > 0 {
            let program = kernel.program();
            let produced = produced.min(program.len());
            // Whole response or nothing, so the control side never sees half an instruction.
            if outbound.write_exact(&program[..produced]) {
                self.stats.record_outbound(produced);
            } else {
                self.stats.record_dropped(produced);
            }
        }

        self.stats.record_quantum(fill.read);
        true
    }
}

#[inline]
fn copy_channel(src: &[f32], dst: &mut [f32]) {
    let frames = src.len().min(dst.len());
    dst[..frames].copy_from_slice(&src[..frames]);
    dst[frames..].fill(0.0);
}
