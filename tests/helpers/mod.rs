//! Test helpers and fixtures for r303 integration tests
//!
//! [`ProbeKernel`] is an in-process kernel that records every instruction it
//! is handed and can emit sequencer steps or extra acknowledgements. The
//! shared [`KernelProbe`] lets tests inspect it from the control side.

#![allow(dead_code)]

use parking_lot::Mutex;
use r303::prelude::*;
use r303::render;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

/// Bytes handed to the factory as the kernel binary.
pub const TEST_KERNEL: &[u8] = b"\0asm\x01\0\0\0r303-test";

/// Upper bound for anything a test waits on.
pub const TEST_DEADLINE: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Everything the kernel saw, readable from the test.
#[derive(Debug, Default)]
pub struct KernelProbe {
    pub applied: Mutex<Vec<Instruction>>,
    pub initialized: AtomicBool,
    pub applied_before_init: AtomicUsize,
    pub quanta: AtomicUsize,
}

impl KernelProbe {
    pub fn applied(&self) -> Vec<Instruction> {
        self.applied.lock().clone()
    }

    pub fn applied_with(&self, op: Opcode) -> Vec<Instruction> {
        self.applied
            .lock()
            .iter()
            .filter(|i| i.is(op))
            .copied()
            .collect()
    }
}

pub struct ProbeKernel {
    program: Vec<u8>,
    left: Vec<f32>,
    right: Vec<f32>,
    probe: Arc<KernelProbe>,
    emit_steps: bool,
    extra_acks: usize,
    step: u32,
}

impl Kernel for ProbeKernel {
    fn initialize(&mut self) {
        self.probe.initialized.store(true, Ordering::SeqCst);
    }

    fn process(&mut self, inbound: usize) -> usize {
        self.probe.quanta.fetch_add(1, Ordering::SeqCst);
        let initialized = self.probe.initialized.load(Ordering::SeqCst);
        {
            let mut applied = self.probe.applied.lock();
            for item in r303::decode(&self.program[..inbound]) {
                if !initialized {
                    self.probe.applied_before_init.fetch_add(1, Ordering::SeqCst);
                }
                applied.push(item.expect("whole instructions only"));
            }
        }

        let mut out = Vec::new();
        if self.extra_acks > 0 {
            self.extra_acks -= 1;
            let ack = r303::encode(&Instruction::bare(Opcode::BootstrapFinished)).unwrap();
            out.extend_from_slice(&ack);
        }
        if self.emit_steps {
            out.extend_from_slice(
                &r303::encode(&Instruction::u32(Opcode::SetSequencerStep, self.step)).unwrap(),
            );
            self.step = (self.step + 1) % 16;
        }
        self.program[..out.len()].copy_from_slice(&out);
        out.len()
    }

    fn left(&self) -> &[f32] {
        &self.left
    }

    fn right(&self) -> &[f32] {
        &self.right
    }

    fn program(&mut self) -> &mut [u8] {
        &mut self.program
    }
}

/// Factory for [`ProbeKernel`] with knobs for the failure paths.
pub struct ProbeFactory {
    pub probe: Arc<KernelProbe>,
    pub emit_steps: bool,
    pub extra_acks: usize,
    pub fail: bool,
    pub delay: Option<Duration>,
    pub gate: Option<mpsc::Receiver<()>>,
}

impl ProbeFactory {
    pub fn new() -> Self {
        Self {
            probe: Arc::new(KernelProbe::default()),
            emit_steps: false,
            extra_acks: 0,
            fail: false,
            delay: None,
            gate: None,
        }
    }

    /// Blocks instantiation until the returned sender fires.
    pub fn gated(mut self) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        self.gate = Some(rx);
        (self, tx)
    }
}

impl KernelFactory for ProbeFactory {
    type Kernel = ProbeKernel;

    fn instantiate(&mut self, binary: &[u8], imports: HostImports) -> render::Result<ProbeKernel> {
        assert_eq!(binary, TEST_KERNEL);
        if let Some(gate) = self.gate.take() {
            let _ = gate.recv_timeout(TEST_DEADLINE);
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail {
            return Err(render::Error::instantiation("probe factory told to fail"));
        }
        imports.log(b"probe kernel instantiated");

        let frames = imports.quantum_frames();
        Ok(ProbeKernel {
            program: vec![0; 1024],
            left: vec![0.25; frames],
            right: vec![-0.25; frames],
            probe: Arc::clone(&self.probe),
            emit_steps: self.emit_steps,
            extra_acks: self.extra_acks,
            step: 0,
        })
    }
}

/// Engine over a [`ProbeFactory`], built from in-memory kernel bytes.
pub fn probe_engine(factory: ProbeFactory) -> EngineBuilder<ProbeFactory> {
    Engine::builder(factory).kernel_bytes(TEST_KERNEL)
}

/// Poll `condition` until it holds or [`TEST_DEADLINE`] passes.
pub async fn eventually<C>(mut condition: C)
where
    C: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + TEST_DEADLINE;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within {TEST_DEADLINE:?}"
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Await `future`, failing the test if it takes longer than [`TEST_DEADLINE`].
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(TEST_DEADLINE, future)
        .await
        .expect("future did not complete in time")
}
