//! Control-side drain loop.
//!
//! A tokio task that empties the render-to-control segment into a fixed
//! program buffer, decodes whole instructions, and routes them. The bootstrap
//! acknowledgement moves the engine to `Ready`; everything else goes to the
//! user callback once that has happened.

use crate::engine::HandshakeState;
use crate::stats::EngineStats;
use parking_lot::Mutex;
use r303_core::{codec, Consumer, Instruction, Opcode, Reassembler};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Receives every instruction the kernel emits after bootstrap.
pub type InstructionCallback = Box<dyn FnMut(Instruction) + Send + 'static>;

/// Handle to a running drain loop. Aborts the loop when dropped.
pub(crate) struct DrainTask {
    closed: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DrainTask {
    /// Spawn on the current tokio runtime.
    pub(crate) fn spawn(
        consumer: Consumer,
        program_capacity: usize,
        callback: InstructionCallback,
        ack: oneshot::Sender<()>,
        state: Arc<Mutex<HandshakeState>>,
        stats: Arc<EngineStats>,
    ) -> Self {
        let closed = Arc::new(AtomicBool::new(false));
        let drain = DrainLoop {
            consumer,
            program: vec![0; program_capacity],
            carry: Reassembler::new(),
            callback,
            ack: Some(ack),
            state,
            stats,
            closed: Arc::clone(&closed),
        };
        Self {
            closed,
            handle: Some(tokio::spawn(drain.run())),
        }
    }

    /// Stop the loop and wait until it can no longer invoke the callback.
    pub(crate) async fn stop(mut self) {
        self.closed.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            if let Err(e) = handle.await {
                if e.is_panic() {
                    tracing::error!("instruction callback panicked");
                }
            }
        }
    }
}

impl Drop for DrainTask {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

struct DrainLoop {
    consumer: Consumer,
    program: Vec<u8>,
    carry: Reassembler,
    callback: InstructionCallback,
    ack: Option<oneshot::Sender<()>>,
    state: Arc<Mutex<HandshakeState>>,
    stats: Arc<EngineStats>,
    closed: Arc<AtomicBool>,
}

impl DrainLoop {
    async fn run(mut self) {
        while !self.closed.load(Ordering::Acquire) {
            // Sample before reading so a write landing after the read still
            // changes the word we wait on.
            let observed = self.consumer.signal();
            let consumer = &mut self.consumer;
            let fill = self.carry.fill(&mut self.program, |dst| consumer.read(dst));

            if fill.read == 0 {
                self.consumer.wait(observed).await;
                continue;
            }
            if !self.dispatch(fill.complete) {
                return;
            }
        }
    }

    /// Route the whole instructions at the front of the program buffer.
    /// Returns `false` once the engine has been shut down.
    fn dispatch(&mut self, complete: usize) -> bool {
        for item in codec::decode(&self.program[..complete]) {
            let instruction = match item {
                Ok(instruction) => instruction,
                Err(e) => {
                    self.stats.record_protocol_error();
                    tracing::warn!(error = %e, "discarding malformed instruction bytes");
                    continue;
                }
            };

            if instruction.is(Opcode::BootstrapFinished) {
                match self.ack.take() {
                    Some(ack) => {
                        if !self.acknowledge(ack) {
                            return false;
                        }
                    }
                    None => {
                        self.stats.record_duplicate_ack();
                        tracing::warn!("ignoring duplicate bootstrap acknowledgement");
                    }
                }
                continue;
            }

            if self.ack.is_some() {
                self.stats.record_dropped_before_ready();
                tracing::debug!(
                    opcode = instruction.opcode(),
                    "dropping instruction received before bootstrap"
                );
                continue;
            }

            if self.closed.load(Ordering::Acquire) {
                return false;
            }
            self.stats.record_received();
            (self.callback)(instruction);
        }
        true
    }

    /// Move the engine to `Ready` and wake `initialize`. Returns `false` if the
    /// handshake was abandoned before the acknowledgement arrived.
    fn acknowledge(&self, ack: oneshot::Sender<()>) -> bool {
        let mut state = self.state.lock();
        if *state != HandshakeState::AwaitingAck {
            let current: &HandshakeState = &state;
            tracing::warn!(state = %current, "bootstrap acknowledged after the handshake ended");
            return false;
        }
        *state = HandshakeState::Ready;
        drop(state);

        tracing::debug!("bootstrap acknowledged");
        let _ = ack.send(());
        true
    }
}
