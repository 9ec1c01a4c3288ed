//! Control-side counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter snapshot returned by [`Engine::stats`](crate::Engine::stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineMetrics {
    pub instructions_sent: u64,
    pub bytes_sent: u64,
    /// Sends rejected because the outbound segment was full.
    pub saturated: u64,
    /// Instructions delivered to the callback.
    pub instructions_received: u64,
    /// Bootstrap acknowledgements after the first.
    pub duplicate_acks: u64,
    /// Instructions that arrived before the acknowledgement.
    pub dropped_before_ready: u64,
    pub protocol_errors: u64,
}

#[derive(Debug, Default)]
pub(crate) struct EngineStats {
    instructions_sent: AtomicU64,
    bytes_sent: AtomicU64,
    saturated: AtomicU64,
    instructions_received: AtomicU64,
    duplicate_acks: AtomicU64,
    dropped_before_ready: AtomicU64,
    protocol_errors: AtomicU64,
}

impl EngineStats {
    pub(crate) fn record_sent(&self, instructions: usize, bytes: usize) {
        self.instructions_sent
            .fetch_add(instructions as u64, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_saturated(&self) {
        self.saturated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self) {
        self.instructions_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate_ack(&self) {
        self.duplicate_acks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_before_ready(&self) {
        self.dropped_before_ready.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> EngineMetrics {
        EngineMetrics {
            instructions_sent: self.instructions_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            saturated: self.saturated.load(Ordering::Relaxed),
            instructions_received: self.instructions_received.load(Ordering::Relaxed),
            duplicate_acks: self.duplicate_acks.load(Ordering::Relaxed),
            dropped_before_ready: self.dropped_before_ready.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
        }
    }
}
