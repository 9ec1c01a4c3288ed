//! Render-side counters.
//!
//! The render thread never logs on the hot path. It bumps these counters
//! instead and the control side reads them with [`RenderStats::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Counter snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderMetrics {
    /// Quanta rendered by the kernel.
    pub quanta: u64,
    /// Instruction bytes drained from the control side.
    pub inbound_bytes: u64,
    /// Response bytes forwarded to the control side.
    pub outbound_bytes: u64,
    /// Response bytes dropped because the outbound ring was full.
    pub dropped_bytes: u64,
    /// Quanta that took longer than their real-time budget.
    pub overruns: u64,
}

/// Lock-free render counters.
#[derive(Debug, Default)]
pub struct RenderStats {
    quanta: AtomicU64,
    inbound_bytes: AtomicU64,
    outbound_bytes: AtomicU64,
    dropped_bytes: AtomicU64,
    overruns: AtomicU64,
}

impl RenderStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_quantum(&self, inbound: usize) {
        self.quanta.fetch_add(1, Ordering::Relaxed);
        self.inbound_bytes
            .fetch_add(inbound as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_outbound(&self, bytes: usize) {
        self.outbound_bytes
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped(&self, bytes: usize) {
        self.dropped_bytes
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RenderMetrics {
        RenderMetrics {
            quanta: self.quanta.load(Ordering::Relaxed),
            inbound_bytes: self.inbound_bytes.load(Ordering::Relaxed),
            outbound_bytes: self.outbound_bytes.load(Ordering::Relaxed),
            dropped_bytes: self.dropped_bytes.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
        }
    }
}
