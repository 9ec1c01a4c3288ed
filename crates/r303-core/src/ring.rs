//! Single-producer single-consumer byte ring over a fixed shared segment.
//!
//! A segment is an 8-byte header followed by the data region:
//!
//! ```text
//! offset 0  read cursor   (u32, owned by the consumer)
//! offset 4  write cursor  (u32, owned by the producer, doubles as the signal word)
//! offset 8  data[capacity]
//! ```
//!
//! Cursors are indices into the data region in `[0, capacity)`. The buffer is
//! empty when `read == write` and full when `(write + 1) % capacity == read`,
//! so at most `capacity - 1` bytes are in flight.
//!
//! Neither side ever blocks or allocates in [`Producer::write`] or
//! [`Consumer::read`]. The consumer may await a change of the signal word with
//! [`Consumer::wait`], which is how the control side sleeps between bursts.

use crate::error::{Error, Result, Role};
use futures::task::AtomicWaker;
use std::cell::UnsafeCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

/// Size of the cursor header at the front of every segment.
pub const HEADER_BYTES: usize = 8;

/// Smallest usable segment: the header plus room for one byte in flight.
pub const MIN_SEGMENT_BYTES: usize = HEADER_BYTES + 2;

/// Shared segment backing one direction of the bridge.
///
/// Create it once, then split it into exactly one [`Producer`] and one
/// [`Consumer`]. The segment itself is shared through `Arc` and can be handed
/// to another thread as part of the bootstrap message.
pub struct RingBuffer {
    read: AtomicU32,
    write: AtomicU32,
    data: Box<[UnsafeCell<u8>]>,
    waker: AtomicWaker,
    producer_taken: AtomicBool,
    consumer_taken: AtomicBool,
}

// SAFETY: the data region is only written by the single Producer in the free
// range and only read by the single Consumer in the filled range. The cursor
// stores with Release and loads with Acquire order those accesses, and role
// claiming guarantees at most one handle of each kind exists.
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Allocate a segment of `segment_bytes` total bytes, header included.
    pub fn new(segment_bytes: usize) -> Result<Arc<Self>> {
        if segment_bytes < MIN_SEGMENT_BYTES {
            return Err(Error::SegmentTooSmall {
                len: segment_bytes,
                min: MIN_SEGMENT_BYTES,
            });
        }
        let capacity = segment_bytes - HEADER_BYTES;
        if u32::try_from(capacity).is_err() {
            return Err(Error::SegmentTooLarge { len: segment_bytes });
        }

        let data = (0..capacity).map(|_| UnsafeCell::new(0u8)).collect();
        Ok(Arc::new(Self {
            read: AtomicU32::new(0),
            write: AtomicU32::new(0),
            data,
            waker: AtomicWaker::new(),
            producer_taken: AtomicBool::new(false),
            consumer_taken: AtomicBool::new(false),
        }))
    }

    /// Size of the data region. One byte of it is never usable.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Total segment size, header included.
    #[inline]
    pub fn segment_bytes(&self) -> usize {
        self.data.len() + HEADER_BYTES
    }

    /// Claim the producer end. Fails if a producer handle is alive.
    pub fn producer(self: &Arc<Self>) -> Result<Producer> {
        if self.producer_taken.swap(true, Ordering::AcqRel) {
            return Err(Error::RoleTaken(Role::Producer));
        }
        Ok(Producer {
            ring: Arc::clone(self),
        })
    }

    /// Claim the consumer end. Fails if a consumer handle is alive.
    pub fn consumer(self: &Arc<Self>) -> Result<Consumer> {
        if self.consumer_taken.swap(true, Ordering::AcqRel) {
            return Err(Error::RoleTaken(Role::Consumer));
        }
        Ok(Consumer {
            ring: Arc::clone(self),
        })
    }

    /// Bytes currently in flight.
    pub fn len(&self) -> usize {
        let read = self.read.load(Ordering::Acquire) as usize;
        let write = self.write.load(Ordering::Acquire) as usize;
        filled(read, write, self.capacity())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current value of the signal word.
    #[inline]
    pub fn signal(&self) -> u32 {
        self.write.load(Ordering::Acquire)
    }

    #[inline]
    fn data_ptr(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.data.as_ptr())
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("read", &self.read.load(Ordering::Relaxed))
            .field("write", &self.write.load(Ordering::Relaxed))
            .finish()
    }
}

#[inline]
fn filled(read: usize, write: usize, capacity: usize) -> usize {
    if write >= read {
        write - read
    } else {
        write + capacity - read
    }
}

/// Writing end of a [`RingBuffer`].
#[derive(Debug)]
pub struct Producer {
    ring: Arc<RingBuffer>,
}

impl Producer {
    /// Copy up to `src.len()` bytes into the ring, returning how many fit.
    ///
    /// Payload bytes are in place before the write cursor is published, and
    /// the consumer is woken after every non-empty write. A zero-length write
    /// is a no-op and does not wake anyone.
    pub fn write(&mut self, src: &[u8]) -> usize {
        let ring = &*self.ring;
        let capacity = ring.capacity();
        let read = ring.read.load(Ordering::Acquire) as usize;
        let write = ring.write.load(Ordering::Acquire) as usize;

        let free = capacity - 1 - filled(read, write, capacity);
        let count = free.min(src.len());
        if count == 0 {
            return 0;
        }

        let first = count.min(capacity - write);
        let second = count - first;
        // SAFETY: [write, write + first) and [0, second) lie in the free region,
        // which the consumer does not touch until the cursor store below.
        unsafe {
            let base = ring.data_ptr();
            std::ptr::copy_nonoverlapping(src.as_ptr(), base.add(write), first);
            if second > 0 {
                std::ptr::copy_nonoverlapping(src.as_ptr().add(first), base, second);
            }
        }

        ring.write
            .store(((write + count) % capacity) as u32, Ordering::Release);
        ring.waker.wake();
        count
    }

    /// Write all of `src` or nothing. Returns `false` if it does not fit.
    pub fn write_exact(&mut self, src: &[u8]) -> bool {
        if src.len() > self.free_space() {
            return false;
        }
        self.write(src) == src.len()
    }

    /// Bytes that can be written right now.
    pub fn free_space(&self) -> usize {
        let ring = &*self.ring;
        ring.capacity() - 1 - ring.len()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn ring(&self) -> &Arc<RingBuffer> {
        &self.ring
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.ring.producer_taken.store(false, Ordering::Release);
    }
}

/// Reading end of a [`RingBuffer`].
#[derive(Debug)]
pub struct Consumer {
    ring: Arc<RingBuffer>,
}

impl Consumer {
    /// Copy up to `dst.len()` bytes out of the ring, returning how many were read.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let ring = &*self.ring;
        let capacity = ring.capacity();
        let read = ring.read.load(Ordering::Acquire) as usize;
        let write = ring.write.load(Ordering::Acquire) as usize;

        let count = filled(read, write, capacity).min(dst.len());
        if count == 0 {
            return 0;
        }

        let first = count.min(capacity - read);
        let second = count - first;
        // SAFETY: [read, read + first) and [0, second) lie in the filled region,
        // published by the producer's Release store of the write cursor.
        unsafe {
            let base = ring.data_ptr();
            std::ptr::copy_nonoverlapping(base.add(read), dst.as_mut_ptr(), first);
            if second > 0 {
                std::ptr::copy_nonoverlapping(base, dst.as_mut_ptr().add(first), second);
            }
        }

        ring.read
            .store(((read + count) % capacity) as u32, Ordering::Release);
        count
    }

    /// Bytes available to read right now.
    pub fn available(&self) -> usize {
        self.ring.len()
    }

    /// Current value of the signal word.
    ///
    /// Sample it before draining, then pass it to [`wait`](Self::wait) if the
    /// drain came up empty. Any write after the sample changes the word, so no
    /// wakeup is lost between the drain and the wait.
    #[inline]
    pub fn signal(&self) -> u32 {
        self.ring.signal()
    }

    /// Resolve once the signal word differs from `observed`.
    pub fn wait(&self, observed: u32) -> SignalWait<'_> {
        SignalWait {
            ring: &self.ring,
            observed,
        }
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn ring(&self) -> &Arc<RingBuffer> {
        &self.ring
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.ring.consumer_taken.store(false, Ordering::Release);
    }
}

/// Future returned by [`Consumer::wait`].
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct SignalWait<'a> {
    ring: &'a RingBuffer,
    observed: u32,
}

impl Future for SignalWait<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.ring.signal() != self.observed {
            return Poll::Ready(());
        }
        self.ring.waker.register(cx.waker());
        // Re-check after registering so a write racing the registration is seen.
        if self.ring.signal() != self.observed {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}
