//! The queue: one [`WriteSide`], one [`ReadSide`], the two published counters
//! their synchronizers sample, and the slot buffer.
//!
//! [`channel`] hands each domain its own handle. [`Queue`] keeps both handles
//! in one value for hosts that drive the two domains from a single loop.

use core::fmt;

use crate::buffer::SlotBuffer;
use crate::config::{ConfigError, FifoConfig};
use crate::counter::gray_to_binary;
use crate::read_side::ReadSide;
use crate::sync::Arc;
use crate::synchronizer::{PublishedCounter, Synchronizer};
use crate::write_side::WriteSide;

/// State reachable from both domains.
struct Shared<T> {
    /// Written by the producer, sampled by the consumer.
    write_published: PublishedCounter,
    /// Written by the consumer, sampled by the producer.
    read_published: PublishedCounter,
    buffer: SlotBuffer<T>,
    addr_bits: u32,
}

// SAFETY: a slot is only ever touched by the side whose counter currently
// owns it; ownership moves through the Release/Acquire published counters.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    fn status(&self) -> FifoStatus {
        let write_count = gray_to_binary(self.write_published.load());
        let read_count = gray_to_binary(self.read_published.load());
        let modulus = (1u64 << (self.addr_bits + 1)) - 1;
        FifoStatus {
            write_count,
            read_count,
            depth: self.buffer.depth(),
            len: (write_count.wrapping_sub(read_count) & modulus) as usize,
        }
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        let status = self.status();
        let address_mask = (1u64 << self.addr_bits) - 1;
        for offset in 0..status.len as u64 {
            let addr = (status.read_count.wrapping_add(offset) & address_mask) as usize;
            // SAFETY: slots between the read and write counters were written
            // and never taken; both handles are gone.
            unsafe { self.buffer.drop_slot(addr) };
        }
    }
}

/// Build a queue and split it into its producer and consumer handles.
pub fn channel<T>(config: FifoConfig) -> Result<(Producer<T>, Consumer<T>), ConfigError> {
    if let Err(err) = config.validate() {
        #[cfg(feature = "std")]
        tracing::warn!(?config, %err, "rejecting fifo configuration");
        return Err(err);
    }

    let shared = Arc::new(Shared {
        write_published: PublishedCounter::new(),
        read_published: PublishedCounter::new(),
        buffer: SlotBuffer::new(config.depth()),
        addr_bits: config.addr_bits,
    });

    #[cfg(feature = "std")]
    tracing::debug!(
        addr_bits = config.addr_bits,
        depth = config.depth(),
        almost_full = ?config.almost_full,
        almost_empty = ?config.almost_empty,
        "created fifo"
    );

    Ok((
        Producer {
            shared: shared.clone(),
            side: WriteSide::new(config.addr_bits, config.almost_full),
        },
        Consumer {
            shared,
            side: ReadSide::new(config.addr_bits, config.almost_empty),
        },
    ))
}

/// Returned by a rejected push; carries the item back untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fifo is full")
    }
}

impl<T: fmt::Debug> core::error::Error for Full<T> {}

/// Producer-domain handle.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
    side: WriteSide,
}

impl<T> Producer<T> {
    /// Push if the full flag allows it.
    ///
    /// Never blocks. On rejection nothing changes and the item comes back in
    /// [`Full`].
    pub fn try_push(&mut self, item: T) -> Result<(), Full<T>> {
        if self.side.is_full() {
            #[cfg(feature = "std")]
            tracing::trace!(write = self.side.counter().binary(), "push rejected");
            return Err(Full(item));
        }

        // SAFETY: not full means the consumer has published a read counter
        // past this slot (or never reached it), so it is vacant.
        unsafe { self.shared.buffer.write(self.side.address(), item) };
        self.side.commit(&self.shared.write_published);
        Ok(())
    }

    /// One producer-domain step.
    pub fn step(&mut self) {
        self.side.step(&self.shared.read_published);
    }

    /// Step until everything the consumer has published is reflected.
    pub fn settle(&mut self) {
        for _ in 0..Synchronizer::LATENCY {
            self.step();
        }
    }

    /// Returns true if the queue appears full from the producer domain.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.side.is_full()
    }

    #[inline]
    pub fn is_almost_full(&self) -> bool {
        self.side.is_almost_full()
    }

    /// Pushes guaranteed to succeed before the next step.
    #[inline]
    pub fn free_slots(&self) -> usize {
        self.side.free_slots()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.side.depth()
    }

    pub fn write_side(&self) -> &WriteSide {
        &self.side
    }

    pub fn status(&self) -> FifoStatus {
        self.shared.status()
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").field("side", &self.side).finish()
    }
}

/// Consumer-domain handle.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
    side: ReadSide,
}

impl<T> Consumer<T> {
    /// Pop if the empty flag allows it. Never blocks.
    pub fn try_pop(&mut self) -> Option<T> {
        if self.side.is_empty() {
            #[cfg(feature = "std")]
            tracing::trace!(read = self.side.counter().binary(), "pop rejected");
            return None;
        }

        // SAFETY: not empty means the producer published a write counter past
        // this slot, and that publish followed the slot write.
        let item = unsafe { self.shared.buffer.take(self.side.address()) };
        self.side.commit(&self.shared.read_published);
        Some(item)
    }

    /// One consumer-domain step.
    pub fn step(&mut self) {
        self.side.step(&self.shared.write_published);
    }

    /// Step until everything the producer has published is reflected.
    pub fn settle(&mut self) {
        for _ in 0..Synchronizer::LATENCY {
            self.step();
        }
    }

    /// Returns true if the queue appears empty from the consumer domain.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.side.is_empty()
    }

    #[inline]
    pub fn is_almost_empty(&self) -> bool {
        self.side.is_almost_empty()
    }

    /// Pops guaranteed to succeed before the next step.
    #[inline]
    pub fn pending(&self) -> usize {
        self.side.pending()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.side.depth()
    }

    pub fn read_side(&self) -> &ReadSide {
        &self.side
    }

    pub fn status(&self) -> FifoStatus {
        self.shared.status()
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer").field("side", &self.side).finish()
    }
}

/// Both domains in one value.
#[derive(Debug)]
pub struct Queue<T> {
    producer: Producer<T>,
    consumer: Consumer<T>,
}

impl<T> Queue<T> {
    /// Build a queue with both domains in their reset state.
    ///
    /// ```
    /// use cdc_fifo::{FifoConfig, Queue};
    ///
    /// let mut queue = Queue::new(FifoConfig::new(1)).unwrap();
    /// assert_eq!(queue.capacity(), 2);
    /// queue.try_push('a').unwrap();
    /// queue.try_push('b').unwrap();
    /// assert!(queue.is_full());
    ///
    /// // Nothing is visible to the consumer until it has stepped twice.
    /// assert_eq!(queue.try_pop(), None);
    /// queue.settle();
    /// assert_eq!(queue.try_pop(), Some('a'));
    /// assert_eq!(queue.status().len, 1);
    /// ```
    pub fn new(config: FifoConfig) -> Result<Self, ConfigError> {
        let (producer, consumer) = channel(config)?;
        Ok(Self { producer, consumer })
    }

    /// Push from the producer domain. See [`Producer::try_push`].
    pub fn try_push(&mut self, item: T) -> Result<(), Full<T>> {
        self.producer.try_push(item)
    }

    /// Pop from the consumer domain. See [`Consumer::try_pop`].
    pub fn try_pop(&mut self) -> Option<T> {
        self.consumer.try_pop()
    }

    /// The producer domain's full flag.
    pub fn is_full(&self) -> bool {
        self.producer.is_full()
    }

    /// The consumer domain's empty flag.
    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    /// Step both domains once.
    pub fn tick(&mut self) {
        self.producer.step();
        self.consumer.step();
    }

    /// Step both domains until each reflects everything the other published.
    pub fn settle(&mut self) {
        for _ in 0..Synchronizer::LATENCY {
            self.tick();
        }
    }

    /// Number of slots, `2^addr_bits`.
    pub fn capacity(&self) -> usize {
        self.producer.capacity()
    }

    /// Snapshot of both published counters.
    pub fn status(&self) -> FifoStatus {
        self.producer.status()
    }

    pub fn producer(&mut self) -> &mut Producer<T> {
        &mut self.producer
    }

    pub fn consumer(&mut self) -> &mut Consumer<T> {
        &mut self.consumer
    }

    /// Hand each domain its own handle.
    pub fn split(self) -> (Producer<T>, Consumer<T>) {
        #[cfg(feature = "std")]
        tracing::debug!(status = %self.status(), "splitting fifo");
        (self.producer, self.consumer)
    }
}

/// Snapshot of both published counters.
///
/// Taken from either domain, so each field is only as fresh as the last
/// publish the snapshotting thread has observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoStatus {
    /// Write counter in binary (wraps at `2 * depth`).
    pub write_count: u64,
    /// Read counter in binary (wraps at `2 * depth`).
    pub read_count: u64,
    pub depth: usize,
    /// Elements published and not yet taken.
    pub len: usize,
}

impl fmt::Display for FifoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "write={} read={} len={}/{} ({}%)",
            self.write_count,
            self.read_count,
            self.len,
            self.depth,
            self.len * 100 / self.depth
        )
    }
}
