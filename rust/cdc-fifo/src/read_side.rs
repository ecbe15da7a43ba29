use crate::counter::{DomainCounter, gray_to_binary};
use crate::synchronizer::{PublishedCounter, Synchronizer};

/// Consumer-domain state: read counter, synchronized write counter, empty flag.
#[derive(Debug, Clone)]
pub struct ReadSide {
    counter: DomainCounter,
    write_sync: Synchronizer,
    empty: bool,
    almost_empty: bool,
    almost_empty_at: Option<usize>,
}

impl ReadSide {
    /// Reset state: read counter at zero, synchronizer cleared, empty.
    ///
    /// # Panics
    ///
    /// Panics if `addr_bits` is outside `1..=MAX_ADDR_BITS`; see [`DomainCounter::new`].
    pub fn new(addr_bits: u32, almost_empty_at: Option<usize>) -> Self {
        let mut side = Self {
            counter: DomainCounter::new(addr_bits),
            write_sync: Synchronizer::new(),
            empty: true,
            almost_empty: true,
            almost_empty_at,
        };
        side.register();
        side
    }

    /// Caught up: equal transmitted counters, wrap parity included.
    #[inline]
    pub const fn empty_predicate(read_transmitted: u64, write_transmitted: u64) -> bool {
        read_transmitted == write_transmitted
    }

    /// One consumer step: clock the write-counter synchronizer and re-register flags.
    pub fn step(&mut self, write_published: &PublishedCounter) {
        self.write_sync.sample(write_published);
        self.register();
    }

    /// Account for one accepted read and publish the new counter.
    ///
    /// The caller must have moved the slot at [`address`](Self::address) out
    /// before calling this, and must only call it while not empty.
    pub fn commit(&mut self, read_published: &PublishedCounter) {
        debug_assert!(!self.empty, "commit while empty");
        self.counter.increment();
        read_published.publish(&self.counter);
        self.register();
    }

    /// Returns true if the consumer must not read. May stay set for up to
    /// two steps after data arrives.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    #[inline]
    pub fn is_almost_empty(&self) -> bool {
        self.almost_empty
    }

    /// Slot the next accepted read comes from.
    #[inline]
    pub fn address(&self) -> usize {
        self.counter.address()
    }

    /// The consumer's own read counter.
    #[inline]
    pub fn counter(&self) -> &DomainCounter {
        &self.counter
    }

    /// The write counter as last synchronized, in binary.
    #[inline]
    pub fn synced_write(&self) -> u64 {
        gray_to_binary(self.write_sync.output())
    }

    /// Readable slots as seen from this domain. Never over-reports.
    #[inline]
    pub fn pending(&self) -> usize {
        let write = self.synced_write();
        (write.wrapping_sub(self.counter.binary()) & self.counter.modulus_mask()) as usize
    }

    /// Number of slots.
    pub fn depth(&self) -> usize {
        1usize << self.counter.addr_bits()
    }

    fn register(&mut self) {
        let empty = Self::empty_predicate(self.counter.transmitted(), self.write_sync.output());
        debug_assert_eq!(empty, self.pending() == 0);
        #[cfg(feature = "std")]
        if empty != self.empty {
            tracing::trace!(empty, read = self.counter.binary(), "empty flag");
        }
        self.empty = empty;
        self.almost_empty = match self.almost_empty_at {
            Some(threshold) => self.pending() <= threshold,
            None => empty,
        };
    }
}
