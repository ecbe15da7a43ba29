use crate::counter::{DomainCounter, gray_to_binary};
use crate::synchronizer::{PublishedCounter, Synchronizer};

/// Producer-domain state: write counter, synchronized read counter, full flag.
///
/// All of it is owned by the producer domain. The only thing that leaves the
/// domain is the transmitted write counter, through [`commit`](Self::commit).
#[derive(Debug, Clone)]
pub struct WriteSide {
    counter: DomainCounter,
    read_sync: Synchronizer,
    full: bool,
    almost_full: bool,
    almost_full_at: Option<usize>,
}

impl WriteSide {
    /// Reset state: write counter at zero, synchronizer cleared, not full.
    ///
    /// # Panics
    ///
    /// Panics if `addr_bits` is outside `1..=MAX_ADDR_BITS`; see [`DomainCounter::new`].
    pub fn new(addr_bits: u32, almost_full_at: Option<usize>) -> Self {
        let mut side = Self {
            counter: DomainCounter::new(addr_bits),
            read_sync: Synchronizer::new(),
            full: false,
            almost_full: false,
            almost_full_at,
        };
        side.register();
        side
    }

    /// Gray-code test for "same address, one more lap": the write counter
    /// equals the read counter with its two most significant bits inverted.
    ///
    /// # Panics
    ///
    /// Panics if `addr_bits` is zero: a counter needs an address bit below
    /// its wrap bit.
    #[inline]
    pub const fn full_predicate(addr_bits: u32, write_transmitted: u64, read_transmitted: u64) -> bool {
        assert!(addr_bits >= 1, "addr_bits must be at least 1");
        let top_two = 0b11u64 << (addr_bits - 1);
        write_transmitted == read_transmitted ^ top_two
    }

    /// One producer step: clock the read-counter synchronizer and re-register flags.
    pub fn step(&mut self, read_published: &PublishedCounter) {
        self.read_sync.sample(read_published);
        self.register();
    }

    /// Account for one accepted write and publish the new counter.
    ///
    /// The caller must have written the slot at [`address`](Self::address)
    /// before calling this, and must only call it while not full.
    pub fn commit(&mut self, write_published: &PublishedCounter) {
        debug_assert!(!self.full, "commit while full");
        self.counter.increment();
        write_published.publish(&self.counter);
        self.register();
    }

    /// Returns true if the producer must not write. May stay set for up to
    /// two steps after space frees up.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Occupancy has reached the almost-full threshold, or full without one.
    #[inline]
    pub fn is_almost_full(&self) -> bool {
        self.almost_full
    }

    /// Slot the next accepted write lands in.
    #[inline]
    pub fn address(&self) -> usize {
        self.counter.address()
    }

    #[inline]
    pub fn counter(&self) -> &DomainCounter {
        &self.counter
    }

    /// The read counter as last synchronized, in binary.
    #[inline]
    pub fn synced_read(&self) -> u64 {
        gray_to_binary(self.read_sync.output())
    }

    /// Occupied slots as seen from this domain. Never under-reports.
    #[inline]
    pub fn occupancy(&self) -> usize {
        self.counter.distance_from(self.synced_read()) as usize
    }

    /// Number of slots.
    pub fn depth(&self) -> usize {
        1usize << self.counter.addr_bits()
    }

    /// Slots this domain may still write before re-synchronizing. Never over-reports.
    pub fn free_slots(&self) -> usize {
        self.depth() - self.occupancy()
    }

    fn register(&mut self) {
        let full = Self::full_predicate(
            self.counter.addr_bits(),
            self.counter.transmitted(),
            self.read_sync.output(),
        );
        debug_assert_eq!(full, self.occupancy() == self.depth());
        #[cfg(feature = "std")]
        if full != self.full {
            tracing::trace!(full, write = self.counter.binary(), "full flag");
        }
        self.full = full;
        self.almost_full = match self.almost_full_at {
            Some(threshold) => self.occupancy() >= threshold,
            None => full,
        };
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    fn push(side: &mut WriteSide, published: &PublishedCounter) {
        assert!(!side.is_full());
        side.commit(published);
    }

    #[test]
    fn starts_empty_and_not_full() {
        let side = WriteSide::new(2, None);
        assert!(!side.is_full());
        assert_eq!(side.address(), 0);
        assert_eq!(side.free_slots(), 4);
    }

    #[test]
    fn full_after_depth_writes() {
        let write = PublishedCounter::new();
        let mut side = WriteSide::new(2, None);
        for expected_addr in 0..4 {
            assert_eq!(side.address(), expected_addr);
            push(&mut side, &write);
        }
        assert!(side.is_full());
        assert_eq!(side.free_slots(), 0);
        assert_eq!(write.load(), side.counter().transmitted());
    }

    #[test]
    fn space_reappears_after_two_steps() {
        let write = PublishedCounter::new();
        let read = PublishedCounter::new();
        let mut side = WriteSide::new(2, None);
        for _ in 0..4 {
            push(&mut side, &write);
        }

        let mut reader = DomainCounter::new(2);
        reader.increment();
        read.publish(&reader);

        side.step(&read);
        assert!(side.is_full(), "space visible after a single step");
        side.step(&read);
        assert!(!side.is_full());
        assert_eq!(side.free_slots(), 1);
    }

    #[test]
    fn gray_full_test_matches_binary_wrap_parity() {
        for addr_bits in 1..=5u32 {
            let range = 1u64 << (addr_bits + 1);
            let depth = 1u64 << addr_bits;
            for write in 0..range {
                for read in 0..range {
                    let by_gray = WriteSide::full_predicate(
                        addr_bits,
                        crate::counter::binary_to_gray(write),
                        crate::counter::binary_to_gray(read),
                    );
                    let same_address = (write ^ read) & (depth - 1) == 0;
                    let opposite_wrap = ((write ^ read) >> addr_bits) & 1 == 1;
                    assert_eq!(by_gray, same_address && opposite_wrap, "w={write} r={read}");
                }
            }
        }
    }

    #[test]
    fn almost_full_threshold() {
        let write = PublishedCounter::new();
        let mut side = WriteSide::new(3, Some(6));
        for _ in 0..5 {
            push(&mut side, &write);
        }
        assert!(!side.is_almost_full());
        push(&mut side, &write);
        assert!(side.is_almost_full());
        assert!(!side.is_full());
    }

    #[test]
    #[should_panic(expected = "addr_bits must be at least 1")]
    fn full_predicate_rejects_zero_addr_bits() {
        let _ = WriteSide::full_predicate(0, 0, 0);
    }

    #[test]
    #[should_panic(expected = "addr_bits out of range")]
    fn new_rejects_addr_bits_past_max() {
        let _ = WriteSide::new(crate::config::MAX_ADDR_BITS + 1, None);
    }
}
