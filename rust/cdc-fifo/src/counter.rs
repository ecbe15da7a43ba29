//! Domain-local wrapping counters and their transmitted (Gray) encoding.
//!
//! A counter is `addr_bits + 1` bits wide. The low `addr_bits` bits address the
//! backing buffer; the extra top bit is the wrap parity that tells "caught up"
//! apart from "a full lap ahead" when both sides point at the same slot.
//!
//! The transmitted form is the reflected-binary code of the binary value, so
//! two consecutive transmitted values differ in exactly one bit.

use crate::config::MAX_ADDR_BITS;

/// Reflected-binary encoding: consecutive inputs map to outputs at Hamming distance 1.
#[inline]
pub const fn binary_to_gray(binary: u64) -> u64 {
    binary ^ (binary >> 1)
}

/// Inverse of [`binary_to_gray`].
#[inline]
pub const fn gray_to_binary(gray: u64) -> u64 {
    let mut binary = gray;
    binary ^= binary >> 1;
    binary ^= binary >> 2;
    binary ^= binary >> 4;
    binary ^= binary >> 8;
    binary ^= binary >> 16;
    binary ^= binary >> 32;
    binary
}

/// A monotonically wrapping counter owned by exactly one domain.
///
/// The binary and transmitted views are kept side by side, the way a pair of
/// registers would hold them; they are always updated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainCounter {
    binary: u64,
    transmitted: u64,
    addr_bits: u32,
}

impl DomainCounter {
    /// A zeroed counter for a buffer of `2^addr_bits` slots.
    ///
    /// # Panics
    ///
    /// Panics unless `1 <= addr_bits <= MAX_ADDR_BITS`, the range
    /// [`FifoConfig::validate`](crate::FifoConfig::validate) accepts.
    pub const fn new(addr_bits: u32) -> Self {
        assert!(
            addr_bits >= 1 && addr_bits <= MAX_ADDR_BITS,
            "addr_bits out of range"
        );
        Self {
            binary: 0,
            transmitted: 0,
            addr_bits,
        }
    }

    /// Advance by one, wrapping modulo `2^(addr_bits + 1)`.
    #[inline]
    pub fn increment(&mut self) {
        self.binary = self.binary.wrapping_add(1) & self.modulus_mask();
        self.transmitted = binary_to_gray(self.binary);
        debug_assert_eq!(gray_to_binary(self.transmitted), self.binary);
    }

    #[inline]
    pub const fn binary(&self) -> u64 {
        self.binary
    }

    /// The form that crosses into the other domain.
    #[inline]
    pub const fn transmitted(&self) -> u64 {
        self.transmitted
    }

    /// Buffer index: the low `addr_bits` bits of the binary value.
    #[inline]
    pub const fn address(&self) -> usize {
        (self.binary & self.address_mask()) as usize
    }

    /// The bit above the address, flipped once per lap of the buffer.
    #[inline]
    pub const fn wrap_bit(&self) -> bool {
        (self.binary >> self.addr_bits) & 1 == 1
    }

    #[inline]
    pub const fn addr_bits(&self) -> u32 {
        self.addr_bits
    }

    #[inline]
    pub const fn address_mask(&self) -> u64 {
        (1u64 << self.addr_bits) - 1
    }

    /// Mask covering all `addr_bits + 1` semantic bits.
    #[inline]
    pub const fn modulus_mask(&self) -> u64 {
        (1u64 << (self.addr_bits + 1)) - 1
    }

    /// Distance from `other` (binary) to this counter, modulo the counter range.
    #[inline]
    pub const fn distance_from(&self, other_binary: u64) -> u64 {
        self.binary.wrapping_sub(other_binary) & self.modulus_mask()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "addr_bits out of range")]
    fn new_rejects_zero_addr_bits() {
        let _ = DomainCounter::new(0);
    }

    #[test]
    #[should_panic(expected = "addr_bits out of range")]
    fn new_rejects_addr_bits_past_max() {
        let _ = DomainCounter::new(MAX_ADDR_BITS + 1);
    }

    #[test]
    fn new_accepts_max_addr_bits() {
        let counter = DomainCounter::new(MAX_ADDR_BITS);
        assert_eq!(counter.address_mask(), (1 << MAX_ADDR_BITS) - 1);
    }

    #[test]
    fn gray_round_trips_across_the_counter_range() {
        for value in 0..4096u64 {
            assert_eq!(gray_to_binary(binary_to_gray(value)), value);
        }
        assert_eq!(gray_to_binary(binary_to_gray(u64::MAX)), u64::MAX);
    }

    #[test]
    fn consecutive_transmitted_values_differ_in_one_bit() {
        for addr_bits in 1..=6 {
            let mut counter = DomainCounter::new(addr_bits);
            let range = 1u64 << (addr_bits + 1);
            for _ in 0..range * 2 {
                let before = counter.transmitted();
                counter.increment();
                let after = counter.transmitted();
                assert_eq!(
                    (before ^ after).count_ones(),
                    1,
                    "addr_bits={addr_bits} {before:#b} -> {after:#b}"
                );
            }
        }
    }

    #[test]
    fn counter_wraps_after_two_laps() {
        let mut counter = DomainCounter::new(2);
        for _ in 0..4 {
            counter.increment();
        }
        assert_eq!(counter.address(), 0);
        assert!(counter.wrap_bit());
        for _ in 0..4 {
            counter.increment();
        }
        assert_eq!(counter.binary(), 0);
        assert_eq!(counter.transmitted(), 0);
        assert!(!counter.wrap_bit());
    }

    #[test]
    fn address_is_low_bits() {
        let mut counter = DomainCounter::new(3);
        for expected in [1usize, 2, 3, 4, 5, 6, 7, 0, 1] {
            counter.increment();
            assert_eq!(counter.address(), expected);
        }
    }

    #[test]
    fn distance_wraps() {
        let mut write = DomainCounter::new(2);
        for _ in 0..9 {
            write.increment();
        }
        // write = 9 mod 8 = 1, read = 6: three items outstanding.
        assert_eq!(write.distance_from(6), 3);
    }
}
