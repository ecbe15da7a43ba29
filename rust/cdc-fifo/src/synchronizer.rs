//! Importing the other domain's counter.
//!
//! The owning side publishes its transmitted counter into a [`PublishedCounter`]
//! with a `Release` store. The receiving side runs a [`Synchronizer`]: a
//! two-register shift chain clocked once per local step. Stage 1 takes an
//! `Acquire` sample of the published word, stage 2 takes stage 1's previous
//! value, and only stage 2 is ever compared against.
//!
//! Every stage holds a whole word that the source actually stored, and stage 2
//! is never newer than the latest acquire, so anything the source wrote before
//! publishing is visible by the time stage 2 reports it.

use crate::counter::DomainCounter;
use crate::sync::{AtomicU64, Ordering};

/// The cell a domain publishes its transmitted counter into.
///
/// Written only by the owning domain, read only by the remote synchronizer.
#[repr(C, align(64))]
pub struct PublishedCounter {
    transmitted: AtomicU64,
}

impl PublishedCounter {
    pub fn new() -> Self {
        Self {
            transmitted: AtomicU64::new(0),
        }
    }

    /// Make `counter` visible to the other domain.
    ///
    /// Everything the caller wrote before this call happens-before any
    /// [`load`](Self::load) that observes the new value.
    #[inline]
    pub fn publish(&self, counter: &DomainCounter) {
        self.transmitted
            .store(counter.transmitted(), Ordering::Release);
    }

    #[inline]
    pub fn load(&self) -> u64 {
        self.transmitted.load(Ordering::Acquire)
    }
}

impl Default for PublishedCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for PublishedCounter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PublishedCounter")
            .field("transmitted", &self.load())
            .finish()
    }
}

/// Two-stage sampler of a remote transmitted counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Synchronizer {
    stage1: u64,
    stage2: u64,
}

impl Synchronizer {
    /// Local steps between a remote publish and its appearance at the output.
    pub const LATENCY: usize = 2;

    pub const fn new() -> Self {
        Self {
            stage1: 0,
            stage2: 0,
        }
    }

    /// One local step: stage 2 takes stage 1, stage 1 takes `incoming`.
    ///
    /// Returns the new output.
    #[inline]
    pub fn clock(&mut self, incoming: u64) -> u64 {
        self.stage2 = self.stage1;
        self.stage1 = incoming;
        self.stage2
    }

    /// One local step sampling `source`.
    #[inline]
    pub fn sample(&mut self, source: &PublishedCounter) -> u64 {
        self.clock(source.load())
    }

    /// The synchronized value: the only stage local logic may compare against.
    #[inline]
    pub const fn output(&self) -> u64 {
        self.stage2
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn output_lags_input_by_two_steps() {
        let mut sync = Synchronizer::new();
        assert_eq!(sync.clock(5), 0);
        assert_eq!(sync.clock(6), 5);
        assert_eq!(sync.clock(7), 6);
        assert_eq!(sync.output(), 6);
    }

    #[test]
    fn held_input_settles_after_latency() {
        let mut sync = Synchronizer::new();
        let mut seen = 0;
        for _ in 0..Synchronizer::LATENCY {
            assert_eq!(seen, 0);
            seen = sync.clock(9);
        }
        assert_eq!(seen, 9);
        assert_eq!(sync.clock(9), 9);
    }

    #[test]
    fn samples_published_counter() {
        let published = PublishedCounter::new();
        let mut counter = DomainCounter::new(3);
        let mut sync = Synchronizer::new();

        counter.increment();
        counter.increment();
        counter.increment();
        published.publish(&counter);

        assert_eq!(sync.sample(&published), 0);
        assert_eq!(sync.sample(&published), counter.transmitted());
    }

    #[test]
    fn every_output_was_a_published_value() {
        let published = PublishedCounter::new();
        let mut counter = DomainCounter::new(2);
        let mut sync = Synchronizer::new();
        let mut history = alloc::vec![counter.transmitted()];

        for round in 0..40 {
            if round % 3 != 0 {
                counter.increment();
                published.publish(&counter);
                history.push(counter.transmitted());
            }
            let out = sync.sample(&published);
            assert!(history.contains(&out));
        }
    }
}
