use alloc::boxed::Box;
use core::mem::MaybeUninit;

use crate::sync::UnsafeCell;

/// Backing storage: `depth` slots with a write port and a read port.
///
/// The buffer itself tracks nothing. Which slots hold a value is decided by the
/// two counters; the unsafe methods rely on the caller to honor that.
pub(crate) struct SlotBuffer<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

impl<T> SlotBuffer<T> {
    pub(crate) fn new(depth: usize) -> Self {
        let slots = (0..depth)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();
        Self { slots }
    }

    #[inline]
    pub(crate) fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Write port.
    ///
    /// # Safety
    ///
    /// The slot must be vacant (never written, or already taken) and the
    /// consumer must not be able to reach it until the write counter that
    /// covers it is published.
    #[inline]
    pub(crate) unsafe fn write(&self, addr: usize, value: T) {
        self.slots[addr].with_mut(|slot| unsafe {
            (*slot).write(value);
        });
    }

    /// Read port. Moves the value out, leaving the slot vacant.
    ///
    /// # Safety
    ///
    /// The slot must hold a value published by the producer, and the producer
    /// must not be able to reuse it until the read counter moving past it is
    /// published.
    #[inline]
    pub(crate) unsafe fn take(&self, addr: usize) -> T {
        self.slots[addr].with(|slot| unsafe { (*slot).assume_init_read() })
    }

    /// Drop the value in a slot during teardown.
    ///
    /// # Safety
    ///
    /// The slot must hold a value that nothing else will read.
    pub(crate) unsafe fn drop_slot(&mut self, addr: usize) {
        self.slots[addr].with_mut(|slot| unsafe { (*slot).assume_init_drop() });
    }
}
