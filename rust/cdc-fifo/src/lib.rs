//! Bounded single-producer single-consumer queue for two domains that make
//! progress at unrelated rates.
//!
//! Neither side ever reads the other's state directly. Each side owns a
//! wrapping counter one bit wider than the buffer address, publishes its
//! transmitted (Gray) form, and imports the other side's counter through a
//! two-stage [`Synchronizer`]. "Full" and "empty" are computed only from the
//! local counter and that synchronized copy, so both flags are conservative:
//! the producer may see full a little early and the consumer may see empty a
//! little early, never the other way round.
//!
//! # Components
//!
//! - [`DomainCounter`]: binary counter plus its transmitted encoding
//! - [`Synchronizer`] / [`PublishedCounter`]: the cross-domain relay
//! - [`WriteSide`] / [`ReadSide`]: per-domain flag logic
//! - [`Queue`], [`Producer`], [`Consumer`]: the composed queue
//! - [`Beat`], [`stream`]: framed byte payloads carried through unchanged
//!
//! # Steps
//!
//! Each handle advances only when its domain calls `step()`. Pushes and pops
//! never step; a push becomes poppable after [`Synchronizer::LATENCY`]
//! consumer steps, and a pop frees space after as many producer steps.
//!
//! ```
//! use cdc_fifo::{FifoConfig, Queue};
//!
//! let mut queue = Queue::new(FifoConfig::new(2)).unwrap();
//! for item in ["a", "b", "c"] {
//!     queue.try_push(item).unwrap();
//! }
//! assert!(queue.try_pop().is_none()); // not synchronized yet
//! queue.settle();
//! assert_eq!(queue.try_pop(), Some("a"));
//! ```
//!
//! # Loom Testing
//!
//! The atomics, cells and `Arc` come from [`sync`], which switches to loom's
//! model-checked versions under `cfg(loom)`:
//!
//! ```text
//! RUSTFLAGS="--cfg loom" cargo test -p cdc-fifo --release loom
//! ```

#![no_std]

extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod beat;
mod buffer;
pub mod config;
pub mod counter;
pub mod fifo;
pub mod read_side;
pub mod sync;
pub mod synchronizer;
pub mod write_side;

pub use beat::{
    Beat, BeatError, KeepMask, StreamConsumer, StreamLayout, StreamProducer, StreamPushError,
    stream,
};
pub use config::{ConfigError, FifoConfig, MAX_ADDR_BITS, StreamConfig};
pub use counter::{DomainCounter, binary_to_gray, gray_to_binary};
pub use fifo::{Consumer, FifoStatus, Full, Producer, Queue, channel};
pub use read_side::ReadSide;
pub use synchronizer::{PublishedCounter, Synchronizer};
pub use write_side::WriteSide;
