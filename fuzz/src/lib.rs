//! Fuzzing harnesses for cdc-fifo.
//!
//! The queue is driven from a single thread with arbitrary interleavings of
//! pushes, pops and per-domain steps, and checked against an exact model of
//! what each domain is allowed to see.

pub mod fifo_model;
