//! Exact model of a cdc-fifo driven from one thread.
//!
//! Besides the contents, the model tracks how many steps each domain has taken
//! since every push and pop. That pins down precisely when the synchronized
//! copies catch up, so the flags can be checked for equality rather than just
//! for the conservative direction.

use std::collections::VecDeque;

use cdc_fifo::{Consumer, FifoConfig, Producer, Synchronizer, channel};

/// Smallest `addr_bits` exercised.
pub const MIN_ADDR_BITS: u32 = 1;
/// Largest `addr_bits` exercised (keep small to find wrap edge cases faster).
pub const MAX_ADDR_BITS: u32 = 5;

/// Operations either domain can perform.
#[derive(Clone, Copy, Debug)]
pub enum FifoOp {
    Push(u64),
    Pop,
    ProducerStep,
    ConsumerStep,
}

impl FifoOp {
    /// Map an arbitrary byte and value onto an op.
    pub fn from_raw(kind: u8, value: u64) -> Self {
        match kind % 4 {
            0 => FifoOp::Push(value),
            1 => FifoOp::Pop,
            2 => FifoOp::ProducerStep,
            _ => FifoOp::ConsumerStep,
        }
    }
}

/// Map an arbitrary byte onto a supported `addr_bits`.
pub fn addr_bits_from_raw(raw: u8) -> u32 {
    MIN_ADDR_BITS + raw as u32 % (MAX_ADDR_BITS - MIN_ADDR_BITS + 1)
}

struct Pending {
    value: u64,
    /// Consumer steps taken when this item was pushed.
    pushed_at: u64,
}

/// The queue under test plus everything needed to predict its flags.
pub struct FifoModel {
    producer: Producer<u64>,
    consumer: Consumer<u64>,
    depth: usize,
    contents: VecDeque<Pending>,
    producer_steps: u64,
    consumer_steps: u64,
    /// Producer steps taken at each pop the producer has not yet synchronized.
    unseen_pops: VecDeque<u64>,
    pushed: u64,
    seen_pops: u64,
}

impl FifoModel {
    pub fn new(addr_bits: u32) -> Self {
        let (producer, consumer) =
            channel(FifoConfig::new(addr_bits)).expect("fuzz addr_bits are always valid");
        Self {
            producer,
            consumer,
            depth: 1 << addr_bits,
            contents: VecDeque::new(),
            producer_steps: 0,
            consumer_steps: 0,
            unseen_pops: VecDeque::new(),
            pushed: 0,
            seen_pops: 0,
        }
    }

    fn latency() -> u64 {
        Synchronizer::LATENCY as u64
    }

    /// The producer's view: pushes minus the pops it has synchronized.
    fn expected_full(&self) -> bool {
        (self.pushed - self.seen_pops) as usize == self.depth
    }

    /// The consumer sees the head item once it has stepped `LATENCY` times since the push.
    fn expected_empty(&self) -> bool {
        match self.contents.front() {
            Some(head) => self.consumer_steps - head.pushed_at < Self::latency(),
            None => true,
        }
    }

    pub fn apply(&mut self, index: usize, op: FifoOp) -> Result<(), String> {
        match op {
            FifoOp::Push(value) => {
                let expect_accept = !self.expected_full();
                let accepted = self.producer.try_push(value).is_ok();
                if accepted != expect_accept {
                    return Err(format!(
                        "op {index}: push accepted={accepted}, expected {expect_accept} (len {}, depth {})",
                        self.contents.len(),
                        self.depth
                    ));
                }
                if accepted {
                    if self.contents.len() >= self.depth {
                        return Err(format!("op {index}: push overwrote unread data"));
                    }
                    self.contents.push_back(Pending {
                        value,
                        pushed_at: self.consumer_steps,
                    });
                    self.pushed += 1;
                }
            }
            FifoOp::Pop => {
                let expect_some = !self.expected_empty();
                match (self.consumer.try_pop(), expect_some) {
                    (Some(value), true) => {
                        let head = self.contents.pop_front().map(|p| p.value);
                        if head != Some(value) {
                            return Err(format!("op {index}: popped {value}, expected {head:?}"));
                        }
                        self.unseen_pops.push_back(self.producer_steps);
                    }
                    (None, false) => {}
                    (Some(value), false) => {
                        return Err(format!(
                            "op {index}: popped {value} before it was synchronized"
                        ));
                    }
                    (None, true) => {
                        return Err(format!(
                            "op {index}: pop returned none with {} items visible",
                            self.contents.len()
                        ));
                    }
                }
            }
            FifoOp::ProducerStep => {
                self.producer.step();
                self.producer_steps += 1;
                while let Some(&popped_at) = self.unseen_pops.front() {
                    if self.producer_steps - popped_at < Self::latency() {
                        break;
                    }
                    self.unseen_pops.pop_front();
                    self.seen_pops += 1;
                }
            }
            FifoOp::ConsumerStep => {
                self.consumer.step();
                self.consumer_steps += 1;
            }
        }
        self.verify(index)
    }

    fn verify(&self, index: usize) -> Result<(), String> {
        if self.contents.len() > self.depth {
            return Err(format!(
                "after op {index}: {} items held, depth {}",
                self.contents.len(),
                self.depth
            ));
        }
        if self.producer.is_full() != self.expected_full() {
            return Err(format!(
                "after op {index}: is_full={} but model says {}",
                self.producer.is_full(),
                self.expected_full()
            ));
        }
        if self.consumer.is_empty() != self.expected_empty() {
            return Err(format!(
                "after op {index}: is_empty={} but model says {}",
                self.consumer.is_empty(),
                self.expected_empty()
            ));
        }
        let status = self.producer.status();
        if status.len != self.contents.len() {
            return Err(format!(
                "after op {index}: status len {} but {} items held",
                status.len,
                self.contents.len()
            ));
        }
        Ok(())
    }

    /// Settle both domains and drain, checking nothing was lost.
    pub fn finish(mut self) -> Result<(), String> {
        for _ in 0..Synchronizer::LATENCY {
            self.apply(usize::MAX, FifoOp::ProducerStep)?;
            self.apply(usize::MAX, FifoOp::ConsumerStep)?;
        }
        while !self.contents.is_empty() {
            self.apply(usize::MAX, FifoOp::Pop)?;
        }
        if self.consumer.try_pop().is_some() {
            return Err("drained queue produced an extra item".to_string());
        }
        Ok(())
    }
}

/// Execute a sequence of operations and verify invariants after each one.
pub fn execute_and_verify(addr_bits: u32, ops: &[FifoOp]) -> Result<(), String> {
    let mut model = FifoModel::new(addr_bits);
    for (index, op) in ops.iter().enumerate() {
        model.apply(index, *op)?;
    }
    model.finish()
}

/// Drive the queue in rounds of `(producer_steps, consumer_steps, pushes, pops)`,
/// each count taken modulo 8, so one domain can run far ahead of the other.
pub fn execute_rounds(addr_bits: u32, rounds: &[(u8, u8, u8, u8)]) -> Result<(), String> {
    let mut model = FifoModel::new(addr_bits);
    let mut index = 0;
    let mut next = 0u64;
    for &(producer_steps, consumer_steps, pushes, pops) in rounds {
        let mut ops = Vec::new();
        ops.extend((0..producer_steps % 8).map(|_| FifoOp::ProducerStep));
        for _ in 0..pushes % 8 {
            ops.push(FifoOp::Push(next));
            next += 1;
        }
        ops.extend((0..consumer_steps % 8).map(|_| FifoOp::ConsumerStep));
        ops.extend((0..pops % 8).map(|_| FifoOp::Pop));
        for op in ops {
            model.apply(index, op)?;
            index += 1;
        }
    }
    model.finish()
}
