#![cfg(not(loom))]

use std::collections::VecDeque;
use std::thread;

use cdc_fifo::{FifoConfig, Queue, Synchronizer, channel};
use rand::{Rng, SeedableRng, rngs::StdRng};

#[test]
fn empty_on_start() {
    let mut queue = Queue::<u32>::new(FifoConfig::new(3)).unwrap();
    assert!(queue.is_empty());
    assert!(!queue.is_full());
    assert_eq!(queue.try_pop(), None);
    queue.settle();
    assert!(queue.is_empty());
    assert_eq!(queue.try_pop(), None);
}

#[test]
fn round_trip_preserves_order() {
    let mut queue = Queue::new(FifoConfig::new(2)).unwrap();
    for item in ['a', 'b', 'c'] {
        assert!(queue.try_push(item).is_ok());
    }
    queue.settle();
    let popped: Vec<_> = (0..3).map(|_| queue.try_pop()).collect();
    assert_eq!(popped, [Some('a'), Some('b'), Some('c')]);
    assert_eq!(queue.try_pop(), None);
}

#[test]
fn full_then_drain() {
    let mut queue = Queue::new(FifoConfig::new(2)).unwrap();
    assert_eq!(queue.capacity(), 4);
    for item in 1..=4u32 {
        assert!(queue.try_push(item).is_ok(), "push {item}");
    }
    assert!(queue.is_full());

    let before = queue.status();
    assert_eq!(queue.try_push(5).unwrap_err().into_inner(), 5);
    assert_eq!(queue.status(), before);

    queue.settle();
    assert_eq!(queue.try_pop(), Some(1));
    queue.settle();
    assert!(!queue.is_full());
    assert!(queue.try_push(5).is_ok());
    assert!(queue.is_full());

    queue.settle();
    let drained: Vec<_> = std::iter::from_fn(|| queue.try_pop()).collect();
    assert_eq!(drained, [2, 3, 4, 5]);
}

#[test]
fn push_visible_after_exactly_two_consumer_steps() {
    let (mut producer, mut consumer) = channel::<u8>(FifoConfig::new(2)).unwrap();
    producer.try_push(7).unwrap();

    for step in 0..Synchronizer::LATENCY {
        assert!(consumer.is_empty(), "visible after {step} steps");
        assert_eq!(consumer.try_pop(), None);
        consumer.step();
    }
    assert!(!consumer.is_empty());
    assert_eq!(consumer.try_pop(), Some(7));
}

#[test]
fn pop_frees_space_after_exactly_two_producer_steps() {
    let (mut producer, mut consumer) = channel::<u8>(FifoConfig::new(1)).unwrap();
    producer.try_push(1).unwrap();
    producer.try_push(2).unwrap();
    assert!(producer.is_full());

    consumer.settle();
    assert_eq!(consumer.try_pop(), Some(1));

    producer.step();
    assert!(producer.is_full());
    assert!(producer.try_push(3).is_err());
    producer.step();
    assert!(!producer.is_full());
    assert_eq!(producer.free_slots(), 1);
    assert!(producer.try_push(3).is_ok());
}

#[test]
fn local_operations_keep_flags_conservative() {
    let (mut producer, mut consumer) = channel::<u16>(FifoConfig::new(2)).unwrap();
    for i in 0..3 {
        producer.try_push(i).unwrap();
    }
    consumer.settle();
    // The producer has not seen any pop yet; popping never loosens its view.
    while consumer.try_pop().is_some() {}
    assert!(consumer.is_empty());
    assert_eq!(producer.free_slots(), 1);
    producer.try_push(3).unwrap();
    assert!(producer.is_full());
    producer.settle();
    assert_eq!(producer.free_slots(), 3);
}

#[test]
fn almost_flags_follow_thresholds() {
    let config = FifoConfig::new(3).with_almost_full(6).with_almost_empty(2);
    let (mut producer, mut consumer) = channel::<u32>(config).unwrap();
    assert!(consumer.is_almost_empty());

    for i in 0..6 {
        assert!(!producer.is_almost_full());
        producer.try_push(i).unwrap();
    }
    assert!(producer.is_almost_full());
    assert!(!producer.is_full());

    consumer.settle();
    assert!(!consumer.is_almost_empty());
    assert_eq!(consumer.pending(), 6);
    for _ in 0..4 {
        consumer.try_pop().unwrap();
    }
    assert!(consumer.is_almost_empty());

    producer.settle();
    assert!(!producer.is_almost_full());
}

#[test]
fn capacity_one_lap_many_times() {
    let mut queue = Queue::new(FifoConfig::new(1)).unwrap();
    let mut next = 0u32;
    let mut expected = 0u32;
    for _ in 0..50 {
        while queue.try_push(next).is_ok() {
            next += 1;
        }
        assert_eq!(queue.status().len, 2);
        queue.settle();
        while let Some(v) = queue.try_pop() {
            assert_eq!(v, expected);
            expected += 1;
        }
        queue.settle();
    }
    assert_eq!(next, expected);
    assert_eq!(next, 100);
}

/// Single-threaded model run: random op sequences with random step ratios,
/// checked against a plain deque.
#[test]
fn randomized_interleavings_hold_invariants() {
    for seed in 0..32u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let addr_bits = rng.gen_range(1..=4);
        let depth = 1usize << addr_bits;
        let (mut producer, mut consumer) = channel::<u64>(FifoConfig::new(addr_bits)).unwrap();
        let mut model = VecDeque::new();
        let mut next = 0u64;

        let producer_rate = rng.gen_range(1..=8u32);
        let consumer_rate = rng.gen_range(1..=8u32);

        for _ in 0..2_000 {
            match rng.gen_range(0..4) {
                0 => {
                    let accepted = producer.try_push(next).is_ok();
                    if accepted {
                        assert!(model.len() < depth, "overwrite at len {}", model.len());
                        model.push_back(next);
                        next += 1;
                    }
                }
                1 => {
                    if let Some(v) = consumer.try_pop() {
                        assert_eq!(Some(v), model.pop_front(), "seed {seed}");
                    }
                }
                2 => {
                    if rng.gen_ratio(1, producer_rate) {
                        producer.step();
                    }
                }
                _ => {
                    if rng.gen_ratio(1, consumer_rate) {
                        consumer.step();
                    }
                }
            }
            assert!(model.len() <= depth);
            assert!(producer.free_slots() <= depth - model.len());
            assert!(consumer.pending() <= model.len());
        }

        producer.settle();
        consumer.settle();
        assert_eq!(producer.is_full(), model.len() == depth);
        assert_eq!(consumer.is_empty(), model.is_empty());
        while let Some(v) = consumer.try_pop() {
            assert_eq!(Some(v), model.pop_front());
        }
        assert!(model.is_empty(), "seed {seed}: lost {:?}", model);
    }
}

#[test]
fn two_threads_at_unrelated_rates() {
    const ITEMS: u64 = 20_000;

    for (seed, addr_bits) in [(1u64, 1u32), (2, 3), (3, 6)] {
        let (mut producer, mut consumer) = channel::<u64>(FifoConfig::new(addr_bits)).unwrap();

        let producer_thread = thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut next = 0;
            while next < ITEMS {
                match producer.try_push(next) {
                    Ok(()) => next += 1,
                    Err(_) => thread::yield_now(),
                }
                for _ in 0..rng.gen_range(0..3) {
                    producer.step();
                }
            }
        });

        let consumer_thread = thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(seed ^ 0xdead_beef);
            let mut expected = 0;
            while expected < ITEMS {
                match consumer.try_pop() {
                    Some(v) => {
                        assert_eq!(v, expected);
                        expected += 1;
                    }
                    None => thread::yield_now(),
                }
                for _ in 0..rng.gen_range(0..3) {
                    consumer.step();
                }
            }
            consumer
        });

        producer_thread.join().unwrap();
        let mut consumer = consumer_thread.join().unwrap();
        consumer.settle();
        assert!(consumer.try_pop().is_none());
    }
}
