//! Two threads, two unrelated step rates, one framed stream between them.
//!
//! The producer thread emits frames of random length; the consumer thread
//! reassembles them from beats and checks each against a per-frame checksum
//! sent out of band over a std channel once the frame is fully pushed.

use std::fmt;
use std::process;
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use bytes::BytesMut;
use cdc_fifo::sync::spin_loop;
use cdc_fifo::{BeatError, FifoConfig, KeepMask, StreamConfig, StreamPushError, stream};
use clap::Parser;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "two-domains")]
#[command(about = "Move checksummed frames between two threads stepping at unrelated rates")]
struct Args {
    /// Frames to send before stopping
    #[arg(long, default_value_t = 10_000)]
    frames: u64,

    /// Queue depth is 2^addr_bits
    #[arg(long, default_value_t = 4)]
    addr_bits: u32,

    /// Beat payload width in bits
    #[arg(long = "width", default_value_t = 64)]
    width_bits: u32,

    /// Spin iterations between producer steps
    #[arg(long, default_value_t = 3)]
    producer_spin: u32,

    /// Spin iterations between consumer steps
    #[arg(long, default_value_t = 17)]
    consumer_spin: u32,
}

/// Why a worker thread stopped early.
#[derive(Debug)]
enum WorkerError {
    Beat(BeatError),
    MissingKeep,
    ChecksumsClosed,
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Beat(err) => write!(f, "malformed beat: {err}"),
            Self::MissingKeep => write!(f, "beat arrived without a keep mask"),
            Self::ChecksumsClosed => write!(f, "producer hung up before sending a checksum"),
        }
    }
}

impl From<BeatError> for WorkerError {
    fn from(err: BeatError) -> Self {
        Self::Beat(err)
    }
}

fn checksum(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0xcbf2_9ce4_8422_2325, |hash, &b| (hash ^ b as u64).wrapping_mul(0x100_0000_01b3))
}

fn join<T>(name: &str, handle: thread::JoinHandle<Result<T, WorkerError>>) -> T {
    match handle.join() {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            error!(thread = name, %err, "worker failed");
            process::exit(1);
        }
        Err(_) => {
            error!(thread = name, "worker panicked");
            process::exit(101);
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = StreamConfig::new(FifoConfig::new(args.addr_bits), args.width_bits, true);
    let (mut tx, mut rx) = match stream(config) {
        Ok(halves) => halves,
        Err(err) => {
            error!(%err, "invalid configuration");
            process::exit(2);
        }
    };
    let layout = tx.layout();
    let lanes = layout.keep_lanes();
    let (sums_tx, sums_rx) = mpsc::channel::<u64>();

    info!(
        frames = args.frames,
        depth = tx.producer().capacity(),
        width = args.width_bits,
        producer_spin = args.producer_spin,
        consumer_spin = args.consumer_spin,
        "starting"
    );
    let started = Instant::now();

    let frames = args.frames;
    let producer_spin = args.producer_spin;
    let producer = thread::spawn(move || -> Result<u64, WorkerError> {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut rejected = 0u64;
        for _ in 0..frames {
            let frame_len = rng.gen_range(1..=8 * lanes);
            let payload: Vec<u8> = (0..frame_len).map(|_| rng.r#gen()).collect();
            let beats: Vec<&[u8]> = payload.chunks(lanes).collect();
            for (index, chunk) in beats.iter().enumerate() {
                let mut data = BytesMut::zeroed(layout.data_bytes());
                data[..chunk.len()].copy_from_slice(chunk);
                let keep = KeepMask::from_lanes((0..lanes).map(|lane| lane < chunk.len()));
                let mut beat = layout.beat(data.freeze(), Some(keep), index + 1 == beats.len())?;
                loop {
                    match tx.try_push(beat) {
                        Ok(()) => break,
                        Err(StreamPushError::Full(back)) => {
                            rejected += 1;
                            beat = back;
                        }
                        Err(StreamPushError::Shape { error, .. }) => return Err(error.into()),
                    }
                    tx.step();
                    for _ in 0..producer_spin {
                        spin_loop();
                    }
                }
            }
            // The consumer only stops early by failing, which main reports.
            let _ = sums_tx.send(checksum(&payload));
        }
        debug!(rejected, "producer done");
        Ok(rejected)
    });

    let consumer_spin = args.consumer_spin;
    let consumer = thread::spawn(move || -> Result<u64, WorkerError> {
        let mut frame = Vec::new();
        let mut received = 0u64;
        let mut mismatches = 0u64;
        while received < frames {
            let Some(beat) = rx.try_pop() else {
                rx.step();
                for _ in 0..consumer_spin {
                    spin_loop();
                }
                continue;
            };
            let keep = beat.keep().ok_or(WorkerError::MissingKeep)?;
            frame.extend(
                beat.data()
                    .iter()
                    .enumerate()
                    .filter(|(lane, _)| keep.is_set(*lane))
                    .map(|(_, b)| *b),
            );
            if beat.is_last() {
                let expected = sums_rx.recv().map_err(|_| WorkerError::ChecksumsClosed)?;
                if checksum(&frame) != expected {
                    mismatches += 1;
                    error!(frame = received, "checksum mismatch");
                }
                frame.clear();
                received += 1;
            }
        }
        Ok(mismatches)
    });

    // A failed producer leaves the consumer waiting forever; exiting from
    // `join` tears it down.
    let rejected = join("producer", producer);
    let mismatches = join("consumer", consumer);

    info!(
        frames = args.frames,
        rejected,
        mismatches,
        elapsed = ?started.elapsed(),
        "done"
    );
    if mismatches > 0 {
        process::exit(1);
    }
}
