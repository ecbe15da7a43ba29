//! Framed byte stream carried through the queue unchanged.
//!
//! A [`Beat`] is one queue slot: a fixed-width payload, an optional per-byte
//! validity mask and an end-of-frame flag. The queue never looks inside; the
//! [`StreamLayout`] only checks that every beat has the configured shape.

use core::fmt;

use bytes::{Bytes, BytesMut};

use crate::config::{ConfigError, StreamConfig};
use crate::fifo::{Consumer, Producer, channel};

/// One bit per payload byte lane, packed LSB-first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeepMask {
    bits: Bytes,
    lanes: usize,
}

impl KeepMask {
    /// Every lane valid.
    pub fn all(lanes: usize) -> Self {
        Self::from_lanes((0..lanes).map(|_| true))
    }

    pub fn from_lanes(lanes: impl IntoIterator<Item = bool>) -> Self {
        let mut bits = BytesMut::new();
        let mut count = 0;
        for valid in lanes {
            if count % 8 == 0 {
                bits.extend_from_slice(&[0]);
            }
            if valid {
                let last = bits.len() - 1;
                bits[last] |= 1 << (count % 8);
            }
            count += 1;
        }
        Self {
            bits: bits.freeze(),
            lanes: count,
        }
    }

    #[inline]
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Whether byte lane `lane` carries valid data. Out-of-range lanes are invalid.
    pub fn is_set(&self, lane: usize) -> bool {
        lane < self.lanes && self.bits[lane / 8] & (1 << (lane % 8)) != 0
    }

    pub fn count_set(&self) -> usize {
        self.bits.iter().map(|byte| byte.count_ones() as usize).sum()
    }

    /// The packed mask bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }
}

/// One queue slot of a framed stream.
///
/// Only [`StreamLayout::beat`] builds one, so every beat in existence has
/// the shape of some layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beat {
    data: Bytes,
    keep: Option<KeepMask>,
    last: bool,
}

impl Beat {
    /// The payload, exactly as pushed.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// The byte-validity mask, if the stream carries one.
    pub fn keep(&self) -> Option<&KeepMask> {
        self.keep.as_ref()
    }

    /// Last beat of its frame.
    pub fn is_last(&self) -> bool {
        self.last
    }

    pub fn into_parts(self) -> (Bytes, Option<KeepMask>, bool) {
        (self.data, self.keep, self.last)
    }
}

/// Shape every beat of a stream must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLayout {
    data_width_bits: u32,
    keep: bool,
}

impl StreamLayout {
    pub(crate) const fn new(data_width_bits: u32, keep: bool) -> Self {
        Self {
            data_width_bits,
            keep,
        }
    }

    /// Payload length in bytes, rounding a partial last byte up.
    pub const fn data_bytes(&self) -> usize {
        self.data_width_bits.div_ceil(8) as usize
    }

    /// Number of mask lanes, or 0 without a mask.
    pub const fn keep_lanes(&self) -> usize {
        if self.keep {
            (self.data_width_bits / 8) as usize
        } else {
            0
        }
    }

    pub const fn has_keep(&self) -> bool {
        self.keep
    }

    /// Build a beat, checking it against this layout.
    pub fn beat(
        &self,
        data: impl Into<Bytes>,
        keep: Option<KeepMask>,
        last: bool,
    ) -> Result<Beat, BeatError> {
        let beat = Beat {
            data: data.into(),
            keep,
            last,
        };
        self.check(&beat)?;
        Ok(beat)
    }

    pub fn check(&self, beat: &Beat) -> Result<(), BeatError> {
        if beat.data.len() != self.data_bytes() {
            return Err(BeatError::DataLength {
                expected: self.data_bytes(),
                found: beat.data.len(),
            });
        }
        match (&beat.keep, self.keep) {
            (Some(mask), true) if mask.lanes() != self.keep_lanes() => {
                Err(BeatError::KeepLanes {
                    expected: self.keep_lanes(),
                    found: mask.lanes(),
                })
            }
            (Some(_), true) | (None, false) => Ok(()),
            (None, true) => Err(BeatError::MissingKeep),
            (Some(_), false) => Err(BeatError::UnexpectedKeep),
        }
    }
}

/// A beat that does not match its stream's layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatError {
    DataLength { expected: usize, found: usize },
    KeepLanes { expected: usize, found: usize },
    /// The stream carries a mask but the beat has none.
    MissingKeep,
    /// The beat has a mask but the stream carries none.
    UnexpectedKeep,
}

impl fmt::Display for BeatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataLength { expected, found } => {
                write!(f, "beat carries {found} data bytes, stream expects {expected}")
            }
            Self::KeepLanes { expected, found } => {
                write!(f, "keep mask has {found} lanes, stream expects {expected}")
            }
            Self::MissingKeep => write!(f, "stream requires a keep mask"),
            Self::UnexpectedKeep => write!(f, "stream carries no keep mask"),
        }
    }
}

impl core::error::Error for BeatError {}

/// A beat the stream did not accept, handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPushError {
    /// The queue is full; try again after a step.
    Full(Beat),
    /// The beat was built for another layout.
    Shape { beat: Beat, error: BeatError },
}

impl StreamPushError {
    pub fn into_beat(self) -> Beat {
        match self {
            Self::Full(beat) | Self::Shape { beat, .. } => beat,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }
}

impl fmt::Display for StreamPushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => write!(f, "fifo is full"),
            Self::Shape { error, .. } => write!(f, "{error}"),
        }
    }
}

impl core::error::Error for StreamPushError {}

/// Build a framed stream queue and split it into its two handles.
pub fn stream(config: StreamConfig) -> Result<(StreamProducer, StreamConsumer), ConfigError> {
    let layout = match config.layout() {
        Ok(layout) => layout,
        Err(err) => {
            #[cfg(feature = "std")]
            tracing::warn!(?config, %err, "rejecting stream configuration");
            return Err(err);
        }
    };
    let (producer, consumer) = channel(config.fifo)?;
    Ok((
        StreamProducer {
            inner: producer,
            layout,
        },
        StreamConsumer {
            inner: consumer,
            layout,
        },
    ))
}

/// Producer handle of a framed stream.
#[derive(Debug)]
pub struct StreamProducer {
    inner: Producer<Beat>,
    layout: StreamLayout,
}

impl StreamProducer {
    /// Shape beats must have to be accepted.
    pub fn layout(&self) -> StreamLayout {
        self.layout
    }

    /// Push one beat.
    ///
    /// A beat built for a different layout is handed back with the mismatch
    /// instead of being queued.
    pub fn try_push(&mut self, beat: Beat) -> Result<(), StreamPushError> {
        if let Err(error) = self.layout.check(&beat) {
            #[cfg(feature = "std")]
            tracing::warn!(%error, "beat does not match stream layout");
            return Err(StreamPushError::Shape { beat, error });
        }
        self.inner
            .try_push(beat)
            .map_err(|full| StreamPushError::Full(full.into_inner()))
    }

    /// Shape and push in one call.
    ///
    /// Returns `Ok(false)` when the queue is full.
    pub fn try_push_parts(
        &mut self,
        data: impl Into<Bytes>,
        keep: Option<KeepMask>,
        last: bool,
    ) -> Result<bool, BeatError> {
        let beat = self.layout.beat(data, keep, last)?;
        Ok(self.inner.try_push(beat).is_ok())
    }

    /// One producer-domain step.
    pub fn step(&mut self) {
        self.inner.step();
    }

    /// Returns true if the producer's view of the queue is full.
    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    /// The underlying queue handle, for fill levels and status.
    pub fn producer(&mut self) -> &mut Producer<Beat> {
        &mut self.inner
    }
}

/// Consumer handle of a framed stream.
#[derive(Debug)]
pub struct StreamConsumer {
    inner: Consumer<Beat>,
    layout: StreamLayout,
}

impl StreamConsumer {
    pub fn layout(&self) -> StreamLayout {
        self.layout
    }

    /// Pop the next beat if one has crossed the synchronizer.
    pub fn try_pop(&mut self) -> Option<Beat> {
        self.inner.try_pop()
    }

    /// One consumer-domain step.
    pub fn step(&mut self) {
        self.inner.step();
    }

    /// Returns true if the consumer's view of the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn consumer(&mut self) -> &mut Consumer<Beat> {
        &mut self.inner
    }
}
