//! Construction parameters and their validation.

use core::fmt;

use crate::beat::StreamLayout;

/// Largest supported `addr_bits` (a depth of 2^30 slots).
pub const MAX_ADDR_BITS: u32 = 30;

/// Default `addr_bits`: sixteen slots.
pub const DEFAULT_ADDR_BITS: u32 = 4;

/// Queue geometry and optional fill-level thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoConfig {
    /// Depth is `2^addr_bits`. Must be at least 1.
    pub addr_bits: u32,
    /// Producer-side almost-full threshold, in occupied slots.
    pub almost_full: Option<usize>,
    /// Consumer-side almost-empty threshold, in pending slots.
    pub almost_empty: Option<usize>,
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            addr_bits: DEFAULT_ADDR_BITS,
            almost_full: None,
            almost_empty: None,
        }
    }
}

impl FifoConfig {
    pub const fn new(addr_bits: u32) -> Self {
        Self {
            addr_bits,
            almost_full: None,
            almost_empty: None,
        }
    }

    /// `is_almost_full` reports true once at least `occupied` slots are in use.
    pub const fn with_almost_full(mut self, occupied: usize) -> Self {
        self.almost_full = Some(occupied);
        self
    }

    /// `is_almost_empty` reports true while at most `pending` slots are readable.
    pub const fn with_almost_empty(mut self, pending: usize) -> Self {
        self.almost_empty = Some(pending);
        self
    }

    /// Number of slots, `2^addr_bits`. Only meaningful on a validated config.
    pub const fn depth(&self) -> usize {
        1usize << self.addr_bits
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.addr_bits == 0 {
            return Err(ConfigError::ZeroAddrBits);
        }
        if self.addr_bits > MAX_ADDR_BITS {
            return Err(ConfigError::AddrBitsTooLarge {
                addr_bits: self.addr_bits,
                max: MAX_ADDR_BITS,
            });
        }
        let depth = self.depth();
        if let Some(value) = self.almost_full
            && (value == 0 || value > depth)
        {
            return Err(ConfigError::ThresholdOutOfRange {
                name: "almost_full",
                value,
                depth,
            });
        }
        if let Some(value) = self.almost_empty
            && value >= depth
        {
            return Err(ConfigError::ThresholdOutOfRange {
                name: "almost_empty",
                value,
                depth,
            });
        }
        Ok(())
    }
}

/// Parameters of a framed byte stream carried through the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub fifo: FifoConfig,
    /// Payload width of one beat, in bits.
    pub data_width_bits: u32,
    /// Carry a byte-validity mask with every beat.
    pub keep: bool,
}

impl StreamConfig {
    pub const fn new(fifo: FifoConfig, data_width_bits: u32, keep: bool) -> Self {
        Self {
            fifo,
            data_width_bits,
            keep,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fifo.validate()?;
        if self.data_width_bits == 0 {
            return Err(ConfigError::ZeroDataWidth);
        }
        if self.keep && !self.data_width_bits.is_multiple_of(8) {
            return Err(ConfigError::DataWidthNotByteMultiple {
                bits: self.data_width_bits,
            });
        }
        Ok(())
    }

    /// Beat shape for this configuration.
    pub fn layout(&self) -> Result<StreamLayout, ConfigError> {
        self.validate()?;
        Ok(StreamLayout::new(self.data_width_bits, self.keep))
    }
}

/// A configuration the queue cannot be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `addr_bits` must be at least 1.
    ZeroAddrBits,
    /// `addr_bits` exceeds [`MAX_ADDR_BITS`].
    AddrBitsTooLarge { addr_bits: u32, max: u32 },
    /// A stream beat must carry at least one bit.
    ZeroDataWidth,
    /// A validity mask needs a whole number of byte lanes.
    DataWidthNotByteMultiple { bits: u32 },
    /// A fill-level threshold does not fit the depth.
    ThresholdOutOfRange {
        name: &'static str,
        value: usize,
        depth: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroAddrBits => write!(f, "addr_bits must be at least 1"),
            Self::AddrBitsTooLarge { addr_bits, max } => {
                write!(f, "addr_bits {addr_bits} exceeds maximum {max}")
            }
            Self::ZeroDataWidth => write!(f, "data width must be non-zero"),
            Self::DataWidthNotByteMultiple { bits } => {
                write!(
                    f,
                    "data width {bits} is not a multiple of 8, cannot carry a byte-validity mask"
                )
            }
            Self::ThresholdOutOfRange { name, value, depth } => {
                write!(f, "{name} threshold {value} out of range for depth {depth}")
            }
        }
    }
}

impl core::error::Error for ConfigError {}
