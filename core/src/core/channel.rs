/// Byte write mask for one 16-bit channel word, active low (SDRAM DQM style).
///
/// Bit 0 covers bits 7:0 and bit 1 covers bits 15:8. A set bit keeps the
/// stored byte; a clear bit lets the new byte through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WriteMask(u8);

impl WriteMask {
    /// Both bytes written.
    pub const BOTH: Self = Self(0b00);
    /// Only bits 7:0 written.
    pub const LOW_ONLY: Self = Self(0b10);
    /// Only bits 15:8 written.
    pub const HIGH_ONLY: Self = Self(0b01);
    /// Nothing written (the command still occupies the channel).
    pub const NONE: Self = Self(0b11);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b11)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Mask enabling only the byte lane an 8-bit client addresses (`addr & 1`).
    pub const fn for_byte_lane(addr: u32) -> Self {
        if addr & 1 == 0 {
            Self::LOW_ONLY
        } else {
            Self::HIGH_ONLY
        }
    }

    /// Combine `new` into `old`, keeping the masked bytes of `old`.
    pub fn merge(self, old: u16, new: u16) -> u16 {
        let mut keep = 0u16;
        if self.0 & 0b01 != 0 {
            keep |= 0x00FF;
        }
        if self.0 & 0b10 != 0 {
            keep |= 0xFF00;
        }
        (old & keep) | (new & !keep)
    }
}

/// The operation a slot asks the channel to perform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelOp {
    #[default]
    Read,
    Write { data: u16, mask: WriteMask },
}

impl ChannelOp {
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}

/// A slot's outstanding request, already translated to channel space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotRequest {
    /// Channel word address (16-bit words).
    pub addr: u32,
    pub op: ChannelOp,
}

/// Command lines the scheduler drives toward the channel.
///
/// `rd`/`wr` are levels: they stay high until the channel acknowledges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelRequest {
    pub addr: u32,
    pub rd: bool,
    pub wr: bool,
    pub write_data: u16,
    pub write_mask: WriteMask,
}

/// Lines the channel drives back toward the scheduler.
///
/// `ack` and `data_ready` are one-cycle pulses. `data` is the full 32-bit
/// read payload: the word at the requested address in bits 15:0 and the
/// following word in bits 31:16.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelResponse {
    pub ack: bool,
    pub data_ready: bool,
    pub data: u32,
}

impl ChannelResponse {
    /// True if this cycle finishes a transaction of kind `op`.
    ///
    /// Reads finish when their data arrives. Writes finish when the channel
    /// accepts the command, since no data ever comes back for them.
    pub fn completes(&self, op: &ChannelOp) -> bool {
        if op.is_write() {
            self.ack
        } else {
            self.data_ready
        }
    }
}

/// Single-port memory channel (the SDRAM controller side of the scheduler).
///
/// Outputs are registered: `response()` reports what the channel drives
/// during the current cycle, and `clock()` advances one edge using the
/// command lines the scheduler drove during that same cycle.
pub trait MemoryChannel {
    fn response(&self) -> ChannelResponse;

    fn clock(&mut self, request: &ChannelRequest);

    /// Drop any in-flight command. Memory contents are kept.
    fn reset(&mut self);
}

/// Width of a client's data bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DataWidth {
    Bits8,
    #[default]
    Bits16,
    Bits32,
}

impl DataWidth {
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(Self::Bits8),
            16 => Some(Self::Bits16),
            32 => Some(Self::Bits32),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Self::Bits8 => 8,
            Self::Bits16 => 16,
            Self::Bits32 => 32,
        }
    }

    /// Channel word address for client address `addr` placed at `offset`.
    pub fn channel_addr(self, offset: u32, addr: u32) -> u32 {
        match self {
            Self::Bits8 => offset.wrapping_add(addr >> 1),
            Self::Bits16 => offset.wrapping_add(addr),
            Self::Bits32 => offset.wrapping_add(addr << 1),
        }
    }

    /// Pick the client's data out of a 32-bit channel payload.
    ///
    /// `upper_word` selects bits 31:16 as the addressed word (used when a
    /// cached payload is reused for the following channel address).
    pub fn extract(self, payload: u32, addr: u32, upper_word: bool) -> u32 {
        let word = if upper_word {
            payload >> 16
        } else {
            payload & 0xFFFF
        };
        match self {
            Self::Bits8 if addr & 1 == 0 => word & 0xFF,
            Self::Bits8 => word >> 8,
            Self::Bits16 => word,
            Self::Bits32 => payload,
        }
    }
}
