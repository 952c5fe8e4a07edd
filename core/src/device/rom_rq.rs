use tracing::trace;

use super::ram_rq::SlotState;
use crate::core::channel::{ChannelOp, ChannelResponse, DataWidth, SlotRequest};

/// Lines a read-only client drives into its slot every cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RomRqInputs {
    pub addr: u32,
    pub cs: bool,
    pub offset: u32,
    /// Invalidate the word cache (e.g. while the ROM region is reloaded).
    pub clr: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CachedWord {
    addr: u32,
    data: u32,
}

/// Read-only slot request adapter with a one-entry word cache.
///
/// Handshake is the same as [`RamRq`](super::RamRq) without writes. The last
/// 32-bit payload is kept: a chip-select whose channel address is the cached
/// word (or, for 8/16-bit clients, the word after it) completes straight away
/// without going to the channel.
///
/// `clr` only empties the cache. A request that is pending or granted stays
/// exactly as it is.
pub struct RomRq {
    width: DataWidth,
    cache_enabled: bool,
    state: SlotState,
    armed: bool,
    addr: u32,
    sdram_addr: u32,
    dout: u32,
    data_ok: bool,
    cache: Option<CachedWord>,
    cache_hits: u64,
}

impl RomRq {
    pub fn new(width: DataWidth) -> Self {
        Self::build(width, true)
    }

    /// Adapter that sends every chip-select to the channel.
    pub fn without_cache(width: DataWidth) -> Self {
        Self::build(width, false)
    }

    fn build(width: DataWidth, cache_enabled: bool) -> Self {
        Self {
            width,
            cache_enabled,
            state: SlotState::Idle,
            armed: true,
            addr: 0,
            sdram_addr: 0,
            dout: 0,
            data_ok: false,
            cache: None,
            cache_hits: 0,
        }
    }

    pub fn reset(&mut self) {
        let hits = self.cache_hits;
        *self = Self::build(self.width, self.cache_enabled);
        self.cache_hits = hits;
    }

    pub fn width(&self) -> DataWidth {
        self.width
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn request(&self) -> Option<SlotRequest> {
        (self.state == SlotState::Pending).then_some(SlotRequest {
            addr: self.sdram_addr,
            op: ChannelOp::Read,
        })
    }

    pub fn is_granted(&self) -> bool {
        self.state == SlotState::Granted
    }

    pub fn is_idle(&self) -> bool {
        self.state == SlotState::Idle
    }

    pub fn sdram_addr(&self) -> u32 {
        self.sdram_addr
    }

    pub fn dout(&self) -> u32 {
        self.dout
    }

    pub fn data_ok(&self) -> bool {
        self.data_ok
    }

    pub fn cache_valid(&self) -> bool {
        self.cache.is_some()
    }

    /// Requests served from the cache since construction.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    pub(crate) fn grant(&mut self) {
        debug_assert_eq!(self.state, SlotState::Pending);
        self.state = SlotState::Granted;
    }

    /// Returns `Some(upper_word)` if `sdram_addr` is held in the cache.
    fn lookup(&self, sdram_addr: u32) -> Option<(u32, bool)> {
        let cached = self.cache?;
        if cached.addr == sdram_addr {
            Some((cached.data, false))
        } else if self.width != DataWidth::Bits32 && cached.addr.wrapping_add(1) == sdram_addr {
            Some((cached.data, true))
        } else {
            None
        }
    }

    pub fn clock(&mut self, inputs: &RomRqInputs, response: &ChannelResponse) {
        self.data_ok = false;

        if inputs.clr {
            self.cache = None;
        }

        if self.state == SlotState::Granted && response.data_ready {
            self.dout = self.width.extract(response.data, self.addr, false);
            // A payload landing while clr is high may predate the reload
            if self.cache_enabled && !inputs.clr {
                self.cache = Some(CachedWord {
                    addr: self.sdram_addr,
                    data: response.data,
                });
            }
            self.data_ok = true;
            self.state = SlotState::Idle;
            trace!(addr = self.sdram_addr, "rom slot done");
        }

        if !inputs.cs {
            self.armed = true;
        }

        if self.state == SlotState::Idle && inputs.cs && self.armed {
            self.armed = false;
            self.addr = inputs.addr;
            self.sdram_addr = self.width.channel_addr(inputs.offset, inputs.addr);
            match self.lookup(self.sdram_addr) {
                Some((payload, upper_word)) => {
                    self.dout = self.width.extract(payload, inputs.addr, upper_word);
                    self.data_ok = true;
                    self.cache_hits += 1;
                    trace!(addr = self.sdram_addr, "rom slot cache hit");
                }
                None => self.state = SlotState::Pending,
            }
        }
    }
}
