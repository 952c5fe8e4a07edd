use tracing::debug;

use super::ram_rq::{RamRq, RamRqInputs};
use super::rom_rq::{RomRq, RomRqInputs};
use super::slot_scheduler::{SchedulerState, SchedulerStats, SlotScheduler};
use crate::core::channel::{ChannelRequest, ChannelResponse, DataWidth};

/// Slot 0: the read/write client.
pub const RAM_SLOT: usize = 0;
/// Slot 1: the read-only client.
pub const ROM_SLOT: usize = 1;

/// Build-time parameters of a [`Ram2Slots`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ram2SlotsConfig {
    /// Channel address width in bits (SDRAMW).
    pub addr_width: u32,
    pub slot0_width: DataWidth,
    pub slot1_width: DataWidth,
    /// Keep the last payload in slot 1 and serve repeat reads from it.
    pub slot1_cache: bool,
}

impl Default for Ram2SlotsConfig {
    fn default() -> Self {
        Self {
            addr_width: 22,
            slot0_width: DataWidth::Bits16,
            slot1_width: DataWidth::Bits16,
            slot1_cache: true,
        }
    }
}

/// Every input of the two-slot arbiter for one cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Ram2SlotsInputs {
    /// Synchronous reset, level sensitive.
    pub rst: bool,
    pub slot0: RamRqInputs,
    pub slot1: RomRqInputs,
}

/// Two-slot SDRAM arbiter.
///
/// Multiplexes a read/write slot ([`RamRq`]) and a read-only slot
/// ([`RomRq`]) onto one request/acknowledge channel. Slot 0 always wins
/// when both are waiting.
///
/// # Edge order
///
/// One [`clock`](Self::clock) call is one clock edge. All decisions use the
/// state as it stood before the edge:
///
/// 1. the scheduler drops strobes on `ack`, releases a finished owner, and
///    grants the first waiting slot if the channel is (now) free;
/// 2. each slot retires its own finished transaction and latches a new
///    chip-select if it is idle;
/// 3. the granted slot is marked as owner.
///
/// With `rst` high the edge only restores the idle state.
pub struct Ram2Slots {
    slot0: RamRq,
    slot1: RomRq,
    scheduler: SlotScheduler<2>,
    config: Ram2SlotsConfig,
}

impl Ram2Slots {
    pub fn new(config: Ram2SlotsConfig) -> Self {
        let slot1 = if config.slot1_cache {
            RomRq::new(config.slot1_width)
        } else {
            RomRq::without_cache(config.slot1_width)
        };
        Self {
            slot0: RamRq::new(config.slot0_width),
            slot1,
            scheduler: SlotScheduler::new(config.addr_width),
            config,
        }
    }

    pub fn reset(&mut self) {
        self.slot0.reset();
        self.slot1.reset();
        self.scheduler.reset();
        debug!("ram_2slots reset");
    }

    pub fn config(&self) -> &Ram2SlotsConfig {
        &self.config
    }

    pub fn clock(&mut self, inputs: &Ram2SlotsInputs, response: &ChannelResponse) {
        if inputs.rst {
            self.reset();
            return;
        }

        let requests = [self.slot0.request(), self.slot1.request()];
        let granted = self.scheduler.clock(&requests, response);

        self.slot0.clock(&inputs.slot0, response);
        self.slot1.clock(&inputs.slot1, response);

        match granted {
            Some(RAM_SLOT) => self.slot0.grant(),
            Some(ROM_SLOT) => self.slot1.grant(),
            _ => {}
        }
    }

    /// Command lines toward the channel.
    pub fn channel_request(&self) -> ChannelRequest {
        self.scheduler.channel_request()
    }

    pub fn owner(&self) -> Option<usize> {
        self.scheduler.owner()
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn stats(&self) -> &SchedulerStats<2> {
        self.scheduler.stats()
    }

    pub fn clear_stats(&mut self) {
        self.scheduler.clear_stats();
    }

    pub fn slot0(&self) -> &RamRq {
        &self.slot0
    }

    pub fn slot1(&self) -> &RomRq {
        &self.slot1
    }

    pub fn slot0_ok(&self) -> bool {
        self.slot0.data_ok()
    }

    pub fn slot0_dout(&self) -> u32 {
        self.slot0.dout()
    }

    pub fn slot1_ok(&self) -> bool {
        self.slot1.data_ok()
    }

    pub fn slot1_dout(&self) -> u32 {
        self.slot1.dout()
    }
}

impl Default for Ram2Slots {
    fn default() -> Self {
        Self::new(Ram2SlotsConfig::default())
    }
}
