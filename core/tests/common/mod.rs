#![allow(dead_code)]

use jtframe_core::core::{ChannelRequest, ChannelResponse, MemoryChannel, WriteMask};
use jtframe_core::device::{
    Ram2Slots, Ram2SlotsConfig, Ram2SlotsInputs, RamRqInputs, RomRqInputs, Sdram, SdramConfig,
};

/// Two-slot arbiter wired to a channel, with the slot inputs driven by the test.
pub struct Bench<C: MemoryChannel = Sdram> {
    pub arbiter: Ram2Slots,
    pub channel: C,
    pub inputs: Ram2SlotsInputs,
    pub cycle: u64,
}

impl Bench<Sdram> {
    /// 4K-word SDRAM, read latency 3, write latency 2, default slot widths.
    pub fn new() -> Self {
        let sdram = Sdram::new(SdramConfig {
            addr_width: 12,
            read_latency: 3,
            write_latency: 2,
        });
        Self::with_channel(Ram2SlotsConfig::default(), sdram)
    }
}

impl<C: MemoryChannel> Bench<C> {
    pub fn with_channel(config: Ram2SlotsConfig, channel: C) -> Self {
        Self {
            arbiter: Ram2Slots::new(config),
            channel,
            inputs: Ram2SlotsInputs::default(),
            cycle: 0,
        }
    }

    /// One clock edge: sample both sides' outputs, then clock both.
    pub fn step(&mut self) {
        let response = self.channel.response();
        let request = self.arbiter.channel_request();
        self.arbiter.clock(&self.inputs, &response);
        self.channel.clock(&request);
        self.cycle += 1;
    }

    /// Step until `done` holds, failing the test after `limit` edges.
    pub fn step_until(&mut self, limit: u64, mut done: impl FnMut(&Self) -> bool) -> u64 {
        for n in 1..=limit {
            self.step();
            if done(self) {
                return n;
            }
        }
        panic!("condition not reached within {limit} cycles");
    }

    pub fn read0(&mut self, addr: u32) {
        self.inputs.slot0 = RamRqInputs {
            addr,
            cs: true,
            ..Default::default()
        };
    }

    pub fn write0(&mut self, addr: u32, data: u16, mask: WriteMask) {
        self.inputs.slot0 = RamRqInputs {
            addr,
            cs: true,
            wen: true,
            din: data,
            wrmask: mask,
            ..Default::default()
        };
    }

    pub fn read1(&mut self, addr: u32) {
        self.inputs.slot1 = RomRqInputs {
            addr,
            cs: true,
            ..Default::default()
        };
    }

    pub fn release0(&mut self) {
        self.inputs.slot0.cs = false;
    }

    pub fn release1(&mut self) {
        self.inputs.slot1.cs = false;
    }
}

/// Channel that plays back a fixed list of responses, one per edge, and
/// records every command it was shown.
pub struct ScriptedChannel {
    script: Vec<ChannelResponse>,
    position: usize,
    pub seen: Vec<ChannelRequest>,
}

impl ScriptedChannel {
    pub fn new(script: Vec<ChannelResponse>) -> Self {
        Self {
            script,
            position: 0,
            seen: Vec::new(),
        }
    }
}

impl MemoryChannel for ScriptedChannel {
    fn response(&self) -> ChannelResponse {
        self.script.get(self.position).copied().unwrap_or_default()
    }

    fn clock(&mut self, request: &ChannelRequest) {
        self.seen.push(*request);
        self.position += 1;
    }

    fn reset(&mut self) {
        self.position = 0;
    }
}
