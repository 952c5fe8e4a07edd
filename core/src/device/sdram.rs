use tracing::trace;

use crate::core::channel::{ChannelOp, ChannelRequest, ChannelResponse, MemoryChannel};

/// Geometry and timing of an [`Sdram`] channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SdramConfig {
    /// Address width in 16-bit words. The store holds `1 << addr_width` words.
    pub addr_width: u32,
    /// Edges from command acceptance to `data_ready`.
    pub read_latency: u32,
    /// Edges from command acceptance until the channel takes a new command.
    pub write_latency: u32,
}

impl Default for SdramConfig {
    fn default() -> Self {
        Self {
            addr_width: 22,
            read_latency: 3,
            write_latency: 2,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Command {
    addr: u32,
    op: ChannelOp,
    remaining: u32,
}

/// Behavioural SDRAM controller: one command at a time, fixed latencies.
///
/// - Idle with `rd` or `wr` raised: the command is accepted and `ack` pulses
///   for one cycle.
/// - Reads: after `read_latency` edges `data_ready` pulses with the word at
///   the address in bits 15:0 and the next word in bits 31:16.
/// - Writes: the masked word lands after `write_latency` edges. No
///   `data_ready`.
///
/// A command is not accepted on the edge the previous one finishes.
pub struct Sdram {
    mem: Vec<u16>,
    config: SdramConfig,
    addr_mask: u32,
    busy: Option<Command>,
    response: ChannelResponse,
}

impl Sdram {
    pub fn new(config: SdramConfig) -> Self {
        let config = SdramConfig {
            addr_width: config.addr_width.clamp(1, 28),
            read_latency: config.read_latency.max(1),
            write_latency: config.write_latency.max(1),
        };
        let words = 1usize << config.addr_width;
        Self {
            mem: vec![0; words],
            config,
            addr_mask: (words - 1) as u32,
            busy: None,
            response: ChannelResponse::default(),
        }
    }

    pub fn config(&self) -> &SdramConfig {
        &self.config
    }

    /// Number of 16-bit words in the store.
    pub fn size_words(&self) -> usize {
        self.mem.len()
    }

    /// Copy little-endian bytes into the store starting at `word_addr`.
    ///
    /// An odd trailing byte fills the low half of the last word. Data past
    /// the end of the store wraps to address 0.
    pub fn load(&mut self, word_addr: u32, bytes: &[u8]) {
        for (i, chunk) in bytes.chunks(2).enumerate() {
            let addr = word_addr.wrapping_add(i as u32);
            let word = match chunk {
                &[lo, hi] => u16::from_le_bytes([lo, hi]),
                &[lo] => (self.read_word(addr) & 0xFF00) | lo as u16,
                _ => continue,
            };
            self.write_word(addr, word);
        }
    }

    pub fn read_word(&self, addr: u32) -> u16 {
        self.mem[(addr & self.addr_mask) as usize]
    }

    pub fn write_word(&mut self, addr: u32, word: u16) {
        self.mem[(addr & self.addr_mask) as usize] = word;
    }

    /// The 32-bit payload a read at `addr` returns.
    pub fn read_payload(&self, addr: u32) -> u32 {
        let lo = self.read_word(addr) as u32;
        let hi = self.read_word(addr.wrapping_add(1)) as u32;
        (hi << 16) | lo
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_some()
    }

    pub fn words(&self) -> &[u16] {
        &self.mem
    }
}

impl Default for Sdram {
    fn default() -> Self {
        Self::new(SdramConfig::default())
    }
}

impl MemoryChannel for Sdram {
    fn response(&self) -> ChannelResponse {
        self.response
    }

    fn clock(&mut self, request: &ChannelRequest) {
        self.response.ack = false;
        self.response.data_ready = false;

        match self.busy.as_mut() {
            Some(cmd) => {
                cmd.remaining -= 1;
                if cmd.remaining == 0 {
                    let Command { addr, op, .. } = *cmd;
                    self.busy = None;
                    match op {
                        ChannelOp::Read => {
                            self.response.data = self.read_payload(addr);
                            self.response.data_ready = true;
                            trace!(addr, data = self.response.data, "sdram read done");
                        }
                        ChannelOp::Write { data, mask } => {
                            let merged = mask.merge(self.read_word(addr), data);
                            self.write_word(addr, merged);
                            trace!(addr, data = merged, "sdram write done");
                        }
                    }
                }
            }
            None if request.rd || request.wr => {
                let (op, remaining) = if request.wr {
                    let op = ChannelOp::Write {
                        data: request.write_data,
                        mask: request.write_mask,
                    };
                    (op, self.config.write_latency)
                } else {
                    (ChannelOp::Read, self.config.read_latency)
                };
                self.busy = Some(Command {
                    addr: request.addr & self.addr_mask,
                    op,
                    remaining,
                });
                self.response.ack = true;
            }
            None => {}
        }
    }

    /// Drops a pending read. A write was already acknowledged, so it lands
    /// in the store.
    fn reset(&mut self) {
        if let Some(Command {
            addr,
            op: ChannelOp::Write { data, mask },
            ..
        }) = self.busy.take()
        {
            let merged = mask.merge(self.read_word(addr), data);
            self.write_word(addr, merged);
            trace!(addr, data = merged, "sdram write committed on reset");
        }
        self.response = ChannelResponse::default();
    }
}
