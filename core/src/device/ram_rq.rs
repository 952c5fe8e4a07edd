use tracing::trace;

use crate::core::channel::{ChannelOp, ChannelResponse, DataWidth, SlotRequest, WriteMask};

/// Where a slot's current request is in its life.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotState {
    /// Nothing outstanding; a new chip-select may be latched.
    #[default]
    Idle,
    /// Latched and waiting for the scheduler to grant it.
    Pending,
    /// Owns the channel until its transaction completes.
    Granted,
}

/// Lines a read/write client drives into its slot every cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RamRqInputs {
    /// Client-local address, in units of the client's data width.
    pub addr: u32,
    /// Request strobe, held high until `data_ok`.
    pub cs: bool,
    /// Base channel address of this client's region.
    pub offset: u32,
    /// Write enable; sampled together with `cs`.
    pub wen: bool,
    pub din: u16,
    pub wrmask: WriteMask,
}

/// Read/write slot request adapter.
///
/// Turns a client's level-held chip-select into exactly one channel request.
/// The channel address and operation are latched when the request is taken
/// and stay fixed until it completes, whatever the client does to its address
/// lines meanwhile. A further request needs `cs` to go low first.
///
/// Reads deliver `dout` with a one-cycle `data_ok` pulse when the payload
/// arrives; writes pulse `data_ok` when the channel accepts the command.
pub struct RamRq {
    width: DataWidth,
    state: SlotState,
    armed: bool, // cs seen low since the last latched request
    addr: u32,   // client address of the latched request (byte lane)
    sdram_addr: u32,
    op: ChannelOp,
    dout: u32,
    data_ok: bool,
}

impl RamRq {
    pub fn new(width: DataWidth) -> Self {
        Self {
            width,
            state: SlotState::Idle,
            armed: true,
            addr: 0,
            sdram_addr: 0,
            op: ChannelOp::Read,
            dout: 0,
            data_ok: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.width);
    }

    pub fn width(&self) -> DataWidth {
        self.width
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    /// The request waiting for a grant, if any.
    pub fn request(&self) -> Option<SlotRequest> {
        (self.state == SlotState::Pending).then_some(SlotRequest {
            addr: self.sdram_addr,
            op: self.op,
        })
    }

    pub fn is_granted(&self) -> bool {
        self.state == SlotState::Granted
    }

    pub fn is_idle(&self) -> bool {
        self.state == SlotState::Idle
    }

    /// Latched channel address of the current (or last) request.
    pub fn sdram_addr(&self) -> u32 {
        self.sdram_addr
    }

    pub fn dout(&self) -> u32 {
        self.dout
    }

    pub fn data_ok(&self) -> bool {
        self.data_ok
    }

    /// Called by the scheduler on the edge it hands this slot the channel.
    pub(crate) fn grant(&mut self) {
        debug_assert_eq!(self.state, SlotState::Pending);
        self.state = SlotState::Granted;
    }

    /// Advance one edge.
    ///
    /// Completion is handled before a new chip-select is looked at, so a
    /// request finishing on the same edge a new one arrives stays separate.
    pub fn clock(&mut self, inputs: &RamRqInputs, response: &ChannelResponse) {
        self.data_ok = false;

        if self.state == SlotState::Granted && response.completes(&self.op) {
            if !self.op.is_write() {
                self.dout = self.width.extract(response.data, self.addr, false);
            }
            self.data_ok = true;
            self.state = SlotState::Idle;
            trace!(addr = self.sdram_addr, write = self.op.is_write(), "ram slot done");
        }

        if !inputs.cs {
            self.armed = true;
        }

        if self.state == SlotState::Idle && inputs.cs && self.armed {
            self.addr = inputs.addr;
            self.sdram_addr = self.width.channel_addr(inputs.offset, inputs.addr);
            self.op = if inputs.wen {
                ChannelOp::Write {
                    data: inputs.din,
                    mask: inputs.wrmask,
                }
            } else {
                ChannelOp::Read
            };
            self.state = SlotState::Pending;
            self.armed = false;
        }
    }
}
