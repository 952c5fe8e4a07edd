use tracing::{error, trace};

use crate::core::channel::{ChannelOp, ChannelRequest, ChannelResponse, SlotRequest};

/// Channel ownership as seen by the scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SchedulerState {
    #[default]
    Idle,
    OwnedRead,
    OwnedWrite,
}

/// Counters kept across resets. Clear them with [`SlotScheduler::clear_stats`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerStats<const N: usize> {
    /// Grants issued per slot.
    pub grants: [u64; N],
    pub reads: u64,
    pub writes: u64,
    /// Edges where a slot had a request waiting while another owned the channel.
    pub contention_cycles: u64,
    /// `data_ready` pulses that arrived with no read outstanding.
    pub protocol_violations: u64,
}

impl<const N: usize> Default for SchedulerStats<N> {
    fn default() -> Self {
        Self {
            grants: [0; N],
            reads: 0,
            writes: 0,
            contention_cycles: 0,
            protocol_violations: 0,
        }
    }
}

/// Fixed-priority scheduler for `N` slots sharing one memory channel.
///
/// Slot 0 has the highest priority and the scan order never rotates, so a
/// slot that requests continuously starves every slot after it.
///
/// Exactly one slot owns the channel from its grant until its transaction
/// completes: reads on `data_ready`, writes on the command `ack` (no data
/// comes back for a write). On the edge an owner completes, the channel is
/// released and a new grant is considered in the same edge.
pub struct SlotScheduler<const N: usize> {
    owner: Option<usize>,
    owner_op: ChannelOp,
    request: ChannelRequest,
    addr_mask: u32,
    stats: SchedulerStats<N>,
}

impl<const N: usize> SlotScheduler<N> {
    /// `addr_width` is the channel address width in bits (SDRAMW).
    pub fn new(addr_width: u32) -> Self {
        let addr_mask = if addr_width >= 32 {
            u32::MAX
        } else {
            (1u32 << addr_width) - 1
        };
        Self {
            owner: None,
            owner_op: ChannelOp::Read,
            request: ChannelRequest::default(),
            addr_mask,
            stats: SchedulerStats::default(),
        }
    }

    pub fn reset(&mut self) {
        self.owner = None;
        self.owner_op = ChannelOp::Read;
        self.request = ChannelRequest::default();
    }

    /// Slot that currently owns the channel.
    pub fn owner(&self) -> Option<usize> {
        self.owner
    }

    pub fn state(&self) -> SchedulerState {
        match (self.owner, self.owner_op) {
            (None, _) => SchedulerState::Idle,
            (Some(_), ChannelOp::Read) => SchedulerState::OwnedRead,
            (Some(_), ChannelOp::Write { .. }) => SchedulerState::OwnedWrite,
        }
    }

    /// Command lines driven toward the channel this cycle.
    pub fn channel_request(&self) -> ChannelRequest {
        self.request
    }

    pub fn stats(&self) -> &SchedulerStats<N> {
        &self.stats
    }

    pub fn clear_stats(&mut self) {
        self.stats = SchedulerStats::default();
    }

    /// Advance one edge.
    ///
    /// `requests[i]` is slot `i`'s waiting request as it stood before the
    /// edge. Returns the slot granted on this edge, if any.
    pub fn clock(
        &mut self,
        requests: &[Option<SlotRequest>; N],
        response: &ChannelResponse,
    ) -> Option<usize> {
        if response.ack {
            self.request.rd = false;
            self.request.wr = false;
        }

        let held = self.owner;
        let read_outstanding = held.is_some() && !self.owner_op.is_write();
        if response.data_ready && !read_outstanding {
            self.stats.protocol_violations += 1;
            error!(
                addr = self.request.addr,
                data = response.data,
                "channel returned data with no read outstanding"
            );
        }

        if let Some(slot) = held
            && response.completes(&self.owner_op)
        {
            trace!(slot, "channel released");
            self.owner = None;
        }

        let mut waiting = requests
            .iter()
            .enumerate()
            .filter(|&(slot, _)| Some(slot) != held)
            .filter_map(|(slot, req)| req.map(|req| (slot, req)));

        if self.owner.is_some() {
            if waiting.next().is_some() {
                self.stats.contention_cycles += 1;
            }
            return None;
        }

        let (slot, req) = waiting.next()?;
        self.owner = Some(slot);
        self.owner_op = req.op;
        self.request.addr = req.addr & self.addr_mask;
        match req.op {
            ChannelOp::Read => {
                self.request.rd = true;
                self.request.wr = false;
                self.stats.reads += 1;
            }
            ChannelOp::Write { data, mask } => {
                self.request.rd = false;
                self.request.wr = true;
                self.request.write_data = data;
                self.request.write_mask = mask;
                self.stats.writes += 1;
            }
        }
        self.stats.grants[slot] += 1;
        trace!(slot, addr = self.request.addr, write = req.op.is_write(), "channel granted");
        Some(slot)
    }
}
