//! Two-slot arbiter rig: the arbiter, a memory channel, and one client
//! driver per slot, stepped in lock-step.
//!
//! Clients submit logical operations and get a [`Ticket`] back. Each driver
//! works through its queue one operation at a time: it raises `cs` with the
//! operation's inputs, waits for `data_ok`, then drops `cs` for one cycle so
//! the slot sees a fresh chip-select for the next operation.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use jtframe_core::core::{Component, MemoryChannel, WriteMask};
use jtframe_core::device::{
    RAM_SLOT, ROM_SLOT, Ram2Slots, Ram2SlotsConfig, Ram2SlotsInputs, RamRqInputs, RomRqInputs,
    SchedulerStats, Sdram,
};
use thiserror::Error;
use tracing::{debug, trace};

/// One logical client operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientOp {
    Read { addr: u32 },
    Write { addr: u32, data: u16, mask: WriteMask },
}

impl ClientOp {
    pub fn addr(&self) -> u32 {
        match *self {
            ClientOp::Read { addr } | ClientOp::Write { addr, .. } => addr,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, ClientOp::Write { .. })
    }
}

/// Handle for a submitted operation: the slot and its sequence number there.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket {
    pub slot: usize,
    pub seq: u64,
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.slot, self.seq)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Completion {
    pub ticket: Ticket,
    pub op: ClientOp,
    /// Slot output for reads. Writes return nothing.
    pub data: Option<u32>,
    /// Rig cycle count when `cs` was first raised for this operation.
    pub issued_at: u64,
    /// Rig cycle count when `data_ok` was seen.
    pub completed_at: u64,
}

impl Completion {
    /// Edges from raising `cs` to seeing `data_ok`.
    pub fn latency(&self) -> u64 {
        self.completed_at - self.issued_at
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RigError {
    #[error("no such slot: {0}")]
    NoSuchSlot(usize),

    #[error("slot {0} is read-only")]
    ReadOnlySlot(usize),

    #[error("ticket {0} was never issued")]
    UnknownTicket(Ticket),

    #[error("stalled after {cycles} cycles with {outstanding} operations outstanding")]
    Stalled { cycles: u64, outstanding: usize },
}

/// Arbiter parameters plus the base offset each client adds to its addresses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RigConfig {
    pub arbiter: Ram2SlotsConfig,
    pub slot0_offset: u32,
    pub slot1_offset: u32,
}

// ---------------------------------------------------------------------------
// Client driver
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
struct InFlight {
    ticket: Ticket,
    op: ClientOp,
    issued_at: u64,
}

#[derive(Default)]
struct ClientDriver {
    queue: VecDeque<(Ticket, ClientOp)>,
    active: Option<InFlight>,
    /// `cs` stays low for one edge after a completion.
    resting: bool,
    next_seq: u64,
}

impl ClientDriver {
    fn enqueue(&mut self, slot: usize, op: ClientOp) -> Ticket {
        let ticket = Ticket {
            slot,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.queue.push_back((ticket, op));
        ticket
    }

    fn begin_edge(&mut self, cycle: u64) {
        if self.active.is_some() {
            return;
        }
        if self.resting {
            self.resting = false;
        } else if let Some((ticket, op)) = self.queue.pop_front() {
            self.active = Some(InFlight {
                ticket,
                op,
                issued_at: cycle,
            });
        }
    }

    fn finish(&mut self, dout: u32, cycle: u64) -> Option<Completion> {
        let inflight = self.active.take()?;
        self.resting = true;
        Some(Completion {
            ticket: inflight.ticket,
            op: inflight.op,
            data: (!inflight.op.is_write()).then_some(dout),
            issued_at: inflight.issued_at,
            completed_at: cycle,
        })
    }

    /// Put the in-flight operation back at the head of the queue.
    fn requeue(&mut self) {
        if let Some(inflight) = self.active.take() {
            self.queue.push_front((inflight.ticket, inflight.op));
        }
        self.resting = false;
    }

    fn outstanding(&self) -> usize {
        self.queue.len() + usize::from(self.active.is_some())
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SlotReport {
    pub completed: u64,
    pub reads: u64,
    pub writes: u64,
    pub mean_latency: f64,
    pub max_latency: u64,
}

/// Summary of a run, for logging and the CLI.
#[derive(Clone, Debug, PartialEq)]
pub struct RigReport {
    pub cycles: u64,
    pub slots: [SlotReport; 2],
    pub cache_hits: u64,
    pub stats: SchedulerStats<2>,
}

impl fmt::Display for RigReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cycles: {}", self.cycles)?;
        for (slot, report) in self.slots.iter().enumerate() {
            writeln!(
                f,
                "slot {slot}: {} done ({} rd, {} wr), {} grants, latency mean {:.2} max {}",
                report.completed,
                report.reads,
                report.writes,
                self.stats.grants[slot],
                report.mean_latency,
                report.max_latency,
            )?;
        }
        writeln!(f, "rom cache hits: {}", self.cache_hits)?;
        writeln!(f, "contention cycles: {}", self.stats.contention_cycles)?;
        write!(f, "protocol violations: {}", self.stats.protocol_violations)
    }
}

// ---------------------------------------------------------------------------
// TwoSlotRig
// ---------------------------------------------------------------------------

/// [`Ram2Slots`] wired to a channel, with a queued client on each slot.
pub struct TwoSlotRig<C: MemoryChannel = Sdram> {
    arbiter: Ram2Slots,
    channel: C,
    config: RigConfig,
    drivers: [ClientDriver; 2],
    clear_pending: bool,
    completions: Vec<Completion>,
    index: HashMap<Ticket, usize>,
    cycle: u64,
}

impl<C: MemoryChannel> TwoSlotRig<C> {
    pub fn new(config: RigConfig, channel: C) -> Self {
        Self {
            arbiter: Ram2Slots::new(config.arbiter),
            channel,
            config,
            drivers: Default::default(),
            clear_pending: false,
            completions: Vec::new(),
            index: HashMap::new(),
            cycle: 0,
        }
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    pub fn arbiter(&self) -> &Ram2Slots {
        &self.arbiter
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Queue `op` on `slot`'s client.
    pub fn submit(&mut self, slot: usize, op: ClientOp) -> Result<Ticket, RigError> {
        match slot {
            RAM_SLOT => {}
            ROM_SLOT if op.is_write() => return Err(RigError::ReadOnlySlot(slot)),
            ROM_SLOT => {}
            _ => return Err(RigError::NoSuchSlot(slot)),
        }
        Ok(self.drivers[slot].enqueue(slot, op))
    }

    pub fn poll(&self, ticket: Ticket) -> Option<Completion> {
        self.index.get(&ticket).map(|&i| self.completions[i])
    }

    /// Every completion so far, in completion order.
    pub fn completions(&self) -> &[Completion] {
        &self.completions
    }

    /// Tick until `ticket` completes. Like the hardware handshake there is
    /// no timeout: a channel that never answers never returns.
    pub fn run_until_complete(&mut self, ticket: Ticket) -> Result<Completion, RigError> {
        let issued = self
            .drivers
            .get(ticket.slot)
            .is_some_and(|driver| ticket.seq < driver.next_seq);
        if !issued {
            return Err(RigError::UnknownTicket(ticket));
        }
        loop {
            if let Some(done) = self.poll(ticket) {
                return Ok(done);
            }
            self.tick();
        }
    }

    pub fn run_for(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.tick();
        }
    }

    /// Tick until both clients have nothing outstanding, or fail after
    /// `limit` cycles. Returns the cycles spent.
    pub fn run_until_idle(&mut self, limit: u64) -> Result<u64, RigError> {
        let start = self.cycle;
        while self.outstanding() > 0 {
            if self.cycle - start >= limit {
                return Err(RigError::Stalled {
                    cycles: limit,
                    outstanding: self.outstanding(),
                });
            }
            self.tick();
        }
        Ok(self.cycle - start)
    }

    /// Operations queued or in flight on both slots.
    pub fn outstanding(&self) -> usize {
        self.drivers.iter().map(ClientDriver::outstanding).sum()
    }

    /// Pulse the read-only slot's `clr` on the next edge.
    pub fn clear_rom_cache(&mut self) {
        self.clear_pending = true;
    }

    /// Reset the arbiter and the channel. Operations in flight are issued
    /// again; completions and statistics are kept.
    pub fn reset(&mut self) {
        self.arbiter.reset();
        self.channel.reset();
        for driver in &mut self.drivers {
            driver.requeue();
        }
        self.clear_pending = false;
        debug!(cycle = self.cycle, "rig reset");
    }

    pub fn report(&self) -> RigReport {
        let mut slots = [SlotReport::default(); 2];
        let mut latency_sum = [0u64; 2];
        for done in &self.completions {
            let slot = &mut slots[done.ticket.slot];
            slot.completed += 1;
            if done.op.is_write() {
                slot.writes += 1;
            } else {
                slot.reads += 1;
            }
            slot.max_latency = slot.max_latency.max(done.latency());
            latency_sum[done.ticket.slot] += done.latency();
        }
        for (slot, sum) in slots.iter_mut().zip(latency_sum) {
            if slot.completed > 0 {
                slot.mean_latency = sum as f64 / slot.completed as f64;
            }
        }
        RigReport {
            cycles: self.cycle,
            slots,
            cache_hits: self.arbiter.slot1().cache_hits(),
            stats: *self.arbiter.stats(),
        }
    }

    fn inputs(&self) -> Ram2SlotsInputs {
        let mut inputs = Ram2SlotsInputs::default();
        if let Some(inflight) = self.drivers[RAM_SLOT].active {
            inputs.slot0 = match inflight.op {
                ClientOp::Read { addr } => RamRqInputs {
                    addr,
                    cs: true,
                    offset: self.config.slot0_offset,
                    ..Default::default()
                },
                ClientOp::Write { addr, data, mask } => RamRqInputs {
                    addr,
                    cs: true,
                    offset: self.config.slot0_offset,
                    wen: true,
                    din: data,
                    wrmask: mask,
                },
            };
        }
        if let Some(inflight) = self.drivers[ROM_SLOT].active {
            inputs.slot1 = RomRqInputs {
                addr: inflight.op.addr(),
                cs: true,
                offset: self.config.slot1_offset,
                clr: false,
            };
        }
        inputs.slot1.clr = self.clear_pending;
        inputs
    }

    fn record(&mut self, done: Completion) {
        trace!(
            slot = done.ticket.slot,
            seq = done.ticket.seq,
            latency = done.latency(),
            "operation complete"
        );
        self.index.insert(done.ticket, self.completions.len());
        self.completions.push(done);
    }
}

impl TwoSlotRig<Sdram> {
    /// Rig over a behavioural [`Sdram`].
    pub fn with_sdram(config: RigConfig, sdram: Sdram) -> Self {
        Self::new(config, sdram)
    }
}

impl<C: MemoryChannel> Component for TwoSlotRig<C> {
    fn tick(&mut self) -> bool {
        for driver in &mut self.drivers {
            driver.begin_edge(self.cycle);
        }

        let inputs = self.inputs();
        let response = self.channel.response();
        let request = self.arbiter.channel_request();
        self.arbiter.clock(&inputs, &response);
        self.channel.clock(&request);
        self.clear_pending = false;
        self.cycle += 1;

        let mut delivered = false;
        let outputs = [
            (self.arbiter.slot0_ok(), self.arbiter.slot0_dout()),
            (self.arbiter.slot1_ok(), self.arbiter.slot1_dout()),
        ];
        for (slot, (ok, dout)) in outputs.into_iter().enumerate() {
            if !ok {
                continue;
            }
            if let Some(done) = self.drivers[slot].finish(dout, self.cycle) {
                self.record(done);
                delivered = true;
            }
        }
        delivered
    }

    fn cycles(&self) -> u64 {
        self.cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jtframe_core::device::SdramConfig;

    fn rig() -> TwoSlotRig {
        let sdram = Sdram::new(SdramConfig {
            addr_width: 12,
            read_latency: 3,
            write_latency: 2,
        });
        TwoSlotRig::with_sdram(RigConfig::default(), sdram)
    }

    #[test]
    fn submit_rejects_bad_slots() {
        let mut rig = rig();
        assert_eq!(
            rig.submit(2, ClientOp::Read { addr: 0 }),
            Err(RigError::NoSuchSlot(2))
        );
        let write = ClientOp::Write {
            addr: 0,
            data: 1,
            mask: WriteMask::BOTH,
        };
        assert_eq!(rig.submit(1, write), Err(RigError::ReadOnlySlot(1)));
    }

    #[test]
    fn tickets_count_per_slot() {
        let mut rig = rig();
        let a = rig.submit(0, ClientOp::Read { addr: 0 }).unwrap();
        let b = rig.submit(1, ClientOp::Read { addr: 0 }).unwrap();
        let c = rig.submit(0, ClientOp::Read { addr: 1 }).unwrap();
        assert_eq!((a.slot, a.seq), (0, 0));
        assert_eq!((b.slot, b.seq), (1, 0));
        assert_eq!((c.slot, c.seq), (0, 1));
    }

    #[test]
    fn unknown_ticket_is_an_error() {
        let mut rig = rig();
        let ticket = Ticket { slot: 0, seq: 5 };
        assert_eq!(
            rig.run_until_complete(ticket),
            Err(RigError::UnknownTicket(ticket))
        );
    }

    #[test]
    fn single_read_latency() {
        let mut rig = rig();
        rig.channel_mut().write_word(0x10, 0xBEEF);
        let ticket = rig.submit(0, ClientOp::Read { addr: 0x10 }).unwrap();
        let done = rig.run_until_complete(ticket).unwrap();
        assert_eq!(done.data, Some(0xBEEF));
        // latch, grant, accept, three edges of latency, deliver
        assert_eq!(done.latency(), 7);
    }

    #[test]
    fn run_until_idle_reports_stall() {
        let mut rig = rig();
        for addr in 0..4 {
            rig.submit(0, ClientOp::Read { addr }).unwrap();
        }
        assert!(matches!(
            rig.run_until_idle(5),
            Err(RigError::Stalled { cycles: 5, .. })
        ));
        assert!(rig.run_until_idle(200).is_ok());
        assert_eq!(rig.outstanding(), 0);
    }
}
