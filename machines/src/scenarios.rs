//! Built-in traffic scenarios for the two-slot rig.

use jtframe_core::core::{MemoryChannel, WriteMask};
use jtframe_core::device::{RAM_SLOT, ROM_SLOT};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::registry::ScenarioEntry;
use crate::rig::{ClientOp, RigError, Ticket, TwoSlotRig};

/// Knobs shared by every scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScenarioParams {
    pub seed: u64,
    /// Operations per slot.
    pub ops: usize,
    /// Size of the read/write client's address space, in client addresses.
    pub ram_words: u32,
    /// Size of the read-only client's address space.
    pub rom_words: u32,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            seed: 1,
            ops: 256,
            ram_words: 0x800,
            rom_words: 0x800,
        }
    }
}

/// Operations to submit, as `(slot, op)` in submission order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Workload {
    pub ops: Vec<(usize, ClientOp)>,
}

impl Workload {
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn count(&self, slot: usize) -> usize {
        self.ops.iter().filter(|(s, _)| *s == slot).count()
    }

    /// Submit every operation to `rig`.
    pub fn submit_to<C: MemoryChannel>(
        &self,
        rig: &mut TwoSlotRig<C>,
    ) -> Result<Vec<Ticket>, RigError> {
        self.ops
            .iter()
            .map(|&(slot, op)| rig.submit(slot, op))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn wrap(addr: usize, words: u32) -> u32 {
    (addr as u32) % words.max(1)
}

/// Both slots read back to back from the start, so every grant is contested.
fn contention(params: &ScenarioParams) -> Workload {
    let mut ops = Vec::with_capacity(params.ops * 2);
    for i in 0..params.ops {
        let addr = wrap(i, params.ram_words);
        ops.push((RAM_SLOT, ClientOp::Read { addr }));
        // Stride of two keeps the ROM slot out of its word cache
        let addr = wrap(i * 2, params.rom_words);
        ops.push((ROM_SLOT, ClientOp::Read { addr }));
    }
    Workload { ops }
}

/// Fill the RAM region with a pattern, then read it back.
fn ram_fill(params: &ScenarioParams) -> Workload {
    let count = params.ops / 2;
    let mut ops = Vec::with_capacity(params.ops);
    for i in 0..count {
        ops.push((
            RAM_SLOT,
            ClientOp::Write {
                addr: wrap(i, params.ram_words),
                data: (i as u16).wrapping_mul(0x9E37) ^ params.seed as u16,
                mask: WriteMask::BOTH,
            },
        ));
    }
    for i in 0..count {
        let addr = wrap(i, params.ram_words);
        ops.push((RAM_SLOT, ClientOp::Read { addr }));
    }
    Workload { ops }
}

/// Sequential ROM reads. Every other read lands in the cached word.
fn rom_stream(params: &ScenarioParams) -> Workload {
    let ops = (0..params.ops)
        .map(|i| {
            let addr = wrap(i, params.rom_words);
            (ROM_SLOT, ClientOp::Read { addr })
        })
        .collect();
    Workload { ops }
}

/// Seeded random reads and masked writes on slot 0 mixed with random ROM reads.
fn mixed(params: &ScenarioParams) -> Workload {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut ops = Vec::with_capacity(params.ops * 2);
    for _ in 0..params.ops * 2 {
        if rng.gen_bool(0.5) {
            let addr = rng.gen_range(0..params.ram_words.max(1));
            let op = if rng.gen_bool(0.4) {
                ClientOp::Write {
                    addr,
                    data: rng.gen_range(0..=u16::MAX),
                    mask: WriteMask::from_bits(rng.gen_range(0..3u8)),
                }
            } else {
                ClientOp::Read { addr }
            };
            ops.push((RAM_SLOT, op));
        } else {
            let addr = rng.gen_range(0..params.rom_words.max(1));
            ops.push((ROM_SLOT, ClientOp::Read { addr }));
        }
    }
    Workload { ops }
}

inventory::submit! {
    ScenarioEntry::new("contention", "both slots read back to back", contention)
}

inventory::submit! {
    ScenarioEntry::new("ram-fill", "slot 0 writes a pattern then reads it back", ram_fill)
}

inventory::submit! {
    ScenarioEntry::new("rom-stream", "slot 1 reads sequentially through its cache", rom_stream)
}

inventory::submit! {
    ScenarioEntry::new("mixed", "seeded random traffic on both slots", mixed)
}
