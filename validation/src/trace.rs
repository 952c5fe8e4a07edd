//! Seeded per-slot operation traces with golden results.
//!
//! A trace pins the channel geometry, the read-only region contents and the
//! operation list for both slots. The expected data comes from a plain word
//! model (the two slots touch disjoint regions, so program order per slot is
//! enough), and the completion cycles are recorded from the cycle model so an
//! RTL run can be compared edge for edge.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use jtframe_core::core::WriteMask;
use jtframe_core::device::{RAM_SLOT, ROM_SLOT, Ram2SlotsConfig, Sdram, SdramConfig};
use jtframe_machines::{ClientOp, Completion, RigConfig, TwoSlotRig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{CheckedSdram, Violation};

/// Words of the read/write region (at channel word 0).
pub const RAM_WORDS: u32 = 0x400;
/// Words of the read-only region (at [`TraceConfig::slot1_offset`]).
pub const ROM_WORDS: u32 = 0x400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceConfig {
    pub addr_width: u32,
    pub read_latency: u32,
    pub write_latency: u32,
    pub slot1_offset: u32,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            addr_width: 12,
            read_latency: 3,
            write_latency: 2,
            slot1_offset: 0x800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum TraceOp {
    Read { slot: usize, addr: u32 },
    Write { addr: u32, data: u16, mask: u8 },
}

impl TraceOp {
    pub fn slot(&self) -> usize {
        match *self {
            TraceOp::Read { slot, .. } => slot,
            TraceOp::Write { .. } => RAM_SLOT,
        }
    }

    fn client_op(&self) -> ClientOp {
        match *self {
            TraceOp::Read { addr, .. } => ClientOp::Read { addr },
            TraceOp::Write { addr, data, mask } => ClientOp::Write {
                addr,
                data,
                mask: WriteMask::from_bits(mask),
            },
        }
    }
}

/// Golden outcome of one operation, in the same order as the ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceResult {
    pub data: Option<u32>,
    pub completed_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceVector {
    pub name: String,
    pub seed: u64,
    pub config: TraceConfig,
    /// Read-only region contents, starting at `config.slot1_offset`.
    pub rom: Vec<u16>,
    pub ops: Vec<TraceOp>,
    pub expected: Vec<TraceResult>,
}

/// One way a replay differed from the golden results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    Data {
        index: usize,
        expected: Option<u32>,
        actual: Option<u32>,
    },
    Timing {
        index: usize,
        expected: u64,
        actual: u64,
    },
    Channel(Violation),
    Stalled {
        outstanding: usize,
    },
}

// --- Generation ---

/// Random ops for both slots with a seeded generator. Slot 0 mixes reads
/// and masked writes over the RAM region; slot 1 reads the ROM region.
pub fn generate(name: &str, seed: u64, ops_per_slot: usize) -> TraceVector {
    let mut rng = StdRng::seed_from_u64(seed);
    let config = TraceConfig::default();
    let rom: Vec<u16> = (0..ROM_WORDS + 1)
        .map(|_| rng.gen_range(0..=u16::MAX))
        .collect();

    let mut ops = Vec::with_capacity(ops_per_slot * 2);
    let (mut ram_ops, mut rom_ops) = (0, 0);
    while ram_ops < ops_per_slot || rom_ops < ops_per_slot {
        let pick_ram = rom_ops >= ops_per_slot || (ram_ops < ops_per_slot && rng.gen_bool(0.5));
        if pick_ram {
            let addr = rng.gen_range(0..RAM_WORDS);
            if rng.gen_bool(0.4) {
                ops.push(TraceOp::Write {
                    addr,
                    data: rng.gen_range(0..=u16::MAX),
                    mask: rng.gen_range(0..3u8),
                });
            } else {
                ops.push(TraceOp::Read {
                    slot: RAM_SLOT,
                    addr,
                });
            }
            ram_ops += 1;
        } else {
            // Sequential runs exercise the ROM slot's word cache
            let addr = if rng.gen_bool(0.3) {
                match ops.iter().rev().find(|op| op.slot() == ROM_SLOT) {
                    Some(TraceOp::Read { addr, .. }) => (addr + 1) % ROM_WORDS,
                    _ => 0,
                }
            } else {
                rng.gen_range(0..ROM_WORDS)
            };
            ops.push(TraceOp::Read {
                slot: ROM_SLOT,
                addr,
            });
            rom_ops += 1;
        }
    }

    let mut vector = TraceVector {
        name: name.to_string(),
        seed,
        config,
        expected: golden_data(&rom, &ops),
        rom,
        ops,
    };
    let outcome = run(&vector);
    for (expected, done) in vector.expected.iter_mut().zip(&outcome.completions) {
        expected.completed_at = done.map(|c| c.completed_at);
    }
    vector
}

fn golden_data(rom: &[u16], ops: &[TraceOp]) -> Vec<TraceResult> {
    let mut ram = vec![0u16; RAM_WORDS as usize];
    ops.iter()
        .map(|op| {
            let data = match *op {
                TraceOp::Write { addr, data, mask } => {
                    let word = &mut ram[addr as usize];
                    *word = WriteMask::from_bits(mask).merge(*word, data);
                    None
                }
                TraceOp::Read { slot: RAM_SLOT, addr } => Some(ram[addr as usize] as u32),
                TraceOp::Read { addr, .. } => Some(rom[addr as usize] as u32),
            };
            TraceResult {
                data,
                completed_at: None,
            }
        })
        .collect()
}

// --- Replay ---

struct RunOutcome {
    completions: Vec<Option<Completion>>,
    violations: Vec<Violation>,
    outstanding: usize,
}

fn cycle_budget(vector: &TraceVector) -> u64 {
    let per_op = 8 + (vector.config.read_latency + vector.config.write_latency) as u64 * 2;
    (vector.ops.len() as u64 + 1) * per_op
}

fn run(vector: &TraceVector) -> RunOutcome {
    let config = vector.config;
    let sdram = Sdram::new(SdramConfig {
        addr_width: config.addr_width,
        read_latency: config.read_latency,
        write_latency: config.write_latency,
    });
    let mut channel = CheckedSdram::from_sdram(sdram);
    let rom_bytes: Vec<u8> = vector.rom.iter().flat_map(|w| w.to_le_bytes()).collect();
    channel.load(config.slot1_offset, &rom_bytes);

    let rig_config = RigConfig {
        arbiter: Ram2SlotsConfig {
            addr_width: config.addr_width,
            ..Default::default()
        },
        slot0_offset: 0,
        slot1_offset: config.slot1_offset,
    };
    let mut rig = TwoSlotRig::new(rig_config, channel);
    let tickets: Vec<_> = vector
        .ops
        .iter()
        .map(|op| rig.submit(op.slot(), op.client_op()).ok())
        .collect();

    // A stall shows up as missing completions
    let _ = rig.run_until_idle(cycle_budget(vector));

    RunOutcome {
        completions: tickets
            .iter()
            .map(|t| t.and_then(|t| rig.poll(t)))
            .collect(),
        violations: rig.channel_mut().take_violations(),
        outstanding: rig.outstanding(),
    }
}

/// Run `vector` through the rig over a checked channel and list every
/// difference from its golden results.
pub fn replay(vector: &TraceVector) -> Vec<Mismatch> {
    let outcome = run(vector);
    let mut mismatches: Vec<Mismatch> = outcome
        .violations
        .into_iter()
        .map(Mismatch::Channel)
        .collect();

    for (index, (expected, done)) in vector.expected.iter().zip(&outcome.completions).enumerate() {
        let Some(done) = done else { continue };
        if done.data != expected.data {
            mismatches.push(Mismatch::Data {
                index,
                expected: expected.data,
                actual: done.data,
            });
        }
        if let Some(cycle) = expected.completed_at
            && cycle != done.completed_at
        {
            mismatches.push(Mismatch::Timing {
                index,
                expected: cycle,
                actual: done.completed_at,
            });
        }
    }

    if outcome.outstanding > 0 {
        mismatches.push(Mismatch::Stalled {
            outstanding: outcome.outstanding,
        });
    }
    mismatches
}

// --- Files ---

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

/// Write vectors as JSON, gzip-compressed when the path ends in `.gz`.
pub fn save(path: &Path, vectors: &[TraceVector]) -> io::Result<()> {
    let file = BufWriter::new(File::create(path)?);
    if is_gzip(path) {
        let mut encoder = GzEncoder::new(file, Compression::default());
        serde_json::to_writer(&mut encoder, vectors)?;
        encoder.finish()?.flush()
    } else {
        let mut file = file;
        serde_json::to_writer_pretty(&mut file, vectors)?;
        file.flush()
    }
}

pub fn load(path: &Path) -> io::Result<Vec<TraceVector>> {
    let file = BufReader::new(File::open(path)?);
    let mut json = String::new();
    if is_gzip(path) {
        GzDecoder::new(file).read_to_string(&mut json)?;
    } else {
        let mut file = file;
        file.read_to_string(&mut json)?;
    }
    Ok(serde_json::from_str(&json)?)
}
