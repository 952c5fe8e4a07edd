mod common;

use common::{Bench, ScriptedChannel};
use jtframe_core::core::{ChannelResponse, DataWidth, WriteMask};
use jtframe_core::device::{Ram2SlotsConfig, RomRqInputs, SchedulerState, Sdram, SdramConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// =================================================================
// Ordering and routing
// =================================================================

#[test]
fn simultaneous_reads_served_slot0_first() {
    let mut bench = Bench::new();
    bench.channel.write_word(0x10, 0xBEEF);
    bench.channel.write_word(0x20, 0xCAFE);
    bench.read0(0x10);
    bench.read1(0x20);

    let mut grants = Vec::new();
    let mut slot0_done = None;
    let mut slot1_done = None;
    for _ in 0..40 {
        bench.step();
        if let Some(owner) = bench.arbiter.owner()
            && grants.last() != Some(&owner)
        {
            grants.push(owner);
        }
        if bench.arbiter.slot0_ok() {
            assert!(!bench.arbiter.slot1_ok());
            assert_eq!(bench.arbiter.slot0_dout(), 0xBEEF);
            // Released and regranted on the same edge
            assert_eq!(bench.arbiter.owner(), Some(1));
            assert!(bench.arbiter.channel_request().rd);
            assert_eq!(bench.arbiter.channel_request().addr, 0x20);
            slot0_done = Some(bench.cycle);
            bench.release0();
        }
        if bench.arbiter.slot1_ok() {
            assert!(!bench.arbiter.slot0_ok());
            assert_eq!(bench.arbiter.slot1_dout(), 0xCAFE);
            slot1_done = Some(bench.cycle);
            bench.release1();
        }
    }

    assert_eq!(grants, vec![0, 1]);
    // latch, grant, accept, three edges of latency, deliver
    assert_eq!(slot0_done, Some(7));
    assert_eq!(slot1_done, Some(12));
    assert_eq!(bench.arbiter.stats().grants, [1, 1]);
}

#[test]
fn slot0_granted_first_when_both_eligible() {
    let mut bench = Bench::new();
    bench.read0(0x10);
    bench.read1(0x20);
    bench.step(); // both latch
    bench.step(); // grant
    assert_eq!(bench.arbiter.owner(), Some(0));
    assert!(bench.arbiter.slot0().is_granted());
    assert!(!bench.arbiter.slot1().is_granted());
    assert!(bench.arbiter.slot1().request().is_some());
}

#[test]
fn rom_only_traffic_never_pulses_ram_slot() {
    let mut bench = Bench::new();
    bench.channel.write_word(0x55, 0x4321);
    bench.read1(0x55);
    bench.step_until(20, |b| {
        assert!(!b.arbiter.slot0_ok());
        b.arbiter.slot1_ok()
    });
    assert_eq!(bench.arbiter.slot1_dout(), 0x4321);
}

// =================================================================
// Address latching and writes
// =================================================================

#[test]
fn address_change_while_pending_keeps_original() {
    let mut bench = Bench::new();
    bench.channel.write_word(0x10, 0x1111);
    bench.channel.write_word(0x30, 0x3333);
    bench.read0(0x10);
    bench.step();
    bench.inputs.slot0.addr = 0x30;
    bench.step_until(20, |b| b.arbiter.slot0_ok());
    assert_eq!(bench.arbiter.slot0_dout(), 0x1111);
    assert_eq!(bench.arbiter.slot0().sdram_addr(), 0x10);
}

#[test]
fn low_byte_write_preserves_high_byte() {
    let mut bench = Bench::new();
    bench.channel.write_word(0x40, 0xAABB);
    bench.write0(0x40, 0x1234, WriteMask::LOW_ONLY);
    bench.step_until(20, |b| b.arbiter.slot0_ok());
    bench.release0();
    bench.step();

    bench.read0(0x40);
    bench.step_until(20, |b| b.arbiter.slot0_ok());
    assert_eq!(bench.arbiter.slot0_dout(), 0xAA34);
}

#[test]
fn write_releases_channel_on_ack() {
    let mut bench = Bench::new();
    bench.write0(0x40, 0x1234, WriteMask::BOTH);
    bench.read1(0x20);
    let cycles = bench.step_until(20, |b| b.arbiter.slot0_ok());
    // latch, grant, accept, ack seen
    assert_eq!(cycles, 4);
    assert_eq!(bench.arbiter.owner(), Some(1));
    assert_eq!(bench.arbiter.state(), SchedulerState::OwnedRead);
    assert_eq!(bench.arbiter.stats().writes, 1);
}

#[test]
fn byte_wide_ram_client_reads_its_lane() {
    let config = Ram2SlotsConfig {
        slot0_width: DataWidth::Bits8,
        ..Default::default()
    };
    let sdram = Sdram::new(SdramConfig {
        addr_width: 12,
        ..Default::default()
    });
    let mut bench = Bench::with_channel(config, sdram);
    bench.channel.write_word(0x10, 0xBEEF);
    bench.read0(0x21);
    bench.step_until(20, |b| b.arbiter.slot0_ok());
    assert_eq!(bench.arbiter.slot0_dout(), 0xBE);
}

// =================================================================
// ROM slot cache
// =================================================================

#[test]
fn rom_cache_hit_skips_channel() {
    let mut bench = Bench::new();
    bench.channel.write_word(0x20, 0xBEEF);
    bench.channel.write_word(0x21, 0xCAFE);
    bench.read1(0x20);
    bench.step_until(20, |b| b.arbiter.slot1_ok());
    bench.release1();
    bench.step();

    bench.read1(0x21);
    bench.step();
    assert!(bench.arbiter.slot1_ok());
    assert_eq!(bench.arbiter.slot1_dout(), 0xCAFE);
    assert_eq!(bench.arbiter.stats().grants, [0, 1]);
}

#[test]
fn rom_clear_forces_refetch() {
    let mut bench = Bench::new();
    bench.channel.write_word(0x20, 0xBEEF);
    bench.read1(0x20);
    bench.step_until(20, |b| b.arbiter.slot1_ok());
    bench.inputs.slot1 = RomRqInputs {
        clr: true,
        ..Default::default()
    };
    bench.step();
    bench.channel.write_word(0x20, 0x600D);

    bench.read1(0x20);
    bench.step_until(20, |b| b.arbiter.slot1_ok());
    assert_eq!(bench.arbiter.slot1_dout(), 0x600D);
    assert_eq!(bench.arbiter.stats().grants, [0, 2]);
}

// =================================================================
// Reset and channel misbehaviour
// =================================================================

#[test]
fn held_reset_keeps_everything_idle() {
    let mut bench = Bench::new();
    bench.read0(0x10);
    bench.read1(0x20);
    bench.step();
    bench.step();
    assert_eq!(bench.arbiter.owner(), Some(0));

    bench.inputs.rst = true;
    for _ in 0..5 {
        bench.step();
        assert_eq!(bench.arbiter.owner(), None);
        assert!(bench.arbiter.slot0().is_idle());
        assert!(bench.arbiter.slot1().is_idle());
        assert!(!bench.arbiter.channel_request().rd);
        assert!(!bench.arbiter.channel_request().wr);
    }

    // cs still held: the first edge out of reset takes it as a new request
    bench.inputs.rst = false;
    bench.step();
    assert!(bench.arbiter.slot0().request().is_some());
}

#[test]
fn stray_data_is_counted_not_routed() {
    let script = vec![ChannelResponse {
        ack: false,
        data_ready: true,
        data: 0xDEAD,
    }];
    let mut bench = Bench::with_channel(Ram2SlotsConfig::default(), ScriptedChannel::new(script));
    bench.step();
    assert_eq!(bench.arbiter.stats().protocol_violations, 1);
    assert!(!bench.arbiter.slot0_ok());
    assert!(!bench.arbiter.slot1_ok());
}

#[test]
fn silent_channel_stalls_forever() {
    let mut bench = Bench::with_channel(Ram2SlotsConfig::default(), ScriptedChannel::new(vec![]));
    bench.read0(0x10);
    bench.read1(0x20);
    for _ in 0..200 {
        bench.step();
    }
    assert_eq!(bench.arbiter.owner(), Some(0));
    assert!(bench.arbiter.channel_request().rd);
    assert!(bench.arbiter.slot1().request().is_some());
    assert!(bench.channel.seen.iter().skip(2).all(|req| req.rd && req.addr == 0x10));
}

// =================================================================
// Randomized traffic
// =================================================================

const ROM_OFFSET: u32 = 0x800;

#[derive(Default)]
struct Client {
    waiting: bool,
    cooling: bool,
    since: u64,
    expected: Option<u32>,
}

#[test]
fn random_traffic_single_owner_and_correct_data() {
    let mut rng = StdRng::seed_from_u64(0x2510_7A3E);
    let mut bench = Bench::new();

    let mut model = vec![0u16; 0x800];
    for addr in 0..0x400u32 {
        let word: u16 = rng.gen_range(0..=u16::MAX);
        bench.channel.write_word(ROM_OFFSET + addr, word);
    }
    let rom: Vec<u16> = (0..0x401u32)
        .map(|addr| bench.channel.read_word(ROM_OFFSET + addr))
        .collect();

    let mut ram = Client::default();
    let mut rom_client = Client::default();
    let mut completed = [0u32; 2];

    for _ in 0..20_000 {
        if ram.cooling {
            ram.cooling = false;
        } else if !ram.waiting && rng.gen_bool(0.4) {
            let addr = rng.gen_range(0..0x800u32);
            if rng.gen_bool(0.5) {
                let data = rng.gen_range(0..=u16::MAX);
                let mask = WriteMask::from_bits(rng.gen_range(0..4u8));
                model[addr as usize] = mask.merge(model[addr as usize], data);
                bench.write0(addr, data, mask);
                ram.expected = None;
            } else {
                bench.read0(addr);
                ram.expected = Some(model[addr as usize] as u32);
            }
            ram.waiting = true;
            ram.since = bench.cycle;
        }

        if rom_client.cooling {
            rom_client.cooling = false;
        } else if !rom_client.waiting && rng.gen_bool(0.4) {
            let addr = rng.gen_range(0..0x400u32);
            bench.inputs.slot1 = RomRqInputs {
                addr,
                cs: true,
                offset: ROM_OFFSET,
                clr: rng.gen_bool(0.05),
            };
            rom_client.expected = Some(rom[addr as usize] as u32);
            rom_client.waiting = true;
            rom_client.since = bench.cycle;
        }

        bench.step();

        let arb = &bench.arbiter;
        assert!(!(arb.slot0().is_granted() && arb.slot1().is_granted()));
        match arb.owner() {
            Some(0) => assert!(arb.slot0().is_granted()),
            Some(1) => assert!(arb.slot1().is_granted()),
            None => assert!(!arb.slot0().is_granted() && !arb.slot1().is_granted()),
            Some(other) => panic!("owner {other} out of range"),
        }

        if arb.slot0_ok() {
            assert!(ram.waiting, "data_ok on ram slot with nothing outstanding");
            if let Some(expected) = ram.expected {
                assert_eq!(arb.slot0_dout(), expected);
            }
            completed[0] += 1;
            ram.waiting = false;
            ram.cooling = true;
            bench.release0();
        }
        if bench.arbiter.slot1_ok() {
            assert!(rom_client.waiting, "data_ok on rom slot with nothing outstanding");
            assert_eq!(Some(bench.arbiter.slot1_dout()), rom_client.expected);
            completed[1] += 1;
            rom_client.waiting = false;
            rom_client.cooling = true;
            bench.release1();
        }
        // clr is a one-cycle strobe from the client's side
        bench.inputs.slot1.clr = false;

        for client in [&ram, &rom_client] {
            if client.waiting {
                assert!(bench.cycle - client.since < 64, "request starved");
            }
        }
    }

    assert!(completed[0] > 500);
    assert!(completed[1] > 500);
    assert_eq!(bench.arbiter.stats().protocol_violations, 0);
}
