use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use jtframe_core::device::Sdram;
use jtframe_machines::{ImageLayout, TwoSlotRig, registry};
use tracing::{Level, info, warn};
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod image_path;

use config::SimConfig;

#[derive(Parser)]
#[command(name = "jtframe-sim")]
#[command(version, about = "Cycle model of the JTFRAME two-slot SDRAM arbiter", long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/jtframe/sim.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Traffic scenario to run
    #[arg(short, long)]
    scenario: Option<String>,

    /// List the available scenarios and exit
    #[arg(long)]
    list: bool,

    /// Image for the read-only region: raw file, directory, or .zip
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Use only this file from the image archive or directory
    #[arg(long, requires = "image")]
    entry: Option<String>,

    /// Expected CRC32 of a single-file image, in hex
    #[arg(long, requires = "image", value_parser = parse_hex)]
    crc32: Option<u32>,

    #[arg(long)]
    seed: Option<u64>,

    /// Operations per slot
    #[arg(long)]
    ops: Option<usize>,

    /// Give up after this many cycles
    #[arg(long)]
    max_cycles: Option<u64>,

    #[arg(long)]
    read_latency: Option<u32>,

    #[arg(long)]
    write_latency: Option<u32>,

    /// Turn the read-only slot's word cache off
    #[arg(long)]
    no_cache: bool,

    /// error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<String>,
}

fn parse_hex(text: &str) -> Result<u32, std::num::ParseIntError> {
    let digits = text.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(digits, 16)
}

impl Cli {
    /// Command-line values win over the config file.
    fn apply(&self, config: &mut SimConfig) {
        if let Some(scenario) = &self.scenario {
            config.scenario = scenario.clone();
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(ops) = self.ops {
            config.ops = ops;
        }
        if let Some(max_cycles) = self.max_cycles {
            config.max_cycles = max_cycles;
        }
        if let Some(latency) = self.read_latency {
            config.read_latency = latency;
        }
        if let Some(latency) = self.write_latency {
            config.write_latency = latency;
        }
        if self.no_cache {
            config.slot1_cache = false;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }
}

fn setup_logging(level: &str) -> Result<()> {
    let level: Level = level
        .parse()
        .with_context(|| format!("unknown log level {level:?}"))?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .compact()
        .finish()
        .init();
    Ok(())
}

fn list_scenarios() {
    for entry in registry::all() {
        println!("{:<12} {}", entry.name, entry.description);
    }
}

fn load_image(cli: &Cli, config: &SimConfig, sdram: &mut Sdram) -> Result<()> {
    let Some(path) = &cli.image else {
        return Ok(());
    };
    let set = image_path::load_image_set(path, cli.entry.as_deref())
        .with_context(|| format!("loading image {}", path.display()))?;
    if set.is_empty() {
        bail!("image {} holds no files", path.display());
    }

    let mut layout = ImageLayout::sequential(&set);
    for part in &mut layout.parts {
        part.word_offset += config.slot1_offset;
    }
    if let Some(crc) = cli.crc32 {
        match layout.parts.as_mut_slice() {
            [part] => part.crc32 = Some(crc),
            _ => bail!("--crc32 needs a single-file image (use --entry)"),
        }
    }

    let bytes = layout.download(&set, sdram, true)?;
    info!(bytes, files = layout.parts.len(), "image loaded");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list {
        list_scenarios();
        return Ok(());
    }

    let mut config = SimConfig::load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);
    setup_logging(&config.log_level)?;

    let rig_config = config.rig_config()?;
    let entry = registry::lookup(&config.scenario)?;

    let mut sdram = Sdram::new(config.sdram_config());
    load_image(&cli, &config, &mut sdram)?;

    let mut rig = TwoSlotRig::with_sdram(rig_config, sdram);
    let workload = (entry.build)(&config.scenario_params());
    workload.submit_to(&mut rig)?;
    info!(
        scenario = entry.name,
        ops = workload.len(),
        "running scenario"
    );

    let cycles = rig
        .run_until_idle(config.max_cycles)
        .with_context(|| format!("scenario {}", entry.name))?;
    let report = rig.report();
    if report.stats.protocol_violations > 0 {
        warn!(
            count = report.stats.protocol_violations,
            "channel protocol violations"
        );
    }
    info!(cycles, "scenario complete");
    println!("{report}");
    Ok(())
}
