//! Simulator configuration: a TOML file with every field optional,
//! overridden field by field from the command line.

use std::path::{Path, PathBuf};

use jtframe_core::core::DataWidth;
use jtframe_core::device::{Ram2SlotsConfig, SdramConfig};
use jtframe_machines::{RigConfig, ScenarioParams};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("slot {slot}: data width must be 8, 16 or 32, not {bits}")]
    InvalidWidth { slot: usize, bits: u32 },

    #[error("{name} latency must be at least one cycle")]
    InvalidLatency { name: &'static str },

    #[error("address width must be 1..=28, not {0}")]
    InvalidAddrWidth(u32),

    #[error("slot {slot}: offset 0x{offset:X} is outside the {words}-word channel")]
    OffsetOutOfRange { slot: usize, offset: u32, words: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Channel address width in bits.
    pub addr_width: u32,
    pub read_latency: u32,
    pub write_latency: u32,
    pub slot0_width: u32,
    pub slot1_width: u32,
    pub slot1_cache: bool,
    pub slot0_offset: u32,
    pub slot1_offset: u32,
    pub scenario: String,
    pub seed: u64,
    pub ops: usize,
    pub ram_words: u32,
    pub rom_words: u32,
    pub max_cycles: u64,
    pub log_level: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            addr_width: 22,
            read_latency: 3,
            write_latency: 2,
            slot0_width: 16,
            slot1_width: 16,
            slot1_cache: true,
            slot0_offset: 0,
            slot1_offset: 0x10_0000,
            scenario: "mixed".to_string(),
            seed: 1,
            ops: 1000,
            ram_words: 0x1000,
            rom_words: 0x1000,
            max_cycles: 1_000_000,
            log_level: "warn".to_string(),
        }
    }
}

/// `$XDG_CONFIG_HOME/jtframe/sim.toml` or the platform equivalent.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("jtframe").join("sim.toml"))
}

impl SimConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// An explicit path must exist. Otherwise the default path is used if
    /// present, and built-in defaults if not.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=28).contains(&self.addr_width) {
            return Err(ConfigError::InvalidAddrWidth(self.addr_width));
        }
        if self.read_latency == 0 {
            return Err(ConfigError::InvalidLatency { name: "read" });
        }
        if self.write_latency == 0 {
            return Err(ConfigError::InvalidLatency { name: "write" });
        }
        self.widths()?;
        let words = 1u64 << self.addr_width;
        for (slot, offset) in [(0, self.slot0_offset), (1, self.slot1_offset)] {
            if offset as u64 >= words {
                return Err(ConfigError::OffsetOutOfRange {
                    slot,
                    offset,
                    words,
                });
            }
        }
        Ok(())
    }

    fn widths(&self) -> Result<(DataWidth, DataWidth), ConfigError> {
        let width = |slot, bits| {
            DataWidth::from_bits(bits).ok_or(ConfigError::InvalidWidth { slot, bits })
        };
        Ok((width(0, self.slot0_width)?, width(1, self.slot1_width)?))
    }

    pub fn sdram_config(&self) -> SdramConfig {
        SdramConfig {
            addr_width: self.addr_width,
            read_latency: self.read_latency,
            write_latency: self.write_latency,
        }
    }

    pub fn rig_config(&self) -> Result<RigConfig, ConfigError> {
        self.validate()?;
        let (slot0_width, slot1_width) = self.widths()?;
        Ok(RigConfig {
            arbiter: Ram2SlotsConfig {
                addr_width: self.addr_width,
                slot0_width,
                slot1_width,
                slot1_cache: self.slot1_cache,
            },
            slot0_offset: self.slot0_offset,
            slot1_offset: self.slot1_offset,
        })
    }

    pub fn scenario_params(&self) -> ScenarioParams {
        ScenarioParams {
            seed: self.seed,
            ops: self.ops,
            ram_words: self.ram_words,
            rom_words: self.rom_words,
        }
    }
}
