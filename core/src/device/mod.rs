pub mod ram_2slots;
pub mod ram_rq;
pub mod rom_rq;
pub mod sdram;
pub mod slot_scheduler;

pub use ram_2slots::{RAM_SLOT, ROM_SLOT, Ram2Slots, Ram2SlotsConfig, Ram2SlotsInputs};
pub use ram_rq::{RamRq, RamRqInputs, SlotState};
pub use rom_rq::{RomRq, RomRqInputs};
pub use sdram::{Sdram, SdramConfig};
pub use slot_scheduler::{SchedulerState, SchedulerStats, SlotScheduler};
