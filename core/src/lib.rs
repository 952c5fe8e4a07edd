pub mod core;
pub mod device;

pub mod prelude {
    pub use crate::core::{
        ChannelOp, ChannelRequest, ChannelResponse, Component, DataWidth, MemoryChannel,
        SlotRequest, WriteMask,
    };
    pub use crate::device::{Ram2Slots, Ram2SlotsConfig, Ram2SlotsInputs, Sdram, SdramConfig};
}
