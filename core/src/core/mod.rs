pub mod channel;
pub mod component;

pub use channel::{
    ChannelOp, ChannelRequest, ChannelResponse, DataWidth, MemoryChannel, SlotRequest, WriteMask,
};
pub use component::Component;
