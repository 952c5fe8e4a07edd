pub mod image;
pub mod registry;
pub mod rig;
pub mod scenarios;

pub use image::{ImageLayout, ImageLoadError, ImagePart, ImageSet};
pub use registry::{ScenarioEntry, ScenarioError};
pub use rig::{ClientOp, Completion, RigConfig, RigError, RigReport, SlotReport, Ticket, TwoSlotRig};
pub use scenarios::{ScenarioParams, Workload};
