//! Slot instances, their resolution and the frames nested slots inherit from.

mod context;
mod instance;

pub use context::{SlotContext, SlotFrame};
pub use instance::{
    DEFAULT_VARIANT, ResolveEnv, ResolvedSlot, SlotInstance, SlotOverrides, SlotSizing,
};
