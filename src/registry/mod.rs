//! Process-wide slot registry: base presets merged with caller configuration.

mod core;
mod presets;

pub use self::core::{
    DesignRef, SlotDefinition, SlotMeta, SlotRegistry, VariantMeta, merge_meta, parse_registry,
};
pub use presets::base_registry;
