//! Size descriptors, per-breakpoint size maps and the breakpoint cascade.

mod map;
mod resolver;
mod value;

pub use map::{ResolvedSizeMap, SlotSizeMap, merge_size_maps};
pub use resolver::{SizeResolver, cascade};
pub use value::{Dimension, PartialSize, SizeDescriptor, SizeValue, resolve_size_value};
