use crate::breakpoints::Breakpoint;

use super::{ResolvedSizeMap, SizeDescriptor};

/// Nearest defined entry for `active`: scan down to `xs` (inclusive of
/// `active`), then up toward `xl`.
pub fn cascade<T, F>(active: Breakpoint, mut lookup: F) -> Option<T>
where
    F: FnMut(Breakpoint) -> Option<T>,
{
    let index = active.index();
    let downward = Breakpoint::ALL[..=index].iter().rev();
    let upward = Breakpoint::ALL[index + 1..].iter();
    downward.chain(upward).find_map(|bp| lookup(*bp))
}

/// Picks the effective descriptor for the active breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeResolver {
    default: Breakpoint,
}

impl SizeResolver {
    pub const fn new(default: Breakpoint) -> Self {
        Self { default }
    }

    pub const fn default_breakpoint(&self) -> Breakpoint {
        self.default
    }

    pub fn resolve(&self, active: Breakpoint, map: &ResolvedSizeMap) -> SizeDescriptor {
        cascade(active, |bp| map.get(bp).cloned()).unwrap_or_else(SizeDescriptor::fallback)
    }

    /// String-keyed entry point; keys outside the closed set cascade from the default tier.
    pub fn resolve_key(&self, key: &str, map: &ResolvedSizeMap) -> SizeDescriptor {
        self.resolve(Breakpoint::parse_or(key, self.default), map)
    }
}

impl Default for SizeResolver {
    fn default() -> Self {
        Self::new(Breakpoint::Md)
    }
}
