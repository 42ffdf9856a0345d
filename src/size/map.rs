use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::breakpoints::Breakpoint;
use crate::tokens::TokenResolver;

use super::{Dimension, PartialSize, SizeDescriptor, SizeValue};

/// Sparse breakpoint → size map as authored in a registry or override.
///
/// Keys outside the closed breakpoint set never make it in: parsing drops
/// them, and deserialization goes through the same path.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlotSizeMap(BTreeMap<Breakpoint, PartialSize>);

impl SlotSizeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, breakpoint: Breakpoint, size: PartialSize) -> Self {
        self.0.insert(breakpoint, size);
        self
    }

    /// Build from string-keyed entries, returning the keys that were dropped.
    pub fn parse_raw<I, K>(entries: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = (K, PartialSize)>,
        K: AsRef<str>,
    {
        let mut map = BTreeMap::new();
        let mut dropped = Vec::new();
        for (key, size) in entries {
            match key.as_ref().parse::<Breakpoint>() {
                Ok(breakpoint) => {
                    map.insert(breakpoint, size);
                }
                Err(_) => dropped.push(key.as_ref().to_string()),
            }
        }
        (Self(map), dropped)
    }

    pub fn get(&self, breakpoint: Breakpoint) -> Option<&PartialSize> {
        self.0.get(&breakpoint)
    }

    pub fn insert(&mut self, breakpoint: Breakpoint, size: PartialSize) {
        self.0.insert(breakpoint, size);
    }

    pub fn remove(&mut self, breakpoint: Breakpoint) -> Option<PartialSize> {
        self.0.remove(&breakpoint)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Breakpoint, &PartialSize)> {
        self.0.iter().map(|(bp, size)| (*bp, size))
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = Breakpoint> + '_ {
        self.0.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Set or clear one dimension; a breakpoint left with no fields is removed.
    pub fn set_dimension(
        &mut self,
        breakpoint: Breakpoint,
        dimension: Dimension,
        value: Option<SizeValue>,
    ) {
        let value = value.filter(|v| !v.is_blank());
        let mut entry = self.0.remove(&breakpoint).unwrap_or_default();
        entry.set(dimension, value);
        if !entry.is_empty() {
            self.0.insert(breakpoint, entry);
        }
    }

    /// Per-breakpoint, per-field overlay. Neither input is modified.
    pub fn overlay(&self, overrides: &SlotSizeMap) -> SlotSizeMap {
        let mut merged = self.0.clone();
        for (breakpoint, size) in &overrides.0 {
            let layered = match merged.get(breakpoint) {
                Some(base) => base.overlay(size),
                None => size.clone(),
            };
            merged.insert(*breakpoint, layered);
        }
        SlotSizeMap(merged)
    }

    /// Strip blank values and empty breakpoints; `None` when nothing remains.
    pub fn sanitized(&self) -> Option<SlotSizeMap> {
        let cleaned: BTreeMap<_, _> = self
            .0
            .iter()
            .map(|(bp, size)| (*bp, size.sanitized()))
            .filter(|(_, size)| !size.is_empty())
            .collect();
        (!cleaned.is_empty()).then_some(SlotSizeMap(cleaned))
    }
}

impl FromIterator<(Breakpoint, PartialSize)> for SlotSizeMap {
    fn from_iter<T: IntoIterator<Item = (Breakpoint, PartialSize)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'de> Deserialize<'de> for SlotSizeMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, PartialSize>::deserialize(deserializer)?;
        Ok(SlotSizeMap::parse_raw(raw).0)
    }
}

/// Breakpoint → fully normalized descriptor, the input to the cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedSizeMap(BTreeMap<Breakpoint, SizeDescriptor>);

impl ResolvedSizeMap {
    pub fn get(&self, breakpoint: Breakpoint) -> Option<&SizeDescriptor> {
        self.0.get(&breakpoint)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Breakpoint, &SizeDescriptor)> {
        self.0.iter().map(|(bp, d)| (*bp, d))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Back to an authored map so descendants can layer overrides on top.
    pub fn to_size_map(&self) -> SlotSizeMap {
        self.iter()
            .map(|(breakpoint, descriptor)| (breakpoint, descriptor.to_partial()))
            .collect()
    }
}

impl FromIterator<(Breakpoint, SizeDescriptor)> for ResolvedSizeMap {
    fn from_iter<T: IntoIterator<Item = (Breakpoint, SizeDescriptor)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Layer an instance's overrides over a registry entry and normalize the result.
///
/// Breakpoints present in either side appear in the output; each field of
/// the override wins only when it is present.
pub fn merge_size_maps(
    base: &SlotSizeMap,
    overrides: &SlotSizeMap,
    tokens: &dyn TokenResolver,
) -> ResolvedSizeMap {
    base.overlay(overrides)
        .iter()
        .map(|(breakpoint, size)| (breakpoint, size.normalize(tokens)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::NoTokens;

    #[test]
    fn parse_raw_drops_unknown_breakpoints() {
        let (map, dropped) = SlotSizeMap::parse_raw([
            ("md", PartialSize::new().inline("10rem")),
            ("xxl", PartialSize::new().inline("99rem")),
        ]);
        assert_eq!(map.len(), 1);
        assert_eq!(dropped, vec!["xxl".to_string()]);

        let parsed: SlotSizeMap =
            serde_json::from_str(r#"{"sm": {"inline": "1rem"}, "tablet": {"inline": "2rem"}}"#)
                .unwrap();
        assert_eq!(parsed.breakpoints().collect::<Vec<_>>(), vec![Breakpoint::Sm]);
    }

    #[test]
    fn merge_preserves_unspecified_fields_and_breakpoints() {
        let base = SlotSizeMap::new()
            .with(Breakpoint::Xs, PartialSize::new().inline("100%"))
            .with(Breakpoint::Md, PartialSize::new().inline("5rem").block("2rem"));
        let overrides = SlotSizeMap::new().with(Breakpoint::Md, PartialSize::new().inline("10rem"));

        let merged = merge_size_maps(&base, &overrides, &NoTokens);
        let md = merged.get(Breakpoint::Md).unwrap();
        assert_eq!(md.inline, "10rem");
        assert_eq!(md.block, "2rem");
        assert_eq!(md.max_inline, "none");
        assert_eq!(merged.get(Breakpoint::Xs).unwrap().inline, "100%");
        // inputs untouched
        assert_eq!(
            base.get(Breakpoint::Md).unwrap().inline,
            Some(SizeValue::from("5rem"))
        );
    }

    #[test]
    fn set_dimension_removes_emptied_breakpoints() {
        let mut map = SlotSizeMap::new();
        map.set_dimension(Breakpoint::Lg, Dimension::Block, Some(SizeValue::from("20rem")));
        assert_eq!(map.len(), 1);
        map.set_dimension(Breakpoint::Lg, Dimension::Block, Some(SizeValue::from("")));
        assert!(map.is_empty());
    }

    #[test]
    fn sanitized_collapses_to_none() {
        let map = SlotSizeMap::new().with(Breakpoint::Sm, PartialSize::new().inline(" "));
        assert_eq!(map.sanitized(), None);

        let kept = SlotSizeMap::new()
            .with(Breakpoint::Sm, PartialSize::new().inline("").block("3rem"))
            .sanitized()
            .unwrap();
        assert_eq!(kept.get(Breakpoint::Sm), Some(&PartialSize::new().block("3rem")));
    }

    #[test]
    fn resolved_maps_round_back_into_overridable_maps() {
        let base = SlotSizeMap::new().with(Breakpoint::Md, PartialSize::new().inline(320));
        let resolved = merge_size_maps(&base, &SlotSizeMap::new(), &NoTokens);
        let narrowed = SlotSizeMap::new().with(Breakpoint::Md, PartialSize::new().block("4rem"));
        let layered = merge_size_maps(&resolved.to_size_map(), &narrowed, &NoTokens);
        let md = layered.get(Breakpoint::Md).unwrap();
        assert_eq!(md.inline, "320px");
        assert_eq!(md.block, "4rem");
        assert_eq!(md.max_block, "none");
    }

    #[test]
    fn serializes_with_breakpoint_keys() {
        let map = SlotSizeMap::new().with(Breakpoint::Md, PartialSize::new().inline(320));
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json, serde_json::json!({"md": {"inline": 320.0}}));
    }
}
