use crate::breakpoints::Breakpoint;
use crate::size::{PartialSize, SlotSizeMap};

use super::{DesignRef, SlotDefinition, SlotMeta, SlotRegistry, VariantMeta};

fn design(component: &str, node: &str) -> Option<DesignRef> {
    Some(DesignRef {
        figma_component: Some(component.to_string()),
        figma_node_id: Some(node.to_string()),
        figma_url: None,
    })
}

fn variants(entries: &[(&str, &str)]) -> std::collections::BTreeMap<String, VariantMeta> {
    entries
        .iter()
        .map(|(name, label)| (name.to_string(), VariantMeta::labelled(*label)))
        .collect()
}

fn size(inline: &str, block: &str) -> PartialSize {
    PartialSize::new().inline(inline).block(block)
}

/// Presets every runtime starts from; caller registries merge over these.
pub fn base_registry() -> SlotRegistry {
    SlotRegistry::new()
        .with(
            "catalog.card",
            SlotDefinition::new(
                SlotSizeMap::new()
                    .with(Breakpoint::Xs, size("min(100%, 20rem)", "24rem"))
                    .with(Breakpoint::Sm, size("20rem", "24rem"))
                    .with(Breakpoint::Md, size("22rem", "26rem"))
                    .with(Breakpoint::Lg, size("24rem", "26rem")),
            )
            .with_meta(SlotMeta {
                label: Some("Catalog Card".into()),
                description: Some(
                    "Product tile used in merchandising grids and featured carousels.".into(),
                ),
                design: design("Catalog / Card", "0:1"),
                variants: variants(&[("default", "Default"), ("compact", "Compact")]),
                tags: vec!["commerce".into(), "grid".into()],
                default_variant: Some("default".into()),
            }),
        )
        .with(
            "dashboard.panel",
            SlotDefinition::new(
                SlotSizeMap::new()
                    .with(Breakpoint::Xs, size("min(100%, 100vw)", "18rem"))
                    .with(Breakpoint::Md, size("32rem", "20rem"))
                    .with(Breakpoint::Lg, size("36rem", "22rem")),
            )
            .with_meta(SlotMeta {
                label: Some("Dashboard Panel".into()),
                description: Some(
                    "Analytics cards and control panels across tenant dashboards.".into(),
                ),
                design: design("Dashboard / Panel", "0:2"),
                variants: variants(&[("default", "Default"), ("tall", "Tall")]),
                tags: Vec::new(),
                default_variant: Some("default".into()),
            }),
        )
        .with(
            "hero.banner",
            SlotDefinition::new(
                SlotSizeMap::new()
                    .with(Breakpoint::Xs, size("100%", "28rem"))
                    .with(Breakpoint::Md, size("100%", "32rem"))
                    .with(Breakpoint::Xl, size("100%", "36rem")),
            )
            .with_meta(SlotMeta {
                label: Some("Hero Banner".into()),
                description: Some(
                    "Full width marquee used on landing pages and marketing campaigns.".into(),
                ),
                design: design("Marketing / Hero Banner", "0:3"),
                default_variant: Some("default".into()),
                ..SlotMeta::default()
            }),
        )
        .with(
            "list.row",
            SlotDefinition::new(
                SlotSizeMap::new()
                    .with(Breakpoint::Xs, size("100%", "auto"))
                    .with(Breakpoint::Md, size("100%", "5rem")),
            )
            .with_meta(SlotMeta {
                label: Some("List Row".into()),
                description: Some(
                    "Row container for list-based layouts and checkout summaries.".into(),
                ),
                design: design("Commerce / List Row", "0:4"),
                default_variant: Some("default".into()),
                ..SlotMeta::default()
            }),
        )
}
