use std::collections::BTreeMap;
use std::fmt::{self, Write};

use crate::size::Dimension;
use crate::slot::ResolvedSlot;

/// Editing state surfaced as data attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditingFlags {
    pub editable: bool,
    pub dirty: bool,
    pub saving: bool,
}

/// Renderer parameters.
#[derive(Debug, Clone)]
pub struct RendererSettings {
    /// `overflow` declaration for fixed-size slots.
    pub overflow: String,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            overflow: "hidden auto".to_string(),
        }
    }
}

/// Custom properties, box declarations and data attributes for one slot element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotMarkup {
    pub css_variables: Vec<(String, String)>,
    pub style: Vec<(String, String)>,
    pub data: BTreeMap<String, String>,
}

impl SlotMarkup {
    pub fn variable(&self, name: &str) -> Option<&str> {
        lookup(&self.css_variables, name)
    }

    pub fn declaration(&self, property: &str) -> Option<&str> {
        lookup(&self.style, property)
    }

    pub fn data_attribute(&self, name: &str) -> Option<&str> {
        self.data.get(name).map(String::as_str)
    }

    /// Variables first, then declarations, as one inline `style` value.
    pub fn write_style(&self, writer: &mut impl Write) -> fmt::Result {
        let mut first = true;
        for (property, value) in self.css_variables.iter().chain(&self.style) {
            if !first {
                writer.write_char(' ')?;
            }
            write!(writer, "{property}: {value};")?;
            first = false;
        }
        Ok(())
    }

    pub fn style_attribute(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_style(&mut out);
        out
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

pub fn css_variable_name(dimension: Dimension) -> String {
    format!("--slot-{}", dimension.css_name())
}

/// Turns resolved slots into element markup.
pub struct SlotRenderer {
    settings: RendererSettings,
}

impl SlotRenderer {
    pub fn new(settings: RendererSettings) -> Self {
        Self { settings }
    }

    pub fn with_default() -> Self {
        Self::new(RendererSettings::default())
    }

    pub fn settings_mut(&mut self) -> &mut RendererSettings {
        &mut self.settings
    }

    pub fn render(&self, slot: &ResolvedSlot, editing: EditingFlags) -> SlotMarkup {
        SlotMarkup {
            css_variables: self.variables(slot),
            style: self.box_style(slot),
            data: data_attributes(slot, editing),
        }
    }

    fn variables(&self, slot: &ResolvedSlot) -> Vec<(String, String)> {
        if slot.is_content_sized() {
            return Vec::new();
        }
        Dimension::ALL
            .into_iter()
            .map(|d| (css_variable_name(d), slot.size.get(d).to_string()))
            .collect()
    }

    fn box_style(&self, slot: &ResolvedSlot) -> Vec<(String, String)> {
        if slot.is_content_sized() {
            return vec![("display".into(), "contents".into())];
        }
        let mut style: Vec<(String, String)> = Dimension::ALL
            .into_iter()
            .map(|d| (d.css_name().to_string(), format!("var({})", css_variable_name(d))))
            .collect();
        style.extend(
            [
                ("contain", "layout paint style"),
                ("display", "grid"),
                ("place-items", "stretch"),
                ("overflow", self.settings.overflow.as_str()),
                ("position", "relative"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        style
    }
}

impl Default for SlotRenderer {
    fn default() -> Self {
        Self::with_default()
    }
}

fn data_attributes(slot: &ResolvedSlot, editing: EditingFlags) -> BTreeMap<String, String> {
    let mut data = BTreeMap::new();
    let mut set = |name: &str, value: &str| {
        data.insert(name.to_string(), value.to_string());
    };

    set("data-slot-key", &slot.slot_key);
    set("data-slot-variant", &slot.variant);
    set("data-slot-default-variant", &slot.default_variant);

    let meta = &slot.meta;
    if let Some(label) = &meta.label {
        set("data-slot-label", label);
    }
    if let Some(description) = &meta.description {
        set("data-slot-description", description);
    }
    if let Some(design) = &meta.design {
        if let Some(component) = &design.figma_component {
            set("data-design-component", component);
        }
        if let Some(node) = &design.figma_node_id {
            set("data-design-node", node);
        }
        if let Some(url) = &design.figma_url {
            set("data-design-url", url);
        }
    }
    if !meta.tags.is_empty() {
        set("data-slot-tags", &meta.tags.join(","));
    }
    if let Some(id) = &slot.editable_id {
        set("data-slot-editable-id", id);
    }
    if editing.editable {
        set("data-slot-editable", "true");
        if editing.dirty {
            set("data-slot-dirty", "true");
        }
        if editing.saving {
            set("data-slot-status", "saving");
        }
    }
    if let Some(label) = slot.variant_label() {
        set("data-slot-variant-label", label);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breakpoints::Breakpoint;
    use crate::registry::base_registry;
    use crate::size::SizeResolver;
    use crate::slot::{ResolveEnv, SlotInstance};
    use crate::tokens::NoTokens;

    fn resolve(instance: SlotInstance) -> ResolvedSlot {
        let registry = base_registry();
        let env = ResolveEnv {
            registry: &registry,
            active: Breakpoint::Md,
            resolver: SizeResolver::default(),
            tokens: &NoTokens,
            logger: None,
            diagnostics: false,
        };
        instance.resolve(&env, None, None)
    }

    #[test]
    fn fixed_slots_publish_size_variables() {
        let markup = SlotRenderer::with_default()
            .render(&resolve(SlotInstance::new("catalog.card")), EditingFlags::default());
        assert_eq!(markup.variable("--slot-inline-size"), Some("22rem"));
        assert_eq!(markup.variable("--slot-max-block-size"), Some("none"));
        assert_eq!(
            markup.declaration("inline-size"),
            Some("var(--slot-inline-size)")
        );
        assert_eq!(markup.declaration("overflow"), Some("hidden auto"));
        assert!(
            markup
                .style_attribute()
                .starts_with("--slot-inline-size: 22rem; --slot-block-size: 26rem;")
        );
    }

    #[test]
    fn content_sized_slots_collapse_to_display_contents() {
        let markup = SlotRenderer::with_default().render(
            &resolve(SlotInstance::new("catalog.card").content_sized()),
            EditingFlags::default(),
        );
        assert!(markup.css_variables.is_empty());
        assert_eq!(markup.style_attribute(), "display: contents;");
    }

    #[test]
    fn data_attributes_describe_meta_and_editing() {
        let slot = resolve(
            SlotInstance::new("catalog.card")
                .variant("compact")
                .editable("card-1"),
        );
        let flags = EditingFlags {
            editable: true,
            dirty: true,
            saving: false,
        };
        let markup = SlotRenderer::with_default().render(&slot, flags);
        assert_eq!(markup.data_attribute("data-slot-label"), Some("Catalog Card"));
        assert_eq!(markup.data_attribute("data-design-node"), Some("0:1"));
        assert_eq!(markup.data_attribute("data-slot-tags"), Some("commerce,grid"));
        assert_eq!(markup.data_attribute("data-slot-variant-label"), Some("Compact"));
        assert_eq!(markup.data_attribute("data-slot-editable-id"), Some("card-1"));
        assert_eq!(markup.data_attribute("data-slot-dirty"), Some("true"));
        assert_eq!(markup.data_attribute("data-slot-status"), None);
    }
}
