use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SlotError;
use crate::tokens::{TOKEN_PREFIX, TokenResolver};

/// Raw size as authored: a CSS length string or a bare pixel count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeValue {
    Px(f64),
    Css(String),
}

impl SizeValue {
    /// Empty strings count as "not specified".
    pub fn is_blank(&self) -> bool {
        matches!(self, SizeValue::Css(s) if s.trim().is_empty())
    }

    /// Numbers become `<n>px`; strings pass through.
    pub fn to_css(&self) -> String {
        match self {
            SizeValue::Px(px) => format!("{px}px"),
            SizeValue::Css(css) => css.clone(),
        }
    }
}

impl From<&str> for SizeValue {
    fn from(value: &str) -> Self {
        SizeValue::Css(value.to_string())
    }
}

impl From<String> for SizeValue {
    fn from(value: String) -> Self {
        SizeValue::Css(value)
    }
}

impl From<f64> for SizeValue {
    fn from(value: f64) -> Self {
        SizeValue::Px(value)
    }
}

impl From<u32> for SizeValue {
    fn from(value: u32) -> Self {
        SizeValue::Px(f64::from(value))
    }
}

impl From<i32> for SizeValue {
    fn from(value: i32) -> Self {
        SizeValue::Px(f64::from(value))
    }
}

/// Normalize one authored value into its CSS string.
///
/// `token:<name>` goes through `tokens`, falling back to `var(--<name>)`;
/// `var(...)` is left alone; absent or blank values take `default`.
pub fn resolve_size_value(
    raw: Option<&SizeValue>,
    default: &str,
    tokens: &dyn TokenResolver,
) -> String {
    match raw {
        None => default.to_string(),
        Some(value) if value.is_blank() => default.to_string(),
        Some(SizeValue::Css(css)) => {
            if let Some(name) = css.strip_prefix(TOKEN_PREFIX) {
                match tokens.resolve(name) {
                    Some(resolved) if !resolved.is_blank() => resolved.to_css(),
                    _ => format!("var(--{name})"),
                }
            } else {
                css.clone()
            }
        }
        Some(px) => px.to_css(),
    }
}

/// One of the six box dimensions a slot can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Dimension {
    Inline,
    Block,
    MaxInline,
    MaxBlock,
    MinInline,
    MinBlock,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Inline,
        Dimension::Block,
        Dimension::MaxInline,
        Dimension::MaxBlock,
        Dimension::MinInline,
        Dimension::MinBlock,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Dimension::Inline => "inline",
            Dimension::Block => "block",
            Dimension::MaxInline => "maxInline",
            Dimension::MaxBlock => "maxBlock",
            Dimension::MinInline => "minInline",
            Dimension::MinBlock => "minBlock",
        }
    }

    /// Value used when nothing in the cascade specifies this dimension.
    pub const fn fallback(self) -> &'static str {
        match self {
            Dimension::MaxInline | Dimension::MaxBlock => "none",
            _ => "auto",
        }
    }

    /// Suffix of the CSS custom property, e.g. `max-inline-size`.
    pub const fn css_name(self) -> &'static str {
        match self {
            Dimension::Inline => "inline-size",
            Dimension::Block => "block-size",
            Dimension::MaxInline => "max-inline-size",
            Dimension::MaxBlock => "max-block-size",
            Dimension::MinInline => "min-inline-size",
            Dimension::MinBlock => "min-block-size",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| SlotError::UnknownDimension(s.to_string()))
    }
}

/// Sparse size entry for one breakpoint. Missing fields defer to whatever
/// sits underneath in the merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartialSize {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline: Option<SizeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<SizeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_inline: Option<SizeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_block: Option<SizeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_inline: Option<SizeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_block: Option<SizeValue>,
}

impl PartialSize {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inline(self, value: impl Into<SizeValue>) -> Self {
        self.with(Dimension::Inline, value)
    }

    pub fn block(self, value: impl Into<SizeValue>) -> Self {
        self.with(Dimension::Block, value)
    }

    pub fn with(mut self, dimension: Dimension, value: impl Into<SizeValue>) -> Self {
        self.set(dimension, Some(value.into()));
        self
    }

    pub fn get(&self, dimension: Dimension) -> Option<&SizeValue> {
        match dimension {
            Dimension::Inline => self.inline.as_ref(),
            Dimension::Block => self.block.as_ref(),
            Dimension::MaxInline => self.max_inline.as_ref(),
            Dimension::MaxBlock => self.max_block.as_ref(),
            Dimension::MinInline => self.min_inline.as_ref(),
            Dimension::MinBlock => self.min_block.as_ref(),
        }
    }

    fn slot_mut(&mut self, dimension: Dimension) -> &mut Option<SizeValue> {
        match dimension {
            Dimension::Inline => &mut self.inline,
            Dimension::Block => &mut self.block,
            Dimension::MaxInline => &mut self.max_inline,
            Dimension::MaxBlock => &mut self.max_block,
            Dimension::MinInline => &mut self.min_inline,
            Dimension::MinBlock => &mut self.min_block,
        }
    }

    pub fn set(&mut self, dimension: Dimension, value: Option<SizeValue>) {
        *self.slot_mut(dimension) = value;
    }

    /// Field-wise overlay: fields present in `overrides` win, absent ones keep ours.
    pub fn overlay(&self, overrides: &PartialSize) -> PartialSize {
        let mut merged = self.clone();
        for dimension in Dimension::ALL {
            if let Some(value) = overrides.get(dimension) {
                merged.set(dimension, Some(value.clone()));
            }
        }
        merged
    }

    /// Drop blank values.
    pub fn sanitized(&self) -> PartialSize {
        let mut clean = PartialSize::new();
        for dimension in Dimension::ALL {
            if let Some(value) = self.get(dimension).filter(|v| !v.is_blank()) {
                clean.set(dimension, Some(value.clone()));
            }
        }
        clean
    }

    pub fn is_empty(&self) -> bool {
        Dimension::ALL.iter().all(|d| self.get(*d).is_none())
    }

    pub fn normalize(&self, tokens: &dyn TokenResolver) -> SizeDescriptor {
        let field = |d: Dimension| resolve_size_value(self.get(d), d.fallback(), tokens);
        SizeDescriptor {
            inline: field(Dimension::Inline),
            block: field(Dimension::Block),
            max_inline: field(Dimension::MaxInline),
            max_block: field(Dimension::MaxBlock),
            min_inline: field(Dimension::MinInline),
            min_block: field(Dimension::MinBlock),
        }
    }
}

/// Fully resolved footprint for one render. Every field is a CSS string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeDescriptor {
    pub inline: String,
    pub block: String,
    pub max_inline: String,
    pub max_block: String,
    pub min_inline: String,
    pub min_block: String,
}

impl SizeDescriptor {
    /// `auto` everywhere except `none` for the maximums.
    pub fn fallback() -> Self {
        Self {
            inline: Dimension::Inline.fallback().to_string(),
            block: Dimension::Block.fallback().to_string(),
            max_inline: Dimension::MaxInline.fallback().to_string(),
            max_block: Dimension::MaxBlock.fallback().to_string(),
            min_inline: Dimension::MinInline.fallback().to_string(),
            min_block: Dimension::MinBlock.fallback().to_string(),
        }
    }

    /// Every field present, as already-normalized CSS strings.
    pub fn to_partial(&self) -> PartialSize {
        Dimension::ALL
            .into_iter()
            .fold(PartialSize::new(), |size, d| size.with(d, self.get(d)))
    }

    pub fn get(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Inline => &self.inline,
            Dimension::Block => &self.block,
            Dimension::MaxInline => &self.max_inline,
            Dimension::MaxBlock => &self.max_block,
            Dimension::MinInline => &self.min_inline,
            Dimension::MinBlock => &self.min_block,
        }
    }
}

impl Default for SizeDescriptor {
    fn default() -> Self {
        Self::fallback()
    }
}
