use std::collections::HashMap;

use crate::size::SizeValue;

/// Prefix marking a size value as a design-token reference.
pub const TOKEN_PREFIX: &str = "token:";

/// Resolves design-token names (the part after `token:`) to concrete sizes.
pub trait TokenResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<SizeValue>;
}

impl<F> TokenResolver for F
where
    F: Fn(&str) -> Option<SizeValue> + Send + Sync,
{
    fn resolve(&self, name: &str) -> Option<SizeValue> {
        self(name)
    }
}

/// Resolver that knows no tokens; every reference falls back to `var(--name)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTokens;

impl TokenResolver for NoTokens {
    fn resolve(&self, _name: &str) -> Option<SizeValue> {
        None
    }
}

/// Snapshot of token values, typically fed from the host's theme.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TokenTable {
    values: HashMap<String, SizeValue>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<SizeValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<SizeValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Layer `updates` over the current snapshot; later values win.
    pub fn extend(&mut self, updates: impl IntoIterator<Item = (String, SizeValue)>) {
        self.values.extend(updates);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl TokenResolver for TokenTable {
    fn resolve(&self, name: &str) -> Option<SizeValue> {
        self.values.get(name).cloned()
    }
}
