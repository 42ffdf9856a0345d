use std::sync::Arc;

use serde_json::Value;

use crate::registry::SlotMeta;
use crate::size::ResolvedSizeMap;

/// What a resolved slot exposes to the slots nested inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotFrame {
    pub slot_key: String,
    pub sizes: ResolvedSizeMap,
    pub meta: SlotMeta,
    pub variant: String,
    pub editable_id: Option<String>,
    pub props: Option<Value>,
}

/// Stack of enclosing slot frames, innermost last.
///
/// Frames are pushed for the duration of a closure, so every push has a
/// matching pop even when the closure returns early.
#[derive(Debug, Clone, Default)]
pub struct SlotContext {
    frames: Vec<Arc<SlotFrame>>,
}

impl SlotContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nearest enclosing slot, if any.
    pub fn parent(&self) -> Option<&SlotFrame> {
        self.frames.last().map(Arc::as_ref)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> impl Iterator<Item = &SlotFrame> {
        self.frames.iter().map(Arc::as_ref)
    }

    pub fn scoped<R>(&mut self, frame: SlotFrame, body: impl FnOnce(&mut SlotContext) -> R) -> R {
        self.frames.push(Arc::new(frame));
        let result = body(self);
        self.frames.pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(key: &str) -> SlotFrame {
        SlotFrame {
            slot_key: key.to_string(),
            sizes: ResolvedSizeMap::default(),
            meta: SlotMeta::default(),
            variant: "default".into(),
            editable_id: None,
            props: None,
        }
    }

    #[test]
    fn frames_pop_when_the_scope_ends() {
        let mut ctx = SlotContext::new();
        let seen = ctx.scoped(frame("outer"), |ctx| {
            let inner = ctx.scoped(frame("inner"), |ctx| {
                ctx.parent().map(|f| f.slot_key.clone())
            });
            (inner, ctx.parent().map(|f| f.slot_key.clone()), ctx.depth())
        });
        assert_eq!(
            seen,
            (Some("inner".to_string()), Some("outer".to_string()), 1)
        );
        assert!(ctx.parent().is_none());
    }
}
