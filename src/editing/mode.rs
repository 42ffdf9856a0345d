use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use serde::Serialize;
use serde_json::Value;

use crate::logging::{LogLevel, Logger, TARGET_EDITING, emit_to, json_kv, json_str};

use super::SharedStore;

pub const DEFAULT_STATE_STORAGE_KEY: &str = "gg:edit-mode:v1";

/// Process-wide editing state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditModeState {
    pub is_editing: bool,
    pub active_editable_id: Option<String>,
}

/// Key chord that toggles edit mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    pub key: String,
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl Default for Shortcut {
    fn default() -> Self {
        Self {
            key: "e".to_string(),
            alt: true,
            ctrl: false,
            meta: false,
            shift: true,
        }
    }
}

impl Shortcut {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            alt: false,
            ctrl: false,
            meta: false,
            shift: false,
        }
    }

    pub fn matches(&self, event: &KeyEvent) -> bool {
        if event.kind == KeyEventKind::Release || self.key.is_empty() {
            return false;
        }
        let pressed = match event.code {
            KeyCode::Char(c) => c.to_lowercase().collect::<String>(),
            KeyCode::F(n) => format!("f{n}"),
            KeyCode::Enter => "enter".to_string(),
            KeyCode::Esc => "escape".to_string(),
            KeyCode::Tab => "tab".to_string(),
            _ => return false,
        };
        let mods = event.modifiers;
        pressed == self.key.to_lowercase()
            && mods.contains(KeyModifiers::ALT) == self.alt
            && mods.contains(KeyModifiers::CONTROL) == self.ctrl
            && mods.contains(KeyModifiers::SUPER) == self.meta
            && mods.contains(KeyModifiers::SHIFT) == self.shift
    }

    /// Human-readable chord, e.g. `Alt + Shift + E`.
    pub fn label(&self) -> Option<String> {
        if self.key.is_empty() {
            return None;
        }
        let mut parts: Vec<String> = [
            (self.ctrl, "Ctrl"),
            (self.meta, "Meta"),
            (self.alt, "Alt"),
            (self.shift, "Shift"),
        ]
        .into_iter()
        .filter(|(held, _)| *held)
        .map(|(_, name)| name.to_string())
        .collect();
        parts.push(if self.key.chars().count() == 1 {
            self.key.to_uppercase()
        } else {
            self.key.clone()
        });
        Some(parts.join(" + "))
    }
}

/// Where keyboard focus currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTarget {
    None,
    TextInput,
    ContentEditable,
    Other,
}

impl FocusTarget {
    /// Classify an element by tag name.
    pub fn from_element(tag: &str, content_editable: bool) -> Self {
        if content_editable {
            return FocusTarget::ContentEditable;
        }
        match tag.to_ascii_lowercase().as_str() {
            "input" | "textarea" | "select" => FocusTarget::TextInput,
            "" => FocusTarget::None,
            _ => FocusTarget::Other,
        }
    }

    pub fn accepts_typing(self) -> bool {
        matches!(self, FocusTarget::TextInput | FocusTarget::ContentEditable)
    }
}

#[derive(Debug, Clone)]
pub struct EditModeConfig {
    pub initial_mode: bool,
    pub persist_state: bool,
    /// Blank keys fall back to [`DEFAULT_STATE_STORAGE_KEY`].
    pub state_storage_key: String,
    pub enable_keyboard_shortcut: bool,
    pub shortcut: Shortcut,
    pub shortcut_hint: Option<String>,
}

impl Default for EditModeConfig {
    fn default() -> Self {
        Self {
            initial_mode: false,
            persist_state: false,
            state_storage_key: DEFAULT_STATE_STORAGE_KEY.to_string(),
            enable_keyboard_shortcut: true,
            shortcut: Shortcut::default(),
            shortcut_hint: None,
        }
    }
}

impl EditModeConfig {
    pub fn storage_key(&self) -> &str {
        match self.state_storage_key.trim() {
            "" => DEFAULT_STATE_STORAGE_KEY,
            key => key,
        }
    }
}

struct ControllerInner {
    state: RwLock<EditModeState>,
    config: EditModeConfig,
    store: Option<SharedStore>,
    logger: Option<Logger>,
}

/// Owns [`EditModeState`]; at most one editable id is active at a time.
///
/// Clones share state, so one controller can be handed to every session.
#[derive(Clone)]
pub struct EditModeController {
    inner: Arc<ControllerInner>,
}

impl EditModeController {
    pub fn new(config: EditModeConfig) -> Self {
        Self::with_store(config, None, None)
    }

    /// With persistence enabled, initial state is read from `store` when present.
    pub fn with_store(
        config: EditModeConfig,
        store: Option<SharedStore>,
        logger: Option<Logger>,
    ) -> Self {
        let mut state = EditModeState {
            is_editing: config.initial_mode,
            active_editable_id: None,
        };
        let inner = ControllerInner {
            state: RwLock::new(EditModeState::default()),
            config,
            store,
            logger,
        };
        if let Some(stored) = inner.read_stored() {
            if let Some(is_editing) = stored.0 {
                state.is_editing = is_editing;
            }
            state.active_editable_id = stored.1;
        }
        *inner.write() = state;
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &EditModeConfig {
        &self.inner.config
    }

    pub fn state(&self) -> EditModeState {
        self.inner.read().clone()
    }

    pub fn is_editing(&self) -> bool {
        self.inner.read().is_editing
    }

    pub fn active_editable_id(&self) -> Option<String> {
        self.inner.read().active_editable_id.clone()
    }

    pub fn is_active(&self, editable_id: &str) -> bool {
        self.inner.read().active_editable_id.as_deref() == Some(editable_id)
    }

    /// Flip between viewing and editing. Both directions clear the active id.
    pub fn toggle_edit_mode(&self) {
        self.inner.transition(|state| {
            state.is_editing = !state.is_editing;
            state.active_editable_id = None;
        });
    }

    pub fn enter_edit_mode(&self) {
        if !self.is_editing() {
            self.toggle_edit_mode();
        }
    }

    pub fn exit_edit_mode(&self) {
        if self.is_editing() {
            self.toggle_edit_mode();
        }
    }

    /// Reassign the single active editable; `None` clears it without leaving
    /// edit mode. Ignored while viewing.
    pub fn set_active_editable_id(&self, editable_id: Option<&str>) -> bool {
        if !self.is_editing() {
            return false;
        }
        let next = editable_id.filter(|id| !id.trim().is_empty()).map(str::to_string);
        self.inner.transition(|state| state.active_editable_id = next);
        true
    }

    /// Toggle when `event` matches the shortcut and focus is not in a text
    /// field. Returns whether the event was consumed.
    pub fn handle_key(&self, event: &KeyEvent, focus: FocusTarget) -> bool {
        let config = &self.inner.config;
        if !config.enable_keyboard_shortcut
            || !config.shortcut.matches(event)
            || focus.accepts_typing()
        {
            return false;
        }
        self.toggle_edit_mode();
        true
    }

    /// Text for a toolbar hint; `None` when the shortcut is disabled.
    pub fn shortcut_label(&self) -> Option<String> {
        let config = &self.inner.config;
        if !config.enable_keyboard_shortcut {
            return None;
        }
        match config.shortcut_hint.as_deref().map(str::trim) {
            Some(hint) if !hint.is_empty() => Some(hint.to_string()),
            _ => config.shortcut.label(),
        }
    }
}

impl ControllerInner {
    fn read(&self) -> RwLockReadGuard<'_, EditModeState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EditModeState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn persistent_store(&self) -> Option<&SharedStore> {
        self.store.as_ref().filter(|_| self.config.persist_state)
    }

    fn transition(&self, apply: impl FnOnce(&mut EditModeState)) {
        let snapshot = {
            let mut state = self.write();
            let before = state.clone();
            apply(&mut state);
            if *state == before {
                return;
            }
            state.clone()
        };
        emit_to(
            self.logger.as_ref(),
            LogLevel::Debug,
            TARGET_EDITING,
            "edit_mode_changed",
            [
                json_kv("is_editing", snapshot.is_editing),
                json_kv("active_editable_id", snapshot.active_editable_id.clone()),
            ],
        );
        self.persist(&snapshot);
    }

    fn persist(&self, state: &EditModeState) {
        let Some(store) = self.persistent_store() else {
            return;
        };
        let payload = serde_json::json!({
            "version": 1,
            "isEditing": state.is_editing,
            "activeEditableId": state.active_editable_id,
        });
        if let Err(err) = store.set(self.config.storage_key(), &payload.to_string()) {
            emit_to(
                self.logger.as_ref(),
                LogLevel::Warn,
                TARGET_EDITING,
                "edit_mode_persist_failed",
                [json_str("error", err.to_string())],
            );
        }
    }

    /// `(isEditing, activeEditableId)` as stored; either part may be missing.
    fn read_stored(&self) -> Option<(Option<bool>, Option<String>)> {
        let store = self.persistent_store()?;
        let raw = store.get(self.config.storage_key()).ok()??;
        let value: Value = serde_json::from_str(&raw).ok()?;
        let object = value.as_object()?;
        let is_editing = object.get("isEditing").and_then(Value::as_bool);
        let active = object
            .get("activeEditableId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        Some((is_editing, active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::{KeyValueStore, MemoryStore};

    fn chord(c: char, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), modifiers)
    }

    #[test]
    fn toggling_into_editing_selects_nothing() {
        let controller = EditModeController::new(EditModeConfig::default());
        controller.toggle_edit_mode();
        assert!(controller.set_active_editable_id(Some("slot-1")));
        controller.toggle_edit_mode();
        controller.toggle_edit_mode();
        assert_eq!(
            controller.state(),
            EditModeState {
                is_editing: true,
                active_editable_id: None
            }
        );
    }

    #[test]
    fn only_one_editable_is_active() {
        let controller = EditModeController::new(EditModeConfig::default());
        controller.enter_edit_mode();
        controller.set_active_editable_id(Some("slot-1"));
        controller.set_active_editable_id(Some("slot-2"));
        assert!(controller.is_active("slot-2"));
        assert!(!controller.is_active("slot-1"));

        controller.set_active_editable_id(None);
        assert!(controller.is_editing());
        assert_eq!(controller.active_editable_id(), None);
    }

    #[test]
    fn activation_is_ignored_while_viewing() {
        let controller = EditModeController::new(EditModeConfig::default());
        assert!(!controller.set_active_editable_id(Some("slot-1")));
        assert_eq!(controller.active_editable_id(), None);
    }

    #[test]
    fn shortcut_is_suppressed_while_typing() {
        let controller = EditModeController::new(EditModeConfig::default());
        let event = chord('E', KeyModifiers::ALT | KeyModifiers::SHIFT);

        assert!(!controller.handle_key(&event, FocusTarget::TextInput));
        assert!(!controller.handle_key(&event, FocusTarget::from_element("div", true)));
        assert!(!controller.is_editing());

        assert!(controller.handle_key(&event, FocusTarget::from_element("button", false)));
        assert!(controller.is_editing());
        assert!(!controller.handle_key(&chord('e', KeyModifiers::ALT), FocusTarget::None));
    }

    #[test]
    fn shortcut_labels() {
        assert_eq!(Shortcut::default().label().as_deref(), Some("Alt + Shift + E"));
        let config = EditModeConfig {
            shortcut_hint: Some("  ".into()),
            shortcut: Shortcut {
                ctrl: true,
                ..Shortcut::key("F2")
            },
            ..EditModeConfig::default()
        };
        let controller = EditModeController::new(config);
        assert_eq!(controller.shortcut_label().as_deref(), Some("Ctrl + F2"));
    }

    #[test]
    fn persisted_state_survives_a_new_controller() {
        let store = MemoryStore::new();
        let config = EditModeConfig {
            persist_state: true,
            state_storage_key: "  ".into(),
            ..EditModeConfig::default()
        };
        let first =
            EditModeController::with_store(config.clone(), Some(Arc::new(store.clone())), None);
        first.enter_edit_mode();
        first.set_active_editable_id(Some("hero-1"));

        let stored: Value =
            serde_json::from_str(&store.peek(DEFAULT_STATE_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(stored["version"], 1);
        assert_eq!(stored["activeEditableId"], "hero-1");

        let second = EditModeController::with_store(config, Some(Arc::new(store)), None);
        assert!(second.is_editing());
        assert!(second.is_active("hero-1"));
    }

    #[test]
    fn missing_or_garbled_state_falls_back_to_defaults() {
        let store = MemoryStore::new();
        store.set(DEFAULT_STATE_STORAGE_KEY, "[]").unwrap();
        let config = EditModeConfig {
            persist_state: true,
            initial_mode: true,
            ..EditModeConfig::default()
        };
        let controller = EditModeController::with_store(config, Some(Arc::new(store)), None);
        assert!(controller.is_editing());
        assert_eq!(controller.active_editable_id(), None);
    }
}
