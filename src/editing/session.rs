use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;

use crate::breakpoints::Breakpoint;
use crate::error::{PublishBlocked, PublishError, Result, SlotError};
use crate::logging::{LogLevel, Logger, TARGET_EDITING, emit_to, json_str};
use crate::metrics::{SharedMetrics, SlotMetrics, record_with};
use crate::overflow::OverflowEvent;
use crate::render::EditingFlags;
use crate::size::{Dimension, SizeValue, SlotSizeMap};
use crate::slot::{SlotInstance, SlotOverrides};

use super::{
    DraftStore, EditModeController, EditableDraft, Fingerprint, SlotPublisher, UpsertRequest,
    UpsertResponse, normalize_draft, timestamp_now,
};

/// Most recent overflow events kept per session.
pub const OVERFLOW_HISTORY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Saving,
    Error,
}

impl SessionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Saving => "saving",
            SessionStatus::Error => "error",
        }
    }
}

/// The inputs a session derives its base state from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotEditingProps {
    pub editable_id: Option<String>,
    pub slot_key: String,
    pub default_variant: Option<String>,
    pub variant: Option<String>,
    pub size_overrides: Option<SlotSizeMap>,
    pub props_json: Option<Value>,
}

impl SlotEditingProps {
    pub fn from_instance(instance: &SlotInstance, default_variant: impl Into<String>) -> Self {
        Self {
            editable_id: instance.editable_id().map(str::to_string),
            slot_key: instance.slot_key().to_string(),
            default_variant: Some(default_variant.into()),
            variant: instance.variant_prop().map(str::to_string),
            size_overrides: instance.size_overrides().cloned(),
            props_json: instance.props_json().cloned(),
        }
    }

    fn editable_id(&self) -> Option<&str> {
        self.editable_id.as_deref().filter(|id| !id.is_empty())
    }

    /// `None` for slots without an editable id.
    pub fn base_state(&self) -> Option<EditableDraft> {
        let editable_id = self.editable_id()?;
        let draft = EditableDraft {
            editable_id: Some(editable_id.to_string()),
            slot_key: Some(self.slot_key.clone()),
            variant: self.variant.clone().or_else(|| self.default_variant.clone()),
            sizes: self.size_overrides.clone(),
            props_json: self.props_json.clone(),
            ..EditableDraft::default()
        };
        Some(draft.sanitized())
    }
}

/// Collaborators every session of one runtime shares.
#[derive(Clone)]
pub struct EditingContext {
    pub controller: EditModeController,
    pub drafts: DraftStore,
    pub publisher: Option<Arc<dyn SlotPublisher>>,
    pub logger: Option<Logger>,
    pub metrics: Option<SharedMetrics>,
}

impl EditingContext {
    pub fn new(controller: EditModeController, drafts: DraftStore) -> Self {
        Self {
            controller,
            drafts,
            publisher: None,
            logger: None,
            metrics: None,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn SlotPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }
}

struct SessionInner {
    props: SlotEditingProps,
    base: Option<EditableDraft>,
    /// Last committed state; mutations normalize against it.
    initial: Option<EditableDraft>,
    initial_fingerprint: Option<Fingerprint>,
    draft: Option<EditableDraft>,
    status: SessionStatus,
    error: Option<PublishError>,
    validation_error: Option<String>,
    overflow: VecDeque<OverflowEvent>,
    mounted: bool,
}

impl SessionInner {
    fn editable_id(&self) -> Option<&str> {
        self.props.editable_id()
    }

    fn is_dirty(&self) -> bool {
        match (&self.draft, &self.initial_fingerprint) {
            (Some(draft), Some(initial)) => draft.fingerprint() != *initial,
            _ => false,
        }
    }

    /// Recompute base state from props and any local commit, then re-read
    /// the stored draft.
    fn rebase(&mut self, drafts: &DraftStore) {
        let id = self.props.editable_id().map(str::to_string);
        self.base = match (self.props.base_state(), id.as_deref()) {
            (Some(base), Some(id)) => Some(match drafts.read_committed(id) {
                Some(committed) => normalize_draft(&base, &committed).sanitized(),
                None => base,
            }),
            _ => None,
        };
        match (&self.base, id.as_deref()) {
            (Some(base), Some(id)) => {
                let stored = drafts.read(id).unwrap_or_default();
                self.initial = Some(base.clone());
                self.initial_fingerprint = Some(base.fingerprint());
                self.draft = Some(normalize_draft(base, &stored));
            }
            _ => {
                self.initial = None;
                self.initial_fingerprint = None;
                self.draft = None;
                self.overflow.clear();
            }
        }
    }
}

/// Editing lifecycle of one editable slot: hydrate, mutate, publish or discard.
///
/// Clones share the same session. Slots without an editable id get a session
/// whose mutators do nothing and whose getters pass the props through.
#[derive(Clone)]
pub struct SlotDraftSession {
    ctx: EditingContext,
    inner: Arc<Mutex<SessionInner>>,
}

impl SlotDraftSession {
    pub fn mount(ctx: EditingContext, props: SlotEditingProps) -> Self {
        let mut inner = SessionInner {
            props,
            base: None,
            initial: None,
            initial_fingerprint: None,
            draft: None,
            status: SessionStatus::Idle,
            error: None,
            validation_error: None,
            overflow: VecDeque::with_capacity(OVERFLOW_HISTORY),
            mounted: true,
        };
        inner.rebase(&ctx.drafts);
        Self {
            ctx,
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log(&self, level: LogLevel, message: &str, editable_id: &str, extra: Option<(&str, String)>) {
        let mut fields = vec![json_str("editable_id", editable_id)];
        if let Some((key, value)) = extra {
            fields.push(json_str(key, value));
        }
        emit_to(self.ctx.logger.as_ref(), level, TARGET_EDITING, message, fields);
    }

    /// Feed new props. Any change re-derives the base state and resets the
    /// dirtiness baseline; a new editable id also drops status, errors and
    /// overflow history from the previous target.
    pub fn set_props(&self, props: SlotEditingProps) {
        let mut inner = self.lock();
        if inner.props == props {
            return;
        }
        let retargeted = inner.props.editable_id() != props.editable_id();
        inner.props = props;
        if retargeted {
            inner.status = SessionStatus::Idle;
            inner.error = None;
            inner.validation_error = None;
            inner.overflow.clear();
        }
        inner.rebase(&self.ctx.drafts);
    }

    /// Later publish completions are ignored once unmounted.
    pub fn unmount(&self) {
        self.lock().mounted = false;
    }

    pub fn is_mounted(&self) -> bool {
        self.lock().mounted
    }

    pub fn is_editable(&self) -> bool {
        self.lock().editable_id().is_some()
    }

    pub fn editable_id(&self) -> Option<String> {
        self.lock().editable_id().map(str::to_string)
    }

    pub fn is_editing_enabled(&self) -> bool {
        self.ctx.controller.is_editing()
    }

    pub fn is_active(&self) -> bool {
        self.editable_id()
            .is_some_and(|id| self.ctx.controller.is_active(&id))
    }

    /// Editable, in edit mode, and either nothing or this slot is active.
    pub fn should_show_overlay(&self) -> bool {
        let Some(id) = self.editable_id() else {
            return false;
        };
        let state = self.ctx.controller.state();
        state.is_editing
            && state
                .active_editable_id
                .as_deref()
                .is_none_or(|active| active == id)
    }

    /// Make this slot the single active editable.
    pub fn set_active(&self) -> bool {
        match self.editable_id() {
            Some(id) => self.ctx.controller.set_active_editable_id(Some(&id)),
            None => false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().is_dirty()
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    pub fn error(&self) -> Option<PublishError> {
        self.lock().error.clone()
    }

    pub fn validation_error(&self) -> Option<String> {
        self.lock().validation_error.clone()
    }

    pub fn draft(&self) -> Option<EditableDraft> {
        self.lock().draft.clone()
    }

    pub fn base_state(&self) -> Option<EditableDraft> {
        self.lock().base.clone()
    }

    pub fn last_updated_at(&self) -> Option<String> {
        self.lock()
            .draft
            .as_ref()
            .and_then(|draft| draft.updated_at.clone())
    }

    /// Whether a draft is currently persisted for this slot.
    pub fn has_draft(&self) -> bool {
        self.editable_id()
            .is_some_and(|id| self.ctx.drafts.has(&id))
    }

    /// Size overrides from the draft; `None` for read-only slots.
    pub fn overrides(&self) -> Option<SlotSizeMap> {
        self.lock().draft.as_ref().and_then(|d| d.sizes.clone())
    }

    pub fn variant(&self) -> Option<String> {
        let inner = self.lock();
        inner
            .draft
            .as_ref()
            .and_then(|d| d.variant.clone())
            .or_else(|| inner.props.variant.clone())
            .or_else(|| inner.props.default_variant.clone())
    }

    pub fn props_json(&self) -> Option<Value> {
        let inner = self.lock();
        inner
            .draft
            .as_ref()
            .and_then(|d| d.props_json.clone())
            .or_else(|| inner.props.props_json.clone())
    }

    /// What this session layers over its slot instance during resolution.
    pub fn slot_overrides(&self) -> SlotOverrides {
        let inner = self.lock();
        match &inner.draft {
            Some(draft) => SlotOverrides {
                sizes: draft.sizes.clone(),
                variant: draft.variant.clone(),
                props: draft.props_json.clone(),
            },
            None => SlotOverrides::default(),
        }
    }

    pub fn editing_flags(&self) -> EditingFlags {
        let inner = self.lock();
        EditingFlags {
            editable: inner.editable_id().is_some(),
            dirty: inner.is_dirty(),
            saving: inner.status == SessionStatus::Saving,
        }
    }

    pub fn overflow_events(&self) -> Vec<OverflowEvent> {
        self.lock().overflow.iter().cloned().collect()
    }

    /// Keep the event for the editor; never affects dirtiness or publishing.
    pub fn record_overflow(&self, event: OverflowEvent) {
        let mut inner = self.lock();
        if inner.editable_id().is_none() {
            return;
        }
        inner.overflow.push_back(event);
        while inner.overflow.len() > OVERFLOW_HISTORY {
            inner.overflow.pop_front();
        }
    }

    fn update_draft(&self, field: &str, apply: impl FnOnce(&mut EditableDraft)) {
        let mut inner = self.lock();
        let Some(id) = inner.editable_id().map(str::to_string) else {
            return;
        };
        let (Some(initial), Some(current)) = (inner.initial.as_ref(), inner.draft.as_ref()) else {
            return;
        };
        let mut candidate = current.clone();
        apply(&mut candidate);
        let mut next = normalize_draft(initial, &candidate);
        next.updated_at = Some(timestamp_now());

        self.ctx.drafts.write(&id, &next);
        inner.draft = Some(next);
        drop(inner);
        self.log(LogLevel::Debug, "draft_updated", &id, Some(("field", field.to_string())));
    }

    /// Set or clear (`None` or blank) one dimension at one breakpoint.
    pub fn update_size(&self, breakpoint: Breakpoint, dimension: Dimension, value: Option<SizeValue>) {
        self.update_draft(dimension.as_str(), |draft| {
            let mut sizes = draft.sizes.take().unwrap_or_default();
            sizes.set_dimension(breakpoint, dimension, value);
            draft.sizes = (!sizes.is_empty()).then_some(sizes);
        });
    }

    pub fn clear_breakpoint(&self, breakpoint: Breakpoint) {
        self.update_draft(breakpoint.as_str(), |draft| {
            let mut sizes = draft.sizes.take().unwrap_or_default();
            sizes.remove(breakpoint);
            draft.sizes = (!sizes.is_empty()).then_some(sizes);
        });
    }

    /// `None` or blank falls back to the base variant.
    pub fn update_variant(&self, variant: Option<&str>) {
        let variant = variant.filter(|v| !v.is_empty()).map(str::to_string);
        self.update_draft("variant", |draft| draft.variant = variant);
    }

    /// Empty objects and arrays count as "no props override".
    pub fn update_props(&self, props: Option<Value>) {
        let props = props.filter(|value| match value {
            Value::Object(map) => !map.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => false,
        });
        self.update_draft("propsJSON", |draft| draft.props_json = props);
    }

    /// Props as typed into an editor. Malformed JSON is recorded as a
    /// validation error that blocks publishing but not further edits.
    pub fn update_props_text(&self, text: &str) -> Result<()> {
        let Some(id) = self.editable_id() else {
            return Ok(());
        };
        if text.trim().is_empty() {
            self.lock().validation_error = None;
            self.update_props(None);
            return Ok(());
        }
        match serde_json::from_str::<Value>(text) {
            Ok(value) => {
                self.lock().validation_error = None;
                self.update_props(Some(value));
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                self.lock().validation_error = Some(message.clone());
                self.log(LogLevel::Warn, "props_invalid", &id, Some(("error", message.clone())));
                Err(SlotError::InvalidProps(message))
            }
        }
    }

    fn blocker(&self, inner: &SessionInner) -> Option<PublishBlocked> {
        let Some(id) = inner.editable_id() else {
            return Some(PublishBlocked::NotEditable);
        };
        if inner.status == SessionStatus::Saving {
            Some(PublishBlocked::AlreadySaving)
        } else if !inner.is_dirty() {
            Some(PublishBlocked::NotDirty)
        } else if inner.validation_error.is_some() {
            Some(PublishBlocked::InvalidProps)
        } else if !self.ctx.controller.is_editing() || !self.ctx.controller.is_active(id) {
            Some(PublishBlocked::NotActive)
        } else {
            None
        }
    }

    /// Why publishing is currently refused, if it is.
    pub fn publish_blocker(&self) -> Option<PublishBlocked> {
        self.blocker(&self.lock())
    }

    pub fn can_publish(&self) -> bool {
        self.publish_blocker().is_none()
    }

    /// Commit the draft: upsert remotely when a publisher is configured,
    /// otherwise store it locally as the committed base. On failure the
    /// draft and its stored copy are left exactly as they were.
    ///
    /// Edits made while a remote upsert is in flight are not part of the
    /// request; a successful upsert replaces them with the published value
    /// and clears the stored draft.
    pub async fn publish(&self) -> std::result::Result<EditableDraft, PublishError> {
        let (editable_id, mut payload, request) = {
            let mut inner = self.lock();
            if let Some(reason) = self.blocker(&inner) {
                return Err(PublishError::Blocked(reason));
            }
            let (Some(id), Some(draft)) = (inner.editable_id(), inner.draft.as_ref()) else {
                return Err(PublishError::Blocked(PublishBlocked::NotEditable));
            };
            let payload = draft.sanitized();
            let request = match self.ctx.publisher {
                Some(_) => Some(
                    UpsertRequest::from_draft(&payload)
                        .ok_or(PublishError::Blocked(PublishBlocked::NotEditable))?,
                ),
                None => None,
            };
            let started = (id.to_string(), payload, request);
            inner.status = SessionStatus::Saving;
            inner.error = None;
            started
        };

        if let (Some(publisher), Some(request)) = (self.ctx.publisher.clone(), request) {
            match publisher.upsert(request).await {
                Ok(response) => adopt_canonical(&mut payload, response),
                Err(err) => {
                    self.fail_publish(&editable_id, &err);
                    return Err(err);
                }
            }
            self.ctx.drafts.clear(&editable_id);
            self.ctx.drafts.clear_committed(&editable_id);
        }

        let mut inner = self.lock();
        let current = inner.mounted && inner.editable_id() == Some(editable_id.as_str());
        let initial = inner.initial.clone().unwrap_or_default();
        let committed = normalize_draft(&initial, &payload);
        if self.ctx.publisher.is_none() {
            self.ctx.drafts.write_committed(&editable_id, &committed);
            self.ctx.drafts.clear(&editable_id);
        }
        if current {
            let baseline = committed.sanitized();
            if self.ctx.publisher.is_none() {
                inner.base = Some(baseline.clone());
            }
            inner.initial_fingerprint = Some(baseline.fingerprint());
            inner.initial = Some(baseline);
            inner.draft = Some(committed.clone());
            inner.status = SessionStatus::Idle;
        }
        drop(inner);

        record_with(self.ctx.metrics.as_ref(), |m| m.record_publish(true));
        self.log(LogLevel::Info, "draft_published", &editable_id, None);
        Ok(committed)
    }

    fn fail_publish(&self, editable_id: &str, err: &PublishError) {
        {
            let mut inner = self.lock();
            if inner.mounted && inner.editable_id() == Some(editable_id) {
                inner.status = SessionStatus::Error;
                inner.error = Some(err.clone());
            }
        }
        record_with(self.ctx.metrics.as_ref(), |m| m.record_publish(false));
        self.log(
            LogLevel::Warn,
            "draft_publish_failed",
            editable_id,
            Some(("error", err.to_string())),
        );
    }

    /// Drop local changes and return to the base state. Never touches the network.
    pub fn discard(&self) {
        let mut inner = self.lock();
        let (Some(id), Some(base)) = (inner.editable_id().map(str::to_string), inner.base.clone())
        else {
            return;
        };
        self.ctx.drafts.clear(&id);
        inner.initial_fingerprint = Some(base.fingerprint());
        inner.draft = Some(normalize_draft(&base, &base));
        inner.initial = Some(base);
        inner.status = SessionStatus::Idle;
        inner.error = None;
        inner.validation_error = None;
        inner.overflow.clear();
        drop(inner);

        record_with(self.ctx.metrics.as_ref(), SlotMetrics::record_discard);
        self.log(LogLevel::Info, "draft_discarded", &id, None);
    }
}

fn adopt_canonical(payload: &mut EditableDraft, response: UpsertResponse) {
    if response.updated_at.is_some() {
        payload.updated_at = response.updated_at;
    }
    if response.slot_key.is_some() {
        payload.slot_key = response.slot_key;
    }
    if response.variant.is_some() {
        payload.variant = response.variant;
    }
    if response.sizes.is_some() {
        payload.sizes = response.sizes;
    }
    if response.props_json.is_some() {
        payload.props_json = response.props_json;
    }
}
