use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use room_slots::editing::{UpsertRequest, UpsertResponse, draft_key};
use room_slots::{
    Breakpoint, Dimension, EditModeConfig, FocusTarget, Logger, MediaQueryHub, MemorySink,
    MemoryStore, PartialSize, PublishBlocked, PublishError, SessionStatus, SizeValue, SlotConfig,
    SlotContext, SlotHost, SlotInstance, SlotPublisher, SlotRegistry, SlotRuntime, SlotSizeMap,
};

struct CountingPublisher {
    fail: bool,
    calls: AtomicUsize,
}

impl CountingPublisher {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SlotPublisher for CountingPublisher {
    async fn upsert(&self, request: UpsertRequest) -> Result<UpsertResponse, PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PublishError::Remote("slot instance is locked".into()));
        }
        Ok(UpsertResponse {
            editable_id: Some(request.editable_id),
            updated_at: Some("2031-06-01T08:00:00.000Z".into()),
            ..UpsertResponse::default()
        })
    }
}

struct Harness {
    runtime: SlotRuntime,
    store: MemoryStore,
    sink: MemorySink,
}

fn harness(width: f32, publisher: Option<Arc<dyn SlotPublisher>>) -> Harness {
    let store = MemoryStore::new();
    let sink = MemorySink::new();
    let mut config = SlotConfig {
        diagnostics: true,
        logger: Some(Logger::new(sink.clone())),
        ..SlotConfig::default()
    };
    config.enable_metrics();
    let host = SlotHost {
        media: MediaQueryHub::with_viewport_width(width),
        store: Arc::new(store.clone()),
        publisher,
        ..SlotHost::default()
    };
    Harness {
        runtime: SlotRuntime::new(&SlotRegistry::new(), host, config),
        store,
        sink,
    }
}

#[test]
fn card_budget_tracks_the_viewport() {
    let h = harness(800.0, None);
    let ctx = SlotContext::new();
    let card = SlotInstance::new("catalog.card");

    let md = h.runtime.resolve(&card, &ctx);
    assert_eq!(md.breakpoint, Breakpoint::Md);
    assert_eq!(md.size.get(Dimension::Inline), "22rem");
    assert_eq!(md.size.get(Dimension::Block), "26rem");
    assert_eq!(md.size.get(Dimension::MaxInline), "none");

    h.runtime.media().set_viewport_width(1100.0);
    let lg = h.runtime.resolve(&card, &ctx);
    assert_eq!(lg.size.get(Dimension::Inline), "24rem");

    // no xl entry, so the cascade scans down to lg
    h.runtime.media().set_viewport_width(1400.0);
    let xl = h.runtime.resolve(&card, &ctx);
    assert_eq!(xl.breakpoint, Breakpoint::Xl);
    assert_eq!(xl.size.get(Dimension::Inline), "24rem");

    let markup = h.runtime.render(&xl, None);
    assert_eq!(markup.variable("--slot-inline-size"), Some("24rem"));
    assert_eq!(markup.data_attribute("data-slot-key"), Some("catalog.card"));
}

#[test]
fn draft_edits_flow_into_resolution() {
    let h = harness(800.0, None);
    let ctx = SlotContext::new();
    let card = SlotInstance::new("catalog.card").editable("card-1");
    let session = h.runtime.session_for(&card, &ctx);

    session.update_size(Breakpoint::Md, Dimension::Inline, Some(SizeValue::Px(320.0)));
    session.update_variant(Some("compact"));

    let resolved = h.runtime.resolve_with(&card, &ctx, Some(&session));
    assert_eq!(resolved.size.get(Dimension::Inline), "320px");
    assert_eq!(resolved.size.get(Dimension::Block), "26rem");
    assert_eq!(resolved.variant, "compact");
    assert_eq!(resolved.variant_label(), Some("Compact"));

    let markup = h.runtime.render(&resolved, Some(&session));
    assert_eq!(markup.data_attribute("data-slot-dirty"), Some("true"));
    assert!(h.store.peek(&draft_key("card-1")).is_some());
}

#[test]
fn switching_editable_ids_rebases_without_leaking() {
    let h = harness(800.0, None);
    let ctx = SlotContext::new();
    let slot_a = SlotInstance::new("catalog.card").editable("slot-a");
    let slot_b = SlotInstance::new("catalog.card")
        .editable("slot-b")
        .sizes(SlotSizeMap::new().with(Breakpoint::Md, PartialSize::new().block("30rem")));

    let session = h.runtime.session_for(&slot_a, &ctx);
    session.update_variant(Some("compact"));
    assert!(session.is_dirty());

    h.runtime.sync_session(&session, &slot_b, &ctx);
    assert_eq!(session.editable_id().as_deref(), Some("slot-b"));
    assert!(!session.is_dirty());
    assert_eq!(session.variant().as_deref(), Some("default"));
    let resolved = h.runtime.resolve_with(&slot_b, &ctx, Some(&session));
    assert_eq!(resolved.size.get(Dimension::Block), "30rem");

    // slot-a's draft is still stored and comes back when re-targeted
    h.runtime.sync_session(&session, &slot_a, &ctx);
    assert_eq!(session.variant().as_deref(), Some("compact"));
}

#[test]
fn only_one_slot_is_active_at_a_time() {
    let h = harness(800.0, None);
    let ctx = SlotContext::new();
    let first = h
        .runtime
        .session_for(&SlotInstance::new("list.row").editable("slot-1"), &ctx);
    let second = h
        .runtime
        .session_for(&SlotInstance::new("list.row").editable("slot-2"), &ctx);

    assert!(!first.set_active(), "activation is ignored while viewing");
    h.runtime.controller().enter_edit_mode();
    assert!(first.should_show_overlay() && second.should_show_overlay());

    first.set_active();
    second.set_active();
    assert!(!first.is_active());
    assert!(second.is_active());
    assert!(!first.should_show_overlay());

    first.update_variant(Some("dense"));
    assert_eq!(
        first.publish_blocker(),
        Some(PublishBlocked::NotActive)
    );

    h.runtime.controller().exit_edit_mode();
    assert_eq!(h.runtime.controller().active_editable_id(), None);
}

#[tokio::test]
async fn failed_publish_keeps_the_draft_until_discarded() {
    let publisher = CountingPublisher::new(true);
    let h = harness(800.0, Some(publisher.clone()));
    let ctx = SlotContext::new();
    let hero = SlotInstance::new("hero.banner").editable("hero-1");
    let session = h.runtime.session_for(&hero, &ctx);

    h.runtime.controller().enter_edit_mode();
    session.set_active();
    session.update_size(Breakpoint::Lg, Dimension::Block, Some("40rem".into()));
    let stored_before = h.store.peek(&draft_key("hero-1")).unwrap();

    let outcome = session.publish().await;
    assert_eq!(
        outcome,
        Err(PublishError::Remote("slot instance is locked".into()))
    );
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.status(), SessionStatus::Error);
    assert!(session.error().is_some());
    assert!(session.is_dirty());
    assert_eq!(h.store.peek(&draft_key("hero-1")), Some(stored_before));
    assert_eq!(h.sink.count("draft_publish_failed"), 1);

    session.discard();
    assert!(h.store.peek(&draft_key("hero-1")).is_none());
    assert_eq!(session.status(), SessionStatus::Idle);
    assert_eq!(session.error(), None);
    assert!(!session.is_dirty());
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn successful_publish_resets_the_baseline() {
    let publisher = CountingPublisher::new(false);
    let h = harness(800.0, Some(publisher.clone()));
    let ctx = SlotContext::new();
    let panel = SlotInstance::new("dashboard.panel").editable("panel-1");
    let session = h.runtime.session_for(&panel, &ctx);

    h.runtime.controller().enter_edit_mode();
    session.set_active();
    session
        .update_props_text(r#"{"title": "Revenue"}"#)
        .unwrap();
    assert!(session.can_publish());

    let committed = session.publish().await.unwrap();
    assert_eq!(
        committed.updated_at.as_deref(),
        Some("2031-06-01T08:00:00.000Z")
    );
    assert!(!session.is_dirty());
    assert!(!session.has_draft());
    assert_eq!(
        session.publish().await,
        Err(PublishError::Blocked(PublishBlocked::NotDirty))
    );

    let metrics = h.runtime.metrics_handle().unwrap();
    assert_eq!(metrics.lock().unwrap().snapshot().publishes, 1);
}

#[test]
fn edit_mode_survives_a_reload_when_persisted() {
    let store = MemoryStore::new();
    let config = || SlotConfig {
        edit_mode: EditModeConfig {
            persist_state: true,
            ..EditModeConfig::default()
        },
        ..SlotConfig::default()
    };
    let host = || SlotHost {
        store: Arc::new(store.clone()),
        ..SlotHost::default()
    };

    let first = SlotRuntime::new(&SlotRegistry::new(), host(), config());
    let shortcut = KeyEvent::new(KeyCode::Char('E'), KeyModifiers::ALT | KeyModifiers::SHIFT);
    assert!(!first.controller().handle_key(&shortcut, FocusTarget::TextInput));
    assert!(first.controller().handle_key(&shortcut, FocusTarget::None));
    first.controller().set_active_editable_id(Some("hero-1"));
    drop(first);

    let reloaded = SlotRuntime::new(&SlotRegistry::new(), host(), config());
    assert!(reloaded.controller().is_editing());
    assert!(reloaded.controller().is_active("hero-1"));
}
