//! Authoring surface: edit mode, local drafts, and publishing.

mod draft;
mod mode;
mod publish;
mod session;
mod storage;

pub use draft::{
    DRAFT_VERSION, EditableDraft, Fingerprint, normalize_draft, stable_stringify, timestamp_now,
};
pub use mode::{
    DEFAULT_STATE_STORAGE_KEY, EditModeConfig, EditModeController, EditModeState, FocusTarget,
    Shortcut,
};
pub use publish::{
    GraphqlPublisher, GraphqlPublisherConfig, SlotPublisher, UPSERT_SLOT_INSTANCE_MUTATION,
    UpsertRequest, UpsertResponse, parse_upsert_response, upsert_request_body,
};
pub use session::{
    EditingContext, OVERFLOW_HISTORY, SessionStatus, SlotDraftSession, SlotEditingProps,
};
pub use storage::{
    DRAFT_KEY_PREFIX, DRAFT_KEY_VERSION, DraftStore, KeyValueStore, MemoryStore, SharedStore,
    StoreCallback, SubscriptionId, committed_key, draft_key,
};
