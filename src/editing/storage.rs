use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::error::StoreError;
use crate::logging::{LogLevel, Logger, TARGET_EDITING, emit_to, json_kv, json_str};
use crate::metrics::{SharedMetrics, SlotMetrics, record_with};

use super::{DRAFT_VERSION, EditableDraft};

pub const DRAFT_KEY_PREFIX: &str = "gg:slot:";
pub const DRAFT_KEY_VERSION: &str = "v1";

/// Namespaced storage key for an editable id's draft.
pub fn draft_key(editable_id: &str) -> String {
    format!("{DRAFT_KEY_PREFIX}{editable_id}:{DRAFT_KEY_VERSION}")
}

/// Key of the value last published locally for an editable id.
pub fn committed_key(editable_id: &str) -> String {
    format!("{DRAFT_KEY_PREFIX}{editable_id}:committed:{DRAFT_KEY_VERSION}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Receives the new value of a watched key, `None` once removed.
pub type StoreCallback = Arc<dyn Fn(Option<&str>) + Send + Sync>;

/// String key-value persistence, e.g. browser local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Watch `key` for sets and removes. Stores that cannot notify return `None`.
    fn subscribe(&self, _key: &str, _callback: StoreCallback) -> Option<SubscriptionId> {
        None
    }

    fn unsubscribe(&self, _id: SubscriptionId) -> bool {
        false
    }
}

pub type SharedStore = Arc<dyn KeyValueStore>;

#[derive(Default)]
struct MemoryState {
    values: BTreeMap<String, String>,
    next_id: u64,
    subscribers: BTreeMap<SubscriptionId, (String, StoreCallback)>,
    read_failure: Option<StoreError>,
    write_failure: Option<StoreError>,
}

/// In-process store with change subscriptions. Failures can be injected to
/// exercise degraded paths.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    pub fn fail_reads(&self, failure: Option<StoreError>) {
        self.state().read_failure = failure;
    }

    pub fn fail_writes(&self, failure: Option<StoreError>) {
        self.state().write_failure = failure;
    }

    /// Current value, ignoring injected failures.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.state().values.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.state().values.keys().cloned().collect()
    }

    fn write(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        let listeners: Vec<StoreCallback> = {
            let mut state = self.state();
            if let Some(failure) = &state.write_failure {
                return Err(failure.clone());
            }
            match value {
                Some(value) => {
                    state.values.insert(key.to_string(), value.to_string());
                }
                None => {
                    state.values.remove(key);
                }
            }
            state
                .subscribers
                .values()
                .filter(|(watched, _)| watched == key)
                .map(|(_, callback)| Arc::clone(callback))
                .collect()
        };
        for callback in listeners {
            callback(value);
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let state = self.state();
        if let Some(failure) = &state.read_failure {
            return Err(failure.clone());
        }
        Ok(state.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.write(key, Some(value))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.write(key, None)
    }

    fn subscribe(&self, key: &str, callback: StoreCallback) -> Option<SubscriptionId> {
        let mut state = self.state();
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        state.subscribers.insert(id, (key.to_string(), callback));
        Some(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state().subscribers.remove(&id).is_some()
    }
}

/// Per-editable-id draft persistence. Storage failures are logged and
/// swallowed; callers always get a usable answer.
#[derive(Clone)]
pub struct DraftStore {
    store: SharedStore,
    logger: Option<Logger>,
    metrics: Option<SharedMetrics>,
}

impl DraftStore {
    pub fn new(store: SharedStore) -> Self {
        Self::with_observability(store, None, None)
    }

    pub fn with_observability(
        store: SharedStore,
        logger: Option<Logger>,
        metrics: Option<SharedMetrics>,
    ) -> Self {
        Self {
            store,
            logger,
            metrics,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    fn storage_failure(&self, operation: &str, editable_id: &str, err: &StoreError) {
        emit_to(
            self.logger.as_ref(),
            LogLevel::Warn,
            TARGET_EDITING,
            "draft_storage_failed",
            [
                json_str("operation", operation),
                json_str("editable_id", editable_id),
                json_str("error", err.to_string()),
            ],
        );
    }

    fn read_key(&self, editable_id: &str, key: &str) -> Option<EditableDraft> {
        if editable_id.is_empty() {
            return None;
        }
        let raw = match self.store.get(key) {
            Ok(raw) => raw?,
            Err(err) => {
                self.storage_failure("read", editable_id, &err);
                return None;
            }
        };
        let value: Value = serde_json::from_str(&raw).ok()?;
        let version = value.get("version").and_then(Value::as_u64);
        if version.is_some_and(|found| found != u64::from(DRAFT_VERSION)) {
            emit_to(
                self.logger.as_ref(),
                LogLevel::Warn,
                TARGET_EDITING,
                "draft_version_rejected",
                [
                    json_str("editable_id", editable_id),
                    json_str("key", key),
                    json_kv("version", version),
                ],
            );
            return None;
        }
        EditableDraft::from_stored(&value)
    }

    fn write_key(&self, editable_id: &str, key: &str, draft: &EditableDraft) {
        if editable_id.is_empty() {
            return;
        }
        let Ok(encoded) = serde_json::to_string(draft) else {
            return;
        };
        match self.store.set(key, &encoded) {
            Ok(()) => record_with(self.metrics.as_ref(), SlotMetrics::record_draft_write),
            Err(err) => self.storage_failure("write", editable_id, &err),
        }
    }

    fn clear_key(&self, editable_id: &str, key: &str) {
        if editable_id.is_empty() {
            return;
        }
        if let Err(err) = self.store.remove(key) {
            self.storage_failure("clear", editable_id, &err);
        }
    }

    /// The uncommitted draft for `editable_id`.
    pub fn read(&self, editable_id: &str) -> Option<EditableDraft> {
        self.read_key(editable_id, &draft_key(editable_id))
    }

    pub fn write(&self, editable_id: &str, draft: &EditableDraft) {
        self.write_key(editable_id, &draft_key(editable_id), draft);
    }

    pub fn clear(&self, editable_id: &str) {
        self.clear_key(editable_id, &draft_key(editable_id));
    }

    pub fn has(&self, editable_id: &str) -> bool {
        !editable_id.is_empty()
            && matches!(self.store.get(&draft_key(editable_id)), Ok(Some(_)))
    }

    /// The value last published without a remote; sessions use it as their base.
    pub fn read_committed(&self, editable_id: &str) -> Option<EditableDraft> {
        self.read_key(editable_id, &committed_key(editable_id))
    }

    pub fn write_committed(&self, editable_id: &str, draft: &EditableDraft) {
        self.write_key(editable_id, &committed_key(editable_id), draft);
    }

    pub fn clear_committed(&self, editable_id: &str) {
        self.clear_key(editable_id, &committed_key(editable_id));
    }
}
