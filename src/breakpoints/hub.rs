use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::MediaQuery;

/// Handle returned by [`MediaQueryHub::subscribe`]; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

type MatchCallback = Arc<dyn Fn(bool) + Send + Sync>;

struct Listener {
    query: MediaQuery,
    matches: bool,
    callback: MatchCallback,
}

#[derive(Default)]
struct HubState {
    viewport_width: Option<f32>,
    next_id: u64,
    listeners: BTreeMap<ListenerId, Listener>,
}

impl HubState {
    fn evaluate(&self, query: &MediaQuery) -> bool {
        self.viewport_width
            .map(|width| query.matches(width))
            .unwrap_or(false)
    }
}

/// Process-wide media-query manager.
///
/// The host pushes viewport changes in through [`MediaQueryHub::set_viewport_width`];
/// subscribers are told only when their own query flips. Cloning shares the
/// same registry of listeners.
#[derive(Clone, Default)]
pub struct MediaQueryHub {
    inner: Arc<Mutex<HubState>>,
}

impl MediaQueryHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_viewport_width(width: f32) -> Self {
        let hub = Self::new();
        hub.set_viewport_width(width);
        hub
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn viewport_width(&self) -> Option<f32> {
        self.state().viewport_width
    }

    /// Current match state of `query`. Nothing matches until a viewport is known.
    pub fn matches(&self, query: &MediaQuery) -> bool {
        self.state().evaluate(query)
    }

    pub fn subscribe<F>(&self, query: MediaQuery, callback: F) -> ListenerId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let mut state = self.state();
        let id = ListenerId(state.next_id);
        state.next_id += 1;
        let matches = state.evaluate(&query);
        state.listeners.insert(
            id,
            Listener {
                query,
                matches,
                callback: Arc::new(callback),
            },
        );
        id
    }

    /// Returns `false` when the listener was already gone.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.state().listeners.remove(&id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    /// Record a new viewport width and notify listeners whose query changed.
    ///
    /// Callbacks run after the internal lock is released, so they may call
    /// back into the hub.
    pub fn set_viewport_width(&self, width: f32) {
        let pending: Vec<(MatchCallback, bool)> = {
            let mut state = self.state();
            state.viewport_width = Some(width);
            let mut pending = Vec::new();
            for listener in state.listeners.values_mut() {
                let now = listener.query.matches(width);
                if now != listener.matches {
                    listener.matches = now;
                    pending.push((Arc::clone(&listener.callback), now));
                }
            }
            pending
        };

        for (callback, matches) in pending {
            callback(matches);
        }
    }
}
