use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::json;

use crate::logging::{LogLevel, Logger, TARGET_BREAKPOINTS, emit_to, json_kv};

use super::{Breakpoint, BreakpointQuery, ListenerId, MediaQueryHub};

/// Largest tier whose predicate currently matches, or `default` when none do.
///
/// `entries` must be in ascending tier order.
pub fn select_active<I>(entries: I, default: Breakpoint) -> Breakpoint
where
    I: IntoIterator<Item = (Breakpoint, bool)>,
{
    entries
        .into_iter()
        .filter(|(_, matches)| *matches)
        .last()
        .map(|(breakpoint, _)| breakpoint)
        .unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u64);

type ChangeCallback = Arc<dyn Fn(Breakpoint) + Send + Sync>;

struct OracleState {
    queries: Vec<BreakpointQuery>,
    entries: Vec<(Breakpoint, bool)>,
    default: Breakpoint,
    active: Breakpoint,
    observers: Vec<(ObserverId, ChangeCallback)>,
    next_observer: u64,
    logger: Option<Logger>,
}

impl OracleState {
    /// Re-read every query from the hub; returns the new active tier only if it moved.
    ///
    /// One viewport change can flip several queries, each notified separately.
    fn refresh(&mut self, hub: &MediaQueryHub) -> Option<Breakpoint> {
        self.entries = self
            .queries
            .iter()
            .map(|bq| (bq.breakpoint, hub.matches(&bq.query)))
            .collect();
        let next = select_active(self.entries.iter().copied(), self.default);
        if next == self.active {
            return None;
        }
        let previous = self.active;
        self.active = next;
        emit_to(
            self.logger.as_ref(),
            LogLevel::Debug,
            TARGET_BREAKPOINTS,
            "breakpoint_changed",
            [
                json_kv("from", json!(previous.as_str())),
                json_kv("to", json!(next.as_str())),
            ],
        );
        Some(next)
    }
}

/// Tracks the active breakpoint by listening to one media query per tier.
///
/// Listeners are released on [`BreakpointOracle::detach`] or drop.
pub struct BreakpointOracle {
    hub: MediaQueryHub,
    state: Arc<Mutex<OracleState>>,
    listeners: Vec<ListenerId>,
}

fn lock(state: &Mutex<OracleState>) -> MutexGuard<'_, OracleState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BreakpointOracle {
    pub fn attach(hub: &MediaQueryHub, queries: &[BreakpointQuery], default: Breakpoint) -> Self {
        Self::attach_with_logger(hub, queries, default, None)
    }

    pub fn attach_with_logger(
        hub: &MediaQueryHub,
        queries: &[BreakpointQuery],
        default: Breakpoint,
        logger: Option<Logger>,
    ) -> Self {
        let mut ordered = queries.to_vec();
        ordered.sort_by_key(|bq| bq.breakpoint);

        let entries: Vec<(Breakpoint, bool)> = ordered
            .iter()
            .map(|bq| (bq.breakpoint, hub.matches(&bq.query)))
            .collect();
        let active = select_active(entries.iter().copied(), default);

        let state = Arc::new(Mutex::new(OracleState {
            queries: ordered.clone(),
            entries,
            default,
            active,
            observers: Vec::new(),
            next_observer: 0,
            logger,
        }));

        let listeners = ordered
            .iter()
            .map(|bq| {
                let weak: Weak<Mutex<OracleState>> = Arc::downgrade(&state);
                let source = hub.clone();
                hub.subscribe(bq.query, move |_| {
                    let Some(state) = weak.upgrade() else {
                        return;
                    };
                    let notify = {
                        let mut guard = lock(&state);
                        guard.refresh(&source).map(|next| {
                            let observers: Vec<ChangeCallback> =
                                guard.observers.iter().map(|(_, cb)| Arc::clone(cb)).collect();
                            (next, observers)
                        })
                    };
                    if let Some((next, observers)) = notify {
                        for observer in observers {
                            observer(next);
                        }
                    }
                })
            })
            .collect();

        Self {
            hub: hub.clone(),
            state,
            listeners,
        }
    }

    pub fn active(&self) -> Breakpoint {
        lock(&self.state).active
    }

    pub fn default_breakpoint(&self) -> Breakpoint {
        lock(&self.state).default
    }

    /// Called with the new tier each time the active breakpoint changes.
    pub fn on_change<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(Breakpoint) + Send + Sync + 'static,
    {
        let mut state = lock(&self.state);
        let id = ObserverId(state.next_observer);
        state.next_observer += 1;
        state.observers.push((id, Arc::new(callback)));
        id
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut state = lock(&self.state);
        let before = state.observers.len();
        state.observers.retain(|(existing, _)| *existing != id);
        state.observers.len() != before
    }

    pub fn is_attached(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Release every media-query listener this oracle registered.
    pub fn detach(&mut self) {
        for id in self.listeners.drain(..) {
            self.hub.unsubscribe(id);
        }
    }
}

impl Drop for BreakpointOracle {
    fn drop(&mut self) {
        self.detach();
    }
}
