use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Host-assigned identity of an observed element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u64);

/// Scroll and client extents reported for one element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxMetrics {
    pub scroll_width: f64,
    pub client_width: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl BoxMetrics {
    pub const fn new(
        scroll_width: f64,
        client_width: f64,
        scroll_height: f64,
        client_height: f64,
    ) -> Self {
        Self {
            scroll_width,
            client_width,
            scroll_height,
            client_height,
        }
    }

    /// Content that exactly fits its box on both axes.
    pub const fn fitting(width: f64, height: f64) -> Self {
        Self::new(width, width, height, height)
    }
}

type ResizeCallback = Arc<dyn Fn(BoxMetrics) + Send + Sync>;

/// Returned by [`ResizeHub::observe`]; only the matching handle can release
/// the element, so a stale handle never removes a newer observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Observation {
    element: ElementId,
    token: u64,
}

impl Observation {
    pub fn element(&self) -> ElementId {
        self.element
    }
}

#[derive(Default)]
struct HubState {
    next_token: u64,
    next_element: u64,
    callbacks: HashMap<ElementId, (u64, ResizeCallback)>,
}

/// One resize observer for the whole process, dispatching by element.
#[derive(Clone, Default)]
pub struct ResizeHub {
    inner: Arc<Mutex<HubState>>,
}

impl ResizeHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fresh element identity for hosts that do not have their own.
    pub fn allocate_element(&self) -> ElementId {
        let mut state = self.state();
        state.next_element += 1;
        ElementId(state.next_element)
    }

    /// Register the callback for `element`, replacing any earlier one.
    pub fn observe<F>(&self, element: ElementId, callback: F) -> Observation
    where
        F: Fn(BoxMetrics) + Send + Sync + 'static,
    {
        let mut state = self.state();
        state.next_token += 1;
        let token = state.next_token;
        state.callbacks.insert(element, (token, Arc::new(callback)));
        Observation { element, token }
    }

    pub fn unobserve(&self, observation: Observation) -> bool {
        let mut state = self.state();
        let owned = state
            .callbacks
            .get(&observation.element)
            .is_some_and(|(token, _)| *token == observation.token);
        if owned {
            state.callbacks.remove(&observation.element);
        }
        owned
    }

    pub fn is_observed(&self, element: ElementId) -> bool {
        self.state().callbacks.contains_key(&element)
    }

    pub fn observed_count(&self) -> usize {
        self.state().callbacks.len()
    }

    /// Deliver a size observation. Returns whether anything was listening.
    pub fn report(&self, element: ElementId, metrics: BoxMetrics) -> bool {
        let callback = self
            .state()
            .callbacks
            .get(&element)
            .map(|(_, callback)| Arc::clone(callback));
        match callback {
            Some(callback) => {
                callback(metrics);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatches_by_element_identity() {
        let hub = ResizeHub::new();
        let (a, b) = (hub.allocate_element(), hub.allocate_element());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        hub.observe(a, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(hub.report(a, BoxMetrics::fitting(10.0, 10.0)));
        assert!(!hub.report(b, BoxMetrics::fitting(10.0, 10.0)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stale_observation_cannot_release_a_newer_one() {
        let hub = ResizeHub::new();
        let element = hub.allocate_element();
        let first = hub.observe(element, |_| {});
        let second = hub.observe(element, |_| {});

        assert!(!hub.unobserve(first));
        assert!(hub.is_observed(element));
        assert!(hub.unobserve(second));
        assert_eq!(hub.observed_count(), 0);
    }

    #[test]
    fn callbacks_may_reenter_the_hub() {
        let hub = ResizeHub::new();
        let element = hub.allocate_element();
        let inner = hub.clone();
        let observation = Arc::new(Mutex::new(None::<Observation>));
        let slot = Arc::clone(&observation);
        let registered = hub.observe(element, move |_| {
            if let Some(obs) = slot.lock().unwrap().take() {
                inner.unobserve(obs);
            }
        });
        *observation.lock().unwrap() = Some(registered);

        hub.report(element, BoxMetrics::default());
        assert_eq!(hub.observed_count(), 0);
    }
}
