//! Event-name keyed listener registry.
//!
//! Listeners for one event run in registration order. A listener returning an
//! error is logged and skipped; delivery continues with the next one.

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

/// Error type listeners and document subscribers may return.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of listeners and document subscribers.
pub type CallbackResult = Result<(), CallbackError>;

/// A registered event callback.
pub type Listener = Box<dyn FnMut(&Value) -> CallbackResult + Send>;

/// Handle returned by [`ListenerRegistry::on`]; pass it to `off` to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: u64,
    by_event: HashMap<String, Vec<(ListenerId, Listener)>>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `event`.
    pub fn on<F>(&mut self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: FnMut(&Value) -> CallbackResult + Send + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.by_event
            .entry(event.into())
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn off(&mut self, id: ListenerId) -> bool {
        for listeners in self.by_event.values_mut() {
            if let Some(index) = listeners.iter().position(|(entry, _)| *entry == id) {
                listeners.remove(index);
                return true;
            }
        }
        false
    }

    /// Deliver `payload` to every listener of `event`. Returns how many
    /// listeners completed without error.
    pub fn emit(&mut self, event: &str, payload: &Value) -> usize {
        let Some(listeners) = self.by_event.get_mut(event) else {
            return 0;
        };
        let mut delivered = 0_usize;
        for (ListenerId(id), listener) in listeners.iter_mut() {
            match listener(payload) {
                Ok(()) => delivered += 1,
                Err(error) => warn!(event, listener = *id, error = %error, "listener failed"),
            }
        }
        delivered
    }

    /// Number of listeners registered for `event`.
    #[cfg(test)]
    #[must_use]
    pub fn count(&self, event: &str) -> usize {
        self.by_event.get(event).map_or(0, Vec::len)
    }
}

#[cfg(test)]
#[path = "listeners_test.rs"]
mod listeners_test;
