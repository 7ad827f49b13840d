//! Shared document store: the room's elements keyed by id.
//!
//! This is the client-side state container for board elements. Every write,
//! local or remote, replaces the whole element (last writer wins); there is no
//! field-level merge. Subscribers receive the full element list after every
//! change and once immediately on subscription.
//!
//! INVARIANT
//! =========
//! Every stored element has a non-empty `id` and `type`. Each mutation entry
//! point checks this and drops offending input without notifying.

use std::collections::HashMap;

use frames::Element;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::listeners::CallbackResult;

/// A document subscriber; receives the full element list.
pub type Subscriber = Box<dyn FnMut(&[Element]) -> CallbackResult + Send>;

/// Handle returned by [`DocStore::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// In-memory map of element id to element.
#[derive(Default)]
pub struct DocStore {
    elements: HashMap<String, Element>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl DocStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All elements, ordered by id.
    #[must_use]
    pub fn get_elements_array(&self) -> Vec<Element> {
        let mut elements = self.elements.values().cloned().collect::<Vec<_>>();
        elements.sort_by(|a, b| a.id.cmp(&b.id));
        elements
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    // ---- remote ----------------------------------------------------------

    /// Replace every element with `list`, skipping entries without `id`/`type`.
    /// Returns the number of elements stored.
    pub fn apply_snapshot(&mut self, list: &[Value]) -> usize {
        self.elements = list
            .iter()
            .filter_map(Element::from_value)
            .map(|element| (element.id.clone(), element))
            .collect();
        let skipped = list.len().saturating_sub(self.elements.len());
        debug!(elements = self.elements.len(), skipped, "snapshot applied");
        self.notify();
        self.elements.len()
    }

    /// Upsert an element received as `element_add`.
    pub fn apply_remote_add(&mut self, value: &Value) -> bool {
        self.apply_remote_upsert(value)
    }

    /// Upsert an element received as `element_update`. Same operation as add:
    /// the server does not distinguish "already exists".
    pub fn apply_remote_update(&mut self, value: &Value) -> bool {
        self.apply_remote_upsert(value)
    }

    /// Delete an element received as `element_remove`.
    pub fn apply_remote_remove(&mut self, id: &str) -> bool {
        self.remove(id)
    }

    fn apply_remote_upsert(&mut self, value: &Value) -> bool {
        let Some(element) = Element::from_value(value) else {
            debug!("dropping remote element without id/type");
            return false;
        };
        self.elements.insert(element.id.clone(), element);
        self.notify();
        true
    }

    // ---- local -----------------------------------------------------------

    /// Insert or replace an element originated locally.
    pub fn upsert_local(&mut self, element: Element) -> bool {
        if !element.is_valid() {
            warn!(id = %element.id, kind = %element.kind, "upsert_local: element needs id and type");
            return false;
        }
        self.elements.insert(element.id.clone(), element);
        self.notify();
        true
    }

    /// Delete an element originated locally.
    pub fn remove_local(&mut self, id: &str) -> bool {
        self.remove(id)
    }

    /// Removes `id` if present and notifies either way.
    fn remove(&mut self, id: &str) -> bool {
        let removed = self.elements.remove(id).is_some();
        self.notify();
        removed
    }

    // ---- subscriptions ---------------------------------------------------

    /// Register a subscriber. It is called once right away with the current
    /// elements, then after every change.
    pub fn subscribe<F>(&mut self, subscriber: F) -> SubscriptionId
    where
        F: FnMut(&[Element]) -> CallbackResult + Send + 'static,
    {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        let mut subscriber: Subscriber = Box::new(subscriber);
        if let Err(error) = subscriber(&self.get_elements_array()) {
            warn!(subscription = id.0, error = %error, "document subscriber failed on initial state");
        }
        self.subscribers.push((id, subscriber));
        id
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(entry, _)| *entry != id);
        self.subscribers.len() != before
    }

    fn notify(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.get_elements_array();
        for (SubscriptionId(id), subscriber) in &mut self.subscribers {
            if let Err(error) = subscriber(&snapshot) {
                warn!(subscription = *id, error = %error, "document subscriber failed");
            }
        }
    }
}

/// Fresh element id: `prefix` (default `el_`) followed by a UUID v4.
#[must_use]
pub fn generate_id(prefix: Option<&str>) -> String {
    format!("{}{}", prefix.unwrap_or("el_"), Uuid::new_v4())
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
