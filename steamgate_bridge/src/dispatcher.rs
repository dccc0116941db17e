// Named-topic publish/subscribe.
//
// One dispatcher instance serves one host session. The bridge keeps a
// long-lived dispatcher for standing notification topics, and additionally
// builds a throwaway single-listener dispatcher per correlated request so a
// call result reaches exactly the listener that asked for it.
//
// Delivery uses a snapshot of the subscriber list taken at publish time:
// every subscriber present at the start of a publish receives the event even
// if a callback unsubscribes others mid-delivery, and listeners added during
// delivery only see later publishes. The snapshot also keeps the topic table
// unborrowed while callbacks run, so callbacks may freely subscribe and
// unsubscribe reentrantly.

use rustc_hash::FxHashMap;
use serde_json::Value;
use std::cell::RefCell;

use crate::host::{HostHandle, Listener};

pub struct EventDispatcher {
    host: HostHandle,
    topics: RefCell<FxHashMap<String, Vec<Listener>>>,
}

impl EventDispatcher {
    pub fn new(host: HostHandle) -> EventDispatcher {
        EventDispatcher {
            host,
            topics: RefCell::new(FxHashMap::default()),
        }
    }

    /// A dispatcher with exactly one subscription, used per correlated call.
    pub fn single(host: HostHandle, topic: &str, listener: Listener) -> EventDispatcher {
        let dispatcher = EventDispatcher::new(host);
        dispatcher.subscribe(topic, listener);
        dispatcher
    }

    /// Register a listener for a topic. Returns false if this exact listener
    /// is already subscribed to the topic.
    pub fn subscribe(&self, topic: &str, listener: Listener) -> bool {
        let mut topics = self.topics.borrow_mut();
        let list = topics.entry(topic.to_owned()).or_default();
        if list.contains(&listener) {
            return false;
        }
        list.push(listener);
        true
    }

    /// Remove a listener from a topic. Returns false if it was not
    /// subscribed.
    pub fn unsubscribe(&self, topic: &str, listener: &Listener) -> bool {
        let mut topics = self.topics.borrow_mut();
        let Some(list) = topics.get_mut(topic) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| l != listener);
        before != list.len()
    }

    pub fn has_subscribers(&self, topic: &str) -> bool {
        self.topics
            .borrow()
            .get(topic)
            .is_some_and(|list| !list.is_empty())
    }

    /// Deliver a payload to every current subscriber of a topic.
    ///
    /// Returns false (a no-op, not an error) when the topic has no
    /// subscribers or the host is no longer running.
    pub fn publish(&self, topic: &str, payload: &Value) -> bool {
        if !self.host.is_running() {
            return false;
        }
        let snapshot = match self.topics.borrow().get(topic) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => return false,
        };
        for listener in &snapshot {
            listener.invoke(topic, payload);
        }
        true
    }
}
