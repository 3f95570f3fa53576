//! Topic membership
//!
//! A `Topic` holds the subscribers of one topic, keyed by their connection
//! id. The topic name is the registry's map key. Duplicate subscriptions are a no-op.
//!
//! Concurrency note: callers must synchronize access to `Topic`; the
//! registry keeps every topic behind its lock.

use std::collections::HashMap;

use crate::broker::subscriber::{Subscriber, SubscriberId};

#[derive(Debug, Default)]
pub struct Topic {
    pub subscribers: HashMap<SubscriberId, Subscriber>,
}

impl Topic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber to the topic. Duplicate adds are ignored.
    pub fn subscribe(&mut self, subscriber: Subscriber) {
        self.subscribers.entry(subscriber.id()).or_insert(subscriber);
    }

    /// Remove a subscriber from the topic. Returns whether it was a member.
    pub fn unsubscribe(&mut self, id: &SubscriberId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
