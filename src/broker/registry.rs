//! Subscription registry
//!
//! Maps topic names to the subscribers currently receiving that topic. The
//! whole map sits behind one lock; every operation holds it only for the
//! duration of a map update and never across a network send.
//!
//! Invariants kept by every mutation:
//! - no topic entry is ever left with an empty subscriber set
//! - topic keys are never blank
//! - subscribing twice is the same as subscribing once

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::broker::action::is_blank;
use crate::broker::subscriber::Subscriber;
use crate::broker::topic::Topic;
use crate::utils::PubSubError;

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    topics: Mutex<HashMap<String, Topic>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `subscriber` to `topic`, creating the topic entry on first use.
    pub fn add(&self, topic: &str, subscriber: &Subscriber) -> Result<(), PubSubError> {
        require_topic(topic)?;
        require_subscriber(subscriber)?;

        self.topics
            .lock()
            .entry(topic.to_string())
            .or_insert_with(Topic::new)
            .subscribe(subscriber.clone());
        Ok(())
    }

    /// Unsubscribe `subscriber` from `topic`.
    ///
    /// Unknown topics are left alone. A topic whose last subscriber leaves is
    /// dropped from the map.
    pub fn remove(&self, topic: &str, subscriber: &Subscriber) -> Result<(), PubSubError> {
        require_topic(topic)?;
        require_subscriber(subscriber)?;

        let mut topics = self.topics.lock();
        if let Some(entry) = topics.get_mut(topic) {
            entry.unsubscribe(&subscriber.id());
            if entry.is_empty() {
                topics.remove(topic);
            }
        }
        Ok(())
    }

    /// Unsubscribe `subscriber` from every topic it belongs to.
    ///
    /// Topic names are snapshotted first and each is removed under its own
    /// lock acquisition, so topics created by other callers mid-scan may be
    /// skipped.
    pub fn remove_all(&self, subscriber: &Subscriber) -> Result<(), PubSubError> {
        require_subscriber(subscriber)?;

        let names: Vec<String> = self.topics.lock().keys().cloned().collect();
        for name in names {
            self.remove(&name, subscriber)?;
        }
        Ok(())
    }

    /// Snapshot of the subscribers of `topic`. Empty for blank or unknown topics.
    pub fn get_subscribers(&self, topic: &str) -> HashSet<Subscriber> {
        if is_blank(Some(topic)) {
            return HashSet::new();
        }
        self.topics
            .lock()
            .get(topic)
            .map(|t| t.subscribers.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Names of all topics that currently have at least one subscriber.
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contains_topic(&self, topic: &str) -> bool {
        self.topics.lock().contains_key(topic)
    }

    pub fn is_empty(&self) -> bool {
        self.topics.lock().is_empty()
    }
}

fn require_topic(topic: &str) -> Result<(), PubSubError> {
    if is_blank(Some(topic)) {
        return Err(PubSubError::InvalidTopic);
    }
    Ok(())
}

fn require_subscriber(subscriber: &Subscriber) -> Result<(), PubSubError> {
    if subscriber.is_nil() {
        return Err(PubSubError::InvalidSubscriber);
    }
    Ok(())
}
