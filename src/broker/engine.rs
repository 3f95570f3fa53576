//! Broker engine
//!
//! `Broker::execute` is the single entry point the connection layer calls for
//! every decoded action. The broker validates the action, applies it to its
//! `SubscriptionRegistry` and, for publishes, hands the message to each
//! subscriber of the topic other than the sender.
//!
//! Errors never leave `execute`. Each call clears the last-error slot and a
//! failing call leaves its error text there, readable through
//! `last_error_message`.
//!
//! Concurrency and usage notes:
//! - `execute` takes `&self`; share the broker as `Arc<Broker>` between
//!   connection tasks. The registry synchronizes itself.
//! - Publish delivers to a snapshot of the topic's subscribers. A subscriber
//!   added while a publish is in flight may miss that message.
//! - The last-error slot is shared by all callers, so under concurrent use it
//!   reflects whichever call finished last.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::broker::action::{Action, ActionType, is_blank};
use crate::broker::registry::SubscriptionRegistry;
use crate::broker::subscriber::Subscriber;
use crate::utils::PubSubError;

#[derive(Debug, Default)]
pub struct Broker {
    registry: Arc<SubscriptionRegistry>,
    last_error: Mutex<String>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a broker on top of an existing registry.
    pub fn with_registry(registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            registry,
            last_error: Mutex::new(String::new()),
        }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Apply `action` on behalf of `subscriber`.
    pub fn execute(&self, action: &Action, subscriber: &Subscriber) {
        self.last_error.lock().clear();
        if let Err(e) = self.dispatch(action, subscriber) {
            self.on_error(&e);
        }
    }

    /// Error text of the most recent `execute` call, empty if it succeeded.
    pub fn last_error_message(&self) -> String {
        self.last_error.lock().clone()
    }

    fn dispatch(&self, action: &Action, subscriber: &Subscriber) -> Result<(), PubSubError> {
        if subscriber.is_nil() {
            return Err(PubSubError::MissingActionOrSubscriber);
        }

        match action.validate()? {
            ActionType::Publish => self.publish(action.topic(), action.message(), subscriber),
            ActionType::Subscribe => self.subscribe(action.topic(), subscriber),
            ActionType::Unsubscribe => self.unsubscribe(action.topic(), subscriber),
            ActionType::UnsubscribeAll => self.unsubscribe_all(subscriber),
        }
    }

    fn publish(
        &self,
        topic: Option<&str>,
        message: Option<&str>,
        sender: &Subscriber,
    ) -> Result<(), PubSubError> {
        let topic = require_topic(topic)?;
        let message = match message {
            Some(m) if !is_blank(Some(m)) => m,
            _ => return Err(PubSubError::InvalidMessage),
        };
        if sender.is_nil() {
            return Err(PubSubError::InvalidSubscriber);
        }

        let mut delivered = 0usize;
        let mut last_failure = None;
        for subscriber in self.registry.get_subscribers(topic) {
            if subscriber == *sender {
                continue;
            }
            match subscriber.deliver(message) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("{e}");
                    last_failure = Some(e);
                }
            }
        }
        debug!("{sender} published to {topic}, delivered to {delivered} subscriber(s)");

        match last_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn subscribe(&self, topic: Option<&str>, subscriber: &Subscriber) -> Result<(), PubSubError> {
        let topic = require_topic(topic)?;
        self.registry.add(topic, subscriber)?;
        info!("Added subscription, subscriber: {subscriber}, topic: {topic}");
        Ok(())
    }

    fn unsubscribe(&self, topic: Option<&str>, subscriber: &Subscriber) -> Result<(), PubSubError> {
        let topic = require_topic(topic)?;
        self.registry.remove(topic, subscriber)?;
        info!("Removed subscription, subscriber: {subscriber}, topic: {topic}");
        Ok(())
    }

    fn unsubscribe_all(&self, subscriber: &Subscriber) -> Result<(), PubSubError> {
        self.registry.remove_all(subscriber)?;
        info!("Removed all subscriptions, subscriber: {subscriber}");
        Ok(())
    }

    fn on_error(&self, e: &PubSubError) {
        let text = e.to_string();
        error!("{text}");
        *self.last_error.lock() = text;
    }
}

fn require_topic(topic: Option<&str>) -> Result<&str, PubSubError> {
    match topic {
        Some(t) if !is_blank(Some(t)) => Ok(t),
        _ => Err(PubSubError::InvalidTopic),
    }
}
