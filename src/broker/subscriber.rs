//! Subscriber handle
//!
//! A `Subscriber` stands for one open connection. Identity is the
//! connection's `SubscriberId`; the sender half of the connection's outbound
//! channel is the delivery capability and takes no part in equality.

use std::fmt;
use std::hash::{Hash, Hasher};

use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::utils::PubSubError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The id that no connection ever carries. A subscriber with this id is
    /// treated as missing.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    sender: UnboundedSender<WsMessage>,
}

impl Subscriber {
    /// Create a subscriber with a fresh id for the connection behind `sender`.
    pub fn new(sender: UnboundedSender<WsMessage>) -> Self {
        Self::with_id(SubscriberId::new(), sender)
    }

    pub fn with_id(id: SubscriberId, sender: UnboundedSender<WsMessage>) -> Self {
        Self { id, sender }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn is_nil(&self) -> bool {
        self.id.is_nil()
    }

    /// Queue `payload` as a text frame for this subscriber's connection.
    ///
    /// Fails only when the connection's writer has already gone away.
    pub fn deliver(&self, payload: &str) -> Result<(), PubSubError> {
        self.sender
            .send(WsMessage::text(payload.to_string()))
            .map_err(|e| PubSubError::DeliveryFailure {
                subscriber: self.id.to_string(),
                reason: e.to_string(),
            })
    }
}

impl PartialEq for Subscriber {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Subscriber {}

impl Hash for Subscriber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}
