//! The `error` module defines the error type shared by every layer of the
//! `tracking-pubsub` application.
//!
//! Broker-side variants are recoverable conditions: the broker records their
//! `Display` text as its last error instead of propagating them. Client-side
//! variants drive the reconnect loop and are logged, never surfaced to callers
//! of the connection API.

use thiserror::Error;

use crate::broker::action::ActionType;

pub type Result<T> = std::result::Result<T, PubSubError>;

#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("Action or Subscriber is missing")]
    MissingActionOrSubscriber,

    #[error("Action type is missing")]
    MissingActionType,

    #[error("Unknown action type '{0}'. Should be one of {allowed}", allowed = ActionType::allowed())]
    InvalidAction(String),

    #[error("Topic is missing or formed only from space characters")]
    InvalidTopic,

    #[error("Message is missing or formed only from space characters")]
    InvalidMessage,

    #[error("Subscriber is missing")]
    InvalidSubscriber,

    #[error("Malformed wire message: {0}")]
    MalformedWireMessage(String),

    #[error("Failed to deliver to {subscriber}: {reason}")]
    DeliveryFailure { subscriber: String, reason: String },

    #[error("{0}")]
    InvalidEvent(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
