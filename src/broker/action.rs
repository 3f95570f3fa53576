//! Protocol actions
//!
//! An `Action` is what a client sends over the wire: a type, a topic and an
//! optional message. The raw `type` string is kept as received so that a
//! missing or unknown type can still reach the broker and be reported there;
//! `Action::validate` turns it into the closed `ActionType` enum.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::PubSubError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    /// Deliver `message` to every other subscriber of `topic`.
    Publish,
    /// Start receiving messages published to `topic`.
    Subscribe,
    /// Stop receiving messages published to `topic`.
    Unsubscribe,
    /// Stop receiving messages from every topic.
    UnsubscribeAll,
}

impl ActionType {
    pub const ALL: [ActionType; 4] = [
        ActionType::Publish,
        ActionType::Subscribe,
        ActionType::Unsubscribe,
        ActionType::UnsubscribeAll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Publish => "PUBLISH",
            ActionType::Subscribe => "SUBSCRIBE",
            ActionType::Unsubscribe => "UNSUBSCRIBE",
            ActionType::UnsubscribeAll => "UNSUBSCRIBEALL",
        }
    }

    /// Bracketed list of the accepted type names, used in error messages.
    pub fn allowed() -> String {
        let names: Vec<&str> = Self::ALL.iter().map(ActionType::as_str).collect();
        format!("[{}]", names.join(", "))
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = PubSubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| PubSubError::InvalidAction(s.to_string()))
    }
}

/// One protocol operation as decoded from the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type", default)]
    action_type: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl Action {
    pub fn new(action_type: ActionType, topic: impl Into<String>, message: Option<String>) -> Self {
        Self {
            action_type: Some(action_type.as_str().to_string()),
            topic: Some(topic.into()),
            message,
        }
    }

    /// Builds an action from untyped parts, exactly as a decoder would.
    pub fn from_raw(
        action_type: Option<&str>,
        topic: Option<&str>,
        message: Option<&str>,
    ) -> Self {
        Self {
            action_type: action_type.map(str::to_string),
            topic: topic.map(str::to_string),
            message: message.map(str::to_string),
        }
    }

    pub fn subscribe(topic: impl Into<String>) -> Self {
        Self::new(ActionType::Subscribe, topic, None)
    }

    pub fn publish(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ActionType::Publish, topic, Some(message.into()))
    }

    pub fn unsubscribe(topic: impl Into<String>) -> Self {
        Self::new(ActionType::Unsubscribe, topic, None)
    }

    pub fn unsubscribe_all() -> Self {
        Self {
            action_type: Some(ActionType::UnsubscribeAll.as_str().to_string()),
            topic: None,
            message: None,
        }
    }

    pub fn action_type(&self) -> Option<&str> {
        self.action_type.as_deref()
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Resolves the raw type into an `ActionType`.
    ///
    /// Fails with `MissingActionType` when the type is absent or blank and
    /// with `InvalidAction` when it names none of the four known types.
    pub fn validate(&self) -> Result<ActionType, PubSubError> {
        match self.action_type.as_deref() {
            None => Err(PubSubError::MissingActionType),
            Some(t) if t.trim().is_empty() => Err(PubSubError::MissingActionType),
            Some(t) => t.parse(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Action{{type={}, topic={}, message={}}}",
            self.action_type.as_deref().unwrap_or("null"),
            self.topic.as_deref().unwrap_or("null"),
            self.message.as_deref().unwrap_or("null"),
        )
    }
}

/// Whitespace-only strings count as blank.
pub(crate) fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}
