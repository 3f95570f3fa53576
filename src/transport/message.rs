use crate::broker::Action;
use crate::utils::PubSubError;

/// Reply sent back on a connection whose frame could not be decoded.
pub const INVALID_FORMAT_REPLY: &str = r#"Invalid message format. Should be JSON, example: {"type":"SUBSCRIBE","topic":"myTopic","message":"Hello World!"}"#;

/// Decode one text frame into an `Action`.
///
/// Any JSON object whose `type`, `topic` and `message` fields are strings,
/// null or absent decodes; unknown fields are ignored. Whether the type is one
/// the broker understands is checked later by the broker itself.
pub fn decode_action(text: &str) -> Result<Action, PubSubError> {
    serde_json::from_str::<Action>(text).map_err(|e| PubSubError::MalformedWireMessage(e.to_string()))
}

/// Encode an action as a wire frame.
pub fn encode_action(action: &Action) -> Result<String, PubSubError> {
    serde_json::to_string(action).map_err(|e| PubSubError::MalformedWireMessage(e.to_string()))
}
