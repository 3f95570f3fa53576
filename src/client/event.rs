//! Account event payload
//!
//! Messages published on the accounts topic are plain text of the form
//! `accountId;timestamp;data`. The producer builds them with
//! `AccountEvent::new`, the consumer reads them back with `AccountEvent::parse`.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::PubSubError;

pub const EVENT_DELIMITER: char = ';';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountEvent {
    pub account_id: String,
    pub timestamp: String,
    pub data: String,
}

impl AccountEvent {
    /// Stamp a new event with the current UTC time.
    pub fn new(account_id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            data: data.into(),
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}{EVENT_DELIMITER}{}{EVENT_DELIMITER}{}",
            self.account_id, self.timestamp, self.data
        )
    }

    pub fn parse(message: &str) -> Result<Self, PubSubError> {
        if message.trim().is_empty() {
            return Err(PubSubError::InvalidEvent(
                "Message is blank and can not be displayed.".to_string(),
            ));
        }
        let parts: Vec<&str> = message.split(EVENT_DELIMITER).collect();
        match parts.as_slice() {
            [account_id, timestamp, data] => Ok(Self {
                account_id: account_id.to_string(),
                timestamp: timestamp.to_string(),
                data: data.to_string(),
            }),
            _ => Err(PubSubError::InvalidEvent(format!(
                "Message consists of {} parts. Should consist of 3 parts.",
                parts.len()
            ))),
        }
    }
}
