//! Display filter
//!
//! Sink for the consuming client. Each inbound account event is rendered as
//! one JSON line on stdout, optionally restricted to an allow-list of account
//! ids. Messages that are not account events are logged and skipped.

use std::collections::HashSet;

use tracing::warn;

use crate::client::connection::MessageSink;
use crate::client::event::AccountEvent;

#[derive(Debug, Clone, Default)]
pub struct EventDisplay {
    account_ids: HashSet<String>,
}

impl EventDisplay {
    /// An empty allow-list displays every event.
    pub fn new(account_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            account_ids: account_ids.into_iter().collect(),
        }
    }

    pub fn is_filtering(&self) -> bool {
        !self.account_ids.is_empty()
    }

    /// The JSON line for `message`, or `None` when it is skipped.
    pub fn render(&self, message: &str) -> Option<String> {
        let event = match AccountEvent::parse(message) {
            Ok(event) => event,
            Err(e) => {
                warn!("{e}");
                return None;
            }
        };
        if self.is_filtering() && !self.account_ids.contains(&event.account_id) {
            return None;
        }
        match serde_json::to_string(&event) {
            Ok(line) => Some(line),
            Err(e) => {
                warn!("Failed to serialize event: {e}");
                None
            }
        }
    }
}

impl MessageSink for EventDisplay {
    fn on_message(&self, payload: &str) {
        if let Some(line) = self.render(payload) {
            println!("{line}");
        }
    }
}
