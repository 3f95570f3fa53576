//! # tracking-pubsub
//!
//! `tracking-pubsub` is an in-memory, topic-based publish/subscribe broker
//! for account tracking events, together with the reconnecting WebSocket
//! client used by event producers and consumers.
//!
//! ## Core Modules
//!
//! - `broker`: Actions, subscribers, the subscription registry and the broker that executes actions.
//! - `client`: The reconnecting connection client, account events and the display filter.
//! - `config`: Loads settings from `config/default` and `PUBSUB_*` environment variables.
//! - `transport`: The WebSocket server and the JSON wire format of actions.
//! - `utils`: Shared error type and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;
