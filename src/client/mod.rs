//! The `client` module holds the client side of the system.
//!
//! `ConnectionClient` maintains a reconnecting link to the broker and is used
//! by both the producer (publishing account events) and the consumer
//! (subscribing and displaying them through `EventDisplay`).

pub mod connection;
pub mod display;
pub mod event;

pub use connection::{ClientOptions, ConnectionClient, ConnectionState, MessageSink};
pub use display::EventDisplay;
pub use event::AccountEvent;

#[cfg(test)]
mod tests;
