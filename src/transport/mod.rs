//! The `transport` module is responsible for network communication with
//! clients over WebSockets.
//!
//! It decodes the JSON wire format into broker actions and implements the
//! WebSocket server: managing connections, answering malformed frames, and
//! forwarding client requests to the broker.

pub mod message;
pub mod websocket;

pub use message::{INVALID_FORMAT_REPLY, decode_action, encode_action};
pub use websocket::{serve, start_websocket_server};
