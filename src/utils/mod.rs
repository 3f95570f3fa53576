//! The `utils` module provides the pieces shared across the `tracking-pubsub`
//! application: the error type and logging setup.

pub mod error;
pub mod logging;

pub use error::{PubSubError, Result};

#[cfg(test)]
mod tests;
