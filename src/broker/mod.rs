//! The `broker` module holds the core of the pub/sub system: the action
//! protocol, subscriber handles, the subscription registry and the `Broker`
//! that ties them together.

pub mod action;
pub mod engine;
pub mod registry;
pub mod subscriber;
pub mod topic;

pub use action::{Action, ActionType};
pub use engine::Broker;
pub use registry::SubscriptionRegistry;
pub use subscriber::{Subscriber, SubscriberId};
