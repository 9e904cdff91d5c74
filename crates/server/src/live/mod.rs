//! Live build streams: who is listening to which project, and fan-out to them.

pub mod broadcaster;
pub mod registry;

pub use broadcaster::Broadcaster;
pub use registry::{Subscriber, SubscriberId, SubscriberRegistry};
