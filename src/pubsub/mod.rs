//! Publish/subscribe state bound to physical connections.

mod dispatcher;
mod listener;
mod registry;

pub(crate) use dispatcher::{Dispatcher, MessageSink};
pub use listener::{
    ChannelListener, Message, MessageListener, MessageReceiver, SubscriptionKind,
    message_channel,
};
#[cfg(any(feature = "multiplexed", feature = "blocking"))]
pub(crate) use listener::message_from_redis;
pub use registry::{SlotId, SubscriptionInfo, SubscriptionRegistry};
