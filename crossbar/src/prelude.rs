//! Common imports for working with crossbar channels.

pub use crate::bridge::{BridgedChannel, MessageEndpoint};
pub use crate::broadcast::BroadcastQueue;
pub use crate::channel::{
    BroadcastChannel, Channel, ChannelKind, ChannelOptions, PointToPointChannel, create_channel,
};
pub use crate::error::ChannelError;
pub use crate::queue::{MatchingQueue, OverflowPolicy, QueueConfig};

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use std::rc::Rc;

/// Result type for channel construction.
pub type Result<T> = std::result::Result<T, ChannelError>;
