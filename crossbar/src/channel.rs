//! Channel contract, variant selection, and the validating factory.
//!
//! Every variant exposes the same two operations: a synchronous, infallible
//! `send` and an awaitable `recv`. Callers pick a variant through
//! [`ChannelOptions`] and get back an `Rc<dyn Channel<T>>`; configuration
//! mistakes (a bridged channel without an endpoint, an unrecognized
//! selector string) fail fast at construction.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use async_trait::async_trait;

use crate::bridge::{BridgedChannel, MessageEndpoint};
use crate::broadcast::BroadcastQueue;
use crate::error::ChannelError;
use crate::queue::{MatchingQueue, QueueConfig};

/// The uniform two-operation channel contract.
///
/// Object-safe so variants can live behind `Rc<dyn Channel<T>>`. Not `Send`:
/// channels target single-threaded cooperative runtimes.
#[async_trait(?Send)]
pub trait Channel<T> {
    /// Variant tag of this channel.
    fn kind(&self) -> ChannelKind;

    /// Send a message.
    ///
    /// Always completes synchronously and never fails; delivery bookkeeping
    /// finishes before this returns, without waiting on any receiver's side
    /// effects.
    fn send(&self, message: T);

    /// Receive the next message, suspending until one is available.
    ///
    /// Suspension is unbounded; dropping the returned future abandons the
    /// receive and deregisters its waiter.
    async fn recv(&self) -> T;
}

/// Channel variant selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// One send resolves exactly one receive, strict FIFO.
    PointToPoint,
    /// One send resolves every currently suspended receive.
    Broadcast,
    /// Send and receive forward to an external endpoint.
    Bridged,
}

impl FromStr for ChannelKind {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "point-to-point" => Ok(Self::PointToPoint),
            "broadcast" => Ok(Self::Broadcast),
            "bridged" => Ok(Self::Bridged),
            other => Err(ChannelError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PointToPoint => write!(f, "point-to-point"),
            Self::Broadcast => write!(f, "broadcast"),
            Self::Bridged => write!(f, "bridged"),
        }
    }
}

/// Construction request for [`create_channel`].
pub struct ChannelOptions<T> {
    kind: ChannelKind,
    endpoint: Option<Rc<dyn MessageEndpoint<T>>>,
    config: QueueConfig,
}

impl<T> ChannelOptions<T> {
    /// Options for the given variant, with default (unbounded) queueing.
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            endpoint: None,
            config: QueueConfig::default(),
        }
    }

    /// Supply the endpoint handle required by the bridged variant.
    pub fn with_endpoint(mut self, endpoint: Rc<dyn MessageEndpoint<T>>) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Override the queue capacity configuration.
    pub fn with_queue_config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// The requested variant.
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }
}

/// Construct a channel of the requested variant.
///
/// # Errors
///
/// - [`ChannelError::MissingEndpoint`] if the bridged variant was selected
///   without an endpoint handle.
///
/// Unrecognized selector strings are rejected earlier, when parsing the
/// selector via [`ChannelKind::from_str`].
pub fn create_channel<T: Clone + 'static>(
    options: ChannelOptions<T>,
) -> Result<Rc<dyn Channel<T>>, ChannelError> {
    match options.kind {
        ChannelKind::PointToPoint => {
            Ok(Rc::new(PointToPointChannel::with_config(options.config)))
        }
        ChannelKind::Broadcast => Ok(Rc::new(BroadcastChannel::with_config(options.config))),
        ChannelKind::Bridged => {
            let endpoint = options.endpoint.ok_or(ChannelError::MissingEndpoint)?;
            Ok(Rc::new(BridgedChannel::with_config(endpoint, options.config)))
        }
    }
}

/// Channel variant pairing each send with exactly one receive.
pub struct PointToPointChannel<T> {
    queue: MatchingQueue<T>,
}

impl<T> Default for PointToPointChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PointToPointChannel<T> {
    /// Create an unbounded point-to-point channel.
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create a point-to-point channel with an explicit queue configuration.
    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            queue: MatchingQueue::with_config(config),
        }
    }

    /// The underlying matching queue, for inspection.
    pub fn queue(&self) -> &MatchingQueue<T> {
        &self.queue
    }
}

#[async_trait(?Send)]
impl<T: 'static> Channel<T> for PointToPointChannel<T> {
    fn kind(&self) -> ChannelKind {
        ChannelKind::PointToPoint
    }

    fn send(&self, message: T) {
        self.queue.send(message);
    }

    async fn recv(&self) -> T {
        self.queue.recv().await
    }
}

/// Channel variant fanning each send out to all suspended receivers.
pub struct BroadcastChannel<T: Clone> {
    queue: BroadcastQueue<T>,
}

impl<T: Clone> Default for BroadcastChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> BroadcastChannel<T> {
    /// Create an unbounded broadcast channel.
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create a broadcast channel with an explicit queue configuration.
    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            queue: BroadcastQueue::with_config(config),
        }
    }

    /// The underlying broadcast queue, for inspection.
    pub fn queue(&self) -> &BroadcastQueue<T> {
        &self.queue
    }
}

#[async_trait(?Send)]
impl<T: Clone + 'static> Channel<T> for BroadcastChannel<T> {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Broadcast
    }

    fn send(&self, message: T) {
        self.queue.send(message);
    }

    async fn recv(&self) -> T {
        self.queue.recv().await
    }
}
