//! BridgedChannel: channel contract adapted onto an external endpoint.
//!
//! The bridge owns no matching logic of its own on the outbound side: `send`
//! posts straight to the endpoint, fire-and-forget. Inbound deliveries flow
//! through an internal [`MatchingQueue`] so that any number of outstanding
//! `recv` calls are matched FIFO against arriving messages, instead of the
//! last registration silently overwriting earlier ones.
//!
//! Transport semantics (ordering, reliability, serialization) are entirely
//! the endpoint's concern; the bridge never inspects the payload.

use std::rc::Rc;

use async_trait::async_trait;

use crate::channel::{Channel, ChannelKind};
use crate::queue::{MatchingQueue, QueueConfig, RecvFuture};

/// Handle to an external bidirectional message endpoint.
///
/// The bridge requires exactly two capabilities: posting an outbound
/// message and installing the inbound callback. Installing a handler
/// replaces any previously installed one; the bridge installs a single
/// persistent handler at construction and never replaces it.
pub trait MessageEndpoint<T> {
    /// Post an outbound message. Fire-and-forget: no delivery confirmation.
    fn post(&self, message: T);

    /// Install the callback invoked for each inbound message.
    fn set_inbound_handler(&self, handler: Box<dyn Fn(T)>);
}

/// Channel variant forwarding to an external endpoint.
pub struct BridgedChannel<T> {
    endpoint: Rc<dyn MessageEndpoint<T>>,

    /// Inbound deliveries, matched FIFO against outstanding receives.
    inbox: Rc<MatchingQueue<T>>,
}

impl<T: 'static> BridgedChannel<T> {
    /// Bridge onto `endpoint` with an unbounded inbox.
    pub fn new(endpoint: Rc<dyn MessageEndpoint<T>>) -> Self {
        Self::with_config(endpoint, QueueConfig::default())
    }

    /// Bridge onto `endpoint` with an explicit inbox configuration.
    ///
    /// Installs the bridge's inbound handler on the endpoint; any handler
    /// installed earlier is replaced.
    pub fn with_config(endpoint: Rc<dyn MessageEndpoint<T>>, config: QueueConfig) -> Self {
        let inbox = Rc::new(MatchingQueue::with_config(config));
        let sink = Rc::clone(&inbox);
        endpoint.set_inbound_handler(Box::new(move |message| sink.send(message)));
        Self { endpoint, inbox }
    }

    /// Post a message to the endpoint.
    pub fn send(&self, message: T) {
        self.endpoint.post(message);
    }

    /// Receive the next inbound message delivered by the endpoint.
    pub fn recv(&self) -> RecvFuture<'_, T> {
        self.inbox.recv()
    }

    /// Number of inbound messages buffered ahead of any receiver.
    pub fn inbox_len(&self) -> usize {
        self.inbox.len()
    }
}

#[async_trait(?Send)]
impl<T: 'static> Channel<T> for BridgedChannel<T> {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Bridged
    }

    fn send(&self, message: T) {
        BridgedChannel::send(self, message);
    }

    async fn recv(&self) -> T {
        self.inbox.recv().await
    }
}
