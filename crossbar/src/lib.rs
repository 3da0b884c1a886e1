//! # Crossbar
//!
//! Asynchronous FIFO message-passing channels for single-threaded
//! cooperative runtimes.
//!
//! Any number of logical producers and consumers interleave sends and
//! receives without blocking the thread: `send` always completes
//! synchronously, `recv` suspends until a message arrives, and pairing is
//! determined purely by arrival order.
//!
//! ## Variants
//!
//! | Variant | Semantics |
//! |---------|-----------|
//! | [`PointToPointChannel`] | each send resolves exactly one receive, strict FIFO |
//! | [`BroadcastChannel`] | each send resolves every currently suspended receive |
//! | [`BridgedChannel`] | send/receive forward to an external [`MessageEndpoint`] |
//!
//! All three implement the [`Channel`] trait; [`create_channel`] validates a
//! [`ChannelOptions`] request and returns the chosen variant behind
//! `Rc<dyn Channel<T>>`.
//!
//! ## Quick Start
//!
//! ```ignore
//! use crossbar::{ChannelKind, ChannelOptions, create_channel};
//!
//! let channel = create_channel::<String>(ChannelOptions::new(ChannelKind::PointToPoint))?;
//! channel.send("hello".to_string());
//! let message = channel.recv().await;
//! ```
//!
//! ## Execution model
//!
//! Single-threaded and cooperative: internal state lives in `Rc<RefCell<_>>`
//! and types are deliberately `!Send`. Each operation's bookkeeping runs to
//! completion inside one borrow, which is all the mutual exclusion the model
//! needs. Dropping a pending receive future cancels it and deregisters its
//! waiter.

#![deny(missing_docs)]

pub mod bridge;
pub mod broadcast;
pub mod channel;
pub mod error;
pub mod prelude;
pub mod queue;

pub use bridge::{BridgedChannel, MessageEndpoint};
pub use broadcast::{BroadcastQueue, BroadcastRecvFuture};
pub use channel::{
    BroadcastChannel, Channel, ChannelKind, ChannelOptions, PointToPointChannel, create_channel,
};
pub use error::ChannelError;
pub use queue::{MatchingQueue, OverflowPolicy, QueueConfig, RecvFuture};
