//! MatchingQueue: FIFO pairing engine between messages and receivers.
//!
//! The queue holds either pending messages (senders arrived first) or pending
//! receivers (receivers arrived first), never both at once. Every `send`
//! either resolves the oldest live waiter synchronously or buffers the
//! message; every `recv` either takes the oldest buffered message or suspends
//! as a waiter.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Shared continuation slot for one suspended receive.
pub(crate) type SharedSlot<T> = Rc<RefCell<RecvSlot<T>>>;

/// State of a suspended receive operation.
///
/// A slot is created the first time a receive future polls without finding a
/// buffered message. The sending side fills `value` and wakes `waker`; the
/// receiving side takes `value` on its next poll. Dropping the future sets
/// `cancelled` so senders skip the slot during matching.
pub(crate) struct RecvSlot<T> {
    /// Delivered message, present once a sender resolved this slot.
    pub(crate) value: Option<T>,

    /// Waker of the suspended receive future.
    pub(crate) waker: Option<Waker>,

    /// Set when the owning future was dropped before resolution.
    pub(crate) cancelled: bool,
}

impl<T> RecvSlot<T> {
    /// Create a fresh, unresolved slot.
    pub(crate) fn new() -> SharedSlot<T> {
        Rc::new(RefCell::new(Self {
            value: None,
            waker: None,
            cancelled: false,
        }))
    }

    /// Store `value` and wake the owning future.
    ///
    /// Callers must check `cancelled` before resolving.
    pub(crate) fn resolve(&mut self, value: T) {
        self.value = Some(value);
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

/// Policy applied when a bounded queue is full and a new message arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Drop the incoming message, keeping what is already buffered.
    DropNewest,
    /// Drop the oldest buffered message to make room for the incoming one.
    DropOldest,
}

/// Capacity configuration for the message buffer.
///
/// The default is unbounded, matching the classic channel contract where
/// `send` is never rejected. Bounding the buffer trades message loss (made
/// visible through [`MatchingQueue::messages_dropped`] and a warning log)
/// for a hard ceiling on memory growth under producer/consumer imbalance.
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    /// Maximum number of buffered messages, or `None` for unbounded.
    pub capacity: Option<usize>,

    /// What to do with a send that would exceed `capacity`.
    pub overflow: OverflowPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            overflow: OverflowPolicy::DropNewest,
        }
    }
}

impl QueueConfig {
    /// Unbounded buffer (the default).
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Buffer at most `capacity` messages, applying `overflow` when full.
    pub fn bounded(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            capacity: Some(capacity),
            overflow,
        }
    }
}

/// Monotonic counters for observability.
#[derive(Debug, Default)]
struct QueueStats {
    /// Messages handed to `send`.
    messages_sent: u64,
    /// Messages that entered the buffer (no receiver was waiting).
    messages_queued: u64,
    /// Messages discarded by the overflow policy.
    messages_dropped: u64,
    /// Receivers resolved directly by a matching send.
    receivers_resolved: u64,
}

/// Internal state, wrapped in `RefCell` for single-threaded interior
/// mutability.
struct MatchingQueueInner<T> {
    /// Buffered messages (senders outpacing receivers).
    messages: VecDeque<T>,

    /// Suspended receivers (receivers outpacing senders).
    waiters: VecDeque<SharedSlot<T>>,

    stats: QueueStats,
}

impl<T> Default for MatchingQueueInner<T> {
    fn default() -> Self {
        Self {
            messages: VecDeque::new(),
            waiters: VecDeque::new(),
            stats: QueueStats::default(),
        }
    }
}

/// Point-to-point FIFO channel core.
///
/// # Guarantees
///
/// - Messages buffered while no receiver waits are delivered in send order.
/// - Receivers suspended while no message is buffered are resolved in
///   arrival order, each with exactly one message.
/// - After any operation, at most one of {message buffer, live waiters} is
///   non-empty.
///
/// # Design
///
/// - `RefCell` interior mutability for a single-threaded runtime (no Mutex)
/// - `send` is synchronous and infallible; its matching step runs inside one
///   borrow, so no other operation's bookkeeping can interleave with it
/// - `recv` suspends via a waker-registered slot; dropping the future
///   cancels the slot, so abandoned receivers do not pin the queue
pub struct MatchingQueue<T> {
    inner: RefCell<MatchingQueueInner<T>>,
    config: QueueConfig,
}

impl<T> Default for MatchingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MatchingQueue<T> {
    /// Create an unbounded queue.
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create a queue with an explicit capacity configuration.
    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            inner: RefCell::new(MatchingQueueInner::default()),
            config,
        }
    }

    /// Send a message.
    ///
    /// Resolves the oldest suspended receiver if one exists, otherwise
    /// buffers the message. Completes synchronously and never fails; a
    /// bounded queue applies its [`OverflowPolicy`] instead of rejecting.
    pub fn send(&self, message: T) {
        let mut inner = self.inner.borrow_mut();
        inner.stats.messages_sent += 1;

        let Some(message) = match_or_return(&mut inner, message) else {
            return;
        };

        // No receiver waiting: buffer, subject to capacity.
        if let Some(capacity) = self.config.capacity {
            if inner.messages.len() >= capacity {
                match self.config.overflow {
                    OverflowPolicy::DropNewest => {
                        inner.stats.messages_dropped += 1;
                        tracing::warn!(capacity, "queue full, dropping incoming message");
                        return;
                    }
                    OverflowPolicy::DropOldest => {
                        inner.messages.pop_front();
                        inner.stats.messages_dropped += 1;
                        tracing::warn!(capacity, "queue full, dropping oldest message");
                    }
                }
            }
        }
        inner.messages.push_back(message);
        inner.stats.messages_queued += 1;
    }

    /// Receive the next message, suspending until one is available.
    ///
    /// Returns immediately if a message is buffered. Otherwise the returned
    /// future registers as a waiter on first poll and resolves when a future
    /// `send` matches it. Dropping the future before resolution deregisters
    /// the waiter.
    pub fn recv(&self) -> RecvFuture<'_, T> {
        RecvFuture {
            queue: self,
            slot: None,
        }
    }

    /// Take the next buffered message without suspending.
    ///
    /// Returns `None` if the buffer is empty.
    pub fn try_recv(&self) -> Option<T> {
        self.inner.borrow_mut().messages.pop_front()
    }

    /// Number of buffered messages.
    pub fn len(&self) -> usize {
        self.inner.borrow().messages.len()
    }

    /// Whether the message buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().messages.is_empty()
    }

    /// Number of suspended receivers still awaiting a message.
    ///
    /// Cancelled waiters are not counted.
    pub fn waiter_count(&self) -> usize {
        self.inner
            .borrow()
            .waiters
            .iter()
            .filter(|slot| !slot.borrow().cancelled)
            .count()
    }

    /// Total messages handed to `send`.
    pub fn messages_sent(&self) -> u64 {
        self.inner.borrow().stats.messages_sent
    }

    /// Total messages that entered the buffer.
    pub fn messages_queued(&self) -> u64 {
        self.inner.borrow().stats.messages_queued
    }

    /// Total messages discarded by the overflow policy.
    pub fn messages_dropped(&self) -> u64 {
        self.inner.borrow().stats.messages_dropped
    }

    /// Total receivers resolved directly by a matching send.
    pub fn receivers_resolved(&self) -> u64 {
        self.inner.borrow().stats.receivers_resolved
    }

    /// Register a fresh waiter slot at the tail of the waiter queue.
    fn register_waiter(&self) -> SharedSlot<T> {
        let slot = RecvSlot::new();
        self.inner.borrow_mut().waiters.push_back(Rc::clone(&slot));
        slot
    }

    /// Put a message that was delivered but never observed back in front.
    ///
    /// Used when a receive future is dropped after a sender already resolved
    /// its slot. The message re-runs the matching step so it goes to the next
    /// live waiter, or to the head of the buffer, preserving its original
    /// position relative to later sends. Capacity is not enforced here; the
    /// message was already accepted once.
    pub(crate) fn reinsert(&self, message: T) {
        let mut inner = self.inner.borrow_mut();
        if let Some(message) = match_or_return(&mut inner, message) {
            inner.messages.push_front(message);
        }
    }
}

/// Matching step shared by `send` and `reinsert`.
///
/// Pops waiters from the front, discarding cancelled ones, until a live slot
/// is found. Returns the message back if no live waiter exists.
fn match_or_return<T>(inner: &mut MatchingQueueInner<T>, message: T) -> Option<T> {
    while let Some(slot) = inner.waiters.pop_front() {
        let mut slot = slot.borrow_mut();
        if slot.cancelled {
            tracing::trace!("discarding cancelled waiter during match");
            continue;
        }
        slot.resolve(message);
        inner.stats.receivers_resolved += 1;
        return None;
    }
    Some(message)
}

/// Future returned by [`MatchingQueue::recv`].
///
/// Registers lazily: the waiter slot is created on the first poll that finds
/// no buffered message. Dropping a pending future cancels its slot; if a
/// message was already delivered to the slot, it is pushed back so the next
/// receiver gets it instead of it being lost.
pub struct RecvFuture<'a, T> {
    queue: &'a MatchingQueue<T>,
    slot: Option<SharedSlot<T>>,
}

impl<T> Future for RecvFuture<'_, T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        // Already registered: check whether a sender resolved the slot.
        if let Some(slot) = &this.slot {
            let mut guard = slot.borrow_mut();
            if let Some(value) = guard.value.take() {
                drop(guard);
                this.slot = None;
                return Poll::Ready(value);
            }
            guard.waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        // First poll: fast path through the buffer.
        if let Some(message) = this.queue.try_recv() {
            return Poll::Ready(message);
        }

        // Nothing buffered: suspend as a waiter.
        let slot = this.queue.register_waiter();
        slot.borrow_mut().waker = Some(cx.waker().clone());
        this.slot = Some(slot);
        Poll::Pending
    }
}

impl<T> Drop for RecvFuture<'_, T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            let mut guard = slot.borrow_mut();
            guard.cancelled = true;
            guard.waker = None;
            if let Some(value) = guard.value.take() {
                drop(guard);
                tracing::debug!("receive dropped after delivery, requeueing message");
                self.queue.reinsert(value);
            } else {
                tracing::trace!("pending receive dropped, waiter cancelled");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::rc::Rc;
    use std::task::{Context, Poll};

    use futures::task::noop_waker;

    use super::*;

    #[tokio::test]
    async fn test_send_then_recv_fifo() {
        let queue = MatchingQueue::new();

        queue.send(1);
        queue.send(2);
        queue.send(3);

        assert_eq!(queue.recv().await, 1);
        assert_eq!(queue.recv().await, 2);
        assert_eq!(queue.recv().await, 3);
    }

    #[tokio::test]
    async fn test_recv_then_send() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let queue = Rc::new(MatchingQueue::new());

                let handle = tokio::task::spawn_local({
                    let queue = Rc::clone(&queue);
                    async move { queue.recv().await }
                });

                // Let the receiver register before sending.
                tokio::task::yield_now().await;
                assert_eq!(queue.waiter_count(), 1);

                queue.send("hello");
                assert_eq!(handle.await.expect("receiver task"), "hello");
            })
            .await;
    }

    #[tokio::test]
    async fn test_waiters_resolved_in_arrival_order() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let queue = Rc::new(MatchingQueue::new());

                let first = tokio::task::spawn_local({
                    let queue = Rc::clone(&queue);
                    async move { queue.recv().await }
                });
                tokio::task::yield_now().await;
                let second = tokio::task::spawn_local({
                    let queue = Rc::clone(&queue);
                    async move { queue.recv().await }
                });
                tokio::task::yield_now().await;
                assert_eq!(queue.waiter_count(), 2);

                queue.send(1);
                queue.send(2);

                assert_eq!(first.await.expect("first receiver"), 1);
                assert_eq!(second.await.expect("second receiver"), 2);
            })
            .await;
    }

    #[test]
    fn test_try_recv_empty() {
        let queue: MatchingQueue<i32> = MatchingQueue::new();
        assert_eq!(queue.try_recv(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_mutual_exclusion_invariant() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let queue = MatchingQueue::new();

        // Receiver first: waiter queue grows, buffer stays empty.
        let mut recv = Box::pin(queue.recv());
        assert!(recv.as_mut().poll(&mut cx).is_pending());
        assert_eq!(queue.waiter_count(), 1);
        assert_eq!(queue.len(), 0);

        // Send resolves the waiter without touching the buffer.
        queue.send(10);
        assert_eq!(queue.waiter_count(), 0);
        assert_eq!(queue.len(), 0);
        assert_eq!(recv.as_mut().poll(&mut cx), Poll::Ready(10));

        // Sender first: buffer grows, waiter queue stays empty.
        queue.send(20);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.waiter_count(), 0);
        assert_eq!(queue.try_recv(), Some(20));
    }

    #[test]
    fn test_capacity_drop_newest() {
        let queue = MatchingQueue::with_config(QueueConfig::bounded(2, OverflowPolicy::DropNewest));

        queue.send(1);
        queue.send(2);
        queue.send(3);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.messages_dropped(), 1);
        assert_eq!(queue.try_recv(), Some(1));
        assert_eq!(queue.try_recv(), Some(2));
        assert_eq!(queue.try_recv(), None);
    }

    #[test]
    fn test_capacity_drop_oldest() {
        let queue = MatchingQueue::with_config(QueueConfig::bounded(2, OverflowPolicy::DropOldest));

        queue.send(1);
        queue.send(2);
        queue.send(3);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.messages_dropped(), 1);
        assert_eq!(queue.try_recv(), Some(2));
        assert_eq!(queue.try_recv(), Some(3));
    }

    #[test]
    fn test_cancelled_waiter_skipped() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let queue = MatchingQueue::new();

        let mut abandoned = Box::pin(queue.recv());
        assert!(abandoned.as_mut().poll(&mut cx).is_pending());
        assert_eq!(queue.waiter_count(), 1);

        drop(abandoned);
        assert_eq!(queue.waiter_count(), 0);

        // The send must not vanish into the abandoned slot.
        queue.send(42);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.try_recv(), Some(42));
    }

    #[test]
    fn test_drop_after_delivery_requeues() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let queue = MatchingQueue::new();

        let mut first = Box::pin(queue.recv());
        assert!(first.as_mut().poll(&mut cx).is_pending());

        // Sender resolves the slot, but the future is dropped before it
        // observes the value.
        queue.send(7);
        drop(first);

        // The message goes to the next receiver instead of being lost.
        assert_eq!(queue.try_recv(), Some(7));
    }

    #[test]
    fn test_requeue_matches_next_live_waiter() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let queue = MatchingQueue::new();

        let mut first = Box::pin(queue.recv());
        assert!(first.as_mut().poll(&mut cx).is_pending());
        let mut second = Box::pin(queue.recv());
        assert!(second.as_mut().poll(&mut cx).is_pending());

        queue.send(5);
        drop(first);

        // The requeued message flows to the second waiter, not the buffer.
        assert_eq!(queue.len(), 0);
        assert_eq!(second.as_mut().poll(&mut cx), Poll::Ready(5));
    }

    #[test]
    fn test_stats_counters() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let queue = MatchingQueue::new();

        queue.send(1);
        assert_eq!(queue.messages_sent(), 1);
        assert_eq!(queue.messages_queued(), 1);
        assert_eq!(queue.receivers_resolved(), 0);

        assert_eq!(queue.try_recv(), Some(1));

        let mut recv = Box::pin(queue.recv());
        assert!(recv.as_mut().poll(&mut cx).is_pending());
        queue.send(2);

        assert_eq!(queue.messages_sent(), 2);
        assert_eq!(queue.messages_queued(), 1);
        assert_eq!(queue.receivers_resolved(), 1);
        assert_eq!(queue.messages_dropped(), 0);
    }

    #[tokio::test]
    async fn test_interleaved_exactly_once() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let queue = Rc::new(MatchingQueue::new());

                // Mix of buffered sends and suspended receivers.
                queue.send(1);

                let first = tokio::task::spawn_local({
                    let queue = Rc::clone(&queue);
                    async move { queue.recv().await }
                });
                let second = tokio::task::spawn_local({
                    let queue = Rc::clone(&queue);
                    async move { queue.recv().await }
                });
                tokio::task::yield_now().await;

                queue.send(2);

                let mut seen = vec![
                    first.await.expect("first receiver"),
                    second.await.expect("second receiver"),
                ];
                seen.sort_unstable();
                assert_eq!(seen, vec![1, 2]);

                // Nothing left over in either direction.
                assert!(queue.is_empty());
                assert_eq!(queue.waiter_count(), 0);
            })
            .await;
    }
}
