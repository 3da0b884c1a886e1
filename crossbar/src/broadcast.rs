//! BroadcastQueue: one send satisfies every currently suspended receiver.
//!
//! Wraps a [`MatchingQueue`] with a separate watcher set. A `send` first fans
//! the message out to every watcher registered at that moment, in
//! registration order; only when no watcher was live does the message fall
//! back to ordinary point-to-point buffering, so a receiver arriving later
//! still gets it.
//!
//! Suspended broadcast receivers register in the watcher set only, never in
//! the inner queue's waiter list. A single registration point means a single
//! resolution path: no receiver can be woken twice by racing satisfiers.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::queue::{MatchingQueue, QueueConfig, RecvSlot, SharedSlot};

/// Fan-out FIFO channel core.
///
/// `T: Clone` because one send may resolve many receivers.
pub struct BroadcastQueue<T: Clone> {
    /// Point-to-point queue used as the fallback buffer.
    inner: MatchingQueue<T>,

    /// Receivers awaiting the next send, in registration order.
    ///
    /// Distinct from the inner queue's waiter list: entries here are resolved
    /// by *every* send, not matched one-to-one.
    watchers: RefCell<VecDeque<SharedSlot<T>>>,
}

impl<T: Clone> Default for BroadcastQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> BroadcastQueue<T> {
    /// Create an unbounded broadcast queue.
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create a broadcast queue with an explicit capacity configuration.
    ///
    /// The capacity applies to the fallback buffer; the watcher set is only
    /// bounded by the number of suspended receivers.
    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            inner: MatchingQueue::with_config(config),
            watchers: RefCell::new(VecDeque::new()),
        }
    }

    /// Send a message to every currently suspended receiver.
    ///
    /// Drains the watcher set registered before this call, resolving each
    /// live watcher with a clone of `message` in registration order. A
    /// watcher registered during or after this call waits for the next send.
    /// If no watcher was live, the message falls back to the inner queue so
    /// a later receive picks it up.
    pub fn send(&self, message: T) {
        // Snapshot the drain before resolving: watchers registered by woken
        // tasks must wait for the next send.
        let drained: Vec<SharedSlot<T>> = self.watchers.borrow_mut().drain(..).collect();

        let mut resolved = 0usize;
        for slot in drained {
            let mut slot = slot.borrow_mut();
            if slot.cancelled {
                continue;
            }
            slot.resolve(message.clone());
            resolved += 1;
        }

        if resolved == 0 {
            self.inner.send(message);
        } else {
            tracing::trace!(resolved, "broadcast fanned out");
        }
    }

    /// Receive the next message.
    ///
    /// A message already buffered by a watcher-less send resolves
    /// immediately (point-to-point path). Otherwise the future registers in
    /// the watcher set and resolves on the next send.
    pub fn recv(&self) -> BroadcastRecvFuture<'_, T> {
        BroadcastRecvFuture {
            queue: self,
            slot: None,
        }
    }

    /// Take the next buffered message without suspending.
    pub fn try_recv(&self) -> Option<T> {
        self.inner.try_recv()
    }

    /// Number of buffered messages awaiting a receiver.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the fallback buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of receivers suspended awaiting the next send.
    ///
    /// Cancelled watchers are not counted.
    pub fn watcher_count(&self) -> usize {
        self.watchers
            .borrow()
            .iter()
            .filter(|slot| !slot.borrow().cancelled)
            .count()
    }

    /// Register a fresh watcher slot at the tail of the watcher set.
    fn register_watcher(&self) -> SharedSlot<T> {
        let slot = RecvSlot::new();
        self.watchers.borrow_mut().push_back(Rc::clone(&slot));
        slot
    }
}

/// Future returned by [`BroadcastQueue::recv`].
pub struct BroadcastRecvFuture<'a, T: Clone> {
    queue: &'a BroadcastQueue<T>,
    slot: Option<SharedSlot<T>>,
}

impl<T: Clone> Future for BroadcastRecvFuture<'_, T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        // Already registered: check whether a send resolved the slot.
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

        // First poll: point-to-point fast path through the fallback buffer.
        if let Some(message) = this.queue.try_recv() {
            return Poll::Ready(message);
        }

        // Nothing buffered: suspend as a watcher. The inner queue's waiter
        // list is deliberately bypassed; the next send is the sole satisfier.
        let slot = this.queue.register_watcher();
        slot.borrow_mut().waker = Some(cx.waker().clone());
        this.slot = Some(slot);
        Poll::Pending
    }
}

impl<T: Clone> Drop for BroadcastRecvFuture<'_, T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            let mut guard = slot.borrow_mut();
            guard.cancelled = true;
            guard.waker = None;
            if let Some(value) = guard.value.take() {
                drop(guard);
                // This watcher's copy goes back to the fallback buffer so a
                // later point-to-point receive sees it.
                tracing::debug!("broadcast receive dropped after delivery, requeueing message");
                self.queue.inner.reinsert(value);
            } else {
                tracing::trace!("pending broadcast receive dropped, watcher cancelled");
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
    async fn test_one_send_resolves_all_watchers() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let queue = Rc::new(BroadcastQueue::new());

                let handles: Vec<_> = (0..3)
                    .map(|_| {
                        tokio::task::spawn_local({
                            let queue = Rc::clone(&queue);
                            async move { queue.recv().await }
                        })
                    })
                    .collect();

                tokio::task::yield_now().await;
                assert_eq!(queue.watcher_count(), 3);

                queue.send("tick");

                for handle in handles {
                    assert_eq!(handle.await.expect("watcher task"), "tick");
                }
                assert_eq!(queue.watcher_count(), 0);
            })
            .await;
    }

    #[test]
    fn test_late_watcher_waits_for_next_send() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let queue = BroadcastQueue::new();

        let mut first = Box::pin(queue.recv());
        assert!(first.as_mut().poll(&mut cx).is_pending());

        queue.send(1);
        assert_eq!(first.as_mut().poll(&mut cx), Poll::Ready(1));

        // Registered strictly after the send: must not see 1.
        let mut second = Box::pin(queue.recv());
        assert!(second.as_mut().poll(&mut cx).is_pending());

        queue.send(2);
        assert_eq!(second.as_mut().poll(&mut cx), Poll::Ready(2));
    }

    #[test]
    fn test_no_watchers_falls_back_to_buffer() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let queue = BroadcastQueue::new();

        queue.send("late");
        assert_eq!(queue.len(), 1);

        let mut recv = Box::pin(queue.recv());
        assert_eq!(recv.as_mut().poll(&mut cx), Poll::Ready("late"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_buffered_messages_drain_before_watching() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let queue = BroadcastQueue::new();

        queue.send(1);
        queue.send(2);

        let mut first = Box::pin(queue.recv());
        let mut second = Box::pin(queue.recv());
        let mut third = Box::pin(queue.recv());

        assert_eq!(first.as_mut().poll(&mut cx), Poll::Ready(1));
        assert_eq!(second.as_mut().poll(&mut cx), Poll::Ready(2));
        assert!(third.as_mut().poll(&mut cx).is_pending());
        assert_eq!(queue.watcher_count(), 1);
    }

    #[test]
    fn test_cancelled_watcher_skipped() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let queue = BroadcastQueue::new();

        let mut abandoned = Box::pin(queue.recv());
        assert!(abandoned.as_mut().poll(&mut cx).is_pending());
        let mut live = Box::pin(queue.recv());
        assert!(live.as_mut().poll(&mut cx).is_pending());

        drop(abandoned);
        assert_eq!(queue.watcher_count(), 1);

        queue.send(9);
        assert_eq!(live.as_mut().poll(&mut cx), Poll::Ready(9));
        // The live watcher consumed the send; nothing buffered.
        assert!(queue.is_empty());
    }

    #[test]
    fn test_all_watchers_cancelled_falls_back() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let queue = BroadcastQueue::new();

        let mut abandoned = Box::pin(queue.recv());
        assert!(abandoned.as_mut().poll(&mut cx).is_pending());
        drop(abandoned);

        queue.send(3);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.try_recv(), Some(3));
    }

    #[test]
    fn test_drop_after_delivery_requeues_copy() {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let queue = BroadcastQueue::new();

        let mut dropped = Box::pin(queue.recv());
        assert!(dropped.as_mut().poll(&mut cx).is_pending());
        let mut kept = Box::pin(queue.recv());
        assert!(kept.as_mut().poll(&mut cx).is_pending());

        queue.send(5);
        drop(dropped);

        // The kept watcher got its clone; the dropped watcher's copy landed
        // in the fallback buffer.
        assert_eq!(kept.as_mut().poll(&mut cx), Poll::Ready(5));
        assert_eq!(queue.try_recv(), Some(5));
    }
}
