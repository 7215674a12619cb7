//! Per-session FIFO event queue, drained by the next long poll.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;
use tokio::sync::Notify;

/// A single event awaiting delivery to the next long poll.
///
/// Ownership of `payload` is tracked by `serde_json::Value` itself, so there
/// is no separate owned/borrowed flag to carry alongside it.
#[derive(Debug, Clone)]
pub struct Event {
    pub payload: JsonValue,
}

impl Event {
    pub fn new(payload: JsonValue) -> Self {
        Self { payload }
    }

    /// The statically-known keep-alive event returned on long-poll timeout.
    pub fn keepalive() -> Self {
        Self {
            payload: serde_json::json!({"janus": "keepalive"}),
        }
    }
}

/// Ordered FIFO of pending events for one session, with a `Notify` so the
/// long-poll responder can wait without busy-polling.
#[derive(Debug, Default)]
pub struct EventQueue {
    inner: Mutex<VecDeque<Event>>,
    notify: Notify,
}

impl EventQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        })
    }

    /// Enqueues an event and wakes any waiting long poll.
    pub fn push(&self, event: Event) {
        self.inner.lock().expect("event queue mutex poisoned").push_back(event);
        self.notify.notify_one();
    }

    /// Pops the head of the queue without blocking.
    pub fn try_pop(&self) -> Option<Event> {
        self.inner.lock().expect("event queue mutex poisoned").pop_front()
    }

    /// Waits until an event becomes available. Callers enforce the 30s
    /// ceiling and shutdown-signal cancellation themselves (see
    /// `http::longpoll`).
    pub async fn notified(&self) {
        self.notify.notified().await
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("event queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let queue = EventQueue::new();
        queue.push(Event::new(serde_json::json!({"n": 1})));
        queue.push(Event::new(serde_json::json!({"n": 2})));
        queue.push(Event::new(serde_json::json!({"n": 3})));

        assert_eq!(queue.try_pop().unwrap().payload["n"], 1);
        assert_eq!(queue.try_pop().unwrap().payload["n"], 2);
        assert_eq!(queue.try_pop().unwrap().payload["n"], 3);
        assert!(queue.try_pop().is_none());
    }

    #[tokio::test]
    async fn notifies_waiters_on_push() {
        let queue = EventQueue::new();
        let queue2 = queue.clone();

        let waiter = tokio::spawn(async move {
            queue2.notified().await;
            queue2.try_pop()
        });

        tokio::task::yield_now().await;
        queue.push(Event::new(serde_json::json!({"ok": true})));

        let popped = waiter.await.unwrap();
        assert_eq!(popped.unwrap().payload["ok"], true);
    }
}
