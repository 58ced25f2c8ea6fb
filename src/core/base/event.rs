//! Minimal publish/subscribe backing each policy instance.
//!
//! The bus is a hot stream: publishing with no subscribers is a
//! constant-time no-op, and dispatch never runs under a policy's state
//! lock. Past events are not replayed to new subscribers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Receives every event published after subscription, in emission order.
///
/// Subscribers run on the publishing thread; a subscriber cannot affect the
/// caller path or its sibling subscribers.
pub trait EventSubscriber<E>: Send + Sync {
    fn on_event(&self, event: &E);
}

impl<E, F> EventSubscriber<E> for F
where
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        self(event)
    }
}

/// Single-producer-multi-consumer fanout for one policy instance.
pub struct EventBus<E> {
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber<E>>>>,
    // shadow of subscribers.len(), read on every publish
    subscriber_count: AtomicUsize,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        EventBus {
            subscribers: RwLock::new(Vec::new()),
            subscriber_count: AtomicUsize::new(0),
        }
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber<E>>) {
        let mut subscribers = self.subscribers.write().unwrap();
        subscribers.push(subscriber);
        self.subscriber_count
            .store(subscribers.len(), Ordering::SeqCst);
    }

    /// Removes a previously registered subscriber, matched by identity.
    /// Returns whether anything was removed.
    pub fn unsubscribe(&self, subscriber: &Arc<dyn EventSubscriber<E>>) -> bool {
        let mut subscribers = self.subscribers.write().unwrap();
        let before = subscribers.len();
        let target = Arc::as_ptr(subscriber) as *const ();
        subscribers.retain(|s| Arc::as_ptr(s) as *const () != target);
        self.subscriber_count
            .store(subscribers.len(), Ordering::SeqCst);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::SeqCst)
    }

    /// Delivers `event` to every current subscriber.
    ///
    /// The subscriber list is snapshotted first, so no bus lock is held
    /// while subscribers run; a subscriber is free to call back into the
    /// owning policy or the bus itself. Events published by one thread
    /// reach each subscriber in publish order; concurrent publishers race.
    pub fn publish(&self, event: &E) {
        if self.subscriber_count.load(Ordering::SeqCst) == 0 {
            return;
        }
        let subscribers = self.subscribers.read().unwrap().clone();
        for subscriber in &subscribers {
            subscriber.on_event(event);
        }
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Bounded subscriber keeping the last `capacity` events in arrival order;
/// the oldest event is dropped on overflow.
#[derive(Debug)]
pub struct CircularEventConsumer<E> {
    capacity: usize,
    buffer: Mutex<VecDeque<E>>,
}

impl<E: Clone + Send> CircularEventConsumer<E> {
    pub fn new(capacity: usize) -> Self {
        CircularEventConsumer {
            capacity,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().unwrap().is_empty()
    }

    /// Copies the retained events, oldest first.
    pub fn snapshot(&self) -> Vec<E> {
        self.buffer.lock().unwrap().iter().cloned().collect()
    }
}

impl<E: Clone + Send + Sync> EventSubscriber<E> for CircularEventConsumer<E> {
    fn on_event(&self, event: &E) {
        let mut buffer = self.buffer.lock().unwrap();
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(event.clone());
    }
}
