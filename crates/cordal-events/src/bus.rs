//! Event Bus (C6): in-process pub/sub keyed by event type.
//!
//! Grounded on the teacher's `EventMatcher` two-level index
//! (`fraiseql_observers::matcher`), narrowed to one level (event type only,
//! no entity type) since this spec's rules key purely on `eventType`.

use super::event::Event;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// Reacts to published events of a type it has subscribed to.
///
/// Implementations must not block for long; `publish_sync` calls every
/// matching subscriber on the publisher's own task.
pub trait Subscriber: Send + Sync {
    /// Handle one event. Panics here are caught and logged by the bus so
    /// one broken subscriber cannot prevent others from firing.
    fn handle(&self, event: &Event);
}

/// In-process publish/subscribe bus, keyed by `Event::event_type`.
///
/// `publish_sync` dispatches on the caller's task; `publish_async` enqueues
/// onto a bounded channel drained by a fixed-concurrency worker pool,
/// dropping and logging on overflow rather than blocking the publisher
/// (spec §9's back-pressure note).
pub struct EventBus {
    subscribers: Arc<DashMap<String, Vec<Arc<dyn Subscriber>>>>,
    sender: mpsc::Sender<Event>,
}

impl EventBus {
    /// Build a bus whose async path queues at most `queue_capacity` pending
    /// events and runs at most `worker_concurrency` handlers at once.
    #[must_use]
    pub fn new(queue_capacity: usize, worker_concurrency: usize) -> Self {
        let subscribers: Arc<DashMap<String, Vec<Arc<dyn Subscriber>>>> = Arc::new(DashMap::new());
        let (sender, mut receiver) = mpsc::channel::<Event>(queue_capacity.max(1));
        let worker_subscribers = subscribers.clone();
        let semaphore = Arc::new(Semaphore::new(worker_concurrency.max(1)));

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let subscribers = worker_subscribers.clone();
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                tokio::spawn(async move {
                    let _permit = permit;
                    dispatch(&subscribers, &event);
                });
            }
        });

        Self { subscribers, sender }
    }

    /// Register `subscriber` against `event_type`.
    pub fn subscribe(&self, event_type: impl Into<String>, subscriber: Arc<dyn Subscriber>) {
        self.subscribers.entry(event_type.into()).or_default().push(subscriber);
    }

    /// Dispatch `event` to every matching subscriber on the caller's own task.
    pub fn publish_sync(&self, event: &Event) {
        dispatch(&self.subscribers, event);
    }

    /// Enqueue `event` for dispatch on the worker pool. Drops and logs if
    /// the queue is full rather than blocking the publisher.
    pub fn publish_async(&self, event: Event) {
        if let Err(err) = self.sender.try_send(event) {
            tracing::warn!(error = %err, "event bus queue full, dropping event");
        }
    }
}

fn dispatch(subscribers: &DashMap<String, Vec<Arc<dyn Subscriber>>>, event: &Event) {
    let Some(matching) = subscribers.get(&event.event_type) else {
        return;
    };
    for subscriber in matching.iter() {
        let subscriber = subscriber.clone();
        let event = event.clone();
        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| subscriber.handle(&event)));
        if outcome.is_err() {
            tracing::error!(event_type = %event.event_type, "subscriber panicked, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(Arc<AtomicUsize>);

    impl Subscriber for Counter {
        fn handle(&self, _event: &Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicker;

    impl Subscriber for Panicker {
        fn handle(&self, _event: &Event) {
            panic!("boom");
        }
    }

    #[test]
    fn publish_sync_calls_matching_subscribers_only() {
        let bus = EventBus::new(16, 2);
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe("a", Arc::new(Counter(count.clone())));
        bus.subscribe("b", Arc::new(Counter(count.clone())));

        bus.publish_sync(&Event::new("a"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn one_panicking_subscriber_does_not_block_others() {
        let bus = EventBus::new(16, 2);
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe("a", Arc::new(Panicker));
        bus.subscribe("a", Arc::new(Counter(count.clone())));

        bus.publish_sync(&Event::new("a"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
