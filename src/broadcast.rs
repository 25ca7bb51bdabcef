//! Fan-out of log lines to live subscribers.
//!
//! Each subscriber owns a bounded queue. [`Broadcaster::publish`] copies the
//! current registrations under a short lock and then awaits delivery to every
//! queue, so a full queue suspends the producer instead of dropping lines.
//! With no subscribers at all the line is discarded: late subscribers never
//! see lines produced before they registered.

use crate::stream::Subscription;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Identity of a registered subscriber.
pub type SubscriberId = u64;

/// Shared subscriber table.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<String>>>,
    next_id: AtomicU64,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<String>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, sender: mpsc::Sender<String>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, sender);
        id
    }

    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        self.lock().remove(&id).is_some()
    }

    fn snapshot(&self) -> Vec<(SubscriberId, mpsc::Sender<String>)> {
        self.lock()
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect()
    }
}

/// Multicasts each published line to every registered [`Subscription`].
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<Registry>,
    capacity: usize,
}

impl Broadcaster {
    /// Creates a broadcaster whose subscriber queues hold `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            capacity: capacity.max(1),
        }
    }

    /// Registers a new subscriber. Only lines published from now on are delivered.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.registry.insert(tx);
        debug!("Subscriber {} registered", id);
        Subscription::new(id, rx, Arc::downgrade(&self.registry))
    }

    /// Removes a subscriber; nothing is delivered to it afterwards.
    pub fn unsubscribe(&self, subscription: Subscription) {
        let id = subscription.id();
        self.registry.remove(id);
        drop(subscription);
        debug!("Subscriber {} unregistered", id);
    }

    /// Delivers `line` to every current subscriber and returns how many got it.
    ///
    /// Suspends while any subscriber's queue is full. Subscribers whose
    /// receiving side is gone are dropped from the table.
    pub async fn publish(&self, line: String) -> usize {
        let targets = self.registry.snapshot();
        if targets.is_empty() {
            trace!("No subscribers, discarding line");
            return 0;
        }

        let deliveries = targets.iter().map(|(id, sender)| {
            let line = line.clone();
            async move { (*id, sender.send(line).await.is_ok()) }
        });

        let mut delivered = 0;
        for (id, ok) in join_all(deliveries).await {
            if ok {
                delivered += 1;
            } else if self.registry.remove(id) {
                debug!("Subscriber {} went away, removed", id);
            }
        }
        delivered
    }

    /// Unregisters everyone; open subscriptions end once drained.
    pub fn shutdown(&self) {
        let mut subscribers = self.registry.lock();
        debug!("Shutting down broadcaster with {} subscribers", subscribers.len());
        subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().len()
    }
}
