// MIT License - Copyright (c) 2021 TJForc
// Synchronous message dispatch

use std::fmt;
use std::sync::RwLock;

use tracing::trace;

/// Handle returned by [`MessageBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<T> = Box<dyn Fn(&T) + Send + Sync>;

struct Subscribers<T> {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler<T>)>,
}

/// Synchronous publish/subscribe bus.
///
/// `publish` calls every registered handler, in registration order, on the
/// caller's thread. There is no queueing and no retry. Handlers must not
/// subscribe or unsubscribe from inside a callback.
pub struct MessageBus<T> {
    subscribers: RwLock<Subscribers<T>>,
}

impl<T> MessageBus<T> {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Subscribers {
                next_id: 0,
                handlers: Vec::new(),
            }),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = SubscriptionId(subs.next_id);
        subs.next_id += 1;
        subs.handlers.push((id, Box::new(handler)));
        id
    }

    /// Returns false if the subscription was not found.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = subs.handlers.len();
        subs.handlers.retain(|(sub_id, _)| *sub_id != id);
        subs.handlers.len() != before
    }

    /// Deliver `message` to all subscribers. Returns how many were called.
    pub fn publish(&self, message: &T) -> usize {
        let subs = self
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (_, handler) in &subs.handlers {
            handler(message);
        }
        trace!("Published message to {} subscribers", subs.handlers.len());
        subs.handlers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .handlers
            .len()
    }
}

impl<T> Default for MessageBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MessageBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
