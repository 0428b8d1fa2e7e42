use async_trait::async_trait;
use log::trace;
use std::sync::{Arc, PoisonError, RwLock};

use super::types::BusEvent;

/// Receiver of events published on the [`EventBus`].
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn handle(&self, event: &BusEvent);
}

/// Shared in-process event bus.
///
/// `publish` delivers to every subscriber in subscription order and returns
/// once all of them have handled the event, so a publisher observes the
/// effects of its own events. Events from one publisher keep their order.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
    }

    pub async fn publish(&self, event: BusEvent) {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        trace!("Publishing {:?} to {} subscriber(s)", event, subscribers.len());
        for subscriber in subscribers {
            subscriber.handle(&event).await;
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
