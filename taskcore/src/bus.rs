//! Event publication and subscription contracts.
//!
//! After events are durably appended they are published, one at a time and
//! in history order per aggregate, to every subscriber registered for the
//! event's kind. The kernel never chooses a bus implementation; it is
//! handed one (the `taskcore-memory` crate ships the in-process bus used
//! by tests).

use std::sync::Arc;

use async_trait::async_trait;

use crate::enrichment::EventEnrichment;
use crate::event::{EventKind, KernelEvent};
use crate::event_store::StoredEvent;

/// Context delivered alongside one published event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventContext {
    /// Cross-aggregate enrichment computed just before publication.
    pub enrichment: EventEnrichment,
}

impl EventContext {
    /// Wraps an enrichment snapshot for delivery.
    pub const fn new(enrichment: EventEnrichment) -> Self {
        Self { enrichment }
    }
}

/// A consumer of published events.
///
/// Subscribers mutate only their own state during a delivery; they never
/// dispatch commands from inside one. Deliveries for a single aggregate
/// arrive in history order, so a subscriber may fold them without
/// reordering.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Subscriber name for logs.
    fn name(&self) -> &'static str;

    /// Delivers one published event with its context.
    async fn on_event(&self, event: &StoredEvent<KernelEvent>, context: &EventContext);
}

/// Fans published events out to registered subscribers.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Registers a subscriber for the given event kinds.
    async fn subscribe(&self, kinds: &[EventKind], subscriber: Arc<dyn EventSubscriber>);

    /// Delivers one event to every subscriber registered for its kind.
    ///
    /// Delivery failures are the bus's own concern; by the time an event is
    /// published it is already durably appended, so publication never fails
    /// the originating dispatch.
    async fn publish(&self, event: &StoredEvent<KernelEvent>, context: &EventContext);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_default_context_carries_default_enrichment() {
        let context = EventContext::default();
        assert_eq!(context.enrichment, EventEnrichment::default());
        assert!(!context.enrichment.task.exists());
    }

    #[test]
    fn new_wraps_the_given_enrichment() {
        let enrichment = EventEnrichment::default();
        let context = EventContext::new(enrichment.clone());
        assert_eq!(context.enrichment, enrichment);
    }
}
