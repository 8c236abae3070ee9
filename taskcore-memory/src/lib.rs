//! In-memory adapters for the `taskcore` kernel
//!
//! This crate provides in-memory implementations of the `EventStore` and
//! `EventBus` traits from the taskcore crate, useful for testing and
//! development scenarios where persistence is not required.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, trace};

use taskcore::errors::{EventStoreError, EventStoreResult};
use taskcore::event::{EventKind, KernelEvent};
use taskcore::event_store::{EventStore, EventToWrite, ExpectedVersion, StoredEvent};
use taskcore::types::{AggregateId, EventVersion, Timestamp};
use taskcore::{EventBus, EventContext, EventSubscriber};

/// Thread-safe in-memory event store for testing
///
/// Histories live in a single map keyed by aggregate id; the current
/// version of an aggregate is the version of its last stored event. All
/// version preconditions are verified before anything is written, so a
/// failed append leaves every history untouched.
pub struct InMemoryEventStore<E>
where
    E: Send + Sync + Clone + 'static,
{
    histories: RwLock<HashMap<AggregateId, Vec<StoredEvent<E>>>>,
}

impl<E> InMemoryEventStore<E>
where
    E: Send + Sync + Clone + 'static,
{
    /// Create a new empty in-memory event store
    pub fn new() -> Self {
        Self {
            histories: RwLock::new(HashMap::new()),
        }
    }

    /// Number of events recorded across all aggregates.
    pub fn recorded_event_count(&self) -> usize {
        let histories = self.histories.read().expect("RwLock poisoned");
        histories.values().map(Vec::len).sum()
    }
}

impl<E> Default for InMemoryEventStore<E>
where
    E: Send + Sync + Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E> EventStore for InMemoryEventStore<E>
where
    E: Send + Sync + Clone + 'static,
{
    type Event = E;

    async fn history(
        &self,
        aggregate_id: &AggregateId,
    ) -> EventStoreResult<Vec<StoredEvent<Self::Event>>> {
        let histories = self.histories.read().expect("RwLock poisoned");
        Ok(histories.get(aggregate_id).cloned().unwrap_or_default())
    }

    async fn append(
        &self,
        aggregate_id: &AggregateId,
        events: Vec<EventToWrite<Self::Event>>,
        expected: ExpectedVersion,
    ) -> EventStoreResult<Vec<StoredEvent<Self::Event>>> {
        let mut histories = self.histories.write().expect("RwLock poisoned");

        let current_version = histories
            .get(aggregate_id)
            .and_then(|history| history.last())
            .map_or_else(EventVersion::initial, |stored| stored.version);

        // Verify the precondition before touching any history
        match expected {
            ExpectedVersion::New => {
                if histories
                    .get(aggregate_id)
                    .is_some_and(|history| !history.is_empty())
                {
                    return Err(EventStoreError::VersionConflict {
                        aggregate_id: aggregate_id.clone(),
                        expected: EventVersion::initial(),
                        current: current_version,
                    });
                }
            }
            ExpectedVersion::Exact(expected_version) => {
                if current_version != expected_version {
                    return Err(EventStoreError::VersionConflict {
                        aggregate_id: aggregate_id.clone(),
                        expected: expected_version,
                        current: current_version,
                    });
                }
            }
            ExpectedVersion::Any => {
                // No check needed
            }
        }

        let history = histories.entry(aggregate_id.clone()).or_default();
        let start = history.len();
        let mut version = current_version;

        for event in events {
            version = version.next();
            history.push(StoredEvent {
                event_id: event.event_id,
                aggregate_id: aggregate_id.clone(),
                version,
                recorded_at: Timestamp::now(),
                caused_by: event.caused_by,
                payload: event.payload,
            });
        }

        Ok(history[start..].to_vec())
    }

    async fn current_version(&self, aggregate_id: &AggregateId) -> EventStoreResult<EventVersion> {
        let histories = self.histories.read().expect("RwLock poisoned");
        Ok(histories
            .get(aggregate_id)
            .and_then(|history| history.last())
            .map_or_else(EventVersion::initial, |stored| stored.version))
    }
}

/// In-process event bus delivering to subscribers on the publisher's task
///
/// Subscribers register per event kind and receive deliveries sequentially
/// in registration order. Publication completes only after every interested
/// subscriber has handled the event, so by the time `publish` returns the
/// read side has caught up with the published event.
#[derive(Default)]
pub struct InMemoryEventBus {
    subscribers: RwLock<HashMap<EventKind, Vec<Arc<dyn EventSubscriber>>>>,
}

impl InMemoryEventBus {
    /// Create a new bus with no subscribers
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn subscribe(&self, kinds: &[EventKind], subscriber: Arc<dyn EventSubscriber>) {
        {
            let mut subscribers = self.subscribers.write().expect("RwLock poisoned");
            for kind in kinds {
                subscribers
                    .entry(*kind)
                    .or_default()
                    .push(Arc::clone(&subscriber));
            }
        }
        debug!(
            subscriber = subscriber.name(),
            kinds = kinds.len(),
            "subscriber registered"
        );
    }

    async fn publish(&self, event: &StoredEvent<KernelEvent>, context: &EventContext) {
        let kind = event.payload().kind();
        // Clone the interested list so no lock is held across deliveries
        let interested: Vec<Arc<dyn EventSubscriber>> = {
            let subscribers = self.subscribers.read().expect("RwLock poisoned");
            subscribers.get(&kind).cloned().unwrap_or_default()
        };

        for subscriber in interested {
            trace!(subscriber = subscriber.name(), %kind, "delivering event");
            subscriber.on_event(event, context).await;
        }
    }
}
