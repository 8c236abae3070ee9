//! The event log store contract consumed by the kernel.
//!
//! The kernel never chooses a storage backend; it is handed an
//! implementation of [`EventStore`] (the `taskcore-memory` crate ships the
//! in-memory one used by tests). The contract is small: read an aggregate's
//! ordered history, and append new events under an expected-version check.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::EventStoreResult;
use crate::types::{AggregateId, CommandId, EventId, EventVersion, Timestamp};

/// An event as recorded in an aggregate's history.
///
/// The store stamps `version` and `recorded_at` at append time; everything
/// else is supplied by the writer. Once written a stored event is
/// immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent<E> {
    /// Globally unique, time-ordered identity of this event.
    pub event_id: EventId,
    /// The aggregate whose history this event belongs to.
    pub aggregate_id: AggregateId,
    /// Position in the aggregate's history; the first event has version 1.
    pub version: EventVersion,
    /// When the store recorded the event.
    pub recorded_at: Timestamp,
    /// The command whose handling emitted this event.
    pub caused_by: CommandId,
    /// The domain payload.
    pub payload: E,
}

impl<E> StoredEvent<E> {
    /// Returns a reference to the domain payload.
    pub const fn payload(&self) -> &E {
        &self.payload
    }
}

/// A not-yet-recorded event handed to [`EventStore::append`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventToWrite<E> {
    /// Identity minted by the writer.
    pub event_id: EventId,
    /// The command whose handling emitted this event.
    pub caused_by: CommandId,
    /// The domain payload.
    pub payload: E,
}

impl<E> EventToWrite<E> {
    /// Creates a write request with a freshly minted event id.
    pub fn new(caused_by: CommandId, payload: E) -> Self {
        Self {
            event_id: EventId::new(),
            caused_by,
            payload,
        }
    }
}

/// The version precondition an append is made under.
///
/// Appending with a precondition that no longer holds fails with
/// [`EventStoreError::VersionConflict`](crate::errors::EventStoreError::VersionConflict)
/// and must leave the stored history untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedVersion {
    /// The aggregate must not exist yet.
    New,
    /// The aggregate must be at exactly this version.
    Exact(EventVersion),
    /// No precondition; append after whatever is current.
    Any,
}

impl std::fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Exact(version) => write!(f, "exactly {version}"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// Ordered, per-aggregate event log with optimistic version checks.
///
/// Implementations must guarantee: histories are returned in append order;
/// a successful append assigns consecutive versions starting right after
/// the current one (the first event of a fresh aggregate gets version 1);
/// a failed version check mutates nothing.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// The domain payload type recorded in this store.
    type Event: Clone + Send + Sync;

    /// Returns the full ordered history of an aggregate.
    ///
    /// An aggregate with no recorded events yields an empty vector, not an
    /// error: "no history yet" is a normal state during creation.
    async fn history(
        &self,
        aggregate_id: &AggregateId,
    ) -> EventStoreResult<Vec<StoredEvent<Self::Event>>>;

    /// Appends events to an aggregate's history under a version check.
    ///
    /// On success returns the events as recorded, with their assigned
    /// versions and timestamps.
    async fn append(
        &self,
        aggregate_id: &AggregateId,
        events: Vec<EventToWrite<Self::Event>>,
        expected: ExpectedVersion,
    ) -> EventStoreResult<Vec<StoredEvent<Self::Event>>>;

    /// Returns the current version of an aggregate (0 when it has no
    /// history).
    async fn current_version(&self, aggregate_id: &AggregateId) -> EventStoreResult<EventVersion>;

    /// Whether the aggregate has any recorded history.
    async fn aggregate_exists(&self, aggregate_id: &AggregateId) -> EventStoreResult<bool> {
        let version = self.current_version(aggregate_id).await?;
        Ok(version > EventVersion::initial())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_version_displays_each_variant() {
        assert_eq!(ExpectedVersion::New.to_string(), "new");
        assert_eq!(
            ExpectedVersion::Exact(EventVersion::try_new(4).unwrap()).to_string(),
            "exactly 4"
        );
        assert_eq!(ExpectedVersion::Any.to_string(), "any");
    }

    #[test]
    fn event_to_write_mints_distinct_ids() {
        let caused_by = CommandId::new();
        let first = EventToWrite::new(caused_by, "payload");
        let second = EventToWrite::new(caused_by, "payload");
        assert_ne!(first.event_id, second.event_id);
        assert_eq!(first.caused_by, second.caused_by);
    }
}
