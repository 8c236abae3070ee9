//! Cross-aggregate context computed at event-publish time.
//!
//! Several views are keyed by label id but fold events that carry only a
//! task id. Before such an event reaches the projection router it is
//! enriched with the task's current snapshot and label list, read through
//! the store. Enrichment is derived data: computed on demand, attached to
//! the published event's context, never persisted.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::aggregate::Aggregate;
use crate::event::KernelEvent;
use crate::event_store::{EventStore, StoredEvent};
use crate::label::TaskLabel;
use crate::task::Task;
use crate::types::{AggregateId, LabelDetails, LabelId, TaskDetails, TaskId};

/// Derived context attached to one published event.
///
/// Fields not applicable to the event's family hold their default value: a
/// label event carries a default task snapshot, and vice versa.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnrichment {
    /// Current snapshot of the task the event belongs to.
    pub task: Task,
    /// The task's current label ids, in stable order.
    pub label_ids: Vec<LabelId>,
    /// Current details of the label the event belongs to.
    pub label_details: LabelDetails,
}

impl EventEnrichment {
    /// Description and priority taken from the task snapshot.
    pub fn task_details(&self) -> TaskDetails {
        self.task.details()
    }
}

/// Read-through query surface over other aggregates' current state.
///
/// Every method is total: a missing aggregate resolves to the type's
/// default value, never an error, so enrichment can never abort an event's
/// publication.
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    /// Current state of a task; default when the task does not exist.
    async fn task_snapshot(&self, task_id: &TaskId) -> Task;

    /// Description and priority of a task; defaults when missing.
    async fn task_details(&self, task_id: &TaskId) -> TaskDetails;

    /// The label ids a task currently carries; empty when missing.
    async fn task_labels(&self, task_id: &TaskId) -> Vec<LabelId>;

    /// Title and color of a label; defaults when missing.
    async fn label_details(&self, label_id: &LabelId) -> LabelDetails;

    /// Computes the enrichment for one event.
    ///
    /// A task event gets the task snapshot and its label list, read once so
    /// the two cannot disagree. A label event gets the label's details.
    async fn enrich(&self, event: &KernelEvent) -> EventEnrichment {
        match event {
            KernelEvent::Task(task_event) => {
                let task = self.task_snapshot(task_event.task_id()).await;
                let label_ids = task.labels().iter().cloned().collect();
                EventEnrichment {
                    task,
                    label_ids,
                    label_details: LabelDetails::default(),
                }
            }
            KernelEvent::Label(label_event) => EventEnrichment {
                label_details: self.label_details(label_event.label_id()).await,
                ..EventEnrichment::default()
            },
        }
    }
}

/// The store-backed [`EnrichmentSource`] the kernel uses.
///
/// Reads the referenced aggregate's committed history and folds it to a
/// snapshot. A store read failure is logged and treated as a miss so the
/// originating event still publishes.
#[derive(Debug)]
pub struct StoreEnricher<ES> {
    store: Arc<ES>,
}

impl<ES> StoreEnricher<ES>
where
    ES: EventStore<Event = KernelEvent>,
{
    /// Creates an enricher reading through the given store.
    pub const fn new(store: Arc<ES>) -> Self {
        Self { store }
    }

    async fn history_or_empty(&self, aggregate_id: &AggregateId) -> Vec<StoredEvent<KernelEvent>> {
        match self.store.history(aggregate_id).await {
            Ok(history) => history,
            Err(error) => {
                warn!(%aggregate_id, %error, "enrichment read failed, using defaults");
                Vec::new()
            }
        }
    }
}

impl<ES> Clone for StoreEnricher<ES> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

#[async_trait]
impl<ES> EnrichmentSource for StoreEnricher<ES>
where
    ES: EventStore<Event = KernelEvent>,
{
    async fn task_snapshot(&self, task_id: &TaskId) -> Task {
        let history = self.history_or_empty(&AggregateId::from(task_id)).await;
        history
            .iter()
            .filter_map(|stored| stored.payload().as_task())
            .fold(Task::default(), Task::apply)
    }

    async fn task_details(&self, task_id: &TaskId) -> TaskDetails {
        self.task_snapshot(task_id).await.details()
    }

    async fn task_labels(&self, task_id: &TaskId) -> Vec<LabelId> {
        self.task_snapshot(task_id)
            .await
            .labels()
            .iter()
            .cloned()
            .collect()
    }

    async fn label_details(&self, label_id: &LabelId) -> LabelDetails {
        let history = self.history_or_empty(&AggregateId::from(label_id)).await;
        let label = history
            .iter()
            .filter_map(|stored| stored.payload().as_label())
            .fold(TaskLabel::default(), TaskLabel::apply);
        label.details().clone()
    }
}
