//! Holds the live projection instances and folds routed events into them.
//!
//! One registry owns the two singleton views and the per-label views,
//! created lazily when an event first routes to them. Folds for a single
//! instance are serialized by that instance's lock; folds for distinct
//! instances proceed independently. The registry subscribes to every event
//! kind and consults the router per delivery.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::bus::{EventContext, EventSubscriber};
use crate::enrichment::EventEnrichment;
use crate::event::KernelEvent;
use crate::event_store::StoredEvent;
use crate::routing::{routes, ProjectionId};
use crate::types::LabelId;
use crate::views::{DraftTasksView, LabelledTasksView, MyListView};

/// The kernel's read side: every live projection instance.
#[derive(Default)]
pub struct ProjectionRegistry {
    draft_tasks: Mutex<DraftTasksView>,
    my_list: Mutex<MyListView>,
    labelled: RwLock<HashMap<LabelId, Mutex<LabelledTasksView>>>,
}

impl ProjectionRegistry {
    /// Creates a registry with no state folded yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the draft-tasks view.
    pub fn draft_tasks(&self) -> DraftTasksView {
        self.draft_tasks.lock().clone()
    }

    /// Snapshot of the whole-list view.
    pub fn my_list(&self) -> MyListView {
        self.my_list.lock().clone()
    }

    /// Snapshot of one label's view, if any event ever routed to it.
    pub fn labelled_tasks(&self, label_id: &LabelId) -> Option<LabelledTasksView> {
        self.labelled
            .read()
            .get(label_id)
            .map(|instance| instance.lock().clone())
    }

    fn fold_draft_tasks(&self, event: &KernelEvent, enrichment: &EventEnrichment) {
        let mut guard = self.draft_tasks.lock();
        let view = std::mem::take(&mut *guard);
        *guard = view.apply(event, enrichment);
    }

    fn fold_my_list(&self, event: &KernelEvent, enrichment: &EventEnrichment) {
        let mut guard = self.my_list.lock();
        let view = std::mem::take(&mut *guard);
        *guard = view.apply(event, enrichment);
    }

    fn fold_labelled(&self, label_id: &LabelId, event: &KernelEvent, enrichment: &EventEnrichment) {
        {
            let labelled = self.labelled.read();
            if let Some(instance) = labelled.get(label_id) {
                let mut view = instance.lock();
                *view = view.clone().apply(event, enrichment);
                return;
            }
        }
        let mut labelled = self.labelled.write();
        let instance = labelled
            .entry(label_id.clone())
            .or_insert_with(|| Mutex::new(LabelledTasksView::new(label_id.clone())));
        let mut view = instance.lock();
        *view = view.clone().apply(event, enrichment);
    }
}

#[async_trait]
impl EventSubscriber for ProjectionRegistry {
    fn name(&self) -> &'static str {
        "projections"
    }

    async fn on_event(&self, event: &StoredEvent<KernelEvent>, context: &EventContext) {
        let enrichment = &context.enrichment;
        let targets = routes(event.payload(), enrichment);
        debug!(
            kind = %event.payload().kind(),
            aggregate_id = %event.aggregate_id,
            fan_out = targets.len(),
            "routing event to projections"
        );
        for target in targets {
            match target {
                ProjectionId::DraftTasks => self.fold_draft_tasks(event.payload(), enrichment),
                ProjectionId::MyList => self.fold_my_list(event.payload(), enrichment),
                ProjectionId::Labelled(label_id) => {
                    self.fold_labelled(&label_id, event.payload(), enrichment);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::task::{Task, TaskEvent};
    use crate::types::{
        CommandId, EventId, EventVersion, TaskDescription, TaskId, TaskStatus, Timestamp,
    };

    fn task_id() -> TaskId {
        TaskId::try_new("task-1").unwrap()
    }

    fn label_id() -> LabelId {
        LabelId::try_new("label-1").unwrap()
    }

    fn stored(payload: KernelEvent, version: u64) -> StoredEvent<KernelEvent> {
        StoredEvent {
            event_id: EventId::new(),
            aggregate_id: payload.aggregate_id(),
            version: EventVersion::try_new(version).unwrap(),
            recorded_at: Timestamp::now(),
            caused_by: CommandId::new(),
            payload,
        }
    }

    fn context_for(history: &[TaskEvent]) -> EventContext {
        let task = Task::replay(history);
        EventContext::new(EventEnrichment {
            label_ids: task.labels().iter().cloned().collect(),
            task,
            ..EventEnrichment::default()
        })
    }

    #[tokio::test]
    async fn delivered_events_reach_the_routed_views() {
        let registry = ProjectionRegistry::new();
        let history = vec![
            TaskEvent::DraftCreated { task_id: task_id() },
            TaskEvent::LabelAssigned {
                task_id: task_id(),
                label_id: label_id(),
            },
            TaskEvent::DraftFinalized { task_id: task_id() },
        ];

        for (index, event) in history.iter().enumerate() {
            let context = context_for(&history[..=index]);
            registry
                .on_event(
                    &stored(KernelEvent::Task(event.clone()), (index + 1) as u64),
                    &context,
                )
                .await;
        }

        assert!(registry.draft_tasks().is_empty());
        assert!(registry.my_list().contains(&task_id()));
        let labelled = registry.labelled_tasks(&label_id()).unwrap();
        assert!(labelled.contains(&task_id()));
    }

    #[tokio::test]
    async fn a_label_view_materializes_on_its_first_routed_event() {
        let registry = ProjectionRegistry::new();
        assert!(registry.labelled_tasks(&label_id()).is_none());

        let history = vec![
            TaskEvent::Created {
                task_id: task_id(),
                description: TaskDescription::try_new("buy milk").unwrap(),
            },
            TaskEvent::LabelAssigned {
                task_id: task_id(),
                label_id: label_id(),
            },
        ];
        registry
            .on_event(
                &stored(KernelEvent::Task(history[1].clone()), 2),
                &context_for(&history),
            )
            .await;

        assert!(registry.labelled_tasks(&label_id()).is_some());
    }

    #[tokio::test]
    async fn deletion_fans_out_to_every_holding_view() {
        let registry = ProjectionRegistry::new();
        let history = vec![
            TaskEvent::Created {
                task_id: task_id(),
                description: TaskDescription::try_new("buy milk").unwrap(),
            },
            TaskEvent::LabelAssigned {
                task_id: task_id(),
                label_id: label_id(),
            },
            TaskEvent::Deleted {
                task_id: task_id(),
                prior_status: TaskStatus::Open,
            },
        ];

        for (index, event) in history.iter().enumerate() {
            registry
                .on_event(
                    &stored(KernelEvent::Task(event.clone()), (index + 1) as u64),
                    &context_for(&history[..=index]),
                )
                .await;
        }

        assert!(registry.my_list().is_empty());
        assert!(registry.labelled_tasks(&label_id()).unwrap().is_empty());
    }
}
