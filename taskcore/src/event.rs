//! The kernel-wide event union and its kind names.
//!
//! Every event recorded by either aggregate flows through `KernelEvent`,
//! the payload type the store, bus, and projections all share. `EventKind`
//! gives each variant a stable wire name used for subscription filtering
//! and logging.

use serde::{Deserialize, Serialize};

use crate::label::LabelEvent;
use crate::task::TaskEvent;
use crate::types::AggregateId;

/// Union of all events either aggregate can record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelEvent {
    /// An event of the `Task` aggregate.
    Task(TaskEvent),
    /// An event of the `TaskLabel` aggregate.
    Label(LabelEvent),
}

impl KernelEvent {
    /// The stable kind name of this event.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Task(event) => match event {
                TaskEvent::DraftCreated { .. } => EventKind::TaskDraftCreated,
                TaskEvent::Created { .. } => EventKind::TaskCreated,
                TaskEvent::DescriptionUpdated { .. } => EventKind::TaskDescriptionUpdated,
                TaskEvent::PriorityUpdated { .. } => EventKind::TaskPriorityUpdated,
                TaskEvent::DueDateUpdated { .. } => EventKind::TaskDueDateUpdated,
                TaskEvent::DraftFinalized { .. } => EventKind::TaskDraftFinalized,
                TaskEvent::Completed { .. } => EventKind::TaskCompleted,
                TaskEvent::Reopened { .. } => EventKind::TaskReopened,
                TaskEvent::Deleted { .. } => EventKind::TaskDeleted,
                TaskEvent::Restored { .. } => EventKind::DeletedTaskRestored,
                TaskEvent::LabelAssigned { .. } => EventKind::LabelAssignedToTask,
                TaskEvent::LabelRemoved { .. } => EventKind::LabelRemovedFromTask,
            },
            Self::Label(event) => match event {
                LabelEvent::Created { .. } => EventKind::LabelCreated,
                LabelEvent::DetailsUpdated { .. } => EventKind::LabelDetailsUpdated,
            },
        }
    }

    /// The store key of the aggregate this event belongs to.
    pub fn aggregate_id(&self) -> AggregateId {
        match self {
            Self::Task(event) => AggregateId::from(event.task_id()),
            Self::Label(event) => AggregateId::from(event.label_id()),
        }
    }

    /// The task event inside, if this is a task event.
    pub const fn as_task(&self) -> Option<&TaskEvent> {
        match self {
            Self::Task(event) => Some(event),
            Self::Label(_) => None,
        }
    }

    /// The label event inside, if this is a label event.
    pub const fn as_label(&self) -> Option<&LabelEvent> {
        match self {
            Self::Task(_) => None,
            Self::Label(event) => Some(event),
        }
    }
}

impl From<TaskEvent> for KernelEvent {
    fn from(event: TaskEvent) -> Self {
        Self::Task(event)
    }
}

impl From<LabelEvent> for KernelEvent {
    fn from(event: LabelEvent) -> Self {
        Self::Label(event)
    }
}

/// Stable wire names for every event the kernel records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A task was created in `Draft` status.
    TaskDraftCreated,
    /// A task was created directly in `Open` status.
    TaskCreated,
    /// A task's description was rewritten.
    TaskDescriptionUpdated,
    /// A task's priority was rewritten.
    TaskPriorityUpdated,
    /// A task's due date was rewritten.
    TaskDueDateUpdated,
    /// A draft task became `Finalized`.
    TaskDraftFinalized,
    /// A task became `Completed`.
    TaskCompleted,
    /// A completed task went back to `Open`.
    TaskReopened,
    /// A task became `Deleted`.
    TaskDeleted,
    /// A deleted task returned to its prior status.
    DeletedTaskRestored,
    /// A label joined a task's label set.
    LabelAssignedToTask,
    /// A label left a task's label set.
    LabelRemovedFromTask,
    /// A label came into existence.
    LabelCreated,
    /// A label's title and color were rewritten.
    LabelDetailsUpdated,
}

impl EventKind {
    /// Every kind the kernel records, for subscribe-to-everything callers.
    pub const ALL: [Self; 14] = [
        Self::TaskDraftCreated,
        Self::TaskCreated,
        Self::TaskDescriptionUpdated,
        Self::TaskPriorityUpdated,
        Self::TaskDueDateUpdated,
        Self::TaskDraftFinalized,
        Self::TaskCompleted,
        Self::TaskReopened,
        Self::TaskDeleted,
        Self::DeletedTaskRestored,
        Self::LabelAssignedToTask,
        Self::LabelRemovedFromTask,
        Self::LabelCreated,
        Self::LabelDetailsUpdated,
    ];

    /// The kind name as written on the wire and in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskDraftCreated => "TaskDraftCreated",
            Self::TaskCreated => "TaskCreated",
            Self::TaskDescriptionUpdated => "TaskDescriptionUpdated",
            Self::TaskPriorityUpdated => "TaskPriorityUpdated",
            Self::TaskDueDateUpdated => "TaskDueDateUpdated",
            Self::TaskDraftFinalized => "TaskDraftFinalized",
            Self::TaskCompleted => "TaskCompleted",
            Self::TaskReopened => "TaskReopened",
            Self::TaskDeleted => "TaskDeleted",
            Self::DeletedTaskRestored => "DeletedTaskRestored",
            Self::LabelAssignedToTask => "LabelAssignedToTask",
            Self::LabelRemovedFromTask => "LabelRemovedFromTask",
            Self::LabelCreated => "LabelCreated",
            Self::LabelDetailsUpdated => "LabelDetailsUpdated",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LabelDetails, LabelId, TaskId};

    fn task_id() -> TaskId {
        TaskId::try_new("task-1").unwrap()
    }

    fn label_id() -> LabelId {
        LabelId::try_new("label-1").unwrap()
    }

    #[test]
    fn every_task_event_reports_a_task_kind_and_its_own_aggregate_id() {
        let event = KernelEvent::from(TaskEvent::LabelAssigned {
            task_id: task_id(),
            label_id: label_id(),
        });
        assert_eq!(event.kind(), EventKind::LabelAssignedToTask);
        assert_eq!(event.aggregate_id(), AggregateId::from(&task_id()));
        assert!(event.as_task().is_some());
        assert!(event.as_label().is_none());
    }

    #[test]
    fn label_events_key_their_history_by_label_id() {
        let event = KernelEvent::from(LabelEvent::Created {
            label_id: label_id(),
            details: LabelDetails::default(),
        });
        assert_eq!(event.kind(), EventKind::LabelCreated);
        assert_eq!(event.aggregate_id(), AggregateId::from(&label_id()));
    }

    #[test]
    fn all_kinds_are_distinct_and_named_like_their_variant() {
        let mut names: Vec<&str> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EventKind::ALL.len());
        assert_eq!(EventKind::TaskDraftFinalized.to_string(), "TaskDraftFinalized");
    }

    #[test]
    fn events_survive_a_serde_round_trip() {
        let events = [
            KernelEvent::from(TaskEvent::DraftCreated { task_id: task_id() }),
            KernelEvent::from(TaskEvent::Deleted {
                task_id: task_id(),
                prior_status: crate::types::TaskStatus::Open,
            }),
            KernelEvent::from(LabelEvent::Created {
                label_id: label_id(),
                details: LabelDetails::default(),
            }),
        ];
        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let back: KernelEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(back, event);
        }
    }
}
