//! The `Task` aggregate: commands, events, and the status state machine.
//!
//! A task is created either as a draft (the wizard path, finalized later)
//! or directly as an open task. Deletion is a status change that records
//! where the task came from, so a restore can put it back. Labels are a
//! set; assignment and removal are refused once a task is deleted or
//! completed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::errors::TaskRejection;
use crate::mismatch::{detect, ValueChange};
use crate::types::{
    EventVersion, LabelId, TaskDescription, TaskDetails, TaskId, TaskPriority, TaskStatus,
    Timestamp,
};

/// Commands the `Task` aggregate decides on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    /// Create a task in `Draft` status, to be shaped and finalized later.
    CreateDraft {
        /// Id of the task to create.
        task_id: TaskId,
    },
    /// Create a task directly in `Open` status.
    CreateTask {
        /// Id of the task to create.
        task_id: TaskId,
        /// Initial description.
        description: TaskDescription,
    },
    /// Rewrite the description, declaring the currently observed one.
    UpdateDescription {
        /// Target task.
        task_id: TaskId,
        /// Observed and desired description.
        change: ValueChange<TaskDescription>,
    },
    /// Rewrite the priority, declaring the currently observed one.
    UpdatePriority {
        /// Target task.
        task_id: TaskId,
        /// Observed and desired priority.
        change: ValueChange<TaskPriority>,
    },
    /// Rewrite the due date, declaring the currently observed one.
    UpdateDueDate {
        /// Target task.
        task_id: TaskId,
        /// Observed and desired due date; `None` means "no due date".
        change: ValueChange<Option<Timestamp>>,
    },
    /// Move a draft to `Finalized`.
    FinalizeDraft {
        /// Target task.
        task_id: TaskId,
    },
    /// Move an open or finalized task to `Completed`.
    CompleteTask {
        /// Target task.
        task_id: TaskId,
    },
    /// Move a completed task back to `Open`.
    ReopenTask {
        /// Target task.
        task_id: TaskId,
    },
    /// Move an actionable task to `Deleted`, recording its prior status.
    DeleteTask {
        /// Target task.
        task_id: TaskId,
    },
    /// Return a deleted task to the status recorded at deletion.
    RestoreDeletedTask {
        /// Target task.
        task_id: TaskId,
    },
    /// Add a label to the task's label set.
    AssignLabel {
        /// Target task.
        task_id: TaskId,
        /// Label to assign.
        label_id: LabelId,
    },
    /// Remove a label from the task's label set.
    RemoveLabel {
        /// Target task.
        task_id: TaskId,
        /// Label to remove.
        label_id: LabelId,
    },
}

impl TaskCommand {
    /// The task this command targets.
    pub const fn task_id(&self) -> &TaskId {
        match self {
            Self::CreateDraft { task_id }
            | Self::CreateTask { task_id, .. }
            | Self::UpdateDescription { task_id, .. }
            | Self::UpdatePriority { task_id, .. }
            | Self::UpdateDueDate { task_id, .. }
            | Self::FinalizeDraft { task_id }
            | Self::CompleteTask { task_id }
            | Self::ReopenTask { task_id }
            | Self::DeleteTask { task_id }
            | Self::RestoreDeletedTask { task_id }
            | Self::AssignLabel { task_id, .. }
            | Self::RemoveLabel { task_id, .. } => task_id,
        }
    }

    /// Short command name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateDraft { .. } => "CreateDraft",
            Self::CreateTask { .. } => "CreateTask",
            Self::UpdateDescription { .. } => "UpdateTaskDescription",
            Self::UpdatePriority { .. } => "UpdateTaskPriority",
            Self::UpdateDueDate { .. } => "UpdateTaskDueDate",
            Self::FinalizeDraft { .. } => "FinalizeDraft",
            Self::CompleteTask { .. } => "CompleteTask",
            Self::ReopenTask { .. } => "ReopenTask",
            Self::DeleteTask { .. } => "DeleteTask",
            Self::RestoreDeletedTask { .. } => "RestoreDeletedTask",
            Self::AssignLabel { .. } => "AssignLabelToTask",
            Self::RemoveLabel { .. } => "RemoveLabelFromTask",
        }
    }
}

/// Events recorded by the `Task` aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskEvent {
    /// A draft came into existence.
    DraftCreated {
        /// The new task.
        task_id: TaskId,
    },
    /// A task came into existence directly in `Open` status.
    Created {
        /// The new task.
        task_id: TaskId,
        /// Its initial description.
        description: TaskDescription,
    },
    /// The description was rewritten; both sides are recorded.
    DescriptionUpdated {
        /// The changed task.
        task_id: TaskId,
        /// Previous and new description.
        change: ValueChange<TaskDescription>,
    },
    /// The priority was rewritten; both sides are recorded.
    PriorityUpdated {
        /// The changed task.
        task_id: TaskId,
        /// Previous and new priority.
        change: ValueChange<TaskPriority>,
    },
    /// The due date was rewritten; both sides are recorded.
    DueDateUpdated {
        /// The changed task.
        task_id: TaskId,
        /// Previous and new due date.
        change: ValueChange<Option<Timestamp>>,
    },
    /// A draft became `Finalized`.
    DraftFinalized {
        /// The finalized task.
        task_id: TaskId,
    },
    /// The task became `Completed`.
    Completed {
        /// The completed task.
        task_id: TaskId,
    },
    /// A completed task went back to `Open`.
    Reopened {
        /// The reopened task.
        task_id: TaskId,
    },
    /// The task became `Deleted`; the status it held is recorded.
    Deleted {
        /// The deleted task.
        task_id: TaskId,
        /// Status the task held immediately before deletion.
        prior_status: TaskStatus,
    },
    /// A deleted task returned to the status recorded at deletion.
    Restored {
        /// The restored task.
        task_id: TaskId,
        /// The status it returned to.
        restored_status: TaskStatus,
    },
    /// A label joined the task's label set.
    LabelAssigned {
        /// The task.
        task_id: TaskId,
        /// The assigned label.
        label_id: LabelId,
    },
    /// A label left the task's label set.
    LabelRemoved {
        /// The task.
        task_id: TaskId,
        /// The removed label.
        label_id: LabelId,
    },
}

impl TaskEvent {
    /// The task this event belongs to.
    pub const fn task_id(&self) -> &TaskId {
        match self {
            Self::DraftCreated { task_id }
            | Self::Created { task_id, .. }
            | Self::DescriptionUpdated { task_id, .. }
            | Self::PriorityUpdated { task_id, .. }
            | Self::DueDateUpdated { task_id, .. }
            | Self::DraftFinalized { task_id }
            | Self::Completed { task_id }
            | Self::Reopened { task_id }
            | Self::Deleted { task_id, .. }
            | Self::Restored { task_id, .. }
            | Self::LabelAssigned { task_id, .. }
            | Self::LabelRemoved { task_id, .. } => task_id,
        }
    }
}

/// State of one task, derived solely from its event history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: Option<TaskId>,
    description: TaskDescription,
    priority: TaskPriority,
    due_date: Option<Timestamp>,
    status: TaskStatus,
    labels: BTreeSet<LabelId>,
    prior_status: Option<TaskStatus>,
    version: EventVersion,
}

impl Task {
    /// Whether any event has created this task yet.
    pub const fn exists(&self) -> bool {
        self.id.is_some()
    }

    /// The task id, once created.
    pub const fn id(&self) -> Option<&TaskId> {
        self.id.as_ref()
    }

    /// Current lifecycle status. Meaningful only for an existing task.
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Current description.
    pub const fn description(&self) -> &TaskDescription {
        &self.description
    }

    /// Current priority.
    pub const fn priority(&self) -> TaskPriority {
        self.priority
    }

    /// Current due date, if any.
    pub const fn due_date(&self) -> Option<Timestamp> {
        self.due_date
    }

    /// Labels currently assigned, in stable order.
    pub const fn labels(&self) -> &BTreeSet<LabelId> {
        &self.labels
    }

    /// Number of events applied to this task.
    pub const fn version(&self) -> EventVersion {
        self.version
    }

    /// Description and priority bundled for read-side consumers.
    pub fn details(&self) -> TaskDetails {
        TaskDetails {
            description: self.description.clone(),
            priority: self.priority,
        }
    }

    fn require_exists(&self, task_id: &TaskId) -> Result<(), TaskRejection> {
        if self.exists() {
            Ok(())
        } else {
            Err(TaskRejection::TaskNotFound {
                task_id: task_id.clone(),
            })
        }
    }

    fn require_updatable(&self, task_id: &TaskId) -> Result<(), TaskRejection> {
        self.require_exists(task_id)?;
        if self.status.is_actionable() {
            Ok(())
        } else {
            Err(TaskRejection::CannotUpdateTask {
                task_id: task_id.clone(),
                status: self.status,
            })
        }
    }
}

impl Aggregate for Task {
    const AGGREGATE_TYPE: &'static str = "task";

    type Command = TaskCommand;
    type Event = TaskEvent;
    type Rejection = TaskRejection;

    fn handle(&self, command: Self::Command) -> Result<Vec<Self::Event>, Self::Rejection> {
        match command {
            TaskCommand::CreateDraft { task_id } => {
                if self.exists() {
                    return Err(TaskRejection::TaskAlreadyExists { task_id });
                }
                Ok(vec![TaskEvent::DraftCreated { task_id }])
            }

            TaskCommand::CreateTask {
                task_id,
                description,
            } => {
                if self.exists() {
                    return Err(TaskRejection::TaskAlreadyExists { task_id });
                }
                Ok(vec![TaskEvent::Created {
                    task_id,
                    description,
                }])
            }

            TaskCommand::UpdateDescription { task_id, change } => {
                self.require_updatable(&task_id)?;
                detect(&change, &self.description, self.version).map_err(|mismatch| {
                    TaskRejection::CannotUpdateTaskDescription {
                        task_id: task_id.clone(),
                        mismatch,
                    }
                })?;
                Ok(vec![TaskEvent::DescriptionUpdated { task_id, change }])
            }

            TaskCommand::UpdatePriority { task_id, change } => {
                self.require_updatable(&task_id)?;
                detect(&change, &self.priority, self.version).map_err(|mismatch| {
                    TaskRejection::CannotUpdateTaskPriority {
                        task_id: task_id.clone(),
                        mismatch,
                    }
                })?;
                Ok(vec![TaskEvent::PriorityUpdated { task_id, change }])
            }

            TaskCommand::UpdateDueDate { task_id, change } => {
                self.require_updatable(&task_id)?;
                detect(&change, &self.due_date, self.version).map_err(|mismatch| {
                    TaskRejection::CannotUpdateTaskDueDate {
                        task_id: task_id.clone(),
                        mismatch,
                    }
                })?;
                Ok(vec![TaskEvent::DueDateUpdated { task_id, change }])
            }

            TaskCommand::FinalizeDraft { task_id } => {
                self.require_exists(&task_id)?;
                if self.status != TaskStatus::Draft {
                    return Err(TaskRejection::CannotFinalizeDraft {
                        task_id,
                        status: self.status,
                    });
                }
                Ok(vec![TaskEvent::DraftFinalized { task_id }])
            }

            TaskCommand::CompleteTask { task_id } => {
                self.require_exists(&task_id)?;
                if !matches!(self.status, TaskStatus::Open | TaskStatus::Finalized) {
                    return Err(TaskRejection::CannotCompleteTask {
                        task_id,
                        status: self.status,
                    });
                }
                Ok(vec![TaskEvent::Completed { task_id }])
            }

            TaskCommand::ReopenTask { task_id } => {
                self.require_exists(&task_id)?;
                if self.status != TaskStatus::Completed {
                    return Err(TaskRejection::CannotReopenTask {
                        task_id,
                        status: self.status,
                    });
                }
                Ok(vec![TaskEvent::Reopened { task_id }])
            }

            TaskCommand::DeleteTask { task_id } => {
                self.require_exists(&task_id)?;
                if !self.status.is_actionable() {
                    return Err(TaskRejection::CannotDeleteTask {
                        task_id,
                        status: self.status,
                    });
                }
                Ok(vec![TaskEvent::Deleted {
                    task_id,
                    prior_status: self.status,
                }])
            }

            TaskCommand::RestoreDeletedTask { task_id } => {
                self.require_exists(&task_id)?;
                if self.status != TaskStatus::Deleted {
                    return Err(TaskRejection::CannotRestoreDeletedTask {
                        task_id,
                        status: self.status,
                    });
                }
                // Deletion always records the prior status; Draft stands in
                // should a history ever lack it.
                let restored_status = self.prior_status.unwrap_or(TaskStatus::Draft);
                Ok(vec![TaskEvent::Restored {
                    task_id,
                    restored_status,
                }])
            }

            TaskCommand::AssignLabel { task_id, label_id } => {
                self.require_exists(&task_id)?;
                if !self.status.is_actionable() {
                    return Err(TaskRejection::CannotAssignLabelToTask {
                        task_id,
                        label_id,
                        status: self.status,
                    });
                }
                Ok(vec![TaskEvent::LabelAssigned { task_id, label_id }])
            }

            TaskCommand::RemoveLabel { task_id, label_id } => {
                self.require_exists(&task_id)?;
                if !self.status.is_actionable() {
                    return Err(TaskRejection::CannotRemoveLabelFromTask {
                        task_id,
                        label_id,
                        status: self.status,
                    });
                }
                Ok(vec![TaskEvent::LabelRemoved { task_id, label_id }])
            }
        }
    }

    fn apply(self, event: &Self::Event) -> Self {
        let version = self.version.next();
        match event {
            TaskEvent::DraftCreated { task_id } => Self {
                id: Some(task_id.clone()),
                status: TaskStatus::Draft,
                version,
                ..self
            },
            TaskEvent::Created {
                task_id,
                description,
            } => Self {
                id: Some(task_id.clone()),
                description: description.clone(),
                status: TaskStatus::Open,
                version,
                ..self
            },
            TaskEvent::DescriptionUpdated { change, .. } => Self {
                description: change.new.clone(),
                version,
                ..self
            },
            TaskEvent::PriorityUpdated { change, .. } => Self {
                priority: change.new,
                version,
                ..self
            },
            TaskEvent::DueDateUpdated { change, .. } => Self {
                due_date: change.new,
                version,
                ..self
            },
            TaskEvent::DraftFinalized { .. } => Self {
                status: TaskStatus::Finalized,
                version,
                ..self
            },
            TaskEvent::Completed { .. } => Self {
                status: TaskStatus::Completed,
                version,
                ..self
            },
            TaskEvent::Reopened { .. } => Self {
                status: TaskStatus::Open,
                version,
                ..self
            },
            TaskEvent::Deleted { prior_status, .. } => Self {
                status: TaskStatus::Deleted,
                prior_status: Some(*prior_status),
                version,
                ..self
            },
            TaskEvent::Restored {
                restored_status, ..
            } => Self {
                status: *restored_status,
                prior_status: None,
                version,
                ..self
            },
            TaskEvent::LabelAssigned { label_id, .. } => {
                let mut labels = self.labels;
                labels.insert(label_id.clone());
                Self {
                    labels,
                    version,
                    ..self
                }
            }
            TaskEvent::LabelRemoved { label_id, .. } => {
                let mut labels = self.labels;
                labels.remove(label_id);
                Self {
                    labels,
                    version,
                    ..self
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn task_id() -> TaskId {
        TaskId::try_new("task-1").unwrap()
    }

    fn label_id(name: &str) -> LabelId {
        LabelId::try_new(name).unwrap()
    }

    fn description(s: &str) -> TaskDescription {
        TaskDescription::try_new(s).unwrap()
    }

    /// Runs commands against an evolving task, folding emitted events and
    /// collecting them; rejections are returned to the caller.
    fn run(
        state: Task,
        command: TaskCommand,
    ) -> Result<(Task, Vec<TaskEvent>), (Task, TaskRejection)> {
        match state.handle(command) {
            Ok(events) => {
                let next = events.iter().fold(state, Task::apply);
                Ok((next, events))
            }
            Err(rejection) => Err((state, rejection)),
        }
    }

    fn draft() -> Task {
        let (task, _) = run(
            Task::default(),
            TaskCommand::CreateDraft { task_id: task_id() },
        )
        .unwrap();
        task
    }

    fn open_task() -> Task {
        let (task, _) = run(
            Task::default(),
            TaskCommand::CreateTask {
                task_id: task_id(),
                description: description("write the report"),
            },
        )
        .unwrap();
        task
    }

    fn completed_task() -> Task {
        let (task, _) = run(open_task(), TaskCommand::CompleteTask { task_id: task_id() }).unwrap();
        task
    }

    fn deleted_draft() -> Task {
        let (task, _) = run(draft(), TaskCommand::DeleteTask { task_id: task_id() }).unwrap();
        task
    }

    #[test]
    fn creating_a_draft_starts_at_version_one_in_draft_status() {
        let task = draft();
        assert_eq!(task.status(), TaskStatus::Draft);
        assert_eq!(task.id(), Some(&task_id()));
        let version: u64 = task.version().into();
        assert_eq!(version, 1);
    }

    #[test]
    fn creating_over_an_existing_task_rejects() {
        let (_, rejection) = run(draft(), TaskCommand::CreateDraft { task_id: task_id() })
            .unwrap_err();
        assert!(matches!(rejection, TaskRejection::TaskAlreadyExists { .. }));
    }

    #[test]
    fn basic_creation_opens_the_task_with_its_description() {
        let task = open_task();
        assert_eq!(task.status(), TaskStatus::Open);
        assert_eq!(task.description(), &description("write the report"));
        assert_eq!(task.priority(), TaskPriority::Normal);
    }

    #[test]
    fn finalizing_a_draft_moves_it_to_finalized() {
        let (task, events) =
            run(draft(), TaskCommand::FinalizeDraft { task_id: task_id() }).unwrap();
        assert_eq!(task.status(), TaskStatus::Finalized);
        assert_eq!(events, vec![TaskEvent::DraftFinalized { task_id: task_id() }]);
    }

    #[test]
    fn finalizing_a_non_draft_rejects() {
        let (_, rejection) =
            run(open_task(), TaskCommand::FinalizeDraft { task_id: task_id() }).unwrap_err();
        assert!(matches!(
            rejection,
            TaskRejection::CannotFinalizeDraft {
                status: TaskStatus::Open,
                ..
            }
        ));
    }

    #[test]
    fn open_and_finalized_tasks_can_complete() {
        let (completed, _) =
            run(open_task(), TaskCommand::CompleteTask { task_id: task_id() }).unwrap();
        assert_eq!(completed.status(), TaskStatus::Completed);

        let (finalized, _) =
            run(draft(), TaskCommand::FinalizeDraft { task_id: task_id() }).unwrap();
        let (completed, _) =
            run(finalized, TaskCommand::CompleteTask { task_id: task_id() }).unwrap();
        assert_eq!(completed.status(), TaskStatus::Completed);
    }

    #[test]
    fn a_draft_cannot_complete() {
        let (_, rejection) =
            run(draft(), TaskCommand::CompleteTask { task_id: task_id() }).unwrap_err();
        assert!(matches!(rejection, TaskRejection::CannotCompleteTask { .. }));
    }

    #[test]
    fn reopening_returns_a_completed_task_to_open() {
        let (task, _) = run(
            completed_task(),
            TaskCommand::ReopenTask { task_id: task_id() },
        )
        .unwrap();
        assert_eq!(task.status(), TaskStatus::Open);
    }

    #[test]
    fn reopening_a_non_completed_task_rejects() {
        let (_, rejection) =
            run(open_task(), TaskCommand::ReopenTask { task_id: task_id() }).unwrap_err();
        assert!(matches!(rejection, TaskRejection::CannotReopenTask { .. }));
    }

    #[test]
    fn deletion_records_the_prior_status_for_restore() {
        let (deleted, events) =
            run(open_task(), TaskCommand::DeleteTask { task_id: task_id() }).unwrap();
        assert_eq!(deleted.status(), TaskStatus::Deleted);
        assert_eq!(
            events,
            vec![TaskEvent::Deleted {
                task_id: task_id(),
                prior_status: TaskStatus::Open,
            }]
        );

        let (restored, events) = run(
            deleted,
            TaskCommand::RestoreDeletedTask { task_id: task_id() },
        )
        .unwrap();
        assert_eq!(restored.status(), TaskStatus::Open);
        assert_eq!(
            events,
            vec![TaskEvent::Restored {
                task_id: task_id(),
                restored_status: TaskStatus::Open,
            }]
        );
    }

    #[test]
    fn a_deleted_draft_restores_to_draft() {
        let (restored, _) = run(
            deleted_draft(),
            TaskCommand::RestoreDeletedTask { task_id: task_id() },
        )
        .unwrap();
        assert_eq!(restored.status(), TaskStatus::Draft);
    }

    #[test]
    fn restoring_a_never_deleted_task_rejects() {
        for task in [draft(), open_task(), completed_task()] {
            let status = task.status();
            let (_, rejection) = run(
                task,
                TaskCommand::RestoreDeletedTask { task_id: task_id() },
            )
            .unwrap_err();
            match rejection {
                TaskRejection::CannotRestoreDeletedTask {
                    status: found,
                    ..
                } => assert_eq!(found, status),
                other => panic!("expected CannotRestoreDeletedTask, got {other:?}"),
            }
        }
    }

    #[test]
    fn deleting_a_completed_or_deleted_task_rejects() {
        let (_, rejection) = run(
            completed_task(),
            TaskCommand::DeleteTask { task_id: task_id() },
        )
        .unwrap_err();
        assert!(matches!(rejection, TaskRejection::CannotDeleteTask { .. }));

        let (_, rejection) = run(
            deleted_draft(),
            TaskCommand::DeleteTask { task_id: task_id() },
        )
        .unwrap_err();
        assert!(matches!(rejection, TaskRejection::CannotDeleteTask { .. }));
    }

    #[test]
    fn label_assignment_succeeds_on_draft_and_open_with_exactly_one_event() {
        for task in [draft(), open_task()] {
            let (task, events) = run(
                task,
                TaskCommand::AssignLabel {
                    task_id: task_id(),
                    label_id: label_id("urgent"),
                },
            )
            .unwrap();
            assert_eq!(events.len(), 1);
            assert!(task.labels().contains(&label_id("urgent")));
        }
    }

    #[test]
    fn label_assignment_rejects_on_deleted_and_completed() {
        for task in [deleted_draft(), completed_task()] {
            let (_, rejection) = run(
                task,
                TaskCommand::AssignLabel {
                    task_id: task_id(),
                    label_id: label_id("urgent"),
                },
            )
            .unwrap_err();
            assert!(matches!(
                rejection,
                TaskRejection::CannotAssignLabelToTask { .. }
            ));
        }
    }

    #[test]
    fn label_removal_rejects_on_deleted_and_completed() {
        for task in [deleted_draft(), completed_task()] {
            let (_, rejection) = run(
                task,
                TaskCommand::RemoveLabel {
                    task_id: task_id(),
                    label_id: label_id("urgent"),
                },
            )
            .unwrap_err();
            assert!(matches!(
                rejection,
                TaskRejection::CannotRemoveLabelFromTask { .. }
            ));
        }
    }

    #[test]
    fn the_label_set_deduplicates_repeated_assignment() {
        let (task, _) = run(
            draft(),
            TaskCommand::AssignLabel {
                task_id: task_id(),
                label_id: label_id("urgent"),
            },
        )
        .unwrap();
        let (task, _) = run(
            task,
            TaskCommand::AssignLabel {
                task_id: task_id(),
                label_id: label_id("urgent"),
            },
        )
        .unwrap();
        assert_eq!(task.labels().len(), 1);
    }

    #[test]
    fn description_update_embeds_both_sides_of_the_change() {
        let change = ValueChange::new(
            description("write the report"),
            description("file the report"),
        );
        let (task, events) = run(
            open_task(),
            TaskCommand::UpdateDescription {
                task_id: task_id(),
                change: change.clone(),
            },
        )
        .unwrap();
        assert_eq!(task.description(), &description("file the report"));
        assert_eq!(
            events,
            vec![TaskEvent::DescriptionUpdated {
                task_id: task_id(),
                change,
            }]
        );
    }

    #[test]
    fn stale_description_update_rejects_with_the_actual_value_and_version() {
        let task = open_task();
        let version_before = task.version();
        let change = ValueChange::new(description("someone else's view"), description("mine"));
        let (task, rejection) = run(
            task,
            TaskCommand::UpdateDescription {
                task_id: task_id(),
                change,
            },
        )
        .unwrap_err();

        match rejection {
            TaskRejection::CannotUpdateTaskDescription { mismatch, .. } => {
                assert_eq!(mismatch.expected, description("someone else's view"));
                assert_eq!(mismatch.actual, description("write the report"));
                assert_eq!(mismatch.proposed, description("mine"));
                assert_eq!(mismatch.version_at_check, version_before);
            }
            other => panic!("expected CannotUpdateTaskDescription, got {other:?}"),
        }
        // No event was applied, so the version is unchanged.
        assert_eq!(task.version(), version_before);
    }

    #[test]
    fn priority_and_due_date_updates_follow_the_same_contract() {
        let due = Timestamp::now();
        let (task, _) = run(
            open_task(),
            TaskCommand::UpdatePriority {
                task_id: task_id(),
                change: ValueChange::new(TaskPriority::Normal, TaskPriority::High),
            },
        )
        .unwrap();
        assert_eq!(task.priority(), TaskPriority::High);

        let (task, _) = run(
            task,
            TaskCommand::UpdateDueDate {
                task_id: task_id(),
                change: ValueChange::new(None, Some(due)),
            },
        )
        .unwrap();
        assert_eq!(task.due_date(), Some(due));

        let (_, rejection) = run(
            task,
            TaskCommand::UpdatePriority {
                task_id: task_id(),
                change: ValueChange::new(TaskPriority::Normal, TaskPriority::Low),
            },
        )
        .unwrap_err();
        assert!(matches!(
            rejection,
            TaskRejection::CannotUpdateTaskPriority { .. }
        ));
    }

    #[test]
    fn updates_reject_on_completed_and_deleted_tasks() {
        for task in [completed_task(), deleted_draft()] {
            let (_, rejection) = run(
                task,
                TaskCommand::UpdateDescription {
                    task_id: task_id(),
                    change: ValueChange::new(description("write the report"), description("x")),
                },
            )
            .unwrap_err();
            assert!(matches!(rejection, TaskRejection::CannotUpdateTask { .. }));
        }
    }

    #[test]
    fn commands_against_a_missing_task_reject_with_not_found() {
        let (_, rejection) = run(
            Task::default(),
            TaskCommand::FinalizeDraft { task_id: task_id() },
        )
        .unwrap_err();
        assert!(matches!(rejection, TaskRejection::TaskNotFound { .. }));
    }

    /// One step of an arbitrary command sequence, chosen by index.
    fn arbitrary_command(choice: u8, due: Timestamp) -> TaskCommand {
        match choice % 10 {
            0 => TaskCommand::CreateDraft { task_id: task_id() },
            1 => TaskCommand::FinalizeDraft { task_id: task_id() },
            2 => TaskCommand::CompleteTask { task_id: task_id() },
            3 => TaskCommand::ReopenTask { task_id: task_id() },
            4 => TaskCommand::DeleteTask { task_id: task_id() },
            5 => TaskCommand::RestoreDeletedTask { task_id: task_id() },
            6 => TaskCommand::AssignLabel {
                task_id: task_id(),
                label_id: label_id("a"),
            },
            7 => TaskCommand::RemoveLabel {
                task_id: task_id(),
                label_id: label_id("a"),
            },
            8 => TaskCommand::UpdateDueDate {
                task_id: task_id(),
                change: ValueChange::new(None, Some(due)),
            },
            _ => TaskCommand::CreateTask {
                task_id: task_id(),
                description: description("generated"),
            },
        }
    }

    proptest! {
        /// Whatever a valid command sequence does to the live state,
        /// replaying the emitted events from scratch reproduces it.
        #[test]
        fn replay_reproduces_live_state(choices in proptest::collection::vec(any::<u8>(), 0..60)) {
            let due = Timestamp::now();
            let mut live = Task::default();
            let mut log: Vec<TaskEvent> = Vec::new();

            for choice in choices {
                if let Ok(events) = live.handle(arbitrary_command(choice, due)) {
                    for event in &events {
                        live = live.apply(event);
                    }
                    log.extend(events);
                }
            }

            let replayed = Task::replay(&log);
            prop_assert_eq!(&replayed, &live);

            let version: u64 = live.version().into();
            prop_assert_eq!(version, log.len() as u64);
        }
    }
}
