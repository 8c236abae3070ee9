//! Error taxonomy for the task-management kernel.
//!
//! Three families, kept deliberately distinct:
//!
//! - **Rejections**: expected business outcomes (invalid transition, label
//!   guard, stale change descriptor). Typed values, never auto-retried.
//! - **Store failures**: infrastructure trouble or a stale expected
//!   version at append time. Fatal to the dispatching caller, which may
//!   retry at its own discretion.
//! - **Enrichment misses** are *not* errors at all: a missing referenced
//!   aggregate resolves to a default value in the enrichment layer.

use thiserror::Error;

use crate::mismatch::ValueMismatch;
use crate::types::{
    AggregateId, EventVersion, LabelDetails, LabelId, ProcessId, ProcessPhase, TaskDescription,
    TaskId, TaskPriority, TaskStatus, Timestamp,
};

/// Business rejections raised by the `Task` aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskRejection {
    /// A creation command targeted an id that already has history.
    #[error("task {task_id} already exists")]
    TaskAlreadyExists {
        /// The contested id.
        task_id: TaskId,
    },

    /// A non-creation command targeted an id with no history.
    #[error("task {task_id} does not exist")]
    TaskNotFound {
        /// The missing id.
        task_id: TaskId,
    },

    /// Finalize is only valid on a draft.
    #[error("cannot finalize task {task_id}: status is {status}, not DRAFT")]
    CannotFinalizeDraft {
        /// The target task.
        task_id: TaskId,
        /// Status found instead of `Draft`.
        status: TaskStatus,
    },

    /// Complete is only valid on an open or finalized task.
    #[error("cannot complete task {task_id}: status is {status}")]
    CannotCompleteTask {
        /// The target task.
        task_id: TaskId,
        /// Status found.
        status: TaskStatus,
    },

    /// Reopen is only valid on a completed task.
    #[error("cannot reopen task {task_id}: status is {status}, not COMPLETED")]
    CannotReopenTask {
        /// The target task.
        task_id: TaskId,
        /// Status found.
        status: TaskStatus,
    },

    /// Delete is not valid on a completed or already-deleted task.
    #[error("cannot delete task {task_id}: status is {status}")]
    CannotDeleteTask {
        /// The target task.
        task_id: TaskId,
        /// Status found.
        status: TaskStatus,
    },

    /// Restore is only valid on a deleted task, including when the target
    /// is a never-deleted draft.
    #[error("cannot restore task {task_id}: status is {status}, not DELETED")]
    CannotRestoreDeletedTask {
        /// The target task.
        task_id: TaskId,
        /// Status found instead of `Deleted`.
        status: TaskStatus,
    },

    /// Labels cannot be assigned to deleted or completed tasks.
    #[error("cannot assign label {label_id} to task {task_id}: status is {status}")]
    CannotAssignLabelToTask {
        /// The target task.
        task_id: TaskId,
        /// The label that was to be assigned.
        label_id: LabelId,
        /// Status found.
        status: TaskStatus,
    },

    /// Labels cannot be removed from deleted or completed tasks.
    #[error("cannot remove label {label_id} from task {task_id}: status is {status}")]
    CannotRemoveLabelFromTask {
        /// The target task.
        task_id: TaskId,
        /// The label that was to be removed.
        label_id: LabelId,
        /// Status found.
        status: TaskStatus,
    },

    /// Field updates are not valid on deleted or completed tasks.
    #[error("cannot update task {task_id}: status is {status}")]
    CannotUpdateTask {
        /// The target task.
        task_id: TaskId,
        /// Status found.
        status: TaskStatus,
    },

    /// The declared previous description was stale.
    #[error("cannot update description of task {task_id}: {mismatch}")]
    CannotUpdateTaskDescription {
        /// The target task.
        task_id: TaskId,
        /// What was declared, what was found, what was proposed.
        mismatch: ValueMismatch<TaskDescription>,
    },

    /// The declared previous priority was stale.
    #[error("cannot update priority of task {task_id}: {mismatch}")]
    CannotUpdateTaskPriority {
        /// The target task.
        task_id: TaskId,
        /// What was declared, what was found, what was proposed.
        mismatch: ValueMismatch<TaskPriority>,
    },

    /// The declared previous due date was stale.
    #[error("cannot update due date of task {task_id}: {mismatch}")]
    CannotUpdateTaskDueDate {
        /// The target task.
        task_id: TaskId,
        /// What was declared, what was found, what was proposed.
        mismatch: ValueMismatch<Option<Timestamp>>,
    },
}

/// Business rejections raised by the `TaskLabel` aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelRejection {
    /// A creation command targeted an id that already has history.
    #[error("label {label_id} already exists")]
    LabelAlreadyExists {
        /// The contested id.
        label_id: LabelId,
    },

    /// An update targeted an id with no history.
    #[error("label {label_id} does not exist")]
    LabelNotFound {
        /// The missing id.
        label_id: LabelId,
    },

    /// The declared previous details were stale.
    #[error("cannot update details of label {label_id}: {mismatch}")]
    CannotUpdateLabelDetails {
        /// The target label.
        label_id: LabelId,
        /// What was declared, what was found, what was proposed.
        mismatch: ValueMismatch<LabelDetails>,
    },
}

/// Business rejections raised by the task-creation process manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessRejection {
    /// A start command reused an existing process id.
    #[error("task-creation process {process_id} already exists")]
    ProcessAlreadyExists {
        /// The contested id.
        process_id: ProcessId,
    },

    /// A command targeted an unknown process id.
    #[error("task-creation process {process_id} does not exist")]
    ProcessNotFound {
        /// The missing id.
        process_id: ProcessId,
    },

    /// A command targeted an instance already in a terminal phase.
    #[error("task-creation process {process_id} is already {phase} and accepts no further commands")]
    ProcessAlreadyTerminal {
        /// The target instance.
        process_id: ProcessId,
        /// The terminal phase it is in.
        phase: ProcessPhase,
    },
}

/// Any business rejection the kernel can answer a command with.
///
/// Rejections are expected outcomes; they carry the ids and evidence the
/// caller needs to decide what to do next and are never retried by the
/// kernel itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Raised by the `Task` aggregate.
    #[error(transparent)]
    Task(#[from] TaskRejection),

    /// Raised by the `TaskLabel` aggregate.
    #[error(transparent)]
    Label(#[from] LabelRejection),

    /// Raised by the task-creation process manager.
    #[error(transparent)]
    Process(#[from] ProcessRejection),
}

/// Failures of the event log store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventStoreError {
    /// The append was based on a version that is no longer current.
    #[error("version conflict on {aggregate_id}: expected {expected}, current is {current}")]
    VersionConflict {
        /// The aggregate whose history moved underneath the writer.
        aggregate_id: AggregateId,
        /// The version the writer based its events on.
        expected: EventVersion,
        /// The version actually found at append time.
        current: EventVersion,
    },

    /// The store cannot be reached at the moment.
    #[error("event store unavailable: {reason}")]
    Unavailable {
        /// Human-readable cause.
        reason: String,
    },

    /// An unexpected internal store failure.
    #[error("event store internal error: {reason}")]
    Internal {
        /// Human-readable cause.
        reason: String,
    },
}

/// Outcome surface of [`dispatch`](crate::runtime::Kernel::dispatch).
///
/// `Rejected` is the business half of the taxonomy; `Store` is the system
/// half. A stale-expected-version conflict arrives as `Store` because it
/// signals the single-writer discipline was violated from outside, not a
/// business decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The command was understood and deliberately refused.
    #[error("command rejected: {0}")]
    Rejected(#[from] Rejection),

    /// The event log store failed while reading or appending.
    #[error("event store failure: {0}")]
    Store(#[from] EventStoreError),
}

impl From<TaskRejection> for DispatchError {
    fn from(rejection: TaskRejection) -> Self {
        Self::Rejected(Rejection::Task(rejection))
    }
}

impl From<LabelRejection> for DispatchError {
    fn from(rejection: LabelRejection) -> Self {
        Self::Rejected(Rejection::Label(rejection))
    }
}

impl From<ProcessRejection> for DispatchError {
    fn from(rejection: ProcessRejection) -> Self {
        Self::Rejected(Rejection::Process(rejection))
    }
}

/// Result alias for store operations.
pub type EventStoreResult<T> = Result<T, EventStoreError>;

/// Result alias for command dispatch.
pub type DispatchResult<T> = Result<T, DispatchError>;
