//! The task-creation process manager (saga).
//!
//! A wizard-style creation flow spans several commands: start a draft,
//! shape it, label it, then either complete or cancel. The process manager
//! holds one instance per flow, keyed by a process id distinct from the
//! task id. Command-in transitions return the follow-up kernel commands to
//! dispatch; event-in transitions consume the bus stream to acknowledge
//! progress and to learn the draft's last-known field values, which become
//! the declared previous values of the updates issued at completion.
//!
//! Every event-in transition is idempotent keyed by the instance's phase
//! and values, never by counting deliveries: redelivering a finalization
//! event to a confirmed instance changes nothing.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bus::{EventContext, EventSubscriber};
use crate::command::KernelCommand;
use crate::errors::ProcessRejection;
use crate::event::{EventKind, KernelEvent};
use crate::event_store::StoredEvent;
use crate::label::LabelCommand;
use crate::mismatch::ValueChange;
use crate::task::{TaskCommand, TaskEvent};
use crate::types::{
    LabelDetails, LabelId, ProcessId, ProcessPhase, TaskDescription, TaskId, TaskPriority,
    Timestamp,
};

/// Commands the process manager decides on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessCommand {
    /// Begin a creation flow: a fresh process instance plus a draft task.
    StartTaskCreation {
        /// Id of the new process instance.
        process_id: ProcessId,
        /// Id of the draft task the flow creates.
        task_id: TaskId,
    },
    /// Buffer field values to apply when the flow completes.
    SetTaskDetails {
        /// Target process instance.
        process_id: ProcessId,
        /// Description to apply at completion, if given.
        description: Option<TaskDescription>,
        /// Priority to apply at completion, if given.
        priority: Option<TaskPriority>,
        /// Due date to apply at completion, if given.
        due_date: Option<Timestamp>,
    },
    /// Attach labels to the draft: existing ones by id, new ones by
    /// details (these get a label aggregate created first).
    AddLabels {
        /// Target process instance.
        process_id: ProcessId,
        /// Labels that already exist.
        existing: Vec<LabelId>,
        /// Labels to create before assignment.
        new: Vec<LabelDetails>,
    },
    /// Apply the buffered fields to the draft, then finalize it.
    CompleteTaskCreation {
        /// Target process instance.
        process_id: ProcessId,
    },
    /// Abandon the flow; the draft stays a draft.
    CancelTaskCreation {
        /// Target process instance.
        process_id: ProcessId,
    },
}

impl ProcessCommand {
    /// The process instance this command targets.
    pub const fn process_id(&self) -> &ProcessId {
        match self {
            Self::StartTaskCreation { process_id, .. }
            | Self::SetTaskDetails { process_id, .. }
            | Self::AddLabels { process_id, .. }
            | Self::CompleteTaskCreation { process_id }
            | Self::CancelTaskCreation { process_id } => process_id,
        }
    }

    /// Short command name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StartTaskCreation { .. } => "StartTaskCreation",
            Self::SetTaskDetails { .. } => "SetTaskDetails",
            Self::AddLabels { .. } => "AddLabels",
            Self::CompleteTaskCreation { .. } => "CompleteTaskCreation",
            Self::CancelTaskCreation { .. } => "CancelTaskCreation",
        }
    }
}

/// Field values buffered by the flow, waiting for completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferedDetails {
    /// Description to apply, if any was set.
    pub description: Option<TaskDescription>,
    /// Priority to apply, if any was set.
    pub priority: Option<TaskPriority>,
    /// Due date to apply, if any was set.
    pub due_date: Option<Timestamp>,
}

/// The draft's field values as last observed on the event stream.
///
/// These are the declared previous values of the update commands issued at
/// completion, so a draft changed out of band since the last observation
/// surfaces as a mismatch instead of being silently overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedDraft {
    /// Last observed description.
    pub description: TaskDescription,
    /// Last observed priority.
    pub priority: TaskPriority,
    /// Last observed due date.
    pub due_date: Option<Timestamp>,
}

/// One task-creation flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInstance {
    process_id: ProcessId,
    task_id: TaskId,
    phase: ProcessPhase,
    buffered: BufferedDetails,
    observed: ObservedDraft,
}

impl ProcessInstance {
    fn new(process_id: ProcessId, task_id: TaskId) -> Self {
        Self {
            process_id,
            task_id,
            phase: ProcessPhase::Created,
            buffered: BufferedDetails::default(),
            observed: ObservedDraft::default(),
        }
    }

    /// The instance's own id.
    pub const fn process_id(&self) -> &ProcessId {
        &self.process_id
    }

    /// The draft task this flow creates.
    pub const fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Current phase.
    pub const fn phase(&self) -> ProcessPhase {
        self.phase
    }

    /// Values buffered so far.
    pub const fn buffered(&self) -> &BufferedDetails {
        &self.buffered
    }

    /// The draft's last-known field values.
    pub const fn observed(&self) -> &ObservedDraft {
        &self.observed
    }

    fn ensure_accepting(&self) -> Result<(), ProcessRejection> {
        if self.phase.is_terminal() {
            return Err(ProcessRejection::ProcessAlreadyTerminal {
                process_id: self.process_id.clone(),
                phase: self.phase,
            });
        }
        Ok(())
    }

    /// The update commands completion must issue: one per buffered field
    /// that differs from the draft's last-known value.
    fn pending_updates(&self) -> Vec<TaskCommand> {
        let mut updates = Vec::new();
        if let Some(description) = &self.buffered.description {
            if *description != self.observed.description {
                updates.push(TaskCommand::UpdateDescription {
                    task_id: self.task_id.clone(),
                    change: ValueChange::new(
                        self.observed.description.clone(),
                        description.clone(),
                    ),
                });
            }
        }
        if let Some(priority) = self.buffered.priority {
            if priority != self.observed.priority {
                updates.push(TaskCommand::UpdatePriority {
                    task_id: self.task_id.clone(),
                    change: ValueChange::new(self.observed.priority, priority),
                });
            }
        }
        if let Some(due_date) = self.buffered.due_date {
            if Some(due_date) != self.observed.due_date {
                updates.push(TaskCommand::UpdateDueDate {
                    task_id: self.task_id.clone(),
                    change: ValueChange::new(self.observed.due_date, Some(due_date)),
                });
            }
        }
        updates
    }
}

/// Holds every live flow and runs its transitions.
#[derive(Default)]
pub struct ProcessManager {
    instances: RwLock<HashMap<ProcessId, ProcessInstance>>,
    by_task: RwLock<HashMap<TaskId, ProcessId>>,
}

impl ProcessManager {
    /// The event kinds the manager subscribes to.
    pub const INTERESTS: [EventKind; 5] = [
        EventKind::TaskDraftCreated,
        EventKind::TaskDescriptionUpdated,
        EventKind::TaskPriorityUpdated,
        EventKind::TaskDueDateUpdated,
        EventKind::TaskDraftFinalized,
    ];

    /// Creates a manager with no live flows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one flow, if it exists.
    pub fn instance(&self, process_id: &ProcessId) -> Option<ProcessInstance> {
        self.instances.read().get(process_id).cloned()
    }

    /// Runs one command-in transition.
    ///
    /// On success the instance has taken its next state and the returned
    /// commands are what the flow needs dispatched, in order.
    pub fn handle_command(
        &self,
        command: ProcessCommand,
    ) -> Result<Vec<KernelCommand>, ProcessRejection> {
        match command {
            ProcessCommand::StartTaskCreation {
                process_id,
                task_id,
            } => {
                {
                    let mut instances = self.instances.write();
                    if instances.contains_key(&process_id) {
                        return Err(ProcessRejection::ProcessAlreadyExists { process_id });
                    }
                    instances.insert(
                        process_id.clone(),
                        ProcessInstance::new(process_id.clone(), task_id.clone()),
                    );
                }
                self.by_task.write().insert(task_id.clone(), process_id);
                Ok(vec![KernelCommand::Task(TaskCommand::CreateDraft {
                    task_id,
                })])
            }

            ProcessCommand::SetTaskDetails {
                process_id,
                description,
                priority,
                due_date,
            } => self.with_instance(&process_id, |instance| {
                instance.ensure_accepting()?;
                if let Some(description) = description {
                    instance.buffered.description = Some(description);
                }
                if let Some(priority) = priority {
                    instance.buffered.priority = Some(priority);
                }
                if let Some(due_date) = due_date {
                    instance.buffered.due_date = Some(due_date);
                }
                instance.phase = ProcessPhase::InProgress;
                Ok(Vec::new())
            }),

            ProcessCommand::AddLabels {
                process_id,
                existing,
                new,
            } => self.with_instance(&process_id, |instance| {
                instance.ensure_accepting()?;
                let mut commands = Vec::new();
                for label_id in existing {
                    commands.push(KernelCommand::Task(TaskCommand::AssignLabel {
                        task_id: instance.task_id.clone(),
                        label_id,
                    }));
                }
                for details in new {
                    let label_id = LabelId::new();
                    commands.push(KernelCommand::Label(LabelCommand::CreateLabel {
                        label_id: label_id.clone(),
                        details,
                    }));
                    commands.push(KernelCommand::Task(TaskCommand::AssignLabel {
                        task_id: instance.task_id.clone(),
                        label_id,
                    }));
                }
                instance.phase = ProcessPhase::InProgress;
                Ok(commands)
            }),

            ProcessCommand::CompleteTaskCreation { process_id } => {
                self.with_instance(&process_id, |instance| {
                    instance.ensure_accepting()?;
                    let mut commands: Vec<KernelCommand> = instance
                        .pending_updates()
                        .into_iter()
                        .map(KernelCommand::Task)
                        .collect();
                    commands.push(KernelCommand::Task(TaskCommand::FinalizeDraft {
                        task_id: instance.task_id.clone(),
                    }));
                    // Confirmation only ever comes from observing the
                    // finalization event, not from issuing the command.
                    instance.phase = ProcessPhase::InProgress;
                    Ok(commands)
                })
            }

            ProcessCommand::CancelTaskCreation { process_id } => {
                self.with_instance(&process_id, |instance| {
                    instance.ensure_accepting()?;
                    instance.phase = ProcessPhase::Canceled;
                    Ok(Vec::new())
                })
            }
        }
    }

    /// Removes a flow whose start could not create its draft.
    pub fn abort(&self, process_id: &ProcessId) {
        let removed = self.instances.write().remove(process_id);
        if let Some(instance) = removed {
            self.by_task.write().remove(&instance.task_id);
            warn!(%process_id, task_id = %instance.task_id, "aborted task-creation process");
        }
    }

    /// Runs one event-in transition.
    pub fn observe(&self, event: &TaskEvent) {
        let Some(process_id) = self.by_task.read().get(event.task_id()).cloned() else {
            return;
        };
        let mut instances = self.instances.write();
        let Some(instance) = instances.get_mut(&process_id) else {
            return;
        };

        match event {
            TaskEvent::DraftCreated { .. } => {
                debug!(%process_id, task_id = %instance.task_id, "draft creation acknowledged");
            }
            TaskEvent::DescriptionUpdated { change, .. } => {
                instance.observed.description = change.new.clone();
            }
            TaskEvent::PriorityUpdated { change, .. } => {
                instance.observed.priority = change.new;
            }
            TaskEvent::DueDateUpdated { change, .. } => {
                instance.observed.due_date = change.new;
            }
            TaskEvent::DraftFinalized { .. } => {
                if !instance.phase.is_terminal() {
                    instance.phase = ProcessPhase::Confirmed;
                    debug!(%process_id, task_id = %instance.task_id, "task-creation process confirmed");
                }
            }
            _ => {}
        }
    }

    fn with_instance<F>(
        &self,
        process_id: &ProcessId,
        transition: F,
    ) -> Result<Vec<KernelCommand>, ProcessRejection>
    where
        F: FnOnce(&mut ProcessInstance) -> Result<Vec<KernelCommand>, ProcessRejection>,
    {
        let mut instances = self.instances.write();
        let instance = instances
            .get_mut(process_id)
            .ok_or_else(|| ProcessRejection::ProcessNotFound {
                process_id: process_id.clone(),
            })?;
        transition(instance)
    }
}

#[async_trait]
impl EventSubscriber for ProcessManager {
    fn name(&self) -> &'static str {
        "task-creation-process"
    }

    async fn on_event(&self, event: &StoredEvent<KernelEvent>, _context: &EventContext) {
        if let KernelEvent::Task(task_event) = event.payload() {
            self.observe(task_event);
        }
    }
}
