//! The kernel-wide command union and its dispatch metadata.
//!
//! `dispatch` takes one `KernelCommand`; the variant selects the handler
//! table entry (task aggregate, label aggregate, or the task-creation
//! process manager).

use crate::label::LabelCommand;
use crate::process::ProcessCommand;
use crate::task::TaskCommand;
use crate::types::AggregateId;

/// Union of every command the kernel accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelCommand {
    /// A command for the `Task` aggregate.
    Task(TaskCommand),
    /// A command for the `TaskLabel` aggregate.
    Label(LabelCommand),
    /// A command for the task-creation process manager.
    Process(ProcessCommand),
}

impl KernelCommand {
    /// Short command name for spans and logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Task(command) => command.name(),
            Self::Label(command) => command.name(),
            Self::Process(command) => command.name(),
        }
    }

    /// The store key this command writes under, when it targets an
    /// aggregate directly. Process commands target no single aggregate;
    /// the commands they fan out into carry their own targets.
    pub fn aggregate_id(&self) -> Option<AggregateId> {
        match self {
            Self::Task(command) => Some(AggregateId::from(command.task_id())),
            Self::Label(command) => Some(AggregateId::from(command.label_id())),
            Self::Process(_) => None,
        }
    }
}

impl From<TaskCommand> for KernelCommand {
    fn from(command: TaskCommand) -> Self {
        Self::Task(command)
    }
}

impl From<LabelCommand> for KernelCommand {
    fn from(command: LabelCommand) -> Self {
        Self::Label(command)
    }
}

impl From<ProcessCommand> for KernelCommand {
    fn from(command: ProcessCommand) -> Self {
        Self::Process(command)
    }
}
