//! `TaskCore` - Event-sourced task-management kernel
//!
//! Every change to a task or label is decided by a pure aggregate, recorded
//! as an immutable event under an optimistic version check, and folded back
//! into state on replay. On top of the log sit enrichment (read-through
//! cross-aggregate context), fan-out routing into per-label and list
//! projections, and a task-creation process manager that drives the
//! multi-step creation flow to a confirmed or canceled end.
//!
//! The [`runtime::Kernel`] ties it together: commands go in through
//! `dispatch`, which serializes per aggregate id, appends, enriches, and
//! publishes; queries come back out as cloned view snapshots. Storage is
//! injected behind the [`event_store::EventStore`] trait (the
//! `taskcore-memory` crate ships the in-memory one).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregate;
pub mod bus;
pub mod command;
pub mod enrichment;
pub mod errors;
pub mod event;
pub mod event_store;
pub mod label;
pub mod mismatch;
pub mod process;
pub mod projection;
pub mod routing;
pub mod runtime;
pub mod task;
pub mod types;
pub mod views;

pub use aggregate::Aggregate;
pub use bus::{EventBus, EventContext, EventSubscriber};
pub use command::KernelCommand;
pub use enrichment::{EnrichmentSource, EventEnrichment, StoreEnricher};
pub use errors::{
    DispatchError, DispatchResult, EventStoreError, EventStoreResult, LabelRejection,
    ProcessRejection, Rejection, TaskRejection,
};
pub use event::{EventKind, KernelEvent};
pub use event_store::{EventStore, EventToWrite, ExpectedVersion, StoredEvent};
pub use label::{LabelCommand, LabelEvent, TaskLabel};
pub use mismatch::{ValueChange, ValueMismatch};
pub use process::{ProcessCommand, ProcessInstance, ProcessManager};
pub use projection::ProjectionRegistry;
pub use routing::ProjectionId;
pub use runtime::{Kernel, KernelBuilder};
pub use task::{Task, TaskCommand, TaskEvent};
pub use types::{
    AggregateId, CommandId, EventId, EventVersion, LabelColor, LabelDetails, LabelId, LabelTitle,
    ProcessId, ProcessPhase, TaskDescription, TaskDetails, TaskId, TaskPriority, TaskStatus,
    Timestamp,
};
pub use views::{DraftTasksView, LabelledTasksView, ListedTask, MyListView, TaskSummary};
