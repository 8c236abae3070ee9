//! The dispatch and query runtime.
//!
//! A [`Kernel`] owns the injected store and bus, the projection registry,
//! and the process manager, and exposes the two entrypoints everything
//! outside the kernel uses: `dispatch` for commands and the typed query
//! methods for the read side.
//!
//! Dispatch serializes per aggregate id: a registry of async mutexes
//! guarantees at most one in-flight command mutates a given aggregate,
//! while commands for different ids run fully in parallel. The append and
//! the publication both happen under the aggregate's guard, so events
//! reach subscribers in history order per aggregate. Process commands take
//! no aggregate guard themselves; the follow-up commands they fan out
//! into are dispatched one by one, each taking its own target's guard.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::{debug, info_span, warn, Instrument};

use crate::aggregate::Aggregate;
use crate::bus::{EventBus, EventContext, EventSubscriber};
use crate::command::KernelCommand;
use crate::enrichment::{EnrichmentSource, StoreEnricher};
use crate::errors::DispatchResult;
use crate::event::{EventKind, KernelEvent};
use crate::event_store::{EventStore, EventToWrite, ExpectedVersion, StoredEvent};
use crate::label::{LabelCommand, TaskLabel};
use crate::process::{ProcessCommand, ProcessInstance, ProcessManager};
use crate::projection::ProjectionRegistry;
use crate::task::{Task, TaskCommand};
use crate::types::{AggregateId, CommandId, LabelId, ProcessId};
use crate::views::{DraftTasksView, LabelledTasksView, MyListView};

/// Wires a store and a bus into a ready [`Kernel`].
///
/// Construction is two-phase: the builder registers the projections and
/// the process manager as bus subscribers, then hands out the kernel
/// whose enricher reads through the same store. Nothing is global; a
/// process may hold several independent kernels.
pub struct KernelBuilder<ES> {
    store: Arc<ES>,
    bus: Arc<dyn EventBus>,
}

impl<ES> KernelBuilder<ES>
where
    ES: EventStore<Event = KernelEvent>,
{
    /// Starts a build from the injected collaborators.
    pub const fn new(store: Arc<ES>, bus: Arc<dyn EventBus>) -> Self {
        Self { store, bus }
    }

    /// Registers the kernel's subscribers and hands out the kernel.
    pub async fn build(self) -> Kernel<ES> {
        let projections = Arc::new(ProjectionRegistry::new());
        let process_manager = Arc::new(ProcessManager::new());

        self.bus
            .subscribe(
                &EventKind::ALL,
                Arc::clone(&projections) as Arc<dyn EventSubscriber>,
            )
            .await;
        self.bus
            .subscribe(
                &ProcessManager::INTERESTS,
                Arc::clone(&process_manager) as Arc<dyn EventSubscriber>,
            )
            .await;

        Kernel {
            enricher: StoreEnricher::new(Arc::clone(&self.store)),
            store: self.store,
            bus: self.bus,
            projections,
            process_manager,
            locks: Mutex::new(HashMap::new()),
        }
    }
}

/// The assembled kernel: command dispatch plus read-side queries.
pub struct Kernel<ES> {
    store: Arc<ES>,
    bus: Arc<dyn EventBus>,
    enricher: StoreEnricher<ES>,
    projections: Arc<ProjectionRegistry>,
    process_manager: Arc<ProcessManager>,
    locks: Mutex<HashMap<AggregateId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<ES> Kernel<ES>
where
    ES: EventStore<Event = KernelEvent>,
{
    /// Handles one command: validate, append, publish.
    ///
    /// Returns the events recorded on behalf of the command, in append
    /// order, once they are durable and published. A process command
    /// returns the events its follow-up commands recorded. Rejections and
    /// store failures come back as [`DispatchError`](crate::errors::DispatchError).
    pub async fn dispatch(
        &self,
        command: KernelCommand,
    ) -> DispatchResult<Vec<StoredEvent<KernelEvent>>> {
        self.dispatch_boxed(command).await
    }

    /// Snapshot of the draft-tasks view.
    pub fn draft_tasks(&self) -> DraftTasksView {
        self.projections.draft_tasks()
    }

    /// Snapshot of the whole-list view.
    pub fn my_list(&self) -> MyListView {
        self.projections.my_list()
    }

    /// Snapshot of one label's view, if any event ever routed to it.
    pub fn labelled_tasks(&self, label_id: &LabelId) -> Option<LabelledTasksView> {
        self.projections.labelled_tasks(label_id)
    }

    /// Snapshot of one task-creation flow, if it exists.
    pub fn process(&self, process_id: &ProcessId) -> Option<ProcessInstance> {
        self.process_manager.instance(process_id)
    }

    /// The store this kernel appends to.
    pub const fn store(&self) -> &Arc<ES> {
        &self.store
    }

    /// Process commands fan out into further dispatches, so the recursion
    /// is boxed.
    fn dispatch_boxed(
        &self,
        command: KernelCommand,
    ) -> BoxFuture<'_, DispatchResult<Vec<StoredEvent<KernelEvent>>>> {
        Box::pin(async move {
            let command_id = CommandId::new();
            let span = info_span!("dispatch", command = command.name(), %command_id);
            async move {
                match command {
                    KernelCommand::Task(command) => self.execute_task(command, command_id).await,
                    KernelCommand::Label(command) => self.execute_label(command, command_id).await,
                    KernelCommand::Process(command) => self.execute_process(command).await,
                }
            }
            .instrument(span)
            .await
        })
    }

    async fn execute_task(
        &self,
        command: TaskCommand,
        command_id: CommandId,
    ) -> DispatchResult<Vec<StoredEvent<KernelEvent>>> {
        let aggregate_id = AggregateId::from(command.task_id());
        let lock = self.lock_for(&aggregate_id);
        let _guard = lock.lock().await;

        let history = self.store.history(&aggregate_id).await?;
        let task = Task::replay(history.iter().filter_map(|stored| stored.payload().as_task()));
        let events = match task.handle(command) {
            Ok(events) => events,
            Err(rejection) => {
                warn!(%aggregate_id, %rejection, "task command rejected");
                return Err(rejection.into());
            }
        };

        let expected = if history.is_empty() {
            ExpectedVersion::New
        } else {
            ExpectedVersion::Exact(task.version())
        };
        let writes = events
            .into_iter()
            .map(|event| EventToWrite::new(command_id, KernelEvent::Task(event)))
            .collect();
        self.append_and_publish(&aggregate_id, writes, expected).await
    }

    async fn execute_label(
        &self,
        command: LabelCommand,
        command_id: CommandId,
    ) -> DispatchResult<Vec<StoredEvent<KernelEvent>>> {
        let aggregate_id = AggregateId::from(command.label_id());
        let lock = self.lock_for(&aggregate_id);
        let _guard = lock.lock().await;

        let history = self.store.history(&aggregate_id).await?;
        let label = TaskLabel::replay(
            history
                .iter()
                .filter_map(|stored| stored.payload().as_label()),
        );
        let events = match label.handle(command) {
            Ok(events) => events,
            Err(rejection) => {
                warn!(%aggregate_id, %rejection, "label command rejected");
                return Err(rejection.into());
            }
        };

        let expected = if history.is_empty() {
            ExpectedVersion::New
        } else {
            ExpectedVersion::Exact(label.version())
        };
        let writes = events
            .into_iter()
            .map(|event| EventToWrite::new(command_id, KernelEvent::Label(event)))
            .collect();
        self.append_and_publish(&aggregate_id, writes, expected).await
    }

    async fn execute_process(
        &self,
        command: ProcessCommand,
    ) -> DispatchResult<Vec<StoredEvent<KernelEvent>>> {
        let process_id = command.process_id().clone();
        let started_here = matches!(command, ProcessCommand::StartTaskCreation { .. });
        let follow_ups = match self.process_manager.handle_command(command) {
            Ok(follow_ups) => follow_ups,
            Err(rejection) => {
                warn!(%process_id, %rejection, "process command rejected");
                return Err(rejection.into());
            }
        };

        let mut recorded = Vec::new();
        for follow_up in follow_ups {
            match self.dispatch_boxed(follow_up).await {
                Ok(events) => recorded.extend(events),
                Err(error) => {
                    // A start whose draft cannot be created leaves no
                    // instance behind.
                    if started_here {
                        self.process_manager.abort(&process_id);
                    }
                    return Err(error);
                }
            }
        }
        Ok(recorded)
    }

    async fn append_and_publish(
        &self,
        aggregate_id: &AggregateId,
        writes: Vec<EventToWrite<KernelEvent>>,
        expected: ExpectedVersion,
    ) -> DispatchResult<Vec<StoredEvent<KernelEvent>>> {
        let stored = self.store.append(aggregate_id, writes, expected).await?;
        debug!(%aggregate_id, appended = stored.len(), "events appended");
        for event in &stored {
            let enrichment = self.enricher.enrich(event.payload()).await;
            self.bus.publish(event, &EventContext::new(enrichment)).await;
        }
        Ok(stored)
    }

    fn lock_for(&self, aggregate_id: &AggregateId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(aggregate_id.clone()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{
        DispatchError, EventStoreError, EventStoreResult, Rejection, TaskRejection,
    };
    use crate::types::{EventVersion, TaskDescription, TaskId, Timestamp};
    use async_trait::async_trait;

    /// An honest little store: version checks enforced, conflicts mutate
    /// nothing.
    #[derive(Default)]
    struct MapStore {
        histories: Mutex<HashMap<AggregateId, Vec<StoredEvent<KernelEvent>>>>,
    }

    #[async_trait]
    impl EventStore for MapStore {
        type Event = KernelEvent;

        async fn history(
            &self,
            aggregate_id: &AggregateId,
        ) -> EventStoreResult<Vec<StoredEvent<KernelEvent>>> {
            Ok(self
                .histories
                .lock()
                .get(aggregate_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn append(
            &self,
            aggregate_id: &AggregateId,
            events: Vec<EventToWrite<KernelEvent>>,
            expected: ExpectedVersion,
        ) -> EventStoreResult<Vec<StoredEvent<KernelEvent>>> {
            let mut histories = self.histories.lock();
            let history = histories.entry(aggregate_id.clone()).or_default();
            let current = history
                .last()
                .map_or_else(EventVersion::initial, |stored| stored.version);

            let holds = match expected {
                ExpectedVersion::New => history.is_empty(),
                ExpectedVersion::Exact(version) => version == current,
                ExpectedVersion::Any => true,
            };
            if !holds {
                let expected_version = match expected {
                    ExpectedVersion::Exact(version) => version,
                    ExpectedVersion::New | ExpectedVersion::Any => EventVersion::initial(),
                };
                return Err(EventStoreError::VersionConflict {
                    aggregate_id: aggregate_id.clone(),
                    expected: expected_version,
                    current,
                });
            }

            let start = history.len();
            for event in events {
                let version = history
                    .last()
                    .map_or_else(EventVersion::initial, |stored| stored.version)
                    .next();
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

        async fn current_version(
            &self,
            aggregate_id: &AggregateId,
        ) -> EventStoreResult<EventVersion> {
            Ok(self
                .histories
                .lock()
                .get(aggregate_id)
                .and_then(|history| history.last())
                .map_or_else(EventVersion::initial, |stored| stored.version))
        }
    }

    /// A bus that drops everything; subscriber behavior is tested where
    /// the in-memory bus lives.
    struct NullBus;

    #[async_trait]
    impl EventBus for NullBus {
        async fn subscribe(&self, _kinds: &[EventKind], _subscriber: Arc<dyn EventSubscriber>) {}

        async fn publish(&self, _event: &StoredEvent<KernelEvent>, _context: &EventContext) {}
    }

    async fn kernel() -> Kernel<MapStore> {
        KernelBuilder::new(Arc::new(MapStore::default()), Arc::new(NullBus))
            .build()
            .await
    }

    fn task_id() -> TaskId {
        TaskId::try_new("task-1").unwrap()
    }

    #[tokio::test]
    async fn dispatching_a_create_returns_the_recorded_event() {
        let kernel = kernel().await;
        let stored = kernel
            .dispatch(KernelCommand::Task(TaskCommand::CreateDraft {
                task_id: task_id(),
            }))
            .await
            .unwrap();

        assert_eq!(stored.len(), 1);
        let version: u64 = stored[0].version.into();
        assert_eq!(version, 1);
        assert_eq!(stored[0].aggregate_id, AggregateId::from(&task_id()));
    }

    #[tokio::test]
    async fn versions_grow_by_one_per_recorded_event() {
        let kernel = kernel().await;
        kernel
            .dispatch(KernelCommand::Task(TaskCommand::CreateDraft {
                task_id: task_id(),
            }))
            .await
            .unwrap();
        let stored = kernel
            .dispatch(KernelCommand::Task(TaskCommand::FinalizeDraft {
                task_id: task_id(),
            }))
            .await
            .unwrap();

        let version: u64 = stored[0].version.into();
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn a_rejection_records_nothing() {
        let kernel = kernel().await;
        let error = kernel
            .dispatch(KernelCommand::Task(TaskCommand::CompleteTask {
                task_id: task_id(),
            }))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            DispatchError::Rejected(Rejection::Task(TaskRejection::TaskNotFound { .. }))
        ));
        let history = kernel
            .store()
            .history(&AggregateId::from(&task_id()))
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn a_process_start_fans_out_into_draft_creation() {
        let kernel = kernel().await;
        let process_id = ProcessId::try_new("proc-1").unwrap();
        let stored = kernel
            .dispatch(KernelCommand::Process(ProcessCommand::StartTaskCreation {
                process_id: process_id.clone(),
                task_id: task_id(),
            }))
            .await
            .unwrap();

        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].payload().kind(), EventKind::TaskDraftCreated);
        assert!(kernel.process(&process_id).is_some());
    }

    #[tokio::test]
    async fn a_start_that_cannot_create_its_draft_leaves_no_instance() {
        let kernel = kernel().await;
        kernel
            .dispatch(KernelCommand::Task(TaskCommand::CreateTask {
                task_id: task_id(),
                description: TaskDescription::try_new("already here").unwrap(),
            }))
            .await
            .unwrap();

        let process_id = ProcessId::try_new("proc-1").unwrap();
        let error = kernel
            .dispatch(KernelCommand::Process(ProcessCommand::StartTaskCreation {
                process_id: process_id.clone(),
                task_id: task_id(),
            }))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            DispatchError::Rejected(Rejection::Task(TaskRejection::TaskAlreadyExists { .. }))
        ));
        assert!(kernel.process(&process_id).is_none());
    }

    #[tokio::test]
    async fn one_lock_per_aggregate_id() {
        let kernel = kernel().await;
        let first = kernel.lock_for(&AggregateId::from(&task_id()));
        let again = kernel.lock_for(&AggregateId::from(&task_id()));
        let other = kernel.lock_for(&AggregateId::from(&TaskId::try_new("task-2").unwrap()));

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
    }
}
