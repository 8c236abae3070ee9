//! The three read-side views and their pure folds.
//!
//! Each view is a serde-serializable value folded from the events routed
//! to it. Folds are total: an event a view has no interest in, or an
//! update for a task the view no longer holds, leaves the view unchanged.
//! Replaying the same routed sequence always rebuilds the same view.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::enrichment::EventEnrichment;
use crate::event::KernelEvent;
use crate::label::LabelEvent;
use crate::task::{Task, TaskEvent};
use crate::types::{
    LabelDetails, LabelId, TaskDescription, TaskId, TaskPriority, TaskStatus, Timestamp,
};

/// One task as the read side summarizes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// The summarized task.
    pub task_id: TaskId,
    /// Current description.
    pub description: TaskDescription,
    /// Current priority.
    pub priority: TaskPriority,
    /// Current due date, if any.
    pub due_date: Option<Timestamp>,
    /// Whether the task is completed.
    pub completed: bool,
}

impl TaskSummary {
    fn of(task_id: TaskId, task: &Task) -> Self {
        Self {
            description: task.description().clone(),
            priority: task.priority(),
            due_date: task.due_date(),
            completed: task.status() == TaskStatus::Completed,
            task_id,
        }
    }
}

/// Singleton view of every task currently in `Draft` status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftTasksView {
    drafts: BTreeMap<TaskId, TaskSummary>,
}

impl DraftTasksView {
    /// Folds one routed event into the view.
    #[must_use]
    pub fn apply(mut self, event: &KernelEvent, enrichment: &EventEnrichment) -> Self {
        let KernelEvent::Task(event) = event else {
            return self;
        };
        match event {
            TaskEvent::DraftCreated { task_id } => {
                self.drafts
                    .insert(task_id.clone(), TaskSummary::of(task_id.clone(), &enrichment.task));
            }
            TaskEvent::DescriptionUpdated { task_id, change } => {
                if let Some(draft) = self.drafts.get_mut(task_id) {
                    draft.description = change.new.clone();
                }
            }
            TaskEvent::PriorityUpdated { task_id, change } => {
                if let Some(draft) = self.drafts.get_mut(task_id) {
                    draft.priority = change.new;
                }
            }
            TaskEvent::DueDateUpdated { task_id, change } => {
                if let Some(draft) = self.drafts.get_mut(task_id) {
                    draft.due_date = change.new;
                }
            }
            TaskEvent::DraftFinalized { task_id } | TaskEvent::Deleted { task_id, .. } => {
                self.drafts.remove(task_id);
            }
            TaskEvent::Restored {
                task_id,
                restored_status: TaskStatus::Draft,
            } => {
                self.drafts
                    .insert(task_id.clone(), TaskSummary::of(task_id.clone(), &enrichment.task));
            }
            _ => {}
        }
        self
    }

    /// The draft with the given id, if the view holds it.
    pub fn get(&self, task_id: &TaskId) -> Option<&TaskSummary> {
        self.drafts.get(task_id)
    }

    /// Whether the view holds the given task.
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.drafts.contains_key(task_id)
    }

    /// All held drafts in id order.
    pub fn drafts(&self) -> impl Iterator<Item = &TaskSummary> {
        self.drafts.values()
    }

    /// Number of held drafts.
    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    /// Whether the view holds no drafts.
    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }
}

/// Per-label view of the tasks carrying one label, plus that label's
/// current title and color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelledTasksView {
    label_id: LabelId,
    details: LabelDetails,
    tasks: BTreeMap<TaskId, TaskSummary>,
}

impl LabelledTasksView {
    /// Creates the empty view for one label.
    pub fn new(label_id: LabelId) -> Self {
        Self {
            label_id,
            details: LabelDetails::default(),
            tasks: BTreeMap::new(),
        }
    }

    /// Folds one routed event into the view.
    #[must_use]
    pub fn apply(mut self, event: &KernelEvent, enrichment: &EventEnrichment) -> Self {
        match event {
            KernelEvent::Label(LabelEvent::Created { label_id, details })
                if *label_id == self.label_id =>
            {
                self.details = details.clone();
            }
            KernelEvent::Label(LabelEvent::DetailsUpdated { label_id, change })
                if *label_id == self.label_id =>
            {
                self.details = change.new.clone();
            }
            KernelEvent::Task(event) => self.apply_task_event(event, enrichment),
            KernelEvent::Label(_) => {}
        }
        self
    }

    fn apply_task_event(&mut self, event: &TaskEvent, enrichment: &EventEnrichment) {
        match event {
            TaskEvent::LabelAssigned { task_id, label_id } if *label_id == self.label_id => {
                self.tasks
                    .insert(task_id.clone(), TaskSummary::of(task_id.clone(), &enrichment.task));
            }
            TaskEvent::LabelRemoved { task_id, label_id } if *label_id == self.label_id => {
                self.tasks.remove(task_id);
            }
            TaskEvent::Deleted { task_id, .. } => {
                self.tasks.remove(task_id);
            }
            TaskEvent::Restored { task_id, .. } => {
                if enrichment.task.labels().contains(&self.label_id) {
                    self.tasks.insert(
                        task_id.clone(),
                        TaskSummary::of(task_id.clone(), &enrichment.task),
                    );
                }
            }
            TaskEvent::Completed { task_id } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.completed = true;
                }
            }
            TaskEvent::Reopened { task_id } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.completed = false;
                }
            }
            TaskEvent::DescriptionUpdated { task_id, change } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.description = change.new.clone();
                }
            }
            TaskEvent::PriorityUpdated { task_id, change } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.priority = change.new;
                }
            }
            TaskEvent::DueDateUpdated { task_id, change } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.due_date = change.new;
                }
            }
            _ => {}
        }
    }

    /// The label this view is keyed by.
    pub const fn label_id(&self) -> &LabelId {
        &self.label_id
    }

    /// The label's current title and color.
    pub const fn details(&self) -> &LabelDetails {
        &self.details
    }

    /// The task with the given id, if the view holds it.
    pub fn get(&self, task_id: &TaskId) -> Option<&TaskSummary> {
        self.tasks.get(task_id)
    }

    /// Whether the view holds the given task.
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.tasks.contains_key(task_id)
    }

    /// All held tasks in id order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskSummary> {
        self.tasks.values()
    }

    /// Number of held tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the view holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// One entry of the whole-list view: a summary plus its label ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedTask {
    /// The summarized task.
    pub summary: TaskSummary,
    /// Labels the task currently carries.
    pub labels: BTreeSet<LabelId>,
}

impl ListedTask {
    fn of(task_id: TaskId, task: &Task) -> Self {
        Self {
            summary: TaskSummary::of(task_id, task),
            labels: task.labels().clone(),
        }
    }
}

/// Singleton view of every non-draft, non-deleted task.
///
/// Drafts enter this view when finalized (or when created directly as
/// open tasks), carry a completion flag rather than disappearing when
/// completed, and leave it only on deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyListView {
    tasks: BTreeMap<TaskId, ListedTask>,
}

impl MyListView {
    /// Folds one routed event into the view.
    #[must_use]
    pub fn apply(mut self, event: &KernelEvent, enrichment: &EventEnrichment) -> Self {
        let KernelEvent::Task(event) = event else {
            return self;
        };
        match event {
            TaskEvent::Created { task_id, .. } | TaskEvent::DraftFinalized { task_id } => {
                self.tasks
                    .insert(task_id.clone(), ListedTask::of(task_id.clone(), &enrichment.task));
            }
            TaskEvent::Completed { task_id } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.summary.completed = true;
                }
            }
            TaskEvent::Reopened { task_id } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.summary.completed = false;
                }
            }
            TaskEvent::Deleted { task_id, .. } => {
                self.tasks.remove(task_id);
            }
            TaskEvent::Restored {
                task_id,
                restored_status,
            } => {
                if *restored_status != TaskStatus::Draft {
                    self.tasks
                        .insert(task_id.clone(), ListedTask::of(task_id.clone(), &enrichment.task));
                }
            }
            TaskEvent::DescriptionUpdated { task_id, change } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.summary.description = change.new.clone();
                }
            }
            TaskEvent::PriorityUpdated { task_id, change } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.summary.priority = change.new;
                }
            }
            TaskEvent::DueDateUpdated { task_id, change } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.summary.due_date = change.new;
                }
            }
            TaskEvent::LabelAssigned { task_id, label_id } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.labels.insert(label_id.clone());
                }
            }
            TaskEvent::LabelRemoved { task_id, label_id } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.labels.remove(label_id);
                }
            }
            TaskEvent::DraftCreated { .. } => {}
        }
        self
    }

    /// The entry with the given id, if the view holds it.
    pub fn get(&self, task_id: &TaskId) -> Option<&ListedTask> {
        self.tasks.get(task_id)
    }

    /// Whether the view holds the given task.
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.tasks.contains_key(task_id)
    }

    /// All held entries in id order.
    pub fn entries(&self) -> impl Iterator<Item = &ListedTask> {
        self.tasks.values()
    }

    /// Number of held entries.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the view holds no entries.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
