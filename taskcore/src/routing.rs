//! Computes which projection instances fold which published event.
//!
//! Two families of label-view targeting exist. Direct: the event itself
//! carries the label id (assignment, removal, label lifecycle). Enrichment
//! dependent: the event carries only a task id, and the target label views
//! are read from the enrichment's label list, which may be empty or carry
//! many ids. Routing is total and never errors; an unresolvable target set
//! is simply empty.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::enrichment::EventEnrichment;
use crate::event::KernelEvent;
use crate::label::LabelEvent;
use crate::task::TaskEvent;
use crate::types::LabelId;

/// Identity of one projection instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProjectionId {
    /// The singleton view of draft tasks.
    DraftTasks,
    /// The singleton whole-list view.
    MyList,
    /// The per-label view keyed by this label id.
    Labelled(LabelId),
}

impl std::fmt::Display for ProjectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DraftTasks => write!(f, "draft-tasks"),
            Self::MyList => write!(f, "my-list"),
            Self::Labelled(label_id) => write!(f, "labelled:{label_id}"),
        }
    }
}

/// The label ids whose per-label views fold this event.
///
/// Direct-routed events yield exactly the id they carry; enrichment-routed
/// events expand to the enriched label list. Duplicates collapse because
/// the result is a set.
pub fn label_targets(event: &KernelEvent, enrichment: &EventEnrichment) -> BTreeSet<LabelId> {
    match event {
        KernelEvent::Task(task_event) => match task_event {
            TaskEvent::LabelAssigned { label_id, .. }
            | TaskEvent::LabelRemoved { label_id, .. } => {
                BTreeSet::from([label_id.clone()])
            }
            TaskEvent::DescriptionUpdated { .. }
            | TaskEvent::PriorityUpdated { .. }
            | TaskEvent::DueDateUpdated { .. }
            | TaskEvent::Completed { .. }
            | TaskEvent::Reopened { .. }
            | TaskEvent::Deleted { .. }
            | TaskEvent::Restored { .. } => enrichment.label_ids.iter().cloned().collect(),
            TaskEvent::DraftCreated { .. }
            | TaskEvent::Created { .. }
            | TaskEvent::DraftFinalized { .. } => BTreeSet::new(),
        },
        KernelEvent::Label(label_event) => match label_event {
            LabelEvent::Created { label_id, .. }
            | LabelEvent::DetailsUpdated { label_id, .. } => BTreeSet::from([label_id.clone()]),
        },
    }
}

/// The full set of projection instances that fold this event.
pub fn routes(event: &KernelEvent, enrichment: &EventEnrichment) -> BTreeSet<ProjectionId> {
    let mut targets: BTreeSet<ProjectionId> = label_targets(event, enrichment)
        .into_iter()
        .map(ProjectionId::Labelled)
        .collect();

    if let KernelEvent::Task(task_event) = event {
        match task_event {
            TaskEvent::DraftCreated { .. } => {
                targets.insert(ProjectionId::DraftTasks);
            }
            TaskEvent::Created { .. }
            | TaskEvent::Completed { .. }
            | TaskEvent::Reopened { .. }
            | TaskEvent::LabelAssigned { .. }
            | TaskEvent::LabelRemoved { .. } => {
                targets.insert(ProjectionId::MyList);
            }
            TaskEvent::DescriptionUpdated { .. }
            | TaskEvent::PriorityUpdated { .. }
            | TaskEvent::DueDateUpdated { .. }
            | TaskEvent::DraftFinalized { .. }
            | TaskEvent::Deleted { .. }
            | TaskEvent::Restored { .. } => {
                targets.insert(ProjectionId::DraftTasks);
                targets.insert(ProjectionId::MyList);
            }
        }
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::task::Task;

    fn task_id() -> crate::types::TaskId {
        crate::types::TaskId::try_new("task-1").unwrap()
    }

    fn label(name: &str) -> LabelId {
        LabelId::try_new(name).unwrap()
    }

    fn enrichment_with_labels(labels: &[LabelId]) -> EventEnrichment {
        let task = labels.iter().fold(
            Task::default().apply(&TaskEvent::DraftCreated { task_id: task_id() }),
            |task, label_id| {
                task.apply(&TaskEvent::LabelAssigned {
                    task_id: task_id(),
                    label_id: label_id.clone(),
                })
            },
        );
        EventEnrichment {
            label_ids: labels.to_vec(),
            task,
            ..EventEnrichment::default()
        }
    }

    #[test]
    fn label_assignment_routes_to_exactly_the_carried_label() {
        let event = KernelEvent::Task(TaskEvent::LabelAssigned {
            task_id: task_id(),
            label_id: label("l"),
        });
        // Direct routing ignores whatever the enrichment claims.
        let enrichment = enrichment_with_labels(&[label("l1"), label("l2")]);
        assert_eq!(
            label_targets(&event, &enrichment),
            BTreeSet::from([label("l")])
        );
    }

    #[test]
    fn task_completion_expands_to_the_enriched_label_list() {
        let event = KernelEvent::Task(TaskEvent::Completed { task_id: task_id() });
        let enrichment = enrichment_with_labels(&[label("l1"), label("l2")]);
        assert_eq!(
            label_targets(&event, &enrichment),
            BTreeSet::from([label("l1"), label("l2")])
        );
    }

    #[test]
    fn an_unlabelled_task_yields_an_empty_target_set() {
        let event = KernelEvent::Task(TaskEvent::Completed { task_id: task_id() });
        let enrichment = enrichment_with_labels(&[]);
        assert!(label_targets(&event, &enrichment).is_empty());
        assert_eq!(
            routes(&event, &enrichment),
            BTreeSet::from([ProjectionId::MyList])
        );
    }

    #[test]
    fn duplicate_enriched_ids_collapse_into_one_target() {
        let event = KernelEvent::Task(TaskEvent::Reopened { task_id: task_id() });
        let enrichment = EventEnrichment {
            label_ids: vec![label("l1"), label("l1")],
            ..EventEnrichment::default()
        };
        assert_eq!(
            label_targets(&event, &enrichment),
            BTreeSet::from([label("l1")])
        );
    }

    #[test]
    fn draft_creation_reaches_only_the_draft_view() {
        let event = KernelEvent::Task(TaskEvent::DraftCreated { task_id: task_id() });
        assert_eq!(
            routes(&event, &EventEnrichment::default()),
            BTreeSet::from([ProjectionId::DraftTasks])
        );
    }

    #[test]
    fn finalizing_moves_between_the_two_singleton_views() {
        let event = KernelEvent::Task(TaskEvent::DraftFinalized { task_id: task_id() });
        assert_eq!(
            routes(&event, &EventEnrichment::default()),
            BTreeSet::from([ProjectionId::DraftTasks, ProjectionId::MyList])
        );
    }

    #[test]
    fn deletion_fans_out_to_every_view_holding_the_task() {
        let event = KernelEvent::Task(TaskEvent::Deleted {
            task_id: task_id(),
            prior_status: crate::types::TaskStatus::Open,
        });
        let enrichment = enrichment_with_labels(&[label("l1")]);
        assert_eq!(
            routes(&event, &enrichment),
            BTreeSet::from([
                ProjectionId::DraftTasks,
                ProjectionId::MyList,
                ProjectionId::Labelled(label("l1")),
            ])
        );
    }

    #[test]
    fn label_lifecycle_events_route_direct_to_their_own_view() {
        let event = KernelEvent::Label(LabelEvent::Created {
            label_id: label("l"),
            details: crate::types::LabelDetails::default(),
        });
        assert_eq!(
            routes(&event, &EventEnrichment::default()),
            BTreeSet::from([ProjectionId::Labelled(label("l"))])
        );
    }
}
