//! The `TaskLabel` aggregate: a named, colored marker assignable to tasks.
//!
//! Labels live independently of the tasks that carry them. Their id sits in
//! the same store namespace as task ids, so the two aggregate types share
//! one event store without key collisions.

use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::errors::LabelRejection;
use crate::mismatch::{detect, ValueChange};
use crate::types::{EventVersion, LabelDetails, LabelId};

/// Commands the `TaskLabel` aggregate decides on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelCommand {
    /// Create a label with the given details.
    CreateLabel {
        /// Id of the label to create.
        label_id: LabelId,
        /// Initial title and color.
        details: LabelDetails,
    },
    /// Rewrite title and color together, declaring the observed details.
    UpdateLabelDetails {
        /// Target label.
        label_id: LabelId,
        /// Observed and desired details.
        change: ValueChange<LabelDetails>,
    },
}

impl LabelCommand {
    /// The label this command targets.
    pub const fn label_id(&self) -> &LabelId {
        match self {
            Self::CreateLabel { label_id, .. } | Self::UpdateLabelDetails { label_id, .. } => {
                label_id
            }
        }
    }

    /// Short command name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateLabel { .. } => "CreateLabel",
            Self::UpdateLabelDetails { .. } => "UpdateLabelDetails",
        }
    }
}

/// Events recorded by the `TaskLabel` aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelEvent {
    /// A label came into existence.
    Created {
        /// The new label.
        label_id: LabelId,
        /// Its initial title and color.
        details: LabelDetails,
    },
    /// Title and color were rewritten; both sides are recorded.
    DetailsUpdated {
        /// The changed label.
        label_id: LabelId,
        /// Previous and new details.
        change: ValueChange<LabelDetails>,
    },
}

impl LabelEvent {
    /// The label this event belongs to.
    pub const fn label_id(&self) -> &LabelId {
        match self {
            Self::Created { label_id, .. } | Self::DetailsUpdated { label_id, .. } => label_id,
        }
    }
}

/// State of one label, derived solely from its event history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLabel {
    id: Option<LabelId>,
    details: LabelDetails,
    version: EventVersion,
}

impl TaskLabel {
    /// Whether any event has created this label yet.
    pub const fn exists(&self) -> bool {
        self.id.is_some()
    }

    /// The label id, once created.
    pub const fn id(&self) -> Option<&LabelId> {
        self.id.as_ref()
    }

    /// Current title and color.
    pub const fn details(&self) -> &LabelDetails {
        &self.details
    }

    /// Number of events applied to this label.
    pub const fn version(&self) -> EventVersion {
        self.version
    }
}

impl Aggregate for TaskLabel {
    const AGGREGATE_TYPE: &'static str = "task_label";

    type Command = LabelCommand;
    type Event = LabelEvent;
    type Rejection = LabelRejection;

    fn handle(&self, command: Self::Command) -> Result<Vec<Self::Event>, Self::Rejection> {
        match command {
            LabelCommand::CreateLabel { label_id, details } => {
                if self.exists() {
                    return Err(LabelRejection::LabelAlreadyExists { label_id });
                }
                Ok(vec![LabelEvent::Created { label_id, details }])
            }

            LabelCommand::UpdateLabelDetails { label_id, change } => {
                if !self.exists() {
                    return Err(LabelRejection::LabelNotFound { label_id });
                }
                detect(&change, &self.details, self.version).map_err(|mismatch| {
                    LabelRejection::CannotUpdateLabelDetails {
                        label_id: label_id.clone(),
                        mismatch,
                    }
                })?;
                Ok(vec![LabelEvent::DetailsUpdated { label_id, change }])
            }
        }
    }

    fn apply(self, event: &Self::Event) -> Self {
        let version = self.version.next();
        match event {
            LabelEvent::Created { label_id, details } => Self {
                id: Some(label_id.clone()),
                details: details.clone(),
                version,
            },
            LabelEvent::DetailsUpdated { change, .. } => Self {
                details: change.new.clone(),
                version,
                ..self
            },
        }
    }
}
