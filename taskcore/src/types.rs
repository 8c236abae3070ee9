//! Core identifier and value types for the task-management kernel.
//!
//! Every identifier uses a smart constructor so that an instance, once
//! obtained, is known to be valid ("parse, don't validate"). Value types
//! that participate in change descriptors carry `Default` impls because a
//! freshly created aggregate reports default field values until they are
//! explicitly set.

use chrono::{DateTime, Utc};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a `Task` aggregate.
///
/// Guaranteed non-empty and at most 255 characters. Ids are opaque; callers
/// may supply their own via `try_new` or mint a unique one with [`TaskId::new`].
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct TaskId(String);

impl TaskId {
    /// Mints a globally unique task id backed by a UUIDv7.
    pub fn new() -> Self {
        Self::try_new(Uuid::now_v7().to_string()).expect("a UUID string is never empty")
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a `TaskLabel` aggregate.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct LabelId(String);

impl LabelId {
    /// Mints a globally unique label id backed by a UUIDv7.
    pub fn new() -> Self {
        Self::try_new(Uuid::now_v7().to_string()).expect("a UUID string is never empty")
    }
}

impl Default for LabelId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a task-creation process (saga) instance.
///
/// Distinct from the `TaskId` the process drives; one process creates
/// exactly one task, but the two ids live in different namespaces.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct ProcessId(String);

impl ProcessId {
    /// Mints a globally unique process id backed by a UUIDv7.
    pub fn new() -> Self {
        Self::try_new(Uuid::now_v7().to_string()).expect("a UUID string is never empty")
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

/// Key under which an aggregate's event history is stored.
///
/// `TaskId`, `LabelId`, and `ProcessId` values are globally unique, so the
/// store key is the plain id string. The `From` impls below are the only
/// sanctioned way to build one from a typed id.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct AggregateId(String);

impl From<&TaskId> for AggregateId {
    fn from(id: &TaskId) -> Self {
        Self::try_new(id.as_ref()).expect("a valid TaskId is a valid AggregateId")
    }
}

impl From<&LabelId> for AggregateId {
    fn from(id: &LabelId) -> Self {
        Self::try_new(id.as_ref()).expect("a valid LabelId is a valid AggregateId")
    }
}

/// Globally unique event identifier in UUIDv7 format.
///
/// The v7 layout makes ids sortable by creation time, which keeps stored
/// histories naturally ordered.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new `EventId` with the current timestamp.
    pub fn new() -> Self {
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() always returns a valid v7 UUID")
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier of a dispatched command, recorded on every event it causes.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct CommandId(Uuid);

impl CommandId {
    /// Creates a new `CommandId` with the current timestamp.
    pub fn new() -> Self {
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() always returns a valid v7 UUID")
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

/// The version of an aggregate, equal to the number of events applied to it.
///
/// Versions start at 0 for a fresh aggregate and increment by exactly one
/// per applied event; they never skip or regress.
#[nutype(
    validate(greater_or_equal = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Display,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct EventVersion(u64);

impl EventVersion {
    /// The version of an aggregate with no applied events.
    pub fn initial() -> Self {
        Self::try_new(0).expect("0 is always a valid version")
    }

    /// Returns the version after one more applied event.
    #[must_use]
    pub fn next(self) -> Self {
        let current: u64 = self.into();
        Self::try_new(current + 1).expect("incremented version is always valid")
    }
}

impl Default for EventVersion {
    fn default() -> Self {
        Self::initial()
    }
}

/// Moment at which an event was recorded, or a task falls due.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp from a UTC `DateTime`.
    pub const fn new(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// Creates a timestamp representing the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Returns the underlying `DateTime`.
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Converts the timestamp into the underlying `DateTime`.
    pub const fn into_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self::new(datetime)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(timestamp: Timestamp) -> Self {
        timestamp.into_datetime()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle status of a task.
///
/// A deleted task is still a task: `Deleted` is a status, not the end of
/// the aggregate. The status a task held when it was deleted is recorded so
/// a restore can return to it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TaskStatus {
    /// Created through the wizard, not yet finalized.
    #[default]
    Draft,
    /// Actionable; reached by reopening, restoring, or basic creation.
    Open,
    /// Actionable; reached by finalizing a draft.
    Finalized,
    /// Done. Only reopening leaves this status.
    Completed,
    /// Soft-deleted, restorable to the status recorded at deletion.
    Deleted,
}

impl TaskStatus {
    /// Whether a task in this status accepts field updates and label edits.
    pub const fn is_actionable(self) -> bool {
        matches!(self, Self::Draft | Self::Open | Self::Finalized)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "DRAFT"),
            Self::Open => write!(f, "OPEN"),
            Self::Finalized => write!(f, "FINALIZED"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Deleted => write!(f, "DELETED"),
        }
    }
}

/// Phase of a task-creation process instance.
///
/// Phases only move forward; `Confirmed` and `Canceled` are terminal.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ProcessPhase {
    /// Instance exists and its draft has been requested.
    #[default]
    Created,
    /// At least one detail or label has been accumulated.
    InProgress,
    /// The draft was finalized; the workflow is complete.
    Confirmed,
    /// The workflow was abandoned; the draft stays a draft.
    Canceled,
}

impl ProcessPhase {
    /// Whether this phase accepts no further transitions.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Canceled)
    }
}

impl std::fmt::Display for ProcessPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Confirmed => write!(f, "CONFIRMED"),
            Self::Canceled => write!(f, "CANCELED"),
        }
    }
}

/// Free-text description of a task.
///
/// Empty is legal: a draft starts with no description until the creator
/// supplies one, and change descriptors must be able to declare "previously
/// unset" as an expected value.
#[nutype(
    sanitize(trim),
    validate(len_char_max = 2000),
    default = "",
    derive(
        Debug,
        Clone,
        Default,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct TaskDescription(String);

/// Urgency of a task. New tasks are `Normal` until changed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TaskPriority {
    /// Needs attention before normal work.
    High,
    /// The default urgency.
    #[default]
    Normal,
    /// Can wait.
    Low,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Normal => write!(f, "normal"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Display title of a label. Empty until set, mirroring task descriptions.
#[nutype(
    sanitize(trim),
    validate(len_char_max = 255),
    default = "",
    derive(
        Debug,
        Clone,
        Default,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct LabelTitle(String);

/// Display color of a label. Labels start out `Gray`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum LabelColor {
    /// The default color of a freshly created label.
    #[default]
    Gray,
    /// Red.
    Red,
    /// Green.
    Green,
    /// Blue.
    Blue,
}

impl std::fmt::Display for LabelColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gray => write!(f, "gray"),
            Self::Red => write!(f, "red"),
            Self::Green => write!(f, "green"),
            Self::Blue => write!(f, "blue"),
        }
    }
}

/// Title and color of a label, updated together as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelDetails {
    /// Display title.
    pub title: LabelTitle,
    /// Display color.
    pub color: LabelColor,
}

impl LabelDetails {
    /// Creates label details from a title, with the default color.
    pub const fn new(title: LabelTitle) -> Self {
        Self {
            title,
            color: LabelColor::Gray,
        }
    }

    /// Creates label details with an explicit color.
    pub const fn with_color(title: LabelTitle, color: LabelColor) -> Self {
        Self { title, color }
    }
}

/// Description and priority of a task, as consumed by read-side views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskDetails {
    /// Free-text description.
    pub description: TaskDescription,
    /// Urgency.
    pub priority: TaskPriority,
}
