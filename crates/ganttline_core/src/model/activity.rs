//! Activity domain model.
//!
//! # Responsibility
//! - Define the canonical schedulable record rendered on the Gantt chart.
//! - Define create/update request shapes consumed by the dependency engine.
//! - Own field-level validation shared by repository and service layers.
//!
//! # Invariants
//! - `id` is stable, never nil and never reused for another activity.
//! - `end` is strictly after `start`.
//! - `progress` stays within `0..=100`; `order` is never negative.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Maximum activity name length in characters.
pub const MAX_NAME_CHARS: usize = 255;
/// Maximum color hint length in characters.
pub const MAX_COLOR_CHARS: usize = 50;
/// Upper bound for `progress`.
pub const MAX_PROGRESS: u8 = 100;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Stable identifier for every activity.
pub type ActivityId = Uuid;

/// Workflow state of an activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    /// Created but not started.
    #[default]
    Todo,
    /// Work is in progress.
    InProgress,
    /// Finished.
    Completed,
    /// Waiting on something outside the plan.
    Blocked,
}

/// Chart shape of an activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    /// Regular bar.
    #[default]
    Task,
    /// Grouping bar spanning other work.
    Project,
    /// Zero-width marker on the chart.
    Milestone,
}

/// Field-level validation failures for activity records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityValidationError {
    /// `id` is the nil UUID.
    NilId,
    /// Name is blank after normalization.
    BlankName,
    /// Name exceeds [`MAX_NAME_CHARS`].
    NameTooLong { chars: usize },
    /// `end` is not strictly after `start`.
    InvalidInterval { start: i64, end: i64 },
    /// `progress` is above [`MAX_PROGRESS`].
    ProgressOutOfRange(u8),
    /// Color hint exceeds [`MAX_COLOR_CHARS`].
    ColorTooLong { chars: usize },
    /// Display order is negative.
    NegativeOrder(i64),
}

impl Display for ActivityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "activity id must not be nil"),
            Self::BlankName => write!(f, "activity name must not be blank"),
            Self::NameTooLong { chars } => write!(
                f,
                "activity name has {chars} characters, at most {MAX_NAME_CHARS} allowed"
            ),
            Self::InvalidInterval { start, end } => {
                write!(f, "end ({end}) must be after start ({start})")
            }
            Self::ProgressOutOfRange(value) => {
                write!(f, "progress ({value}) must be within 0..={MAX_PROGRESS}")
            }
            Self::ColorTooLong { chars } => write!(
                f,
                "color has {chars} characters, at most {MAX_COLOR_CHARS} allowed"
            ),
            Self::NegativeOrder(value) => write!(f, "order ({value}) must not be negative"),
        }
    }
}

impl Error for ActivityValidationError {}

/// Canonical activity record.
///
/// Dependency edges are not part of this record; they live in the store's
/// edge table and are read through [`ActivityDetail`] or the edge lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ActivityWire")]
pub struct Activity {
    pub id: ActivityId,
    pub name: String,
    pub description: Option<String>,
    /// Unix epoch milliseconds.
    pub start: i64,
    /// Unix epoch milliseconds. Strictly greater than `start`.
    pub end: i64,
    pub progress: u8,
    pub status: ActivityStatus,
    /// Serialized as `type` to match external schema naming.
    #[serde(rename = "type")]
    pub kind: ActivityType,
    /// Display hint only.
    pub color: Option<String>,
    /// Display order only. Has no graph semantics.
    pub order: i64,
    /// Epoch ms, maintained by the store.
    pub created_at: i64,
    /// Epoch ms, maintained by the store.
    pub updated_at: i64,
    /// Opaque reference to the creating user.
    pub created_by: Option<String>,
}

#[derive(Deserialize)]
struct ActivityWire {
    id: ActivityId,
    name: String,
    description: Option<String>,
    start: i64,
    end: i64,
    progress: u8,
    status: ActivityStatus,
    #[serde(rename = "type")]
    kind: ActivityType,
    color: Option<String>,
    order: i64,
    created_at: i64,
    updated_at: i64,
    created_by: Option<String>,
}

impl TryFrom<ActivityWire> for Activity {
    type Error = ActivityValidationError;

    fn try_from(wire: ActivityWire) -> Result<Self, Self::Error> {
        let activity = Self {
            id: wire.id,
            name: wire.name,
            description: wire.description,
            start: wire.start,
            end: wire.end,
            progress: wire.progress,
            status: wire.status,
            kind: wire.kind,
            color: wire.color,
            order: wire.order,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
            created_by: wire.created_by,
        };
        activity.validate()?;
        Ok(activity)
    }
}

impl Activity {
    /// Creates an activity with a generated id and default workflow fields.
    ///
    /// Does not validate; callers persisting the record go through
    /// [`Activity::validate`].
    pub fn new(name: impl Into<String>, start: i64, end: i64) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            name: normalize_activity_name(&name.into()),
            description: None,
            start,
            end,
            progress: 0,
            status: ActivityStatus::Todo,
            kind: ActivityType::Task,
            color: None,
            order: 0,
            created_at: now,
            updated_at: now,
            created_by: None,
        }
    }

    /// Creates an activity with a caller-provided stable id.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(
        id: ActivityId,
        name: impl Into<String>,
        start: i64,
        end: i64,
    ) -> Result<Self, ActivityValidationError> {
        if id.is_nil() {
            return Err(ActivityValidationError::NilId);
        }
        let mut activity = Self::new(name, start, end);
        activity.id = id;
        Ok(activity)
    }

    /// Checks every field-level invariant of the record.
    pub fn validate(&self) -> Result<(), ActivityValidationError> {
        if self.id.is_nil() {
            return Err(ActivityValidationError::NilId);
        }
        validate_name(&self.name)?;
        validate_interval(self.start, self.end)?;
        if self.progress > MAX_PROGRESS {
            return Err(ActivityValidationError::ProgressOutOfRange(self.progress));
        }
        if let Some(color) = &self.color {
            let chars = color.chars().count();
            if chars > MAX_COLOR_CHARS {
                return Err(ActivityValidationError::ColorTooLong { chars });
            }
        }
        if self.order < 0 {
            return Err(ActivityValidationError::NegativeOrder(self.order));
        }
        Ok(())
    }

    /// Duration of the bar in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.end - self.start
    }
}

/// Create request for one activity.
///
/// `dependencies` lists prerequisite ids in caller order. An empty list means
/// the activity starts without prerequisites.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewActivity {
    /// Caller-supplied id for import paths. `None` generates a fresh id.
    pub id: Option<ActivityId>,
    pub name: String,
    pub description: Option<String>,
    pub start: i64,
    pub end: i64,
    /// Defaults to `0`.
    pub progress: Option<u8>,
    /// Defaults to [`ActivityStatus::Todo`].
    pub status: Option<ActivityStatus>,
    /// Defaults to [`ActivityType::Task`].
    pub kind: Option<ActivityType>,
    pub color: Option<String>,
    /// Defaults to `0`.
    pub order: Option<i64>,
    pub dependencies: Vec<ActivityId>,
    pub created_by: Option<String>,
}

impl NewActivity {
    /// Minimal create request; every optional field takes its default.
    pub fn new(name: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            ..Self::default()
        }
    }

    /// Sets the prerequisite list.
    pub fn depends_on(mut self, dependencies: impl IntoIterator<Item = ActivityId>) -> Self {
        self.dependencies = dependencies.into_iter().collect();
        self
    }

    /// Builds the record to persist, applying defaults and validation.
    pub fn to_activity(&self) -> Result<Activity, ActivityValidationError> {
        let mut activity = match self.id {
            Some(id) => Activity::with_id(id, self.name.as_str(), self.start, self.end)?,
            None => Activity::new(self.name.as_str(), self.start, self.end),
        };
        activity.description = self.description.clone();
        activity.progress = self.progress.unwrap_or(0);
        activity.status = self.status.unwrap_or_default();
        activity.kind = self.kind.unwrap_or_default();
        activity.color = self.color.clone();
        activity.order = self.order.unwrap_or(0);
        activity.created_by = self.created_by.clone();
        activity.validate()?;
        Ok(activity)
    }
}

/// Partial update request for one activity.
///
/// Every `None` field keeps the stored value. `description` and `color`
/// take `Some(None)` to clear the stored value. For `dependencies`, `None`
/// leaves edges untouched while `Some(vec![])` clears them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub progress: Option<u8>,
    pub status: Option<ActivityStatus>,
    pub kind: Option<ActivityType>,
    pub color: Option<Option<String>>,
    pub order: Option<i64>,
    /// Full replacement of the prerequisite list when present.
    pub dependencies: Option<Vec<ActivityId>>,
}

impl ActivityPatch {
    /// Effective `(start, end)` after overlaying this patch on `current`.
    pub fn effective_interval(&self, current: &Activity) -> (i64, i64) {
        (
            self.start.unwrap_or(current.start),
            self.end.unwrap_or(current.end),
        )
    }

    /// Returns `current` with every supplied scalar field overridden.
    ///
    /// Dependencies are not part of the record and are ignored here.
    pub fn apply_to(&self, current: &Activity) -> Activity {
        let mut next = current.clone();
        if let Some(name) = &self.name {
            next.name = normalize_activity_name(name);
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        let (start, end) = self.effective_interval(current);
        next.start = start;
        next.end = end;
        if let Some(progress) = self.progress {
            next.progress = progress;
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(kind) = self.kind {
            next.kind = kind;
        }
        if let Some(color) = &self.color {
            next.color = color.clone();
        }
        if let Some(order) = self.order {
            next.order = order;
        }
        next
    }
}

/// Activity together with its direct prerequisite ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDetail {
    #[serde(flatten)]
    pub activity: Activity,
    /// Prerequisites in insertion order.
    pub dependencies: Vec<ActivityId>,
}

/// Picker row used when choosing prerequisites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLookup {
    pub id: ActivityId,
    pub name: String,
}

/// Trims and collapses internal whitespace runs to one space.
pub fn normalize_activity_name(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}

/// Rejects intervals where `end` is not strictly after `start`.
pub fn validate_interval(start: i64, end: i64) -> Result<(), ActivityValidationError> {
    if end <= start {
        return Err(ActivityValidationError::InvalidInterval { start, end });
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ActivityValidationError> {
    if name.trim().is_empty() {
        return Err(ActivityValidationError::BlankName);
    }
    let chars = name.chars().count();
    if chars > MAX_NAME_CHARS {
        return Err(ActivityValidationError::NameTooLong { chars });
    }
    Ok(())
}

pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}
