//! Task domain model.
//!
//! # Invariants
//! - `title` is 1-200 chars, `description` at most 1000 chars.
//! - `completed_at` is set only through `mark_completed`, and is cleared
//!   when the status leaves `completed`.

use super::entity::{
    normalize_optional, optional_text, optional_timestamp, required_text, Entity, EntityError,
    EntityMeta,
};
use crate::storage::{FieldValue, Record};
use crate::validate::{FieldSpec, Validator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TASK_STATUSES: &[&str] = &["pending", "in_progress", "completed", "cancelled"];
pub const TASK_PRIORITIES: &[&str] = &["low", "medium", "high", "urgent"];

const TITLE_MAX_CHARS: usize = 200;
const DESCRIPTION_MAX_CHARS: usize = 1000;
const USER_ID_MAX_CHARS: usize = 100;

static TASK_FIELDS: [FieldSpec; 8] = [
    FieldSpec::required(
        "title",
        Validator::Text {
            min: 1,
            max: TITLE_MAX_CHARS,
        },
    ),
    FieldSpec::optional(
        "description",
        Validator::Text {
            min: 0,
            max: DESCRIPTION_MAX_CHARS,
        },
    ),
    FieldSpec::required("status", Validator::Category(TASK_STATUSES)),
    FieldSpec::required("priority", Validator::Category(TASK_PRIORITIES)),
    FieldSpec::required(
        "created_by",
        Validator::Text {
            min: 1,
            max: USER_ID_MAX_CHARS,
        },
    ),
    FieldSpec::optional(
        "assigned_to",
        Validator::Text {
            min: 1,
            max: USER_ID_MAX_CHARS,
        },
    ),
    FieldSpec::optional("due_date", Validator::Date),
    FieldSpec::optional("completed_at", Validator::Timestamp),
];

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Case-insensitive parse.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Task urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Input for constructing a new task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    pub created_by: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Optional `YYYY-MM-DD`.
    #[serde(default)]
    pub due_date: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            created_by: created_by.into(),
            ..Self::default()
        }
    }
}

/// Partial task update; `None` leaves a field untouched.
///
/// Optional columns are cleared by `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<Option<String>>,
    pub due_date: Option<Option<String>>,
}

impl TaskChanges {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Changed fields only, keyed by column name.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        if let Some(title) = &self.title {
            record.insert("title".to_string(), FieldValue::text(title.as_str()));
        }
        if let Some(description) = &self.description {
            record.insert("description".to_string(), description.clone().into());
        }
        if let Some(status) = self.status {
            record.insert("status".to_string(), FieldValue::text(status.as_str()));
            if status != TaskStatus::Completed {
                record.insert("completed_at".to_string(), FieldValue::Null);
            }
        }
        if let Some(priority) = self.priority {
            record.insert("priority".to_string(), FieldValue::text(priority.as_str()));
        }
        if let Some(assigned_to) = &self.assigned_to {
            record.insert("assigned_to".to_string(), assigned_to.clone().into());
        }
        if let Some(due_date) = &self.due_date {
            record.insert("due_date".to_string(), due_date.clone().into());
        }
        record
    }
}

/// Validated task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    #[serde(flatten)]
    meta: EntityMeta,
    title: String,
    description: Option<String>,
    status: TaskStatus,
    priority: TaskPriority,
    created_by: String,
    assigned_to: Option<String>,
    due_date: Option<String>,
    completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates an unpersisted `pending` task.
    pub fn new(data: NewTask) -> Result<Self, EntityError> {
        let task = Self {
            meta: EntityMeta::default(),
            title: data.title.trim().to_string(),
            description: normalize_optional(data.description),
            status: TaskStatus::Pending,
            priority: data.priority,
            created_by: data.created_by.trim().to_string(),
            assigned_to: normalize_optional(data.assigned_to),
            due_date: normalize_optional(data.due_date),
            completed_at: None,
        };
        task.validate()?;
        Ok(task)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn assigned_to(&self) -> Option<&str> {
        self.assigned_to.as_deref()
    }

    pub fn due_date(&self) -> Option<&str> {
        self.due_date.as_deref()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Whether `user_id` created or is assigned to this task.
    pub fn involves(&self, user_id: &str) -> bool {
        self.created_by == user_id || self.assigned_to.as_deref() == Some(user_id)
    }

    pub fn set_title(&mut self, value: impl Into<String>) -> Result<(), EntityError> {
        let value = value.into();
        check_field("title", &FieldValue::text(value.as_str()))?;
        self.title = value.trim().to_string();
        Ok(())
    }

    pub fn set_description(&mut self, value: Option<String>) -> Result<(), EntityError> {
        let value = normalize_optional(value);
        check_field("description", &value.clone().into())?;
        self.description = value;
        Ok(())
    }

    /// Changes status; leaving `completed` clears `completed_at`.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        if status != TaskStatus::Completed {
            self.completed_at = None;
        }
    }

    pub fn set_priority(&mut self, priority: TaskPriority) {
        self.priority = priority;
    }

    pub fn assign_to(&mut self, user_id: Option<String>) -> Result<(), EntityError> {
        let value = normalize_optional(user_id);
        check_field("assigned_to", &value.clone().into())?;
        self.assigned_to = value;
        Ok(())
    }

    pub fn set_due_date(&mut self, value: Option<String>) -> Result<(), EntityError> {
        let value = normalize_optional(value);
        check_field("due_date", &value.clone().into())?;
        self.due_date = value;
        Ok(())
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(now);
    }
}

impl Entity for Task {
    const KIND: &'static str = "task";
    const TABLE: &'static str = "tasks";

    fn fields() -> &'static [FieldSpec] {
        &TASK_FIELDS
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("title".to_string(), FieldValue::text(self.title.as_str()));
        record.insert("description".to_string(), self.description.clone().into());
        record.insert("status".to_string(), FieldValue::text(self.status.as_str()));
        record.insert(
            "priority".to_string(),
            FieldValue::text(self.priority.as_str()),
        );
        record.insert(
            "created_by".to_string(),
            FieldValue::text(self.created_by.as_str()),
        );
        record.insert("assigned_to".to_string(), self.assigned_to.clone().into());
        record.insert("due_date".to_string(), self.due_date.clone().into());
        record.insert(
            "completed_at".to_string(),
            self.completed_at.map(|at| at.timestamp_millis()).into(),
        );
        record
    }

    fn from_record(meta: EntityMeta, record: &Record) -> Result<Self, EntityError> {
        let invalid = |field| EntityError::InvalidEntityData {
            kind: Self::KIND,
            field,
        };
        let status = TaskStatus::parse(&required_text(record, Self::KIND, "status")?)
            .ok_or_else(|| invalid("status"))?;
        let priority = TaskPriority::parse(&required_text(record, Self::KIND, "priority")?)
            .ok_or_else(|| invalid("priority"))?;
        let completed_at = optional_timestamp(record, Self::KIND, "completed_at")?;

        let task = Self {
            meta,
            title: required_text(record, Self::KIND, "title")?.trim().to_string(),
            description: normalize_optional(optional_text(record, Self::KIND, "description")?),
            status,
            priority,
            created_by: required_text(record, Self::KIND, "created_by")?
                .trim()
                .to_string(),
            assigned_to: normalize_optional(optional_text(record, Self::KIND, "assigned_to")?),
            due_date: normalize_optional(optional_text(record, Self::KIND, "due_date")?),
            completed_at: completed_at.filter(|_| status == TaskStatus::Completed),
        };
        task.validate()?;
        Ok(task)
    }
}

fn check_field(field: &'static str, value: &FieldValue) -> Result<(), EntityError> {
    let accepted = Task::field_spec(field).is_some_and(|spec| spec.accepts(value));
    if accepted {
        Ok(())
    } else {
        Err(EntityError::InvalidFieldValue {
            kind: Task::KIND,
            field,
        })
    }
}
