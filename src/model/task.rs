use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use time::{Date, OffsetDateTime};

use super::{calendar_date, new_id, ValidationError};

pub const DEFAULT_PROJECT: &str = "Personal";

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Severity rank used when sorting; higher is more urgent.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default, with = "calendar_date::option")]
    pub due_date: Option<Date>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

fn default_project() -> String {
    DEFAULT_PROJECT.to_string()
}

impl Task {
    pub(crate) fn from_input(input: TaskInput, default_project: &str, now: OffsetDateTime) -> Self {
        let project = input
            .project
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| default_project.to_string());
        Self {
            id: new_id(),
            title: input.title.trim().to_string(),
            description: input.description,
            completed: false,
            priority: input.priority.unwrap_or_default(),
            project,
            due_date: input.due_date,
            tags: normalize_tags(input.tags),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges `patch` over this task. `id` and `createdAt` are never touched.
    pub(crate) fn apply(&mut self, patch: TaskPatch, now: OffsetDateTime) {
        let TaskPatch {
            title,
            description,
            completed,
            priority,
            project,
            due_date,
            tags,
        } = patch;
        if let Some(title) = title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(completed) = completed {
            self.completed = completed;
        }
        if let Some(priority) = priority {
            self.priority = priority;
        }
        if let Some(project) = project {
            self.project = project.trim().to_string();
        }
        if let Some(due_date) = due_date {
            self.due_date = due_date;
        }
        if let Some(tags) = tags {
            self.tags = normalize_tags(tags);
        }
        self.touch(now);
    }

    pub(crate) fn touch(&mut self, now: OffsetDateTime) {
        self.updated_at = now.max(self.created_at);
    }

    pub fn matches_text(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self.description.to_lowercase().contains(needle_lower)
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(needle_lower))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInput {
    pub title: String,
    pub description: String,
    pub priority: Option<Priority>,
    pub project: Option<String>,
    pub due_date: Option<Date>,
    pub tags: Vec<String>,
}

impl TaskInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn due(mut self, date: Date) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        Ok(())
    }
}

/// Partial update. `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub project: Option<String>,
    pub due_date: Option<Option<Date>>,
    pub tags: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if matches!(self.title.as_deref(), Some(title) if title.trim().is_empty()) {
            return Err(ValidationError::MissingField("title"));
        }
        if matches!(self.project.as_deref(), Some(project) if project.trim().is_empty()) {
            return Err(ValidationError::MissingField("project"));
        }
        Ok(())
    }
}

/// Trims, drops blanks and suppresses duplicates while keeping first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|tag| tag.as_ref().trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}
