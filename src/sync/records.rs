//! Persisted record types, one per store key.
//!
//! Each slice is decoded with strict serde types and then normalised, so nothing
//! downstream ever sees a blob that merely happened to parse.

use anyhow::{Context, Result};
use indexmap::IndexSet;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{normalize_tags, Expense, Task};
use crate::search::{ExpenseView, TaskView};

pub const TASKS_KEY: &str = "taskManager_tasks";
pub const PROJECTS_KEY: &str = "taskManager_projects";
pub const UI_KEY: &str = "taskManager_ui";
pub const TASK_VIEW_KEY: &str = "taskManager_filters";
pub const EXPENSES_KEY: &str = "expenses";
pub const DARK_MODE_KEY: &str = "darkMode";
pub const EXPENSE_VIEW_KEY: &str = "expenseTracker_filters";

/// Suffix of the key that keeps the last unparsable blob for a slice.
pub const CORRUPT_SUFFIX: &str = ".corrupt";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed {key}: {source}")]
    Malformed {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A persisted slice: the key it lives under, its on-disk shape and the live value it yields.
pub trait SliceRecord: DeserializeOwned {
    const KEY: &'static str;
    type Value: Serialize;

    fn normalize(self) -> Self::Value;
}

pub fn decode<R: SliceRecord>(raw: &str) -> Result<R::Value, DecodeError> {
    let record: R = serde_json::from_str(raw).map_err(|source| DecodeError::Malformed {
        key: R::KEY,
        source,
    })?;
    Ok(record.normalize())
}

/// Preference and view slices are JSON objects; anything else rejects the whole slice.
macro_rules! object_record {
    ($record:ident) => {
        impl TryFrom<Map<String, Value>> for $record {
            type Error = serde_json::Error;

            fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
                serde_json::from_value(Value::Object(fields)).map(Self)
            }
        }
    };
}

pub fn encode<R: SliceRecord>(value: &R::Value) -> Result<String> {
    serde_json::to_string(value).with_context(|| format!("serialising {}", R::KEY))
}

/// The persisted subset of the task UI state. Missing fields default individually.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiPreferences {
    pub dark_mode: bool,
    pub sidebar_open: bool,
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct TasksV1(Vec<Task>);

impl SliceRecord for TasksV1 {
    const KEY: &'static str = TASKS_KEY;
    type Value = Vec<Task>;

    fn normalize(self) -> Vec<Task> {
        self.0
            .into_iter()
            .map(|mut task| {
                task.tags = normalize_tags(&task.tags);
                task.updated_at = task.updated_at.max(task.created_at);
                task
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct ProjectsV1(Vec<String>);

impl SliceRecord for ProjectsV1 {
    const KEY: &'static str = PROJECTS_KEY;
    type Value = Vec<String>;

    fn normalize(self) -> Vec<String> {
        self.0
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct UiV1(UiPreferences);

object_record!(UiV1);

impl SliceRecord for UiV1 {
    const KEY: &'static str = UI_KEY;
    type Value = UiPreferences;

    fn normalize(self) -> UiPreferences {
        self.0
    }
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct TaskViewV1(TaskView);

object_record!(TaskViewV1);

impl SliceRecord for TaskViewV1 {
    const KEY: &'static str = TASK_VIEW_KEY;
    type Value = TaskView;

    fn normalize(self) -> TaskView {
        self.0
    }
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct ExpensesV1(Vec<Expense>);

impl SliceRecord for ExpensesV1 {
    const KEY: &'static str = EXPENSES_KEY;
    type Value = Vec<Expense>;

    fn normalize(self) -> Vec<Expense> {
        let total = self.0.len();
        let kept: Vec<Expense> = self
            .0
            .into_iter()
            .filter(|expense| expense.amount.is_finite() && expense.amount >= 0.0)
            .collect();
        if kept.len() < total {
            tracing::warn!(
                dropped = total - kept.len(),
                "discarding persisted expenses with invalid amounts"
            );
        }
        kept
    }
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct DarkModeV1(bool);

impl SliceRecord for DarkModeV1 {
    const KEY: &'static str = DARK_MODE_KEY;
    type Value = bool;

    fn normalize(self) -> bool {
        self.0
    }
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct ExpenseViewV1(ExpenseView);

object_record!(ExpenseViewV1);

impl SliceRecord for ExpenseViewV1 {
    const KEY: &'static str = EXPENSE_VIEW_KEY;
    type Value = ExpenseView;

    fn normalize(self) -> ExpenseView {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{SortOrder, StatusFilter, TaskSort};
    use assert_matches::assert_matches;
    use time::macros::date;

    #[test]
    fn ui_preferences_merge_missing_fields() {
        let prefs = decode::<UiV1>(r#"{"darkMode":true}"#).unwrap();
        assert_eq!(
            prefs,
            UiPreferences {
                dark_mode: true,
                sidebar_open: false,
            }
        );
    }

    #[test]
    fn ui_preferences_reject_wrong_types_wholesale() {
        assert_matches!(
            decode::<UiV1>(r#"{"darkMode":true,"sidebarOpen":"yes"}"#),
            Err(DecodeError::Malformed { key: UI_KEY, .. })
        );
        assert!(decode::<UiV1>("not json").is_err());
        assert!(decode::<UiV1>("null").is_err());
        assert!(decode::<UiV1>("[]").is_err());
    }

    #[test]
    fn sequences_are_not_objects() {
        assert_matches!(
            decode::<UiV1>("[true,true]"),
            Err(DecodeError::Malformed { key: UI_KEY, .. })
        );
        assert_matches!(
            decode::<TaskViewV1>(r#"["completed","Work","q","priority"]"#),
            Err(DecodeError::Malformed { key: TASK_VIEW_KEY, .. })
        );
        assert_matches!(
            decode::<ExpenseViewV1>(r#"[{"category":"Food"},"amount","asc"]"#),
            Err(DecodeError::Malformed { key: EXPENSE_VIEW_KEY, .. })
        );
        assert!(decode::<TaskViewV1>("{}").is_ok());
    }

    #[test]
    fn tasks_are_normalised_on_load() {
        let raw = r#"[{
            "id": "1",
            "title": "Legacy",
            "tags": ["a", "a", " b "],
            "createdAt": "2024-03-02T00:00:00Z",
            "updatedAt": "2024-03-01T00:00:00Z"
        }]"#;
        let tasks = decode::<TasksV1>(raw).unwrap();
        assert_eq!(tasks[0].tags, vec!["a", "b"]);
        assert_eq!(tasks[0].updated_at, tasks[0].created_at);
    }

    #[test]
    fn task_without_title_rejects_the_slice() {
        let raw = r#"[{"id":"1","createdAt":"2024-03-02T00:00:00Z","updatedAt":"2024-03-02T00:00:00Z"}]"#;
        assert_matches!(
            decode::<TasksV1>(raw),
            Err(DecodeError::Malformed { key: TASKS_KEY, .. })
        );
    }

    #[test]
    fn projects_drop_blanks_and_duplicates() {
        let projects = decode::<ProjectsV1>(r#"["Work", "", "Work", " Home "]"#).unwrap();
        assert_eq!(projects, vec!["Work", "Home"]);
    }

    #[test]
    fn expenses_with_bad_amounts_are_dropped() {
        let raw = r#"[
            {"id":"a","title":"ok","amount":"5","category":"Food","date":"2024-01-01","createdAt":"2024-01-01T00:00:00Z"},
            {"id":"b","title":"neg","amount":"-5","category":"Food","date":"2024-01-01","createdAt":"2024-01-01T00:00:00Z"},
            {"id":"c","title":"nan","amount":"NaN","category":"Food","date":"2024-01-01","createdAt":"2024-01-01T00:00:00Z"}
        ]"#;
        let expenses = decode::<ExpensesV1>(raw).unwrap();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].id, "a");
    }

    #[test]
    fn view_records_fill_defaults() {
        let view = decode::<TaskViewV1>(r#"{"filter":"active","sortBy":"priority"}"#).unwrap();
        assert_eq!(view.filter, StatusFilter::Active);
        assert_eq!(view.sort_by, TaskSort::Priority);
        assert_eq!(view.selected_project, "all");

        let view = decode::<ExpenseViewV1>(
            r#"{"filters":{"dateFrom":"2024-01-01","dateTo":""},"sortOrder":"asc"}"#,
        )
        .unwrap();
        assert_eq!(view.filters.date_from, Some(date!(2024 - 01 - 01)));
        assert_eq!(view.filters.date_to, None);
        assert_eq!(view.sort_order, SortOrder::Asc);
    }

    #[test]
    fn dark_mode_is_a_bare_boolean() {
        assert!(decode::<DarkModeV1>("true").unwrap());
        assert!(decode::<DarkModeV1>(r#""true""#).is_err());
        assert_eq!(encode::<DarkModeV1>(&false).unwrap(), "false");
    }
}
