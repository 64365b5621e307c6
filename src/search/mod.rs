//! Read-side projections over entity snapshots.
//!
//! Everything here is a pure function of its inputs: no caching, no mutation.
//! Callers recompute on every read.

use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use time::{Date, OffsetDateTime, Time};

use crate::model::Task;

pub mod expenses;

pub use expenses::{
    category_breakdown, project_expenses, total_amount, CategoryShare, ExpenseFilterKey,
    ExpenseFilters, ExpenseSort, ExpenseView, SortOrder,
};

/// Sentinel accepted by project/category filters as "no restriction".
pub const ALL: &str = "all";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    pub fn admits(self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => !task.completed,
            StatusFilter::Completed => task.completed,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum TaskSort {
    #[default]
    DueDate,
    Priority,
    Created,
}

/// Filter and sort preferences for the task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskView {
    pub filter: StatusFilter,
    pub selected_project: String,
    pub search_query: String,
    pub sort_by: TaskSort,
}

impl Default for TaskView {
    fn default() -> Self {
        Self {
            filter: StatusFilter::All,
            selected_project: ALL.to_string(),
            search_query: String::new(),
            sort_by: TaskSort::DueDate,
        }
    }
}

impl TaskView {
    pub fn with_sort(sort_by: TaskSort) -> Self {
        Self {
            sort_by,
            ..Self::default()
        }
    }

    fn project_restriction(&self) -> Option<&str> {
        restriction(&self.selected_project)
    }
}

/// Treats both `""` and `"all"` as no restriction.
pub(crate) fn restriction(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL) {
        None
    } else {
        Some(trimmed)
    }
}

/// Completion filter, then project, then text search; the survivors are stably sorted.
pub fn project_tasks<'a>(tasks: &'a [Task], view: &TaskView) -> Vec<&'a Task> {
    let project = view.project_restriction();
    let needle = view.search_query.trim().to_lowercase();

    let mut visible = tasks
        .iter()
        .filter(|task| view.filter.admits(task))
        .filter(|task| project.map_or(true, |p| task.project == p))
        .filter(|task| needle.is_empty() || task.matches_text(&needle))
        .collect::<Vec<_>>();

    visible.sort_by(|a, b| compare_tasks(a, b, view.sort_by));
    visible
}

fn compare_tasks(a: &Task, b: &Task, sort_by: TaskSort) -> Ordering {
    match sort_by {
        TaskSort::DueDate => match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        TaskSort::Priority => b.priority.rank().cmp(&a.priority.rank()),
        TaskSort::Created => b.created_at.cmp(&a.created_at),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
    pub high_priority: usize,
}

pub fn task_stats(tasks: &[Task], now: OffsetDateTime) -> TaskStats {
    let total = tasks.len();
    let completed = tasks.iter().filter(|task| task.completed).count();
    let overdue = tasks
        .iter()
        .filter(|task| !task.completed)
        .filter(|task| task.due_date.is_some_and(|due| is_past(due, now)))
        .count();
    let high_priority = tasks
        .iter()
        .filter(|task| !task.completed && task.priority == crate::model::Priority::High)
        .count();
    TaskStats {
        total,
        completed,
        pending: total - completed,
        overdue,
        high_priority,
    }
}

/// A due date is past once its UTC midnight is strictly before `now`.
fn is_past(due: Date, now: OffsetDateTime) -> bool {
    due.with_time(Time::MIDNIGHT).assume_utc() < now
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectCount {
    pub name: String,
    pub count: usize,
    /// `false` when tasks reference a project missing from the project list.
    pub known: bool,
}

/// Per-project task counts in project-list order, followed by any orphaned project names.
pub fn project_counts(tasks: &[Task], projects: &[String]) -> Vec<ProjectCount> {
    let mut counts: IndexMap<&str, (usize, bool)> =
        projects.iter().map(|name| (name.as_str(), (0, true))).collect();
    for task in tasks {
        counts.entry(task.project.as_str()).or_insert((0, false)).0 += 1;
    }
    counts
        .into_iter()
        .map(|(name, (count, known))| ProjectCount {
            name: name.to_string(),
            count,
            known,
        })
        .collect()
}

/// Inclusive calendar-date range; open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<Date>,
    pub to: Option<Date>,
}

impl DateRange {
    pub fn contains(&self, date: Date) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, TaskInput, DEFAULT_PROJECT};
    use std::collections::HashSet;
    use time::macros::{date, datetime};
    use time::Duration;

    fn task(input: TaskInput, minutes: i64) -> Task {
        let created = datetime!(2024-06-01 09:00 UTC) + Duration::minutes(minutes);
        Task::from_input(input, DEFAULT_PROJECT, created)
    }

    fn titles(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|task| task.title.clone()).collect()
    }

    fn sample() -> Vec<Task> {
        let mut done = task(TaskInput::new("Water plants").project("Health"), 0);
        done.completed = true;
        vec![
            done,
            task(
                TaskInput::new("Quarterly report")
                    .project("Work")
                    .tags(["finance"]),
                1,
            ),
            task(
                TaskInput::new("Buy milk")
                    .project("Shopping")
                    .description("semi-skimmed"),
                2,
            ),
            task(TaskInput::new("Gym").project("Health").tags(["Fitness"]), 3),
        ]
    }

    #[test]
    fn active_and_completed_partition_all() {
        let tasks = sample();
        let ids = |filter| -> HashSet<String> {
            let view = TaskView {
                filter,
                ..TaskView::default()
            };
            project_tasks(&tasks, &view)
                .into_iter()
                .map(|task| task.id.clone())
                .collect()
        };
        let all = ids(StatusFilter::All);
        let active = ids(StatusFilter::Active);
        let completed = ids(StatusFilter::Completed);
        assert!(active.is_disjoint(&completed));
        assert_eq!(&active | &completed, all);
        assert_eq!(all.len(), tasks.len());
    }

    #[test]
    fn project_filter_matches_exactly_and_all_is_unrestricted() {
        let tasks = sample();
        let mut view = TaskView {
            selected_project: "Health".into(),
            ..TaskView::default()
        };
        assert_eq!(project_tasks(&tasks, &view).len(), 2);
        view.selected_project = "health".into();
        assert!(project_tasks(&tasks, &view).is_empty());
        view.selected_project = "".into();
        assert_eq!(project_tasks(&tasks, &view).len(), 4);
        view.selected_project = " Health ".into();
        assert_eq!(project_tasks(&tasks, &view).len(), 2);
    }

    #[test]
    fn search_covers_title_description_and_tags() {
        let tasks = sample();
        let search = |query: &str| {
            let view = TaskView {
                search_query: query.into(),
                sort_by: TaskSort::Created,
                ..TaskView::default()
            };
            titles(&project_tasks(&tasks, &view))
        };
        assert_eq!(search("REPORT"), vec!["Quarterly report"]);
        assert_eq!(search("skimmed"), vec!["Buy milk"]);
        assert_eq!(search("fitness"), vec!["Gym"]);
        assert!(search("nothing like this").is_empty());
    }

    #[test]
    fn due_date_sort_puts_undated_tasks_last() {
        let tasks = vec![
            task(TaskInput::new("no date 1"), 0),
            task(TaskInput::new("late").due(date!(2024 - 08 - 01)), 1),
            task(TaskInput::new("no date 2"), 2),
            task(TaskInput::new("early").due(date!(2024 - 07 - 01)), 3),
        ];
        let visible = project_tasks(&tasks, &TaskView::with_sort(TaskSort::DueDate));
        assert_eq!(titles(&visible), vec!["early", "late", "no date 1", "no date 2"]);
    }

    #[test]
    fn priority_sort_orders_high_to_low() {
        let tasks = vec![
            task(TaskInput::new("A").priority(Priority::Low), 0),
            task(TaskInput::new("B").priority(Priority::High), 1),
            task(TaskInput::new("C").priority(Priority::Medium), 2),
        ];
        let visible = project_tasks(&tasks, &TaskView::with_sort(TaskSort::Priority));
        assert_eq!(titles(&visible), vec!["B", "C", "A"]);
    }

    #[test]
    fn created_sort_is_newest_first() {
        let tasks = sample();
        let visible = project_tasks(&tasks, &TaskView::with_sort(TaskSort::Created));
        assert_eq!(
            titles(&visible),
            vec!["Gym", "Buy milk", "Quarterly report", "Water plants"]
        );
    }

    #[test]
    fn stats_count_overdue_only_for_open_tasks() {
        let now = datetime!(2024-06-10 12:00 UTC);
        let mut finished = task(TaskInput::new("done late").due(date!(2024 - 06 - 01)), 0);
        finished.completed = true;
        let tasks = vec![
            finished,
            task(
                TaskInput::new("late")
                    .due(date!(2024 - 06 - 09))
                    .priority(Priority::High),
                1,
            ),
            task(TaskInput::new("due today").due(date!(2024 - 06 - 10)), 2),
            task(TaskInput::new("future").due(date!(2024 - 06 - 11)), 3),
            task(TaskInput::new("undated").priority(Priority::High), 4),
        ];
        let stats = task_stats(&tasks, now);
        assert_eq!(
            stats,
            TaskStats {
                total: 5,
                completed: 1,
                pending: 4,
                overdue: 2,
                high_priority: 2,
            }
        );
    }

    #[test]
    fn project_counts_flag_orphans() {
        let tasks = sample();
        let projects = vec!["Personal".to_string(), "Work".to_string(), "Health".to_string()];
        let counts = project_counts(&tasks, &projects);
        let summary: Vec<_> = counts
            .iter()
            .map(|c| (c.name.as_str(), c.count, c.known))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Personal", 0, true),
                ("Work", 1, true),
                ("Health", 2, true),
                ("Shopping", 1, false),
            ]
        );
    }

    #[test]
    fn date_range_is_inclusive() {
        let range = DateRange {
            from: Some(date!(2024 - 01 - 01)),
            to: Some(date!(2024 - 01 - 31)),
        };
        assert!(range.contains(date!(2024 - 01 - 01)));
        assert!(range.contains(date!(2024 - 01 - 31)));
        assert!(!range.contains(date!(2024 - 02 - 01)));
        assert!(DateRange::default().contains(date!(1999 - 12 - 31)));
    }
}
