use std::sync::Arc;

use time::OffsetDateTime;

use crate::model::{Task, TaskInput, TaskPatch, ValidationError};
use crate::sync::UiPreferences;

/// Immutable view of the task collection at one revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub tasks: Vec<Task>,
    pub projects: Vec<String>,
    pub revision: u64,
}

/// Canonical owner of tasks and the project list.
///
/// Every mutation yields a fresh snapshot; snapshots handed out earlier are never
/// modified, so readers holding one see a consistent collection.
#[derive(Debug, Clone)]
pub struct TaskBoard {
    snapshot: Arc<TaskSnapshot>,
    default_project: String,
}

impl TaskBoard {
    pub fn new(projects: Vec<String>, default_project: impl Into<String>) -> Self {
        Self {
            snapshot: Arc::new(TaskSnapshot {
                tasks: Vec::new(),
                projects,
                revision: 0,
            }),
            default_project: default_project.into(),
        }
    }

    pub fn snapshot(&self) -> Arc<TaskSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.snapshot.tasks
    }

    pub fn projects(&self) -> &[String] {
        &self.snapshot.projects
    }

    pub fn revision(&self) -> u64 {
        self.snapshot.revision
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.snapshot.tasks.iter().find(|task| task.id == id)
    }

    /// Appends a new task and returns its id.
    pub fn add(&mut self, input: TaskInput) -> Result<String, ValidationError> {
        self.add_at(input, OffsetDateTime::now_utc())
    }

    pub(crate) fn add_at(
        &mut self,
        input: TaskInput,
        now: OffsetDateTime,
    ) -> Result<String, ValidationError> {
        input.validate()?;
        let task = Task::from_input(input, &self.default_project, now);
        let id = task.id.clone();
        self.commit().tasks.push(task);
        Ok(id)
    }

    /// Returns `false` when no task has `id`.
    pub fn update(&mut self, id: &str, patch: TaskPatch) -> Result<bool, ValidationError> {
        self.update_at(id, patch, OffsetDateTime::now_utc())
    }

    pub(crate) fn update_at(
        &mut self,
        id: &str,
        patch: TaskPatch,
        now: OffsetDateTime,
    ) -> Result<bool, ValidationError> {
        patch.validate()?;
        let Some(index) = self.position(id) else {
            return Ok(false);
        };
        self.commit().tasks[index].apply(patch, now);
        Ok(true)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        self.commit().tasks.remove(index);
        true
    }

    pub fn toggle_completion(&mut self, id: &str) -> bool {
        self.toggle_completion_at(id, OffsetDateTime::now_utc())
    }

    pub(crate) fn toggle_completion_at(&mut self, id: &str, now: OffsetDateTime) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let task = &mut self.commit().tasks[index];
        task.completed = !task.completed;
        task.touch(now);
        true
    }

    /// Moves the task at `from` so it lands at `to`. Out-of-range indices are ignored.
    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        let len = self.snapshot.tasks.len();
        if from >= len || to >= len || from == to {
            return false;
        }
        let tasks = &mut self.commit().tasks;
        let task = tasks.remove(from);
        tasks.insert(to, task);
        true
    }

    /// Appends `name` unless an identical project already exists.
    pub fn add_project(&mut self, name: &str) -> bool {
        if name.trim().is_empty() || self.snapshot.projects.iter().any(|p| p == name) {
            return false;
        }
        self.commit().projects.push(name.to_string());
        true
    }

    /// Bulk load used during hydration; persisted data is trusted as decoded.
    pub fn replace_all(&mut self, tasks: Vec<Task>, projects: Option<Vec<String>>) {
        let snapshot = self.commit();
        snapshot.tasks = tasks;
        if let Some(projects) = projects {
            snapshot.projects = projects;
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.snapshot.tasks.iter().position(|task| task.id == id)
    }

    fn commit(&mut self) -> &mut TaskSnapshot {
        let snapshot = Arc::make_mut(&mut self.snapshot);
        snapshot.revision += 1;
        snapshot
    }
}

/// Presentation flags for the task domain. Only [`UiPreferences`] survive a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    pub dark_mode: bool,
    pub sidebar_open: bool,
    pub show_task_modal: bool,
    /// Id of the task open in the edit modal.
    pub editing_task: Option<String>,
    pub show_stats_panel: bool,
    pub show_login_modal: bool,
    pub user: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            dark_mode: false,
            sidebar_open: false,
            show_task_modal: false,
            editing_task: None,
            show_stats_panel: true,
            show_login_modal: false,
            user: None,
        }
    }
}

impl UiState {
    pub fn from_preferences(prefs: UiPreferences) -> Self {
        Self {
            dark_mode: prefs.dark_mode,
            sidebar_open: prefs.sidebar_open,
            ..Self::default()
        }
    }

    pub fn preferences(&self) -> UiPreferences {
        UiPreferences {
            dark_mode: self.dark_mode,
            sidebar_open: self.sidebar_open,
        }
    }

    pub fn toggle_dark_mode(&mut self) {
        self.dark_mode = !self.dark_mode;
    }

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_open = !self.sidebar_open;
    }

    pub fn toggle_stats_panel(&mut self) {
        self.show_stats_panel = !self.show_stats_panel;
    }

    pub fn open_task_modal(&mut self, editing: Option<String>) {
        self.show_task_modal = true;
        self.editing_task = editing;
    }

    pub fn close_task_modal(&mut self) {
        self.show_task_modal = false;
        self.editing_task = None;
    }

    /// Drops the editing reference if it points at `id`.
    pub fn forget_task(&mut self, id: &str) {
        if self.editing_task.as_deref() == Some(id) {
            self.close_task_modal();
        }
    }

    pub fn open_login_modal(&mut self) {
        self.show_login_modal = true;
    }

    pub fn close_login_modal(&mut self) {
        self.show_login_modal = false;
    }

    /// Mock sign-in: any non-blank name is accepted.
    pub fn login(&mut self, user: &str) -> bool {
        let user = user.trim();
        if user.is_empty() {
            return false;
        }
        self.user = Some(user.to_string());
        self.show_login_modal = false;
        true
    }

    pub fn logout(&mut self) -> bool {
        self.user.take().is_some()
    }
}
