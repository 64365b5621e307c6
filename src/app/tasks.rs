use std::sync::Arc;

use anyhow::Result;
use time::OffsetDateTime;

use super::actions::{Outcome, TaskIntent};
use super::state::{TaskBoard, TaskSnapshot, UiState};
use crate::config::AppConfig;
use crate::model::{Task, ValidationError};
use crate::search::{self, ProjectCount, TaskStats, TaskView};
use crate::storage::KeyValueStore;
use crate::sync::{
    PersistenceSync, ProjectsV1, Slices, TaskViewV1, TasksV1, UiPreferences, UiV1,
};

/// Task domain: entity container, view state and UI flags behind one dispatcher.
pub struct TaskManager {
    config: Arc<AppConfig>,
    board: TaskBoard,
    view: TaskView,
    ui: UiState,
    sync: PersistenceSync,
}

impl TaskManager {
    pub fn open(store: Arc<dyn KeyValueStore>, config: Arc<AppConfig>) -> Result<Self> {
        let sync = PersistenceSync::new(store, &config.persistence)?;
        Ok(Self::hydrate(sync, config))
    }

    /// Builds the containers from whatever the store holds, slice by slice.
    pub fn hydrate(sync: PersistenceSync, config: Arc<AppConfig>) -> Self {
        let mut board = TaskBoard::new(
            config.tasks.default_projects.clone(),
            config.tasks.default_project.clone(),
        );
        let tasks = sync.load_or::<TasksV1, _>(Vec::new);
        let projects = sync.load::<ProjectsV1>();
        board.replace_all(tasks, projects);

        let prefs = sync.load_or::<UiV1, _>(UiPreferences::default);
        let view = sync.load_or::<TaskViewV1, _>(|| TaskView::with_sort(config.tasks.default_sort));

        tracing::info!(
            tasks = board.tasks().len(),
            projects = board.projects().len(),
            background = sync.is_background(),
            "task manager hydrated"
        );
        Self {
            config,
            board,
            view,
            ui: UiState::from_preferences(prefs),
            sync,
        }
    }

    pub fn dispatch(&mut self, intent: TaskIntent) -> Result<Outcome, ValidationError> {
        let touched = intent.touches();
        let label = format!("{intent:?}");
        let outcome = self.apply(intent)?;
        if outcome.changed() {
            self.persist(touched);
        } else {
            tracing::debug!(intent = %label, "intent ignored");
        }
        Ok(outcome)
    }

    fn apply(&mut self, intent: TaskIntent) -> Result<Outcome, ValidationError> {
        let outcome = match intent {
            TaskIntent::AddTask(input) => Outcome::Created(self.board.add(input)?),
            TaskIntent::UpdateTask { id, patch } => Outcome::from_hit(self.board.update(&id, patch)?),
            TaskIntent::DeleteTask(id) => {
                let hit = self.board.remove(&id);
                if hit {
                    self.ui.forget_task(&id);
                }
                Outcome::from_hit(hit)
            }
            TaskIntent::ToggleTask(id) => Outcome::from_hit(self.board.toggle_completion(&id)),
            TaskIntent::MoveTask { from, to } => Outcome::from_hit(self.board.reorder(from, to)),
            TaskIntent::AddProject(name) => Outcome::from_hit(self.board.add_project(name.trim())),
            TaskIntent::SetFilter(filter) => {
                self.view.filter = filter;
                Outcome::Applied
            }
            TaskIntent::SetSelectedProject(project) => {
                self.view.selected_project = project.trim().to_string();
                Outcome::Applied
            }
            TaskIntent::SetSearchQuery(query) => {
                self.view.search_query = query;
                Outcome::Applied
            }
            TaskIntent::SetSortBy(sort_by) => {
                self.view.sort_by = sort_by;
                Outcome::Applied
            }
            TaskIntent::ToggleDarkMode => {
                self.ui.toggle_dark_mode();
                Outcome::Applied
            }
            TaskIntent::ToggleSidebar => {
                self.ui.toggle_sidebar();
                Outcome::Applied
            }
            TaskIntent::ToggleStatsPanel => {
                self.ui.toggle_stats_panel();
                Outcome::Applied
            }
            TaskIntent::OpenTaskModal(Some(id)) if self.board.get(&id).is_none() => Outcome::Ignored,
            TaskIntent::OpenTaskModal(editing) => {
                self.ui.open_task_modal(editing);
                Outcome::Applied
            }
            TaskIntent::CloseTaskModal => {
                self.ui.close_task_modal();
                Outcome::Applied
            }
            TaskIntent::OpenLoginModal => {
                self.ui.open_login_modal();
                Outcome::Applied
            }
            TaskIntent::CloseLoginModal => {
                self.ui.close_login_modal();
                Outcome::Applied
            }
            TaskIntent::Login(user) => Outcome::from_hit(self.ui.login(&user)),
            TaskIntent::Logout => Outcome::from_hit(self.ui.logout()),
        };
        Ok(outcome)
    }

    fn persist(&self, slices: Slices) {
        if slices.is_empty() {
            return;
        }
        let snapshot = self.board.snapshot();
        if slices.contains(Slices::TASKS) {
            self.sync.write::<TasksV1>(&snapshot.tasks);
        }
        if slices.contains(Slices::PROJECTS) {
            self.sync.write::<ProjectsV1>(&snapshot.projects);
        }
        if slices.contains(Slices::UI) {
            self.sync.write::<UiV1>(&self.ui.preferences());
        }
        if slices.contains(Slices::TASK_VIEW) {
            self.sync.write::<TaskViewV1>(&self.view);
        }
    }

    pub fn snapshot(&self) -> Arc<TaskSnapshot> {
        self.board.snapshot()
    }

    pub fn board(&self) -> &TaskBoard {
        &self.board
    }

    pub fn view(&self) -> &TaskView {
        &self.view
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.board.get(id)
    }

    /// The task list as the current view state projects it.
    pub fn visible_tasks(&self) -> Vec<&Task> {
        search::project_tasks(self.board.tasks(), &self.view)
    }

    pub fn stats(&self) -> TaskStats {
        self.stats_at(OffsetDateTime::now_utc())
    }

    pub fn stats_at(&self, now: OffsetDateTime) -> TaskStats {
        search::task_stats(self.board.tasks(), now)
    }

    pub fn project_counts(&self) -> Vec<ProjectCount> {
        search::project_counts(self.board.tasks(), self.board.projects())
    }

    /// Waits until every mirrored write has reached the store.
    pub fn flush(&self) {
        self.sync.flush();
    }
}
