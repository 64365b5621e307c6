use crate::model::{ExpenseInput, ExpensePatch, TaskInput, TaskPatch};
use crate::search::{ExpenseFilterKey, ExpenseSort, SortOrder, StatusFilter, TaskSort};
use crate::sync::Slices;

/// Named mutation requests for the task domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskIntent {
    AddTask(TaskInput),
    UpdateTask { id: String, patch: TaskPatch },
    DeleteTask(String),
    ToggleTask(String),
    MoveTask { from: usize, to: usize },
    AddProject(String),
    SetFilter(StatusFilter),
    SetSelectedProject(String),
    SetSearchQuery(String),
    SetSortBy(TaskSort),
    ToggleDarkMode,
    ToggleSidebar,
    ToggleStatsPanel,
    OpenTaskModal(Option<String>),
    CloseTaskModal,
    OpenLoginModal,
    CloseLoginModal,
    Login(String),
    Logout,
}

impl TaskIntent {
    /// Slices that must be mirrored once this intent has been applied.
    pub fn touches(&self) -> Slices {
        match self {
            TaskIntent::AddTask(_)
            | TaskIntent::UpdateTask { .. }
            | TaskIntent::DeleteTask(_)
            | TaskIntent::ToggleTask(_)
            | TaskIntent::MoveTask { .. } => Slices::TASKS,
            TaskIntent::AddProject(_) => Slices::PROJECTS,
            TaskIntent::SetFilter(_)
            | TaskIntent::SetSelectedProject(_)
            | TaskIntent::SetSearchQuery(_)
            | TaskIntent::SetSortBy(_) => Slices::TASK_VIEW,
            TaskIntent::ToggleDarkMode | TaskIntent::ToggleSidebar => Slices::UI,
            TaskIntent::ToggleStatsPanel
            | TaskIntent::OpenTaskModal(_)
            | TaskIntent::CloseTaskModal
            | TaskIntent::OpenLoginModal
            | TaskIntent::CloseLoginModal
            | TaskIntent::Login(_)
            | TaskIntent::Logout => Slices::empty(),
        }
    }
}

/// Named mutation requests for the expense domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpenseIntent {
    AddExpense(ExpenseInput),
    UpdateExpense { id: String, patch: ExpensePatch },
    DeleteExpense(String),
    SetFilter { key: ExpenseFilterKey, value: String },
    ClearFilters,
    SetSort { sort_by: ExpenseSort, sort_order: SortOrder },
    ToggleDarkMode,
}

impl ExpenseIntent {
    pub fn touches(&self) -> Slices {
        match self {
            ExpenseIntent::AddExpense(_)
            | ExpenseIntent::UpdateExpense { .. }
            | ExpenseIntent::DeleteExpense(_) => Slices::EXPENSES,
            ExpenseIntent::SetFilter { .. }
            | ExpenseIntent::ClearFilters
            | ExpenseIntent::SetSort { .. } => Slices::EXPENSE_VIEW,
            ExpenseIntent::ToggleDarkMode => Slices::DARK_MODE,
        }
    }
}

/// Result of a dispatched intent that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A new entity was created with this id.
    Created(String),
    Applied,
    /// The intent referenced something that does not exist, or changed nothing.
    Ignored,
}

impl Outcome {
    pub fn changed(&self) -> bool {
        !matches!(self, Outcome::Ignored)
    }

    pub(crate) fn from_hit(hit: bool) -> Self {
        if hit {
            Outcome::Applied
        } else {
            Outcome::Ignored
        }
    }
}
