use std::fmt::Write as _;
use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use crate::app::{ExpenseIntent, ExpenseTracker, Outcome, TaskIntent, TaskManager};
use crate::config::AppConfig;
use crate::model::{
    format_date, parse_optional_date, Expense, ExpenseInput, ExpensePatch, Priority, Task,
    TaskInput, TaskPatch,
};
use crate::search::{ExpenseFilterKey, ExpenseSort, SortOrder, StatusFilter, TaskSort};
use crate::storage::KeyValueStore;

#[derive(Args, Debug, Clone)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommand {
    /// Create a task
    Add(TaskAddArgs),
    /// Print tasks through the saved view (flags update the view)
    List(TaskListArgs),
    /// Change fields of an existing task
    Update(TaskUpdateArgs),
    /// Flip a task between open and completed
    Toggle(TaskIdArgs),
    /// Delete a task
    Remove(TaskIdArgs),
    /// Move a task to another position in the list
    Move(TaskMoveArgs),
    /// Print task statistics
    Stats,
}

#[derive(Args, Debug, Clone)]
pub struct TaskAddArgs {
    /// Title for the task
    pub title: String,
    /// Description text; pass `-` to read it from stdin
    #[arg(long)]
    pub description: Option<String>,
    /// low, medium or high
    #[arg(long)]
    pub priority: Option<Priority>,
    /// Project name (defaults to the configured default project)
    #[arg(long)]
    pub project: Option<String>,
    /// Due date as YYYY-MM-DD
    #[arg(long)]
    pub due: Option<String>,
    /// Tag to attach; repeat for several
    #[arg(long = "tag")]
    pub tags: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TaskListArgs {
    /// all, active or completed
    #[arg(long)]
    pub filter: Option<StatusFilter>,
    /// Restrict to one project (`all` clears the restriction)
    #[arg(long)]
    pub project: Option<String>,
    /// Case-insensitive text search over title, description and tags
    #[arg(long)]
    pub search: Option<String>,
    /// dueDate, priority or created
    #[arg(long)]
    pub sort: Option<TaskSort>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TaskUpdateArgs {
    /// Task identifier
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    /// Description text; pass `-` to read it from stdin
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub priority: Option<Priority>,
    #[arg(long)]
    pub project: Option<String>,
    /// Due date as YYYY-MM-DD; an empty value clears it
    #[arg(long)]
    pub due: Option<String>,
    /// Replace all tags; repeat for several
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Remove every tag
    #[arg(long, conflicts_with = "tags")]
    pub clear_tags: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TaskIdArgs {
    /// Task identifier
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct TaskMoveArgs {
    /// Current zero-based position
    pub from: usize,
    /// Target zero-based position
    pub to: usize,
}

#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub command: ProjectCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProjectCommand {
    /// Add a project (no-op if it already exists)
    Add { name: String },
    /// List projects with their task counts
    List,
}

#[derive(Args, Debug, Clone)]
pub struct ExpenseArgs {
    #[command(subcommand)]
    pub command: ExpenseCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ExpenseCommand {
    /// Record an expense
    Add(ExpenseAddArgs),
    /// Print expenses through the saved filters (flags update them)
    List(ExpenseListArgs),
    /// Change fields of an existing expense
    Update(ExpenseUpdateArgs),
    /// Delete an expense
    Remove { id: String },
    /// Grand total and per-category shares over every expense
    Summary,
    /// Reset every expense filter
    ClearFilters,
}

#[derive(Args, Debug, Clone)]
pub struct ExpenseAddArgs {
    pub title: String,
    /// Non-negative amount, e.g. 12.50
    #[arg(allow_hyphen_values = true)]
    pub amount: String,
    #[arg(long)]
    pub category: String,
    /// Date as YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExpenseListArgs {
    #[arg(long)]
    pub category: Option<String>,
    /// Inclusive lower bound, YYYY-MM-DD
    #[arg(long)]
    pub from: Option<String>,
    /// Inclusive upper bound, YYYY-MM-DD
    #[arg(long)]
    pub to: Option<String>,
    /// Case-insensitive title search
    #[arg(long)]
    pub search: Option<String>,
    /// date, amount, title or category
    #[arg(long)]
    pub sort: Option<ExpenseSort>,
    /// asc or desc
    #[arg(long)]
    pub order: Option<SortOrder>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExpenseUpdateArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    pub amount: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PrefsArgs {
    #[command(subcommand)]
    pub command: PrefsCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PrefsCommand {
    /// Print persisted preferences of both applications
    Show,
    /// Toggle dark mode
    ToggleDark {
        /// Toggle the expense tracker's theme instead of the task manager's
        #[arg(long)]
        expenses: bool,
    },
    /// Toggle the task manager sidebar
    ToggleSidebar,
}

pub fn handle_task_command(
    store: Arc<dyn KeyValueStore>,
    config: Arc<AppConfig>,
    args: TaskArgs,
) -> Result<String> {
    let mut manager = TaskManager::open(store, config).context("opening task manager")?;
    let output = match args.command {
        TaskCommand::Add(args) => task_add(&mut manager, args)?,
        TaskCommand::List(args) => task_list(&mut manager, args)?,
        TaskCommand::Update(args) => task_update(&mut manager, args)?,
        TaskCommand::Toggle(args) => {
            let outcome = manager.dispatch(TaskIntent::ToggleTask(args.id.clone()))?;
            match manager.get(&args.id) {
                Some(task) if outcome.changed() => format!(
                    "Marked '{}' as {}\n",
                    task.title,
                    if task.completed { "completed" } else { "active" }
                ),
                _ => missing("task", &args.id),
            }
        }
        TaskCommand::Remove(args) => {
            let outcome = manager.dispatch(TaskIntent::DeleteTask(args.id.clone()))?;
            if outcome.changed() {
                format!("Removed task {}\n", args.id)
            } else {
                missing("task", &args.id)
            }
        }
        TaskCommand::Move(args) => {
            let outcome = manager.dispatch(TaskIntent::MoveTask {
                from: args.from,
                to: args.to,
            })?;
            if outcome.changed() {
                format!("Moved task from position {} to {}\n", args.from, args.to)
            } else {
                "Nothing to move.\n".to_string()
            }
        }
        TaskCommand::Stats => task_stats(&manager),
    };
    manager.flush();
    Ok(output)
}

fn task_add(manager: &mut TaskManager, args: TaskAddArgs) -> Result<String> {
    let mut input = TaskInput::new(args.title).tags(args.tags);
    if let Some(description) = args.description {
        input = input.description(resolve_text(description)?);
    }
    if let Some(priority) = args.priority {
        input = input.priority(priority);
    }
    if let Some(project) = args.project {
        input = input.project(project);
    }
    input.due_date = parse_optional_date(args.due.as_deref().unwrap_or_default())?;

    match manager.dispatch(TaskIntent::AddTask(input)).context("adding task")? {
        Outcome::Created(id) => Ok(format!("Created task {id}\n")),
        other => bail!("unexpected outcome {other:?} while adding task"),
    }
}

fn task_list(manager: &mut TaskManager, args: TaskListArgs) -> Result<String> {
    let mut intents = Vec::new();
    if let Some(filter) = args.filter {
        intents.push(TaskIntent::SetFilter(filter));
    }
    if let Some(project) = args.project {
        intents.push(TaskIntent::SetSelectedProject(project));
    }
    if let Some(search) = args.search {
        intents.push(TaskIntent::SetSearchQuery(search));
    }
    if let Some(sort) = args.sort {
        intents.push(TaskIntent::SetSortBy(sort));
    }
    for intent in intents {
        manager.dispatch(intent)?;
    }

    let tasks = manager.visible_tasks();
    if tasks.is_empty() {
        return Ok("No tasks match the current view.\n".to_string());
    }
    let mut out = String::new();
    for task in tasks {
        let _ = writeln!(&mut out, "{}", format_task(task));
    }
    Ok(out)
}

fn task_update(manager: &mut TaskManager, args: TaskUpdateArgs) -> Result<String> {
    let description = args.description.map(resolve_text).transpose()?;
    let due_date = args
        .due
        .as_deref()
        .map(parse_optional_date)
        .transpose()?;
    let tags = if args.clear_tags {
        Some(Vec::new())
    } else if args.tags.is_empty() {
        None
    } else {
        Some(args.tags)
    };
    let patch = TaskPatch {
        title: args.title,
        description,
        priority: args.priority,
        project: args.project,
        due_date,
        tags,
        ..TaskPatch::default()
    };
    let outcome = manager
        .dispatch(TaskIntent::UpdateTask {
            id: args.id.clone(),
            patch,
        })
        .with_context(|| format!("updating task {}", args.id))?;
    Ok(if outcome.changed() {
        format!("Updated task {}\n", args.id)
    } else {
        missing("task", &args.id)
    })
}

fn task_stats(manager: &TaskManager) -> String {
    let stats = manager.stats();
    let mut out = String::new();
    let _ = writeln!(&mut out, "total      {}", stats.total);
    let _ = writeln!(&mut out, "completed  {}", stats.completed);
    let _ = writeln!(&mut out, "pending    {}", stats.pending);
    let _ = writeln!(&mut out, "overdue    {}", stats.overdue);
    let _ = writeln!(&mut out, "high       {}", stats.high_priority);
    out
}

pub fn handle_project_command(
    store: Arc<dyn KeyValueStore>,
    config: Arc<AppConfig>,
    args: ProjectArgs,
) -> Result<String> {
    let mut manager = TaskManager::open(store, config).context("opening task manager")?;
    let output = match args.command {
        ProjectCommand::Add { name } => {
            let outcome = manager.dispatch(TaskIntent::AddProject(name.clone()))?;
            if outcome.changed() {
                format!("Added project '{}'\n", name.trim())
            } else {
                format!("Project '{}' already exists\n", name.trim())
            }
        }
        ProjectCommand::List => {
            let mut out = String::new();
            for project in manager.project_counts() {
                let marker = if project.known { "" } else { "  (unlisted)" };
                let _ = writeln!(&mut out, "{:<16} {:>3}{marker}", project.name, project.count);
            }
            out
        }
    };
    manager.flush();
    Ok(output)
}

pub fn handle_expense_command(
    store: Arc<dyn KeyValueStore>,
    config: Arc<AppConfig>,
    args: ExpenseArgs,
) -> Result<String> {
    let mut tracker = ExpenseTracker::open(store, config).context("opening expense tracker")?;
    let output = match args.command {
        ExpenseCommand::Add(args) => expense_add(&mut tracker, args)?,
        ExpenseCommand::List(args) => expense_list(&mut tracker, args)?,
        ExpenseCommand::Update(args) => expense_update(&mut tracker, args)?,
        ExpenseCommand::Remove { id } => {
            let outcome = tracker.dispatch(ExpenseIntent::DeleteExpense(id.clone()))?;
            if outcome.changed() {
                format!("Removed expense {id}\n")
            } else {
                missing("expense", &id)
            }
        }
        ExpenseCommand::Summary => expense_summary(&tracker),
        ExpenseCommand::ClearFilters => {
            tracker.dispatch(ExpenseIntent::ClearFilters)?;
            "Cleared expense filters\n".to_string()
        }
    };
    tracker.flush();
    Ok(output)
}

fn expense_add(tracker: &mut ExpenseTracker, args: ExpenseAddArgs) -> Result<String> {
    let mut input = ExpenseInput::new(args.title, args.amount, args.category);
    input.date = parse_optional_date(args.date.as_deref().unwrap_or_default())?;
    match tracker
        .dispatch(ExpenseIntent::AddExpense(input))
        .context("adding expense")?
    {
        Outcome::Created(id) => Ok(format!("Created expense {id}\n")),
        other => bail!("unexpected outcome {other:?} while adding expense"),
    }
}

fn expense_list(tracker: &mut ExpenseTracker, args: ExpenseListArgs) -> Result<String> {
    let filters = [
        (ExpenseFilterKey::Category, args.category),
        (ExpenseFilterKey::DateFrom, args.from),
        (ExpenseFilterKey::DateTo, args.to),
        (ExpenseFilterKey::Search, args.search),
    ];
    for (key, value) in filters {
        if let Some(value) = value {
            tracker
                .dispatch(ExpenseIntent::SetFilter { key, value })
                .with_context(|| format!("setting {key} filter"))?;
        }
    }
    if args.sort.is_some() || args.order.is_some() {
        let view = tracker.view();
        let intent = ExpenseIntent::SetSort {
            sort_by: args.sort.unwrap_or(view.sort_by),
            sort_order: args.order.unwrap_or(view.sort_order),
        };
        tracker.dispatch(intent)?;
    }

    let expenses = tracker.visible_expenses();
    if expenses.is_empty() {
        let message = if tracker.view().filters.is_empty() {
            "No expenses recorded.\n"
        } else {
            "No expenses match the current filters.\n"
        };
        return Ok(message.to_string());
    }
    let mut out = String::new();
    for expense in &expenses {
        let _ = writeln!(&mut out, "{}", format_expense(expense));
    }
    let _ = writeln!(&mut out, "total {:.2}", tracker.visible_total());
    Ok(out)
}

fn expense_update(tracker: &mut ExpenseTracker, args: ExpenseUpdateArgs) -> Result<String> {
    let date = match args.date.as_deref() {
        Some(raw) => parse_optional_date(raw)?,
        None => None,
    };
    let patch = ExpensePatch {
        title: args.title,
        amount: args.amount,
        category: args.category,
        date,
    };
    let outcome = tracker
        .dispatch(ExpenseIntent::UpdateExpense {
            id: args.id.clone(),
            patch,
        })
        .with_context(|| format!("updating expense {}", args.id))?;
    Ok(if outcome.changed() {
        format!("Updated expense {}\n", args.id)
    } else {
        missing("expense", &args.id)
    })
}

fn expense_summary(tracker: &ExpenseTracker) -> String {
    let breakdown = tracker.breakdown();
    if breakdown.is_empty() {
        return "No expenses recorded.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(&mut out, "total {:.2}", tracker.grand_total());
    for share in breakdown {
        let _ = writeln!(
            &mut out,
            "{:<16} {:>10.2} {:>5.1}%",
            share.category, share.amount, share.percentage
        );
    }
    out
}

pub fn handle_prefs_command(
    store: Arc<dyn KeyValueStore>,
    config: Arc<AppConfig>,
    args: PrefsArgs,
) -> Result<String> {
    let output = match args.command {
        PrefsCommand::Show => {
            let manager = TaskManager::open(store.clone(), config.clone())?;
            let tracker = ExpenseTracker::open(store, config)?;
            let ui = manager.ui();
            let view = manager.view();
            let mut out = String::new();
            let _ = writeln!(&mut out, "tasks.dark_mode     {}", ui.dark_mode);
            let _ = writeln!(&mut out, "tasks.sidebar_open  {}", ui.sidebar_open);
            let _ = writeln!(&mut out, "tasks.filter        {}", view.filter);
            let _ = writeln!(&mut out, "tasks.project       {}", view.selected_project);
            let _ = writeln!(&mut out, "tasks.sort          {}", view.sort_by);
            let _ = writeln!(&mut out, "expenses.dark_mode  {}", tracker.dark_mode());
            let _ = writeln!(
                &mut out,
                "expenses.sort       {} {}",
                tracker.view().sort_by,
                tracker.view().sort_order
            );
            out
        }
        PrefsCommand::ToggleDark { expenses: true } => {
            let mut tracker = ExpenseTracker::open(store, config)?;
            tracker.dispatch(ExpenseIntent::ToggleDarkMode)?;
            tracker.flush();
            format!("Expense tracker dark mode {}\n", on_off(tracker.dark_mode()))
        }
        PrefsCommand::ToggleDark { expenses: false } => {
            let mut manager = TaskManager::open(store, config)?;
            manager.dispatch(TaskIntent::ToggleDarkMode)?;
            manager.flush();
            format!("Task manager dark mode {}\n", on_off(manager.ui().dark_mode))
        }
        PrefsCommand::ToggleSidebar => {
            let mut manager = TaskManager::open(store, config)?;
            manager.dispatch(TaskIntent::ToggleSidebar)?;
            manager.flush();
            format!("Sidebar {}\n", on_off(manager.ui().sidebar_open))
        }
    };
    Ok(output)
}

/// Reads the value from stdin when it is `-`.
fn resolve_text(value: String) -> Result<String> {
    if value != "-" {
        return Ok(value);
    }
    match read_stdin()? {
        Some(text) => Ok(text.trim_end().to_string()),
        None => bail!("`-` given but stdin is a terminal"),
    }
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("reading stdin")?;
    Ok(Some(buf))
}

fn format_task(task: &Task) -> String {
    let mut line = format!(
        "{}  [{}] {}  @{}  !{}",
        task.id,
        if task.completed { "x" } else { " " },
        task.title,
        task.project,
        task.priority
    );
    if let Some(due) = task.due_date {
        let _ = write!(&mut line, "  due {}", format_date(due));
    }
    if !task.tags.is_empty() {
        let _ = write!(&mut line, "  {}", format_tags(&task.tags));
    }
    line
}

fn format_expense(expense: &Expense) -> String {
    format!(
        "{}  {}  {:>10.2}  {:<14} {}",
        expense.id,
        format_date(expense.date),
        expense.amount,
        expense.category,
        expense.title
    )
}

fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("#{}", tag))
        .collect::<Vec<_>>()
        .join(" ")
}

fn missing(kind: &str, id: &str) -> String {
    format!("No {kind} with id {id}\n")
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}
