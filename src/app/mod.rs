//! State containers and the two domain dispatchers built on them.

mod actions;
mod expenses;
pub mod ledger;
pub mod state;
mod tasks;

pub use actions::{ExpenseIntent, Outcome, TaskIntent};
pub use expenses::ExpenseTracker;
pub use ledger::{ExpenseLedger, ExpenseSnapshot};
pub use state::{TaskBoard, TaskSnapshot, UiState};
pub use tasks::TaskManager;
