pub mod app;
pub mod cli;
pub mod config;
pub mod model;
pub mod search;
pub mod storage;
pub mod sync;

pub use app::{ExpenseTracker, TaskManager};
pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use storage::{KeyValueStore, MemoryStore, StorageHandle};
