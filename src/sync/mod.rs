//! Persistence Synchronizer: startup hydration and mirror-on-write to a [`KeyValueStore`].

use std::sync::Arc;

use anyhow::Result;
use bitflags::bitflags;

use crate::config::PersistenceOptions;
use crate::storage::KeyValueStore;

pub mod records;
mod writer;

pub use records::{
    DarkModeV1, DecodeError, ExpenseViewV1, ExpensesV1, ProjectsV1, SliceRecord, TaskViewV1,
    TasksV1, UiPreferences, UiV1,
};
pub use writer::BackgroundWriter;

bitflags! {
    /// Persisted slices touched by an intent.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Slices: u8 {
        const TASKS = 1 << 0;
        const PROJECTS = 1 << 1;
        const UI = 1 << 2;
        const TASK_VIEW = 1 << 3;
        const EXPENSES = 1 << 4;
        const DARK_MODE = 1 << 5;
        const EXPENSE_VIEW = 1 << 6;
    }
}

pub struct PersistenceSync {
    store: Arc<dyn KeyValueStore>,
    writer: Option<BackgroundWriter>,
}

impl PersistenceSync {
    pub fn new(store: Arc<dyn KeyValueStore>, options: &PersistenceOptions) -> Result<Self> {
        let writer = if options.background_writes {
            Some(BackgroundWriter::spawn(Arc::clone(&store))?)
        } else {
            None
        };
        Ok(Self { store, writer })
    }

    /// Writes go straight to the store on the calling thread.
    pub fn inline(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            writer: None,
        }
    }

    pub fn is_background(&self) -> bool {
        self.writer.is_some()
    }

    /// Reads and decodes one slice. `None` means the caller should use its default:
    /// the key is absent, unreadable, or holds a blob that failed to decode.
    pub fn load<R: SliceRecord>(&self) -> Option<R::Value> {
        let raw = match self.store.get(R::KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key = R::KEY, "slice absent, using default");
                return None;
            }
            Err(err) => {
                tracing::warn!(key = R::KEY, error = %format!("{err:#}"), "slice unreadable, using default");
                return None;
            }
        };
        match records::decode::<R>(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key = R::KEY, error = %err, "slice malformed, using default");
                self.preserve_corrupt(R::KEY, &raw);
                None
            }
        }
    }

    pub fn load_or<R, F>(&self, default: F) -> R::Value
    where
        R: SliceRecord,
        F: FnOnce() -> R::Value,
    {
        self.load::<R>().unwrap_or_else(default)
    }

    /// Mirrors one slice. Failures are logged; the in-memory state stays authoritative.
    pub fn write<R: SliceRecord>(&self, value: &R::Value) {
        let encoded = match records::encode::<R>(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::warn!(key = R::KEY, error = %format!("{err:#}"), "could not encode slice");
                return;
            }
        };
        match &self.writer {
            Some(writer) => writer.submit(R::KEY, encoded),
            None => match self.store.set(R::KEY, &encoded) {
                Ok(()) => tracing::debug!(key = R::KEY, bytes = encoded.len(), "persisted slice"),
                Err(err) => {
                    tracing::warn!(key = R::KEY, error = %format!("{err:#}"), "persisting slice failed")
                }
            },
        }
    }

    /// Waits for queued background writes. A no-op for inline persistence.
    pub fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush();
        }
    }

    fn preserve_corrupt(&self, key: &str, raw: &str) {
        let backup = format!("{key}{}", records::CORRUPT_SUFFIX);
        if let Err(err) = self.store.set(&backup, raw) {
            tracing::warn!(key = %backup, error = %format!("{err:#}"), "could not keep corrupt blob");
        }
    }
}
