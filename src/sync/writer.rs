use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use crate::storage::KeyValueStore;

enum WriteOp {
    Set { key: String, value: String },
    Flush(Sender<()>),
}

/// Single writer thread draining a FIFO queue into the store.
pub struct BackgroundWriter {
    tx: Option<Sender<WriteOp>>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundWriter {
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let (tx, rx) = unbounded();
        let handle = thread::Builder::new()
            .name("taskly-writer".into())
            .spawn(move || run(store, rx))
            .context("spawning persistence writer thread")?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Queues a write without waiting for it.
    pub fn submit(&self, key: &str, value: String) {
        let Some(tx) = &self.tx else {
            return;
        };
        let op = WriteOp::Set {
            key: key.to_string(),
            value,
        };
        if tx.send(op).is_err() {
            tracing::warn!(key, "persistence writer is gone, dropping write");
        }
    }

    /// Blocks until every write queued before this call has reached the store.
    pub fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (ack_tx, ack_rx) = bounded(1);
        if tx.send(WriteOp::Flush(ack_tx)).is_err() {
            return;
        }
        let _ = ack_rx.recv();
    }
}

impl Drop for BackgroundWriter {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain what is queued and exit.
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("persistence writer thread panicked");
            }
        }
    }
}

fn run(store: Arc<dyn KeyValueStore>, rx: Receiver<WriteOp>) {
    for op in rx {
        match op {
            WriteOp::Set { key, value } => {
                if let Err(err) = store.set(&key, &value) {
                    tracing::warn!(key = %key, error = %format!("{err:#}"), "background write failed");
                } else {
                    tracing::debug!(key = %key, bytes = value.len(), "persisted slice");
                }
            }
            WriteOp::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}
