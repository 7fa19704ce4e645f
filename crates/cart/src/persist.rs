//! Persisted cart format and the background write queue.
//!
//! Only line items are persisted. The stored value is a versioned JSON
//! envelope:
//!
//! ```json
//! {"state":{"items":[{"id":1,"name":"Artisan Candle Set","price":45.0,"image":"...","category":"Home","quantity":2}]},"version":0}
//! ```
//!
//! An emptied cart removes the slot instead of storing an empty list.
//!
//! Writes never happen on the mutation path. A mutation hands the new item
//! list to [`CartWriter::enqueue`], which only replaces a latest-value slot;
//! a single task per writer drains that slot into the medium. At most one
//! write is in flight per key, intermediate states may be coalesced, and an
//! older state can never land after a newer one.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::state::CartLineItem;
use crate::storage::{KeyValueStore, StorageError};

/// Default storage key for the cart slot.
pub const STORAGE_KEY: &str = "shopping-cart-storage";

/// Format version written into every stored value.
pub const STORAGE_VERSION: u32 = 0;

#[derive(Serialize, Deserialize)]
struct PersistedCart<I> {
    state: PersistedItems<I>,
    version: u32,
}

#[derive(Serialize, Deserialize)]
struct PersistedItems<I> {
    items: I,
}

/// Encode line items into the stored envelope.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if encoding fails.
pub fn encode_items(items: &[CartLineItem]) -> Result<String, StorageError> {
    let persisted = PersistedCart {
        state: PersistedItems { items },
        version: STORAGE_VERSION,
    };
    Ok(serde_json::to_string(&persisted)?)
}

/// Decode line items from a stored envelope.
///
/// # Errors
///
/// Returns `StorageError::Serialization` for malformed values and
/// `StorageError::UnsupportedVersion` for envelopes of another version.
pub fn decode_items(value: &str) -> Result<Vec<CartLineItem>, StorageError> {
    let persisted: PersistedCart<Vec<CartLineItem>> = serde_json::from_str(value)?;
    if persisted.version != STORAGE_VERSION {
        return Err(StorageError::UnsupportedVersion {
            found: persisted.version,
            expected: STORAGE_VERSION,
        });
    }
    Ok(persisted.state.items)
}

/// Read previously persisted items.
///
/// Any failure (missing value, unreadable medium, corrupt or foreign data)
/// yields an empty list.
#[instrument(skip(storage))]
pub async fn read_items(storage: &dyn KeyValueStore, key: &str) -> Vec<CartLineItem> {
    let value = match storage.get(key).await {
        Ok(Some(value)) => value,
        Ok(None) => {
            debug!("No persisted cart, starting empty");
            return Vec::new();
        }
        Err(e) => {
            warn!(error = %e, "Failed to read persisted cart, starting empty");
            return Vec::new();
        }
    };

    decode_items(&value).unwrap_or_else(|e| {
        warn!(error = %e, "Discarding unreadable persisted cart");
        Vec::new()
    })
}

/// Write `items` under `key`. An empty cart removes the slot, which reads
/// back the same as an empty stored list.
async fn write_items(storage: &dyn KeyValueStore, key: &str, items: &[CartLineItem]) {
    let result = if items.is_empty() {
        storage.remove(key).await
    } else {
        match encode_items(items) {
            Ok(value) => storage.set(key, &value).await,
            Err(e) => Err(e),
        }
    };

    match result {
        Ok(()) => debug!(key, items = items.len(), "Persisted cart"),
        Err(e) => warn!(key, error = %e, "Failed to persist cart"),
    }
}

/// Latest-value write queue for one storage key.
pub(crate) struct CartWriter {
    key: String,
    pending: Mutex<Option<watch::Sender<Option<Vec<CartLineItem>>>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CartWriter {
    /// Spawn the drain task on the current Tokio runtime.
    pub(crate) fn spawn(storage: Arc<dyn KeyValueStore>, key: String) -> Self {
        let (tx, mut rx) = watch::channel::<Option<Vec<CartLineItem>>>(None);
        let task_key = key.clone();

        let task = tokio::spawn(async move {
            // `changed` still reports a final unseen value after the sender
            // is dropped, so the last enqueued state is always written.
            while rx.changed().await.is_ok() {
                let items = rx.borrow_and_update().clone();
                if let Some(items) = items {
                    write_items(storage.as_ref(), &task_key, &items).await;
                }
            }
        });

        Self {
            key,
            pending: Mutex::new(Some(tx)),
            task: Mutex::new(Some(task)),
        }
    }

    /// Replace the pending value. Never blocks on I/O.
    pub(crate) fn enqueue(&self, items: Vec<CartLineItem>) {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.as_ref() {
            Some(tx) => {
                tx.send_replace(Some(items));
            }
            None => debug!(key = %self.key, "Write queue closed, dropping cart update"),
        }
    }

    /// Close the queue and wait for the last pending write to finish.
    pub(crate) async fn close(&self) {
        drop(
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(key = %self.key, error = %e, "Cart write task failed");
            }
            info!(key = %self.key, "Cart write queue drained");
        }
    }
}
