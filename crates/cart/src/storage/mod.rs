//! Key-value persistence media for the cart.
//!
//! The cart only needs a single string slot per key, so the medium is a
//! minimal async key-value interface. Two media are provided:
//! - [`MemoryStore`] - process-local map, used by tests and ephemeral carts
//! - [`FileStore`] - one JSON file per key inside a directory

mod file;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors raised by a persistence medium.
///
/// These never reach callers of cart mutations: the store logs and drops
/// them.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the underlying medium failed.
    #[error("I/O error for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The stored value was written by an incompatible format version.
    #[error("Unsupported stored cart version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// The key cannot be mapped onto the medium.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// The medium refused the operation (offline, quota exceeded, ...).
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Whether `key` is usable on every medium: non-empty, ASCII letters,
/// digits, `-`, `_` and `.`, and not starting with a dot.
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Async key-value slot storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if nothing is stored.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value stored under `key`. The write queue uses this to
    /// drop the slot of an emptied cart.
    ///
    /// Returns Ok even if nothing is stored (idempotent operation).
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_rule() {
        for key in ["shopping-cart-storage", "cart_a", "cart.v2"] {
            assert!(is_valid_key(key), "{key}");
        }
        for key in ["", ".hidden", "../escape", "a/b", "cart key"] {
            assert!(!is_valid_key(key), "{key}");
        }
    }
}
