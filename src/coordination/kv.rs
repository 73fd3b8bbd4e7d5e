//! # Key/value store abstraction.
//!
//! The wire protocol of the coordination backend is out of scope; the mirror
//! and the command watcher work against [`KvStore`], a minimal key/value plus
//! prefix-watch interface. An in-memory implementation lives in
//! [`MemoryKv`](super::MemoryKv); a networked backend plugs in by implementing
//! this trait.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::StoreError;

/// One observed change under a watched prefix.
#[derive(Clone, Debug)]
pub struct KvEvent {
    /// Full key that changed.
    pub key: String,
    /// New value, or `None` for a deletion.
    pub value: Option<String>,
}

/// Minimal key/value + watch interface over the coordination backend.
///
/// Implementations must deliver watch events for a given prefix in the order
/// the mutations were applied.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Writes a key.
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Writes a key that expires after `ttl` unless refreshed.
    async fn put_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Reads a key.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Deletes a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Lists all live entries under a prefix, sorted by key.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError>;

    /// Subscribes to changes under a prefix, beginning with mutations applied
    /// after this call returns.
    async fn watch(&self, prefix: &str) -> Result<mpsc::Receiver<KvEvent>, StoreError>;
}
