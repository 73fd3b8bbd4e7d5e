//! # In-memory key/value store.
//!
//! [`MemoryKv`] implements [`KvStore`] over a `BTreeMap`. It exists for tests,
//! demos, and single-process deployments that still want the mirror's key
//! layout; the ordering and TTL semantics match what the watcher expects from
//! a real backend.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::StoreError;

use super::kv::{KvEvent, KvStore};

struct Entry {
    value: String,
    expires: Option<Instant>,
}

struct Watcher {
    prefix: String,
    tx: mpsc::Sender<KvEvent>,
}

/// In-memory [`KvStore`] with prefix watches and lazy TTL expiry.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<BTreeMap<String, Entry>>,
    watchers: Mutex<Vec<Watcher>>,
}

impl MemoryKv {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn notify(&self, key: &str, value: Option<&str>) {
        let ev = KvEvent {
            key: key.to_string(),
            value: value.map(str::to_string),
        };
        let mut watchers = self.watchers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        watchers.retain(|w| {
            if !key.starts_with(&w.prefix) {
                return true;
            }
            // A full queue drops the watcher rather than blocking writers.
            !matches!(
                w.tx.try_send(ev.clone()),
                Err(mpsc::error::TrySendError::Closed(_))
            )
        });
    }

    fn live(entry: &Entry, now: Instant) -> bool {
        entry.expires.map(|at| at > now).unwrap_or(true)
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        {
            let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires: None,
                },
            );
        }
        self.notify(key, Some(value));
        Ok(())
    }

    async fn put_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        {
            let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires: Some(Instant::now() + ttl),
                },
            );
        }
        self.notify(key, Some(value));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(entries
            .get(key)
            .filter(|e| Self::live(e, now))
            .map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let removed = {
            let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            entries.remove(key).is_some()
        };
        if removed {
            self.notify(key, None);
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .filter(|(_, e)| Self::live(e, now))
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect())
    }

    async fn watch(&self, prefix: &str) -> Result<mpsc::Receiver<KvEvent>, StoreError> {
        let (tx, rx) = mpsc::channel(256);
        self.watchers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Watcher {
                prefix: prefix.to_string(),
                tx,
            });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_is_sorted_and_prefix_scoped() {
        let kv = MemoryKv::new();
        kv.put("/a/2", "two").await.unwrap();
        kv.put("/a/1", "one").await.unwrap();
        kv.put("/b/1", "other").await.unwrap();

        let listed = kv.list("/a/").await.unwrap();
        assert_eq!(
            listed,
            vec![
                ("/a/1".to_string(), "one".to_string()),
                ("/a/2".to_string(), "two".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn watch_sees_mutations_in_order() {
        let kv = MemoryKv::new();
        let mut rx = kv.watch("/q/").await.unwrap();

        kv.put("/q/1", "first").await.unwrap();
        kv.put("/q/2", "second").await.unwrap();
        kv.delete("/q/1").await.unwrap();
        kv.put("/other", "ignored").await.unwrap();

        let ev1 = rx.recv().await.unwrap();
        assert_eq!((ev1.key.as_str(), ev1.value.as_deref()), ("/q/1", Some("first")));
        let ev2 = rx.recv().await.unwrap();
        assert_eq!((ev2.key.as_str(), ev2.value.as_deref()), ("/q/2", Some("second")));
        let ev3 = rx.recv().await.unwrap();
        assert_eq!((ev3.key.as_str(), ev3.value), ("/q/1", None));
    }

    #[tokio::test]
    async fn ttl_entries_expire() {
        let kv = MemoryKv::new();
        kv.put_with_ttl("/lease", "alive", Duration::from_millis(20))
            .await
            .unwrap();
        assert!(kv.get("/lease").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(kv.get("/lease").await.unwrap().is_none());
        assert!(kv.list("/").await.unwrap().is_empty());
    }
}
