use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Shared storage handle used by state accessors.
pub type SharedStorage = Arc<dyn Storage>;

/// A stored value plus its optimistic-concurrency token. An etag of `*`
/// (or none) makes the next write unconditional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreItem {
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl StoreItem {
    pub fn new(data: Value) -> Self {
        Self { data, etag: None }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("etag conflict writing key '{key}': expected {expected}, found {found}")]
    EtagConflict {
        key: String,
        expected: String,
        found: String,
    },
}

/// Key-value storage collaborator. Serialization of concurrent turns for
/// one conversation is the caller's responsibility; this interface only
/// promises etag-checked writes.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn read(&self, keys: &[String]) -> Result<BTreeMap<String, StoreItem>>;

    async fn write(&self, changes: BTreeMap<String, StoreItem>) -> Result<()>;

    async fn delete(&self, keys: &[String]) -> Result<()>;
}

/// In-memory reference storage with monotonically increasing etags.
#[derive(Default)]
pub struct MemoryStorage {
    items: DashMap<String, StoreItem>,
    counter: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStorage {
        Arc::new(Self::new())
    }

    fn next_etag(&self) -> String {
        self.counter.fetch_add(1, Ordering::SeqCst).to_string()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self, keys: &[String]) -> Result<BTreeMap<String, StoreItem>> {
        let mut found = BTreeMap::new();
        for key in keys {
            if let Some(entry) = self.items.get(key) {
                found.insert(key.clone(), entry.value().clone());
            }
        }
        Ok(found)
    }

    async fn write(&self, changes: BTreeMap<String, StoreItem>) -> Result<()> {
        for (key, mut item) in changes {
            let unconditional = matches!(item.etag.as_deref(), None | Some("*"));
            if !unconditional {
                if let Some(existing) = self.items.get(&key) {
                    let found = existing.etag.clone().unwrap_or_default();
                    if item.etag.as_deref() != Some(found.as_str()) {
                        return Err(StorageError::EtagConflict {
                            key,
                            expected: item.etag.unwrap_or_default(),
                            found,
                        }
                        .into());
                    }
                }
            }
            item.etag = Some(self.next_etag());
            self.items.insert(key, item);
        }
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.items.remove(key);
        }
        Ok(())
    }
}
