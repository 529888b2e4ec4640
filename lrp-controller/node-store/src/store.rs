//! Shared-store abstractions.
//!
//! A shared store synchronizes a set of keys under a common prefix across
//! all participants. Each participant owns its local keys and observes the
//! keys written by others.

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

/// A value that can be written to a shared store.
pub trait Key: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The key's name, relative to the store's prefix.
    fn key_name(&self) -> String;

    fn marshal(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn unmarshal(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Receives changes to the keys of a shared store.
pub trait Observer<K>: Send + Sync {
    fn on_update(&self, key: &K);

    fn on_delete(&self, key: &K);
}

pub struct Configuration<K> {
    pub prefix: String,
    pub observer: Option<Arc<dyn Observer<K>>>,
}

#[async_trait::async_trait]
pub trait SharedStore<K: Key>: Send + Sync {
    /// Writes a local key, returning once the store has acknowledged it.
    async fn update_local_key_sync(&self, key: &K) -> Result<()>;

    /// Leaves the store, deleting all local keys. Releasing a store more than
    /// once has no effect.
    async fn release(&self);
}

/// Connects to the key-value store.
#[async_trait::async_trait]
pub trait StoreBackend<K: Key>: Send + Sync {
    async fn join_shared_store(&self, config: Configuration<K>)
        -> Result<Arc<dyn SharedStore<K>>>;
}

// === impl Configuration ===

impl<K> Configuration<K> {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer<K>>) -> Self {
        self.observer = Some(observer);
        self
    }
}
