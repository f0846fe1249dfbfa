//! # Key-Value Storage
//!
//! The persistence seam under the cart store.
//!
//! ## Backends
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    KeyValueStore implementations                        │
//! │                                                                         │
//! │  CartStore / PersistWriter                                             │
//! │       │                                                                 │
//! │       │  get(key) / set(key, value)                                     │
//! │       ▼                                                                 │
//! │  Arc<dyn KeyValueStore>                                                │
//! │  ├── MemoryKvStore  (memory.rs)  HashMap, tests + ephemeral sessions   │
//! │  └── SqliteKvStore  (sqlite.rs)  kv_store table, survives restarts     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Values are whole snapshots: each `set` replaces the previous value
//! atomically.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Asynchronous string key-value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Deletes `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> StoreResult<()>;
}
