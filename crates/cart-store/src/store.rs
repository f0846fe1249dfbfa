//! # Cart Store
//!
//! The live cart: hydrated once, mutated in memory, mirrored to storage.
//!
//! ## Thread Safety
//! The cart lives inside a `tokio::sync::watch` channel:
//! 1. Mutations go through `send_if_modified`, which holds the channel's
//!    write lock, so each mutation is atomic
//! 2. The resulting snapshot is enqueued while that lock is held, so
//!    snapshot revisions follow mutation order exactly
//! 3. Subscribers are notified only when the cart actually changed
//!
//! ## Store Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CartStore Lifecycle                                  │
//! │                                                                         │
//! │  CartStore::open(kv, key).await                                        │
//! │       │                                                                 │
//! │       ├── kv.get(key) ── Some(json) ─► Cart::from_snapshot (normalize) │
//! │       │               ├─ None ───────► empty cart                       │
//! │       │               └─ Err / bad ──► warn!, empty cart                │
//! │       │                                                                 │
//! │       └── PersistWriter::spawn(kv, key)                                │
//! │                                                                         │
//! │  add_to_cart / increment / decrement / clear                           │
//! │       │                                                                 │
//! │       ├── mutate Cart in memory (sync)                                 │
//! │       ├── notify subscribers (watch)                                   │
//! │       └── enqueue NEW snapshot ──► PersistWriter (async, ordered)      │
//! │                                                                         │
//! │  Unknown id ──► Err(ItemNotFound), no notify, no write                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use cart_core::{Cart, CartChange, CartTotals, CoreResult, LineItem, NewLineItem};

use crate::config::{Backend, CartConfig};
use crate::error::{StoreError, StoreResult};
use crate::kv::memory::MemoryKvStore;
use crate::kv::sqlite::SqliteKvStore;
use crate::kv::KeyValueStore;
use crate::writer::{PersistWriter, PersistWriterHandle, Snapshot, WriterStats};

struct Inner {
    state: watch::Sender<Cart>,
    revision: AtomicU64,
    writer: PersistWriterHandle,
    key: String,
}

/// Handle to the live cart.
///
/// Cheap to clone; every clone refers to the same cart. Pass it to whatever
/// needs the cart, or install it with [`crate::CartProvider`].
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("key", &self.inner.key)
            .field("items", &self.inner.state.borrow().len())
            .finish()
    }
}

impl CartStore {
    /// Hydrates the cart from `kv` and starts the persistence writer.
    ///
    /// Must be called inside a tokio runtime. Never fails: an unreadable or
    /// undecodable snapshot is logged and the cart starts empty. The stored
    /// value is left as-is until the first mutation replaces it.
    pub async fn open(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let cart = hydrate(kv.as_ref(), &key).await;
        let writer = PersistWriter::spawn(kv, key.clone());
        let (state, _) = watch::channel(cart);

        CartStore {
            inner: Arc::new(Inner {
                state,
                revision: AtomicU64::new(0),
                writer,
                key,
            }),
        }
    }

    /// Opens a store with an empty in-memory backend.
    pub async fn in_memory() -> Self {
        Self::open(Arc::new(MemoryKvStore::new()), cart_core::DEFAULT_STORAGE_KEY).await
    }

    /// Builds the configured backend and opens the store on it.
    pub async fn from_config(config: &CartConfig) -> StoreResult<Self> {
        let kv: Arc<dyn KeyValueStore> = match config.storage.backend {
            Backend::Memory => Arc::new(MemoryKvStore::new()),
            Backend::Sqlite => Arc::new(SqliteKvStore::open(config.sqlite_config()).await?),
        };

        info!(
            backend = %config.storage.backend,
            key = %config.storage_key(),
            "Opening cart store"
        );

        Ok(Self::open(kv, config.storage_key()).await)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current items in insertion order.
    pub fn items(&self) -> Vec<LineItem> {
        self.inner.state.borrow().items().to_vec()
    }

    /// Copy of the current cart.
    pub fn cart(&self) -> Cart {
        self.inner.state.borrow().clone()
    }

    /// Summary of the current cart.
    pub fn totals(&self) -> CartTotals {
        self.inner.state.borrow().totals()
    }

    /// Receiver that is notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.inner.state.subscribe()
    }

    /// Key the cart is persisted under.
    pub fn storage_key(&self) -> &str {
        &self.inner.key
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds a product, or one more unit if it is already in the cart.
    ///
    /// A NaN or infinite price returns `Err(InvalidPrice)` and leaves the
    /// cart and storage untouched.
    pub fn add_to_cart(&self, item: NewLineItem) -> StoreResult<CartChange> {
        let id = item.id.clone();
        let change = self.mutate("add_to_cart", &id, |cart| cart.add(item))?;
        debug!(%id, ?change, "Added to cart");
        Ok(change)
    }

    /// Adds one unit of an item already in the cart.
    ///
    /// ## Returns
    /// - `Ok(qty)` - the new quantity
    /// - `Err(ItemNotFound)` - no such item; cart and storage untouched
    pub fn increment(&self, id: &str) -> StoreResult<u32> {
        self.mutate("increment", id, |cart| cart.increment(id))
    }

    /// Removes one unit; the item is removed when it reaches zero.
    ///
    /// ## Returns
    /// - `Ok(Some(qty))` - item still in cart
    /// - `Ok(None)` - item removed
    /// - `Err(ItemNotFound)` - no such item; cart and storage untouched
    pub fn decrement(&self, id: &str) -> StoreResult<Option<u32>> {
        self.mutate("decrement", id, |cart| cart.decrement(id))
    }

    /// Empties the cart.
    pub fn clear(&self) -> StoreResult<()> {
        self.mutate("clear", "*", |cart| {
            cart.clear();
            Ok(())
        })
    }

    /// Applies `op` atomically. On success, subscribers are notified and the
    /// resulting cart is queued for persistence.
    fn mutate<R>(
        &self,
        op: &'static str,
        id: &str,
        f: impl FnOnce(&mut Cart) -> CoreResult<R>,
    ) -> StoreResult<R> {
        let mut outcome = None;

        self.inner.state.send_if_modified(|cart| {
            let result = f(cart);
            let changed = result.is_ok();
            if changed {
                self.persist(cart);
            }
            outcome = Some(result);
            changed
        });

        match outcome {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => {
                warn!(op, %id, error = %e, "Cart operation ignored");
                Err(e.into())
            }
            None => unreachable!("send_if_modified always runs the closure"),
        }
    }

    /// Queues the given (already updated) cart for the writer.
    fn persist(&self, cart: &Cart) {
        let revision = self.inner.revision.fetch_add(1, Ordering::SeqCst) + 1;

        let payload = match cart.to_snapshot() {
            Ok(payload) => payload,
            Err(e) => {
                error!(revision, error = %e, "Failed to encode cart snapshot");
                return;
            }
        };

        if let Err(e) = self.inner.writer.enqueue(Snapshot { revision, payload }) {
            warn!(revision, error = %e, "Cart change not persisted");
        }
    }

    // =========================================================================
    // Persistence Control
    // =========================================================================

    /// Waits until every change made so far has been written (or has failed).
    pub async fn flush(&self) -> StoreResult<()> {
        self.inner.writer.flush().await
    }

    /// Flushes and stops the writer. Later mutations still update memory
    /// but are no longer persisted.
    pub async fn shutdown(&self) -> StoreResult<()> {
        self.inner.writer.shutdown().await
    }

    /// Persistence counters.
    pub fn writer_stats(&self) -> WriterStats {
        self.inner.writer.stats()
    }
}

/// Loads the initial cart. Failures degrade to an empty cart.
async fn hydrate(kv: &dyn KeyValueStore, key: &str) -> Cart {
    let json = match kv.get(key).await {
        Ok(Some(json)) => json,
        Ok(None) => {
            debug!(%key, "No persisted cart, starting empty");
            return Cart::new();
        }
        Err(e) => {
            warn!(%key, error = %e, "Failed to read persisted cart, starting empty");
            return Cart::new();
        }
    };

    match Cart::from_snapshot(&json) {
        Ok((cart, issues)) => {
            for issue in &issues {
                warn!(%key, %issue, "Repaired persisted cart");
            }
            info!(%key, items = cart.len(), "Hydrated cart");
            cart
        }
        Err(e) => {
            warn!(%key, error = %e, "Discarding undecodable cart snapshot");
            Cart::new()
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::sqlite::SqliteConfig;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;

    const KEY: &str = "@GoMarketplace:producsCart";

    fn shoe() -> NewLineItem {
        NewLineItem::new("p1", "Shoe", "u", 10.0)
    }

    fn hat() -> NewLineItem {
        NewLineItem::new("p2", "Hat", "h", 4.5)
    }

    /// Memory store whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryKvStore,
        broken: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(StoreError::Persistence("storage offline".into()));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> StoreResult<()> {
            self.inner.remove(key).await
        }
    }

    async fn stored_cart(kv: &MemoryKvStore) -> Option<Cart> {
        let json = kv.get(KEY).await.unwrap()?;
        Some(Cart::from_snapshot(&json).unwrap().0)
    }

    #[tokio::test]
    async fn test_walkthrough_persists_each_step() {
        let kv = MemoryKvStore::new();
        let store = CartStore::open(Arc::new(kv.clone()), KEY).await;
        assert!(store.items().is_empty());

        store.add_to_cart(shoe()).unwrap();
        store.flush().await.unwrap();
        let items = store.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 1);
        assert_eq!(stored_cart(&kv).await.unwrap(), store.cart());

        assert_eq!(store.increment("p1").unwrap(), 2);
        store.flush().await.unwrap();
        assert_eq!(stored_cart(&kv).await.unwrap().get("p1").unwrap().quantity, 2);

        assert_eq!(store.decrement("p1").unwrap(), Some(1));
        assert_eq!(store.decrement("p1").unwrap(), None);
        store.flush().await.unwrap();

        assert!(store.items().is_empty());
        assert!(stored_cart(&kv).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_existing_is_increment() {
        let store = CartStore::in_memory().await;
        store.add_to_cart(shoe()).unwrap();
        store.add_to_cart(hat()).unwrap();

        let change = store.add_to_cart(shoe()).unwrap();

        assert_eq!(change, CartChange::Incremented { quantity: 2 });
        assert_eq!(store.items().len(), 2);
    }

    #[tokio::test]
    async fn test_not_found_leaves_cart_and_storage_untouched() {
        let kv = MemoryKvStore::new();
        let store = CartStore::open(Arc::new(kv.clone()), KEY).await;
        store.add_to_cart(shoe()).unwrap();
        store.flush().await.unwrap();
        let stats_before = store.writer_stats();

        assert!(matches!(
            store.increment("ghost"),
            Err(StoreError::ItemNotFound(ref id)) if id == "ghost"
        ));
        assert!(matches!(
            store.decrement("ghost"),
            Err(StoreError::ItemNotFound(_))
        ));
        store.flush().await.unwrap();

        assert_eq!(store.items().len(), 1);
        assert_eq!(store.writer_stats(), stats_before);
        assert_eq!(stored_cart(&kv).await.unwrap(), store.cart());
    }

    #[tokio::test]
    async fn test_reload_restores_same_cart() {
        let kv = MemoryKvStore::new();
        let first = CartStore::open(Arc::new(kv.clone()), KEY).await;
        first.add_to_cart(hat()).unwrap();
        first.add_to_cart(shoe()).unwrap();
        first.increment("p1").unwrap();
        first.increment("p2").unwrap();
        first.shutdown().await.unwrap();

        // Simulated restart over the same storage
        let second = CartStore::open(Arc::new(kv), KEY).await;

        assert_eq!(second.cart(), first.cart());
        let ids: Vec<_> = second.items().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
    }

    #[tokio::test]
    async fn test_reload_over_sqlite() {
        let kv = Arc::new(SqliteKvStore::open(SqliteConfig::in_memory()).await.unwrap());

        let first = CartStore::open(kv.clone(), KEY).await;
        first.add_to_cart(shoe()).unwrap();
        first.increment("p1").unwrap();
        first.flush().await.unwrap();

        let second = CartStore::open(kv, KEY).await;
        assert_eq!(second.cart(), first.cart());
        assert_eq!(second.totals().total_quantity, 2);
    }

    #[tokio::test]
    async fn test_rapid_mutations_persist_newest_state() {
        let kv = MemoryKvStore::new();
        let store = CartStore::open(Arc::new(kv.clone()), KEY).await;

        store.add_to_cart(shoe()).unwrap();
        for _ in 0..100 {
            store.increment("p1").unwrap();
        }
        store.add_to_cart(hat()).unwrap();
        store.decrement("p1").unwrap();
        store.flush().await.unwrap();

        let stored = stored_cart(&kv).await.unwrap();
        assert_eq!(stored, store.cart());
        assert_eq!(stored.get("p1").unwrap().quantity, 100);
        assert_eq!(store.writer_stats().last_revision, Some(103));
    }

    #[tokio::test]
    async fn test_concurrent_handles_persist_final_state() {
        let kv = MemoryKvStore::new();
        let store = CartStore::open(Arc::new(kv.clone()), KEY).await;
        store.add_to_cart(shoe()).unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..25 {
                    store.increment("p1").unwrap();
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        store.flush().await.unwrap();

        assert_eq!(store.cart().get("p1").unwrap().quantity, 201);
        assert_eq!(stored_cart(&kv).await.unwrap(), store.cart());
    }

    #[tokio::test]
    async fn test_storage_outage_does_not_block_mutations() {
        let flaky = Arc::new(FlakyStore::default());
        let store = CartStore::open(flaky.clone(), KEY).await;

        flaky.broken.store(true, Ordering::SeqCst);
        store.add_to_cart(shoe()).unwrap();
        store.increment("p1").unwrap();
        store.flush().await.unwrap();

        assert_eq!(store.cart().get("p1").unwrap().quantity, 2);
        assert!(store.writer_stats().failed >= 1);
        assert_eq!(flaky.inner.get(KEY).await.unwrap(), None);

        // Next mutation after recovery writes the full current state
        flaky.broken.store(false, Ordering::SeqCst);
        store.add_to_cart(hat()).unwrap();
        store.flush().await.unwrap();

        let json = flaky.inner.get(KEY).await.unwrap().unwrap();
        assert_eq!(Cart::from_snapshot(&json).unwrap().0, store.cart());
    }

    #[tokio::test]
    async fn test_undecodable_snapshot_starts_empty_and_is_kept() {
        let kv = MemoryKvStore::new();
        kv.set(KEY, "{not json").await.unwrap();

        let store = CartStore::open(Arc::new(kv.clone()), KEY).await;

        assert!(store.items().is_empty());
        store.flush().await.unwrap();
        assert_eq!(kv.get(KEY).await.unwrap().as_deref(), Some("{not json"));
    }

    #[tokio::test]
    async fn test_hydration_repairs_snapshot() {
        let kv = MemoryKvStore::new();
        kv.set(
            KEY,
            r#"[
                {"id":"p1","title":"Shoe","image_url":"u","price":10,"quantity":1},
                {"id":"p2","title":"Hat","image_url":"h","price":4.5,"quantity":0},
                {"id":"p1","title":"Shoe","image_url":"u","price":10,"quantity":2}
            ]"#,
        )
        .await
        .unwrap();

        let store = CartStore::open(Arc::new(kv), KEY).await;

        let items = store.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_non_finite_price_never_reaches_storage() {
        let kv = MemoryKvStore::new();
        let store = CartStore::open(Arc::new(kv.clone()), KEY).await;
        store.add_to_cart(shoe()).unwrap();

        let result = store.add_to_cart(NewLineItem::new("p2", "Hat", "h", f64::NAN));
        assert!(matches!(result, Err(StoreError::InvalidPrice(ref id)) if id == "p2"));
        store.flush().await.unwrap();

        // Simulated restart keeps every line
        let reloaded = CartStore::open(Arc::new(kv), KEY).await;
        assert_eq!(reloaded.items().len(), 1);
        assert_eq!(reloaded.cart(), store.cart());
    }

    #[tokio::test]
    async fn test_reload_with_null_price_keeps_other_lines() {
        let kv = MemoryKvStore::new();
        kv.set(
            KEY,
            r#"[
                {"id":"p1","title":"Shoe","image_url":"u","price":10,"quantity":2},
                {"id":"p2","title":"Hat","image_url":"h","price":null,"quantity":1}
            ]"#,
        )
        .await
        .unwrap();

        let store = CartStore::open(Arc::new(kv.clone()), KEY).await;

        let items = store.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "p1");
        assert_eq!(items[0].quantity, 2);

        // First mutation rewrites the surviving line, not an empty cart
        store.increment("p1").unwrap();
        store.flush().await.unwrap();
        assert_eq!(stored_cart(&kv).await.unwrap().get("p1").unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn test_subscribers_see_new_state() {
        let store = CartStore::in_memory().await;
        let mut rx = store.subscribe();

        store.add_to_cart(shoe()).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);

        // Failed operations don't notify
        let _ = store.increment("ghost");
        assert!(!rx.has_changed().unwrap());

        store.increment("p1").unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().get("p1").unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_clear_persists_empty_cart() {
        let kv = MemoryKvStore::new();
        let store = CartStore::open(Arc::new(kv.clone()), KEY).await;
        store.add_to_cart(shoe()).unwrap();

        store.clear().unwrap();
        store.flush().await.unwrap();

        assert!(store.items().is_empty());
        assert_eq!(kv.get(KEY).await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_mutations_after_shutdown_stay_in_memory() {
        let store = CartStore::in_memory().await;
        store.shutdown().await.unwrap();

        store.add_to_cart(shoe()).unwrap();

        assert_eq!(store.items().len(), 1);
        assert!(matches!(store.flush().await, Err(StoreError::WriterClosed)));
    }

    #[tokio::test]
    async fn test_from_config_memory_backend() {
        let mut config = CartConfig::default();
        config.storage.backend = Backend::Memory;
        config.storage.key = "@Test:cart".to_string();

        let store = CartStore::from_config(&config).await.unwrap();

        assert_eq!(store.storage_key(), "@Test:cart");
        assert!(store.items().is_empty());
    }
}
