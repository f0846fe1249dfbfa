//! # Cart Provider
//!
//! Scoped injection of a [`CartStore`] for code that cannot take the handle
//! as a parameter (deeply nested screens, callbacks).
//!
//! ```rust,ignore
//! let store = CartStore::from_config(&config).await?;
//!
//! CartProvider::scope(store, async {
//!     // anywhere inside this future:
//!     let cart = use_cart();
//!     cart.increment("p1")?;
//! })
//! .await;
//! ```
//!
//! The store is bound to the current task only. Work handed to
//! `tokio::spawn` does not inherit it; pass the handle explicitly there.

use std::future::Future;

use crate::error::{StoreError, StoreResult};
use crate::store::CartStore;

tokio::task_local! {
    static CURRENT_CART: CartStore;
}

/// Installs a store for the duration of a future or closure.
pub struct CartProvider;

impl CartProvider {
    /// Runs `fut` with `store` available through [`use_cart`].
    pub async fn scope<F>(store: CartStore, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_CART.scope(store, fut).await
    }

    /// Runs `f` with `store` available through [`use_cart`].
    pub fn sync_scope<R>(store: CartStore, f: impl FnOnce() -> R) -> R {
        CURRENT_CART.sync_scope(store, f)
    }
}

/// Returns the store installed by the enclosing [`CartProvider`] scope.
pub fn try_use_cart() -> StoreResult<CartStore> {
    CURRENT_CART
        .try_with(CartStore::clone)
        .map_err(|_| StoreError::OutsideProvider)
}

/// Returns the store installed by the enclosing [`CartProvider`] scope.
///
/// # Panics
/// Outside a provider scope. That is a wiring bug, not a runtime
/// condition; use [`try_use_cart`] to probe instead.
pub fn use_cart() -> CartStore {
    match try_use_cart() {
        Ok(store) => store,
        Err(e) => panic!("{}", e),
    }
}
