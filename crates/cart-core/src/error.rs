//! # Error Types
//!
//! Domain-specific error types for cart-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cart-core errors (this file)                                          │
//! │  └── CoreError        - Missing items, bad prices, bad snapshots       │
//! │                                                                         │
//! │  cart-store errors (separate crate)                                    │
//! │  └── StoreError       - Storage, config, usage errors                  │
//! │                                                                         │
//! │  Flow: CoreError → StoreError → UI                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Core cart errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No line item with this id is in the cart.
    ///
    /// ## When This Occurs
    /// - `increment`/`decrement` called with a stale id after the item was
    ///   removed by another screen
    /// - UI bug passing a catalog id that was never added
    ///
    /// The cart is left untouched.
    #[error("Item not in cart: {0}")]
    ItemNotFound(String),

    /// The price cannot be persisted (NaN or infinite).
    #[error("Invalid price for {0}: must be a finite number")]
    InvalidPrice(String),

    /// A persisted snapshot could not be decoded.
    #[error("Invalid cart snapshot: {0}")]
    Snapshot(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Snapshot(err.to_string())
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
