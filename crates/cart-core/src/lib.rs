//! # cart-core: Pure Cart Logic for Marketplace Cart
//!
//! This crate holds the cart domain as pure functions with zero I/O
//! dependencies. Storage, subscriptions and background writes live in
//! `cart-store`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Marketplace Cart Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Mobile UI (screens)                          │   │
//! │  │    Catalog ──► Product ──► Cart screen (+ / - buttons)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ CartStore handle                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    cart-store                                   │   │
//! │  │    CartStore, PersistWriter, KeyValueStore backends             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ cart-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                  │   │
//! │  │   │   types   │  │   cart    │  │ validation│                  │   │
//! │  │   │ LineItem  │  │   Cart    │  │ snapshot  │                  │   │
//! │  │   │ Totals    │  │ add/inc/  │  │ normalize │                  │   │
//! │  │   │           │  │ dec       │  │           │                  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORAGE • NO TASKS • PURE FUNCTIONS               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - `LineItem`, `NewLineItem`, `CartTotals`
//! - [`cart`] - The ordered `Cart` collection and its mutations
//! - [`validation`] - Snapshot decoding and normalization
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use cart_core::{Cart, NewLineItem};
//!
//! let mut cart = Cart::new();
//! cart.add(NewLineItem::new("p1", "Shoe", "u", 10.0)).unwrap();
//! cart.increment("p1").unwrap();
//!
//! assert_eq!(cart.get("p1").map(|item| item.quantity), Some(2));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartChange};
pub use error::{CoreError, CoreResult};
pub use types::{CartTotals, LineItem, NewLineItem};
pub use validation::SnapshotIssue;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Storage key the cart snapshot lives under.
///
/// Kept byte-for-byte compatible with snapshots written by earlier releases
/// of the storefront app, typo included.
pub const DEFAULT_STORAGE_KEY: &str = "@GoMarketplace:producsCart";
