//! # cart-store: Cart State Container for Marketplace Cart
//!
//! Owns the live cart for the storefront app: hydrates it from local
//! storage at startup, applies add / increment / decrement in memory,
//! publishes every change, and mirrors the cart to storage through a single
//! sequential writer.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Marketplace Cart Data Flow                       │
//! │                                                                         │
//! │  UI handler (tap "+")                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     cart-store (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   CartStore   │    │ PersistWriter │    │ KeyValueStore│  │   │
//! │  │   │  (store.rs)   │───►│  (writer.rs)  │───►│   (kv/)      │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ watch<Cart>   │    │ one task,     │    │ SqliteKvStore│  │   │
//! │  │   │ add/inc/dec   │    │ ordered,      │    │ MemoryKvStore│  │   │
//! │  │   │               │    │ coalescing    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │     SQLite: kv_store["@GoMarketplace:producsCart"] = [...]      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - `CartStore`, the handle UI code holds
//! - [`provider`] - Scoped injection (`CartProvider`, `use_cart`)
//! - [`writer`] - Sequential persistence writer task
//! - [`kv`] - Key-value trait and backends
//! - [`config`] - TOML + environment configuration
//! - [`migrations`] - Embedded SQLite migrations
//! - [`error`] - Store error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cart_store::{CartConfig, CartStore};
//! use cart_core::NewLineItem;
//!
//! let config = CartConfig::load(None)?;
//! let store = CartStore::from_config(&config).await?;
//!
//! store.add_to_cart(NewLineItem::new("p1", "Shoe", "https://cdn/shoe.png", 10.0))?;
//! store.increment("p1")?;
//!
//! store.shutdown().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod kv;
pub mod migrations;
pub mod provider;
pub mod store;
pub mod writer;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{Backend, CartConfig};
pub use error::{StoreError, StoreResult};
pub use kv::memory::MemoryKvStore;
pub use kv::sqlite::{SqliteConfig, SqliteKvStore};
pub use kv::KeyValueStore;
pub use provider::{try_use_cart, use_cart, CartProvider};
pub use store::CartStore;
pub use writer::{PersistWriter, PersistWriterHandle, Snapshot, WriterStats};
