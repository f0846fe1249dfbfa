//! # Store Error Types
//!
//! Error types for cart-store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error / io::Error / toml / CoreError                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds context and categorization            │
//! │       │                                                                 │
//! │       ├── mutation path: ItemNotFound / InvalidPrice, cart untouched   │
//! │       ├── writer path:   Persistence logged, never reaches the UI      │
//! │       └── usage path:    OutsideProvider (use_cart panics with it)     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use cart_core::CoreError;
use thiserror::Error;

/// Cart store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `increment`/`decrement` referenced an id that is not in the cart.
    #[error("Item not in cart: {0}")]
    ItemNotFound(String),

    /// `add_to_cart` was given a NaN or infinite price.
    #[error("Invalid price for {0}: must be a finite number")]
    InvalidPrice(String),

    /// The cart accessor was used outside a `CartProvider` scope.
    ///
    /// This is a programming mistake, not a runtime condition.
    #[error("use_cart must be used within a CartProvider scope")]
    OutsideProvider,

    /// Reading or writing the key-value store failed.
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// A stored snapshot could not be decoded or encoded.
    ///
    /// Hydration logs this and starts empty; it surfaces only to callers
    /// that decode snapshots through the store's error type.
    #[error("Invalid snapshot: {0}")]
    Snapshot(String),

    /// Opening the database failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The persistence writer task has stopped.
    #[error("Persistence writer has shut down")]
    WriterClosed,
}

impl StoreError {
    /// Machine-readable code for CLI output and UI mapping.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::ItemNotFound(_) => "NOT_FOUND",
            StoreError::InvalidPrice(_) => "INVALID_PRICE",
            StoreError::OutsideProvider => "USAGE_ERROR",
            StoreError::Persistence(_) | StoreError::Connection(_) => "STORAGE_ERROR",
            StoreError::Snapshot(_) => "INVALID_SNAPSHOT",
            StoreError::Migration(_) => "MIGRATION_ERROR",
            StoreError::Config(_) => "CONFIG_ERROR",
            StoreError::WriterClosed => "WRITER_CLOSED",
        }
    }
}

impl From<CoreError> for StoreError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ItemNotFound(id) => StoreError::ItemNotFound(id),
            CoreError::InvalidPrice(id) => StoreError::InvalidPrice(id),
            CoreError::Snapshot(msg) => StoreError::Snapshot(msg),
        }
    }
}

/// Convert sqlx errors to StoreError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::PoolTimedOut   → StoreError::Connection
/// sqlx::Error::PoolClosed     → StoreError::Connection
/// Other                       → StoreError::Persistence
/// ```
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => StoreError::Connection("Pool timed out".to_string()),
            sqlx::Error::PoolClosed => StoreError::Connection("Pool is closed".to_string()),
            sqlx::Error::Database(db_err) => StoreError::Persistence(db_err.message().to_string()),
            _ => StoreError::Persistence(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Migration(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(err: toml::de::Error) -> Self {
        StoreError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for StoreError {
    fn from(err: toml::ser::Error) -> Self {
        StoreError::Config(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        let err: StoreError = CoreError::ItemNotFound("p1".to_string()).into();
        assert!(matches!(err, StoreError::ItemNotFound(ref id) if id == "p1"));
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_invalid_price_mapping() {
        let err: StoreError = CoreError::InvalidPrice("p2".to_string()).into();
        assert!(matches!(err, StoreError::InvalidPrice(ref id) if id == "p2"));
        assert_eq!(err.code(), "INVALID_PRICE");
    }

    #[test]
    fn test_usage_error_message_names_the_misuse() {
        let msg = StoreError::OutsideProvider.to_string();
        assert!(msg.contains("use_cart"));
        assert!(msg.contains("CartProvider"));
    }

    #[test]
    fn test_pool_closed_is_connection_error() {
        let err: StoreError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, StoreError::Connection(_)));
    }
}
