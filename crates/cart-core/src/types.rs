//! # Domain Types
//!
//! Line items and derived summaries.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   add_to_cart    ┌─────────────────┐              │
//! │  │  NewLineItem    │ ───────────────► │    LineItem     │              │
//! │  │  ─────────────  │  (quantity = 1)  │  ─────────────  │              │
//! │  │  id             │                  │  id             │              │
//! │  │  title          │                  │  title          │              │
//! │  │  image_url      │                  │  image_url      │              │
//! │  │  price          │                  │  price          │              │
//! │  └─────────────────┘                  │  quantity >= 1  │              │
//! │                                       └─────────────────┘              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `title`, `image_url` and `price` come from the product catalog and are
//! carried through untouched. No currency logic happens here.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// New Line Item
// =============================================================================

/// A catalog product as handed to `add_to_cart` (no quantity yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewLineItem {
    /// Catalog product id.
    pub id: String,

    /// Display name.
    pub title: String,

    /// Product image reference.
    #[serde(alias = "imageUrl")]
    pub image_url: String,

    /// Unit price as listed by the catalog.
    pub price: f64,
}

impl NewLineItem {
    /// Creates a new line item descriptor.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        image_url: impl Into<String>,
        price: f64,
    ) -> Self {
        NewLineItem {
            id: id.into(),
            title: title.into(),
            image_url: image_url.into(),
            price,
        }
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One product entry in the cart plus its quantity.
///
/// ## Invariants
/// - `quantity >= 1` while the item is in a cart
/// - `id` is unique within a cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    /// Catalog product id.
    pub id: String,

    /// Display name (frozen at time of adding).
    pub title: String,

    /// Product image reference.
    #[serde(alias = "imageUrl")]
    pub image_url: String,

    /// Unit price (frozen at time of adding).
    pub price: f64,

    /// Units in cart.
    pub quantity: u32,
}

impl LineItem {
    /// Creates a line item from a descriptor with `quantity = 1`.
    pub fn from_new(item: NewLineItem) -> Self {
        LineItem {
            id: item.id,
            title: item.title,
            image_url: item.image_url,
            price: item.price,
            quantity: 1,
        }
    }

    /// Unit price × quantity.
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

// =============================================================================
// Cart Totals
// =============================================================================

/// Cart totals summary for UI badges and the cart footer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartTotals {
    /// Distinct line items.
    pub item_count: usize,

    /// Sum of all quantities.
    pub total_quantity: u64,

    /// Sum of `price × quantity` over all lines.
    pub subtotal: f64,
}
