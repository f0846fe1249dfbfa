//! # Cart
//!
//! The ordered collection of line items and its three mutations.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  UI Action                Operation               Cart Change           │
//! │  ─────────                ─────────               ───────────           │
//! │                                                                         │
//! │  "Add to cart" ─────────► add(item) ──┬─ new id ─► items.push(qty 1)   │
//! │                                       └─ known ──► increment(id)        │
//! │                                                                         │
//! │  "+" button ────────────► increment(id) ─────────► items[i].qty += 1   │
//! │                                                                         │
//! │  "-" button ────────────► decrement(id) ──┬─ qty 1 ─► items.remove(i)  │
//! │                                           └─ qty>1 ─► items[i].qty -= 1│
//! │                                                                         │
//! │  Unknown id on +/- ─────► Err(ItemNotFound), cart untouched             │
//! │  NaN / inf price ───────► Err(InvalidPrice), cart untouched             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::types::{CartTotals, LineItem, NewLineItem};
use crate::validation::{self, SnapshotIssue};

/// Outcome of [`Cart::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartChange {
    /// A new line was appended with quantity 1.
    Added,
    /// The id was already present; its quantity was bumped.
    Incremented { quantity: u32 },
}

/// The shopping cart.
///
/// ## Invariants
/// - Items are unique by `id` (adding the same product increases quantity)
/// - Every quantity is >= 1 (decrementing from 1 removes the item)
/// - Insertion order is the only ordering
///
/// Serializes as a bare JSON array of line items, which is the persisted
/// snapshot format. Decoding goes through [`Cart::from_snapshot`] so the
/// invariants hold on hydrated data too.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Cart { items: Vec::new() }
    }

    /// Builds a cart from items that already satisfy the invariants.
    pub(crate) fn from_normalized(items: Vec<LineItem>) -> Self {
        Cart { items }
    }

    /// Decodes a persisted snapshot, normalizing anything that would break
    /// the invariants. Returned issues describe what was repaired.
    pub fn from_snapshot(json: &str) -> CoreResult<(Self, Vec<SnapshotIssue>)> {
        validation::decode_snapshot(json)
    }

    /// Encodes the cart as its persisted snapshot (JSON array).
    pub fn to_snapshot(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(&self.items)?)
    }

    /// Adds a product, or bumps its quantity if it is already in the cart.
    ///
    /// A NaN or infinite price is rejected with [`CoreError::InvalidPrice`]
    /// since JSON cannot carry it and the snapshot would not decode.
    pub fn add(&mut self, item: NewLineItem) -> CoreResult<CartChange> {
        if !item.price.is_finite() {
            return Err(CoreError::InvalidPrice(item.id));
        }

        match self.increment(&item.id) {
            Ok(quantity) => Ok(CartChange::Incremented { quantity }),
            Err(_) => {
                self.items.push(LineItem::from_new(item));
                Ok(CartChange::Added)
            }
        }
    }

    /// Increases the item's quantity by one and returns the new quantity.
    ///
    /// Quantity saturates at `u32::MAX`.
    pub fn increment(&mut self, id: &str) -> CoreResult<u32> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| CoreError::ItemNotFound(id.to_string()))?;

        item.quantity = item.quantity.saturating_add(1);
        Ok(item.quantity)
    }

    /// Decreases the item's quantity by one.
    ///
    /// ## Returns
    /// - `Ok(Some(qty))` - item still in cart with `qty`
    /// - `Ok(None)` - item was at quantity 1 and has been removed
    /// - `Err(ItemNotFound)` - no such item, cart untouched
    pub fn decrement(&mut self, id: &str) -> CoreResult<Option<u32>> {
        let index = self
            .position(id)
            .ok_or_else(|| CoreError::ItemNotFound(id.to_string()))?;

        let item = &mut self.items[index];
        if item.quantity <= 1 {
            self.items.remove(index);
            return Ok(None);
        }

        item.quantity -= 1;
        Ok(Some(item.quantity))
    }

    /// Clears all items from the cart.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Items in insertion order.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Consumes the cart, returning its items.
    pub fn into_items(self) -> Vec<LineItem> {
        self.items
    }

    /// Looks up an item by id.
    pub fn get(&self, id: &str) -> Option<&LineItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Returns true if an item with this id is in the cart.
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }

    /// Returns the number of distinct items in the cart.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Checks if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the total quantity of all items.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// Sum of line totals.
    pub fn subtotal(&self) -> f64 {
        self.items.iter().map(LineItem::line_total).sum()
    }

    /// Summary for badges and the cart footer.
    pub fn totals(&self) -> CartTotals {
        CartTotals {
            item_count: self.len(),
            total_quantity: self.total_quantity(),
            subtotal: self.subtotal(),
        }
    }
}
