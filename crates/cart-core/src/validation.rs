//! # Snapshot Validation
//!
//! Decodes persisted cart snapshots and repairs anything that would break the
//! cart invariants.
//!
//! ## Why Normalize?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Hydration Pipeline                                 │
//! │                                                                         │
//! │  Stored JSON (written by any past release)                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  serde_json → Vec<Value>          not an array? → CoreError::Snapshot  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  each Value → LineItem               bad line? → dropped, reported     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  normalize (THIS MODULE)                                               │
//! │  ├── drop lines with an empty id                                       │
//! │  ├── drop lines with quantity 0                                        │
//! │  └── merge duplicate ids into the first occurrence                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Cart (invariants hold) + Vec<SnapshotIssue> for logging               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::cart::Cart;
use crate::error::CoreResult;
use crate::types::LineItem;

/// Something repaired while decoding a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotIssue {
    /// A line that does not decode as a line item was dropped.
    Malformed { position: usize, reason: String },
    /// A line without an id was dropped.
    MissingId { position: usize },
    /// A line with quantity 0 was dropped.
    ZeroQuantity { id: String },
    /// A repeated id was folded into its first occurrence.
    DuplicateId { id: String, merged_quantity: u32 },
}

impl fmt::Display for SnapshotIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotIssue::Malformed { position, reason } => {
                write!(f, "dropped undecodable line {}: {}", position, reason)
            }
            SnapshotIssue::MissingId { position } => {
                write!(f, "dropped line {} without an id", position)
            }
            SnapshotIssue::ZeroQuantity { id } => {
                write!(f, "dropped {} with quantity 0", id)
            }
            SnapshotIssue::DuplicateId {
                id,
                merged_quantity,
            } => write!(f, "merged duplicate {} (quantity now {})", id, merged_quantity),
        }
    }
}

/// Decodes a snapshot string into a normalized cart.
///
/// Only a snapshot that is not a JSON array fails outright. Lines are
/// decoded one at a time, so a single bad line (e.g. a `null` price) is
/// dropped and reported instead of discarding the whole cart.
pub fn decode_snapshot(json: &str) -> CoreResult<(Cart, Vec<SnapshotIssue>)> {
    let values: Vec<Value> = serde_json::from_str(json)?;

    let mut issues = Vec::new();
    let mut decoded = Vec::with_capacity(values.len());
    for (position, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<LineItem>(value) {
            Ok(item) => decoded.push((position, item)),
            Err(e) => issues.push(SnapshotIssue::Malformed {
                position,
                reason: e.to_string(),
            }),
        }
    }

    let (items, repairs) = normalize_positioned(decoded);
    issues.extend(repairs);
    Ok((Cart::from_normalized(items), issues))
}

/// Enforces the cart invariants on raw decoded items.
///
/// First-occurrence order is preserved.
pub fn normalize(raw: Vec<LineItem>) -> (Vec<LineItem>, Vec<SnapshotIssue>) {
    normalize_positioned(raw.into_iter().enumerate())
}

fn normalize_positioned(
    raw: impl IntoIterator<Item = (usize, LineItem)>,
) -> (Vec<LineItem>, Vec<SnapshotIssue>) {
    let mut items: Vec<LineItem> = Vec::new();
    let mut index_by_id: HashMap<String, usize> = HashMap::new();
    let mut issues = Vec::new();

    for (position, item) in raw {
        if item.id.is_empty() {
            issues.push(SnapshotIssue::MissingId { position });
            continue;
        }

        if item.quantity == 0 {
            issues.push(SnapshotIssue::ZeroQuantity { id: item.id });
            continue;
        }

        match index_by_id.get(&item.id).copied() {
            Some(index) => {
                let existing = &mut items[index];
                existing.quantity = existing.quantity.saturating_add(item.quantity);
                issues.push(SnapshotIssue::DuplicateId {
                    id: item.id,
                    merged_quantity: existing.quantity,
                });
            }
            None => {
                index_by_id.insert(item.id.clone(), items.len());
                items.push(item);
            }
        }
    }

    (items, issues)
}
