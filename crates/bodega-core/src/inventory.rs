//! # Inventory Store
//!
//! Committed stock per (product, subtype), always in base units.
//!
//! ## Stock Update Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_stock(Polar, Caja, Botella, 2)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  base = 2 × units(Caja, Botella) = 72                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  quantity = max(0, quantity + 72)                                       │
//! │                                                                         │
//! │  deduct_stock(Polar, Unidad, Botella, 15) with quantity 10              │
//! │       → max(0, 10 − 15) = 0   (never −5)                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariant
//! Every stored quantity is >= 0. Absent records read as 0.

use std::collections::HashMap;

use crate::conversion::ConversionTable;
use crate::key::{ItemKey, StockKey};
use crate::types::InventoryRecord;

/// Committed stock levels.
#[derive(Debug, Clone, Default)]
pub struct InventoryStore {
    quantities: HashMap<StockKey, i64>,
}

impl InventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current base-unit quantity (0 when absent).
    pub fn quantity(&self, key: &StockKey) -> i64 {
        self.quantities.get(key).copied().unwrap_or(0)
    }

    /// Adds an emission quantity (may be negative); returns the new level.
    pub fn add_stock(&mut self, item: &ItemKey, quantity: i64, conversions: &ConversionTable) -> i64 {
        let base = to_base_units(item, quantity, conversions);
        self.add_base_units(item.stock_key(), base)
    }

    /// Removes an emission quantity, clamping at zero.
    ///
    /// Returns `None` (and changes nothing) when no record exists.
    pub fn deduct_stock(
        &mut self,
        item: &ItemKey,
        quantity: i64,
        conversions: &ConversionTable,
    ) -> Option<i64> {
        let key = item.stock_key();
        if !self.quantities.contains_key(&key) {
            return None;
        }
        let base = to_base_units(item, quantity, conversions);
        Some(self.add_base_units(key, -base))
    }

    /// Applies a signed base-unit delta; returns the new level.
    pub fn add_base_units(&mut self, key: StockKey, delta: i64) -> i64 {
        let entry = self.quantities.entry(key).or_insert(0);
        *entry = entry.saturating_add(delta).max(0);
        *entry
    }

    /// Overwrites a level directly (manual corrections, backend rows).
    pub fn set_base_stock(&mut self, key: StockKey, quantity: i64) {
        self.quantities.insert(key, quantity.max(0));
    }

    pub fn remove(&mut self, key: &StockKey) -> Option<i64> {
        self.quantities.remove(key)
    }

    /// True when the record holds at least `quantity` emission-units.
    pub fn check_stock(&self, item: &ItemKey, quantity: i64, conversions: &ConversionTable) -> bool {
        self.quantity(&item.stock_key()) >= to_base_units(item, quantity, conversions)
    }

    /// True when all listed products together hold enough of the subtype.
    ///
    /// Used where a sale can be satisfied by any variant of a subtype.
    pub fn check_aggregate_stock<'a, I>(
        &self,
        products: I,
        emission: &str,
        subtype: &str,
        quantity: i64,
        conversions: &ConversionTable,
    ) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let required = quantity.saturating_mul(i64::from(conversions.units_per_emission(emission, subtype)));
        let available: i64 = products
            .into_iter()
            .map(|product| self.quantity(&StockKey::new(product, subtype)))
            .sum();
        available >= required
    }

    pub fn records(&self) -> impl Iterator<Item = InventoryRecord> + '_ {
        self.quantities.iter().map(|(key, quantity)| InventoryRecord {
            product: key.product.clone(),
            subtype: key.subtype.clone(),
            quantity: *quantity,
        })
    }

    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }

    /// Moves every record of `old` to `new`.
    pub fn rename_product(&mut self, old: &str, new: &str) {
        self.quantities = std::mem::take(&mut self.quantities)
            .into_iter()
            .map(|(mut key, quantity)| {
                if key.product == old {
                    key.product = new.to_string();
                }
                (key, quantity)
            })
            .collect();
    }
}

/// Converts an emission quantity into base units.
pub fn to_base_units(item: &ItemKey, quantity: i64, conversions: &ConversionTable) -> i64 {
    quantity.saturating_mul(i64::from(
        conversions.units_per_emission(&item.emission, &item.subtype),
    ))
}

// =============================================================================
// Unit Tests
// =============================================================================
