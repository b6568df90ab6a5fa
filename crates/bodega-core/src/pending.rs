//! # Pending Change Buffer
//!
//! Speculative edits that have not been committed yet.
//!
//! ## Buffers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Buffer      Key         Value               Staging rule               │
//! │  ─────────   ─────────   ─────────────────   ────────────────────────   │
//! │  prices      PriceKey    absolute override   == committed → dropped     │
//! │  costs       ItemKey     absolute override   == committed → dropped     │
//! │  inventory   ItemKey     signed delta (+=)   == 0 → dropped             │
//! │  waste       ItemKey     delta (+=), >= 0    == 0 → dropped             │
//! │                                                                         │
//! │  NaN never gets stored.                                                 │
//! │  Iteration follows insertion order; re-staging keeps the position.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Because no-op entries are never kept, "has pending changes" is a plain
//! emptiness check.

use std::collections::HashMap;
use std::hash::Hash;

use crate::conversion::ConversionTable;
use crate::inventory::to_base_units;
use crate::key::{ItemKey, PriceKey};
use crate::ledger::Ledger;
use crate::types::{ChangeKind, Movement, PriceChange};

// =============================================================================
// Insertion-ordered map
// =============================================================================

#[derive(Debug, Clone)]
struct Staged<V> {
    seq: u64,
    value: V,
}

/// A map that remembers the order in which keys were first staged.
#[derive(Debug, Clone)]
pub struct PendingMap<K, V> {
    entries: HashMap<K, Staged<V>>,
    next_seq: u64,
}

impl<K, V> Default for PendingMap<K, V> {
    fn default() -> Self {
        PendingMap {
            entries: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<K, V> PendingMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Copy,
{
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|staged| staged.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts or overwrites; an existing key keeps its position.
    pub fn put(&mut self, key: K, value: V) {
        if let Some(staged) = self.entries.get_mut(&key) {
            staged.value = value;
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key, Staged { seq, value });
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|staged| staged.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> Vec<(K, V)> {
        let mut staged: Vec<(&K, &Staged<V>)> = self.entries.iter().collect();
        staged.sort_by_key(|(_, s)| s.seq);
        staged
            .into_iter()
            .map(|(key, s)| (key.clone(), s.value))
            .collect()
    }

    /// Entries in insertion order, leaving the map empty.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        let entries = self.entries();
        self.clear();
        entries
    }

    /// Rewrites keys in place, keeping positions.
    fn rekey(&mut self, mut f: impl FnMut(&mut K)) {
        self.entries = std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(mut key, staged)| {
                f(&mut key);
                (key, staged)
            })
            .collect();
    }
}

// =============================================================================
// Planned commits
// =============================================================================

/// What a planned price/cost change writes to.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeTarget {
    Price(PriceKey),
    Cost(ItemKey),
}

/// One pending value that differs from the committed baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChange {
    pub target: ChangeTarget,
    pub old_value: f64,
    pub new_value: f64,
}

impl PlannedChange {
    pub fn item(&self) -> &ItemKey {
        match &self.target {
            ChangeTarget::Price(key) => &key.item,
            ChangeTarget::Cost(key) => key,
        }
    }

    /// The line shown in the change report.
    pub fn report_line(&self) -> PriceChange {
        let item = self.item();
        let kind = match &self.target {
            ChangeTarget::Price(key) => ChangeKind::from(key.locality),
            ChangeTarget::Cost(_) => ChangeKind::Costo,
        };
        PriceChange {
            beer: item.product.clone(),
            emission: item.emission.clone(),
            subtype: item.subtype.clone(),
            kind,
            old_value: self.old_value,
            new_value: self.new_value,
        }
    }
}

// =============================================================================
// Pending Buffer
// =============================================================================

/// All uncommitted edits.
#[derive(Debug, Clone, Default)]
pub struct PendingBuffer {
    prices: PendingMap<PriceKey, f64>,
    costs: PendingMap<ItemKey, f64>,
    inventory: PendingMap<ItemKey, i64>,
    waste: PendingMap<ItemKey, i64>,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Prices and costs
    // -------------------------------------------------------------------------

    /// Stages a price override. Returns true if an entry is now pending.
    pub fn stage_price(&mut self, key: PriceKey, value: f64, ledger: &Ledger) -> bool {
        let committed = ledger.get_price(&key.item, key.locality);
        if value.is_nan() || value == committed {
            self.prices.remove(&key);
            return false;
        }
        self.prices.put(key, value);
        true
    }

    /// Stages a cost override. Returns true if an entry is now pending.
    pub fn stage_cost(
        &mut self,
        key: ItemKey,
        value: f64,
        ledger: &Ledger,
        conversions: &ConversionTable,
    ) -> bool {
        let committed = ledger.get_cost_price(&key, conversions);
        if value.is_nan() || value == committed {
            self.costs.remove(&key);
            return false;
        }
        self.costs.put(key, value);
        true
    }

    pub fn pending_price(&self, key: &PriceKey) -> Option<f64> {
        self.prices.get(key)
    }

    pub fn pending_cost(&self, key: &ItemKey) -> Option<f64> {
        self.costs.get(key)
    }

    pub fn has_pending_price(&self, key: &PriceKey) -> bool {
        self.prices.contains(key)
    }

    pub fn has_pending_cost(&self, key: &ItemKey) -> bool {
        self.costs.contains(key)
    }

    pub fn prices(&self) -> &PendingMap<PriceKey, f64> {
        &self.prices
    }

    pub fn costs(&self) -> &PendingMap<ItemKey, f64> {
        &self.costs
    }

    pub fn discard_prices(&mut self) {
        self.prices.clear();
    }

    pub fn discard_costs(&mut self) {
        self.costs.clear();
    }

    /// Drains pending prices then costs, in staging order, keeping only
    /// values that still differ from the committed baseline.
    pub fn take_price_commit(
        &mut self,
        ledger: &Ledger,
        conversions: &ConversionTable,
    ) -> Vec<PlannedChange> {
        let prices = self.prices.drain().into_iter().map(|(key, new_value)| PlannedChange {
            old_value: ledger.get_price(&key.item, key.locality),
            new_value,
            target: ChangeTarget::Price(key),
        });

        let costs: Vec<PlannedChange> = self
            .costs
            .drain()
            .into_iter()
            .map(|(key, new_value)| PlannedChange {
                old_value: ledger.get_cost_price(&key, conversions),
                new_value,
                target: ChangeTarget::Cost(key),
            })
            .collect();

        prices
            .chain(costs)
            .filter(|change| change.old_value != change.new_value)
            .collect()
    }

    // -------------------------------------------------------------------------
    // Inventory and waste deltas
    // -------------------------------------------------------------------------

    /// Accumulates a signed inventory delta. Returns the pending total.
    pub fn stage_inventory_delta(&mut self, key: ItemKey, delta: i64) -> i64 {
        let total = self.inventory.get(&key).unwrap_or(0).saturating_add(delta);
        if total == 0 {
            self.inventory.remove(&key);
        } else {
            self.inventory.put(key, total);
        }
        total
    }

    /// Accumulates a waste delta, clamped at zero. Returns the pending total.
    pub fn stage_waste_delta(&mut self, key: ItemKey, delta: i64) -> i64 {
        let total = self.waste.get(&key).unwrap_or(0).saturating_add(delta).max(0);
        if total == 0 {
            self.waste.remove(&key);
        } else {
            self.waste.put(key, total);
        }
        total
    }

    pub fn pending_inventory(&self, key: &ItemKey) -> i64 {
        self.inventory.get(key).unwrap_or(0)
    }

    pub fn pending_waste(&self, key: &ItemKey) -> i64 {
        self.waste.get(key).unwrap_or(0)
    }

    pub fn inventory(&self) -> &PendingMap<ItemKey, i64> {
        &self.inventory
    }

    pub fn waste(&self) -> &PendingMap<ItemKey, i64> {
        &self.waste
    }

    pub fn discard_inventory(&mut self) {
        self.inventory.clear();
    }

    pub fn discard_waste(&mut self) {
        self.waste.clear();
    }

    /// Drains inventory deltas into movements (base units computed now).
    pub fn take_inventory_movements(&mut self, conversions: &ConversionTable) -> Vec<Movement> {
        to_movements(self.inventory.drain(), conversions)
    }

    /// Drains waste deltas into movements (base units computed now).
    pub fn take_waste_movements(&mut self, conversions: &ConversionTable) -> Vec<Movement> {
        to_movements(self.waste.drain(), conversions)
    }

    // -------------------------------------------------------------------------
    // Whole buffer
    // -------------------------------------------------------------------------

    pub fn has_pending_changes(&self) -> bool {
        !(self.prices.is_empty()
            && self.costs.is_empty()
            && self.inventory.is_empty()
            && self.waste.is_empty())
    }

    /// Moves every pending entry of `old` to `new`.
    pub fn rename_product(&mut self, old: &str, new: &str) {
        let rename = |product: &mut String| {
            if product == old {
                *product = new.to_string();
            }
        };
        self.prices.rekey(|key| rename(&mut key.item.product));
        self.costs.rekey(|key| rename(&mut key.product));
        self.inventory.rekey(|key| rename(&mut key.product));
        self.waste.rekey(|key| rename(&mut key.product));
    }
}

fn to_movements(entries: Vec<(ItemKey, i64)>, conversions: &ConversionTable) -> Vec<Movement> {
    entries
        .into_iter()
        .map(|(key, delta)| Movement {
            total_base_units: to_base_units(&key, delta, conversions),
            quantity_of_emission: delta,
            product: key.product,
            subtype: key.subtype,
            emission: key.emission,
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::{BOTELLA, CAJA, UNIDAD};
    use crate::types::Locality;

    fn price_key(product: &str, locality: Locality) -> PriceKey {
        PriceKey::new(ItemKey::new(product, UNIDAD, BOTELLA), locality)
    }

    #[test]
    fn test_staging_committed_price_is_suppressed() {
        let mut ledger = Ledger::new();
        let key = price_key("Polar", Locality::Standard);
        ledger.set_price(key.clone(), 5.0);
        let mut pending = PendingBuffer::new();

        assert!(pending.stage_price(key.clone(), 6.0, &ledger));
        assert!(pending.has_pending_price(&key));

        assert!(!pending.stage_price(key.clone(), 5.0, &ledger));
        assert!(!pending.has_pending_price(&key));
        assert!(!pending.has_pending_changes());
    }

    #[test]
    fn test_nan_is_never_stored() {
        let ledger = Ledger::new();
        let mut pending = PendingBuffer::new();
        let key = price_key("Polar", Locality::Local);

        assert!(!pending.stage_price(key.clone(), f64::NAN, &ledger));
        assert!(!pending.has_pending_price(&key));
    }

    #[test]
    fn test_explicit_cost_equal_to_derived_value_is_dropped() {
        let conversions = ConversionTable::new();
        let mut ledger = Ledger::new();
        ledger.set_cost(ItemKey::new("Polar", CAJA, BOTELLA), 36.0);
        let mut pending = PendingBuffer::new();

        // Unidad derives to 1.0 from the case cost, so pinning 1.0 stages nothing
        let unit = ItemKey::new("Polar", UNIDAD, BOTELLA);
        assert!(!pending.stage_cost(unit.clone(), 1.0, &ledger, &conversions));
        assert!(pending.stage_cost(unit.clone(), 1.2, &ledger, &conversions));
        assert_eq!(pending.pending_cost(&unit), Some(1.2));
    }

    #[test]
    fn test_price_values_are_not_clamped() {
        let ledger = Ledger::new();
        let mut pending = PendingBuffer::new();
        let key = price_key("Polar", Locality::Standard);

        assert!(pending.stage_price(key.clone(), -1.0, &ledger));
        assert_eq!(pending.pending_price(&key), Some(-1.0));
    }

    #[test]
    fn test_inventory_delta_accumulates_and_cancels() {
        let mut pending = PendingBuffer::new();
        let key = ItemKey::new("Polar", CAJA, BOTELLA);

        assert_eq!(pending.stage_inventory_delta(key.clone(), 3), 3);
        assert_eq!(pending.stage_inventory_delta(key.clone(), -5), -2);
        assert_eq!(pending.stage_inventory_delta(key.clone(), 2), 0);
        assert!(!pending.has_pending_changes());
    }

    #[test]
    fn test_waste_delta_clamps_at_zero() {
        let mut pending = PendingBuffer::new();
        let key = ItemKey::new("Polar", UNIDAD, BOTELLA);

        assert_eq!(pending.stage_waste_delta(key.clone(), 2), 2);
        assert_eq!(pending.stage_waste_delta(key.clone(), -5), 0);
        assert_eq!(pending.pending_waste(&key), 0);
        assert!(pending.waste().is_empty());
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let ledger = Ledger::new();
        let mut pending = PendingBuffer::new();
        let a = price_key("Zulia", Locality::Standard);
        let b = price_key("Angostura", Locality::Standard);
        let c = price_key("Polar", Locality::Local);

        pending.stage_price(a.clone(), 1.0, &ledger);
        pending.stage_price(b.clone(), 2.0, &ledger);
        pending.stage_price(c.clone(), 3.0, &ledger);
        pending.stage_price(a.clone(), 4.0, &ledger);

        let keys: Vec<PriceKey> = pending.prices().entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![a, b, c]);
    }

    #[test]
    fn test_take_price_commit_reports_and_clears() {
        let conversions = ConversionTable::new();
        let mut ledger = Ledger::new();
        let standard = price_key("Polar", Locality::Standard);
        ledger.set_price(standard.clone(), 5.0);

        let mut pending = PendingBuffer::new();
        pending.stage_price(standard.clone(), 6.0, &ledger);
        pending.stage_price(price_key("Polar", Locality::Local), 7.0, &ledger);
        pending.stage_cost(ItemKey::new("Polar", CAJA, BOTELLA), 40.0, &ledger, &conversions);

        let planned = pending.take_price_commit(&ledger, &conversions);
        assert_eq!(planned.len(), 3);
        assert!(!pending.has_pending_changes());

        let lines: Vec<PriceChange> = planned.iter().map(PlannedChange::report_line).collect();
        assert_eq!(lines[0].kind, ChangeKind::ParaLlevar);
        assert_eq!(lines[0].old_value, 5.0);
        assert_eq!(lines[1].kind, ChangeKind::Local);
        // local falls back to the standard price for its baseline
        assert_eq!(lines[1].old_value, 5.0);
        assert_eq!(lines[2].kind, ChangeKind::Costo);
        assert_eq!(lines[2].beer, "Polar");
    }

    #[test]
    fn test_take_price_commit_drops_entries_that_caught_up() {
        let conversions = ConversionTable::new();
        let mut ledger = Ledger::new();
        let key = price_key("Polar", Locality::Standard);
        let mut pending = PendingBuffer::new();
        pending.stage_price(key.clone(), 6.0, &ledger);

        // A remote update landed the same value before the commit
        ledger.set_price(key, 6.0);

        assert!(pending.take_price_commit(&ledger, &conversions).is_empty());
        assert!(!pending.has_pending_changes());
    }

    #[test]
    fn test_inventory_movements_in_base_units() {
        let conversions = ConversionTable::new();
        let mut pending = PendingBuffer::new();
        pending.stage_inventory_delta(ItemKey::new("Polar", CAJA, BOTELLA), 2);
        pending.stage_inventory_delta(ItemKey::new("Solera", UNIDAD, "Lata"), -3);

        let movements = pending.take_inventory_movements(&conversions);
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[0].total_base_units, 72);
        assert_eq!(movements[1].total_base_units, -3);
        assert!(pending.inventory().is_empty());
    }

    #[test]
    fn test_rename_product_keeps_pending_edits() {
        let mut pending = PendingBuffer::new();
        pending.stage_waste_delta(ItemKey::new("Polar", UNIDAD, BOTELLA), 4);
        pending.rename_product("Polar", "Polar Pilsen");

        assert_eq!(pending.pending_waste(&ItemKey::new("Polar Pilsen", UNIDAD, BOTELLA)), 4);
        assert_eq!(pending.pending_waste(&ItemKey::new("Polar", UNIDAD, BOTELLA)), 0);
    }
}
