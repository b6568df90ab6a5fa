//! # Domain State
//!
//! The aggregate the engine guards with a single mutex: catalog, conversion
//! rules, ledger, pending edits, stock, both history logs and settings.
//!
//! ## Commit Flow (local half)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lock                                                                   │
//! │    commit_prices_locally()     drain pending → apply to ledger          │
//! │    commit_inventory_locally()  drain deltas → add stock → report        │
//! │    commit_waste_locally()      drain waste  → deduct stock → report     │
//! │  unlock                                                                 │
//! │    engine persists the returned changes one by one                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is synchronous; the caller decides what to persist.

use crate::catalog::{Catalog, CatalogChange};
use crate::conversion::{ConversionTable, CAJA};
use crate::error::ValidationError;
use crate::history::{HistoryLog, DEFAULT_HISTORY_CAPACITY};
use crate::inventory::InventoryStore;
use crate::key::{ItemKey, PriceKey, StockKey};
use crate::ledger::Ledger;
use crate::pending::{ChangeTarget, PendingBuffer, PlannedChange};
use crate::settings::BusinessSettings;
use crate::types::{CostEntry, InventoryRecord, Locality, Movement, MovementReport};
use crate::validation::validate_amount;

/// Result of committing the price and cost buffers locally.
#[derive(Debug, Default)]
pub struct PriceCommit {
    /// Changes written to the ledger, in staging order (prices first).
    pub applied: Vec<PlannedChange>,
    /// Drained changes whose amount is not a finite, non-negative number.
    pub rejected: Vec<(PlannedChange, ValidationError)>,
}

/// Result of committing a stock buffer locally.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementCommit {
    pub report: MovementReport,
    /// Final quantity of every record the commit touched.
    pub touched: Vec<InventoryRecord>,
}

/// In-memory cache of one organization.
#[derive(Debug, Clone)]
pub struct DomainState {
    pub catalog: Catalog,
    pub conversions: ConversionTable,
    pub ledger: Ledger,
    pub pending: PendingBuffer,
    pub inventory: InventoryStore,
    pub inventory_history: HistoryLog,
    pub waste_history: HistoryLog,
    pub settings: BusinessSettings,
}

impl Default for DomainState {
    fn default() -> Self {
        DomainState::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl DomainState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_capacity(capacity: usize) -> Self {
        DomainState {
            catalog: Catalog::new(),
            conversions: ConversionTable::new(),
            ledger: Ledger::new(),
            pending: PendingBuffer::new(),
            inventory: InventoryStore::new(),
            inventory_history: HistoryLog::with_capacity(capacity),
            waste_history: HistoryLog::with_capacity(capacity),
            settings: BusinessSettings::default(),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get_price(&self, item: &ItemKey, locality: Locality) -> f64 {
        self.ledger.get_price(item, locality)
    }

    pub fn get_cost_price(&self, item: &ItemKey) -> f64 {
        self.ledger.get_cost_price(item, &self.conversions)
    }

    pub fn get_best_unit_cost(&self, product: &str, subtype: &str) -> f64 {
        self.ledger
            .get_best_unit_cost(product, subtype, &self.conversions)
    }

    pub fn get_inventory_asset_value(&self) -> f64 {
        self.ledger
            .get_inventory_asset_value(&self.inventory, &self.conversions)
    }

    pub fn units_per_emission(&self, emission: &str, subtype: &str) -> u32 {
        self.conversions.units_per_emission(emission, subtype)
    }

    /// Price shown to the operator: pending override, else committed.
    pub fn effective_price(&self, key: &PriceKey) -> f64 {
        self.pending
            .pending_price(key)
            .unwrap_or_else(|| self.get_price(&key.item, key.locality))
    }

    /// Cost shown to the operator: pending override, else committed.
    pub fn effective_cost(&self, item: &ItemKey) -> f64 {
        self.pending
            .pending_cost(item)
            .unwrap_or_else(|| self.get_cost_price(item))
    }

    pub fn stock_of(&self, product: &str, subtype: &str) -> i64 {
        self.inventory.quantity(&StockKey::new(product, subtype))
    }

    pub fn check_stock(&self, item: &ItemKey, quantity: i64) -> bool {
        self.inventory.check_stock(item, quantity, &self.conversions)
    }

    /// Sums the subtype across every known product.
    pub fn check_aggregate_stock(&self, emission: &str, subtype: &str, quantity: i64) -> bool {
        self.inventory.check_aggregate_stock(
            self.catalog.names(),
            emission,
            subtype,
            quantity,
            &self.conversions,
        )
    }

    // =========================================================================
    // Staging
    // =========================================================================

    pub fn stage_price(&mut self, key: PriceKey, value: f64) -> bool {
        self.pending.stage_price(key, value, &self.ledger)
    }

    pub fn stage_cost(&mut self, item: ItemKey, value: f64) -> bool {
        self.pending
            .stage_cost(item, value, &self.ledger, &self.conversions)
    }

    /// Derives every emission's cost from the case cost and stages them.
    ///
    /// The case cost is the pending value when one is staged. Returns the
    /// entries that ended up pending.
    pub fn rebase_costs_from_case(&mut self, product: &str, subtype: &str) -> Vec<CostEntry> {
        let case = ItemKey::new(product, CAJA, subtype);
        let case_cost = self.effective_cost(&case);
        if case_cost <= 0.0 {
            return Vec::new();
        }

        let emissions = self.conversions.emissions_for(subtype);
        let derived =
            Ledger::rebase_from_case(case_cost, product, subtype, &emissions, &self.conversions);

        derived
            .into_iter()
            .filter(|entry| self.stage_cost(entry.key.clone(), entry.amount))
            .collect()
    }

    // =========================================================================
    // Local Commits
    // =========================================================================

    /// Drains pending prices and costs into the ledger.
    ///
    /// Staging keeps whatever the operator typed; a negative or non-finite
    /// amount is dropped here and never reaches the ledger.
    pub fn commit_prices_locally(&mut self) -> PriceCommit {
        let planned = self
            .pending
            .take_price_commit(&self.ledger, &self.conversions);

        let mut commit = PriceCommit::default();
        for change in planned {
            let field = match &change.target {
                ChangeTarget::Price(_) => "price",
                ChangeTarget::Cost(_) => "cost",
            };
            if let Err(e) = validate_amount(field, change.new_value) {
                commit.rejected.push((change, e));
                continue;
            }

            match &change.target {
                ChangeTarget::Price(key) => self.ledger.set_price(key.clone(), change.new_value),
                ChangeTarget::Cost(key) => self.ledger.set_cost(key.clone(), change.new_value),
            }
            commit.applied.push(change);
        }
        commit
    }

    /// Drains pending inventory deltas into stock and the inventory history.
    pub fn commit_inventory_locally(&mut self) -> Option<MovementCommit> {
        let movements = self.pending.take_inventory_movements(&self.conversions);
        if movements.is_empty() {
            return None;
        }

        let mut touched = Vec::new();
        for movement in &movements {
            let key = StockKey::new(movement.product.clone(), movement.subtype.clone());
            let quantity = self.inventory.add_base_units(key, movement.total_base_units);
            record_touch(&mut touched, movement, quantity);
        }

        let report = MovementReport::new(movements);
        self.inventory_history.prepend(report.clone());
        Some(MovementCommit { report, touched })
    }

    /// Drains pending waste into stock deductions and the waste history.
    ///
    /// Waste recorded against a product with no stock record still lands in
    /// the report; the stock is left untouched.
    pub fn commit_waste_locally(&mut self) -> Option<MovementCommit> {
        let movements = self.pending.take_waste_movements(&self.conversions);
        if movements.is_empty() {
            return None;
        }

        let mut touched = Vec::new();
        for movement in &movements {
            let item = ItemKey::new(
                movement.product.clone(),
                movement.emission.clone(),
                movement.subtype.clone(),
            );
            if let Some(quantity) = self.inventory.deduct_stock(
                &item,
                movement.quantity_of_emission,
                &self.conversions,
            ) {
                record_touch(&mut touched, movement, quantity);
            }
        }

        let report = MovementReport::new(movements);
        self.waste_history.prepend(report.clone());
        Some(MovementCommit { report, touched })
    }

    // =========================================================================
    // Catalog Maintenance
    // =========================================================================

    /// Re-keys every entry of a renamed product.
    pub fn rename_product(&mut self, old: &str, new: &str) {
        self.ledger.rename_product(old, new);
        self.inventory.rename_product(old, new);
        self.pending.rename_product(old, new);
    }

    /// Follows up on a catalog upsert.
    pub fn apply_catalog_change(&mut self, change: &CatalogChange) {
        if let CatalogChange::Renamed { old, new } = change {
            self.rename_product(old, new);
        }
    }
}

fn record_touch(touched: &mut Vec<InventoryRecord>, movement: &Movement, quantity: i64) {
    match touched
        .iter_mut()
        .find(|r| r.product == movement.product && r.subtype == movement.subtype)
    {
        Some(record) => record.quantity = quantity,
        None => touched.push(InventoryRecord {
            product: movement.product.clone(),
            subtype: movement.subtype.clone(),
            quantity,
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::{BOTELLA, MEDIA_CAJA, SIX_PACK, UNIDAD};
    use crate::types::Product;

    fn state_with_polar() -> DomainState {
        let mut state = DomainState::new();
        state.catalog.upsert(Product::new("p-1", "Polar"));
        state
    }

    #[test]
    fn test_commit_prices_applies_and_clears() {
        let mut state = state_with_polar();
        let key = PriceKey::new(ItemKey::new("Polar", UNIDAD, BOTELLA), Locality::Standard);
        state.stage_price(key.clone(), 5.0);

        let commit = state.commit_prices_locally();
        assert_eq!(commit.applied.len(), 1);
        assert!(commit.rejected.is_empty());
        assert_eq!(state.get_price(&key.item, Locality::Standard), 5.0);
        assert!(!state.pending.has_pending_changes());
    }

    #[test]
    fn test_commit_prices_drops_invalid_amounts() {
        let mut state = state_with_polar();
        let item = ItemKey::new("Polar", UNIDAD, BOTELLA);
        let key = PriceKey::new(item.clone(), Locality::Standard);
        state.ledger.set_price(key.clone(), 2.0);
        state.stage_price(key.clone(), -3.0);
        state.stage_cost(item.clone(), f64::INFINITY);
        state.stage_price(PriceKey::new(item.clone(), Locality::Local), 2.5);

        let commit = state.commit_prices_locally();
        assert_eq!(commit.applied.len(), 1);
        assert_eq!(commit.rejected.len(), 2);
        assert!(matches!(commit.rejected[0].1, ValidationError::Negative { .. }));
        assert!(matches!(commit.rejected[1].1, ValidationError::InvalidFormat { .. }));

        assert_eq!(state.get_price(&item, Locality::Standard), 2.0);
        assert_eq!(state.get_cost_price(&item), 0.0);
        assert_eq!(state.get_price(&item, Locality::Local), 2.5);
        assert!(!state.pending.has_pending_changes());
    }

    #[test]
    fn test_rebase_stages_derived_costs() {
        let mut state = state_with_polar();
        state.stage_cost(ItemKey::new("Polar", CAJA, "Lata"), 48.0);

        let staged = state.rebase_costs_from_case("Polar", "Lata");
        let emissions: Vec<&str> = staged.iter().map(|e| e.key.emission.as_str()).collect();
        assert!(emissions.contains(&UNIDAD));
        assert!(emissions.contains(&MEDIA_CAJA));
        assert!(emissions.contains(&SIX_PACK));
        assert_eq!(
            state.pending.pending_cost(&ItemKey::new("Polar", UNIDAD, "Lata")),
            Some(2.0)
        );
    }

    #[test]
    fn test_rebase_without_case_cost_does_nothing() {
        let mut state = state_with_polar();
        assert!(state.rebase_costs_from_case("Polar", BOTELLA).is_empty());
        assert!(!state.pending.has_pending_changes());
    }

    #[test]
    fn test_rebase_suppresses_values_already_committed() {
        let mut state = state_with_polar();
        state.ledger.set_cost(ItemKey::new("Polar", CAJA, BOTELLA), 36.0);

        // Committed derivations already equal the rebased values
        assert!(state.rebase_costs_from_case("Polar", BOTELLA).is_empty());
    }

    #[test]
    fn test_inventory_commit_reports_magnitudes() {
        let mut state = state_with_polar();
        state.catalog.upsert(Product::new("p-2", "Solera"));
        state
            .pending
            .stage_inventory_delta(ItemKey::new("Polar", CAJA, BOTELLA), 1);
        state
            .pending
            .stage_inventory_delta(ItemKey::new("Solera", UNIDAD, BOTELLA), 5);

        let commit = state.commit_inventory_locally().unwrap();
        assert_eq!(commit.report.total_base_units, 41);
        assert_eq!(commit.touched.len(), 2);
        assert_eq!(state.stock_of("Polar", BOTELLA), 36);
        assert_eq!(state.inventory_history.latest(), Some(&commit.report));
        assert!(state.commit_inventory_locally().is_none());
    }

    #[test]
    fn test_waste_commit_deducts_and_clamps() {
        let mut state = state_with_polar();
        state.inventory.set_base_stock(StockKey::new("Polar", BOTELLA), 10);
        state
            .pending
            .stage_waste_delta(ItemKey::new("Polar", UNIDAD, BOTELLA), 15);
        state
            .pending
            .stage_waste_delta(ItemKey::new("Zulia", UNIDAD, BOTELLA), 2);

        let commit = state.commit_waste_locally().unwrap();
        assert_eq!(state.stock_of("Polar", BOTELLA), 0);
        assert_eq!(commit.touched.len(), 1);
        assert_eq!(commit.report.movements.len(), 2);
        assert_eq!(state.waste_history.len(), 1);
        assert!(state.inventory_history.is_empty());
    }

    #[test]
    fn test_rename_moves_everything() {
        let mut state = state_with_polar();
        let item = ItemKey::new("Polar", UNIDAD, BOTELLA);
        state.ledger.set_cost(item.clone(), 1.0);
        state.inventory.set_base_stock(item.stock_key(), 12);
        state.stage_price(PriceKey::new(item, Locality::Local), 3.0);

        let change = state.catalog.upsert(Product::new("p-1", "Polar Pilsen"));
        state.apply_catalog_change(&change);

        let renamed = ItemKey::new("Polar Pilsen", UNIDAD, BOTELLA);
        assert_eq!(state.get_cost_price(&renamed), 1.0);
        assert_eq!(state.stock_of("Polar Pilsen", BOTELLA), 12);
        assert_eq!(
            state.effective_price(&PriceKey::new(renamed, Locality::Local)),
            3.0
        );
    }

    #[test]
    fn test_aggregate_stock_uses_catalog() {
        let mut state = state_with_polar();
        state.catalog.upsert(Product::new("p-2", "Solera"));
        state.inventory.set_base_stock(StockKey::new("Polar", "Lata"), 12);
        state.inventory.set_base_stock(StockKey::new("Solera", "Lata"), 12);

        assert!(state.check_aggregate_stock(CAJA, "Lata", 1));
        assert!(!state.check_aggregate_stock(CAJA, "Lata", 2));
    }
}
