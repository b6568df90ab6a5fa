//! # Cache Snapshot
//!
//! Serializable picture of the committed state, written to disk between
//! sessions. Maps use the delimiter-joined string keys:
//!
//! ```json
//! {
//!   "version": 1,
//!   "prices":    { "Polar_Unidad_Botella": 1.5, "Polar_Unidad_Botella_local": 2.0 },
//!   "costs":     { "Polar_Caja_Botella": 36.0 },
//!   "inventory": { "Polar_Botella": 72 }
//! }
//! ```
//!
//! Pending edits are never part of a snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::conversion::{ConversionTable, EmissionRecord};
use crate::error::CoreResult;
use crate::key::{
    decode_item, decode_price, decode_stock, encode_item, encode_price, encode_stock, PriceKey,
    StockKey,
};
use crate::settings::BusinessSettings;
use crate::state::DomainState;
use crate::types::{MovementReport, Product};

/// Current snapshot layout.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub version: u32,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub emissions: Vec<EmissionRecord>,
    #[serde(default)]
    pub prices: BTreeMap<String, f64>,
    #[serde(default)]
    pub costs: BTreeMap<String, f64>,
    #[serde(default)]
    pub inventory: BTreeMap<String, i64>,
    #[serde(default)]
    pub inventory_history: Vec<MovementReport>,
    #[serde(default)]
    pub waste_history: Vec<MovementReport>,
    #[serde(default)]
    pub settings: BusinessSettings,
}

impl CacheSnapshot {
    /// Captures the committed state.
    ///
    /// Entries whose key cannot be encoded are left out; the second value is
    /// how many were skipped.
    pub fn from_state(state: &DomainState) -> (Self, usize) {
        let mut skipped = 0;

        let mut prices = BTreeMap::new();
        for entry in state.ledger.prices() {
            let key = PriceKey::new(entry.key, entry.locality);
            match encode_price(&key) {
                Ok(raw) => {
                    prices.insert(raw, entry.amount);
                }
                Err(_) => skipped += 1,
            }
        }

        let mut costs = BTreeMap::new();
        for entry in state.ledger.costs() {
            match encode_item(&entry.key) {
                Ok(raw) => {
                    costs.insert(raw, entry.amount);
                }
                Err(_) => skipped += 1,
            }
        }

        let mut inventory = BTreeMap::new();
        for record in state.inventory.records() {
            let key = StockKey::new(record.product, record.subtype);
            match encode_stock(&key) {
                Ok(raw) => {
                    inventory.insert(raw, record.quantity);
                }
                Err(_) => skipped += 1,
            }
        }

        let snapshot = CacheSnapshot {
            version: SNAPSHOT_VERSION,
            products: state.catalog.all().into_iter().cloned().collect(),
            emissions: state.conversions.records().to_vec(),
            prices,
            costs,
            inventory,
            inventory_history: state.inventory_history.iter().cloned().collect(),
            waste_history: state.waste_history.iter().cloned().collect(),
            settings: state.settings.clone(),
        };
        (snapshot, skipped)
    }

    /// Rebuilds committed state. Stock keys resolve against the snapshot's
    /// own product list.
    pub fn into_state(self, history_capacity: usize) -> CoreResult<DomainState> {
        let mut state = DomainState::with_history_capacity(history_capacity);
        state.catalog = Catalog::from_products(self.products);
        state.conversions = ConversionTable::from_records(self.emissions);
        state.settings = self.settings;

        for (raw, amount) in self.prices {
            state.ledger.set_price(decode_price(&raw)?, amount);
        }
        for (raw, amount) in self.costs {
            state.ledger.set_cost(decode_item(&raw)?, amount);
        }
        for (raw, quantity) in self.inventory {
            let key = decode_stock(&raw, state.catalog.names())?;
            state.inventory.set_base_stock(key, quantity);
        }

        state.inventory_history.replace(self.inventory_history);
        state.waste_history.replace(self.waste_history);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::{BOTELLA, CAJA, PACK, UNIDAD};
    use crate::key::ItemKey;
    use crate::types::Locality;

    fn sample_state() -> DomainState {
        let mut state = DomainState::new();
        state.catalog.upsert(Product::new("p-1", "Zulia"));
        state.catalog.upsert(Product::new("p-2", "Zulia_Light"));
        state
            .conversions
            .add(EmissionRecord::new(PACK, Some(BOTELLA), 12))
            .unwrap();

        let item = ItemKey::new("Zulia_Light", UNIDAD, BOTELLA);
        state
            .ledger
            .set_price(PriceKey::new(item.clone(), Locality::Local), 2.0);
        state
            .ledger
            .set_price(PriceKey::new(item.clone(), Locality::Standard), 1.5);
        state.ledger.set_cost(item.with_emission(CAJA), 36.0);
        state
            .inventory
            .set_base_stock(StockKey::new("Zulia_Light", BOTELLA), 72);
        state
    }

    #[test]
    fn test_snapshot_uses_string_keys() {
        let (snapshot, skipped) = CacheSnapshot::from_state(&sample_state());
        assert_eq!(skipped, 0);
        assert_eq!(snapshot.prices.get("Zulia_Light_Unidad_Botella_local"), Some(&2.0));
        assert_eq!(snapshot.costs.get("Zulia_Light_Caja_Botella"), Some(&36.0));
        assert_eq!(snapshot.inventory.get("Zulia_Light_Botella"), Some(&72));
    }

    #[test]
    fn test_restore_resolves_products_with_delimiters() {
        let (snapshot, _) = CacheSnapshot::from_state(&sample_state());
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: CacheSnapshot = serde_json::from_str(&json).unwrap();
        let state = restored.into_state(50).unwrap();

        assert_eq!(state.stock_of("Zulia_Light", BOTELLA), 72);
        assert_eq!(state.stock_of("Zulia", "Light_Botella"), 0);
        assert_eq!(state.units_per_emission(PACK, BOTELLA), 12);
        assert_eq!(
            state.get_price(&ItemKey::new("Zulia_Light", UNIDAD, BOTELLA), Locality::Local),
            2.0
        );
    }

    #[test]
    fn test_unencodable_entries_are_skipped() {
        let mut state = DomainState::new();
        state
            .ledger
            .set_cost(ItemKey::new("Polar", "Caja_24", BOTELLA), 10.0);
        let (snapshot, skipped) = CacheSnapshot::from_state(&state);
        assert_eq!(skipped, 1);
        assert!(snapshot.costs.is_empty());
    }

    #[test]
    fn test_malformed_key_fails_restore() {
        let mut snapshot = CacheSnapshot::from_state(&DomainState::new()).0;
        snapshot.costs.insert("Polar".to_string(), 1.0);
        assert!(snapshot.into_state(50).is_err());
    }
}
