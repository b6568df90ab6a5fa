//! # Price/Cost Ledger
//!
//! Committed prices and costs, and the fallback chains that resolve values
//! nobody entered explicitly.
//!
//! ## Why Derive Costs?
//! Operators record what they paid for the case they bought. Every other
//! packaging format (unit, half case, six pack) gets its cost back-computed
//! from that single entry:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  get_cost_price(Polar, Media Caja, Botella)                             │
//! │                                                                         │
//! │  1. normalise      "Media Caja" / "Botella"                             │
//! │  2. direct cost?   (exact key, else case-insensitive scan)              │
//! │  3.   positive     → return it                                          │
//! │  4. Caja cost?     36.00 / units(Caja)=36 * units(Media Caja)=18        │
//! │                    → 18.00                                              │
//! │  5. first positive of [Media Caja, Six Pack, Unidad, Pack, Bulto]       │
//! │                    → cost / units(source) * units(target)               │
//! │  6. nothing        → 0.0                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `get_best_unit_cost` is a different question: the cost of ONE base unit,
//! used to value stock.

use std::collections::HashMap;

use crate::conversion::{
    ConversionTable, BULTO, CAJA, DEFAULT_EMISSION, DEFAULT_SUBTYPE, MEDIA_CAJA, PACK, SIX_PACK,
    UNIDAD,
};
use crate::inventory::InventoryStore;
use crate::key::{ItemKey, PriceKey};
use crate::types::{CostEntry, Locality, PriceEntry};

/// Sources tried, in order, when deriving a cost from another emission.
const DERIVATION_ORDER: [&str; 5] = [MEDIA_CAJA, SIX_PACK, UNIDAD, PACK, BULTO];

/// Sources tried, in order, when computing a per-base-unit cost.
const UNIT_COST_ORDER: [&str; 6] = [CAJA, MEDIA_CAJA, SIX_PACK, UNIDAD, PACK, BULTO];

/// Committed prices and costs.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    prices: HashMap<PriceKey, f64>,
    costs: HashMap<ItemKey, f64>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Prices
    // =========================================================================

    /// Committed price for the exact key, if any.
    pub fn price(&self, key: &PriceKey) -> Option<f64> {
        self.prices.get(key).copied()
    }

    /// Resolved price: a local price falls back to the standard price, and an
    /// absent price is 0.
    pub fn get_price(&self, item: &ItemKey, locality: Locality) -> f64 {
        let key = PriceKey::new(item.clone(), locality);
        if let Some(price) = self.price(&key) {
            return price;
        }
        if locality.is_local() {
            return self.price(&key.standard()).unwrap_or(0.0);
        }
        0.0
    }

    pub fn set_price(&mut self, key: PriceKey, amount: f64) {
        self.prices.insert(key, amount);
    }

    pub fn remove_price(&mut self, key: &PriceKey) -> Option<f64> {
        self.prices.remove(key)
    }

    pub fn prices(&self) -> impl Iterator<Item = PriceEntry> + '_ {
        self.prices.iter().map(|(key, amount)| PriceEntry {
            key: key.item.clone(),
            locality: key.locality,
            amount: *amount,
        })
    }

    // =========================================================================
    // Costs
    // =========================================================================

    /// Committed cost, tolerant of case and surrounding whitespace.
    pub fn cost(&self, key: &ItemKey) -> Option<f64> {
        self.costs.get(key).copied().or_else(|| {
            self.costs
                .iter()
                .find(|(candidate, _)| candidate.matches_loosely(key))
                .map(|(_, amount)| *amount)
        })
    }

    pub fn set_cost(&mut self, key: ItemKey, amount: f64) {
        self.costs.insert(key, amount);
    }

    pub fn remove_cost(&mut self, key: &ItemKey) -> Option<f64> {
        self.costs.remove(key)
    }

    pub fn costs(&self) -> impl Iterator<Item = CostEntry> + '_ {
        self.costs.iter().map(|(key, amount)| CostEntry {
            key: key.clone(),
            amount: *amount,
        })
    }

    /// Cost of one unit of the requested emission, derived when not recorded.
    pub fn get_cost_price(&self, item: &ItemKey, conversions: &ConversionTable) -> f64 {
        let target = normalize(item);
        let target_units = f64::from(conversions.units_per_emission(&target.emission, &target.subtype));

        if let Some(direct) = self.positive_cost(&target) {
            return direct;
        }

        let derive = |source: &str| -> Option<f64> {
            let cost = self.positive_cost(&target.with_emission(source))?;
            let source_units = f64::from(conversions.units_per_emission(source, &target.subtype));
            Some(cost / source_units * target_units)
        };

        if target.emission != CAJA {
            if let Some(cost) = derive(CAJA) {
                return cost;
            }
        }

        // Unidad is part of this list, so the "scale the unit cost" last
        // resort is covered here too.
        DERIVATION_ORDER
            .iter()
            .filter(|source| **source != target.emission && **source != CAJA)
            .find_map(|source| derive(*source))
            .unwrap_or(0.0)
    }

    /// Cost of a single base unit, for valuation.
    pub fn get_best_unit_cost(
        &self,
        product: &str,
        subtype: &str,
        conversions: &ConversionTable,
    ) -> f64 {
        let base = normalize(&ItemKey::new(product, DEFAULT_EMISSION, subtype));

        UNIT_COST_ORDER
            .iter()
            .find_map(|source| {
                let cost = self.positive_cost(&base.with_emission(*source))?;
                let units = f64::from(conversions.units_per_emission(source, &base.subtype));
                Some(cost / units)
            })
            .unwrap_or(0.0)
    }

    /// Σ quantity × best unit cost over every non-empty inventory record.
    pub fn get_inventory_asset_value(
        &self,
        inventory: &InventoryStore,
        conversions: &ConversionTable,
    ) -> f64 {
        inventory
            .records()
            .filter(|record| record.quantity > 0)
            .map(|record| {
                record.quantity as f64
                    * self.get_best_unit_cost(&record.product, &record.subtype, conversions)
            })
            .sum()
    }

    /// Derives the cost of every listed emission from a case cost.
    ///
    /// Pure calculation: the caller decides whether to stage or commit the
    /// results. The case emission itself is not included.
    pub fn rebase_from_case(
        case_cost: f64,
        product: &str,
        subtype: &str,
        emissions: &[String],
        conversions: &ConversionTable,
    ) -> Vec<CostEntry> {
        let case_units = f64::from(conversions.units_per_emission(CAJA, subtype));
        let per_unit = case_cost / case_units;

        emissions
            .iter()
            .filter(|emission| emission.as_str() != CAJA)
            .map(|emission| CostEntry {
                key: ItemKey::new(product, emission.clone(), subtype),
                amount: per_unit * f64::from(conversions.units_per_emission(emission, subtype)),
            })
            .collect()
    }

    /// Moves every entry of `old` to `new`.
    pub fn rename_product(&mut self, old: &str, new: &str) {
        self.prices = std::mem::take(&mut self.prices)
            .into_iter()
            .map(|(mut key, amount)| {
                if key.item.product == old {
                    key.item.product = new.to_string();
                }
                (key, amount)
            })
            .collect();

        self.costs = std::mem::take(&mut self.costs)
            .into_iter()
            .map(|(mut key, amount)| {
                if key.product == old {
                    key.product = new.to_string();
                }
                (key, amount)
            })
            .collect();
    }

    fn positive_cost(&self, key: &ItemKey) -> Option<f64> {
        self.cost(key).filter(|cost| *cost > 0.0)
    }
}

/// Trims the tuple and fills in the default emission and subtype.
pub fn normalize(item: &ItemKey) -> ItemKey {
    let or_default = |value: &str, default: &str| {
        let value = value.trim();
        if value.is_empty() {
            default.to_string()
        } else {
            value.to_string()
        }
    };

    ItemKey::new(
        item.product.trim(),
        or_default(&item.emission, DEFAULT_EMISSION),
        or_default(&item.subtype, DEFAULT_SUBTYPE),
    )
}

// =============================================================================
// Unit Tests
// =============================================================================
