//! Property-based tests for bodega-core.
//!
//! These tests verify invariants hold for arbitrary inputs using proptest.
//!
//! Run with: cargo test -p bodega-core --test `property_tests`

use bodega_core::conversion::{BOTELLA, BOTELLA_TERCIO, CAJA, MEDIA_CAJA, UNIDAD};
use bodega_core::{
    ConversionTable, DomainState, EmissionRecord, HistoryLog, InventoryStore, ItemKey, Ledger,
    Locality, MovementReport, PendingBuffer, PriceKey, StockKey,
};
use proptest::prelude::*;

// ============================================================================
// Arbitrary generators
// ============================================================================

fn arb_emission() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(UNIDAD.to_string()),
        Just(CAJA.to_string()),
        Just(MEDIA_CAJA.to_string()),
        Just("Six Pack".to_string()),
        Just("Pack".to_string()),
        Just("Bulto".to_string()),
        "[A-Za-z ]{0,12}",
    ]
}

fn arb_subtype() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(BOTELLA.to_string()),
        Just(BOTELLA_TERCIO.to_string()),
        Just("Lata Pequeña".to_string()),
        Just("Lata Grande".to_string()),
        "[A-Za-z ]{0,12}",
    ]
}

fn arb_record() -> impl Strategy<Value = EmissionRecord> {
    (arb_emission(), prop::option::of(arb_subtype()), 0u32..100)
        .prop_map(|(name, subtype, units)| EmissionRecord::new(name, subtype.as_deref(), units))
}

fn arb_table() -> impl Strategy<Value = ConversionTable> {
    prop::collection::vec(arb_record(), 0..8).prop_map(ConversionTable::from_records)
}

fn arb_amount() -> impl Strategy<Value = f64> {
    (1i64..1_000_000i64).prop_map(|n| n as f64 / 100.0)
}

// ============================================================================
// Conversion properties
// ============================================================================

proptest! {
    /// No input ever resolves to zero units.
    #[test]
    fn prop_units_never_zero(
        table in arb_table(),
        emission in arb_emission(),
        subtype in arb_subtype(),
    ) {
        prop_assert!(table.units_per_emission(&emission, &subtype) >= 1);
    }

    /// Half a case is never more than a case under the defaults.
    #[test]
    fn prop_default_half_case_fits_in_case(subtype in arb_subtype()) {
        let table = ConversionTable::new();
        let caja = table.units_per_emission(CAJA, &subtype);
        let media = table.units_per_emission(MEDIA_CAJA, &subtype);
        prop_assert_eq!(media * 2, caja);
    }
}

// ============================================================================
// Ledger properties
// ============================================================================

proptest! {
    /// A case cost alone determines unit and half-case costs.
    #[test]
    fn prop_costs_derive_from_case(case_cost in arb_amount(), subtype in arb_subtype()) {
        let conversions = ConversionTable::new();
        let mut ledger = Ledger::new();
        let subtype = if subtype.trim().is_empty() { BOTELLA.to_string() } else { subtype };
        ledger.set_cost(ItemKey::new("Polar", CAJA, subtype.clone()), case_cost);

        let case_units = f64::from(conversions.units_per_emission(CAJA, &subtype));
        let media_units = f64::from(conversions.units_per_emission(MEDIA_CAJA, &subtype));

        let unit = ledger.get_cost_price(&ItemKey::new("Polar", UNIDAD, subtype.clone()), &conversions);
        let media = ledger.get_cost_price(&ItemKey::new("Polar", MEDIA_CAJA, subtype), &conversions);

        prop_assert!((unit - case_cost / case_units).abs() < 1e-9);
        prop_assert!((media - case_cost / case_units * media_units).abs() < 1e-9);
    }
}

// ============================================================================
// Inventory properties
// ============================================================================

proptest! {
    /// Stock never goes negative under any add/deduct sequence.
    #[test]
    fn prop_inventory_never_negative(
        ops in prop::collection::vec((any::<bool>(), arb_emission(), -50i64..50), 0..40),
    ) {
        let conversions = ConversionTable::new();
        let mut store = InventoryStore::new();
        let stock = StockKey::new("Polar", BOTELLA);
        store.set_base_stock(stock.clone(), 0);

        for (add, emission, quantity) in ops {
            let item = ItemKey::new("Polar", emission, BOTELLA);
            if add {
                store.add_stock(&item, quantity, &conversions);
            } else {
                store.deduct_stock(&item, quantity, &conversions);
            }
            prop_assert!(store.quantity(&stock) >= 0);
        }
    }
}

// ============================================================================
// Pending buffer properties
// ============================================================================

proptest! {
    /// Staging the committed value leaves nothing pending.
    #[test]
    fn prop_staging_committed_price_is_noop(committed in arb_amount(), local in any::<bool>()) {
        let mut ledger = Ledger::new();
        let key = PriceKey::new(ItemKey::new("Polar", UNIDAD, BOTELLA), Locality::from_is_local(local));
        ledger.set_price(key.clone(), committed);

        let mut pending = PendingBuffer::new();
        prop_assert!(!pending.stage_price(key.clone(), committed, &ledger));
        prop_assert!(!pending.has_pending_price(&key));
    }

    /// After a price commit nothing is pending and every change is reported.
    #[test]
    fn prop_price_commit_drains_buffer(
        edits in prop::collection::vec((0usize..4, any::<bool>(), arb_amount()), 0..20),
    ) {
        let products = ["Polar", "Solera", "Zulia", "Regional"];
        let mut state = DomainState::new();
        for (index, local, value) in &edits {
            let item = ItemKey::new(products[*index], UNIDAD, BOTELLA);
            if *local {
                state.stage_price(PriceKey::new(item, Locality::Local), *value);
            } else {
                state.stage_cost(item, *value);
            }
        }
        let expected = state.pending.prices().len() + state.pending.costs().len();

        let commit = state.commit_prices_locally();
        prop_assert_eq!(commit.applied.len(), expected);
        prop_assert!(commit.rejected.is_empty());
        prop_assert!(!state.pending.has_pending_changes());
        for change in &commit.applied {
            prop_assert!(change.old_value != change.new_value);
        }
    }
}

// ============================================================================
// History properties
// ============================================================================

proptest! {
    /// The log never grows past its capacity.
    #[test]
    fn prop_history_is_capped(commits in 0usize..120, capacity in 1usize..60) {
        let mut log = HistoryLog::with_capacity(capacity);
        for _ in 0..commits {
            log.prepend(MovementReport::new(Vec::new()));
        }
        prop_assert_eq!(log.len(), commits.min(capacity));
    }
}

#[test]
fn history_stays_at_fifty_after_many_commits() {
    let mut state = DomainState::new();
    for _ in 0..60 {
        state
            .pending
            .stage_inventory_delta(ItemKey::new("Polar", UNIDAD, BOTELLA), 1);
        state.commit_inventory_locally();
    }
    assert_eq!(state.inventory_history.len(), 50);
}
