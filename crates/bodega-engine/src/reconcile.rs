//! # Live Reconciliation
//!
//! Applies change-feed events from the backend to the shared state while the
//! engine keeps serving callers.
//!
//! ## Event Handling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Reconciliation Rules                                 │
//! │                                                                         │
//! │  ORGANIZATION SCOPE                                                    │
//! │  ──────────────────                                                    │
//! │  • Rows tagged with another organization are skipped                   │
//! │                                                                         │
//! │  PRODUCT ID RESOLUTION                                                 │
//! │  ─────────────────────                                                 │
//! │  • Rows reference products by backend id                               │
//! │  • The catalog maps the id to the name every local map is keyed by     │
//! │  • Unknown ids are skipped with a warning                              │
//! │                                                                         │
//! │  LAST WRITE WINS                                                       │
//! │  ───────────────                                                       │
//! │  • INSERT / UPDATE overwrite the committed value                       │
//! │  • DELETE removes it (products are only marked inactive)               │
//! │  • Pending edits are never touched                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The reconciler holds the state lock for one event at a time and never
//! across an await.

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use bodega_core::{CatalogChange, DomainState, EmissionRecord, ItemKey, Locality, PriceKey, Product, StockKey};
use bodega_store::{CostRow, EmissionRow, InventoryRow, PriceRow, ProductRow, SettingRow};

use crate::engine::SharedState;
use crate::error::{EngineError, EngineResult};
use crate::protocol::{ChangeEvent, EventType, Table};

// =============================================================================
// Outcome
// =============================================================================

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Applied,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The row belongs to another organization.
    OtherOrganization(String),
    /// No product with this backend id is known.
    UnknownProduct(String),
    /// The row renames a product onto a name another id still holds.
    NameTaken { name: String, holder: String },
    /// The row carried nothing the engine can use (e.g. a zero-unit rule).
    Ignored,
}

// =============================================================================
// Delete Payloads
// =============================================================================
//
// Deletes usually carry only the key columns, so they decode into these.

#[derive(Deserialize)]
struct ProductId {
    id: String,
}

#[derive(Deserialize)]
struct InventoryId {
    product_id: String,
    subtype: String,
}

#[derive(Deserialize)]
struct PriceId {
    product_id: String,
    emission: String,
    subtype: String,
    #[serde(default)]
    is_local: bool,
}

#[derive(Deserialize)]
struct CostId {
    product_id: String,
    emission: String,
    subtype: String,
}

#[derive(Deserialize)]
struct EmissionId {
    name: String,
    #[serde(default)]
    subtype: Option<String>,
}

#[derive(Deserialize)]
struct SettingId {
    key: String,
}

// =============================================================================
// Apply
// =============================================================================

/// Applies one change event to the state.
///
/// Errors leave the state untouched.
pub fn apply_change(
    state: &mut DomainState,
    organization_id: &str,
    event: &ChangeEvent,
) -> EngineResult<Applied> {
    if let Some(org) = event.organization_id() {
        if org != organization_id {
            return Ok(Applied::Skipped(SkipReason::OtherOrganization(
                org.to_string(),
            )));
        }
    }

    match event.table {
        Table::Products => apply_product(state, event),
        Table::Inventory => apply_inventory(state, event),
        Table::Prices => apply_price(state, event),
        Table::CostPrices => apply_cost(state, event),
        Table::Emissions => apply_emission(state, event),
        Table::Settings => apply_setting(state, event),
    }
}

fn apply_product(state: &mut DomainState, event: &ChangeEvent) -> EngineResult<Applied> {
    if event.event_type == EventType::Delete {
        let row: ProductId = event.record()?;
        return Ok(match state.catalog.soft_delete(&row.id) {
            Some(name) => {
                debug!(product = %name, "Product deactivated by change feed");
                Applied::Applied
            }
            None => Applied::Skipped(SkipReason::UnknownProduct(row.id)),
        });
    }

    let row: ProductRow = event.record()?;
    let product = Product::from(row);
    if product.name.is_empty() {
        return Err(EngineError::InvalidEvent(format!(
            "product {} has an empty name",
            product.id
        )));
    }

    let change = state.catalog.upsert(product);
    if let CatalogChange::NameTaken { name, holder } = change {
        return Ok(Applied::Skipped(SkipReason::NameTaken { name, holder }));
    }
    state.apply_catalog_change(&change);
    debug!(?change, "Product reconciled");
    Ok(Applied::Applied)
}

fn apply_inventory(state: &mut DomainState, event: &ChangeEvent) -> EngineResult<Applied> {
    if event.event_type == EventType::Delete {
        let row: InventoryId = event.record()?;
        let Some(name) = product_name(state, &row.product_id) else {
            return Ok(unknown(row.product_id));
        };
        state.inventory.remove(&StockKey::new(name, row.subtype));
        return Ok(Applied::Applied);
    }

    let row: InventoryRow = event.record()?;
    let Some(name) = product_name(state, &row.product_id) else {
        return Ok(unknown(row.product_id));
    };
    state
        .inventory
        .set_base_stock(StockKey::new(name, row.subtype), row.quantity);
    Ok(Applied::Applied)
}

fn apply_price(state: &mut DomainState, event: &ChangeEvent) -> EngineResult<Applied> {
    if event.event_type == EventType::Delete {
        let row: PriceId = event.record()?;
        let Some(name) = product_name(state, &row.product_id) else {
            return Ok(unknown(row.product_id));
        };
        let key = PriceKey::new(
            ItemKey::new(name, row.emission, row.subtype),
            Locality::from_is_local(row.is_local),
        );
        state.ledger.remove_price(&key);
        return Ok(Applied::Applied);
    }

    let row: PriceRow = event.record()?;
    let Some(name) = product_name(state, &row.product_id) else {
        return Ok(unknown(row.product_id));
    };
    let locality = row.locality();
    let key = PriceKey::new(ItemKey::new(name, row.emission, row.subtype), locality);
    state.ledger.set_price(key, row.price);
    Ok(Applied::Applied)
}

fn apply_cost(state: &mut DomainState, event: &ChangeEvent) -> EngineResult<Applied> {
    if event.event_type == EventType::Delete {
        let row: CostId = event.record()?;
        let Some(name) = product_name(state, &row.product_id) else {
            return Ok(unknown(row.product_id));
        };
        state
            .ledger
            .remove_cost(&ItemKey::new(name, row.emission, row.subtype));
        return Ok(Applied::Applied);
    }

    let row: CostRow = event.record()?;
    let Some(name) = product_name(state, &row.product_id) else {
        return Ok(unknown(row.product_id));
    };
    state
        .ledger
        .set_cost(ItemKey::new(name, row.emission, row.subtype), row.cost);
    Ok(Applied::Applied)
}

fn apply_emission(state: &mut DomainState, event: &ChangeEvent) -> EngineResult<Applied> {
    if event.event_type == EventType::Delete {
        let row: EmissionId = event.record()?;
        if !state.conversions.remove(&row.name, row.subtype.as_deref()) {
            debug!(emission = %row.name, "Deleted rule was not known locally");
        }
        return Ok(Applied::Applied);
    }

    let row: EmissionRow = event.record()?;
    if state.conversions.upsert(EmissionRecord::from(row)) {
        Ok(Applied::Applied)
    } else {
        Ok(Applied::Skipped(SkipReason::Ignored))
    }
}

fn apply_setting(state: &mut DomainState, event: &ChangeEvent) -> EngineResult<Applied> {
    if event.event_type == EventType::Delete {
        let row: SettingId = event.record()?;
        state.settings.reset(&row.key);
        return Ok(Applied::Applied);
    }

    let row: SettingRow = event.record()?;
    if state.settings.apply(&row.key, &row.value)? {
        Ok(Applied::Applied)
    } else {
        Ok(Applied::Skipped(SkipReason::Ignored))
    }
}

fn product_name(state: &DomainState, product_id: &str) -> Option<String> {
    state.catalog.name_for_id(product_id).map(str::to_string)
}

fn unknown(product_id: String) -> Applied {
    Applied::Skipped(SkipReason::UnknownProduct(product_id))
}

// =============================================================================
// Reconciler Task
// =============================================================================

/// Consumes change events and applies them to the shared state.
pub struct Reconciler {
    state: SharedState,

    organization_id: String,

    /// Receiver for change events.
    event_rx: mpsc::Receiver<ChangeEvent>,

    /// Shutdown receiver.
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for feeding and stopping the reconciler.
#[derive(Clone)]
pub struct ReconcilerHandle {
    event_tx: mpsc::Sender<ChangeEvent>,
    shutdown_tx: mpsc::Sender<()>,
}

impl ReconcilerHandle {
    /// Routes a change event to the reconciler.
    pub async fn handle_event(&self, event: ChangeEvent) -> EngineResult<()> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| EngineError::ChannelError("Event channel closed".into()))
    }

    /// Parses a raw feed message and routes it.
    pub async fn handle_raw(&self, json: &str) -> EngineResult<()> {
        let event = ChangeEvent::from_json(json)?;
        self.handle_event(event).await
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> EngineResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| EngineError::ChannelError("Shutdown channel closed".into()))
    }
}

impl Reconciler {
    /// Creates a reconciler and returns its handle.
    pub fn new(
        state: SharedState,
        organization_id: impl Into<String>,
        channel_capacity: usize,
    ) -> (Self, ReconcilerHandle) {
        let (event_tx, event_rx) = mpsc::channel(channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let reconciler = Reconciler {
            state,
            organization_id: organization_id.into(),
            event_rx,
            shutdown_rx,
        };

        let handle = ReconcilerHandle {
            event_tx,
            shutdown_tx,
        };

        (reconciler, handle)
    }

    /// Runs until shutdown or until every handle is dropped.
    ///
    /// Events already queued when shutdown arrives are applied first.
    pub async fn run(mut self) {
        info!(organization_id = %self.organization_id, "Reconciler starting");

        loop {
            tokio::select! {
                biased;

                event = self.event_rx.recv() => match event {
                    Some(event) => self.process(event).await,
                    None => {
                        debug!("Event channel closed");
                        break;
                    }
                },

                _ = self.shutdown_rx.recv() => {
                    info!("Reconciler shutting down");
                    while let Ok(event) = self.event_rx.try_recv() {
                        self.process(event).await;
                    }
                    break;
                }
            }
        }

        info!("Reconciler stopped");
    }

    async fn process(&self, event: ChangeEvent) {
        debug!(
            table = %event.table,
            event_type = ?event.event_type,
            "Processing change event"
        );

        let result = {
            let mut state = self.state.lock().await;
            apply_change(&mut state, &self.organization_id, &event)
        };

        match result {
            Ok(Applied::Applied) => {}
            Ok(Applied::Skipped(SkipReason::OtherOrganization(org))) => {
                warn!(table = %event.table, organization_id = %org, "Skipping event for another organization");
            }
            Ok(Applied::Skipped(SkipReason::UnknownProduct(id))) => {
                warn!(table = %event.table, product_id = %id, "Skipping event for unknown product");
            }
            Ok(Applied::Skipped(SkipReason::NameTaken { name, holder })) => {
                warn!(
                    product = %name,
                    holder_id = %holder,
                    "Skipping product row whose name belongs to another id"
                );
            }
            Ok(Applied::Skipped(SkipReason::Ignored)) => {
                debug!(table = %event.table, "Ignoring event without usable data");
            }
            Err(e) => {
                error!(table = %event.table, error = %e, "Failed to apply change event");
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    const ORG: &str = "org-1";

    fn state() -> DomainState {
        let mut state = DomainState::new();
        state.catalog.upsert(Product::new("p-1", "Polar"));
        state
    }

    fn event(event_type: &str, table: &str, row: serde_json::Value) -> ChangeEvent {
        let (new, old) = if event_type == "DELETE" {
            (json!({}), row)
        } else {
            (row, json!({}))
        };
        serde_json::from_value(json!({
            "eventType": event_type,
            "table": table,
            "new": new,
            "old": old,
        }))
        .unwrap()
    }

    #[test]
    fn test_price_insert_and_delete() {
        let mut state = state();
        let row = json!({
            "organization_id": ORG, "product_id": "p-1",
            "emission": "Unidad", "subtype": "Botella", "is_local": true, "price": 2.0
        });

        let outcome = apply_change(&mut state, ORG, &event("INSERT", "prices", row.clone())).unwrap();
        assert_eq!(outcome, Applied::Applied);
        let item = ItemKey::new("Polar", "Unidad", "Botella");
        assert_eq!(state.get_price(&item, Locality::Local), 2.0);

        apply_change(&mut state, ORG, &event("DELETE", "prices", row)).unwrap();
        assert_eq!(state.get_price(&item, Locality::Local), 0.0);
    }

    #[test]
    fn test_other_organization_is_skipped() {
        let mut state = state();
        let row = json!({
            "organization_id": "org-2", "product_id": "p-1", "subtype": "Botella", "quantity": 99
        });

        let outcome = apply_change(&mut state, ORG, &event("UPDATE", "inventory", row)).unwrap();
        assert_eq!(
            outcome,
            Applied::Skipped(SkipReason::OtherOrganization("org-2".into()))
        );
        assert_eq!(state.stock_of("Polar", "Botella"), 0);
    }

    #[test]
    fn test_unknown_product_is_skipped() {
        let mut state = state();
        let row = json!({
            "organization_id": ORG, "product_id": "p-404",
            "emission": "Caja", "subtype": "Botella", "cost": 30.0
        });

        let outcome = apply_change(&mut state, ORG, &event("INSERT", "cost_prices", row)).unwrap();
        assert_eq!(
            outcome,
            Applied::Skipped(SkipReason::UnknownProduct("p-404".into()))
        );
        assert_eq!(state.ledger.costs().count(), 0);
    }

    #[test]
    fn test_inventory_overwrites_and_clamps() {
        let mut state = state();
        let row = json!({
            "organization_id": ORG, "product_id": "p-1", "subtype": "Botella", "quantity": -4
        });

        apply_change(&mut state, ORG, &event("UPDATE", "inventory", row)).unwrap();
        assert_eq!(state.stock_of("Polar", "Botella"), 0);
        assert_eq!(state.inventory.len(), 1);
    }

    #[test]
    fn test_product_rename_rekeys_state() {
        let mut state = state();
        state
            .inventory
            .set_base_stock(StockKey::new("Polar", "Botella"), 24);

        let row = json!({"id": "p-1", "organization_id": ORG, "name": "Polar Pilsen"});
        apply_change(&mut state, ORG, &event("UPDATE", "products", row)).unwrap();

        assert!(state.catalog.get("Polar").is_none());
        assert_eq!(state.stock_of("Polar Pilsen", "Botella"), 24);
    }

    #[test]
    fn test_rename_onto_existing_name_is_skipped() {
        let mut state = state();
        state.catalog.upsert(Product::new("p-2", "Solera"));
        state
            .inventory
            .set_base_stock(StockKey::new("Polar", "Botella"), 10);
        state
            .inventory
            .set_base_stock(StockKey::new("Solera", "Botella"), 5);

        let row = json!({"id": "p-1", "organization_id": ORG, "name": "Solera"});
        let outcome = apply_change(&mut state, ORG, &event("UPDATE", "products", row)).unwrap();

        assert_eq!(
            outcome,
            Applied::Skipped(SkipReason::NameTaken {
                name: "Solera".into(),
                holder: "p-2".into()
            })
        );
        assert_eq!(state.catalog.len(), 2);
        assert_eq!(state.catalog.name_for_id("p-1"), Some("Polar"));
        assert_eq!(state.catalog.name_for_id("p-2"), Some("Solera"));
        assert_eq!(state.stock_of("Polar", "Botella"), 10);
        assert_eq!(state.stock_of("Solera", "Botella"), 5);
    }

    #[test]
    fn test_product_delete_is_soft() {
        let mut state = state();
        apply_change(&mut state, ORG, &event("DELETE", "products", json!({"id": "p-1"}))).unwrap();

        let product = state.catalog.get("Polar").unwrap();
        assert!(!product.active);
        assert!(state.catalog.active().is_empty());
    }

    #[test]
    fn test_emission_rules() {
        let mut state = state();
        let row = json!({"organization_id": ORG, "name": "Pack", "subtype": "Botella", "units": 12});

        apply_change(&mut state, ORG, &event("INSERT", "emissions", row.clone())).unwrap();
        assert_eq!(state.units_per_emission("Pack", "Botella"), 12);

        apply_change(&mut state, ORG, &event("DELETE", "emissions", row)).unwrap();
        assert_eq!(state.units_per_emission("Pack", "Botella"), 1);
    }

    #[test]
    fn test_zero_unit_rule_is_ignored() {
        let mut state = state();
        let row = json!({"organization_id": ORG, "name": "Pack", "subtype": "Botella", "units": 0});
        let outcome = apply_change(&mut state, ORG, &event("INSERT", "emissions", row)).unwrap();
        assert_eq!(outcome, Applied::Skipped(SkipReason::Ignored));
    }

    #[test]
    fn test_setting_update_and_reset() {
        let mut state = state();
        let row = json!({"organization_id": ORG, "key": "main_currency", "value": "VES"});

        apply_change(&mut state, ORG, &event("UPDATE", "settings", row.clone())).unwrap();
        assert_eq!(state.settings.main_currency, "VES");

        apply_change(&mut state, ORG, &event("DELETE", "settings", row)).unwrap();
        assert_eq!(state.settings.main_currency, "USD");
    }

    #[test]
    fn test_pending_edits_survive_remote_updates() {
        let mut state = state();
        let key = PriceKey::new(ItemKey::new("Polar", "Unidad", "Botella"), Locality::Standard);
        state.stage_price(key.clone(), 3.0);

        let row = json!({
            "organization_id": ORG, "product_id": "p-1",
            "emission": "Unidad", "subtype": "Botella", "price": 2.0
        });
        apply_change(&mut state, ORG, &event("UPDATE", "prices", row)).unwrap();

        assert_eq!(state.pending.pending_price(&key), Some(3.0));
        assert_eq!(state.effective_price(&key), 3.0);
    }

    #[tokio::test]
    async fn test_reconciler_drains_before_shutdown() {
        let shared = Arc::new(Mutex::new(state()));
        let (reconciler, handle) = Reconciler::new(shared.clone(), ORG, 8);
        let task = tokio::spawn(reconciler.run());

        let row = json!({
            "organization_id": ORG, "product_id": "p-1", "subtype": "Botella", "quantity": 36
        });
        handle
            .handle_event(event("INSERT", "inventory", row))
            .await
            .unwrap();
        handle
            .handle_raw(r#"{"eventType":"INSERT","table":"products","new":{"id":"p-2","organization_id":"org-1","name":"Zulia"},"old":{}}"#)
            .await
            .unwrap();
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        let state = shared.lock().await;
        assert_eq!(state.stock_of("Polar", "Botella"), 36);
        assert!(state.catalog.contains("Zulia"));
    }

    #[tokio::test]
    async fn test_handle_errors_after_stop() {
        let shared = Arc::new(Mutex::new(state()));
        let (reconciler, handle) = Reconciler::new(shared, ORG, 8);
        let task = tokio::spawn(reconciler.run());
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        let row = json!({"organization_id": ORG, "key": "subtypes", "value": []});
        let result = handle.handle_event(event("UPDATE", "settings", row)).await;
        assert!(matches!(result, Err(EngineError::ChannelError(_))));
    }
}
