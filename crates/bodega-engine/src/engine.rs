//! # Engine
//!
//! Owns the shared domain state of one organization and the backend it
//! persists to.
//!
//! ## Commit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Optimistic Commit                                    │
//! │                                                                         │
//! │  1. lock state                                                         │
//! │       drain the pending buffer, apply to ledger / stock, build report  │
//! │       resolve product ids through the catalog                          │
//! │  2. unlock                                                             │
//! │  3. await one upsert per change, in staging order                      │
//! │       failure → warn!, recorded in the report, local value kept        │
//! │  4. persist the movement report (stock commits only)                   │
//! │                                                                         │
//! │  A change-feed event may land between two upserts. The next full       │
//! │  load() heals whatever the backend missed.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Single-change operations (`set_base_stock`, `add_emission`,
//! `update_setting`, ...) follow the same rule: the local change is kept when
//! the backend call fails and the store error is returned to the caller.
//! `add_product` is the exception. It needs the backend id, so a failed
//! create leaves the state untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use bodega_core::validation::validate_product_name;
use bodega_core::{
    BusinessSettings, CacheSnapshot, Catalog, CatalogChange, ChangeTarget, CommitFailure, ConversionTable,
    CoreError, CostEntry, DomainState, EmissionRecord, InventoryRecord, ItemKey, Locality,
    MovementCommit, MovementReport, PlannedChange, PriceKey, PriceChangeReport, Product,
    StockKey, ValidationError,
};
use bodega_store::{
    Backend, CostRow, EmissionRow, InventoryRow, NewProduct, PriceRow, ProductRow, ReportRow,
    SettingRow, StoreResult,
};

use crate::cache;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::reconcile::{Reconciler, ReconcilerHandle};

/// Domain state shared between the engine and the reconciler.
pub type SharedState = Arc<Mutex<DomainState>>;

// =============================================================================
// Reports
// =============================================================================

/// Counts from a full resync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub products: usize,
    pub emissions: usize,
    pub prices: usize,
    pub costs: usize,
    pub stock_records: usize,
    pub inventory_reports: usize,
    pub waste_reports: usize,
    /// Rows left out: unknown product ids, names already held by another
    /// id, and setting values that do not parse.
    pub skipped_rows: usize,
}

/// Result of committing the inventory or waste buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct StockCommitReport {
    pub report: MovementReport,
    /// Stock rows the backend did not accept.
    pub failed_rows: Vec<InventoryRecord>,
    pub report_persisted: bool,
}

impl StockCommitReport {
    pub fn is_fully_persisted(&self) -> bool {
        self.failed_rows.is_empty() && self.report_persisted
    }
}

#[derive(Debug, Clone, Copy)]
enum MovementLog {
    Inventory,
    Waste,
}

impl MovementLog {
    fn as_str(&self) -> &'static str {
        match self {
            MovementLog::Inventory => "inventory",
            MovementLog::Waste => "waste",
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// The product/inventory domain engine.
pub struct Engine<B: Backend + ?Sized> {
    backend: Arc<B>,
    state: SharedState,
    config: Arc<EngineConfig>,
}

impl<B: Backend + ?Sized> Engine<B> {
    /// Creates an engine with empty state. Call [`Engine::load`] or
    /// [`Engine::load_cache`] to populate it.
    pub fn new(backend: Arc<B>, config: EngineConfig) -> Self {
        let state = DomainState::with_history_capacity(config.history.capacity);
        Engine {
            backend,
            state: Arc::new(Mutex::new(state)),
            config: Arc::new(config),
        }
    }

    pub fn organization_id(&self) -> &str {
        self.config.organization_id()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Handle to the shared state, for hosts that read it directly.
    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    // =========================================================================
    // Full Resync
    // =========================================================================

    /// Replaces the committed state with the backend's.
    ///
    /// Pending edits survive; the backend is fetched before the lock is taken.
    pub async fn load(&self) -> EngineResult<LoadSummary> {
        let org = self.organization_id();
        info!(organization_id = %org, "Full resync starting");

        let (products, inventory, prices, costs, emissions, inventory_reports, waste_reports, settings) =
            tokio::try_join!(
                self.backend.fetch_catalog(org),
                self.backend.fetch_inventory(org),
                self.backend.fetch_prices(org),
                self.backend.fetch_cost_prices(org),
                self.backend.fetch_emissions(org),
                self.backend.fetch_inventory_history(org),
                self.backend.fetch_waste_reports(org),
                self.backend.fetch_settings(org),
            )
            .map_err(|e| {
                error!(error = %e, "Full resync failed");
                e
            })?;

        let mut summary = LoadSummary {
            inventory_reports: inventory_reports.len(),
            waste_reports: waste_reports.len(),
            ..LoadSummary::default()
        };

        let mut fresh = DomainState::with_history_capacity(self.config.history.capacity);
        for product in products.into_iter().map(Product::from) {
            if let CatalogChange::NameTaken { name, holder } = fresh.catalog.upsert(product) {
                warn!(product = %name, holder_id = %holder, "Duplicate product name in catalog");
                summary.skipped_rows += 1;
            }
        }
        fresh.conversions =
            ConversionTable::from_records(emissions.into_iter().map(EmissionRecord::from));
        let (parsed, rejected) =
            BusinessSettings::from_rows(settings.iter().map(|row| (row.key.as_str(), &row.value)));
        fresh.settings = parsed;
        for (key, e) in &rejected {
            warn!(key = %key, error = %e, "Setting row rejected, default kept");
        }
        summary.skipped_rows += rejected.len();

        for row in prices {
            let Some(name) = resolve(&fresh.catalog, &row.product_id) else {
                summary.skipped_rows += 1;
                continue;
            };
            let locality = row.locality();
            let key = PriceKey::new(ItemKey::new(name, row.emission, row.subtype), locality);
            fresh.ledger.set_price(key, row.price);
            summary.prices += 1;
        }

        for row in costs {
            let Some(name) = resolve(&fresh.catalog, &row.product_id) else {
                summary.skipped_rows += 1;
                continue;
            };
            fresh
                .ledger
                .set_cost(ItemKey::new(name, row.emission, row.subtype), row.cost);
            summary.costs += 1;
        }

        for row in inventory {
            let Some(name) = resolve(&fresh.catalog, &row.product_id) else {
                summary.skipped_rows += 1;
                continue;
            };
            fresh
                .inventory
                .set_base_stock(StockKey::new(name, row.subtype), row.quantity);
            summary.stock_records += 1;
        }

        fresh
            .inventory_history
            .replace(inventory_reports.into_iter().map(|row| row.report));
        fresh
            .waste_history
            .replace(waste_reports.into_iter().map(|row| row.report));

        summary.products = fresh.catalog.len();
        summary.emissions = fresh.conversions.records().len();

        if summary.skipped_rows > 0 {
            warn!(skipped = summary.skipped_rows, "Rows skipped during resync");
        }

        {
            let mut state = self.state.lock().await;
            fresh.pending = std::mem::take(&mut state.pending);
            *state = fresh;
        }

        info!(
            products = summary.products,
            prices = summary.prices,
            costs = summary.costs,
            stock_records = summary.stock_records,
            "Full resync complete"
        );
        Ok(summary)
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Creates a product in the backend and registers it locally.
    pub async fn add_product(
        &self,
        name: &str,
        color: Option<String>,
        category: Option<String>,
    ) -> EngineResult<Product> {
        let name = {
            let state = self.state.lock().await;
            state.catalog.check_new(name)?
        };

        let row = self
            .backend
            .create_product(NewProduct {
                organization_id: self.organization_id().to_string(),
                name: name.clone(),
                color,
                category,
            })
            .await
            .map_err(|e| {
                warn!(product = %name, error = %e, "Product create failed");
                e
            })?;

        let product = Product::from(row);
        {
            let mut state = self.state.lock().await;
            let change = state.catalog.upsert(product.clone());
            if let CatalogChange::NameTaken { name, holder } = change {
                warn!(product = %name, holder_id = %holder, "Name claimed by another product during create");
                return Err(CoreError::DuplicateProduct(name).into());
            }
            state.apply_catalog_change(&change);
        }

        info!(product = %product.name, id = %product.id, "Product created");
        Ok(product)
    }

    /// Renames a product and replaces its display attributes.
    ///
    /// A rename re-keys every price, cost, stock record and pending edit.
    pub async fn update_product(
        &self,
        name: &str,
        new_name: &str,
        color: Option<String>,
        category: Option<String>,
    ) -> EngineResult<Product> {
        let updated = {
            let mut state = self.state.lock().await;
            let current = state
                .catalog
                .get(name)
                .cloned()
                .ok_or_else(|| CoreError::ProductNotFound(name.to_string()))?;

            let new_name = validate_product_name(new_name)?;
            if let Some(existing) = state.catalog.find_ignore_case(&new_name) {
                if existing.id != current.id {
                    return Err(CoreError::DuplicateProduct(existing.name.clone()).into());
                }
            }

            let updated = Product {
                name: new_name,
                color,
                category,
                ..current
            };
            let change = state.catalog.upsert(updated.clone());
            if let CatalogChange::NameTaken { name, .. } = change {
                return Err(CoreError::DuplicateProduct(name).into());
            }
            state.apply_catalog_change(&change);
            updated
        };

        let row = ProductRow::from_product(self.organization_id(), &updated);
        self.backend.update_product(row).await.map_err(|e| {
            warn!(product = %updated.name, error = %e, "Product update not persisted");
            e
        })?;

        debug!(product = %updated.name, "Product updated");
        Ok(updated)
    }

    /// Marks a product inactive. Its prices and stock stay addressable.
    pub async fn remove_product(&self, name: &str) -> EngineResult<()> {
        let id = {
            let mut state = self.state.lock().await;
            let id = state
                .catalog
                .get(name)
                .map(|p| p.id.clone())
                .ok_or_else(|| CoreError::ProductNotFound(name.to_string()))?;
            state.catalog.soft_delete(&id);
            id
        };

        self.backend
            .delete_product(self.organization_id(), &id)
            .await
            .map_err(|e| {
                warn!(product = %name, error = %e, "Product delete not persisted");
                e
            })?;
        Ok(())
    }

    // =========================================================================
    // Staging
    // =========================================================================

    /// Stages a price override. Returns whether an edit is now pending.
    pub async fn stage_price(&self, item: ItemKey, locality: Locality, value: f64) -> bool {
        let mut state = self.state.lock().await;
        state.stage_price(PriceKey::new(item, locality), value)
    }

    /// Stages a cost override. Returns whether an edit is now pending.
    pub async fn stage_cost(&self, item: ItemKey, value: f64) -> bool {
        let mut state = self.state.lock().await;
        state.stage_cost(item, value)
    }

    /// Adds a signed delta to the pending stock entry; returns the new delta.
    pub async fn stage_inventory_delta(&self, item: ItemKey, delta: i64) -> i64 {
        let mut state = self.state.lock().await;
        state.pending.stage_inventory_delta(item, delta)
    }

    /// Adds a signed delta to the pending waste entry; returns the new delta.
    pub async fn stage_waste_delta(&self, item: ItemKey, delta: i64) -> i64 {
        let mut state = self.state.lock().await;
        state.pending.stage_waste_delta(item, delta)
    }

    /// Derives every emission's cost from the case cost and stages them.
    pub async fn rebase_costs_from_case(&self, product: &str, subtype: &str) -> Vec<CostEntry> {
        let mut state = self.state.lock().await;
        let staged = state.rebase_costs_from_case(product, subtype);
        debug!(product, subtype, staged = staged.len(), "Costs rebased from case");
        staged
    }

    pub async fn has_pending_price(&self, item: &ItemKey, locality: Locality) -> bool {
        let key = PriceKey::new(item.clone(), locality);
        self.state.lock().await.pending.has_pending_price(&key)
    }

    pub async fn has_pending_cost(&self, item: &ItemKey) -> bool {
        self.state.lock().await.pending.has_pending_cost(item)
    }

    pub async fn has_pending_changes(&self) -> bool {
        self.state.lock().await.pending.has_pending_changes()
    }

    /// Drops pending prices and costs.
    pub async fn discard_price_changes(&self) {
        let mut state = self.state.lock().await;
        state.pending.discard_prices();
        state.pending.discard_costs();
    }

    pub async fn discard_inventory_changes(&self) {
        self.state.lock().await.pending.discard_inventory();
    }

    pub async fn discard_waste_changes(&self) {
        self.state.lock().await.pending.discard_waste();
    }

    // =========================================================================
    // Commits
    // =========================================================================

    /// Commits pending prices and costs.
    ///
    /// The buffer is drained and applied locally before any upsert is awaited,
    /// so edits staged meanwhile wait for the next commit.
    pub async fn commit_price_changes(&self) -> PriceChangeReport {
        let mut report = PriceChangeReport::default();
        let planned: Vec<(PlannedChange, Option<String>)> = {
            let mut state = self.state.lock().await;
            let commit = state.commit_prices_locally();

            for (change, e) in commit.rejected {
                let line = change.report_line();
                warn!(
                    beer = %line.beer,
                    emission = %line.emission,
                    subtype = %line.subtype,
                    value = change.new_value,
                    error = %e,
                    "Pending amount rejected, not applied"
                );
                report.failures.push(CommitFailure {
                    beer: line.beer,
                    emission: line.emission,
                    subtype: line.subtype,
                    reason: e.to_string(),
                });
            }

            commit
                .applied
                .into_iter()
                .map(|change| {
                    let id = state.catalog.get(&change.item().product).map(|p| p.id.clone());
                    (change, id)
                })
                .collect()
        };

        for (change, product_id) in planned {
            let line = change.report_line();
            let result = match product_id {
                Some(id) => self.persist_change(id, &change).await.map_err(EngineError::from),
                None => Err(CoreError::ProductNotFound(line.beer.clone()).into()),
            };

            if let Err(e) = result {
                warn!(
                    beer = %line.beer,
                    emission = %line.emission,
                    subtype = %line.subtype,
                    error = %e,
                    "Change kept locally but not persisted"
                );
                report.failures.push(CommitFailure {
                    beer: line.beer.clone(),
                    emission: line.emission.clone(),
                    subtype: line.subtype.clone(),
                    reason: e.to_string(),
                });
            }
            report.changes.push(line);
        }

        report.total_changes = report.changes.len();
        if !report.is_empty() || !report.failures.is_empty() {
            info!(
                total_changes = report.total_changes,
                failures = report.failures.len(),
                "Price changes committed"
            );
        }
        report
    }

    async fn persist_change(&self, product_id: String, change: &PlannedChange) -> StoreResult<()> {
        let organization_id = self.organization_id().to_string();
        match &change.target {
            ChangeTarget::Price(key) => {
                self.backend
                    .upsert_price(PriceRow {
                        organization_id,
                        product_id,
                        emission: key.item.emission.clone(),
                        subtype: key.item.subtype.clone(),
                        is_local: key.locality.is_local(),
                        price: change.new_value,
                    })
                    .await
            }
            ChangeTarget::Cost(key) => {
                self.backend
                    .upsert_cost_price(CostRow {
                        organization_id,
                        product_id,
                        emission: key.emission.clone(),
                        subtype: key.subtype.clone(),
                        cost: change.new_value,
                    })
                    .await
            }
        }
    }

    /// Commits pending inventory deltas. `None` when nothing was pending.
    pub async fn commit_inventory_changes(&self) -> Option<StockCommitReport> {
        let (commit, ids) = {
            let mut state = self.state.lock().await;
            let commit = state.commit_inventory_locally()?;
            let ids = product_ids(&state.catalog, &commit);
            (commit, ids)
        };
        Some(self.persist_movements(commit, ids, MovementLog::Inventory).await)
    }

    /// Commits pending waste. `None` when nothing was pending.
    pub async fn commit_waste(&self) -> Option<StockCommitReport> {
        let (commit, ids) = {
            let mut state = self.state.lock().await;
            let commit = state.commit_waste_locally()?;
            let ids = product_ids(&state.catalog, &commit);
            (commit, ids)
        };
        Some(self.persist_movements(commit, ids, MovementLog::Waste).await)
    }

    async fn persist_movements(
        &self,
        commit: MovementCommit,
        ids: Vec<Option<String>>,
        log: MovementLog,
    ) -> StockCommitReport {
        let organization_id = self.organization_id().to_string();
        let mut failed_rows = Vec::new();

        for (record, product_id) in commit.touched.into_iter().zip(ids) {
            let Some(product_id) = product_id else {
                warn!(product = %record.product, "Stock row for unknown product not persisted");
                failed_rows.push(record);
                continue;
            };

            let row = InventoryRow {
                organization_id: organization_id.clone(),
                product_id,
                subtype: record.subtype.clone(),
                quantity: record.quantity,
            };
            if let Err(e) = self.backend.upsert_inventory(row).await {
                warn!(
                    product = %record.product,
                    subtype = %record.subtype,
                    error = %e,
                    "Stock kept locally but not persisted"
                );
                failed_rows.push(record);
            }
        }

        let row = ReportRow {
            organization_id,
            report: commit.report.clone(),
        };
        let persisted = match log {
            MovementLog::Inventory => self.backend.create_inventory_history(row).await,
            MovementLog::Waste => self.backend.create_waste_report(row).await,
        };
        let report_persisted = match persisted {
            Ok(()) => true,
            Err(e) => {
                error!(log = log.as_str(), report_id = %commit.report.id, error = %e, "Movement report not persisted");
                false
            }
        };

        info!(
            log = log.as_str(),
            movements = commit.report.movements.len(),
            total_base_units = commit.report.total_base_units,
            "Movements committed"
        );

        StockCommitReport {
            report: commit.report,
            failed_rows,
            report_persisted,
        }
    }

    // =========================================================================
    // Conversion Rules
    // =========================================================================

    /// Adds a new conversion rule.
    pub async fn add_emission(&self, record: EmissionRecord) -> EngineResult<()> {
        {
            let mut state = self.state.lock().await;
            state.conversions.add(record.clone())?;
        }

        let row = EmissionRow::from_record(self.organization_id(), &record);
        self.backend.upsert_emission(row).await.map_err(|e| {
            warn!(emission = %record.name, error = %e, "Conversion rule not persisted");
            e
        })?;
        Ok(())
    }

    /// Replaces the units of an existing rule, or adds it.
    ///
    /// Checked like [`Engine::add_emission`]; an invalid rule changes nothing.
    pub async fn update_emission(&self, record: EmissionRecord) -> EngineResult<()> {
        record.validate()?;
        {
            let mut state = self.state.lock().await;
            state.conversions.upsert(record.clone());
        }

        let row = EmissionRow::from_record(self.organization_id(), &record);
        self.backend.upsert_emission(row).await.map_err(|e| {
            warn!(emission = %record.name, error = %e, "Conversion rule not persisted");
            e
        })?;
        Ok(())
    }

    /// Removes a rule. Returns false (and calls nothing) when no rule matched.
    pub async fn remove_emission(&self, name: &str, subtype: Option<&str>) -> EngineResult<bool> {
        let removed = self.state.lock().await.conversions.remove(name, subtype);
        if !removed {
            debug!(emission = name, ?subtype, "No conversion rule to remove");
            return Ok(false);
        }

        self.backend
            .delete_emission(self.organization_id(), name, subtype)
            .await
            .map_err(|e| {
                warn!(emission = name, error = %e, "Conversion rule removal not persisted");
                e
            })?;
        Ok(true)
    }

    pub async fn emissions_for(&self, subtype: &str) -> Vec<String> {
        self.state.lock().await.conversions.emissions_for(subtype)
    }

    // =========================================================================
    // Direct Stock Operations
    // =========================================================================

    /// Overwrites the base-unit stock of a product-subtype.
    pub async fn set_base_stock(&self, product: &str, subtype: &str, quantity: i64) -> EngineResult<()> {
        if quantity < 0 {
            return Err(ValidationError::Negative {
                field: "quantity".to_string(),
            }
            .into());
        }

        let product_id = {
            let mut state = self.state.lock().await;
            let product_id = state
                .catalog
                .get(product)
                .map(|p| p.id.clone())
                .ok_or_else(|| CoreError::ProductNotFound(product.to_string()))?;
            state
                .inventory
                .set_base_stock(StockKey::new(product, subtype), quantity);
            product_id
        };

        self.upsert_stock(product_id, product, subtype, quantity).await
    }

    /// Deducts an emission quantity, clamping at zero.
    ///
    /// Returns the new level, or `None` when the product has no stock record.
    pub async fn deduct_stock(&self, item: &ItemKey, quantity: i64) -> EngineResult<Option<i64>> {
        let (product_id, level) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let Some(product_id) = state.catalog.get(&item.product).map(|p| p.id.clone()) else {
                debug!(product = %item.product, "Deduct for unknown product ignored");
                return Ok(None);
            };
            let Some(level) = state
                .inventory
                .deduct_stock(item, quantity, &state.conversions)
            else {
                debug!(product = %item.product, subtype = %item.subtype, "No stock record to deduct from");
                return Ok(None);
            };
            (product_id, level)
        };

        self.upsert_stock(product_id, &item.product, &item.subtype, level)
            .await?;
        Ok(Some(level))
    }

    async fn upsert_stock(
        &self,
        product_id: String,
        product: &str,
        subtype: &str,
        quantity: i64,
    ) -> EngineResult<()> {
        let row = InventoryRow {
            organization_id: self.organization_id().to_string(),
            product_id,
            subtype: subtype.to_string(),
            quantity,
        };
        self.backend.upsert_inventory(row).await.map_err(|e| {
            warn!(product, subtype, error = %e, "Stock kept locally but not persisted");
            e
        })?;
        Ok(())
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Applies and persists a setting.
    ///
    /// Returns false for keys the engine does not interpret; those are still
    /// persisted.
    pub async fn update_setting(&self, key: &str, value: Value) -> EngineResult<bool> {
        let known = self.state.lock().await.settings.apply(key, &value)?;

        let row = SettingRow {
            organization_id: self.organization_id().to_string(),
            key: key.to_string(),
            value,
        };
        self.backend.upsert_setting(row).await.map_err(|e| {
            warn!(key, error = %e, "Setting kept locally but not persisted");
            e
        })?;
        Ok(known)
    }

    pub async fn settings(&self) -> BusinessSettings {
        self.state.lock().await.settings.clone()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_price(&self, item: &ItemKey, locality: Locality) -> f64 {
        self.state.lock().await.get_price(item, locality)
    }

    pub async fn get_cost_price(&self, item: &ItemKey) -> f64 {
        self.state.lock().await.get_cost_price(item)
    }

    /// Pending price if staged, else the committed one.
    pub async fn effective_price(&self, item: &ItemKey, locality: Locality) -> f64 {
        let key = PriceKey::new(item.clone(), locality);
        self.state.lock().await.effective_price(&key)
    }

    pub async fn effective_cost(&self, item: &ItemKey) -> f64 {
        self.state.lock().await.effective_cost(item)
    }

    pub async fn get_best_unit_cost(&self, product: &str, subtype: &str) -> f64 {
        self.state.lock().await.get_best_unit_cost(product, subtype)
    }

    pub async fn get_inventory_asset_value(&self) -> f64 {
        self.state.lock().await.get_inventory_asset_value()
    }

    pub async fn units_per_emission(&self, emission: &str, subtype: &str) -> u32 {
        self.state.lock().await.units_per_emission(emission, subtype)
    }

    pub async fn stock_of(&self, product: &str, subtype: &str) -> i64 {
        self.state.lock().await.stock_of(product, subtype)
    }

    pub async fn check_stock(&self, item: &ItemKey, quantity: i64) -> bool {
        self.state.lock().await.check_stock(item, quantity)
    }

    pub async fn check_aggregate_stock(&self, emission: &str, subtype: &str, quantity: i64) -> bool {
        self.state
            .lock()
            .await
            .check_aggregate_stock(emission, subtype, quantity)
    }

    /// Active products sorted by name.
    pub async fn products(&self) -> Vec<Product> {
        self.state
            .lock()
            .await
            .catalog
            .active()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Inventory movement reports, newest first.
    pub async fn inventory_history(&self) -> Vec<MovementReport> {
        self.state
            .lock()
            .await
            .inventory_history
            .iter()
            .cloned()
            .collect()
    }

    /// Waste reports, newest first.
    pub async fn waste_history(&self) -> Vec<MovementReport> {
        self.state
            .lock()
            .await
            .waste_history
            .iter()
            .cloned()
            .collect()
    }

    // =========================================================================
    // Change Feed
    // =========================================================================

    /// Starts a reconciler task over the shared state.
    pub fn spawn_reconciler(&self) -> (ReconcilerHandle, JoinHandle<()>) {
        let (reconciler, handle) = Reconciler::new(
            self.state(),
            self.organization_id(),
            self.config.feed.channel_capacity,
        );
        let task = tokio::spawn(reconciler.run());
        (handle, task)
    }

    // =========================================================================
    // Local Cache
    // =========================================================================

    /// Writes the committed state to the configured cache file.
    ///
    /// Returns the path written, or `None` when caching is disabled.
    pub async fn save_cache(&self) -> EngineResult<Option<PathBuf>> {
        let Some(path) = self.config.cache_path() else {
            return Ok(None);
        };
        self.save_cache_to(&path).await?;
        Ok(Some(path))
    }

    pub async fn save_cache_to(&self, path: &Path) -> EngineResult<()> {
        let (snapshot, skipped) = {
            let state = self.state.lock().await;
            CacheSnapshot::from_state(&state)
        };
        if skipped > 0 {
            warn!(skipped, "Entries with unencodable keys left out of the cache");
        }
        cache::write_snapshot(path, &snapshot).await
    }

    /// Restores committed state from the configured cache file.
    ///
    /// Returns false when caching is disabled or no file exists yet.
    pub async fn load_cache(&self) -> EngineResult<bool> {
        let Some(path) = self.config.cache_path() else {
            return Ok(false);
        };
        self.load_cache_from(&path).await
    }

    pub async fn load_cache_from(&self, path: &Path) -> EngineResult<bool> {
        let Some(snapshot) = cache::read_snapshot(path).await? else {
            return Ok(false);
        };
        let mut fresh = snapshot.into_state(self.config.history.capacity)?;

        let mut state = self.state.lock().await;
        fresh.pending = std::mem::take(&mut state.pending);
        *state = fresh;
        info!(path = %path.display(), products = state.catalog.len(), "State restored from cache");
        Ok(true)
    }
}

fn resolve(catalog: &Catalog, product_id: &str) -> Option<String> {
    let name = catalog.name_for_id(product_id).map(str::to_string);
    if name.is_none() {
        debug!(product_id, "Row for unknown product id");
    }
    name
}

fn product_ids(catalog: &Catalog, commit: &MovementCommit) -> Vec<Option<String>> {
    commit
        .touched
        .iter()
        .map(|record| catalog.get(&record.product).map(|p| p.id.clone()))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
