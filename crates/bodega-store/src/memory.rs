//! # In-Memory Backend
//!
//! A [`Backend`] that keeps every table in process memory.
//!
//! Used when running offline and as the injected collaborator in tests.
//! Failures can be switched on per operation to exercise the engine's
//! optimistic commit path:
//!
//! ```rust,ignore
//! let backend = MemoryBackend::new();
//! backend.fail(Operation::UpsertPrice).await;
//! // every upsert_price now returns StoreError::Unavailable
//! backend.recover(Operation::UpsertPrice).await;
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::{StoreError, StoreResult};
use crate::rows::{
    CostRow, EmissionRow, InventoryRow, NewProduct, PriceRow, ProductRow, ReportRow, SettingRow,
};

/// Every backend call, for fault injection and call recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchCatalog,
    CreateProduct,
    UpdateProduct,
    DeleteProduct,
    FetchInventory,
    UpsertInventory,
    FetchPrices,
    UpsertPrice,
    FetchCostPrices,
    UpsertCostPrice,
    FetchEmissions,
    UpsertEmission,
    DeleteEmission,
    FetchInventoryHistory,
    CreateInventoryHistory,
    FetchWasteReports,
    CreateWasteReport,
    FetchSettings,
    UpsertSetting,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::FetchCatalog => "fetch_catalog",
            Operation::CreateProduct => "create_product",
            Operation::UpdateProduct => "update_product",
            Operation::DeleteProduct => "delete_product",
            Operation::FetchInventory => "fetch_inventory",
            Operation::UpsertInventory => "upsert_inventory",
            Operation::FetchPrices => "fetch_prices",
            Operation::UpsertPrice => "upsert_price",
            Operation::FetchCostPrices => "fetch_cost_prices",
            Operation::UpsertCostPrice => "upsert_cost_price",
            Operation::FetchEmissions => "fetch_emissions",
            Operation::UpsertEmission => "upsert_emission",
            Operation::DeleteEmission => "delete_emission",
            Operation::FetchInventoryHistory => "fetch_inventory_history",
            Operation::CreateInventoryHistory => "create_inventory_history",
            Operation::FetchWasteReports => "fetch_waste_reports",
            Operation::CreateWasteReport => "create_waste_report",
            Operation::FetchSettings => "fetch_settings",
            Operation::UpsertSetting => "upsert_setting",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type InventoryKey = (String, String, String);
type PriceKey = (String, String, String, String, bool);
type CostKey = (String, String, String, String);
type EmissionKey = (String, String, Option<String>);
type SettingKey = (String, String);

#[derive(Debug, Default)]
struct Tables {
    products: BTreeMap<String, ProductRow>,
    inventory: BTreeMap<InventoryKey, InventoryRow>,
    prices: BTreeMap<PriceKey, PriceRow>,
    costs: BTreeMap<CostKey, CostRow>,
    emissions: BTreeMap<EmissionKey, EmissionRow>,
    inventory_history: Vec<ReportRow>,
    waste_reports: Vec<ReportRow>,
    settings: BTreeMap<SettingKey, SettingRow>,
}

#[derive(Debug, Default)]
struct Faults {
    failing: HashSet<Operation>,
    calls: Vec<Operation>,
}

/// Backend holding every table in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call of `operation` fail until [`recover`](Self::recover).
    pub async fn fail(&self, operation: Operation) {
        self.faults.lock().await.failing.insert(operation);
    }

    pub async fn recover(&self, operation: Operation) {
        self.faults.lock().await.failing.remove(&operation);
    }

    /// Calls made so far, in order.
    pub async fn calls(&self) -> Vec<Operation> {
        self.faults.lock().await.calls.clone()
    }

    /// Number of calls made for one operation.
    pub async fn call_count(&self, operation: Operation) -> usize {
        self.faults
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| **call == operation)
            .count()
    }

    async fn enter(&self, operation: Operation) -> StoreResult<()> {
        let mut faults = self.faults.lock().await;
        faults.calls.push(operation);
        if faults.failing.contains(&operation) {
            debug!(operation = %operation, "Injected backend failure");
            return Err(StoreError::Unavailable(format!(
                "injected failure: {}",
                operation
            )));
        }
        Ok(())
    }
}

fn history_for(rows: &[ReportRow], organization_id: &str) -> Vec<ReportRow> {
    let mut rows: Vec<ReportRow> = rows
        .iter()
        .filter(|row| row.organization_id == organization_id)
        .cloned()
        .collect();
    rows.sort_by(|a, b| b.report.timestamp.cmp(&a.report.timestamp));
    rows
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch_catalog(&self, organization_id: &str) -> StoreResult<Vec<ProductRow>> {
        self.enter(Operation::FetchCatalog).await?;
        let tables = self.tables.lock().await;
        Ok(tables
            .products
            .values()
            .filter(|row| row.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn create_product(&self, product: NewProduct) -> StoreResult<ProductRow> {
        self.enter(Operation::CreateProduct).await?;
        let mut tables = self.tables.lock().await;

        let name = product.name.trim().to_string();
        let taken = tables.products.values().any(|row| {
            row.organization_id == product.organization_id
                && row.name.to_lowercase() == name.to_lowercase()
        });
        if taken {
            return Err(StoreError::duplicate("name", name));
        }

        let row = ProductRow {
            id: Uuid::new_v4().to_string(),
            organization_id: product.organization_id,
            name,
            color: product.color,
            category: product.category,
            active: true,
            created_at: Some(Utc::now()),
        };
        debug!(id = %row.id, name = %row.name, "Created product");
        tables.products.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn update_product(&self, product: ProductRow) -> StoreResult<ProductRow> {
        self.enter(Operation::UpdateProduct).await?;
        let mut tables = self.tables.lock().await;
        let existing = tables
            .products
            .get_mut(&product.id)
            .filter(|row| row.organization_id == product.organization_id)
            .ok_or_else(|| StoreError::not_found("Product", product.id.clone()))?;

        let created_at = existing.created_at;
        *existing = ProductRow {
            created_at,
            ..product
        };
        Ok(existing.clone())
    }

    async fn delete_product(&self, organization_id: &str, product_id: &str) -> StoreResult<()> {
        self.enter(Operation::DeleteProduct).await?;
        let mut tables = self.tables.lock().await;
        match tables.products.get_mut(product_id) {
            Some(row) if row.organization_id == organization_id => {
                row.active = false;
                Ok(())
            }
            _ => Err(StoreError::not_found("Product", product_id)),
        }
    }

    async fn fetch_inventory(&self, organization_id: &str) -> StoreResult<Vec<InventoryRow>> {
        self.enter(Operation::FetchInventory).await?;
        let tables = self.tables.lock().await;
        Ok(tables
            .inventory
            .values()
            .filter(|row| row.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn upsert_inventory(&self, row: InventoryRow) -> StoreResult<()> {
        self.enter(Operation::UpsertInventory).await?;
        let key = (
            row.organization_id.clone(),
            row.product_id.clone(),
            row.subtype.clone(),
        );
        self.tables.lock().await.inventory.insert(key, row);
        Ok(())
    }

    async fn fetch_prices(&self, organization_id: &str) -> StoreResult<Vec<PriceRow>> {
        self.enter(Operation::FetchPrices).await?;
        let tables = self.tables.lock().await;
        Ok(tables
            .prices
            .values()
            .filter(|row| row.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn upsert_price(&self, row: PriceRow) -> StoreResult<()> {
        self.enter(Operation::UpsertPrice).await?;
        let key = (
            row.organization_id.clone(),
            row.product_id.clone(),
            row.emission.clone(),
            row.subtype.clone(),
            row.is_local,
        );
        self.tables.lock().await.prices.insert(key, row);
        Ok(())
    }

    async fn fetch_cost_prices(&self, organization_id: &str) -> StoreResult<Vec<CostRow>> {
        self.enter(Operation::FetchCostPrices).await?;
        let tables = self.tables.lock().await;
        Ok(tables
            .costs
            .values()
            .filter(|row| row.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn upsert_cost_price(&self, row: CostRow) -> StoreResult<()> {
        self.enter(Operation::UpsertCostPrice).await?;
        let key = (
            row.organization_id.clone(),
            row.product_id.clone(),
            row.emission.clone(),
            row.subtype.clone(),
        );
        self.tables.lock().await.costs.insert(key, row);
        Ok(())
    }

    async fn fetch_emissions(&self, organization_id: &str) -> StoreResult<Vec<EmissionRow>> {
        self.enter(Operation::FetchEmissions).await?;
        let tables = self.tables.lock().await;
        Ok(tables
            .emissions
            .values()
            .filter(|row| row.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn upsert_emission(&self, row: EmissionRow) -> StoreResult<()> {
        self.enter(Operation::UpsertEmission).await?;
        let key = (
            row.organization_id.clone(),
            row.name.clone(),
            row.subtype.clone(),
        );
        self.tables.lock().await.emissions.insert(key, row);
        Ok(())
    }

    async fn delete_emission(
        &self,
        organization_id: &str,
        name: &str,
        subtype: Option<&str>,
    ) -> StoreResult<()> {
        self.enter(Operation::DeleteEmission).await?;
        let key = (
            organization_id.to_string(),
            name.to_string(),
            subtype.map(str::to_string),
        );
        // Deleting a rule that does not exist is not an error
        self.tables.lock().await.emissions.remove(&key);
        Ok(())
    }

    async fn fetch_inventory_history(&self, organization_id: &str) -> StoreResult<Vec<ReportRow>> {
        self.enter(Operation::FetchInventoryHistory).await?;
        let tables = self.tables.lock().await;
        Ok(history_for(&tables.inventory_history, organization_id))
    }

    async fn create_inventory_history(&self, row: ReportRow) -> StoreResult<()> {
        self.enter(Operation::CreateInventoryHistory).await?;
        self.tables.lock().await.inventory_history.push(row);
        Ok(())
    }

    async fn fetch_waste_reports(&self, organization_id: &str) -> StoreResult<Vec<ReportRow>> {
        self.enter(Operation::FetchWasteReports).await?;
        let tables = self.tables.lock().await;
        Ok(history_for(&tables.waste_reports, organization_id))
    }

    async fn create_waste_report(&self, row: ReportRow) -> StoreResult<()> {
        self.enter(Operation::CreateWasteReport).await?;
        self.tables.lock().await.waste_reports.push(row);
        Ok(())
    }

    async fn fetch_settings(&self, organization_id: &str) -> StoreResult<Vec<SettingRow>> {
        self.enter(Operation::FetchSettings).await?;
        let tables = self.tables.lock().await;
        Ok(tables
            .settings
            .values()
            .filter(|row| row.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn upsert_setting(&self, row: SettingRow) -> StoreResult<()> {
        self.enter(Operation::UpsertSetting).await?;
        let key = (row.organization_id.clone(), row.key.clone());
        self.tables.lock().await.settings.insert(key, row);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bodega_core::MovementReport;
    use chrono::Duration;

    const ORG: &str = "org-1";

    fn new_product(name: &str) -> NewProduct {
        NewProduct {
            organization_id: ORG.to_string(),
            name: name.to_string(),
            color: None,
            category: None,
        }
    }

    fn price(product_id: &str, is_local: bool, value: f64) -> PriceRow {
        PriceRow {
            organization_id: ORG.to_string(),
            product_id: product_id.to_string(),
            emission: "Unidad".to_string(),
            subtype: "Botella".to_string(),
            is_local,
            price: value,
        }
    }

    #[tokio::test]
    async fn test_create_product_assigns_id_and_rejects_duplicates() {
        let backend = MemoryBackend::new();
        let row = backend.create_product(new_product(" Polar ")).await.unwrap();
        assert_eq!(row.name, "Polar");
        assert!(!row.id.is_empty());

        let err = backend.create_product(new_product("POLAR")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_catalog_is_scoped_to_organization() {
        let backend = MemoryBackend::new();
        backend.create_product(new_product("Polar")).await.unwrap();
        backend
            .create_product(NewProduct {
                organization_id: "org-2".to_string(),
                ..new_product("Solera")
            })
            .await
            .unwrap();

        let rows = backend.fetch_catalog(ORG).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Polar");
    }

    #[tokio::test]
    async fn test_delete_product_is_soft() {
        let backend = MemoryBackend::new();
        let row = backend.create_product(new_product("Polar")).await.unwrap();
        backend.delete_product(ORG, &row.id).await.unwrap();

        let rows = backend.fetch_catalog(ORG).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].active);
        assert!(backend.delete_product(ORG, "missing").await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_price_overwrites_by_natural_key() {
        let backend = MemoryBackend::new();
        backend.upsert_price(price("p-1", false, 1.0)).await.unwrap();
        backend.upsert_price(price("p-1", false, 1.5)).await.unwrap();
        backend.upsert_price(price("p-1", true, 2.0)).await.unwrap();

        let rows = backend.fetch_prices(ORG).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| !r.is_local && r.price == 1.5));
    }

    #[tokio::test]
    async fn test_injected_failure_and_recovery() {
        let backend = MemoryBackend::new();
        backend.fail(Operation::UpsertPrice).await;

        let err = backend.upsert_price(price("p-1", false, 1.0)).await.unwrap_err();
        assert!(err.is_transient());
        assert!(backend.fetch_prices(ORG).await.unwrap().is_empty());

        backend.recover(Operation::UpsertPrice).await;
        backend.upsert_price(price("p-1", false, 1.0)).await.unwrap();
        assert_eq!(backend.call_count(Operation::UpsertPrice).await, 2);
    }

    #[tokio::test]
    async fn test_history_fetched_newest_first() {
        let backend = MemoryBackend::new();
        let now = Utc::now();
        for minutes in [5, 1, 3] {
            backend
                .create_inventory_history(ReportRow {
                    organization_id: ORG.to_string(),
                    report: MovementReport::at(now - Duration::minutes(minutes), Vec::new()),
                })
                .await
                .unwrap();
        }

        let rows = backend.fetch_inventory_history(ORG).await.unwrap();
        let ages: Vec<i64> = rows
            .iter()
            .map(|r| (now - r.report.timestamp).num_minutes())
            .collect();
        assert_eq!(ages, vec![1, 3, 5]);
        assert!(backend.fetch_waste_reports(ORG).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_emission_is_noop() {
        let backend = MemoryBackend::new();
        backend.delete_emission(ORG, "Pack", Some("Botella")).await.unwrap();
        assert_eq!(backend.calls().await, vec![Operation::DeleteEmission]);
    }
}
