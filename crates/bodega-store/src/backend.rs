//! # Backend Trait
//!
//! One async method per call the engine makes to the persistence
//! collaborator. Every call is scoped to an organization, either through its
//! argument or through the row it writes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Engine                                                                 │
//! │    load()            fetch_* (all tables, one organization)             │
//! │    add_product()     create_product → id                                │
//! │    commit_*()        upsert_* one row at a time, in staging order       │
//! │                      create_inventory_history / create_waste_report     │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  dyn Backend  ──► MemoryBackend (offline, tests)                        │
//! │               ──► remote implementations (outside this workspace)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::rows::{
    CostRow, EmissionRow, InventoryRow, NewProduct, PriceRow, ProductRow, ReportRow, SettingRow,
};

/// The persistence collaborator.
#[async_trait]
pub trait Backend: Send + Sync {
    // Products
    async fn fetch_catalog(&self, organization_id: &str) -> StoreResult<Vec<ProductRow>>;
    async fn create_product(&self, product: NewProduct) -> StoreResult<ProductRow>;
    async fn update_product(&self, product: ProductRow) -> StoreResult<ProductRow>;
    async fn delete_product(&self, organization_id: &str, product_id: &str) -> StoreResult<()>;

    // Inventory
    async fn fetch_inventory(&self, organization_id: &str) -> StoreResult<Vec<InventoryRow>>;
    async fn upsert_inventory(&self, row: InventoryRow) -> StoreResult<()>;

    // Prices and costs
    async fn fetch_prices(&self, organization_id: &str) -> StoreResult<Vec<PriceRow>>;
    async fn upsert_price(&self, row: PriceRow) -> StoreResult<()>;
    async fn fetch_cost_prices(&self, organization_id: &str) -> StoreResult<Vec<CostRow>>;
    async fn upsert_cost_price(&self, row: CostRow) -> StoreResult<()>;

    // Conversion rules
    async fn fetch_emissions(&self, organization_id: &str) -> StoreResult<Vec<EmissionRow>>;
    async fn upsert_emission(&self, row: EmissionRow) -> StoreResult<()>;
    async fn delete_emission(
        &self,
        organization_id: &str,
        name: &str,
        subtype: Option<&str>,
    ) -> StoreResult<()>;

    // Movement history
    async fn fetch_inventory_history(&self, organization_id: &str) -> StoreResult<Vec<ReportRow>>;
    async fn create_inventory_history(&self, row: ReportRow) -> StoreResult<()>;
    async fn fetch_waste_reports(&self, organization_id: &str) -> StoreResult<Vec<ReportRow>>;
    async fn create_waste_report(&self, row: ReportRow) -> StoreResult<()>;

    // Settings
    async fn fetch_settings(&self, organization_id: &str) -> StoreResult<Vec<SettingRow>>;
    async fn upsert_setting(&self, row: SettingRow) -> StoreResult<()>;
}
