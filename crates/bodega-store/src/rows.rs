//! # Wire Rows
//!
//! The records exchanged with the backend, one type per table. The change
//! feed carries the same shapes in its `new`/`old` payloads.
//!
//! ```text
//! ┌──────────────────┬──────────────────────────────────────────────────────┐
//! │ Table            │ Natural key                                          │
//! ├──────────────────┼──────────────────────────────────────────────────────┤
//! │ products         │ id                                                   │
//! │ inventory        │ organization_id, product_id, subtype                 │
//! │ prices           │ organization_id, product_id, emission, subtype,      │
//! │                  │ is_local                                             │
//! │ cost_prices      │ organization_id, product_id, emission, subtype       │
//! │ emissions        │ organization_id, name, subtype                       │
//! │ settings         │ organization_id, key                                 │
//! │ inventory_history│ id                                                   │
//! │ waste_reports    │ id                                                   │
//! └──────────────────┴──────────────────────────────────────────────────────┘
//! ```
//!
//! Rows reference products by backend id; the engine maps ids to names.

use bodega_core::{EmissionRecord, Locality, MovementReport, Product};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

// =============================================================================
// Products
// =============================================================================

/// Fields of a product before the backend assigns its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub organization_id: String,
    pub name: String,
    pub color: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ProductRow {
    pub fn from_product(organization_id: &str, product: &Product) -> Self {
        ProductRow {
            id: product.id.clone(),
            organization_id: organization_id.to_string(),
            name: product.name.clone(),
            color: product.color.clone(),
            category: product.category.clone(),
            active: product.active,
            created_at: None,
        }
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name.trim().to_string(),
            color: row.color,
            category: row.category,
            active: row.active,
        }
    }
}

// =============================================================================
// Inventory, Prices, Costs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRow {
    pub organization_id: String,
    pub product_id: String,
    pub subtype: String,
    /// Base units.
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub organization_id: String,
    pub product_id: String,
    pub emission: String,
    pub subtype: String,
    #[serde(default)]
    pub is_local: bool,
    pub price: f64,
}

impl PriceRow {
    pub fn locality(&self) -> Locality {
        Locality::from_is_local(self.is_local)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRow {
    pub organization_id: String,
    pub product_id: String,
    pub emission: String,
    pub subtype: String,
    pub cost: f64,
}

// =============================================================================
// Emissions, Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionRow {
    pub organization_id: String,
    pub name: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub units: u32,
}

impl EmissionRow {
    pub fn from_record(organization_id: &str, record: &EmissionRecord) -> Self {
        EmissionRow {
            organization_id: organization_id.to_string(),
            name: record.name.clone(),
            subtype: record.subtype.clone(),
            units: record.units,
        }
    }
}

impl From<EmissionRow> for EmissionRecord {
    fn from(row: EmissionRow) -> Self {
        EmissionRecord::new(row.name, row.subtype.as_deref(), row.units)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingRow {
    pub organization_id: String,
    pub key: String,
    pub value: serde_json::Value,
}

// =============================================================================
// Movement Reports
// =============================================================================

/// A movement report as stored in either history table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub organization_id: String,
    #[serde(flatten)]
    pub report: MovementReport,
}
