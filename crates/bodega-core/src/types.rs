//! # Domain Types
//!
//! Core domain types used throughout Bodega.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │   PriceEntry    │   │ MovementReport  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (remote)    │   │  key (tuple)    │   │  id, timestamp  │       │
//! │  │  name (unique)  │   │  locality       │   │  movements[]    │       │
//! │  │  color/category │   │  amount (f64)   │   │  total units    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Locality     │   │   ChangeKind    │   │  PriceChange    │       │
//! │  │  Standard       │   │  Local          │   │  old → new      │       │
//! │  │  Local          │   │  Para Llevar    │   │  per key        │       │
//! │  └─────────────────┘   │  Costo          │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! A product has an opaque remote `id` (assigned by the backend) and a unique
//! trimmed `name`. Every local map is keyed by name; the catalog keeps the
//! id↔name mapping so change-feed rows can be resolved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::key::ItemKey;

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Identifier assigned by the backend.
    pub id: String,

    /// Display name, trimmed and unique.
    pub name: String,

    /// Display color used by the UI chips.
    #[serde(default)]
    pub color: Option<String>,

    /// Free-form category ("Cerveza", "Malta", ...).
    #[serde(default)]
    pub category: Option<String>,

    /// False once the backend reported a delete (soft delete).
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Product {
    /// Creates an active product.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Product {
            id: id.into(),
            name: name.into().trim().to_string(),
            color: None,
            category: None,
            active: true,
        }
    }

    /// Builder-style color setter.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Builder-style category setter.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

// =============================================================================
// Locality
// =============================================================================

/// Pricing mode: take-away (standard) or on-premises (local).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Locality {
    /// Take-away price ("Para Llevar").
    #[default]
    Standard,
    /// On-premises consumption price.
    Local,
}

impl Locality {
    /// Maps the backend's `is_local` flag.
    pub fn from_is_local(is_local: bool) -> Self {
        if is_local {
            Locality::Local
        } else {
            Locality::Standard
        }
    }

    /// True for on-premises pricing.
    pub fn is_local(&self) -> bool {
        matches!(self, Locality::Local)
    }
}

// =============================================================================
// Committed Entries
// =============================================================================

/// A committed price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub key: ItemKey,
    pub locality: Locality,
    pub amount: f64,
}

/// A committed cost: the total acquisition cost of one unit of the emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    pub key: ItemKey,
    pub amount: f64,
}

/// Committed stock of one product-subtype, in base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub product: String,
    pub subtype: String,
    pub quantity: i64,
}

// =============================================================================
// Movement Reports
// =============================================================================

/// One line of a movement report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub product: String,
    pub subtype: String,
    pub emission: String,
    /// Signed quantity in emission units as staged.
    pub quantity_of_emission: i64,
    /// Signed quantity converted to base units.
    pub total_base_units: i64,
}

/// An immutable record of one committed batch of inventory changes.
///
/// Uses snapshot pattern: product names and conversions are frozen at commit
/// time, later renames or rule edits do not rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MovementReport {
    pub id: String,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    pub movements: Vec<Movement>,
    /// Sum of the base-unit magnitudes of every movement.
    pub total_base_units: i64,
}

impl MovementReport {
    /// Builds a report stamped now.
    pub fn new(movements: Vec<Movement>) -> Self {
        Self::at(Utc::now(), movements)
    }

    /// Builds a report with an explicit timestamp.
    pub fn at(timestamp: DateTime<Utc>, movements: Vec<Movement>) -> Self {
        let total_base_units = movements.iter().map(|m| m.total_base_units.abs()).sum();
        MovementReport {
            id: Uuid::new_v4().to_string(),
            timestamp,
            movements,
            total_base_units,
        }
    }

    /// True when the report carries no movements.
    pub fn is_empty(&self) -> bool {
        self.movements.is_empty()
    }
}

// =============================================================================
// Price Change Reports
// =============================================================================

/// Which committed value a change touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ChangeKind {
    /// On-premises price.
    #[serde(rename = "Local")]
    Local,
    /// Take-away price.
    #[serde(rename = "Para Llevar")]
    ParaLlevar,
    /// Acquisition cost.
    #[serde(rename = "Costo")]
    Costo,
}

impl From<Locality> for ChangeKind {
    fn from(locality: Locality) -> Self {
        match locality {
            Locality::Local => ChangeKind::Local,
            Locality::Standard => ChangeKind::ParaLlevar,
        }
    }
}

/// One line of a price/cost commit report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PriceChange {
    pub beer: String,
    pub emission: String,
    pub subtype: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub old_value: f64,
    pub new_value: f64,
}

/// A persistence call that failed during a commit.
///
/// The local value was kept (optimistic-first); the backend will catch up on
/// the next full resync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CommitFailure {
    pub beer: String,
    pub emission: String,
    pub subtype: String,
    pub reason: String,
}

/// Result of committing pending prices and costs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PriceChangeReport {
    pub changes: Vec<PriceChange>,
    pub total_changes: usize,
    pub failures: Vec<CommitFailure>,
}

impl PriceChangeReport {
    /// True when nothing was pending.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
