//! # Change Feed Messages
//!
//! The shape of one event on the backend's live change feed.
//!
//! ## Wire Format
//! ```json
//! {
//!   "eventType": "UPDATE",
//!   "table": "prices",
//!   "new": { "organization_id": "org-1", "product_id": "p-1", ... },
//!   "old": { "organization_id": "org-1", "product_id": "p-1", ... }
//! }
//! ```
//!
//! ## Streams
//! ```text
//! ┌──────────────┬───────────────────────────┬──────────────────────────────┐
//! │ table        │ INSERT / UPDATE (new)     │ DELETE (old)                 │
//! ├──────────────┼───────────────────────────┼──────────────────────────────┤
//! │ products     │ upsert, maybe rename      │ soft delete by id            │
//! │ inventory    │ overwrite base stock      │ drop stock record            │
//! │ prices       │ overwrite price           │ drop price                   │
//! │ cost_prices  │ overwrite cost            │ drop cost                    │
//! │ emissions    │ upsert conversion rule    │ drop conversion rule         │
//! │ settings     │ apply setting             │ reset setting to default     │
//! └──────────────┴───────────────────────────┴──────────────────────────────┘
//! ```
//!
//! Inserts usually carry an empty `old` object and deletes often carry only
//! the key columns in `old`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Event Type / Table
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Insert,
    Update,
    Delete,
}

impl EventType {
    pub fn is_delete(&self) -> bool {
        matches!(self, EventType::Delete)
    }
}

/// Tables the engine subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Products,
    Inventory,
    Prices,
    CostPrices,
    Emissions,
    Settings,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Products => "products",
            Table::Inventory => "inventory",
            Table::Prices => "prices",
            Table::CostPrices => "cost_prices",
            Table::Emissions => "emissions",
            Table::Settings => "settings",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Change Event
// =============================================================================

/// One row-level change pushed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub event_type: EventType,
    pub table: Table,
    #[serde(default)]
    pub new: Option<Value>,
    #[serde(default)]
    pub old: Option<Value>,
}

impl ChangeEvent {
    pub fn insert<T: Serialize>(table: Table, row: &T) -> EngineResult<Self> {
        Ok(ChangeEvent {
            event_type: EventType::Insert,
            table,
            new: Some(serde_json::to_value(row)?),
            old: None,
        })
    }

    pub fn update<T: Serialize>(table: Table, row: &T) -> EngineResult<Self> {
        Ok(ChangeEvent {
            event_type: EventType::Update,
            table,
            new: Some(serde_json::to_value(row)?),
            old: None,
        })
    }

    pub fn delete<T: Serialize>(table: Table, row: &T) -> EngineResult<Self> {
        Ok(ChangeEvent {
            event_type: EventType::Delete,
            table,
            new: None,
            old: Some(serde_json::to_value(row)?),
        })
    }

    /// The payload that describes the row: `old` for deletes, `new` otherwise.
    pub fn payload(&self) -> EngineResult<&Value> {
        let payload = if self.event_type.is_delete() {
            self.old.as_ref()
        } else {
            self.new.as_ref()
        };

        match payload {
            Some(value) if value.as_object().is_some_and(|o| !o.is_empty()) => Ok(value),
            _ => Err(EngineError::InvalidEvent(format!(
                "{:?} on {} without a row payload",
                self.event_type, self.table
            ))),
        }
    }

    /// Decodes the payload into a row type.
    pub fn record<T: DeserializeOwned>(&self) -> EngineResult<T> {
        let payload = self.payload()?;
        serde_json::from_value(payload.clone()).map_err(|e| {
            EngineError::DeserializationFailed(format!("{} row: {}", self.table, e))
        })
    }

    /// Organization column of the payload, when present.
    pub fn organization_id(&self) -> Option<&str> {
        self.payload()
            .ok()
            .and_then(|payload| payload.get("organization_id"))
            .and_then(Value::as_str)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json).map_err(EngineError::from)
    }
}
