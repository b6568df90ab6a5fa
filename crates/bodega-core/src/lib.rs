//! # bodega-core: Pure Domain Logic for Bodega
//!
//! Product catalog, unit conversions, prices, costs, stock and movement
//! history of a beverage shop, as plain data structures with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bodega Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 bodega-engine (Orchestration)                   │   │
//! │  │   Engine (commits) ◄── Reconciler (change feed) ── config       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bodega-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │    key    │  │conversion │  │  ledger   │  │  pending  │   │   │
//! │  │   │  ItemKey  │  │ units per │  │  prices   │  │  staged   │   │   │
//! │  │   │  codec    │  │ emission  │  │  costs    │  │  edits    │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │ inventory │  │  history  │  │  catalog  │  │   state   │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO BACKEND • NO NETWORK • NO LOGGING                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                bodega-store (Persistence seam)                  │   │
//! │  │           Backend trait, wire rows, MemoryBackend               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`key`] - Structured keys and their string codec
//! - [`conversion`] - Units per emission (Caja, Six Pack, custom packs)
//! - [`ledger`] - Committed prices/costs and cost derivation
//! - [`pending`] - Uncommitted edits in staging order
//! - [`inventory`] - Stock in base units, never negative
//! - [`history`] - Bounded movement report logs
//! - [`catalog`] - Products by name and by backend id
//! - [`settings`] - Business settings rows
//! - [`state`] - The aggregate guarded by the engine
//! - [`snapshot`] - On-disk cache model
//!
//! ## Example Usage
//!
//! ```rust
//! use bodega_core::{ConversionTable, ItemKey, Ledger};
//!
//! let conversions = ConversionTable::new();
//! let mut ledger = Ledger::new();
//! ledger.set_cost(ItemKey::new("Polar", "Caja", "Botella"), 36.0);
//!
//! // A case of bottles holds 36 units, so one unit costs 1.00
//! let unit = ItemKey::new("Polar", "Unidad", "Botella");
//! assert_eq!(ledger.get_cost_price(&unit, &conversions), 1.0);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod conversion;
pub mod error;
pub mod history;
pub mod inventory;
pub mod key;
pub mod ledger;
pub mod pending;
pub mod settings;
pub mod snapshot;
pub mod state;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use catalog::{Catalog, CatalogChange};
pub use conversion::{ConversionTable, EmissionRecord};
pub use error::{CoreError, CoreResult, ValidationError};
pub use history::HistoryLog;
pub use inventory::InventoryStore;
pub use key::{ConversionKey, ItemKey, PriceKey, StockKey};
pub use ledger::Ledger;
pub use pending::{ChangeTarget, PendingBuffer, PlannedChange};
pub use settings::BusinessSettings;
pub use snapshot::CacheSnapshot;
pub use state::{DomainState, MovementCommit, PriceCommit};
pub use types::*;
