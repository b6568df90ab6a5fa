//! # bodega-store: Persistence Seam for Bodega
//!
//! The engine never talks to a database directly. Everything it reads or
//! writes goes through the [`Backend`] trait defined here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bodega Data Flow                                 │
//! │                                                                         │
//! │  Engine::commit_price_changes()                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   bodega-store (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Backend     │    │     Rows      │    │ MemoryBackend│   │   │
//! │  │   │ (backend.rs)  │    │   (rows.rs)   │    │ (memory.rs)  │   │   │
//! │  │   │               │    │               │    │              │   │   │
//! │  │   │ fetch_*       │    │ ProductRow    │    │ BTreeMap     │   │   │
//! │  │   │ upsert_*      │◄───│ PriceRow ...  │    │ tables +     │   │   │
//! │  │   │ create_*      │    │ ReportRow     │    │ fault inject │   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`backend`] - The `Backend` trait
//! - [`rows`] - Wire row types
//! - [`memory`] - In-memory implementation
//! - [`error`] - Store error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bodega_store::{Backend, MemoryBackend};
//!
//! let backend = MemoryBackend::new();
//! let products = backend.fetch_catalog("org-1").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backend;
pub mod error;
pub mod memory;
pub mod rows;

// =============================================================================
// Re-exports
// =============================================================================

pub use backend::Backend;
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryBackend, Operation};
pub use rows::{
    CostRow, EmissionRow, InventoryRow, NewProduct, PriceRow, ProductRow, ReportRow, SettingRow,
};
