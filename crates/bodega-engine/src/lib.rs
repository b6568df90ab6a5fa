//! # bodega-engine: Runtime for Bodega
//!
//! Wires the pure domain state of `bodega-core` to a persistence backend and
//! to the backend's live change feed.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Engine Architecture                              │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  Engine<B: Backend>                              │  │
//! │  │                                                                  │  │
//! │  │  Arc<Mutex<DomainState>>  ◄── one writer at a time               │  │
//! │  │  stage_* / commit_* / queries / load / cache                     │  │
//! │  └───────────────┬───────────────────────────────┬──────────────────┘  │
//! │                  │                               │                      │
//! │                  ▼                               ▼                      │
//! │  ┌────────────────────────────┐   ┌────────────────────────────────┐   │
//! │  │ Backend (bodega-store)     │   │ Reconciler (tokio task)        │   │
//! │  │                            │   │                                │   │
//! │  │ upserts after each commit  │   │ mpsc<ChangeEvent> from the     │   │
//! │  │ full fetch on load()       │   │ feed; last write wins          │   │
//! │  └────────────────────────────┘   └────────────────────────────────┘   │
//! │                                                                         │
//! │  EngineConfig (TOML + env)  ·  cache.json snapshot  ·  tracing          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - `Engine` orchestration and commit reports
//! - [`reconcile`] - Change-feed reconciler task
//! - [`protocol`] - Change event wire format
//! - [`config`] - Engine configuration
//! - [`cache`] - Cache file I/O
//! - [`telemetry`] - Tracing subscriber setup
//! - [`error`] - Engine error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bodega_core::{ItemKey, Locality};
//! use bodega_engine::{Engine, EngineConfig};
//! use bodega_store::MemoryBackend;
//!
//! let engine = Engine::new(Arc::new(MemoryBackend::new()), EngineConfig::load_or_default(None));
//! engine.load().await?;
//!
//! let (feed, _task) = engine.spawn_reconciler();
//!
//! engine.stage_price(ItemKey::new("Polar", "Unidad", "Botella"), Locality::Local, 1.5).await;
//! let report = engine.commit_price_changes().await;
//! println!("{} changes, {} not persisted", report.total_changes, report.failures.len());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod reconcile;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::EngineConfig;
pub use engine::{Engine, LoadSummary, SharedState, StockCommitReport};
pub use error::{EngineError, EngineResult};
pub use protocol::{ChangeEvent, EventType, Table};
pub use reconcile::{apply_change, Applied, Reconciler, ReconcilerHandle, SkipReason};
pub use telemetry::init_tracing;
