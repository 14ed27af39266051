//! # larder-engine: Checkout and Transfer Orchestration
//!
//! Use cases over the larder-core rules and the larder-db ledger.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       larder-engine (THIS CRATE)                        │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                InventoryEngine (facade, config-driven)           │  │
//! │  └───────┬──────────────────────┬───────────────────────┬───────────┘  │
//! │          ▼                      ▼                       ▼              │
//! │  ┌────────────────┐   ┌────────────────┐   ┌──────────────────────┐   │
//! │  │CheckoutService │   │TransferService │   │    StockService      │   │
//! │  │                │   │                │   │                      │   │
//! │  │ serial → bill  │   │ MAIN → SHELF   │   │ receive, availability│   │
//! │  │ → deductions   │   │ expiry follows │   │ low-stock report     │   │
//! │  │ SHELF → WEB    │   │ the stock      │   │                      │   │
//! │  └───────┬────────┘   └───────┬────────┘   └──────────────────────┘   │
//! │          └──────────┬─────────┘                                        │
//! │                     ▼                                                  │
//! │            BatchSelector (FEFO / FIFO over StockLedger)                │
//! │                                                                         │
//! │  Collaborators: Catalog • EventPublisher • ShortageRecorder            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`checkout`] - The checkout transaction with cascading fulfilment
//! - [`transfer`] - Manual location-to-location moves
//! - [`stock`] - Receiving and read-side queries
//! - [`selector`] - Policy-ordered deduction (`deduct`, `deduct_up_to`)
//! - [`collaborators`] - Catalog, event and shortage seams
//! - [`engine`] - Facade wiring everything from [`config::EngineConfig`]
//! - [`config`] - TOML + environment configuration
//! - [`error`] - The `InventoryError` taxonomy
//! - [`logging`] - Tracing subscriber setup for binaries

pub mod checkout;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod selector;
pub mod stock;
pub mod transfer;

pub use checkout::CheckoutService;
pub use collaborators::{
    BroadcastPublisher, Catalog, CatalogEntry, DatabaseShortageRecorder, EventPublisher,
    InMemoryCatalog, ShortageRecorder, TracingPublisher,
};
pub use config::EngineConfig;
pub use engine::InventoryEngine;
pub use error::{ErrorKind, InventoryError, InventoryResult};
pub use selector::BatchSelector;
pub use stock::StockService;
pub use transfer::{TransferReceipt, TransferService};
