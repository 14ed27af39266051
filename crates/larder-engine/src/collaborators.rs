//! # Collaborator Seams
//!
//! Interfaces the engine consumes but does not own.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          CheckoutService                                │
//! │                                                                         │
//! │   Catalog ──────────── name + unit price per product code               │
//! │   DiscountPolicy ───── discount for the priced lines (larder-core)      │
//! │   EventPublisher ───── low-stock events, after commit                   │
//! │   ShortageRecorder ─── manager notices, after rollback                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each seam ships with a small in-process implementation so the engine
//! runs end to end without external systems.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::InventoryResult;
use larder_core::{LowStockEvent, Money};
use larder_db::ShortageRepository;

// =============================================================================
// Catalog
// =============================================================================

/// Display name and current unit price of a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub unit_price: Money,
}

/// Product master data lookup.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// `Ok(None)` when the code is not in the catalog.
    async fn price_and_name(&self, product_code: &str) -> InventoryResult<Option<CatalogEntry>>;
}

/// Fixed catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub fn with_product(mut self, code: &str, name: &str, unit_price_cents: i64) -> Self {
        self.entries.insert(
            code.to_string(),
            CatalogEntry {
                name: name.to_string(),
                unit_price: Money::from_cents(unit_price_cents),
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn price_and_name(&self, product_code: &str) -> InventoryResult<Option<CatalogEntry>> {
        Ok(self.entries.get(product_code).cloned())
    }
}

// =============================================================================
// Event Publisher
// =============================================================================

/// Fire-and-forget sink for low-stock events.
///
/// Publishing cannot fail from the caller's point of view; implementations
/// swallow and log their own delivery problems.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: LowStockEvent);
}

/// Fans events out to every live subscriber.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<LowStockEvent>,
}

impl BroadcastPublisher {
    /// `capacity` bounds how far a slow subscriber may lag before it starts
    /// missing events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        BroadcastPublisher { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LowStockEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: LowStockEvent) {
        // No subscribers is not an error.
        if self.sender.send(event).is_err() {
            debug!("Low-stock event dropped: no subscribers");
        }
    }
}

/// Writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPublisher;

impl EventPublisher for TracingPublisher {
    fn publish(&self, event: LowStockEvent) {
        warn!(
            product_code = %event.product_code,
            location = %event.location,
            remaining = event.remaining,
            threshold = event.threshold,
            "Low stock"
        );
    }
}

// =============================================================================
// Shortage Recorder
// =============================================================================

/// Destination for manager-visible shortage alerts.
#[async_trait]
pub trait ShortageRecorder: Send + Sync {
    async fn record(&self, message: &str) -> InventoryResult<()>;
}

/// Stores notices in the `notify_shortage` table.
#[derive(Debug, Clone)]
pub struct DatabaseShortageRecorder {
    repo: ShortageRepository,
}

impl DatabaseShortageRecorder {
    pub fn new(repo: ShortageRepository) -> Self {
        DatabaseShortageRecorder { repo }
    }
}

#[async_trait]
impl ShortageRecorder for DatabaseShortageRecorder {
    async fn record(&self, message: &str) -> InventoryResult<()> {
        self.repo.record(message).await?;
        Ok(())
    }
}
