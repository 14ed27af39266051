//! # Inventory Engine
//!
//! One handle that opens the database and wires the services from an
//! [`EngineConfig`].
//!
//! ```text
//! EngineConfig ──► Database::new(db_config)
//!                     │
//!       ┌─────────────┼──────────────┐
//!       ▼             ▼              ▼
//!  CheckoutService  TransferService  StockService
//!  (catalog, events, (catalog,       (catalog)
//!   shortages,        selector)
//!   selector)
//! ```

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::checkout::CheckoutService;
use crate::collaborators::{Catalog, DatabaseShortageRecorder, EventPublisher, ShortageRecorder};
use crate::config::EngineConfig;
use crate::error::InventoryResult;
use crate::selector::BatchSelector;
use crate::stock::StockService;
use crate::transfer::{TransferReceipt, TransferService};
use larder_core::{Batch, Bill, CartItem, DiscountPolicy, Money, Quote, StockLocation};
use larder_db::Database;

/// Entry point for embedding applications.
#[derive(Debug, Clone)]
pub struct InventoryEngine {
    db: Database,
    config: EngineConfig,
    checkout: CheckoutService,
    transfers: TransferService,
    stock: StockService,
}

impl InventoryEngine {
    /// Opens the configured database and builds the services.
    ///
    /// Without a `shortages` recorder, notices go to the database's
    /// `notify_shortage` table.
    pub async fn connect(
        config: EngineConfig,
        catalog: Arc<dyn Catalog>,
        publisher: Arc<dyn EventPublisher>,
        shortages: Option<Arc<dyn ShortageRecorder>>,
    ) -> InventoryResult<Self> {
        config.validate()?;

        let db = Database::new(config.db_config()).await?;
        let shortages: Arc<dyn ShortageRecorder> = match shortages {
            Some(recorder) => recorder,
            None => Arc::new(DatabaseShortageRecorder::new(db.shortages())),
        };
        let selector = BatchSelector::new(config.selection.policy);

        let checkout = CheckoutService::new(db.clone(), catalog.clone(), publisher, shortages)
            .with_selector(selector)
            .with_locations(
                config.checkout.primary_location,
                config.checkout.fallback_location,
            )
            .with_low_stock_threshold(config.checkout.low_stock_threshold);
        let transfers = TransferService::new(db.clone(), catalog.clone()).with_selector(selector);
        let stock = StockService::new(db.clone(), catalog);

        info!(
            policy = %config.selection.policy,
            scope = %config.checkout.scope,
            "Inventory engine ready"
        );

        Ok(InventoryEngine {
            db,
            config,
            checkout,
            transfers,
            stock,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// See [`CheckoutService::checkout`].
    pub async fn checkout(
        &self,
        cart: &[CartItem],
        cash: Money,
        location: StockLocation,
        discount: &dyn DiscountPolicy,
        scope: &str,
    ) -> InventoryResult<Bill> {
        self.checkout
            .checkout(cart, cash, location, discount, scope)
            .await
    }

    /// Checkout at the configured primary location and scope.
    pub async fn checkout_at_counter(
        &self,
        cart: &[CartItem],
        cash: Money,
        discount: &dyn DiscountPolicy,
    ) -> InventoryResult<Bill> {
        self.checkout
            .checkout(
                cart,
                cash,
                self.config.checkout.primary_location,
                discount,
                &self.config.checkout.scope,
            )
            .await
    }

    pub async fn quote(
        &self,
        cart: &[CartItem],
        discount: &dyn DiscountPolicy,
    ) -> InventoryResult<Quote> {
        self.checkout.quote(cart, discount).await
    }

    // =========================================================================
    // Stock
    // =========================================================================

    pub async fn transfer(
        &self,
        product_code: &str,
        from: StockLocation,
        to: StockLocation,
        quantity: i64,
    ) -> InventoryResult<TransferReceipt> {
        self.transfers.transfer(product_code, from, to, quantity).await
    }

    pub async fn receive(
        &self,
        product_code: &str,
        quantity: i64,
        expiry: Option<NaiveDate>,
        location: StockLocation,
    ) -> InventoryResult<Batch> {
        self.stock
            .receive_at(product_code, quantity, expiry, location)
            .await
    }

    pub async fn available_quantity(
        &self,
        product_code: &str,
        location: StockLocation,
    ) -> InventoryResult<i64> {
        self.stock.available_quantity(product_code, location).await
    }

    pub async fn availability_across_locations(
        &self,
        product_code: &str,
    ) -> InventoryResult<BTreeMap<StockLocation, i64>> {
        self.stock.availability_across_locations(product_code).await
    }

    /// Products below `threshold` at `location`; the configured threshold
    /// when `None`.
    pub async fn low_stock_report(
        &self,
        location: StockLocation,
        threshold: Option<i64>,
    ) -> InventoryResult<Vec<(String, i64)>> {
        let threshold = threshold.unwrap_or(self.config.checkout.low_stock_threshold);
        self.stock.low_stock_report(location, threshold).await
    }

    pub fn stock(&self) -> &StockService {
        &self.stock
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}
