//! # Checkout
//!
//! Turns a cart into a committed bill and the matching stock deductions.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            checkout()                                   │
//! │                                                                         │
//! │  Validate ─── scope, cart, cash                        (no transaction) │
//! │     │                                                                   │
//! │  PriceLines ─ catalog + discount policy, cash ≥ total  (no transaction) │
//! │     │                                                                   │
//! │  ┌──▼──────────────────── UnitOfWork ────────────────────────────────┐ │
//! │  │ AllocateSerial ── SequenceGenerator::next(scope)                  │ │
//! │  │ PersistBill ───── bill + lines                                    │ │
//! │  │ DeductInventory ─ per line:                                       │ │
//! │  │     primary:  deduct_up_to(SHELF) then deduct(WEB, shortfall)     │ │
//! │  │     other:    deduct(location)                                    │ │
//! │  │     primary remaining < threshold? ─► queue LowStockEvent         │ │
//! │  └──┬──────────────────────────────────────────────┬─────────────────┘ │
//! │     │ Ok                                            │ Err              │
//! │  Commit ─► publish queued events          Rollback ─► record shortage  │
//! │                                                      (InsufficientStock)│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Either the bill, its lines and every deduction become visible together,
//! or none of them do.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::collaborators::{Catalog, EventPublisher, ShortageRecorder};
use crate::error::{InventoryError, InventoryResult};
use crate::selector::BatchSelector;
use larder_core::validation::{validate_cart, validate_cash_cents, validate_scope};
use larder_core::{
    Bill, BillLine, CartItem, DiscountPolicy, LowStockEvent, Money, Quote, StockLocation,
    ValidationError, DEFAULT_LOW_STOCK_THRESHOLD,
};
use larder_db::{Database, UnitOfWork};

/// Runs checkouts against one database.
#[derive(Clone)]
pub struct CheckoutService {
    db: Database,
    catalog: Arc<dyn Catalog>,
    publisher: Arc<dyn EventPublisher>,
    shortages: Arc<dyn ShortageRecorder>,
    selector: BatchSelector,
    primary: StockLocation,
    fallback: StockLocation,
    low_stock_threshold: i64,
}

impl CheckoutService {
    /// Creates a service selling from SHELF with WEB as fallback.
    pub fn new(
        db: Database,
        catalog: Arc<dyn Catalog>,
        publisher: Arc<dyn EventPublisher>,
        shortages: Arc<dyn ShortageRecorder>,
    ) -> Self {
        CheckoutService {
            db,
            catalog,
            publisher,
            shortages,
            selector: BatchSelector::default(),
            primary: StockLocation::Shelf,
            fallback: StockLocation::Web,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }

    pub fn with_selector(mut self, selector: BatchSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Sets the location whose shortfalls cascade, and where they cascade to.
    pub fn with_locations(mut self, primary: StockLocation, fallback: StockLocation) -> Self {
        self.primary = primary;
        self.fallback = fallback;
        self
    }

    pub fn with_low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    pub fn primary_location(&self) -> StockLocation {
        self.primary
    }

    // =========================================================================
    // Pricing
    // =========================================================================

    /// Prices a cart without touching storage.
    pub async fn quote(
        &self,
        cart: &[CartItem],
        discount: &dyn DiscountPolicy,
    ) -> InventoryResult<Quote> {
        validate_cart(cart)?;
        let lines = self.price_lines(cart).await?;
        Ok(Quote::price(lines, discount)?)
    }

    async fn price_lines(&self, cart: &[CartItem]) -> InventoryResult<Vec<BillLine>> {
        let mut lines = Vec::with_capacity(cart.len());

        for item in cart {
            let entry = self
                .catalog
                .price_and_name(&item.product_code)
                .await?
                .ok_or_else(|| ValidationError::UnknownProduct {
                    code: item.product_code.clone(),
                })?;

            lines.push(BillLine::new(
                item.product_code.clone(),
                entry.name,
                item.quantity,
                entry.unit_price,
            )?);
        }

        Ok(lines)
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Sells `cart` from `location` and returns the committed bill.
    ///
    /// ## Errors
    /// - `Validation`: blank scope, bad cart, unknown product, discount
    ///   larger than the subtotal, cash below total
    /// - `InsufficientStock`: a line could not be covered; a shortage notice
    ///   is recorded after the rollback
    /// - `ConcurrencyConflict`: another checkout drained a planned batch first
    /// - `Persistence`: storage failure, including an unseeded scope
    pub async fn checkout(
        &self,
        cart: &[CartItem],
        cash: Money,
        location: StockLocation,
        discount: &dyn DiscountPolicy,
        scope: &str,
    ) -> InventoryResult<Bill> {
        let span = info_span!("checkout", scope, location = %location, lines = cart.len());

        self.run_checkout(cart, cash, location, discount, scope)
            .instrument(span)
            .await
    }

    async fn run_checkout(
        &self,
        cart: &[CartItem],
        cash: Money,
        location: StockLocation,
        discount: &dyn DiscountPolicy,
        scope: &str,
    ) -> InventoryResult<Bill> {
        validate_scope(scope)?;
        validate_cash_cents(cash.cents())?;
        let quote = self.quote(cart, discount).await?;

        // Fail on cash before taking the write lock.
        if cash < quote.total {
            return Err(ValidationError::InsufficientCash {
                total_cents: quote.total.cents(),
                cash_cents: cash.cents(),
            }
            .into());
        }

        let mut uow = self.db.begin_write().await?;
        let mut low_stock = Vec::new();

        match self
            .record_sale(&mut uow, quote, cash, location, scope, &mut low_stock)
            .await
        {
            Ok(bill) => {
                uow.commit().await?;

                info!(
                    serial = bill.serial(),
                    total = %bill.total(),
                    change = %bill.change(),
                    "Checkout committed"
                );

                for event in low_stock {
                    self.publisher.publish(event);
                }

                Ok(bill)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed; connection discarded");
                }
                warn!(error = %err, "Checkout rolled back");

                if let InventoryError::InsufficientStock { .. } = &err {
                    self.note_shortage(&err).await;
                }

                Err(err)
            }
        }
    }

    /// Everything that must commit or roll back together.
    async fn record_sale(
        &self,
        uow: &mut UnitOfWork,
        quote: Quote,
        cash: Money,
        location: StockLocation,
        scope: &str,
        low_stock: &mut Vec<LowStockEvent>,
    ) -> InventoryResult<Bill> {
        let serial = uow.sequences().next(scope).await?;
        debug!(serial = %serial, "Serial allocated");

        let bill = Bill::issue(serial, Utc::now(), quote, cash)?;
        let bill = uow.bills().insert(bill).await?;

        for line in bill.lines() {
            if let Some(event) = self
                .deduct_line(uow, line.product_code(), line.quantity(), location)
                .await?
            {
                low_stock.push(event);
            }
        }

        Ok(bill)
    }

    /// Deducts one line. Returns a low-stock event when the primary location
    /// ends up below the threshold.
    async fn deduct_line(
        &self,
        uow: &mut UnitOfWork,
        product_code: &str,
        quantity: i64,
        location: StockLocation,
    ) -> InventoryResult<Option<LowStockEvent>> {
        let mut ledger = uow.ledger();

        if location != self.primary {
            self.selector
                .deduct(&mut ledger, product_code, quantity, location)
                .await?;
            return Ok(None);
        }

        let from_primary = self
            .selector
            .deduct_up_to(&mut ledger, product_code, quantity, self.primary)
            .await?;
        let shortfall = quantity - from_primary;

        if shortfall > 0 {
            debug!(
                product_code,
                from_primary,
                shortfall,
                fallback = %self.fallback,
                "Cascading to fallback location"
            );
            self.selector
                .deduct(&mut ledger, product_code, shortfall, self.fallback)
                .await?;
        }

        let remaining = ledger.total_available(product_code, self.primary).await?;
        if remaining < self.low_stock_threshold {
            return Ok(Some(LowStockEvent {
                product_code: product_code.to_string(),
                location: self.primary,
                remaining,
                threshold: self.low_stock_threshold,
            }));
        }

        Ok(None)
    }

    /// Records a manager notice. Failures are logged, never returned: the
    /// caller already has the error that matters.
    async fn note_shortage(&self, err: &InventoryError) {
        let message = format!("Checkout failed: {err}");

        match self.shortages.record(&message).await {
            Ok(()) => info!("Shortage notice recorded"),
            Err(record_err) => warn!(error = %record_err, "Failed to record shortage notice"),
        }
    }
}

impl std::fmt::Debug for CheckoutService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutService")
            .field("selector", &self.selector)
            .field("primary", &self.primary)
            .field("fallback", &self.fallback)
            .field("low_stock_threshold", &self.low_stock_threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{BroadcastPublisher, DatabaseShortageRecorder, InMemoryCatalog};
    use crate::error::ErrorKind;
    use chrono::{Duration, NaiveDate};
    use larder_core::{NewBatch, NoDiscount, PercentDiscount};
    use larder_db::{DbConfig, DbError};

    fn catalog() -> Arc<InMemoryCatalog> {
        Arc::new(
            InMemoryCatalog::new()
                .with_product("CLN003", "Floor Cleaner", 2000)
                .with_product("MLK001", "Milk 1L", 250),
        )
    }

    async fn service_on(db: Database) -> (CheckoutService, BroadcastPublisher) {
        let publisher = BroadcastPublisher::new(16);
        let service = CheckoutService::new(
            db.clone(),
            catalog(),
            Arc::new(publisher.clone()),
            Arc::new(DatabaseShortageRecorder::new(db.shortages())),
        );
        (service, publisher)
    }

    async fn setup() -> (Database, CheckoutService, BroadcastPublisher) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (service, publisher) = service_on(db.clone()).await;
        (db, service, publisher)
    }

    async fn stock(db: &Database, code: &str, location: StockLocation, expiry: Option<NaiveDate>, qty: i64) {
        let mut uow = db.begin().await.unwrap();
        uow.ledger()
            .insert_batch(&NewBatch {
                product_code: code.into(),
                location,
                received_at: Utc::now() - Duration::days(1),
                expiry,
                quantity: qty,
            })
            .await
            .unwrap();
        uow.commit().await.unwrap();
    }

    async fn available(db: &Database, code: &str, location: StockLocation) -> i64 {
        let mut uow = db.begin().await.unwrap();
        let total = uow.ledger().total_available(code, location).await.unwrap();
        uow.rollback().await.unwrap();
        total
    }

    async fn bill_count(db: &Database) -> i64 {
        let mut uow = db.begin().await.unwrap();
        let count = uow.bills().count().await.unwrap();
        uow.rollback().await.unwrap();
        count
    }

    #[tokio::test]
    async fn test_checkout_commits_bill_and_deductions() {
        let (db, service, _) = setup().await;
        stock(&db, "CLN003", StockLocation::Shelf, NaiveDate::from_ymd_opt(2030, 1, 1), 10).await;
        stock(&db, "CLN003", StockLocation::Shelf, None, 5).await;

        let bill = service
            .checkout(
                &[CartItem::new("CLN003", 12)],
                Money::from_cents(30000),
                StockLocation::Shelf,
                &NoDiscount,
                "COUNTER",
            )
            .await
            .unwrap();

        assert_eq!(bill.serial(), "C-000001");
        assert!(bill.id().is_some());
        assert_eq!(bill.total().cents(), 24000);
        assert_eq!(bill.change().cents(), 6000);
        assert_eq!(available(&db, "CLN003", StockLocation::Shelf).await, 3);

        let mut uow = db.begin().await.unwrap();
        let quantities: Vec<i64> = uow
            .ledger()
            .list_batches(Some("CLN003"), Some(StockLocation::Shelf))
            .await
            .unwrap()
            .iter()
            .map(|b| b.quantity)
            .collect();
        assert_eq!(quantities, vec![0, 3]);

        let stored = uow.bills().find_by_serial("C-000001").await.unwrap().unwrap();
        assert_eq!(stored.lines().len(), 1);
        assert_eq!(stored.lines()[0].quantity(), 12);
        uow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_cash_must_cover_discounted_total() {
        let (db, service, _) = setup().await;
        stock(&db, "CLN003", StockLocation::Shelf, None, 60).await;

        let cart = [CartItem::new("CLN003", 5)];
        let ten_percent = PercentDiscount::new(10).unwrap();

        let err = service
            .checkout(&cart, Money::from_cents(8000), StockLocation::Shelf, &ten_percent, "COUNTER")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::Validation(ValidationError::InsufficientCash {
                total_cents: 9000,
                cash_cents: 8000
            })
        ));
        assert_eq!(available(&db, "CLN003", StockLocation::Shelf).await, 60);

        let bill = service
            .checkout(&cart, Money::from_cents(9000), StockLocation::Shelf, &ten_percent, "COUNTER")
            .await
            .unwrap();
        assert_eq!(bill.subtotal().cents(), 10000);
        assert_eq!(bill.discount().cents(), 1000);
        assert_eq!(bill.change().cents(), 0);

        // The rejected attempt never reached the counter
        assert_eq!(bill.serial(), "C-000001");
    }

    #[tokio::test]
    async fn test_cascade_covers_shortfall_from_fallback() {
        let (db, service, _) = setup().await;
        stock(&db, "CLN003", StockLocation::Shelf, None, 3).await;
        stock(&db, "CLN003", StockLocation::Web, None, 10).await;

        service
            .checkout(
                &[CartItem::new("CLN003", 5)],
                Money::from_cents(10000),
                StockLocation::Shelf,
                &NoDiscount,
                "COUNTER",
            )
            .await
            .unwrap();

        assert_eq!(available(&db, "CLN003", StockLocation::Shelf).await, 0);
        assert_eq!(available(&db, "CLN003", StockLocation::Web).await, 8);
    }

    #[tokio::test]
    async fn test_cascade_failure_changes_nothing_and_records_shortage() {
        let (db, service, _) = setup().await;
        stock(&db, "CLN003", StockLocation::Shelf, None, 3).await;
        stock(&db, "CLN003", StockLocation::Web, None, 1).await;

        let err = service
            .checkout(
                &[CartItem::new("CLN003", 5)],
                Money::from_cents(10000),
                StockLocation::Shelf,
                &NoDiscount,
                "COUNTER",
            )
            .await
            .unwrap_err();

        match &err {
            InventoryError::InsufficientStock {
                location,
                requested,
                available,
                ..
            } => {
                assert_eq!(*location, StockLocation::Web);
                assert_eq!(*requested, 2);
                assert_eq!(*available, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(available(&db, "CLN003", StockLocation::Shelf).await, 3);
        assert_eq!(available(&db, "CLN003", StockLocation::Web).await, 1);
        assert_eq!(bill_count(&db).await, 0);

        let notices = db.shortages().list().await.unwrap();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].message.contains("CLN003"));

        // The serial was not consumed either
        let mut uow = db.begin().await.unwrap();
        assert_eq!(uow.sequences().peek("COUNTER").await.unwrap(), 1);
        uow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_primary_location_is_strict() {
        let (db, service, _) = setup().await;
        stock(&db, "CLN003", StockLocation::Web, None, 2).await;
        stock(&db, "CLN003", StockLocation::MainStore, None, 50).await;

        let err = service
            .checkout(
                &[CartItem::new("CLN003", 3)],
                Money::from_cents(10000),
                StockLocation::Web,
                &NoDiscount,
                "WEB",
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);

        let bill = service
            .checkout(
                &[CartItem::new("CLN003", 2)],
                Money::from_cents(10000),
                StockLocation::Web,
                &NoDiscount,
                "WEB",
            )
            .await
            .unwrap();
        assert_eq!(bill.serial(), "W-000001");
        assert_eq!(available(&db, "CLN003", StockLocation::Web).await, 0);
        assert_eq!(available(&db, "CLN003", StockLocation::MainStore).await, 50);
    }

    #[tokio::test]
    async fn test_low_stock_published_after_commit_only() {
        let (db, service, publisher) = setup().await;
        let mut events = publisher.subscribe();
        stock(&db, "MLK001", StockLocation::Shelf, None, 60).await;

        // Second line cannot be covered anywhere: the whole sale rolls back
        let err = service
            .checkout(
                &[CartItem::new("MLK001", 15), CartItem::new("CLN003", 1)],
                Money::from_cents(10000),
                StockLocation::Shelf,
                &NoDiscount,
                "COUNTER",
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert!(events.try_recv().is_err());
        assert_eq!(available(&db, "MLK001", StockLocation::Shelf).await, 60);

        service
            .checkout(
                &[CartItem::new("MLK001", 15)],
                Money::from_cents(10000),
                StockLocation::Shelf,
                &NoDiscount,
                "COUNTER",
            )
            .await
            .unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.product_code, "MLK001");
        assert_eq!(event.location, StockLocation::Shelf);
        assert_eq!(event.remaining, 45);
        assert_eq!(event.threshold, 50);
    }

    #[tokio::test]
    async fn test_scope_errors() {
        let (db, service, _) = setup().await;
        stock(&db, "CLN003", StockLocation::Shelf, None, 10).await;
        let cart = [CartItem::new("CLN003", 1)];

        let err = service
            .checkout(&cart, Money::from_cents(5000), StockLocation::Shelf, &NoDiscount, "  ")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = service
            .checkout(&cart, Money::from_cents(5000), StockLocation::Shelf, &NoDiscount, "NOPE")
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Persistence(DbError::NotFound { .. })));
        assert_eq!(available(&db, "CLN003", StockLocation::Shelf).await, 10);
        assert_eq!(bill_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_cart_validation() {
        let (_db, service, _) = setup().await;

        let err = service
            .checkout(&[], Money::from_cents(100), StockLocation::Shelf, &NoDiscount, "COUNTER")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = service
            .quote(&[CartItem::new("CLN003", 0)], &NoDiscount)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = service
            .quote(&[CartItem::new("GHOST9", 1)], &NoDiscount)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::Validation(ValidationError::UnknownProduct { .. })
        ));
    }

    #[tokio::test]
    async fn test_quote_prices_without_storage() {
        let (db, service, _) = setup().await;

        let quote = service
            .quote(
                &[CartItem::new("CLN003", 2), CartItem::new("MLK001", 4)],
                &PercentDiscount::new(50).unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(quote.subtotal.cents(), 5000);
        assert_eq!(quote.discount.cents(), 2500);
        assert_eq!(quote.total.cents(), 2500);
        assert_eq!(quote.lines[1].name(), "Milk 1L");
        assert_eq!(bill_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_oversized_lines_are_rejected_before_storage() {
        let (db, service, _) = setup().await;
        stock(&db, "CLN003", StockLocation::Shelf, None, 10).await;

        let err = service
            .quote(&[CartItem::new("CLN003", 5_000_000_000_000_000)], &NoDiscount)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::Validation(ValidationError::OutOfRange { ref field, .. }) if field == "quantity"
        ));

        // within the quantity cap, but the line total still overflows
        let pricey = CheckoutService::new(
            db.clone(),
            Arc::new(InMemoryCatalog::new().with_product("GLD001", "Gold bar", i64::MAX / 2)),
            Arc::new(BroadcastPublisher::new(4)),
            Arc::new(DatabaseShortageRecorder::new(db.shortages())),
        );
        stock(&db, "GLD001", StockLocation::Shelf, None, 10).await;

        let err = pricey
            .checkout(
                &[CartItem::new("GLD001", 3)],
                Money::from_cents(i64::MAX),
                StockLocation::Shelf,
                &NoDiscount,
                "COUNTER",
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InventoryError::Validation(ValidationError::OutOfRange { ref field, .. }) if field == "line total"
        ));
        assert_eq!(available(&db, "GLD001", StockLocation::Shelf).await, 10);
        assert_eq!(bill_count(&db).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_never_oversell() {
        let path = std::env::temp_dir().join(format!("larder-checkout-{}.db", uuid::Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(8)).await.unwrap();
        let (service, _) = service_on(db.clone()).await;
        stock(&db, "CLN003", StockLocation::Shelf, None, 20).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .checkout(
                        &[CartItem::new("CLN003", 3)],
                        Money::from_cents(10000),
                        StockLocation::Shelf,
                        &NoDiscount,
                        "COUNTER",
                    )
                    .await
            }));
        }

        let mut serials = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(bill) => serials.push(bill.serial().to_string()),
                Err(err) => assert!(
                    err.kind() == ErrorKind::InsufficientStock || err.is_retryable(),
                    "unexpected error: {err}"
                ),
            }
        }

        let remaining = available(&db, "CLN003", StockLocation::Shelf).await;
        assert!(remaining >= 0);
        assert_eq!(remaining, 20 - 3 * serials.len() as i64);
        assert_eq!(bill_count(&db).await, serials.len() as i64);

        let mut unique = serials.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), serials.len());

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
