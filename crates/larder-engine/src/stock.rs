//! # Stock Service
//!
//! Receiving and read-side queries.
//!
//! Every read opens its own transaction and rolls it back: availability is
//! never cached between transactions.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::collaborators::Catalog;
use crate::error::InventoryResult;
use larder_core::validation::{validate_expiry, validate_product_code, validate_quantity};
use larder_core::{Batch, InventoryMovement, NewBatch, StockLocation, ValidationError};
use larder_db::{Database, UnitOfWork};

/// Receiving and availability queries.
#[derive(Clone)]
pub struct StockService {
    db: Database,
    catalog: Arc<dyn Catalog>,
}

impl StockService {
    pub fn new(db: Database, catalog: Arc<dyn Catalog>) -> Self {
        StockService { db, catalog }
    }

    // =========================================================================
    // Receiving
    // =========================================================================

    /// Receives supplier stock into MAIN_STORE.
    pub async fn receive(
        &self,
        product_code: &str,
        quantity: i64,
        expiry: Option<chrono::NaiveDate>,
    ) -> InventoryResult<Batch> {
        self.receive_at(product_code, quantity, expiry, StockLocation::MainStore)
            .await
    }

    /// Receives stock as a fresh batch at `location`.
    ///
    /// Stock that expired before today is rejected.
    pub async fn receive_at(
        &self,
        product_code: &str,
        quantity: i64,
        expiry: Option<chrono::NaiveDate>,
        location: StockLocation,
    ) -> InventoryResult<Batch> {
        let now = Utc::now();

        validate_product_code(product_code)?;
        validate_quantity(quantity)?;
        validate_expiry(expiry, now.date_naive())?;

        if self.catalog.price_and_name(product_code).await?.is_none() {
            return Err(ValidationError::UnknownProduct {
                code: product_code.to_string(),
            }
            .into());
        }

        let mut uow = self.db.begin_write().await?;
        let batch = uow
            .ledger()
            .insert_batch(&NewBatch {
                product_code: product_code.to_string(),
                location,
                received_at: now,
                expiry,
                quantity,
            })
            .await?;
        uow.commit().await?;

        info!(
            batch_id = batch.id,
            product_code,
            location = %location,
            quantity,
            "Stock received"
        );

        Ok(batch)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Total of `product_code` at `location`.
    pub async fn available_quantity(
        &self,
        product_code: &str,
        location: StockLocation,
    ) -> InventoryResult<i64> {
        validate_product_code(product_code)?;

        let mut uow = self.db.begin().await?;
        let total = uow.ledger().total_available(product_code, location).await;
        finish_read(uow).await?;

        Ok(total?)
    }

    /// Totals of `product_code` at every location, zeros included.
    pub async fn availability_across_locations(
        &self,
        product_code: &str,
    ) -> InventoryResult<BTreeMap<StockLocation, i64>> {
        validate_product_code(product_code)?;

        let mut uow = self.db.begin().await?;
        let totals = uow.ledger().availability_by_location(product_code).await;
        finish_read(uow).await?;

        Ok(totals?)
    }

    /// Products at `location` whose total is below `threshold`, lowest first.
    pub async fn low_stock_report(
        &self,
        location: StockLocation,
        threshold: i64,
    ) -> InventoryResult<Vec<(String, i64)>> {
        let mut uow = self.db.begin().await?;
        let rows = uow.ledger().below_threshold(location, threshold).await;
        finish_read(uow).await?;

        Ok(rows?)
    }

    /// Batches, optionally filtered, empty ones included.
    pub async fn batches(
        &self,
        product_code: Option<&str>,
        location: Option<StockLocation>,
    ) -> InventoryResult<Vec<Batch>> {
        let mut uow = self.db.begin().await?;
        let batches = uow.ledger().list_batches(product_code, location).await;
        finish_read(uow).await?;

        Ok(batches?)
    }

    /// Movement history of one product, oldest first.
    pub async fn movements(&self, product_code: &str) -> InventoryResult<Vec<InventoryMovement>> {
        validate_product_code(product_code)?;

        let mut uow = self.db.begin().await?;
        let movements = uow.movements().list_for_product(product_code).await;
        finish_read(uow).await?;

        Ok(movements?)
    }
}

/// Ends a read-only unit of work.
async fn finish_read(uow: UnitOfWork) -> InventoryResult<()> {
    uow.rollback().await?;
    Ok(())
}

impl std::fmt::Debug for StockService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::InMemoryCatalog;
    use crate::error::ErrorKind;
    use chrono::Duration;
    use larder_db::DbConfig;

    async fn setup() -> StockService {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = Arc::new(
            InMemoryCatalog::new()
                .with_product("MLK001", "Milk 1L", 250)
                .with_product("RICE5", "Rice 5kg", 1899),
        );
        StockService::new(db, catalog)
    }

    #[tokio::test]
    async fn test_receive_defaults_to_main_store() {
        let service = setup().await;
        let expiry = Some(Utc::now().date_naive() + Duration::days(7));

        let batch = service.receive("MLK001", 24, expiry).await.unwrap();
        assert_eq!(batch.location, StockLocation::MainStore);
        assert_eq!(batch.quantity, 24);
        assert_eq!(batch.expiry, expiry);
        assert_eq!(batch.version, 0);

        service
            .receive_at("MLK001", 6, None, StockLocation::Shelf)
            .await
            .unwrap();

        let totals = service.availability_across_locations("MLK001").await.unwrap();
        assert_eq!(totals[&StockLocation::MainStore], 24);
        assert_eq!(totals[&StockLocation::Shelf], 6);
        assert_eq!(totals[&StockLocation::Web], 0);

        assert_eq!(
            service
                .available_quantity("MLK001", StockLocation::Shelf)
                .await
                .unwrap(),
            6
        );
    }

    #[tokio::test]
    async fn test_receive_rejects_bad_input() {
        let service = setup().await;
        let yesterday = Some(Utc::now().date_naive() - Duration::days(1));

        let expired = service.receive("MLK001", 5, yesterday).await.unwrap_err();
        assert!(matches!(
            expired,
            crate::error::InventoryError::Validation(ValidationError::ExpiredOnArrival { .. })
        ));

        let zero = service.receive("MLK001", 0, None).await.unwrap_err();
        assert_eq!(zero.kind(), ErrorKind::Validation);

        let unknown = service.receive("GHOST9", 5, None).await.unwrap_err();
        assert_eq!(unknown.kind(), ErrorKind::Validation);

        assert!(service.batches(None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_low_stock_report() {
        let service = setup().await;
        service.receive_at("MLK001", 12, None, StockLocation::Shelf).await.unwrap();
        service.receive_at("RICE5", 80, None, StockLocation::Shelf).await.unwrap();
        service.receive_at("RICE5", 3, None, StockLocation::Web).await.unwrap();

        let report = service.low_stock_report(StockLocation::Shelf, 50).await.unwrap();
        assert_eq!(report, vec![("MLK001".to_string(), 12)]);

        let report = service.low_stock_report(StockLocation::Web, 50).await.unwrap();
        assert_eq!(report, vec![("RICE5".to_string(), 3)]);

        assert!(service.movements("RICE5").await.unwrap().is_empty());
    }
}
