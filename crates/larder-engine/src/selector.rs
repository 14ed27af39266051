//! # Batch Selector
//!
//! Applies a [`SelectionPolicy`] to the ledger inside the caller's unit of
//! work.
//!
//! ```text
//! candidates_for_deduction ──► policy.plan(requested) ──► deduct_from_batch × N
//!                                    │
//!                                    └─ shortfall? ─► deduct:      InsufficientStock, no writes
//!                                                     deduct_up_to: take what exists
//! ```
//!
//! Decrements are applied batch by batch. A lost race on any of them is a
//! hard [`InventoryError::ConcurrencyConflict`]; batches already decremented
//! in the same call stay decremented until the caller rolls back.

use tracing::debug;

use crate::error::{InventoryError, InventoryResult};
use larder_core::{DeductionPlan, SelectionPolicy, StockLocation};
use larder_db::{DeductOutcome, StockLedger};

/// Deducts stock in policy order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSelector {
    policy: SelectionPolicy,
}

impl BatchSelector {
    pub fn new(policy: SelectionPolicy) -> Self {
        BatchSelector { policy }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Takes exactly `quantity` or fails.
    ///
    /// When the candidates cannot cover `quantity`, returns
    /// `InsufficientStock` without touching any batch.
    pub async fn deduct(
        &self,
        ledger: &mut StockLedger<'_>,
        product_code: &str,
        quantity: i64,
        location: StockLocation,
    ) -> InventoryResult<i64> {
        let plan = self.plan(ledger, product_code, quantity, location).await?;

        if !plan.is_complete() {
            return Err(InventoryError::InsufficientStock {
                product_code: product_code.to_string(),
                location,
                requested: quantity,
                available: plan.planned(),
            });
        }

        self.apply(ledger, &plan).await
    }

    /// Takes as much of `quantity` as the location holds and returns the
    /// amount taken (`0..=quantity`). Never fails for lack of stock.
    pub async fn deduct_up_to(
        &self,
        ledger: &mut StockLedger<'_>,
        product_code: &str,
        quantity: i64,
        location: StockLocation,
    ) -> InventoryResult<i64> {
        let plan = self.plan(ledger, product_code, quantity, location).await?;
        self.apply(ledger, &plan).await
    }

    async fn plan(
        &self,
        ledger: &mut StockLedger<'_>,
        product_code: &str,
        quantity: i64,
        location: StockLocation,
    ) -> InventoryResult<DeductionPlan> {
        let candidates = ledger.candidates_for_deduction(product_code, location).await?;
        let plan = self.policy.plan(&candidates, quantity);

        debug!(
            product_code,
            location = %location,
            policy = %self.policy,
            requested = quantity,
            planned = plan.planned(),
            batches = plan.takes.len(),
            "Deduction planned"
        );

        Ok(plan)
    }

    async fn apply(&self, ledger: &mut StockLedger<'_>, plan: &DeductionPlan) -> InventoryResult<i64> {
        let mut taken = 0;

        for take in &plan.takes {
            match ledger.deduct_from_batch(take.batch_id, take.quantity).await? {
                DeductOutcome::Applied => taken += take.quantity,
                DeductOutcome::Conflict => {
                    return Err(InventoryError::ConcurrencyConflict {
                        batch_id: take.batch_id,
                    })
                }
            }
        }

        Ok(taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use larder_core::NewBatch;
    use larder_db::{Database, DbConfig};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn batch(location: StockLocation, day: u32, expiry: Option<NaiveDate>, quantity: i64) -> NewBatch {
        NewBatch {
            product_code: "CLN003".into(),
            location,
            received_at: Utc.with_ymd_and_hms(2024, 6, day, 9, 0, 0).unwrap(),
            expiry,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_deduct_earliest_expiry_first() {
        let db = setup().await;
        let mut uow = db.begin().await.unwrap();

        let dated = uow
            .ledger()
            .insert_batch(&batch(
                StockLocation::Shelf,
                2,
                NaiveDate::from_ymd_opt(2025, 1, 1),
                10,
            ))
            .await
            .unwrap();
        let undated = uow
            .ledger()
            .insert_batch(&batch(StockLocation::Shelf, 1, None, 5))
            .await
            .unwrap();

        let selector = BatchSelector::default();
        let taken = selector
            .deduct(&mut uow.ledger(), "CLN003", 12, StockLocation::Shelf)
            .await
            .unwrap();
        assert_eq!(taken, 12);

        let mut ledger = uow.ledger();
        assert_eq!(ledger.find_batch(dated.id).await.unwrap().unwrap().quantity, 0);
        assert_eq!(ledger.find_batch(undated.id).await.unwrap().unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn test_deduct_fifo_ignores_expiry() {
        let db = setup().await;
        let mut uow = db.begin().await.unwrap();

        let dated = uow
            .ledger()
            .insert_batch(&batch(
                StockLocation::Shelf,
                2,
                NaiveDate::from_ymd_opt(2025, 1, 1),
                10,
            ))
            .await
            .unwrap();
        let undated = uow
            .ledger()
            .insert_batch(&batch(StockLocation::Shelf, 1, None, 5))
            .await
            .unwrap();

        let selector = BatchSelector::new(SelectionPolicy::FirstInFirstOut);
        selector
            .deduct(&mut uow.ledger(), "CLN003", 7, StockLocation::Shelf)
            .await
            .unwrap();

        let mut ledger = uow.ledger();
        assert_eq!(ledger.find_batch(undated.id).await.unwrap().unwrap().quantity, 0);
        assert_eq!(ledger.find_batch(dated.id).await.unwrap().unwrap().quantity, 8);
    }

    #[tokio::test]
    async fn test_strict_deduct_shortfall_writes_nothing() {
        let db = setup().await;
        let mut uow = db.begin().await.unwrap();

        uow.ledger()
            .insert_batch(&batch(StockLocation::Web, 1, None, 4))
            .await
            .unwrap();

        let err = BatchSelector::default()
            .deduct(&mut uow.ledger(), "CLN003", 6, StockLocation::Web)
            .await
            .unwrap_err();

        match err {
            InventoryError::InsufficientStock {
                requested,
                available,
                location,
                ..
            } => {
                assert_eq!(requested, 6);
                assert_eq!(available, 4);
                assert_eq!(location, StockLocation::Web);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let left = uow
            .ledger()
            .total_available("CLN003", StockLocation::Web)
            .await
            .unwrap();
        assert_eq!(left, 4);
    }

    #[tokio::test]
    async fn test_deduct_up_to_takes_what_exists() {
        let db = setup().await;
        let mut uow = db.begin().await.unwrap();

        uow.ledger()
            .insert_batch(&batch(StockLocation::Shelf, 1, None, 3))
            .await
            .unwrap();

        let selector = BatchSelector::default();
        let taken = selector
            .deduct_up_to(&mut uow.ledger(), "CLN003", 8, StockLocation::Shelf)
            .await
            .unwrap();
        assert_eq!(taken, 3);

        let taken = selector
            .deduct_up_to(&mut uow.ledger(), "CLN003", 8, StockLocation::Shelf)
            .await
            .unwrap();
        assert_eq!(taken, 0);
    }

    #[tokio::test]
    async fn test_stale_plan_is_a_conflict_and_rolls_back() {
        let db = setup().await;
        let mut uow = db.begin().await.unwrap();
        let first = uow
            .ledger()
            .insert_batch(&batch(StockLocation::Shelf, 1, None, 4))
            .await
            .unwrap();
        let second = uow
            .ledger()
            .insert_batch(&batch(StockLocation::Shelf, 2, None, 6))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let selector = BatchSelector::default();
        let mut uow = db.begin().await.unwrap();
        let mut ledger = uow.ledger();
        let plan = selector
            .plan(&mut ledger, "CLN003", 8, StockLocation::Shelf)
            .await
            .unwrap();
        assert!(plan.is_complete());
        assert_eq!(plan.takes.len(), 2);

        // another writer empties the second batch between plan and apply
        assert_eq!(
            ledger.deduct_from_batch(second.id, 6).await.unwrap(),
            DeductOutcome::Applied
        );

        let err = selector.apply(&mut ledger, &plan).await.unwrap_err();
        assert!(matches!(
            err,
            InventoryError::ConcurrencyConflict { batch_id } if batch_id == second.id
        ));
        assert!(err.is_retryable());
        drop(ledger);
        uow.rollback().await.unwrap();

        let mut uow = db.begin().await.unwrap();
        let mut ledger = uow.ledger();
        assert_eq!(ledger.find_batch(first.id).await.unwrap().unwrap().quantity, 4);
        assert_eq!(ledger.find_batch(second.id).await.unwrap().unwrap().quantity, 6);
    }
}
