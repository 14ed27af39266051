//! # Stock Ledger
//!
//! Batch records: ordered candidate lookup, conditional decrements,
//! availability and location-to-location transfer.
//!
//! ## Concurrency Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Optimistic decrement                                                   │
//! │                                                                         │
//! │  task A: candidates → batch 7 has 10                                    │
//! │  task B: candidates → batch 7 has 10                                    │
//! │                                                                         │
//! │  task A: UPDATE batch SET quantity = quantity - 8                       │
//! │          WHERE id = 7 AND quantity >= 8          → 1 row  (Applied)     │
//! │  task B: UPDATE batch SET quantity = quantity - 8                       │
//! │          WHERE id = 7 AND quantity >= 8          → 0 rows (Conflict)    │
//! │                                                                         │
//! │  B's whole transaction rolls back. No committed update is ever lost,    │
//! │  and quantity can never go below zero.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every method runs on the connection of the enclosing [`UnitOfWork`], so
//! reads are always transaction-scoped.
//!
//! [`UnitOfWork`]: crate::UnitOfWork

use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::movement::{MovementLog, NewMovement};
use larder_core::{Batch, NewBatch, SelectionPolicy, StockLocation};

/// Column list matching `Batch`'s `FromRow`.
const BATCH_COLUMNS: &str = "id, product_code, location, received_at, expiry, quantity, version";

// =============================================================================
// Outcomes
// =============================================================================

/// Result of a conditional decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeductOutcome {
    /// The batch held enough and was decremented.
    Applied,
    /// Zero rows matched: a concurrent actor depleted the batch first.
    Conflict,
}

/// One source-batch chunk moved by a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedChunk {
    pub source_batch_id: i64,
    pub destination_batch_id: i64,
    pub expiry: Option<NaiveDate>,
    pub quantity: i64,
    /// True when the chunk was merged into an existing destination batch.
    pub merged: bool,
}

/// Result of [`StockLedger::transfer_stock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Stock moved and the movement was logged.
    Moved {
        chunks: Vec<MovedChunk>,
        movement_id: i64,
    },
    /// Source candidates cannot cover the amount. Nothing was written.
    Insufficient { available: i64 },
    /// A source decrement lost a race. Earlier chunks were already written,
    /// so the caller must roll back.
    Conflict { batch_id: i64 },
}

// =============================================================================
// Ledger
// =============================================================================

/// Batch ledger bound to one transaction's connection.
pub struct StockLedger<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> StockLedger<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        StockLedger { conn }
    }

    /// Batches with stock for (product, location), in consumption order:
    /// expiry ascending with undated batches last, then receipt time, then id.
    pub async fn candidates_for_deduction(
        &mut self,
        product_code: &str,
        location: StockLocation,
    ) -> DbResult<Vec<Batch>> {
        let sql = format!(
            r#"
            SELECT {BATCH_COLUMNS}
            FROM batch
            WHERE product_code = ?1 AND location = ?2 AND quantity > 0
            ORDER BY (expiry IS NULL), expiry ASC, received_at ASC, id ASC
            "#
        );

        let batches = sqlx::query_as::<_, Batch>(&sql)
            .bind(product_code)
            .bind(location)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(batches)
    }

    /// Decrements one batch if it still holds at least `amount`.
    ///
    /// A single conditional UPDATE: the check and the write cannot be
    /// separated by another writer.
    pub async fn deduct_from_batch(&mut self, batch_id: i64, amount: i64) -> DbResult<DeductOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE batch
            SET quantity = quantity - ?1, version = version + 1
            WHERE id = ?2 AND quantity >= ?1
            "#,
        )
        .bind(amount)
        .bind(batch_id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            debug!(batch_id, amount, "Conditional decrement matched no rows");
            return Ok(DeductOutcome::Conflict);
        }

        debug!(batch_id, amount, "Batch decremented");
        Ok(DeductOutcome::Applied)
    }

    /// Sum of quantities for (product, location).
    pub async fn total_available(
        &mut self,
        product_code: &str,
        location: StockLocation,
    ) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(quantity), 0)
            FROM batch
            WHERE product_code = ?1 AND location = ?2
            "#,
        )
        .bind(product_code)
        .bind(location)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(total)
    }

    /// Totals per location for one product. Every location is present.
    pub async fn availability_by_location(
        &mut self,
        product_code: &str,
    ) -> DbResult<BTreeMap<StockLocation, i64>> {
        let rows: Vec<(StockLocation, i64)> = sqlx::query_as(
            r#"
            SELECT location, COALESCE(SUM(quantity), 0)
            FROM batch
            WHERE product_code = ?1
            GROUP BY location
            "#,
        )
        .bind(product_code)
        .fetch_all(&mut *self.conn)
        .await?;

        let mut totals: BTreeMap<StockLocation, i64> =
            StockLocation::ALL.iter().map(|loc| (*loc, 0)).collect();
        totals.extend(rows);

        Ok(totals)
    }

    /// Inserts a new batch with `version = 0`.
    pub async fn insert_batch(&mut self, batch: &NewBatch) -> DbResult<Batch> {
        let sql = format!(
            r#"
            INSERT INTO batch (product_code, location, received_at, expiry, quantity, version)
            VALUES (?1, ?2, ?3, ?4, ?5, 0)
            RETURNING {BATCH_COLUMNS}
            "#
        );

        let inserted = sqlx::query_as::<_, Batch>(&sql)
            .bind(&batch.product_code)
            .bind(batch.location)
            .bind(batch.received_at)
            .bind(batch.expiry)
            .bind(batch.quantity)
            .fetch_one(&mut *self.conn)
            .await?;

        debug!(
            batch_id = inserted.id,
            product_code = %inserted.product_code,
            location = %inserted.location,
            quantity = inserted.quantity,
            "Batch inserted"
        );

        Ok(inserted)
    }

    /// Adds `amount` to an existing batch.
    pub async fn merge_into(&mut self, batch_id: i64, amount: i64) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE batch
            SET quantity = quantity + ?1, version = version + 1
            WHERE id = ?2
            "#,
        )
        .bind(amount)
        .bind(batch_id)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Batch", batch_id.to_string()));
        }

        Ok(())
    }

    /// Oldest batch of `product_code` at `location` with exactly this expiry.
    /// A missing expiry only matches batches without one.
    pub async fn find_merge_target(
        &mut self,
        product_code: &str,
        location: StockLocation,
        expiry: Option<NaiveDate>,
    ) -> DbResult<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM batch
            WHERE product_code = ?1 AND location = ?2 AND expiry IS ?3
            ORDER BY received_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(product_code)
        .bind(location)
        .bind(expiry)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(id)
    }

    /// Moves `amount` units of a product from one location to another.
    ///
    /// ## What This Does
    /// 1. Plans the source side with `policy` over the deduction candidates
    /// 2. Returns `Insufficient` before writing anything if the plan falls short
    /// 3. Decrements each planned source batch
    /// 4. Merges each chunk into a destination batch with the same expiry,
    ///    or creates one carrying that expiry
    /// 5. Appends one movement record
    ///
    /// The caller owns the transaction: on `Conflict` or an error it must
    /// roll back to undo chunks already moved.
    pub async fn transfer_stock(
        &mut self,
        policy: SelectionPolicy,
        product_code: &str,
        from: StockLocation,
        to: StockLocation,
        amount: i64,
        note: &str,
    ) -> DbResult<TransferOutcome> {
        let candidates = self.candidates_for_deduction(product_code, from).await?;
        let plan = policy.plan(&candidates, amount);

        if !plan.is_complete() {
            debug!(
                product_code,
                from = %from,
                requested = amount,
                available = plan.planned(),
                "Transfer source cannot cover amount"
            );
            return Ok(TransferOutcome::Insufficient {
                available: plan.planned(),
            });
        }

        let now = Utc::now();
        let mut chunks = Vec::with_capacity(plan.takes.len());

        for take in &plan.takes {
            if self.deduct_from_batch(take.batch_id, take.quantity).await? == DeductOutcome::Conflict {
                return Ok(TransferOutcome::Conflict {
                    batch_id: take.batch_id,
                });
            }

            let (destination_batch_id, merged) =
                match self.find_merge_target(product_code, to, take.expiry).await? {
                    Some(target) => {
                        self.merge_into(target, take.quantity).await?;
                        (target, true)
                    }
                    None => {
                        let created = self
                            .insert_batch(&NewBatch {
                                product_code: product_code.to_string(),
                                location: to,
                                received_at: now,
                                expiry: take.expiry,
                                quantity: take.quantity,
                            })
                            .await?;
                        (created.id, false)
                    }
                };

            chunks.push(MovedChunk {
                source_batch_id: take.batch_id,
                destination_batch_id,
                expiry: take.expiry,
                quantity: take.quantity,
                merged,
            });
        }

        let movement_id = MovementLog::new(&mut *self.conn)
            .record(&NewMovement {
                product_code: product_code.to_string(),
                from_location: from,
                to_location: to,
                quantity: amount,
                note: note.to_string(),
                movement_time: now,
            })
            .await?;

        Ok(TransferOutcome::Moved {
            chunks,
            movement_id,
        })
    }

    /// Gets a batch by id.
    pub async fn find_batch(&mut self, batch_id: i64) -> DbResult<Option<Batch>> {
        let sql = format!("SELECT {BATCH_COLUMNS} FROM batch WHERE id = ?1");

        let batch = sqlx::query_as::<_, Batch>(&sql)
            .bind(batch_id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(batch)
    }

    /// Lists batches, optionally filtered by product and/or location.
    /// Includes empty batches.
    pub async fn list_batches(
        &mut self,
        product_code: Option<&str>,
        location: Option<StockLocation>,
    ) -> DbResult<Vec<Batch>> {
        let sql = format!(
            r#"
            SELECT {BATCH_COLUMNS}
            FROM batch
            WHERE (?1 IS NULL OR product_code = ?1)
              AND (?2 IS NULL OR location = ?2)
            ORDER BY product_code, location, id
            "#
        );

        let batches = sqlx::query_as::<_, Batch>(&sql)
            .bind(product_code)
            .bind(location)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(batches)
    }

    /// Products whose total at `location` is below `threshold`, lowest first.
    ///
    /// Only products with at least one batch at the location are reported.
    pub async fn below_threshold(
        &mut self,
        location: StockLocation,
        threshold: i64,
    ) -> DbResult<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT product_code, COALESCE(SUM(quantity), 0) AS total
            FROM batch
            WHERE location = ?1
            GROUP BY product_code
            HAVING COALESCE(SUM(quantity), 0) < ?2
            ORDER BY total ASC, product_code ASC
            "#,
        )
        .bind(location)
        .bind(threshold)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{Duration, TimeZone};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn new_batch(
        product: &str,
        location: StockLocation,
        day: u32,
        expiry: Option<NaiveDate>,
        quantity: i64,
    ) -> NewBatch {
        NewBatch {
            product_code: product.to_string(),
            location,
            received_at: Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap(),
            expiry,
            quantity,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[tokio::test]
    async fn test_candidates_order_expiry_then_receipt() {
        let db = setup().await;
        let mut uow = db.begin().await.unwrap();
        let mut ledger = uow.ledger();

        let undated = ledger
            .insert_batch(&new_batch("CLN003", StockLocation::Shelf, 1, None, 5))
            .await
            .unwrap();
        let late = ledger
            .insert_batch(&new_batch("CLN003", StockLocation::Shelf, 2, date(2025, 3, 1), 5))
            .await
            .unwrap();
        let early = ledger
            .insert_batch(&new_batch("CLN003", StockLocation::Shelf, 3, date(2025, 1, 1), 5))
            .await
            .unwrap();
        ledger
            .insert_batch(&new_batch("CLN003", StockLocation::Shelf, 4, date(2024, 12, 1), 0))
            .await
            .unwrap();

        let ids: Vec<i64> = ledger
            .candidates_for_deduction("CLN003", StockLocation::Shelf)
            .await
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();

        // Empty batch excluded, undated batch last.
        assert_eq!(ids, vec![early.id, late.id, undated.id]);
    }

    #[tokio::test]
    async fn test_fefo_deduction_example() {
        let db = setup().await;
        let mut uow = db.begin().await.unwrap();
        let mut ledger = uow.ledger();

        let dated = ledger
            .insert_batch(&new_batch("CLN003", StockLocation::Shelf, 1, date(2025, 1, 1), 10))
            .await
            .unwrap();
        let undated = ledger
            .insert_batch(&new_batch("CLN003", StockLocation::Shelf, 2, None, 5))
            .await
            .unwrap();

        let candidates = ledger
            .candidates_for_deduction("CLN003", StockLocation::Shelf)
            .await
            .unwrap();
        let plan = SelectionPolicy::EarliestExpiryFirst.plan(&candidates, 12);
        for take in &plan.takes {
            let outcome = ledger.deduct_from_batch(take.batch_id, take.quantity).await.unwrap();
            assert_eq!(outcome, DeductOutcome::Applied);
        }

        let dated = ledger.find_batch(dated.id).await.unwrap().unwrap();
        let undated = ledger.find_batch(undated.id).await.unwrap().unwrap();
        assert_eq!(dated.quantity, 0);
        assert_eq!(undated.quantity, 3);
        assert_eq!(dated.version, 1);
    }

    #[tokio::test]
    async fn test_deduct_reports_conflict_and_never_goes_negative() {
        let db = setup().await;
        let mut uow = db.begin().await.unwrap();
        let mut ledger = uow.ledger();

        let batch = ledger
            .insert_batch(&new_batch("MLK001", StockLocation::Shelf, 1, None, 4))
            .await
            .unwrap();

        assert_eq!(
            ledger.deduct_from_batch(batch.id, 5).await.unwrap(),
            DeductOutcome::Conflict
        );
        assert_eq!(
            ledger.deduct_from_batch(batch.id, 4).await.unwrap(),
            DeductOutcome::Applied
        );
        assert_eq!(
            ledger.deduct_from_batch(batch.id, 1).await.unwrap(),
            DeductOutcome::Conflict
        );

        let batch = ledger.find_batch(batch.id).await.unwrap().unwrap();
        assert_eq!(batch.quantity, 0);
        assert_eq!(batch.version, 1);
    }

    #[tokio::test]
    async fn test_quantity_check_constraint() {
        let db = setup().await;
        let mut uow = db.begin().await.unwrap();

        let err = uow
            .ledger()
            .insert_batch(&new_batch("MLK001", StockLocation::Shelf, 1, None, -1))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_availability() {
        let db = setup().await;
        let mut uow = db.begin().await.unwrap();
        let mut ledger = uow.ledger();

        ledger
            .insert_batch(&new_batch("CLN003", StockLocation::Shelf, 1, None, 4))
            .await
            .unwrap();
        ledger
            .insert_batch(&new_batch("CLN003", StockLocation::Shelf, 2, None, 6))
            .await
            .unwrap();
        ledger
            .insert_batch(&new_batch("CLN003", StockLocation::Web, 2, None, 3))
            .await
            .unwrap();

        assert_eq!(
            ledger.total_available("CLN003", StockLocation::Shelf).await.unwrap(),
            10
        );
        assert_eq!(
            ledger.total_available("NOPE", StockLocation::Shelf).await.unwrap(),
            0
        );

        let totals = ledger.availability_by_location("CLN003").await.unwrap();
        assert_eq!(totals[&StockLocation::MainStore], 0);
        assert_eq!(totals[&StockLocation::Shelf], 10);
        assert_eq!(totals[&StockLocation::Web], 3);
    }

    #[tokio::test]
    async fn test_transfer_splits_and_merges_by_expiry() {
        let db = setup().await;
        let mut uow = db.begin().await.unwrap();
        let mut ledger = uow.ledger();

        ledger
            .insert_batch(&new_batch("CLN003", StockLocation::MainStore, 1, date(2025, 1, 1), 4))
            .await
            .unwrap();
        ledger
            .insert_batch(&new_batch("CLN003", StockLocation::MainStore, 2, date(2025, 2, 1), 10))
            .await
            .unwrap();
        let existing = ledger
            .insert_batch(&new_batch("CLN003", StockLocation::Shelf, 3, date(2025, 1, 1), 1))
            .await
            .unwrap();

        let outcome = ledger
            .transfer_stock(
                SelectionPolicy::EarliestExpiryFirst,
                "CLN003",
                StockLocation::MainStore,
                StockLocation::Shelf,
                6,
                "manual_transfer",
            )
            .await
            .unwrap();

        let chunks = match outcome {
            TransferOutcome::Moved { chunks, .. } => chunks,
            other => panic!("expected Moved, got {:?}", other),
        };
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].merged);
        assert_eq!(chunks[0].destination_batch_id, existing.id);
        assert_eq!(chunks[0].quantity, 4);
        assert!(!chunks[1].merged);
        assert_eq!(chunks[1].expiry, date(2025, 2, 1));
        assert_eq!(chunks[1].quantity, 2);

        assert_eq!(
            ledger.total_available("CLN003", StockLocation::MainStore).await.unwrap(),
            8
        );
        assert_eq!(
            ledger.total_available("CLN003", StockLocation::Shelf).await.unwrap(),
            7
        );
        let merged = ledger.find_batch(existing.id).await.unwrap().unwrap();
        assert_eq!(merged.quantity, 5);
        drop(ledger);

        let moves = uow.movements().list_for_product("CLN003").await.unwrap();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].quantity, 6);
        assert_eq!(moves[0].note, "manual_transfer");
    }

    #[tokio::test]
    async fn test_transfer_undated_only_merges_with_undated() {
        let db = setup().await;
        let mut uow = db.begin().await.unwrap();
        let mut ledger = uow.ledger();

        ledger
            .insert_batch(&new_batch("RICE5", StockLocation::MainStore, 1, None, 10))
            .await
            .unwrap();
        ledger
            .insert_batch(&new_batch("RICE5", StockLocation::Shelf, 1, date(2026, 1, 1), 2))
            .await
            .unwrap();
        let undated_shelf = ledger
            .insert_batch(&new_batch("RICE5", StockLocation::Shelf, 2, None, 2))
            .await
            .unwrap();

        ledger
            .transfer_stock(
                SelectionPolicy::FirstInFirstOut,
                "RICE5",
                StockLocation::MainStore,
                StockLocation::Shelf,
                3,
                "manual_transfer",
            )
            .await
            .unwrap();

        let target = ledger.find_batch(undated_shelf.id).await.unwrap().unwrap();
        assert_eq!(target.quantity, 5);
    }

    #[tokio::test]
    async fn test_transfer_insufficient_writes_nothing() {
        let db = setup().await;
        let mut uow = db.begin().await.unwrap();
        let mut ledger = uow.ledger();

        ledger
            .insert_batch(&new_batch("CLN003", StockLocation::MainStore, 1, None, 3))
            .await
            .unwrap();

        let outcome = ledger
            .transfer_stock(
                SelectionPolicy::EarliestExpiryFirst,
                "CLN003",
                StockLocation::MainStore,
                StockLocation::Shelf,
                5,
                "manual_transfer",
            )
            .await
            .unwrap();

        assert_eq!(outcome, TransferOutcome::Insufficient { available: 3 });
        assert_eq!(
            ledger.total_available("CLN003", StockLocation::MainStore).await.unwrap(),
            3
        );
        assert_eq!(
            ledger.total_available("CLN003", StockLocation::Shelf).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_list_and_below_threshold() {
        let db = setup().await;
        let mut uow = db.begin().await.unwrap();
        let mut ledger = uow.ledger();

        ledger
            .insert_batch(&new_batch("AAA", StockLocation::Shelf, 1, None, 40))
            .await
            .unwrap();
        ledger
            .insert_batch(&new_batch("BBB", StockLocation::Shelf, 1, None, 10))
            .await
            .unwrap();
        ledger
            .insert_batch(&new_batch("CCC", StockLocation::Shelf, 1, None, 80))
            .await
            .unwrap();
        ledger
            .insert_batch(&new_batch("AAA", StockLocation::Web, 1, None, 1))
            .await
            .unwrap();

        assert_eq!(ledger.list_batches(None, None).await.unwrap().len(), 4);
        assert_eq!(ledger.list_batches(Some("AAA"), None).await.unwrap().len(), 2);
        assert_eq!(
            ledger
                .list_batches(Some("AAA"), Some(StockLocation::Web))
                .await
                .unwrap()
                .len(),
            1
        );

        let low = ledger.below_threshold(StockLocation::Shelf, 50).await.unwrap();
        assert_eq!(low, vec![("BBB".to_string(), 10), ("AAA".to_string(), 40)]);
    }

    #[tokio::test]
    async fn test_received_at_round_trips() {
        let db = setup().await;
        let mut uow = db.begin().await.unwrap();
        let mut ledger = uow.ledger();

        let received_at = Utc::now() - Duration::days(2);
        let inserted = ledger
            .insert_batch(&NewBatch {
                product_code: "MLK001".into(),
                location: StockLocation::MainStore,
                received_at,
                expiry: date(2030, 5, 17),
                quantity: 12,
            })
            .await
            .unwrap();

        let found = ledger.find_batch(inserted.id).await.unwrap().unwrap();
        assert_eq!(found.received_at, received_at);
        assert_eq!(found.expiry, date(2030, 5, 17));
        assert_eq!(found.version, 0);
    }
}
