//! # Manual Transfers
//!
//! Moves stock between locations with the same batch order a sale uses, so
//! a transfer drains the batches a sale would have drained.
//!
//! ```text
//! validate (code, qty, route, catalog) ──► begin_write (BEGIN IMMEDIATE)
//!     ──► total_available(from) ≥ qty ? ──no──► rollback, InsufficientStock
//!     ──► StockLedger::transfer_stock(policy, ...)
//!             Moved ──────► commit
//!             Insufficient ► rollback, InsufficientStock
//!             Conflict ───► rollback, ConcurrencyConflict
//! ```

use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

use crate::collaborators::Catalog;
use crate::error::{InventoryError, InventoryResult};
use crate::selector::BatchSelector;
use larder_core::validation::{validate_product_code, validate_quantity, validate_route};
use larder_core::{StockLocation, ValidationError};
use larder_db::{Database, MovedChunk, TransferOutcome, UnitOfWork};

/// Audit note written on every manual movement.
pub const MANUAL_TRANSFER_NOTE: &str = "manual_transfer";

/// What a committed transfer did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub movement_id: i64,
    /// One entry per source batch touched, in consumption order.
    pub chunks: Vec<MovedChunk>,
}

/// Runs manual transfers.
#[derive(Clone)]
pub struct TransferService {
    db: Database,
    catalog: Arc<dyn Catalog>,
    selector: BatchSelector,
}

impl TransferService {
    pub fn new(db: Database, catalog: Arc<dyn Catalog>) -> Self {
        TransferService {
            db,
            catalog,
            selector: BatchSelector::default(),
        }
    }

    pub fn with_selector(mut self, selector: BatchSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Moves `quantity` of `product_code` from `from` to `to`.
    ///
    /// Nothing moves unless everything moves.
    pub async fn transfer(
        &self,
        product_code: &str,
        from: StockLocation,
        to: StockLocation,
        quantity: i64,
    ) -> InventoryResult<TransferReceipt> {
        let span = info_span!(
            "transfer",
            product_code,
            from = %from,
            to = %to,
            quantity
        );

        self.run_transfer(product_code, from, to, quantity)
            .instrument(span)
            .await
    }

    async fn run_transfer(
        &self,
        product_code: &str,
        from: StockLocation,
        to: StockLocation,
        quantity: i64,
    ) -> InventoryResult<TransferReceipt> {
        validate_product_code(product_code)?;
        validate_quantity(quantity)?;
        validate_route(from, to)?;

        if self.catalog.price_and_name(product_code).await?.is_none() {
            return Err(ValidationError::UnknownProduct {
                code: product_code.to_string(),
            }
            .into());
        }

        let mut uow = self.db.begin_write().await?;

        match self.move_stock(&mut uow, product_code, from, to, quantity).await {
            Ok(receipt) => {
                uow.commit().await?;
                info!(
                    movement_id = receipt.movement_id,
                    batches = receipt.chunks.len(),
                    "Transfer committed"
                );
                Ok(receipt)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed; connection discarded");
                }
                warn!(error = %err, "Transfer rolled back");
                Err(err)
            }
        }
    }

    async fn move_stock(
        &self,
        uow: &mut UnitOfWork,
        product_code: &str,
        from: StockLocation,
        to: StockLocation,
        quantity: i64,
    ) -> InventoryResult<TransferReceipt> {
        let mut ledger = uow.ledger();

        let available = ledger.total_available(product_code, from).await?;
        if available < quantity {
            return Err(InventoryError::InsufficientStock {
                product_code: product_code.to_string(),
                location: from,
                requested: quantity,
                available,
            });
        }

        let outcome = ledger
            .transfer_stock(
                self.selector.policy(),
                product_code,
                from,
                to,
                quantity,
                MANUAL_TRANSFER_NOTE,
            )
            .await?;

        settle(outcome, product_code, from, quantity)
    }
}

/// Maps the ledger's outcome to a receipt or a rollback-worthy error.
fn settle(
    outcome: TransferOutcome,
    product_code: &str,
    from: StockLocation,
    quantity: i64,
) -> InventoryResult<TransferReceipt> {
    match outcome {
        TransferOutcome::Moved { chunks, movement_id } => Ok(TransferReceipt { movement_id, chunks }),
        TransferOutcome::Insufficient { available } => Err(InventoryError::InsufficientStock {
            product_code: product_code.to_string(),
            location: from,
            requested: quantity,
            available,
        }),
        TransferOutcome::Conflict { batch_id } => {
            Err(InventoryError::ConcurrencyConflict { batch_id })
        }
    }
}

impl std::fmt::Debug for TransferService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferService")
            .field("selector", &self.selector)
            .finish()
    }
}
