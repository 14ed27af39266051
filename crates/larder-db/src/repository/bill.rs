//! # Bill Repository
//!
//! Persists issued bills with their lines. Bills are written once, inside
//! the checkout transaction, and never updated.
//!
//! ## Snapshot Pattern
//! Line name and unit price are copied from the catalog at sale time, so a
//! reloaded bill shows what was charged even after the catalog changes.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use tracing::debug;

use crate::error::DbResult;
use larder_core::{Bill, BillLine, Money};

#[derive(Debug, FromRow)]
struct BillRow {
    id: i64,
    serial: String,
    date_time: DateTime<Utc>,
    subtotal_cents: i64,
    discount_cents: i64,
    total_cents: i64,
    cash_cents: i64,
    change_cents: i64,
}

#[derive(Debug, FromRow)]
struct BillLineRow {
    product_code: String,
    name: String,
    quantity: i64,
    unit_price_cents: i64,
    line_total_cents: i64,
}

/// Bill storage bound to one transaction's connection.
pub struct BillRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> BillRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        BillRepository { conn }
    }

    /// Inserts the bill and its lines; returns the bill carrying its id.
    ///
    /// ## Errors
    /// - `UniqueViolation` if the serial was already issued
    pub async fn insert(&mut self, bill: Bill) -> DbResult<Bill> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO bill (
                serial, date_time,
                subtotal_cents, discount_cents, total_cents,
                cash_cents, change_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING id
            "#,
        )
        .bind(bill.serial())
        .bind(bill.created_at())
        .bind(bill.subtotal().cents())
        .bind(bill.discount().cents())
        .bind(bill.total().cents())
        .bind(bill.cash().cents())
        .bind(bill.change().cents())
        .fetch_one(&mut *self.conn)
        .await?;

        for (line_no, line) in bill.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO bill_line (
                    bill_id, line_no, product_code, name,
                    quantity, unit_price_cents, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(id)
            .bind(line_no as i64)
            .bind(line.product_code())
            .bind(line.name())
            .bind(line.quantity())
            .bind(line.unit_price().cents())
            .bind(line.line_total().cents())
            .execute(&mut *self.conn)
            .await?;
        }

        debug!(
            bill_id = id,
            serial = %bill.serial(),
            lines = bill.lines().len(),
            total = %bill.total(),
            "Bill inserted"
        );

        Ok(bill.with_id(id))
    }

    /// Reloads a bill and its lines in original order.
    pub async fn find_by_serial(&mut self, serial: &str) -> DbResult<Option<Bill>> {
        let row: Option<BillRow> = sqlx::query_as(
            r#"
            SELECT id, serial, date_time,
                   subtotal_cents, discount_cents, total_cents,
                   cash_cents, change_cents
            FROM bill
            WHERE serial = ?1
            "#,
        )
        .bind(serial)
        .fetch_optional(&mut *self.conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lines: Vec<BillLineRow> = sqlx::query_as(
            r#"
            SELECT product_code, name, quantity, unit_price_cents, line_total_cents
            FROM bill_line
            WHERE bill_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(row.id)
        .fetch_all(&mut *self.conn)
        .await?;

        let lines = lines
            .into_iter()
            .map(|l| {
                BillLine::restore(
                    l.product_code,
                    l.name,
                    l.quantity,
                    Money::from_cents(l.unit_price_cents),
                    Money::from_cents(l.line_total_cents),
                )
            })
            .collect();

        Ok(Some(Bill::restore(
            row.id,
            row.serial,
            row.date_time,
            lines,
            Money::from_cents(row.subtotal_cents),
            Money::from_cents(row.discount_cents),
            Money::from_cents(row.total_cents),
            Money::from_cents(row.cash_cents),
            Money::from_cents(row.change_cents),
        )))
    }

    /// Number of bills issued.
    pub async fn count(&mut self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bill")
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
