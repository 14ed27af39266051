//! # Movement Log
//!
//! Append-only audit trail of stock moved between locations.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use larder_core::{InventoryMovement, StockLocation};

/// A movement about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub product_code: String,
    pub from_location: StockLocation,
    pub to_location: StockLocation,
    pub quantity: i64,
    pub note: String,
    pub movement_time: DateTime<Utc>,
}

/// Movement log bound to one transaction's connection.
pub struct MovementLog<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> MovementLog<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        MovementLog { conn }
    }

    /// Appends a movement and returns its id.
    pub async fn record(&mut self, movement: &NewMovement) -> DbResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO inventory_movement (
                product_code, from_location, to_location,
                quantity, note, movement_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING id
            "#,
        )
        .bind(&movement.product_code)
        .bind(movement.from_location)
        .bind(movement.to_location)
        .bind(movement.quantity)
        .bind(&movement.note)
        .bind(movement.movement_time)
        .fetch_one(&mut *self.conn)
        .await?;

        debug!(
            movement_id = id,
            product_code = %movement.product_code,
            from = %movement.from_location,
            to = %movement.to_location,
            quantity = movement.quantity,
            "Movement recorded"
        );

        Ok(id)
    }

    /// Movements for one product, oldest first.
    pub async fn list_for_product(&mut self, product_code: &str) -> DbResult<Vec<InventoryMovement>> {
        let movements = sqlx::query_as::<_, InventoryMovement>(
            r#"
            SELECT id, product_code, from_location, to_location,
                   quantity, note, movement_time
            FROM inventory_movement
            WHERE product_code = ?1
            ORDER BY id
            "#,
        )
        .bind(product_code)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(movements)
    }
}
