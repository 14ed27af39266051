//! # Seed Data Generator
//!
//! Populates the database with demo batches for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./larder_dev.db
//! cargo run -p larder-db --bin seed
//!
//! # Specify database path, and batches per product per location
//! cargo run -p larder-db --bin seed -- --db ./data/larder.db --batches 3
//! ```
//!
//! ## Generated Batches
//! For every demo product and location, `--batches` lots received on
//! consecutive past days. Perishables get staggered expiry dates, dry goods
//! none, so both selection orders have something to chew on.

use chrono::{Duration, Utc};
use std::env;
use larder_core::{NewBatch, StockLocation};
use larder_db::{Database, DbConfig};

/// (product code, shelf life in days; None for non-perishables)
const PRODUCTS: &[(&str, Option<i64>)] = &[
    ("MLK001", Some(7)),
    ("BRD002", Some(4)),
    ("CLN003", None),
    ("YGT004", Some(21)),
    ("RICE5", None),
    ("EGG006", Some(28)),
];

/// Base quantity per location, in ALL order (MAIN_STORE, SHELF, WEB).
const BASE_QUANTITY: [i64; 3] = [120, 40, 15];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut batches_per_location: i64 = 2;
    let mut db_path = String::from("./larder_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--batches" | "-b" => {
                if i + 1 < args.len() {
                    batches_per_location = args[i + 1].parse().unwrap_or(2);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Larder Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -b, --batches <N>  Batches per product per location (default: 2)");
                println!("  -d, --db <PATH>    Database file path (default: ./larder_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Larder Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Batches per product/location: {}", batches_per_location);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let mut uow = db.begin_write().await?;

    let existing = uow.ledger().list_batches(None, None).await?.len();
    if existing > 0 {
        println!("⚠ Database already has {} batches", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();
    let today = now.date_naive();
    let mut generated = 0;

    for (product_idx, (code, shelf_life)) in PRODUCTS.iter().enumerate() {
        for (loc_idx, location) in StockLocation::ALL.iter().enumerate() {
            for n in 0..batches_per_location {
                let age_days = batches_per_location - n;
                let expiry = shelf_life.map(|days| today + Duration::days(days - age_days + n * 2));
                let quantity = BASE_QUANTITY[loc_idx] / batches_per_location.max(1)
                    + (product_idx as i64 * 3 + n) % 7;

                uow.ledger()
                    .insert_batch(&NewBatch {
                        product_code: code.to_string(),
                        location: *location,
                        received_at: now - Duration::days(age_days),
                        expiry,
                        quantity,
                    })
                    .await?;
                generated += 1;
            }
        }
    }

    uow.commit().await?;

    println!();
    println!("✓ Generated {} batches", generated);
    println!();

    let mut uow = db.begin().await?;
    for (code, _) in PRODUCTS {
        let totals = uow.ledger().availability_by_location(code).await?;
        let summary: Vec<String> = totals
            .iter()
            .map(|(loc, qty)| format!("{}={}", loc, qty))
            .collect();
        println!("  {:<8} {}", code, summary.join("  "));
    }
    uow.rollback().await?;

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
