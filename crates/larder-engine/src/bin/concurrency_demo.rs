//! # Concurrency Demo
//!
//! Several cashiers check out the same product at the same moment against
//! one file database.
//!
//! ## Usage
//! ```bash
//! cargo run -p larder-engine --bin concurrency-demo
//!
//! # 12 cashiers, 20 units on the shelf, 3 per cart
//! cargo run -p larder-engine --bin concurrency-demo -- --cashiers 12 --stock 20 --qty 3
//! ```
//!
//! Serials stay unique and the shelf never goes negative. Cashiers that
//! lose a race on a batch roll back with a conflict; cashiers that arrive
//! after the shelf and web stock run out roll back with insufficient stock.

use std::env;
use std::sync::Arc;

use larder_core::{CartItem, Money, NoDiscount, StockLocation};
use larder_engine::logging::init_tracing;
use larder_engine::{EngineConfig, InMemoryCatalog, InventoryEngine, TracingPublisher};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut cashiers: usize = 6;
    let mut shelf_stock: i64 = 10;
    let mut web_stock: i64 = 2;
    let mut per_cart: i64 = 2;
    let mut db_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--cashiers" | "-c" if i + 1 < args.len() => {
                cashiers = args[i + 1].parse().unwrap_or(cashiers);
                i += 1;
            }
            "--stock" | "-s" if i + 1 < args.len() => {
                shelf_stock = args[i + 1].parse().unwrap_or(shelf_stock);
                i += 1;
            }
            "--web" | "-w" if i + 1 < args.len() => {
                web_stock = args[i + 1].parse().unwrap_or(web_stock);
                i += 1;
            }
            "--qty" | "-q" if i + 1 < args.len() => {
                per_cart = args[i + 1].parse().unwrap_or(per_cart);
                i += 1;
            }
            "--db" | "-d" if i + 1 < args.len() => {
                db_path = Some(args[i + 1].clone());
                i += 1;
            }
            "--help" | "-h" => {
                println!("Larder Concurrency Demo");
                println!();
                println!("Usage: concurrency-demo [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --cashiers <N>  Concurrent checkouts (default: 6)");
                println!("  -s, --stock <N>     CLN003 units on the shelf (default: 10)");
                println!("  -w, --web <N>       CLN003 units in web stock (default: 2)");
                println!("  -q, --qty <N>       Units per cart (default: 2)");
                println!("  -d, --db <PATH>     Database file (default: fresh temp file)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let temp_db = db_path.is_none();
    let path = db_path.map(Into::into).unwrap_or_else(|| {
        env::temp_dir().join(format!("larder-demo-{}.db", uuid::Uuid::new_v4()))
    });

    let mut config = EngineConfig::default();
    config.database.path = path.clone();
    config.database.max_connections = cashiers.clamp(1, 16) as u32;

    let catalog = Arc::new(InMemoryCatalog::new().with_product("CLN003", "Floor Cleaner", 1250));
    let engine = InventoryEngine::connect(config, catalog, Arc::new(TracingPublisher), None).await?;

    println!("🧪 Larder Concurrency Demo");
    println!("==========================");
    println!("Database: {}", path.display());
    println!(
        "Cashiers: {}  cart: CLN003 x{}  shelf: {}  web: {}",
        cashiers, per_cart, shelf_stock, web_stock
    );
    println!();

    if shelf_stock > 0 {
        engine
            .receive("CLN003", shelf_stock, None, StockLocation::Shelf)
            .await?;
    }
    if web_stock > 0 {
        engine.receive("CLN003", web_stock, None, StockLocation::Web).await?;
    }

    let mut handles = Vec::with_capacity(cashiers);
    for cashier in 1..=cashiers {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let cart = [CartItem::new("CLN003", per_cart)];
            let outcome = engine
                .checkout_at_counter(&cart, Money::from_cents(100_000), &NoDiscount)
                .await;
            (cashier, outcome)
        }));
    }

    let mut committed = 0;
    let mut last_bill = None;
    for handle in handles {
        let (cashier, outcome) = handle.await?;
        match outcome {
            Ok(bill) => {
                committed += 1;
                println!(
                    "[Cashier {:>2}] ✓ {}  total {}",
                    cashier,
                    bill.serial(),
                    bill.total()
                );
                last_bill = Some(bill);
            }
            Err(err) => println!("[Cashier {:>2}] ✗ {:?}: {}", cashier, err.kind(), err),
        }
    }

    println!();
    println!("Committed: {}/{}", committed, cashiers);

    let totals = engine.availability_across_locations("CLN003").await?;
    for (location, quantity) in &totals {
        println!("  {:<10} {}", location, quantity);
    }

    let notices = engine.database().shortages().list().await?;
    println!("Shortage notices: {}", notices.len());

    if let Some(bill) = last_bill {
        println!();
        println!("Last bill:");
        println!("{}", serde_json::to_string_pretty(&bill)?);
    }

    engine.close().await;
    if temp_db {
        let _ = std::fs::remove_file(&path);
    }

    Ok(())
}
