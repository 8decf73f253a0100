//! # Seed Data Generator
//!
//! Populates a demo document store for local development of the gateway.
//!
//! ## Usage
//! ```bash
//! # Seed ./tillpoint_dev.db
//! cargo run -p tillpoint-db --bin seed
//!
//! # Specify database path
//! cargo run -p tillpoint-db --bin seed -- --db ./data/tillpoint.db
//! ```
//!
//! ## Generated Data
//! - Company `Demo Co` with warehouse `Stores - DC`
//! - POS profile `Main Till` (Cash, Card) assigned to `cashier@demo.co`
//! - Stock items with bins, one serial-tracked item, one service item
//! - A `Retail` price list

use chrono::{Duration, Utc};
use std::env;
use tillpoint_core::{Money, PosProfile, ProfilePaymentMethod};
use tillpoint_db::{Database, DbConfig, NewItem};

const COMPANY: &str = "Demo Co";
const WAREHOUSE: &str = "Stores - DC";
const PRICE_LIST: &str = "Retail";
const PROFILE: &str = "Main Till";
const CASHIER: &str = "cashier@demo.co";

/// (item code, rate in cents, quantity on hand)
const STOCK_ITEMS: &[(&str, i64, f64)] = &[
    ("COFFEE-250G", 899, 40.0),
    ("TEA-100B", 450, 25.0),
    ("MUG-WHITE", 650, 12.0),
    ("SUGAR-1KG", 199, 0.0),
    ("BANANA-KG", 129, 18.5),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = "./tillpoint_dev.db".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tillpoint Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./tillpoint_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tillpoint Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.items().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} items", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let items = db.items();
    for (code, rate, qty) in STOCK_ITEMS {
        items.upsert(&NewItem::stock(*code, Money::from_cents(*rate))).await?;
        items.set_actual_qty(code, WAREHOUSE, *qty).await?;
        items.set_price(code, PRICE_LIST, Money::from_cents(*rate)).await?;
    }
    println!("✓ {} stock items", STOCK_ITEMS.len());

    let grinder = NewItem {
        has_serial_no: true,
        ..NewItem::stock("GRINDER-PRO", Money::from_cents(12900))
    };
    items.upsert(&grinder).await?;
    items.set_actual_qty(&grinder.item_code, WAREHOUSE, 3.0).await?;
    let received = Utc::now() - Duration::days(3);
    for n in 1..=3 {
        items
            .add_serial_no(
                &format!("GRP-{:04}", n),
                &grinder.item_code,
                WAREHOUSE,
                received + Duration::minutes(n),
            )
            .await?;
    }
    println!("✓ Serial-tracked item with 3 serial numbers");

    items.upsert(&NewItem::service("GIFT-WRAP", Money::from_cents(250))).await?;
    println!("✓ Service item");

    let profiles = db.profiles();
    profiles
        .insert(&PosProfile {
            name: PROFILE.to_string(),
            company: COMPANY.to_string(),
            warehouse: Some(WAREHOUSE.to_string()),
            selling_price_list: Some(PRICE_LIST.to_string()),
            disable_rounded_total: false,
            payments: vec![
                ProfilePaymentMethod {
                    mode_of_payment: "Cash".to_string(),
                    is_default: true,
                },
                ProfilePaymentMethod {
                    mode_of_payment: "Card".to_string(),
                    is_default: false,
                },
            ],
        })
        .await?;
    profiles.assign_user(PROFILE, CASHIER, true).await?;
    profiles.set_account("Cash", COMPANY, "Cash - DC").await?;
    profiles.set_account("Card", COMPANY, "Bank - DC").await?;
    println!("✓ POS profile '{}' for {}", PROFILE, CASHIER);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
