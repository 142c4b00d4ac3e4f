//! # Seed Data Generator
//!
//! Populates the database with pharmacy test data for development.
//!
//! ## Usage
//! ```bash
//! # Default: 2 stores, full catalog, 40 sales
//! cargo run -p apotheca-db --bin seed
//!
//! # Generate custom amount of sales
//! cargo run -p apotheca-db --bin seed -- --sales 200
//!
//! # Specify database path
//! cargo run -p apotheca-db --bin seed -- --db ./data/apotheca.db
//! ```
//!
//! ## Generated Data
//! - Two stores (PHX, RWL) with distinct return-number prefixes
//! - A realistic dual-unit medicine catalog: strips of tablets sold whole
//!   or as loose units, plus container-only items (syrups, inhalers)
//! - Sales spread over the past ~45 days, so some fall outside the default
//!   30-day return window and some past the manager-approval threshold
//! - A few medicines with past expiry dates to exercise expiry warnings

use chrono::{Duration, Utc};
use std::env;
use uuid::Uuid;

use apotheca_core::types::{Medicine, Sale, SaleLine, SaleStatus, Store};
use apotheca_core::units::UnitType;
use apotheca_db::{Database, DbConfig};

/// Medicine catalog: (name, generic, units_per_container,
/// container_price_cents, individual_price_cents, sell_by_individual)
const CATALOG: &[(&str, &str, i64, i64, Option<i64>, bool)] = &[
    ("Amoxicillin 500mg Capsules", "amoxicillin", 10, 2000, Some(200), true),
    ("Paracetamol 500mg Tablets", "paracetamol", 20, 1000, Some(50), true),
    ("Ibuprofen 200mg Tablets", "ibuprofen", 24, 1440, Some(60), true),
    ("Omeprazole 20mg Capsules", "omeprazole", 14, 2100, Some(150), true),
    ("Cetirizine 10mg Tablets", "cetirizine", 10, 800, Some(80), true),
    ("Metformin 500mg Tablets", "metformin", 30, 1500, Some(50), true),
    ("Amlodipine 5mg Tablets", "amlodipine", 28, 1960, Some(70), true),
    ("Azithromycin 250mg Tablets", "azithromycin", 6, 1800, Some(300), true),
    ("Atorvastatin 10mg Tablets", "atorvastatin", 30, 2400, Some(80), true),
    ("Losartan 50mg Tablets", "losartan", 28, 2240, Some(80), true),
    ("ORS Sachets", "oral rehydration salts", 10, 500, Some(50), true),
    ("Vitamin D3 1000IU Softgels", "cholecalciferol", 30, 1200, Some(40), true),
    ("Cough Syrup 120ml", "dextromethorphan", 1, 650, None, false),
    ("Insulin Glargine 100IU/ml", "insulin glargine", 1, 9500, None, false),
    ("Salbutamol Inhaler 100mcg", "salbutamol", 1, 1250, None, false),
];

/// Stores to create: (name, code)
const STORES: &[(&str, &str)] = &[
    ("Phoenix Pharmacy", "PHX"),
    ("Rawal Road Branch", "RWL"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Quiet by default; RUST_LOG=apotheca_db=debug surfaces the SQL layer
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut sales_count: usize = 40;
    let mut db_path = String::from("./apotheca_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--sales" | "-s" => {
                if i + 1 < args.len() {
                    sales_count = args[i + 1].parse().unwrap_or(40);
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
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --sales <COUNT>  Number of sales to generate (default: 40)");
                println!("  -d, --db <PATH>      Database file path (default: ./apotheca_dev.db)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Apotheca Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!("Sales:    {}", sales_count);
    println!();

    // Connect to database
    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing data
    let existing = db.medicines().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} medicines", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Stores
    println!();
    println!("Creating stores...");

    let mut stores = Vec::new();
    for (name, code) in STORES {
        let store = Store {
            id: Uuid::new_v4().to_string(),
            name: (*name).to_string(),
            code: (*code).to_string(),
            created_at: Utc::now(),
        };
        db.stores().insert(&store).await?;
        println!("  {} ({})", store.name, store.code);
        stores.push(store);
    }

    // Medicines: full catalog per store
    println!();
    println!("Generating medicines...");

    let mut medicines: Vec<Medicine> = Vec::new();
    for store in &stores {
        for (idx, spec) in CATALOG.iter().enumerate() {
            let medicine = generate_medicine(&store.id, idx, spec);
            db.medicines().insert(&medicine).await?;
            medicines.push(medicine);
        }
    }
    println!("  Generated {} medicines across {} stores", medicines.len(), stores.len());

    // Sales
    println!();
    println!("Generating sales...");

    let start = std::time::Instant::now();
    let mut generated = 0;
    let mut line_count = 0;

    for s in 0..sales_count {
        let store = &stores[s % stores.len()];
        let store_medicines: Vec<&Medicine> = medicines
            .iter()
            .filter(|m| m.store_id == store.id)
            .collect();

        let (sale, lines) = generate_sale(store, &store_medicines, s);

        db.sales().insert_sale(&sale).await?;
        for line in &lines {
            db.sales().insert_line(line).await?;
        }

        generated += 1;
        line_count += lines.len();

        if generated % 25 == 0 {
            println!("  Generated {} sales...", generated);
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ Generated {} sales ({} lines) in {:?}",
        generated, line_count, elapsed
    );

    // Verify lookups
    println!();
    println!("Verifying...");

    let sample_invoice = format!("INV-{}-{:05}", stores[0].code, 1);
    match db.sales().get_by_invoice(&sample_invoice).await? {
        Some(sale) => {
            let lines = db.sales().get_lines(&sale.id).await?;
            println!("  Lookup '{}': {} lines, {} cents", sample_invoice, lines.len(), sale.total_cents);
        }
        None => println!("  ⚠ Lookup '{}' found nothing", sample_invoice),
    }

    let returned = db.returns().get_returned_quantities("nonexistent").await?;
    println!("  Returned quantities on fresh data: {} rows", returned.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single medicine with deterministic pseudo-random fields.
fn generate_medicine(
    store_id: &str,
    idx: usize,
    spec: &(&str, &str, i64, i64, Option<i64>, bool),
) -> Medicine {
    let (name, generic, units_per_container, container_price, individual_price, sell_individual) =
        *spec;
    let now = Utc::now();

    // Most expiries are comfortably in the future; every 11th is already
    // past, so the expiry warning path has data to chew on.
    let expiry_days: i64 = if idx % 11 == 10 {
        -45
    } else {
        200 + ((idx * 31) % 400) as i64
    };

    Medicine {
        id: Uuid::new_v4().to_string(),
        store_id: store_id.to_string(),
        name: name.to_string(),
        generic_name: Some(generic.to_string()),
        batch_number: Some(format!("B{:04}", 1000 + idx * 17)),
        expiry_date: Some((now + Duration::days(expiry_days)).date_naive()),
        sell_by_container: true,
        sell_by_individual: sell_individual,
        units_per_container,
        container_price_cents: container_price,
        individual_price_cents: individual_price,
        container_stock: 10 + ((idx * 7) % 40) as i64,
        individual_stock: if sell_individual {
            ((idx * 13) % 60) as i64
        } else {
            0
        },
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// Generates one sale with 1-3 lines against the store's catalog.
///
/// Sale dates spread over the past ~45 days so the seeded data exercises
/// the return window boundary and the manager-approval threshold.
fn generate_sale(store: &Store, medicines: &[&Medicine], seq: usize) -> (Sale, Vec<SaleLine>) {
    let now = Utc::now();
    let sale_id = Uuid::new_v4().to_string();
    let sale_date = now - Duration::days((seq % 45) as i64);

    let line_total = |unit_price: i64, quantity: i64| unit_price * quantity;

    let mut lines = Vec::new();
    let n_lines = 1 + (seq % 3);
    for l in 0..n_lines {
        let medicine = medicines[(seq * 5 + l * 3) % medicines.len()];

        // Every third line goes out in loose units when the medicine allows
        let individual = medicine.sell_by_individual && (seq + l) % 3 == 0;
        let (unit_type, quantity, unit_price) = if individual {
            (
                UnitType::Individual,
                5 + ((seq + l) % 11) as i64,
                medicine.individual_price_cents.unwrap_or(0),
            )
        } else {
            (
                UnitType::Container,
                1 + ((seq + l) % 4) as i64,
                medicine.container_price_cents,
            )
        };

        lines.push(SaleLine {
            id: Uuid::new_v4().to_string(),
            sale_id: sale_id.clone(),
            medicine_id: medicine.id.clone(),
            medicine_name: medicine.name.clone(),
            batch_number: medicine.batch_number.clone(),
            quantity,
            unit_type,
            unit_price_cents: unit_price,
            line_total_cents: line_total(unit_price, quantity),
            created_at: sale_date,
        });
    }

    let subtotal: i64 = lines.iter().map(|l| l.line_total_cents).sum();

    let sale = Sale {
        id: sale_id,
        store_id: store.id.clone(),
        customer_id: if seq % 4 == 0 {
            Some(format!("cust-{:04}", seq % 12))
        } else {
            None
        },
        invoice_number: format!("INV-{}-{:05}", store.code, seq + 1),
        status: SaleStatus::Completed,
        is_returned: false,
        subtotal_cents: subtotal,
        total_cents: subtotal,
        sale_date,
        created_at: sale_date,
        updated_at: sale_date,
    };

    (sale, lines)
}
