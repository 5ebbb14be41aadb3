//! # Seed Data Generator
//!
//! Populates a database with demo categories, products, customers and an
//! admin account for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p tally-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p tally-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db
//! ```
//!
//! Product codes follow `{CATEGORY}-{INDEX}`; prices land between 5,000.00
//! and 84,900.00 with the purchase price at 60-80% of the sale price.

use std::path::PathBuf;

use clap::Parser;
use tally_core::{Money, NewAccount, NewCustomer, NewProduct, Role, Tier};
use tally_db::{Database, DbConfig};

/// Category name, code prefix and product names.
const CATEGORIES: &[(&str, &str, &[&str])] = &[
    (
        "Stationery",
        "STA",
        &["Ballpoint Pen", "Gel Pen", "Pencil", "Eraser", "Ruler", "Notebook", "Stapler", "Sticky Notes"],
    ),
    (
        "Beverages",
        "BEV",
        &["Mineral Water", "Green Tea", "Iced Coffee", "Orange Juice", "Soda", "Energy Drink"],
    ),
    (
        "Snacks",
        "SNK",
        &["Potato Chips", "Peanuts", "Chocolate Bar", "Cookies", "Dried Mango", "Rice Crackers"],
    ),
    (
        "Household",
        "HOU",
        &["Dish Soap", "Sponge", "Trash Bags", "Paper Towels", "Laundry Powder", "Light Bulb"],
    ),
];

const PACKS: &[(&str, i64)] = &[("", 0), ("Pack of 3", 8_000), ("Box of 12", 30_000)];

/// Name, phone, starting points.
const CUSTOMERS: &[(&str, &str, i64)] = &[
    ("Nguyen Van An", "0901234567", 0),
    ("Tran Thi Binh", "0912345678", 150),
    ("Le Minh Chau", "0923456789", 620),
    ("Pham Quoc Dung", "0934567890", 1_450),
];

/// Fills a database with demo data.
#[derive(Debug, Parser)]
#[command(name = "seed", about = "Tally POS seed data generator")]
struct Args {
    /// Number of products to generate
    #[arg(short, long, default_value_t = 200)]
    count: usize,

    /// Database file path
    #[arg(short, long, default_value = "./tally_dev.db")]
    db: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Args { count, db: db_path } = Args::parse();

    println!("Tally POS Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path.display());
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    if db.accounts().get_by_username("admin").await?.is_none() {
        db.accounts()
            .insert(&NewAccount {
                username: "admin".to_string(),
                full_name: "Store Admin".to_string(),
                role: Role::Admin,
            })
            .await?;
        println!("✓ Created admin account");
    }

    let mut generated = 0;
    let start = std::time::Instant::now();

    'outer: for (category_name, prefix, names) in CATEGORIES {
        let category = db.categories().get_or_create(category_name).await?;

        for name in names.iter() {
            for (pack, addon) in PACKS {
                if generated >= count {
                    break 'outer;
                }

                let product = generate_product(prefix, name, pack, *addon, category.id, generated);
                if let Err(e) = db.products().insert(&product).await {
                    eprintln!("Failed to insert {}: {}", product.code, e);
                    continue;
                }
                generated += 1;
            }
        }
    }

    println!("✓ Generated {} products in {:?}", generated, start.elapsed());

    let policy = tally_core::TierPolicy::default();
    for (name, phone, points) in CUSTOMERS {
        let tier: Tier = policy.tier_for(*points);
        db.customers()
            .insert(&NewCustomer {
                name: name.to_string(),
                phone: Some(phone.to_string()),
                customer_type: Some("retail".to_string()),
                tier,
                points: *points,
                ..Default::default()
            })
            .await?;
    }
    println!("✓ Created {} customers", CUSTOMERS.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds one product with deterministic pseudo-random price and stock.
fn generate_product(prefix: &str, name: &str, pack: &str, addon: i64, category_id: i64, seed: usize) -> NewProduct {
    let code = format!("{}-{:04}", prefix, seed + 1);
    let full_name = if pack.is_empty() {
        name.to_string()
    } else {
        format!("{} ({})", name, pack)
    };

    let base = 5_000 + ((seed * 37) % 50) as i64 * 1_000;
    let sale_price = Money::from_major(base + addon);
    let cost_pct = 60 + (seed % 21) as i64;
    let purchase_price = Money::from_minor(sale_price.minor() * cost_pct / 100);
    let stock = ((seed * 13) % 120) as i64;

    NewProduct {
        code,
        name: full_name,
        category_id: Some(category_id),
        sale_price,
        purchase_price,
        purchase_unit: Some("unit".to_string()),
        import_quantity: stock,
        stock_quantity: stock,
        description: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_args_defaults_and_overrides() {
        let args = Args::try_parse_from(["seed"]).unwrap();
        assert_eq!(args.count, 200);
        assert_eq!(args.db, PathBuf::from("./tally_dev.db"));

        let args = Args::try_parse_from(["seed", "-c", "15", "--db", "demo.db"]).unwrap();
        assert_eq!(args.count, 15);
        assert_eq!(args.db, PathBuf::from("demo.db"));

        assert!(Args::try_parse_from(["seed", "--count", "many"]).is_err());
    }

    #[test]
    fn test_generated_product_is_valid() {
        let product = generate_product("STA", "Pen", "Box of 12", 30_000, 1, 7);
        assert_eq!(product.code, "STA-0008");
        assert_eq!(product.name, "Pen (Box of 12)");
        assert!(product.validate().is_ok());
        assert!(product.purchase_price < product.sale_price);
    }
}
