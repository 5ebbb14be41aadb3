//! Product and category commands.

use tracing::{info, warn};

use tally_core::codec::product::DEFAULT_PURCHASE_RATIO;
use tally_core::codec::CodeGenerator;
use tally_core::{Category, Id, NewCategory, NewProduct, Product};
use tally_db::{Database, DbError};

use super::{confirm, CategoryCommand, Output, ProductArgs, ProductCommand, ProductPatch};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

// =============================================================================
// Products
// =============================================================================

pub async fn run_product(state: &AppState, command: ProductCommand, output: Output) -> AppResult<()> {
    let db = state.db();
    match command {
        ProductCommand::Add(args) => {
            let product = add_product(db, args).await?;
            output.emit(&product, print_product)
        }
        ProductCommand::Update { id, fields } => {
            let product = update_product(db, id, fields).await?;
            output.emit(&product, print_product)
        }
        ProductCommand::Show { key } => {
            let product = find_product(db, &key)
                .await?
                .ok_or_else(|| AppError::not_found("Product", &key))?;
            output.emit(&product, print_product)
        }
        ProductCommand::List => {
            let products = db.products().list().await?;
            output.emit(&products, |p| print_products(p))
        }
        ProductCommand::Search { query } => {
            let products = db.products().search(&query).await?;
            output.emit(&products, |p| print_products(p))
        }
        ProductCommand::Delete { id } => {
            db.products().delete(id).await.map_err(log_refusal)?;
            output.emit(&serde_json::json!({ "deleted": id }), |_| {
                println!("Product {} deleted", id)
            })
        }
        ProductCommand::Purge { yes } => {
            confirm(yes, "products")?;
            let deleted = db.products().purge_all().await.map_err(log_refusal)?;
            output.emit(&serde_json::json!({ "deleted": deleted }), |_| {
                println!("{} products deleted", deleted)
            })
        }
    }
}

/// Inserts a product, generating a `P{n}` code and defaulting the
/// purchase price to 80% of the sale price.
pub async fn add_product(db: &Database, args: ProductArgs) -> AppResult<Product> {
    let code = match args.code {
        Some(code) => code,
        None => CodeGenerator::new(db.products().list_codes().await?).generate(),
    };
    let category_id = resolve_category(db, args.category.as_deref()).await?;

    let product = db
        .products()
        .insert(&NewProduct {
            code,
            name: args.name,
            category_id,
            sale_price: args.price,
            purchase_price: args
                .purchase_price
                .unwrap_or_else(|| args.price.percent_of(DEFAULT_PURCHASE_RATIO)),
            purchase_unit: args.unit,
            import_quantity: args.stock,
            stock_quantity: args.stock,
            description: args.description,
        })
        .await?;

    info!(id = product.id, code = %product.code, "Product added");
    Ok(product)
}

pub async fn update_product(db: &Database, id: Id, patch: ProductPatch) -> AppResult<Product> {
    let current = db
        .products()
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Product", &id.to_string()))?;

    let category_id = match patch.category.as_deref() {
        Some(name) => resolve_category(db, Some(name)).await?,
        None => current.category_id,
    };

    let updated = NewProduct {
        code: patch.code.unwrap_or(current.code),
        name: patch.name.unwrap_or(current.name),
        category_id,
        sale_price: patch.price.unwrap_or(current.sale_price),
        purchase_price: patch.purchase_price.unwrap_or(current.purchase_price),
        purchase_unit: patch.unit.or(current.purchase_unit),
        import_quantity: current.import_quantity,
        stock_quantity: patch.stock.unwrap_or(current.stock_quantity),
        description: patch.description.or(current.description),
    };
    Ok(db.products().update(id, &updated).await?)
}

/// By code first, then by numeric id.
async fn find_product(db: &Database, key: &str) -> AppResult<Option<Product>> {
    if let Some(product) = db.products().get_by_code(key).await? {
        return Ok(Some(product));
    }
    match key.trim().parse::<Id>() {
        Ok(id) => Ok(db.products().get_by_id(id).await?),
        Err(_) => Ok(None),
    }
}

async fn resolve_category(db: &Database, name: Option<&str>) -> AppResult<Option<Id>> {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => Ok(Some(db.categories().get_or_create(name).await?.id)),
        None => Ok(None),
    }
}

/// Integrity refusals are expected operator mistakes, not failures.
fn log_refusal(error: DbError) -> AppError {
    if let DbError::Referenced { .. } = &error {
        warn!(error = %error, "Delete refused");
    }
    error.into()
}

fn print_product(p: &Product) {
    println!("#{} {} {}", p.id, p.code, p.name);
    println!("  price {}  cost {}  stock {}", p.sale_price, p.purchase_price, p.stock_quantity);
    if let Some(unit) = &p.purchase_unit {
        println!("  unit {}", unit);
    }
    if let Some(description) = &p.description {
        println!("  {}", description);
    }
}

fn print_products(products: &[Product]) {
    for p in products {
        println!("{:>5}  {:<12} {:<32} {:>14} {:>7}", p.id, p.code, p.name, p.sale_price, p.stock_quantity);
    }
    println!("{} products", products.len());
}

// =============================================================================
// Categories
// =============================================================================

pub async fn run_category(state: &AppState, command: CategoryCommand, output: Output) -> AppResult<()> {
    let db = state.db();
    match command {
        CategoryCommand::Add { name, description } => {
            let category = db.categories().insert(&NewCategory { name, description }).await?;
            output.emit(&category, print_category)
        }
        CategoryCommand::Rename { id, name } => {
            let current = db
                .categories()
                .get_by_id(id)
                .await?
                .ok_or_else(|| AppError::not_found("Category", &id.to_string()))?;
            let category = db
                .categories()
                .update(
                    id,
                    &NewCategory {
                        name,
                        description: current.description,
                    },
                )
                .await?;
            output.emit(&category, print_category)
        }
        CategoryCommand::List => {
            let categories = db.categories().list().await?;
            output.emit(&categories, |list| {
                for c in list {
                    print_category(c);
                }
            })
        }
        CategoryCommand::Delete { id } => {
            db.categories().delete(id).await.map_err(log_refusal)?;
            output.emit(&serde_json::json!({ "deleted": id }), |_| {
                println!("Category {} deleted", id)
            })
        }
        CategoryCommand::Purge { yes } => {
            confirm(yes, "categories")?;
            let deleted = db.categories().purge_all().await.map_err(log_refusal)?;
            output.emit(&serde_json::json!({ "deleted": deleted }), |_| {
                println!("{} categories deleted", deleted)
            })
        }
    }
}

fn print_category(c: &Category) {
    match &c.description {
        Some(d) => println!("{:>5}  {}  ({})", c.id, c.name, d),
        None => println!("{:>5}  {}", c.id, c.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::Money;
    use tally_db::DbConfig;

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn pen() -> ProductArgs {
        ProductArgs {
            name: "Pen".to_string(),
            code: None,
            price: Money::from_major(5_000),
            purchase_price: None,
            category: Some("Stationery".to_string()),
            unit: None,
            stock: 12,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_add_product_defaults() {
        let db = db().await;
        let product = add_product(&db, pen()).await.unwrap();

        assert_eq!(product.code, "P1");
        assert_eq!(product.purchase_price, Money::from_major(4_000));
        assert_eq!(product.import_quantity, 12);
        let category = db.categories().get_by_name("Stationery").await.unwrap().unwrap();
        assert_eq!(product.category_id, Some(category.id));

        let second = add_product(&db, pen()).await.unwrap();
        assert_eq!(second.code, "P2");
        assert_eq!(db.categories().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_keeps_unspecified_fields() {
        let db = db().await;
        let product = add_product(&db, pen()).await.unwrap();

        let updated = update_product(
            &db,
            product.id,
            ProductPatch {
                price: Some(Money::from_major(6_000)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.sale_price, Money::from_major(6_000));
        assert_eq!(updated.purchase_price, product.purchase_price);
        assert_eq!(updated.category_id, product.category_id);
        assert_eq!(updated.stock_quantity, 12);
    }

    #[tokio::test]
    async fn test_update_unknown_product() {
        let db = db().await;
        let err = update_product(&db, 42, ProductPatch::default()).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_find_by_code_or_id() {
        let db = db().await;
        let product = add_product(&db, pen()).await.unwrap();

        assert_eq!(find_product(&db, "P1").await.unwrap().unwrap().id, product.id);
        assert_eq!(find_product(&db, &product.id.to_string()).await.unwrap().unwrap().id, product.id);
        assert!(find_product(&db, "nope").await.unwrap().is_none());
    }
}
