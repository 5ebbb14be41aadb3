//! `import` and `export`.

use std::path::Path;

use serde_json::json;

use super::{Entity, Output};
use crate::error::AppResult;
use crate::state::AppState;
use crate::transfer::{self, ImportReport};

pub async fn run_import(state: &AppState, entity: Entity, path: &Path, output: Output) -> AppResult<()> {
    let db = state.db();
    let report = match entity {
        Entity::Products => transfer::import_products(db, path).await?,
        Entity::Customers => transfer::import_customers(db, path).await?,
        Entity::Invoices => transfer::import_invoices(db, path).await?,
    };
    output.emit(&report, |r: &ImportReport| {
        println!("{} imported, {} skipped", r.inserted, r.skipped)
    })
}

pub async fn run_export(state: &AppState, entity: Entity, path: &Path, output: Output) -> AppResult<()> {
    let db = state.db();
    let written = match entity {
        Entity::Products => transfer::export_products(db, path).await?,
        Entity::Customers => transfer::export_customers(db, path).await?,
        Entity::Invoices => transfer::export_invoices(db, path).await?,
    };
    output.emit(&json!({ "written": written, "path": path }), |_| {
        println!("{} rows written to {}", written, path.display())
    })
}
