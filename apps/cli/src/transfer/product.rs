//! Product files.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};

use tally_core::codec::{self, product_record, CodeGenerator, HeaderMap, ProductRow, PRODUCT_COLUMNS, PRODUCT_HEADERS};
use tally_core::Id;
use tally_db::Database;

use super::{create_writer, line_of, open_reader, ImportReport, ImportResult};

/// Writes every product, ordered by id.
///
/// ## Returns
/// Number of products written.
pub async fn export_products(db: &Database, path: &Path) -> ImportResult<usize> {
    let categories: HashMap<Id, String> = db
        .categories()
        .list()
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    let products = db.products().list().await?;

    let mut writer = create_writer(path)?;
    writer.write_record(PRODUCT_HEADERS)?;
    for product in &products {
        let category = product
            .category_id
            .and_then(|id| categories.get(&id))
            .map(String::as_str);
        writer.write_record(product_record(product, category))?;
    }
    writer.flush().map_err(csv::Error::from)?;

    info!(path = %path.display(), count = products.len(), "Products exported");
    Ok(products.len())
}

/// Reads products from a file with a header line.
///
/// Missing `Name` or `Price` columns abort before anything is written.
/// Rows with a blank name, and rows the database refuses (duplicate code,
/// invalid values), are skipped.
pub async fn import_products(db: &Database, path: &Path) -> ImportResult<ImportReport> {
    let mut reader = open_reader(path)?;
    let map = HeaderMap::resolve(reader.headers()?, PRODUCT_COLUMNS)?;

    let mut codes = CodeGenerator::new(db.products().list_codes().await?);
    let mut categories = CategoryResolver::default();
    let mut report = ImportReport::default();

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Unreadable product row skipped");
                report.skipped += 1;
                continue;
            }
        };
        if codec::is_blank(&record) {
            continue;
        }

        let line = line_of(&record);
        let Some(row) = ProductRow::from_record(&map, &record) else {
            debug!(line = line, "Product row without name skipped");
            report.skipped += 1;
            continue;
        };

        let code = match &row.code {
            Some(code) => {
                codes.reserve(code);
                code.clone()
            }
            None => codes.generate(),
        };

        let category_id = match categories.resolve(db, &row).await {
            Ok(id) => id,
            Err(e) => {
                warn!(line = line, error = %e, "Product category could not be resolved; row skipped");
                report.skipped += 1;
                continue;
            }
        };

        match db.products().insert_imported(&row.into_new_product(code, category_id)).await {
            Ok(_) => report.inserted += 1,
            Err(e) => {
                warn!(line = line, error = %e, "Product row skipped");
                report.skipped += 1;
            }
        }
    }

    info!(
        path = %path.display(),
        inserted = report.inserted,
        skipped = report.skipped,
        "Products imported"
    );
    Ok(report)
}

/// Category lookups for one import.
///
/// Names are matched ignoring case; the first spelling seen creates the
/// category. Numeric ids are only kept when the category exists.
#[derive(Debug, Default)]
struct CategoryResolver {
    by_name: HashMap<String, Id>,
    known_ids: HashMap<Id, bool>,
}

impl CategoryResolver {
    async fn resolve(&mut self, db: &Database, row: &ProductRow) -> tally_db::DbResult<Option<Id>> {
        if let Some(name) = &row.category_name {
            let key = name.to_lowercase();
            if let Some(id) = self.by_name.get(&key) {
                return Ok(Some(*id));
            }
            let category = db.categories().get_or_create(name).await?;
            self.by_name.insert(key, category.id);
            return Ok(Some(category.id));
        }

        let Some(id) = row.category_id else {
            return Ok(None);
        };
        let exists = match self.known_ids.get(&id) {
            Some(exists) => *exists,
            None => {
                let exists = db.categories().get_by_id(id).await?.is_some();
                self.known_ids.insert(id, exists);
                exists
            }
        };
        Ok(exists.then_some(id))
    }
}
