//! Invoice files.
//!
//! Unlike products and customers, invoice files are positional: the first
//! line is skipped, and each following line is either an invoice or, with
//! `ITEM` in the 7th column, a line of the invoice above it.
//!
//! ```text
//! InvoiceId,InvoiceDate,CustomerName,...,EmployeeId      ← skipped
//! 12,2026-03-01T09:30:00Z,Ana,...,1                      ← group starts
//! 12,4,PEN-01,Pen,3,5000.00,ITEM,15000.00                ← item of 12
//! 13,2026-03-01T10:02:11Z,,...,1                         ← flush 12, start 13
//! ```

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use tally_core::codec::{
    self, invoice_header_record, invoice_item_record, InvoiceGroup, InvoiceGrouper, InvoiceItemRow,
    INVOICE_HEADERS,
};
use tally_core::{Customer, Id, InvoiceLine, NewCustomer, NewInvoice, NewInvoiceItem, PaymentMethod};
use tally_db::{Database, DbError, DbResult};

use super::{create_writer, open_reader, ImportError, ImportReport, ImportResult};

/// Writes every invoice, ordered by id, each followed by its lines.
pub async fn export_invoices(db: &Database, path: &Path) -> ImportResult<usize> {
    let customers: HashMap<Id, Customer> = db
        .customers()
        .list()
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();
    let invoices = db.invoices().list_by_id().await?;

    let mut lines: HashMap<Id, Vec<InvoiceLine>> = HashMap::new();
    for line in db.invoices().all_lines().await? {
        lines.entry(line.invoice_id).or_default().push(line);
    }

    let mut writer = create_writer(path)?;
    writer.write_record(INVOICE_HEADERS)?;
    for invoice in &invoices {
        let customer = invoice.customer_id.and_then(|id| customers.get(&id));
        writer.write_record(invoice_header_record(invoice, customer))?;
        for line in lines.get(&invoice.id).into_iter().flatten() {
            writer.write_record(invoice_item_record(line))?;
        }
    }
    writer.flush().map_err(csv::Error::from)?;

    info!(path = %path.display(), count = invoices.len(), "Invoices exported");
    Ok(invoices.len())
}

/// Reads invoices and saves each through the normal invoice path, so stock
/// is decremented (floored at zero). Stored totals are kept as written.
///
/// Items whose product matches neither code nor id are dropped; an invoice
/// left with no items is skipped. Customers are matched by name and phone
/// and created when unknown. Employee ids that are unknown or inactive fall
/// back to the first active account.
///
/// ## Errors
/// - `NoEmployee` when there is no active account; checked before any
///   invoice is written
///
/// Any other failure only skips the invoice group it happened in.
pub async fn import_invoices(db: &Database, path: &Path) -> ImportResult<ImportReport> {
    let mut reader = open_reader(path)?;
    let mut grouper = InvoiceGrouper::new();
    let mut import = InvoiceImport::new(db).await?;

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Unreadable invoice line skipped");
                continue;
            }
        };
        if codec::is_blank(&record) {
            continue;
        }
        if let Some(group) = grouper.push(&record) {
            import.flush(group).await;
        }
    }
    if let Some(group) = grouper.finish() {
        import.flush(group).await;
    }

    if grouper.orphan_items() > 0 {
        warn!(count = grouper.orphan_items(), "Item lines before the first invoice skipped");
    }

    let report = import.report;
    info!(
        path = %path.display(),
        inserted = report.inserted,
        skipped = report.skipped,
        "Invoices imported"
    );
    Ok(report)
}

/// Why one invoice group was not stored.
#[derive(Debug, Error)]
enum GroupSkipped {
    #[error("no usable items")]
    NoItems,

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Lookups cached for one import call.
struct InvoiceImport<'a> {
    db: &'a Database,
    default_employee: Id,
    /// Employee id → active account exists.
    employees: HashMap<Id, bool>,
    customers: HashMap<(String, String), Id>,
    report: ImportReport,
}

impl<'a> InvoiceImport<'a> {
    async fn new(db: &'a Database) -> ImportResult<InvoiceImport<'a>> {
        let default_employee = db
            .accounts()
            .default_employee()
            .await?
            .ok_or(ImportError::NoEmployee)?;
        Ok(InvoiceImport {
            db,
            default_employee: default_employee.id,
            employees: HashMap::new(),
            customers: HashMap::new(),
            report: ImportReport::default(),
        })
    }

    async fn flush(&mut self, group: InvoiceGroup) {
        let source_id = group.header.invoice_id;
        match self.store(group).await {
            Ok(id) => {
                debug!(source = ?source_id, invoice_id = id, "Invoice imported");
                self.report.inserted += 1;
            }
            Err(e) => {
                warn!(invoice = ?source_id, reason = %e, "Invoice skipped");
                self.report.skipped += 1;
            }
        }
    }

    async fn store(&mut self, group: InvoiceGroup) -> Result<Id, GroupSkipped> {
        let source_id = group.header.invoice_id;

        let mut items = Vec::with_capacity(group.items.len());
        for row in &group.items {
            match self.resolve_item(row).await? {
                Some(item) => items.push(item),
                None => warn!(
                    invoice = ?source_id,
                    code = ?row.product_code,
                    product_id = ?row.product_id,
                    "Invoice item skipped"
                ),
            }
        }
        if items.is_empty() {
            return Err(GroupSkipped::NoItems);
        }

        let employee_id = self.resolve_employee(group.header.employee_id).await?;
        let customer_id = self.resolve_customer(&group).await?;

        let header = group.header;
        let invoice = NewInvoice {
            customer_id,
            employee_id,
            subtotal: header.subtotal,
            tax_percent: header.tax_percent,
            tax_amount: header.tax_amount,
            discount: header.discount,
            total: header.total,
            paid: header.paid,
            payment_method: PaymentMethod::Cash,
            items,
            created_at: header.created_at,
        };
        Ok(self.db.invoices().save_invoice(&invoice).await?)
    }

    /// Product by code, then by id. `None` when neither matches or the
    /// quantity is not positive.
    async fn resolve_item(&self, row: &InvoiceItemRow) -> DbResult<Option<NewInvoiceItem>> {
        if row.quantity <= 0 {
            return Ok(None);
        }

        let mut product = None;
        if let Some(code) = &row.product_code {
            product = self.db.products().get_by_code(code).await?;
        }
        if product.is_none() {
            if let Some(id) = row.product_id {
                product = self.db.products().get_by_id(id).await?;
            }
        }

        Ok(product.map(|p| NewInvoiceItem {
            product_id: p.id,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }))
    }

    /// The file's employee when that account exists and is active,
    /// otherwise the default employee.
    async fn resolve_employee(&mut self, employee_id: Option<Id>) -> DbResult<Id> {
        let Some(id) = employee_id else {
            return Ok(self.default_employee);
        };
        let active = match self.employees.get(&id) {
            Some(active) => *active,
            None => {
                let active = self
                    .db
                    .accounts()
                    .get_by_id(id)
                    .await?
                    .is_some_and(|a| a.is_active);
                self.employees.insert(id, active);
                active
            }
        };
        Ok(if active { id } else { self.default_employee })
    }

    /// Walk-in when the name is blank; otherwise get-or-create by name and
    /// phone.
    async fn resolve_customer(&mut self, group: &InvoiceGroup) -> DbResult<Option<Id>> {
        let header = &group.header;
        let Some(name) = &header.customer_name else {
            return Ok(None);
        };
        let phone = header.customer_phone.as_deref();
        let key = (name.to_lowercase(), phone.unwrap_or_default().to_string());
        if let Some(id) = self.customers.get(&key) {
            return Ok(Some(*id));
        }

        let customer = match self.db.customers().find_by_name_phone(name, phone).await? {
            Some(existing) => existing,
            None => {
                self.db
                    .customers()
                    .insert_imported(&NewCustomer {
                        name: name.clone(),
                        phone: header.customer_phone.clone(),
                        email: header.customer_email.clone(),
                        address: header.customer_address.clone(),
                        ..Default::default()
                    })
                    .await?
            }
        };
        self.customers.insert(key, customer.id);
        Ok(Some(customer.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tally_core::{Money, NewAccount, NewProduct, Percent, Role};
    use tally_db::DbConfig;

    async fn store() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.accounts()
            .insert(&NewAccount {
                username: "cashier".to_string(),
                full_name: "Cashier".to_string(),
                role: Role::Cashier,
            })
            .await
            .unwrap();
        for (code, price) in [("PEN-01", 5_000), ("INK-02", 12_000)] {
            db.products()
                .insert(&NewProduct {
                    code: code.to_string(),
                    name: format!("Item {code}"),
                    sale_price: Money::from_major(price),
                    stock_quantity: 50,
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        db
    }

    fn item(product: &tally_core::Product, quantity: i64) -> NewInvoiceItem {
        NewInvoiceItem {
            product_id: product.id,
            quantity,
            unit_price: product.sale_price,
        }
    }

    async fn sell(db: &Database, customer_id: Option<Id>, items: Vec<NewInvoiceItem>) -> Id {
        let subtotal = items
            .iter()
            .map(|i| i.line_total().unwrap())
            .fold(Money::zero(), |acc, m| acc + m);
        let tax_amount = subtotal.percent_of(Percent::from_whole(10));
        db.invoices()
            .save_invoice(&NewInvoice {
                customer_id,
                employee_id: 1,
                subtotal,
                tax_percent: Percent::from_whole(10),
                tax_amount,
                discount: Money::zero(),
                total: subtotal + tax_amount,
                paid: subtotal + tax_amount,
                payment_method: PaymentMethod::Cash,
                items,
                created_at: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_export_then_import_reconstructs_invoices() {
        let source = store().await;
        let pen = source.products().get_by_code("PEN-01").await.unwrap().unwrap();
        let ink = source.products().get_by_code("INK-02").await.unwrap().unwrap();
        let ana = source
            .customers()
            .insert(&NewCustomer {
                name: "Ana".to_string(),
                phone: Some("0912345678".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        sell(&source, Some(ana.id), vec![item(&pen, 2), item(&ink, 1)]).await;
        sell(&source, None, vec![item(&pen, 1)]).await;
        sell(&source, Some(ana.id), vec![item(&ink, 3)]).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoices.csv");
        assert_eq!(export_invoices(&source, &path).await.unwrap(), 3);

        let target = store().await;
        let report = import_invoices(&target, &path).await.unwrap();
        assert_eq!(report, ImportReport { inserted: 3, skipped: 0 });

        let originals = source.invoices().list_by_id().await.unwrap();
        let copies = target.invoices().list_by_id().await.unwrap();
        assert_eq!(copies.len(), originals.len());
        for (original, copy) in originals.iter().zip(&copies) {
            assert_eq!(copy.total, original.total);
            assert_eq!(copy.subtotal, original.subtotal);
            assert_eq!(copy.tax_amount, original.tax_amount);
            assert_eq!(copy.tax_percent, original.tax_percent);
            assert_eq!(copy.customer_id.is_some(), original.customer_id.is_some());
            assert_eq!(
                target.invoices().items(copy.id).await.unwrap().len(),
                source.invoices().items(original.id).await.unwrap().len()
            );
        }

        // One customer created and reused for both of Ana's invoices
        assert_eq!(target.customers().count().await.unwrap(), 1);

        // Imported sales move stock like live ones: 50 - 2 - 1
        assert_eq!(target.products().get_by_code("PEN-01").await.unwrap().unwrap().stock_quantity, 47);
    }

    #[tokio::test]
    async fn test_grouping_edge_cases() {
        let db = store().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoices.csv");
        fs::write(
            &path,
            "InvoiceId,InvoiceDate,CustomerName,CustomerPhone,CustomerEmail,CustomerAddress,Subtotal,TaxPercent,TaxAmount,Discount,Total,Paid,EmployeeId\n\
             9,99,PEN-01,Pen,1,5000,ITEM,5000\n\
             1,2026-03-01 09:30:00,,,,,5000,0,0,0,5000,5000,77\n\
             1,0,PEN-01,Pen,1,5000,ITEM,5000\n\
             2,2026-03-01,,,,,1000,0,0,0,1000,1000,1\n\
             2,0,GONE,Ghost,1,1000,item,1000\n\
             3,2026-03-02,Bao,,,,9000,0,0,0,9000,9000,1\n\
             3,2,,,2,4500,ITEM,9000\n\
             3,1,,,0,4500,ITEM,0\n",
        )
        .unwrap();

        let report = import_invoices(&db, &path).await.unwrap();
        // 1 imported with employee 77 falling back, 2 has no resolvable
        // item, 3 keeps only INK-02 found by id
        assert_eq!(report, ImportReport { inserted: 2, skipped: 1 });

        let invoices = db.invoices().list_by_id().await.unwrap();
        assert_eq!(invoices[0].employee_id, 1);
        assert_eq!(invoices[0].created_at.to_rfc3339(), "2026-03-01T09:30:00+00:00");
        assert_eq!(db.invoices().items(invoices[1].id).await.unwrap().len(), 1);
        assert_eq!(db.invoices().lines(invoices[1].id).await.unwrap()[0].product_code, "INK-02");
        assert!(invoices[1].customer_id.is_some());
    }

    #[tokio::test]
    async fn test_unknown_or_inactive_employee_falls_back() {
        let db = store().await;
        let retired = db
            .accounts()
            .insert(&NewAccount {
                username: "retired".to_string(),
                full_name: "Retired".to_string(),
                role: Role::Cashier,
            })
            .await
            .unwrap();
        db.accounts().set_active(retired.id, false).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoices.csv");
        let header = "InvoiceId,InvoiceDate,CustomerName,CustomerPhone,CustomerEmail,CustomerAddress,Subtotal,TaxPercent,TaxAmount,Discount,Total,Paid,EmployeeId";
        fs::write(
            &path,
            format!(
                "{header}\n\
                 1,2026-03-01,,,,,5000,0,0,0,5000,5000,{}\n\
                 1,0,PEN-01,Pen,1,5000,ITEM,5000\n\
                 2,2026-03-01,,,,,5000,0,0,0,5000,5000,99\n\
                 2,0,PEN-01,Pen,1,5000,ITEM,5000\n",
                retired.id
            ),
        )
        .unwrap();

        let report = import_invoices(&db, &path).await.unwrap();
        assert_eq!(report, ImportReport { inserted: 2, skipped: 0 });
        for invoice in db.invoices().list_by_id().await.unwrap() {
            assert_eq!(invoice.employee_id, 1);
        }
    }

    #[tokio::test]
    async fn test_rejected_invoice_does_not_stop_the_rest() {
        let db = store().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoices.csv");
        fs::write(
            &path,
            "header\n\
             1,2026-03-01,,,,,0,0,0,0,0,0,1\n\
             1,0,PEN-01,Pen,2,50000000000000000.00,ITEM,0\n\
             2,2026-03-01,,,,,5000,0,0,0,5000,5000,1\n\
             2,0,PEN-01,Pen,1,5000,ITEM,5000\n",
        )
        .unwrap();

        let report = import_invoices(&db, &path).await.unwrap();
        assert_eq!(report, ImportReport { inserted: 1, skipped: 1 });
        // Only the second invoice moved stock
        assert_eq!(db.products().get_by_code("PEN-01").await.unwrap().unwrap().stock_quantity, 49);
    }

    #[tokio::test]
    async fn test_no_employee_aborts() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products()
            .insert(&NewProduct {
                code: "PEN-01".to_string(),
                name: "Pen".to_string(),
                stock_quantity: 5,
                ..Default::default()
            })
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoices.csv");
        fs::write(&path, "header\n1,2026-03-01,,,,,0,0,0,0,0,0,\n1,1,PEN-01,Pen,1,0,ITEM,0\n").unwrap();

        assert!(matches!(
            import_invoices(&db, &path).await,
            Err(ImportError::NoEmployee)
        ));
    }
}
