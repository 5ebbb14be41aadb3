//! Invoice and report commands.

use serde::Serialize;
use tracing::info;

use tally_core::{Invoice, InvoiceLine, InvoiceTotals, Money};
use tally_db::{Database, SalesReport};

use super::{confirm, CheckoutArgs, InvoiceCommand, Output, ReportArgs};
use crate::error::{AppError, AppResult};
use crate::services::{self, CheckoutReceipt, CheckoutRequest, PreparedInvoice};
use crate::state::AppState;

/// An invoice with its lines, as printed by `invoice show`.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub change_due: Money,
    pub lines: Vec<InvoiceLine>,
}

pub async fn run_invoice(state: &AppState, command: InvoiceCommand, output: Output) -> AppResult<()> {
    let db = state.db();
    match command {
        InvoiceCommand::Checkout(args) => {
            let receipt = services::checkout(state, &request_from(args)).await?;
            output.emit(&receipt, print_receipt)
        }
        InvoiceCommand::Quote(args) => {
            let prepared = services::prepare(state, &request_from(args)).await?;
            output.emit(&prepared, print_quote)
        }
        InvoiceCommand::Show { id } => {
            let detail = invoice_detail(db, id).await?;
            output.emit(&detail, print_detail)
        }
        InvoiceCommand::List(period) => {
            let invoices = db.invoices().list(period.from, period.to).await?;
            output.emit(&invoices, |list| {
                for i in list {
                    println!(
                        "{:>6}  {}  {:>14}  {}",
                        i.id,
                        i.created_at.format("%Y-%m-%d %H:%M"),
                        i.total,
                        i.payment_method
                    );
                }
                println!("{} invoices", list.len());
            })
        }
        InvoiceCommand::Delete { id } => {
            db.invoices().delete_invoice(id).await?;
            output.emit(&serde_json::json!({ "deleted": id }), |_| {
                println!("Invoice {} deleted, stock restored", id)
            })
        }
        InvoiceCommand::Purge { yes } => {
            confirm(yes, "invoices")?;
            let deleted = db.invoices().purge_all().await?;
            output.emit(&serde_json::json!({ "deleted": deleted }), |_| {
                println!("{} invoices deleted, stock restored", deleted)
            })
        }
    }
}

pub async fn run_report(state: &AppState, args: ReportArgs, output: Output) -> AppResult<()> {
    let report = state
        .db()
        .invoices()
        .sales_report(args.period.from, args.period.to, args.top)
        .await?;
    info!(invoices = report.invoice_count, total = %report.total, "Report built");
    output.emit(&report, print_report)
}

fn request_from(args: CheckoutArgs) -> CheckoutRequest {
    let discount = args.discount();
    CheckoutRequest {
        items: args.items,
        customer_id: args.customer,
        employee: args.employee,
        tax: args.tax,
        discount,
        paid: args.paid,
        payment_method: args.method,
    }
}

pub async fn invoice_detail(db: &Database, id: tally_core::Id) -> AppResult<InvoiceDetail> {
    let invoice = db
        .invoices()
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice", &id.to_string()))?;
    let lines = db.invoices().lines(id).await?;
    Ok(InvoiceDetail {
        change_due: invoice.change_due(),
        invoice,
        lines,
    })
}

// =============================================================================
// Text Output
// =============================================================================

fn print_totals(t: &InvoiceTotals) {
    println!("  {:<18}{:>14}", "Subtotal", t.subtotal);
    println!("  {:<18}{:>14}", format!("Tax {}", t.tax_percent), t.tax_amount);
    if !t.manual_discount.is_zero() {
        println!("  {:<18}{:>14}", "Discount", t.manual_discount);
    }
    if !t.tier_discount.is_zero() {
        println!("  {:<18}{:>14}", "Member discount", t.tier_discount);
    }
    println!("  {:<18}{:>14}", "Total", t.total);
    println!("  {:<18}{:>14}", "Paid", t.paid);
    println!("  {:<18}{:>14}", "Change", t.change_due);
}

fn print_quote(p: &PreparedInvoice) {
    for line in &p.lines {
        println!("  {:<12} {:<24} {:>4} x {:>12} = {:>14}", line.code, line.name, line.quantity, line.unit_price, line.line_total());
    }
    if let Some(tier) = p.tier {
        println!("  Member tier {}", tier);
    }
    print_totals(&p.totals);
}

fn print_receipt(r: &CheckoutReceipt) {
    println!("Invoice #{} ({})", r.invoice_id, r.invoice.payment_method);
    print_quote(&r.invoice);
    if let Some(points) = r.points_awarded {
        println!("  +{} points", points);
    }
    if let Some(tier) = r.new_tier {
        println!("  Tier now {}", tier);
    }
}

fn print_detail(d: &InvoiceDetail) {
    let i = &d.invoice;
    println!("Invoice #{}  {}  {}", i.id, i.created_at.format("%Y-%m-%d %H:%M:%S"), i.payment_method);
    match i.customer_id {
        Some(id) => println!("  customer #{}", id),
        None => println!("  walk-in"),
    }
    for line in &d.lines {
        println!("  {:<12} {:<24} {:>4} x {:>12} = {:>14}", line.product_code, line.product_name, line.quantity, line.unit_price, line.line_total);
    }
    println!("  {:<18}{:>14}", "Subtotal", i.subtotal);
    println!("  {:<18}{:>14}", format!("Tax {}", i.tax_percent), i.tax_amount);
    println!("  {:<18}{:>14}", "Discount", i.discount);
    println!("  {:<18}{:>14}", "Total", i.total);
    println!("  {:<18}{:>14}", "Paid", i.paid);
    println!("  {:<18}{:>14}", "Change", d.change_due);
}

fn print_report(r: &SalesReport) {
    let bound = |d: Option<chrono::DateTime<chrono::Utc>>| {
        d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_else(|| "..".to_string())
    };
    println!("Sales {} to {}", bound(r.from), bound(r.to));
    println!("  {:<18}{:>14}", "Invoices", r.invoice_count);
    println!("  {:<18}{:>14}", "Subtotal", r.subtotal);
    println!("  {:<18}{:>14}", "Tax", r.tax_amount);
    println!("  {:<18}{:>14}", "Discount", r.discount);
    println!("  {:<18}{:>14}", "Total", r.total);
    println!("  {:<18}{:>14}", "Paid", r.paid);
    if !r.top_products.is_empty() {
        println!("Best sellers");
        for p in &r.top_products {
            println!("  {:<12} {:<24} {:>6} {:>14}", p.code, p.name, p.quantity, p.revenue);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::state::SettingsStore;
    use tally_core::{Discount, NewAccount, NewProduct, Percent};
    use tally_db::DbConfig;

    async fn state(dir: &tempfile::TempDir) -> AppState {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.accounts()
            .insert(&NewAccount {
                username: "cashier".to_string(),
                full_name: "Cashier".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        db.products()
            .insert(&NewProduct {
                code: "PEN".to_string(),
                name: "Pen".to_string(),
                sale_price: Money::from_major(5_000),
                stock_quantity: 5,
                ..Default::default()
            })
            .await
            .unwrap();
        AppState::new(db, SettingsStore::new(dir.path().join("settings.json")))
    }

    fn args(items: &[&str]) -> CheckoutArgs {
        CheckoutArgs {
            items: items.iter().map(|s| s.parse().unwrap()).collect(),
            customer: None,
            employee: None,
            tax: Some(Percent::from_whole(10)),
            discount: Some("1000".to_string()),
            discount_percent: false,
            paid: None,
            method: None,
        }
    }

    #[test]
    fn test_request_from_args() {
        let request = request_from(args(&["PEN:2"]));
        assert_eq!(request.items.len(), 1);
        assert_eq!(request.discount, Discount::Amount(Money::from_major(1_000)));
        assert_eq!(request.tax, Some(Percent::from_whole(10)));
    }

    #[tokio::test]
    async fn test_checkout_then_show_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;

        run_invoice(&state, InvoiceCommand::Checkout(args(&["PEN:2"])), Output::default())
            .await
            .unwrap();

        let invoices = state.db().invoices().list_by_id().await.unwrap();
        assert_eq!(invoices.len(), 1);
        let detail = invoice_detail(state.db(), invoices[0].id).await.unwrap();
        // 10000 + 1000 tax - 1000 discount
        assert_eq!(detail.invoice.total, Money::from_major(10_000));
        assert_eq!(detail.lines.len(), 1);
        assert_eq!(detail.change_due, Money::zero());

        run_invoice(&state, InvoiceCommand::Delete { id: invoices[0].id }, Output::default())
            .await
            .unwrap();
        assert_eq!(state.db().products().get_by_code("PEN").await.unwrap().unwrap().stock_quantity, 5);
    }

    #[tokio::test]
    async fn test_quote_saves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;

        run_invoice(&state, InvoiceCommand::Quote(args(&["PEN:2"])), Output { json: true })
            .await
            .unwrap();
        assert_eq!(state.db().invoices().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_show_unknown_invoice() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;

        let err = invoice_detail(state.db(), 99).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_purge_requires_yes() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir).await;

        let err = run_invoice(&state, InvoiceCommand::Purge { yes: false }, Output::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
