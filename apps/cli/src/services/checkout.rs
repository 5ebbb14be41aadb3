//! # Checkout
//!
//! Turns an operator's item list into a saved invoice.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        checkout()                                       │
//! │                                                                         │
//! │  1. Load settings (fresh)        tax, tier policy, spend per point     │
//! │  2. Resolve employee, customer   customer's cached tier → discount     │
//! │  3. For each "CODE:QTY[@PRICE]"                                        │
//! │     ├── read product (fresh stock)                                     │
//! │     └── draft.add()              InsufficientStock → abort, no writes  │
//! │  4. Re-read stock for all lines, draft.verify_stock()                  │
//! │  5. Totals via the calculator                                          │
//! │  6. save_invoice()               one transaction, returns the id       │
//! │  7. Loyalty accrual              separate step; failure only logged    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps 1-5 are [`prepare`]; `tally quote` stops there. Steps 6-7 are
//! [`commit`], which never reads settings: the loyalty rules loaded in step
//! 1 travel with the prepared invoice, so nothing after the save can turn a
//! recorded sale into an error.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, info, warn};

use tally_core::{
    Account, CoreError, Customer, Discount, DraftLine, Id, InvoiceDraft, InvoiceTotals, Money, NewInvoice,
    PaymentMethod, Percent, Tier, ValidationError,
};
use tally_db::Database;

use crate::error::{AppError, AppResult};
use crate::state::{AppState, LoyaltySettings};

// =============================================================================
// Request
// =============================================================================

/// One `CODE:QTY[@PRICE]` argument.
///
/// Quantity defaults to 1 and the price to the product's sale price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSpec {
    pub code: String,
    pub quantity: i64,
    pub unit_price: Option<Money>,
}

impl FromStr for ItemSpec {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rest, unit_price) = match s.rsplit_once('@') {
            Some((rest, price)) => {
                let price = Money::parse_lenient(price)
                    .filter(|p| !p.is_negative())
                    .ok_or_else(|| ValidationError::invalid("item price", format!("'{}' is not a price", price.trim())))?;
                (rest, Some(price))
            }
            None => (s, None),
        };

        let (code, quantity) = match rest.rsplit_once(':') {
            Some((code, qty)) => {
                let qty = qty
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ValidationError::invalid("item quantity", format!("'{}' is not a number", qty.trim())))?;
                (code, qty)
            }
            None => (rest, 1),
        };

        let code = code.trim();
        if code.is_empty() {
            return Err(ValidationError::required("item code"));
        }

        Ok(ItemSpec {
            code: code.to_string(),
            quantity,
            unit_price,
        })
    }
}

impl fmt::Display for ItemSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.code, self.quantity)?;
        if let Some(price) = self.unit_price {
            write!(f, "@{}", price.to_decimal_string())?;
        }
        Ok(())
    }
}

/// Everything the operator entered at the counter.
#[derive(Debug, Clone, Default)]
pub struct CheckoutRequest {
    pub items: Vec<ItemSpec>,
    /// `None` for a walk-in sale.
    pub customer_id: Option<Id>,
    /// Username; defaults to the first active account.
    pub employee: Option<String>,
    /// Overrides the settings' default tax.
    pub tax: Option<Percent>,
    pub discount: Discount,
    /// Defaults to the exact total.
    pub paid: Option<Money>,
    /// Overrides the settings' default payment method.
    pub payment_method: Option<PaymentMethod>,
}

// =============================================================================
// Outcome
// =============================================================================

/// A priced, stock-checked invoice that has not been saved.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedInvoice {
    pub lines: Vec<DraftLine>,
    pub totals: InvoiceTotals,
    pub employee_id: Id,
    pub customer_id: Option<Id>,
    /// The customer's cached tier, used for the discount.
    pub tier: Option<Tier>,
    pub payment_method: PaymentMethod,
    #[serde(skip)]
    draft: InvoiceDraft,
    #[serde(skip)]
    customer: Option<Customer>,
    #[serde(skip)]
    loyalty: LoyaltySettings,
}

/// A saved invoice.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub invoice_id: Id,
    #[serde(flatten)]
    pub invoice: PreparedInvoice,
    /// `None` for walk-in sales and when the accrual could not be stored.
    pub points_awarded: Option<i64>,
    pub new_tier: Option<Tier>,
}

// =============================================================================
// Operations
// =============================================================================

/// Prices and stock-checks a request without writing anything.
///
/// ## Errors
/// - `NOT_FOUND` for an unknown product code, customer or employee
/// - `INSUFFICIENT_STOCK` when any product's total quantity exceeds stock
/// - `VALIDATION_ERROR` for an empty item list, a bad quantity or amounts
///   beyond the supported maximum
pub async fn prepare(state: &AppState, request: &CheckoutRequest) -> AppResult<PreparedInvoice> {
    if request.items.is_empty() {
        return Err(CoreError::EmptyInvoice.into());
    }

    let settings = state.load_settings()?;
    let db = state.db();

    let employee = resolve_employee(db, request.employee.as_deref()).await?;
    let customer = match request.customer_id {
        Some(id) => Some(
            db.customers()
                .get_by_id(id)
                .await?
                .ok_or_else(|| AppError::not_found("Customer", &id.to_string()))?,
        ),
        None => None,
    };

    let mut draft = InvoiceDraft::new();
    for spec in &request.items {
        let product = db
            .products()
            .get_by_code(&spec.code)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(spec.code.clone()))?;
        let unit_price = spec.unit_price.unwrap_or(product.sale_price);

        debug!(item = %spec, stock = product.stock_quantity, "Adding line");
        draft.add(&product, unit_price, spec.quantity)?;
    }

    // Stock may have moved while the lines were read
    let ids: Vec<Id> = draft
        .lines()
        .iter()
        .map(|l| l.product_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let stock = db.products().stock_levels(&ids).await?;
    draft.verify_stock(&stock)?;

    let tier = customer.as_ref().map(|c| c.tier);
    let tier_discount = tier
        .map(|t| settings.loyalty.tiers.discount_for(t))
        .unwrap_or_else(Percent::zero);
    let tax = request.tax.unwrap_or(settings.default_tax);

    let unpaid = draft.totals(tax, request.discount, tier_discount, Money::zero())?;
    let paid = request.paid.unwrap_or(unpaid.total);
    let totals = draft.totals(tax, request.discount, tier_discount, paid)?;

    Ok(PreparedInvoice {
        lines: draft.lines().to_vec(),
        totals,
        employee_id: employee.id,
        customer_id: customer.as_ref().map(|c| c.id),
        tier,
        payment_method: request.payment_method.unwrap_or(settings.payment.default_method),
        draft,
        customer,
        loyalty: settings.loyalty,
    })
}

/// Prepares, saves and credits loyalty points.
pub async fn checkout(state: &AppState, request: &CheckoutRequest) -> AppResult<CheckoutReceipt> {
    let prepared = prepare(state, request).await?;
    commit(state.db(), prepared).await
}

/// Saves a prepared invoice and credits loyalty points.
///
/// The invoice save always propagates its error. The loyalty step runs
/// after the invoice is committed; its failure is logged and reported as
/// `points_awarded: None`, never as an error.
pub async fn commit(db: &Database, prepared: PreparedInvoice) -> AppResult<CheckoutReceipt> {
    let totals = prepared.totals;

    let invoice = NewInvoice {
        customer_id: prepared.customer_id,
        employee_id: prepared.employee_id,
        subtotal: totals.subtotal,
        tax_percent: totals.tax_percent,
        tax_amount: totals.tax_amount,
        discount: totals.discount(),
        total: totals.total,
        paid: totals.paid,
        payment_method: prepared.payment_method,
        items: prepared.draft.to_new_items(),
        created_at: None,
    };
    let invoice_id = db.invoices().save_invoice(&invoice).await?;

    let accrual = match &prepared.customer {
        Some(customer) => accrue_loyalty(db, &prepared.loyalty, customer, totals.total).await,
        None => None,
    };

    info!(
        invoice_id = invoice_id,
        total = %totals.total,
        points = ?accrual.map(|a| a.0),
        "Checkout complete"
    );

    Ok(CheckoutReceipt {
        invoice_id,
        invoice: prepared,
        points_awarded: accrual.map(|a| a.0),
        new_tier: accrual.map(|a| a.1),
    })
}

async fn resolve_employee(db: &Database, username: Option<&str>) -> AppResult<Account> {
    let account = match username {
        Some(name) => db
            .accounts()
            .get_by_username(name)
            .await?
            .ok_or_else(|| AppError::not_found("Account", name))?,
        None => db.accounts().default_employee().await?.ok_or_else(|| {
            AppError::validation("No active employee account; create one with `tally account add`")
        })?,
    };

    if !account.is_active {
        return Err(AppError::validation(format!("Account '{}' is inactive", account.username)));
    }
    Ok(account)
}

/// Credits a sale to the customer. Returns `(awarded, tier)` or `None`
/// when the update failed.
async fn accrue_loyalty(db: &Database, loyalty: &LoyaltySettings, customer: &Customer, total: Money) -> Option<(i64, Tier)> {
    let accrual = loyalty.tiers.accrue(customer.points, total, loyalty.spend_per_point);

    match db.customers().update_loyalty(customer.id, accrual.points, accrual.tier).await {
        Ok(()) => {
            if accrual.tier != customer.tier {
                info!(customer_id = customer.id, from = %customer.tier, to = %accrual.tier, "Customer tier changed");
            }
            Some((accrual.awarded, accrual.tier))
        }
        Err(e) => {
            warn!(customer_id = customer.id, error = %e, "Loyalty update failed; invoice kept");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SettingsStore;
    use tally_core::{NewAccount, NewCustomer, NewProduct, Role};
    use tally_db::DbConfig;

    struct Fixture {
        state: AppState,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.accounts()
            .insert(&NewAccount {
                username: "cashier".to_string(),
                full_name: "Cashier".to_string(),
                role: Role::Cashier,
            })
            .await
            .unwrap();
        for (code, price, stock) in [("LAMP", 50_000, 10), ("PEN", 5_000, 1)] {
            db.products()
                .insert(&NewProduct {
                    code: code.to_string(),
                    name: code.to_string(),
                    sale_price: Money::from_major(price),
                    stock_quantity: stock,
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        let store = SettingsStore::new(dir.path().join("settings.json"));
        Fixture {
            state: AppState::new(db, store),
            _dir: dir,
        }
    }

    fn items(specs: &[&str]) -> Vec<ItemSpec> {
        specs.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_item_spec_parse() {
        assert_eq!(
            "PEN-01:3@4500".parse::<ItemSpec>().unwrap(),
            ItemSpec {
                code: "PEN-01".to_string(),
                quantity: 3,
                unit_price: Some(Money::from_major(4_500)),
            }
        );
        let plain: ItemSpec = "PEN-01".parse().unwrap();
        assert_eq!(plain.quantity, 1);
        assert_eq!(plain.unit_price, None);

        assert!("PEN-01:x".parse::<ItemSpec>().is_err());
        assert!(":2".parse::<ItemSpec>().is_err());
        assert!("PEN@abc".parse::<ItemSpec>().is_err());
    }

    #[tokio::test]
    async fn test_gold_customer_scenario() {
        let f = fixture().await;
        let customer = f
            .state
            .db()
            .customers()
            .insert(&NewCustomer {
                name: "Ana".to_string(),
                tier: Tier::Gold,
                points: 550,
                ..Default::default()
            })
            .await
            .unwrap();

        let receipt = checkout(
            &f.state,
            &CheckoutRequest {
                items: items(&["LAMP:2"]),
                customer_id: Some(customer.id),
                tax: Some(Percent::from_whole(10)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let totals = receipt.invoice.totals;
        assert_eq!(totals.subtotal, Money::from_major(100_000));
        assert_eq!(totals.tax_amount, Money::from_major(10_000));
        assert_eq!(totals.tier_discount, Money::from_major(7_000));
        assert_eq!(totals.total, Money::from_major(103_000));
        assert_eq!(receipt.points_awarded, Some(103));
        assert_eq!(receipt.new_tier, Some(Tier::Gold));

        let saved = f.state.db().invoices().get(receipt.invoice_id).await.unwrap().unwrap();
        assert_eq!(saved.total, Money::from_major(103_000));
        assert_eq!(saved.discount, Money::from_major(7_000));

        let reloaded = f.state.db().customers().get_by_id(customer.id).await.unwrap().unwrap();
        assert_eq!(reloaded.points, 653);

        let lamp = f.state.db().products().get_by_code("LAMP").await.unwrap().unwrap();
        assert_eq!(lamp.stock_quantity, 8);
    }

    #[tokio::test]
    async fn test_insufficient_stock_fails_before_saving() {
        let f = fixture().await;
        let err = checkout(
            &f.state,
            &CheckoutRequest {
                items: items(&["PEN:2"]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.code, crate::error::ErrorCode::InsufficientStock);
        assert_eq!(f.state.db().invoices().count().await.unwrap(), 0);
        let pen = f.state.db().products().get_by_code("PEN").await.unwrap().unwrap();
        assert_eq!(pen.stock_quantity, 1);
    }

    #[tokio::test]
    async fn test_split_lines_share_stock() {
        let f = fixture().await;
        // Same product at two prices: 1 + 1 exceeds the single unit in stock
        let err = prepare(
            &f.state,
            &CheckoutRequest {
                items: items(&["PEN:1", "PEN:1@4000"]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InsufficientStock);
    }

    #[tokio::test]
    async fn test_walk_in_sale_has_no_loyalty() {
        let f = fixture().await;
        let receipt = checkout(
            &f.state,
            &CheckoutRequest {
                items: items(&["LAMP:1", "LAMP:1"]),
                paid: Some(Money::from_major(120_000)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(receipt.invoice.lines.len(), 1);
        assert_eq!(receipt.invoice.lines[0].quantity, 2);
        assert_eq!(receipt.invoice.totals.change_due, Money::from_major(20_000));
        assert_eq!(receipt.points_awarded, None);
        assert_eq!(receipt.invoice.payment_method, PaymentMethod::Cash);

        let lamp = f.state.db().products().get_by_code("LAMP").await.unwrap().unwrap();
        assert_eq!(lamp.stock_quantity, 8);
    }

    #[tokio::test]
    async fn test_settings_change_applies_to_next_invoice() {
        let f = fixture().await;
        let request = CheckoutRequest {
            items: items(&["LAMP:1"]),
            ..Default::default()
        };

        let before = prepare(&f.state, &request).await.unwrap();
        assert_eq!(before.totals.tax_amount, Money::zero());

        f.state
            .settings()
            .update(|s| s.default_tax = Percent::from_whole(8))
            .unwrap();

        let after = prepare(&f.state, &request).await.unwrap();
        assert_eq!(after.totals.tax_amount, Money::from_major(4_000));
    }

    #[tokio::test]
    async fn test_unreadable_settings_after_prepare_do_not_fail_the_sale() {
        let f = fixture().await;
        let customer = f
            .state
            .db()
            .customers()
            .insert(&NewCustomer {
                name: "Bao".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let prepared = prepare(
            &f.state,
            &CheckoutRequest {
                items: items(&["LAMP:1"]),
                customer_id: Some(customer.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        std::fs::write(f.state.settings().path(), "{ not json").unwrap();

        let receipt = commit(f.state.db(), prepared).await.unwrap();
        assert_eq!(receipt.points_awarded, Some(50));
        assert_eq!(f.state.db().invoices().count().await.unwrap(), 1);
        assert!(f.state.load_settings().is_err());
    }

    #[tokio::test]
    async fn test_oversized_price_is_rejected_before_saving() {
        let f = fixture().await;
        let err = prepare(
            &f.state,
            &CheckoutRequest {
                items: items(&["LAMP:2@50000000000000000"]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.code, crate::error::ErrorCode::ValidationError);
        assert_eq!(f.state.db().invoices().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let f = fixture().await;
        let err = prepare(
            &f.state,
            &CheckoutRequest {
                items: items(&["NOPE"]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::NotFound);
    }
}
