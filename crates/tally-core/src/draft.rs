//! # Invoice Draft
//!
//! The invoice being built at the counter, before it is committed.
//!
//! ## Line Merging
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add(Pen, 5000.00, 2)   → [Pen ×2 @5000.00]                             │
//! │  add(Pen, 5000.00, 1)   → [Pen ×3 @5000.00]            same price: merge│
//! │  add(Pen, 4500.00, 1)   → [Pen ×3 @5000.00, Pen ×1 @4500.00]  new line │
//! │                                                                         │
//! │  Stock is checked against the SUM over all lines of the product:       │
//! │  stock 4 → the last add is allowed (3 + 1), another one is not.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stock Freshness
//! The draft never caches stock. Every operation that raises a quantity
//! takes the available stock as read from the database just before the
//! call, and [`InvoiceDraft::verify_stock`] re-checks the whole draft right
//! before commit. A failed check leaves the draft unchanged.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, Percent};
use crate::pricing::{self, Discount, InvoiceTotals, LineItem};
use crate::types::{Id, NewInvoiceItem, Product};
use crate::validation;
use crate::MAX_ITEM_QUANTITY;

/// A line in the draft.
///
/// Code and name are captured when the line is added so the draft displays
/// consistently even if the product is renamed meanwhile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftLine {
    pub product_id: Id,
    pub code: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
}

impl DraftLine {
    /// Cannot overflow once the line is in a draft: the price is within
    /// `Money::MAX` and the quantity within `MAX_ITEM_QUANTITY`.
    pub fn line_total(&self) -> Money {
        pricing::line_total(self.unit_price, self.quantity).unwrap_or(Money::MAX)
    }
}

/// An invoice under construction.
///
/// ## Invariants
/// - Lines are unique by `(product_id, unit_price)`
/// - Every quantity is in `1..=MAX_ITEM_QUANTITY`
/// - At most `MAX_DRAFT_LINES` lines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    lines: Vec<DraftLine>,
}

impl InvoiceDraft {
    /// Creates an empty draft.
    pub fn new() -> Self {
        InvoiceDraft::default()
    }

    pub fn lines(&self) -> &[DraftLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units of a product across all lines.
    pub fn quantity_of(&self, product_id: Id) -> i64 {
        self.lines
            .iter()
            .filter(|l| l.product_id == product_id)
            .map(|l| l.quantity)
            .sum()
    }

    /// Adds `quantity` units of `product` at `unit_price`.
    ///
    /// `product.stock_quantity` must be the freshly-read persisted stock.
    ///
    /// ## Returns
    /// Index of the line that now holds the units.
    ///
    /// ## Errors
    /// - `Validation` for a non-positive or oversized quantity
    /// - `InsufficientStock` when the product's cumulative quantity would
    ///   exceed stock
    /// - `QuantityTooLarge` when a merged line would exceed the maximum
    /// - `DraftTooLarge` when a new line does not fit
    pub fn add(&mut self, product: &Product, unit_price: Money, quantity: i64) -> CoreResult<usize> {
        validation::validate_quantity(quantity)?;
        validation::validate_money("unit price", unit_price)?;

        let requested = self.quantity_of(product.id) + quantity;
        check_stock(product, requested)?;

        if let Some(index) = self
            .lines
            .iter()
            .position(|l| l.product_id == product.id && l.unit_price == unit_price)
        {
            let merged = self.lines[index].quantity + quantity;
            if merged > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: merged,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            self.lines[index].quantity = merged;
            return Ok(index);
        }

        validation::validate_draft_size(self.lines.len()).map_err(|_| CoreError::DraftTooLarge {
            max: crate::MAX_DRAFT_LINES,
        })?;

        self.lines.push(DraftLine {
            product_id: product.id,
            code: product.code.clone(),
            name: product.name.clone(),
            unit_price,
            quantity,
        });
        Ok(self.lines.len() - 1)
    }

    /// Sets the quantity of a line. Zero removes the line.
    ///
    /// `product` must carry the freshly-read stock of the line's product.
    pub fn set_quantity(&mut self, index: usize, quantity: i64, product: &Product) -> CoreResult<()> {
        let (line_product, current) = self
            .lines
            .get(index)
            .map(|l| (l.product_id, l.quantity))
            .ok_or(CoreError::LineNotFound(index))?;
        if quantity == 0 {
            self.lines.remove(index);
            return Ok(());
        }
        validation::validate_quantity(quantity)?;
        if line_product != product.id {
            return Err(CoreError::ProductNotFound(product.code.clone()));
        }

        let requested = self.quantity_of(product.id) - current + quantity;
        if quantity > current {
            check_stock(product, requested)?;
        }

        self.lines[index].quantity = quantity;
        Ok(())
    }

    /// Removes a line.
    pub fn remove(&mut self, index: usize) -> CoreResult<DraftLine> {
        if index >= self.lines.len() {
            return Err(CoreError::LineNotFound(index));
        }
        Ok(self.lines.remove(index))
    }

    /// Removes every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Re-checks every product in the draft against freshly-read stock.
    ///
    /// ## Arguments
    /// * `stock` - Product id → persisted stock quantity. A product missing
    ///   from the map no longer exists.
    pub fn verify_stock(&self, stock: &HashMap<Id, i64>) -> CoreResult<()> {
        if self.lines.is_empty() {
            return Err(CoreError::EmptyInvoice);
        }

        let mut requested: Vec<(Id, &str, i64)> = Vec::new();
        for line in &self.lines {
            match requested.iter_mut().find(|(id, _, _)| *id == line.product_id) {
                Some(entry) => entry.2 += line.quantity,
                None => requested.push((line.product_id, line.code.as_str(), line.quantity)),
            }
        }

        for (product_id, code, quantity) in requested {
            let available = *stock
                .get(&product_id)
                .ok_or_else(|| CoreError::ProductNotFound(code.to_string()))?;
            if quantity > available {
                return Err(CoreError::InsufficientStock {
                    product: code.to_string(),
                    available,
                    requested: quantity,
                });
            }
        }
        Ok(())
    }

    /// Lines in calculator form.
    pub fn line_items(&self) -> Vec<LineItem> {
        self.lines
            .iter()
            .map(|l| LineItem::new(l.product_id, l.quantity, l.unit_price))
            .collect()
    }

    /// Lines in persistence form.
    pub fn to_new_items(&self) -> Vec<NewInvoiceItem> {
        self.lines
            .iter()
            .map(|l| NewInvoiceItem {
                product_id: l.product_id,
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect()
    }

    /// Runs the calculator over the draft.
    ///
    /// ## Errors
    /// - `Validation(AmountTooLarge)` when the lines add up beyond
    ///   `Money::MAX`
    pub fn totals(&self, tax: Percent, manual: Discount, tier_discount: Percent, paid: Money) -> CoreResult<InvoiceTotals> {
        pricing::calculate(&self.line_items(), tax, manual, tier_discount, paid)
    }
}

fn check_stock(product: &Product, requested: i64) -> CoreResult<()> {
    if !product.can_sell(requested) {
        return Err(CoreError::InsufficientStock {
            product: product.code.clone(),
            available: product.stock_quantity,
            requested,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
