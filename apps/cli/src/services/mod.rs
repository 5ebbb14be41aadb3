//! # Services
//!
//! Multi-step operations that combine settings, core rules and several
//! repositories. Commands stay thin and call into here.

pub mod checkout;

pub use checkout::{checkout, prepare, CheckoutReceipt, CheckoutRequest, ItemSpec, PreparedInvoice};
