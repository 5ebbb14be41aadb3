//! Customer and account commands.

use tracing::info;

use tally_core::{Account, Customer, Id, NewAccount, NewCustomer, TierPolicy};
use tally_db::Database;

use super::{confirm, AccountCommand, CustomerArgs, CustomerCommand, CustomerPatch, Output};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

// =============================================================================
// Customers
// =============================================================================

pub async fn run_customer(state: &AppState, command: CustomerCommand, output: Output) -> AppResult<()> {
    let db = state.db();
    match command {
        CustomerCommand::Add(args) => {
            let tiers = state.load_settings()?.loyalty.tiers;
            let customer = add_customer(db, &tiers, args).await?;
            output.emit(&customer, print_customer)
        }
        CustomerCommand::Update { id, fields } => {
            let customer = update_customer(db, id, fields).await?;
            output.emit(&customer, print_customer)
        }
        CustomerCommand::Show { id } => {
            let customer = db
                .customers()
                .get_by_id(id)
                .await?
                .ok_or_else(|| AppError::not_found("Customer", &id.to_string()))?;
            output.emit(&customer, print_customer)
        }
        CustomerCommand::List => {
            let customers = db.customers().list().await?;
            output.emit(&customers, |c| print_customers(c))
        }
        CustomerCommand::Search { query } => {
            let customers = db.customers().search(&query).await?;
            output.emit(&customers, |c| print_customers(c))
        }
        CustomerCommand::Delete { id } => {
            db.customers().delete(id).await?;
            output.emit(&serde_json::json!({ "deleted": id }), |_| {
                println!("Customer {} deleted", id)
            })
        }
        CustomerCommand::Purge { yes } => {
            confirm(yes, "customers")?;
            let deleted = db.customers().purge_all().await?;
            output.emit(&serde_json::json!({ "deleted": deleted }), |_| {
                println!("{} customers deleted", deleted)
            })
        }
    }
}

/// Inserts a customer. Without an explicit tier, the tier follows the
/// opening points under the current policy.
pub async fn add_customer(db: &Database, tiers: &TierPolicy, args: CustomerArgs) -> AppResult<Customer> {
    let points = args.points.max(0);
    let customer = db
        .customers()
        .insert(&NewCustomer {
            name: args.name,
            phone: args.phone,
            email: args.email,
            customer_type: args.customer_type,
            address: args.address,
            tier: args.tier.unwrap_or_else(|| tiers.tier_for(points)),
            points,
        })
        .await?;

    info!(id = customer.id, tier = %customer.tier, "Customer added");
    Ok(customer)
}

/// Contact fields only; tier and points change through checkout.
pub async fn update_customer(db: &Database, id: Id, patch: CustomerPatch) -> AppResult<Customer> {
    let current = db
        .customers()
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("Customer", &id.to_string()))?;

    let updated = NewCustomer {
        name: patch.name.unwrap_or(current.name),
        phone: patch.phone.or(current.phone),
        email: patch.email.or(current.email),
        customer_type: patch.customer_type.or(current.customer_type),
        address: patch.address.or(current.address),
        tier: current.tier,
        points: current.points,
    };
    Ok(db.customers().update(id, &updated).await?)
}

fn print_customer(c: &Customer) {
    println!("#{} {}  {} ({} points)", c.id, c.name, c.tier, c.points);
    for value in [&c.phone, &c.email, &c.address, &c.customer_type].into_iter().flatten() {
        println!("  {}", value);
    }
}

fn print_customers(customers: &[Customer]) {
    for c in customers {
        println!(
            "{:>5}  {:<28} {:<14} {:<9} {:>7}",
            c.id,
            c.name,
            c.phone.as_deref().unwrap_or("-"),
            c.tier,
            c.points
        );
    }
    println!("{} customers", customers.len());
}

// =============================================================================
// Accounts
// =============================================================================

pub async fn run_account(state: &AppState, command: AccountCommand, output: Output) -> AppResult<()> {
    let accounts = state.db().accounts();
    match command {
        AccountCommand::Add {
            username,
            full_name,
            role,
        } => {
            let account = accounts
                .insert(&NewAccount {
                    username,
                    full_name,
                    role,
                })
                .await?;
            output.emit(&account, print_account)
        }
        AccountCommand::List => {
            let list = accounts.list().await?;
            output.emit(&list, |list| {
                for a in list {
                    print_account(a);
                }
            })
        }
        AccountCommand::Activate { id } => {
            accounts.set_active(id, true).await?;
            output.emit(&serde_json::json!({ "id": id, "active": true }), |_| {
                println!("Account {} activated", id)
            })
        }
        AccountCommand::Deactivate { id } => {
            accounts.set_active(id, false).await?;
            output.emit(&serde_json::json!({ "id": id, "active": false }), |_| {
                println!("Account {} deactivated", id)
            })
        }
        AccountCommand::Delete { id } => {
            accounts.delete(id).await?;
            output.emit(&serde_json::json!({ "deleted": id }), |_| {
                println!("Account {} deleted", id)
            })
        }
    }
}

fn print_account(a: &Account) {
    let status = if a.is_active { "" } else { "  (inactive)" };
    println!("{:>5}  {:<16} {:<28} {}{}", a.id, a.username, a.full_name, a.role, status);
}
