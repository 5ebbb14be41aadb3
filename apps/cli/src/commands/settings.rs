//! `settings` subcommands. These read and write the settings file only.

use serde::Serialize;

use super::{Output, SettingsCommand};
use crate::error::AppResult;
use crate::state::{Settings, SettingsStore};

#[derive(Serialize)]
struct SettingsView<'a> {
    path: &'a std::path::Path,
    #[serde(flatten)]
    settings: &'a Settings,
}

pub fn run_settings(store: &SettingsStore, command: SettingsCommand, output: Output) -> AppResult<()> {
    let settings = apply(store, command)?;
    let view = SettingsView {
        path: store.path(),
        settings: &settings,
    };
    output.emit(&view, print_settings)
}

/// Applies a change and saves. `Show` only loads.
///
/// ## Errors
/// - `BUSINESS_LOGIC` when a tier edit breaks threshold ordering; the file
///   is left unchanged
/// - `SETTINGS_ERROR` when the file cannot be read or written
pub fn apply(store: &SettingsStore, command: SettingsCommand) -> AppResult<Settings> {
    let mut settings = store.load()?;
    match command {
        SettingsCommand::Show => return Ok(settings),
        SettingsCommand::SetTax { percent } => settings.default_tax = percent,
        SettingsCommand::SetTier {
            tier,
            min_points,
            discount,
        } => {
            let rule = settings.loyalty.tiers.rule_mut(tier);
            if let Some(points) = min_points {
                rule.min_points = points;
            }
            if let Some(discount) = discount {
                rule.discount = discount;
            }
            settings.loyalty.tiers.validate()?;
        }
        SettingsCommand::SetSpend { amount } => {
            if !amount.is_positive() {
                return Err(crate::error::AppError::validation("Spend per point must be positive"));
            }
            settings.loyalty.spend_per_point = amount;
        }
        SettingsCommand::SetStore { name, address, phone } => {
            if let Some(name) = name {
                settings.store.name = name;
            }
            if let Some(address) = address {
                settings.store.address = address;
            }
            if let Some(phone) = phone {
                settings.store.phone = phone;
            }
        }
        SettingsCommand::SetPayment {
            method,
            bank_code,
            account_number,
            account_name,
        } => {
            if let Some(method) = method {
                settings.payment.default_method = method;
            }
            settings.payment.bank_code = bank_code.or(settings.payment.bank_code);
            settings.payment.account_number = account_number.or(settings.payment.account_number);
            settings.payment.account_name = account_name.or(settings.payment.account_name);
        }
        SettingsCommand::SetDb { path } => settings.database_path = Some(path),
    }
    store.save(&settings)?;
    Ok(settings)
}

fn print_settings(view: &SettingsView<'_>) {
    let s = view.settings;
    println!("Settings file  {}", view.path.display());
    if let Some(db) = &s.database_path {
        println!("Database       {}", db.display());
    }
    println!("Store          {}  {}  {}", s.store.name, s.store.address, s.store.phone);
    println!("Default tax    {}", s.default_tax);
    println!("Payment        {}", s.payment.default_method);
    if let (Some(bank), Some(number)) = (&s.payment.bank_code, &s.payment.account_number) {
        println!("               {} {} {}", bank, number, s.payment.account_name.as_deref().unwrap_or(""));
    }
    println!("Spend / point  {}", s.loyalty.spend_per_point);
    for tier in tally_core::Tier::ALL {
        let rule = s.loyalty.tiers.rule(tier);
        println!("  {:<9} from {:>6} points  {}", tier, rule.min_points, rule.discount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use tally_core::{Money, PaymentMethod, Percent, Tier};

    fn store(dir: &tempfile::TempDir) -> SettingsStore {
        SettingsStore::new(dir.path().join("nested").join("settings.json"))
    }

    #[test]
    fn test_set_tax_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        apply(
            &store,
            SettingsCommand::SetTax {
                percent: Percent::from_whole(8),
            },
        )
        .unwrap();

        assert_eq!(store.load().unwrap().default_tax, Percent::from_whole(8));
    }

    #[test]
    fn test_invalid_tier_edit_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let err = apply(
            &store,
            SettingsCommand::SetTier {
                tier: Tier::Silver,
                min_points: Some(5_000),
                discount: None,
            },
        )
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::BusinessLogic);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_set_tier_discount() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        apply(
            &store,
            SettingsCommand::SetTier {
                tier: Tier::Gold,
                min_points: None,
                discount: Some(Percent::from_whole(9)),
            },
        )
        .unwrap();

        let tiers = store.load().unwrap().loyalty.tiers;
        assert_eq!(tiers.discount_for(Tier::Gold), Percent::from_whole(9));
    }

    #[test]
    fn test_payment_fields_merge() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        apply(
            &store,
            SettingsCommand::SetPayment {
                method: Some(PaymentMethod::BankTransfer),
                bank_code: Some("970436".to_string()),
                account_number: None,
                account_name: None,
            },
        )
        .unwrap();
        apply(
            &store,
            SettingsCommand::SetPayment {
                method: None,
                bank_code: None,
                account_number: Some("0011002233".to_string()),
                account_name: None,
            },
        )
        .unwrap();

        let payment = store.load().unwrap().payment;
        assert_eq!(payment.default_method, PaymentMethod::BankTransfer);
        assert_eq!(payment.bank_code.as_deref(), Some("970436"));
        assert_eq!(payment.account_number.as_deref(), Some("0011002233"));
    }

    #[test]
    fn test_zero_spend_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = apply(&store(&dir), SettingsCommand::SetSpend { amount: Money::zero() }).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
