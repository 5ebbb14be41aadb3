//! # Settings Store
//!
//! Application settings kept in a JSON file.
//!
//! ## Sources (Priority Order)
//! 1. Command line (`--db`, `--settings`)
//! 2. Environment variables (`TALLY_DB_PATH`, `TALLY_SETTINGS`,
//!    `TALLY_TAX_PERCENT`)
//! 3. Settings file (`<config dir>/tally/settings.json`)
//! 4. Defaults (this file)
//!
//! ## No Cache
//! [`SettingsStore::load`] reads the file every time it is called. Edits made
//! by another `tally` process (or by hand) apply to the very next invoice.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use tally_core::{Money, PaymentMethod, Percent, TierPolicy};

/// Environment variable overriding the settings file location.
pub const SETTINGS_ENV: &str = "TALLY_SETTINGS";

/// Environment variable overriding the database path.
pub const DB_PATH_ENV: &str = "TALLY_DB_PATH";

/// Environment variable overriding the default tax percent (e.g. "8.25").
pub const TAX_PERCENT_ENV: &str = "TALLY_TAX_PERCENT";

/// Settings file errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Cannot read settings file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Cannot write settings file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Settings file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Cannot serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Could not determine the platform config directory")]
    NoConfigDir,
}

// =============================================================================
// Settings
// =============================================================================

/// Everything stored in `settings.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite file. `None` means `<data dir>/tally.db`.
    pub database_path: Option<PathBuf>,

    pub store: StoreInfo,

    /// Tax applied to new invoices unless the command overrides it.
    #[serde(rename = "default_tax_bps")]
    pub default_tax: Percent,

    pub payment: PaymentSettings,

    pub loyalty: LoyaltySettings,
}

/// Store identity printed on receipts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreInfo {
    pub name: String,
    pub address: String,
    pub phone: String,
}

/// Payment preferences, including the bank account behind transfer QR codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSettings {
    pub default_method: PaymentMethod,
    pub bank_code: Option<String>,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
}

/// Point accrual and tier thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoyaltySettings {
    /// Spend that earns one point, in minor units.
    #[serde(rename = "spend_per_point_minor")]
    pub spend_per_point: Money,

    pub tiers: TierPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_path: None,
            store: StoreInfo::default(),
            default_tax: Percent::zero(),
            payment: PaymentSettings::default(),
            loyalty: LoyaltySettings::default(),
        }
    }
}

impl Default for StoreInfo {
    fn default() -> Self {
        StoreInfo {
            name: "Tally Store".to_string(),
            address: String::new(),
            phone: String::new(),
        }
    }
}

impl Default for PaymentSettings {
    fn default() -> Self {
        PaymentSettings {
            default_method: PaymentMethod::Cash,
            bank_code: None,
            account_number: None,
            account_name: None,
        }
    }
}

impl Default for LoyaltySettings {
    fn default() -> Self {
        LoyaltySettings {
            spend_per_point: Money::from_major(1_000),
            tiers: TierPolicy::default(),
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Reads and writes the settings file.
///
/// ## Usage
/// ```rust,ignore
/// let store = SettingsStore::locate(None)?;
///
/// let mut settings = store.load()?;
/// settings.default_tax = Percent::from_whole(10);
/// store.save(&settings)?;
/// ```
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store backed by an explicit file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SettingsStore { path: path.into() }
    }

    /// Resolves the settings file: explicit path, then `TALLY_SETTINGS`,
    /// then the platform config directory.
    pub fn locate(explicit: Option<PathBuf>) -> Result<Self, SettingsError> {
        if let Some(path) = explicit {
            return Ok(SettingsStore::new(path));
        }
        if let Ok(path) = std::env::var(SETTINGS_ENV) {
            if !path.trim().is_empty() {
                return Ok(SettingsStore::new(path));
            }
        }
        let dirs = project_dirs()?;
        Ok(SettingsStore::new(dirs.config_dir().join("settings.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file. A missing file yields defaults. Environment
    /// overrides are applied on top.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        let mut settings = match fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
                path: self.path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Settings file missing, using defaults");
                Settings::default()
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        apply_env_overrides(&mut settings);
        Ok(settings)
    }

    /// Writes pretty-printed JSON, creating parent directories.
    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(settings)?;
        let write_err = |source| SettingsError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }
        fs::write(&self.path, json).map_err(write_err)?;

        info!(path = %self.path.display(), "Settings saved");
        Ok(())
    }

    /// Loads, applies `change`, saves. Returns the saved settings.
    pub fn update<F>(&self, change: F) -> Result<Settings, SettingsError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.load()?;
        change(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }

    /// Database file for these settings: `TALLY_DB_PATH` (applied by
    /// `load`), the configured path, or `<data dir>/tally.db`.
    pub fn database_path(&self, settings: &Settings) -> Result<PathBuf, SettingsError> {
        match &settings.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join("tally.db")),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs, SettingsError> {
    ProjectDirs::from("com", "tally", "tally").ok_or(SettingsError::NoConfigDir)
}

fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        if !path.trim().is_empty() {
            settings.database_path = Some(PathBuf::from(path));
        }
    }
    if let Ok(text) = std::env::var(TAX_PERCENT_ENV) {
        if let Some(tax) = Percent::parse_lenient(&text) {
            settings.default_tax = tax;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{Tier, TierRule};

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        let settings = store.load().unwrap();

        assert_eq!(settings.loyalty.spend_per_point, Money::from_major(1_000));
        assert_eq!(settings.loyalty.tiers, TierPolicy::default());
    }

    #[test]
    fn test_save_creates_directories_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested/deeper/settings.json"));

        let mut settings = Settings::default();
        settings.store.name = "Corner Shop".to_string();
        settings.payment.bank_code = Some("970436".to_string());
        store.save(&settings).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.contains('\n'));
        assert_eq!(store.load().unwrap().store.name, "Corner Shop");
    }

    #[test]
    fn test_every_load_reads_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        store.save(&Settings::default()).unwrap();
        assert_eq!(store.load().unwrap().loyalty.tiers.gold.discount, Percent::from_whole(7));

        // Another writer changes the policy behind our back
        let other = SettingsStore::new(store.path());
        other
            .update(|s| *s.loyalty.tiers.rule_mut(Tier::Gold) = TierRule::new(500, Percent::from_whole(8)))
            .unwrap();

        assert_eq!(store.load().unwrap().loyalty.tiers.gold.discount, Percent::from_whole(8));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "store": { "name": "Kiosk" } }"#).unwrap();

        let settings = SettingsStore::new(&path).load().unwrap();
        assert_eq!(settings.store.name, "Kiosk");
        assert_eq!(settings.payment.default_method, PaymentMethod::Cash);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            SettingsStore::new(&path).load(),
            Err(SettingsError::Parse { .. })
        ));
    }
}
