//! # State Module
//!
//! What every command needs: the database and the settings store.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  ┌──────────────────────────┐     ┌──────────────────────────────────┐ │
//! │  │   Database               │     │   SettingsStore                  │ │
//! │  │   SqlitePool             │     │   path to settings.json          │ │
//! │  │   (shared, thread-safe)  │     │   load() reads the file each     │ │
//! │  │                          │     │   time, nothing cached           │ │
//! │  └──────────────────────────┘     └──────────────────────────────────┘ │
//! │                \                         /                              │
//! │                 ▼                       ▼                               │
//! │                ┌─────────────────────────┐                              │
//! │                │        AppState         │                              │
//! │                └─────────────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod settings;

use std::path::PathBuf;

use tracing::info;

use tally_db::{Database, DbConfig};

use crate::error::AppResult;

pub use settings::{
    LoyaltySettings, PaymentSettings, Settings, SettingsError, SettingsStore, StoreInfo, DB_PATH_ENV,
    SETTINGS_ENV, TAX_PERCENT_ENV,
};

/// Database plus settings, handed to every command.
#[derive(Debug, Clone)]
pub struct AppState {
    db: Database,
    settings: SettingsStore,
}

impl AppState {
    pub fn new(db: Database, settings: SettingsStore) -> Self {
        AppState { db, settings }
    }

    /// Locates the settings file, resolves the database path and connects
    /// (running migrations).
    ///
    /// `db_override` wins over `TALLY_DB_PATH` and the settings file.
    pub async fn open(settings_path: Option<PathBuf>, db_override: Option<PathBuf>) -> AppResult<Self> {
        let store = SettingsStore::locate(settings_path)?;
        let settings = store.load()?;

        let db_path = match db_override {
            Some(path) => path,
            None => store.database_path(&settings)?,
        };
        info!(db_path = %db_path.display(), settings = %store.path().display(), "Opening store");
        let db = Database::new(DbConfig::new(db_path)).await?;
        Ok(AppState::new(db, store))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Fresh read of the settings file.
    pub fn load_settings(&self) -> AppResult<Settings> {
        Ok(self.settings.load()?)
    }
}
