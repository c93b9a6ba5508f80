//! # Settings
//!
//! Deployment settings: where the database lives and how the domain layer
//! behaves.
//!
//! ## Loading Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Defaults                                                            │
//! │  2. settings.toml (explicit path, else the platform config dir)        │
//! │  3. Environment overrides                                              │
//! │       TENDER_DB_PATH             → database.path                       │
//! │       TENDER_DB_MAX_CONNECTIONS  → database.max_connections            │
//! │       TENDER_SANDBOX_MODE        → core.sandbox_mode                   │
//! │       TENDER_SERVER_ID           → core.server_id                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example File
//! ```toml
//! [database]
//! path = "/var/lib/tenders/tenders.db"
//! max_connections = 10
//!
//! [core]
//! sandbox_mode = true
//! server_id = "s1"
//! disabled_brokers = ["broker05"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tender_core::CoreConfig;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

const SETTINGS_FILE: &str = "settings.toml";

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: PathBuf::from("tenders.db"),
            max_connections: 5,
        }
    }
}

/// Everything a deployment configures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub core: CoreConfig,
}

impl Settings {
    /// Parses settings from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> DbResult<Self> {
        toml::from_str(raw).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Loads settings from a file and the process environment.
    ///
    /// An explicit `path` must exist. Without one, `settings.toml` in the
    /// platform config directory is read when present.
    pub fn load(path: Option<&Path>) -> DbResult<Self> {
        let file = match path {
            Some(path) if !path.exists() => {
                return Err(DbError::Config(format!(
                    "settings file not found: {}",
                    path.display()
                )));
            }
            Some(path) => Some(path.to_path_buf()),
            None => default_settings_path().filter(|path| path.exists()),
        };

        let mut settings = match file {
            Some(file) => {
                info!(path = %file.display(), "Loading settings");
                let raw = std::fs::read_to_string(&file)
                    .map_err(|e| DbError::Config(format!("{}: {}", file.display(), e)))?;
                Self::from_toml_str(&raw)?
            }
            None => {
                debug!("No settings file, using defaults");
                Settings::default()
            }
        };

        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Applies `TENDER_*` overrides read through `lookup`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("TENDER_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(raw) = lookup("TENDER_DB_MAX_CONNECTIONS") {
            match raw.parse() {
                Ok(max) => self.database.max_connections = max,
                Err(_) => warn!(value = %raw, "Invalid TENDER_DB_MAX_CONNECTIONS, ignoring"),
            }
        }

        if let Some(raw) = lookup("TENDER_SANDBOX_MODE") {
            match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.core.sandbox_mode = true,
                "0" | "false" | "no" => self.core.sandbox_mode = false,
                _ => warn!(value = %raw, "Invalid TENDER_SANDBOX_MODE, ignoring"),
            }
        }

        if let Some(server_id) = lookup("TENDER_SERVER_ID") {
            self.core.server_id = Some(server_id).filter(|id| !id.is_empty());
        }
    }

    fn validate(&self) -> DbResult<()> {
        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(DbError::Config("database.path is empty".to_string()));
        }
        Ok(())
    }

    /// Pool configuration for these settings.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone()).max_connections(self.database.max_connections)
    }
}

/// `settings.toml` in the platform config directory, when one exists.
pub fn default_settings_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("ua", "openprocurement", "tender-core")
        .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
}

// =============================================================================
// Unit Tests
// =============================================================================
