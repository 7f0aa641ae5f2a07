// ⚙️ Configuration - read once at startup from the environment
//
//   TIRELIRE_DB_PATH       SQLite file            (default: tirelire.db)
//   TIRELIRE_HOST          HTTP bind host         (default: 0.0.0.0)
//   TIRELIRE_PORT          HTTP bind port         (default: 3000)
//   TIRELIRE_CATALOG_CSV   extra catalog CSV      (optional)
//
// A `.env` file in the working directory is honoured by the binaries.

use crate::denomination::DenominationCatalog;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

pub const DB_PATH_VAR: &str = "TIRELIRE_DB_PATH";
pub const HOST_VAR: &str = "TIRELIRE_HOST";
pub const PORT_VAR: &str = "TIRELIRE_PORT";
pub const CATALOG_CSV_VAR: &str = "TIRELIRE_CATALOG_CSV";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub catalog_csv: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            db_path: PathBuf::from("tirelire.db"),
            host: "0.0.0.0".to_string(),
            port: 3000,
            catalog_csv: None,
        }
    }
}

impl AppConfig {
    /// Load from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with("TIRELIRE_"))
            .collect();
        Self::from_vars(&vars)
    }

    /// Load from an explicit variable map (unset keys fall back to defaults)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = AppConfig::default();
        let get = |key: &str| {
            vars.get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        let port = match get(PORT_VAR) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: PORT_VAR.to_string(),
                message: format!("{:?} is not a valid port ({})", raw, e),
            })?,
            None => defaults.port,
        };

        Ok(AppConfig {
            db_path: get(DB_PATH_VAR).map(PathBuf::from).unwrap_or(defaults.db_path),
            host: get(HOST_VAR).map(str::to_string).unwrap_or(defaults.host),
            port,
            catalog_csv: get(CATALOG_CSV_VAR).map(PathBuf::from),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Catalog to seed the database with: the CSV file if configured, else Euro
    pub fn seed_catalog(&self) -> anyhow::Result<DenominationCatalog> {
        match &self.catalog_csv {
            Some(path) => DenominationCatalog::from_csv(path),
            None => Ok(DenominationCatalog::euro()),
        }
    }
}
