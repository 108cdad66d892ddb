//! Demonstration settings.
//!
//! Every value the runner needs (connection target, table name, item count,
//! DDL) lives in [`DemoConfig`]. The defaults reproduce the fixed
//! demonstration; a TOML file may override any subset of them:
//!
//! ```toml
//! connection = "sqlite::memory:"
//! table = "ORDER_ITEMS"
//! item_count = 5
//! batch_client_id = 3
//! call_input = "lowercase to uppercase"
//! ```

use std::{fs, path::Path};

use log::{debug, info};
use serde::Deserialize;
use thiserror::Error;

use crate::error::DatabaseError;
use crate::order_item::order_items_table;
use crate::sqlite::SqliteConfig;

/// All the ways config loading can go wrong
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    /// `sqlite::memory:` or `sqlite:<path>`
    pub connection: String,
    pub table: String,
    /// Rows inserted by each of the three strategies
    pub item_count: i64,
    /// Client id bound for every entry of the batched insert
    pub batch_client_id: i64,
    /// String handed to the `upper` routine
    pub call_input: String,
    /// Replaces the DDL rendered from the table definition
    pub create_sql: Option<String>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            connection: "sqlite::memory:".into(),
            table: "ORDER_ITEMS".into(),
            item_count: 5,
            batch_client_id: 3,
            call_input: "lowercase to uppercase".into(),
            create_sql: None,
        }
    }
}

impl DemoConfig {
    pub fn from_toml_str(txt: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(txt)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.item_count < 1 {
            return Err(ConfigError::InvalidValue {
                field: "item_count",
                reason: format!("must be at least 1, got {}", self.item_count),
            });
        }
        if self.table.is_empty()
            || !self
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::InvalidValue {
                field: "table",
                reason: format!("'{}' is not a plain identifier", self.table),
            });
        }
        Ok(())
    }

    /// Parse the connection string into a SQLite connection config.
    pub fn sqlite_config(&self) -> Result<SqliteConfig, DatabaseError> {
        Ok(SqliteConfig::new(self.connection.parse()?))
    }

    pub fn create_sql(&self) -> String {
        self.create_sql
            .clone()
            .unwrap_or_else(|| order_items_table(&self.table).create_sql())
    }
}

/// Load and validate a [`DemoConfig`] from the TOML file at `path`.
pub fn load(path: &Path) -> Result<DemoConfig, ConfigError> {
    debug!("reading config from {}", path.display());
    let txt = fs::read_to_string(path)?;
    let cfg = DemoConfig::from_toml_str(&txt)?;
    info!("loaded config from {}", path.display());
    Ok(cfg)
}
