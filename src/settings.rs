use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;
use crate::persist::{IN_MEMORY, PersistenceMode};
use crate::sql::Dialect;

/// Runtime settings, read from an optional `wherewith.{toml,yaml,json,...}`
/// file and overridden by `WHEREWITH_*` environment variables.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: String,
    pub log_filter: String,
    pub echo_sql: bool,
    pub echo_dialect: Dialect,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: IN_MEMORY.to_string(),
            log_filter: "info".to_string(),
            echo_sql: true,
            echo_dialect: Dialect::Postgres,
        }
    }
}

impl Settings {
    pub const FILE: &'static str = "wherewith";
    pub const ENV_PREFIX: &'static str = "WHEREWITH";

    pub fn load() -> Result<Self> {
        Self::load_from(Self::FILE)
    }
    pub fn load_from(file: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix(Self::ENV_PREFIX))
            .build()?;
        Ok(config.try_deserialize()?)
    }
    pub fn persistence_mode(&self) -> PersistenceMode {
        PersistenceMode::from_database(&self.database)
    }
}
