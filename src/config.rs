//! Database configuration from the environment, and pool construction.

use crate::error::{classify, BridgeError, ConfigError};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::time::Duration;

const DEFAULT_POOL_LIMIT: u32 = 10;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

fn numeric<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::NotNumeric { name, value })
}

/// Connection settings. Host, database, user and port are required; the
/// password defaults to empty and the pool limit to 10. A missing or
/// non-numeric required value is a startup failure the caller should treat
/// as fatal.
#[derive(Clone, Debug)]
pub struct DbConfig {
    pub host: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub port: u16,
    pub pool_limit: u32,
    pub acquire_timeout: Duration,
}

impl DbConfig {
    /// Read from process environment (`DB_HOST`, `DB_DATABASE`, `DB_USER`,
    /// `DB_PASSWORD`, `DB_PORT`, `DB_POOL_LIMIT`,
    /// `DB_ACQUIRE_TIMEOUT_SECS`), loading `.env` first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Parse from any key lookup; `from_env` wraps this over process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::MissingVar(name));

        let host = required("DB_HOST")?;
        let database = required("DB_DATABASE")?;
        let user = required("DB_USER")?;
        let password = lookup("DB_PASSWORD").unwrap_or_default();
        let port: u16 = numeric("DB_PORT", required("DB_PORT")?)?;
        let pool_limit: u32 = match lookup("DB_POOL_LIMIT") {
            Some(value) => numeric("DB_POOL_LIMIT", value)?,
            None => DEFAULT_POOL_LIMIT,
        };
        let acquire_timeout_secs: u64 = match lookup("DB_ACQUIRE_TIMEOUT_SECS") {
            Some(value) => numeric("DB_ACQUIRE_TIMEOUT_SECS", value)?,
            None => DEFAULT_ACQUIRE_TIMEOUT_SECS,
        };

        Ok(DbConfig {
            host,
            database,
            user,
            password,
            port,
            pool_limit,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
        })
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }

    /// Build the connection pool: callers beyond `pool_limit` wait for a
    /// freed connection, bounded by `acquire_timeout`.
    pub async fn connect(&self) -> Result<MySqlPool, BridgeError> {
        MySqlPoolOptions::new()
            .max_connections(self.pool_limit)
            .acquire_timeout(self.acquire_timeout)
            .connect_with(self.connect_options())
            .await
            .map_err(classify)
    }
}
