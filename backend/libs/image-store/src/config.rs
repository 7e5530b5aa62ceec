//! Database connection settings
//!
//! Accepts either `DATABASE_URL` or the discrete `DB_HOST` / `DB_USER` /
//! `DB_PASSWORD` / `DB_NAME` parts. The URL wins when both are present.

use pipeline_core::config::non_blank;
use pipeline_core::{codes, PipelineError, Result};
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Deserialize)]
pub struct DbConfig {
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub db_host: Option<String>,
    #[serde(default)]
    pub db_user: Option<String>,
    #[serde(default)]
    pub db_password: Option<String>,
    #[serde(default)]
    pub db_name: Option<String>,
    #[serde(default = "default_port")]
    pub db_port: u16,
    /// Bound on establishing a connection for one statement
    #[serde(default = "default_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    /// Pool acquisition timeout
    #[serde(default = "default_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,
}

fn default_port() -> u16 {
    5432
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    10
}

fn default_max_connections() -> u32 {
    2
}

impl DbConfig {
    pub fn from_env() -> Result<Self> {
        Self::validate(envy::from_env::<Self>())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self::validate(envy::from_iter::<_, Self>(vars))
    }

    fn validate(parsed: std::result::Result<Self, envy::Error>) -> Result<Self> {
        let mut config = parsed.map_err(|e| {
            PipelineError::configuration(
                codes::INVALID_CONFIG,
                format!("Invalid database configuration: {e}"),
            )
        })?;

        config.database_url = non_blank(config.database_url);
        config.db_host = non_blank(config.db_host);
        config.db_user = non_blank(config.db_user);
        config.db_name = non_blank(config.db_name);
        // db_password may be empty (trust auth) but must be set
        if config.database_url.is_some() {
            return Ok(config);
        }

        let missing: Vec<&str> = [
            ("DB_HOST", config.db_host.is_none()),
            ("DB_USER", config.db_user.is_none()),
            ("DB_PASSWORD", config.db_password.is_none()),
            ("DB_NAME", config.db_name.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        if !missing.is_empty() {
            return Err(PipelineError::configuration(
                codes::DB_CONFIG_MISSING,
                format!(
                    "Database configuration incomplete: set DATABASE_URL or provide {}",
                    missing.join(", ")
                ),
            ));
        }

        Ok(config)
    }

    /// Connection options for the configured database
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Some(url) = &self.database_url {
            return PgConnectOptions::from_str(url).map_err(|e| {
                PipelineError::configuration(
                    codes::INVALID_CONFIG,
                    format!("Invalid DATABASE_URL: {e}"),
                )
            });
        }

        let mut options = PgConnectOptions::new().port(self.db_port);
        if let Some(host) = &self.db_host {
            options = options.host(host);
        }
        if let Some(user) = &self.db_user {
            options = options.username(user);
        }
        if let Some(password) = &self.db_password {
            options = options.password(password);
        }
        if let Some(name) = &self.db_name {
            options = options.database(name);
        }
        Ok(options)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.db_connect_timeout_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.db_acquire_timeout_secs)
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("db_host", &self.db_host)
            .field("db_user", &self.db_user)
            .field("db_password", &self.db_password.as_ref().map(|_| "[REDACTED]"))
            .field("db_name", &self.db_name)
            .field("db_port", &self.db_port)
            .field("db_connect_timeout_secs", &self.db_connect_timeout_secs)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("db_max_connections", &self.db_max_connections)
            .finish()
    }
}
