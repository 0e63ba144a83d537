use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::str::FromStr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    fn parse_as<T>(var: &str, raw: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        raw.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    }

    let database_url = require("DATABASE_URL")?;
    let admin_key = require("ADMIN_KEY")?;

    let env = parse_environment(&or_default("DIWALI_ENV", "development"))?;

    let bind_addr: SocketAddr = parse_as(
        "DIWALI_BIND_ADDR",
        &or_default("DIWALI_BIND_ADDR", "0.0.0.0:8001"),
    )?;
    let log_level = or_default("DIWALI_LOG_LEVEL", "info");
    let app_domain = or_default("APP_DOMAIN", "localhost:3000");
    let uploads_dir = PathBuf::from(or_default("DIWALI_UPLOADS_DIR", "./uploads"));

    let link_expiry_days: i64 = parse_as(
        "DIWALI_LINK_EXPIRY_DAYS",
        &or_default("DIWALI_LINK_EXPIRY_DAYS", "30"),
    )?;
    if link_expiry_days < 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "DIWALI_LINK_EXPIRY_DAYS".to_string(),
            reason: "must not be negative".to_string(),
        });
    }

    let db_max_connections: u32 = parse_as(
        "DIWALI_DB_MAX_CONNECTIONS",
        &or_default("DIWALI_DB_MAX_CONNECTIONS", "10"),
    )?;
    let db_min_connections: u32 = parse_as(
        "DIWALI_DB_MIN_CONNECTIONS",
        &or_default("DIWALI_DB_MIN_CONNECTIONS", "1"),
    )?;
    let db_acquire_timeout_secs: u64 = parse_as(
        "DIWALI_DB_ACQUIRE_TIMEOUT_SECS",
        &or_default("DIWALI_DB_ACQUIRE_TIMEOUT_SECS", "10"),
    )?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        admin_key,
        app_domain,
        uploads_dir,
        link_expiry_days,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "DIWALI_ENV".to_string(),
            reason: format!("expected development, test or production, got '{other}'"),
        }),
    }
}
