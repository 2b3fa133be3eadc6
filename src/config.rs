// src/config.rs

//! Configuration loading with environment overrides.
//!
//! Precedence: `INDEXER_*` environment variables, then the TOML file, then
//! built-in defaults.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, StoreBackend};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "INDEXER_";

/// Load, override and validate the configuration.
///
/// A missing file is only an error when `required` is set; otherwise the
/// defaults are used. A file that exists but cannot be read or parsed is
/// always an error.
pub fn load_config(path: &Path, required: bool) -> Result<Config> {
    let mut config = if required || path.exists() {
        Config::load(path).map_err(|e| {
            AppError::config(format!("cannot load {}: {}", path.display(), e))
        })?
    } else {
        Config::default()
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Apply `INDEXER_*` overrides read through `lookup`.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

    if let Some(value) = var("CI_INDEX") {
        config.index.ci_index = value;
    }
    if let Some(value) = var("EVENT_INDEX") {
        config.index.event_index = value;
    }
    if let Some(value) = var("WORK_ORDER_PATTERN") {
        config.index.work_order_pattern = value;
    }
    if let Some(value) = var("MAX_ATTEMPTS") {
        config.correlation.max_attempts = parse_number("MAX_ATTEMPTS", &value)?;
    }
    if let Some(value) = var("RETRY_DELAY_MS") {
        config.correlation.retry_delay_ms = parse_number("RETRY_DELAY_MS", &value)?;
    }
    if let Some(value) = var("STORE_BACKEND") {
        config.store.backend = match value.to_lowercase().as_str() {
            "local" => StoreBackend::Local,
            "elastic" => StoreBackend::Elastic,
            other => {
                return Err(AppError::config(format!(
                    "{ENV_PREFIX}STORE_BACKEND: unknown backend '{other}'"
                )));
            }
        };
    }
    if let Some(value) = var("LOCAL_ROOT") {
        config.store.local_root = value;
    }
    if let Some(value) = var("ELASTIC_URL") {
        config.store.elastic_url = value;
    }
    if let Some(value) = var("TIMEOUT_SECS") {
        config.store.timeout_secs = parse_number("TIMEOUT_SECS", &value)?;
    }
    if let Some(value) = var("MAX_CONCURRENT") {
        config.consumer.max_concurrent = parse_number("MAX_CONCURRENT", &value)?;
    }
    if let Some(value) = var("LOG_LEVEL") {
        config.logging.level = value;
    }

    Ok(())
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        AppError::config(format!("{ENV_PREFIX}{name}: '{value}' is not a valid number"))
    })
}
