use anyhow::{Context, Result, ensure};
use chrono::FixedOffset;
use std::env;
use std::str::FromStr;

use crate::api::UpstreamConfig;
use crate::backfill::DEFAULT_BATCH_SIZE;
use crate::cache::DEFAULT_QUOTA_BYTES;
use crate::context::DEFAULT_WINDOW_YEARS;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bundle_path: String,
    pub upstream: UpstreamConfig,
    pub window_years: u32,
    pub batch_size: usize,
    pub utc_offset_hours: i32,
    pub cache_quota_bytes: usize,
}

impl Config {
    pub fn utc_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .with_context(|| format!("UTC offset {}h is out of range", self.utc_offset_hours))
    }
}

pub fn load() -> Result<Config> {
    load_from(|key| env::var(key).ok())
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has invalid value {raw:?}")),
        None => Ok(default),
    }
}

pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let defaults = UpstreamConfig::default();

    let database_url = lookup("LOTTO_DB_PATH").unwrap_or_else(|| "data/lottery.db".to_string());
    let bundle_path =
        lookup("LOTTO_BUNDLE_PATH").unwrap_or_else(|| "data/bundled_draws.json".to_string());
    let upstream = UpstreamConfig {
        base_url: lookup("LOTTO_API_BASE").unwrap_or(defaults.base_url),
        record_path: lookup("LOTTO_RECORD_PATH").unwrap_or(defaults.record_path),
        index_path: lookup("LOTTO_INDEX_PATH").unwrap_or(defaults.index_path),
        ..defaults
    };

    let config = Config {
        database_url,
        bundle_path,
        upstream,
        window_years: parsed(&lookup, "LOTTO_WINDOW_YEARS", DEFAULT_WINDOW_YEARS)?,
        batch_size: parsed(&lookup, "LOTTO_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
        utc_offset_hours: parsed(&lookup, "LOTTO_UTC_OFFSET_HOURS", 7)?,
        cache_quota_bytes: parsed(&lookup, "LOTTO_CACHE_QUOTA_BYTES", DEFAULT_QUOTA_BYTES)?,
    };

    ensure!(config.window_years >= 1, "LOTTO_WINDOW_YEARS must be at least 1");
    ensure!(config.batch_size >= 1, "LOTTO_BATCH_SIZE must be at least 1");
    config.utc_offset()?;

    Ok(config)
}
