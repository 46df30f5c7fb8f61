//! Scanner configuration layering: defaults, then environment, then flags.

use anyhow::{Context, Result};
use qc_18_shard_scanner::ScanConfig;
use tracing::{info, warn};

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// `--page-size`
    pub page_size: Option<u32>,
    /// `--max-retries`
    pub max_retries: Option<u32>,
    /// `--resolve-concurrency`
    pub resolve_concurrency: Option<usize>,
    /// `--call-timeout-ms`
    pub call_timeout_ms: Option<u64>,
}

/// Apply `QC_SCAN_PAGE_SIZE`, `QC_SCAN_MAX_RETRIES` and
/// `QC_SCAN_CALL_TIMEOUT_MS` from `lookup`.
pub fn apply_env(config: &mut ScanConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(raw) = lookup("QC_SCAN_PAGE_SIZE") {
        match raw.parse() {
            Ok(size) => {
                config.page_size = size;
                info!("Page size {} from QC_SCAN_PAGE_SIZE", size);
            }
            Err(_) => warn!("Ignoring invalid QC_SCAN_PAGE_SIZE={:?}", raw),
        }
    }
    if let Some(raw) = lookup("QC_SCAN_MAX_RETRIES") {
        match raw.parse::<u32>() {
            Ok(retries) => {
                config.retry.max_attempts = retries.saturating_add(1);
                info!("Max retries {} from QC_SCAN_MAX_RETRIES", retries);
            }
            Err(_) => warn!("Ignoring invalid QC_SCAN_MAX_RETRIES={:?}", raw),
        }
    }
    if let Some(raw) = lookup("QC_SCAN_CALL_TIMEOUT_MS") {
        match raw.parse() {
            Ok(ms) => {
                config.call_timeout_ms = ms;
                info!("Call timeout {}ms from QC_SCAN_CALL_TIMEOUT_MS", ms);
            }
            Err(_) => warn!("Ignoring invalid QC_SCAN_CALL_TIMEOUT_MS={:?}", raw),
        }
    }
}

/// Apply command-line overrides.
pub fn apply_overrides(config: &mut ScanConfig, overrides: &Overrides) {
    if let Some(size) = overrides.page_size {
        config.page_size = size;
    }
    if let Some(retries) = overrides.max_retries {
        config.retry.max_attempts = retries.saturating_add(1);
    }
    if let Some(concurrency) = overrides.resolve_concurrency {
        config.resolve_concurrency = concurrency;
    }
    if let Some(ms) = overrides.call_timeout_ms {
        config.call_timeout_ms = ms;
    }
}

/// Build and validate the effective configuration.
pub fn load_config(overrides: &Overrides) -> Result<ScanConfig> {
    let mut config = ScanConfig::default();
    apply_env(&mut config, |key| std::env::var(key).ok());
    apply_overrides(&mut config, overrides);
    config.validate().context("invalid scanner configuration")?;
    Ok(config)
}
