//! Log subscriber setup.
//!
//! Filter comes from `RUST_LOG`, then `QC_LOG_LEVEL`, then `info`. JSON output
//! is enabled by `--json-logs` or `QC_JSON_LOGS`.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Is an environment flag set to a truthy value?
pub fn env_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

/// Install the global subscriber.
pub fn init_logging(json_flag: bool) -> Result<()> {
    let level = std::env::var("QC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .with_context(|| format!("invalid log filter {level:?}"))?;

    let json = json_flag || env_flag(std::env::var("QC_JSON_LOGS").ok().as_deref());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .try_init()
            .context("failed to install JSON log subscriber")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .context("failed to install log subscriber")?;
    }
    Ok(())
}
