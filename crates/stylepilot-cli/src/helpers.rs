//! Shared setup for the subcommands.

use std::path::Path;

use anyhow::{Context, Result};
use stylepilot_agent::Settings;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Settings file picked up from the working directory when none is given.
const DEFAULT_SETTINGS_FILE: &str = "stylepilot.toml";

/// Initialize the tracing subscriber with an env-filter and compact output.
///
/// Logs go to stderr so that command output on stdout stays pipeable.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Load settings from `path`, or from `stylepilot.toml` if present, then
/// apply environment overrides.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let mut settings = match path {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None if Path::new(DEFAULT_SETTINGS_FILE).exists() => Settings::load(DEFAULT_SETTINGS_FILE)
            .with_context(|| format!("failed to load {DEFAULT_SETTINGS_FILE}"))?,
        None => Settings::default(),
    };
    settings
        .apply_env()
        .context("invalid environment override")?;

    info!(provider = %settings.default_provider, "settings loaded");
    Ok(settings)
}
