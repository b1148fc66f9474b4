//! CLI command implementations.

pub mod build;

use anyhow::{Context, Result};
use conveyor_config::{Settings, load_settings, validate_project_prefix};
use std::path::{Path, PathBuf};

/// Settings file read when `--config` is not given.
pub const DEFAULT_CONFIG: &str = "conveyor.kdl";

/// Load settings from `path`, or from `./conveyor.kdl` if it exists, or defaults.
pub fn resolve_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG).exists() => Path::new(DEFAULT_CONFIG),
        None => return Ok(Settings::default()),
    };

    load_settings(path).with_context(|| format!("Failed to load config: {}", path.display()))
}

/// Apply `build` flag overrides on top of loaded settings.
pub fn apply_overrides(
    mut settings: Settings,
    project_prefix: Option<String>,
    region: Option<String>,
) -> Result<Settings> {
    if let Some(prefix) = project_prefix {
        validate_project_prefix(&prefix).context("Invalid --project-prefix")?;
        settings.project_prefix = prefix;
    }
    if region.is_some() {
        settings.region = region;
    }
    Ok(settings)
}

/// File checked by `validate`: the argument, then `--config`, then `./conveyor.kdl`.
pub fn validate_target(path: Option<PathBuf>, config: Option<PathBuf>) -> PathBuf {
    path.or(config).unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}

pub fn validate(path: &Path) -> Result<()> {
    match load_settings(path) {
        Ok(settings) => {
            println!("Configuration is valid");
            println!("  project prefix: {}", settings.project_prefix);
            println!(
                "  region: {}",
                settings.region.as_deref().unwrap_or("(from environment)")
            );
            println!(
                "  log poll interval: {}ms",
                settings.log_poll_interval.as_millis()
            );
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}
