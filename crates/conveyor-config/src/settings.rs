//! Runner settings parsing.

use crate::{ConfigError, ConfigResult};
use conveyor_core::DEFAULT_PROJECT_PREFIX;
use kdl::{KdlDocument, KdlNode, KdlValue};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

const DEFAULT_LOG_POLL_INTERVAL: Duration = Duration::from_secs(1);

// Job service project names must start with a letter or digit.
static PROJECT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("valid regex"));

/// Settings for running builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Prefix of job service project names (`<prefix>-<repository>`).
    pub project_prefix: String,
    /// Cloud region. Falls back to the SDK's provider chain when unset.
    pub region: Option<String>,
    /// Delay between log polls while the build produces no output.
    pub log_poll_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_prefix: DEFAULT_PROJECT_PREFIX.to_string(),
            region: None,
            log_poll_interval: DEFAULT_LOG_POLL_INTERVAL,
        }
    }
}

/// Check a project name prefix, whether it came from a file or a flag.
pub fn validate_project_prefix(prefix: &str) -> ConfigResult<()> {
    if PROJECT_PREFIX.is_match(prefix) {
        return Ok(());
    }
    Err(ConfigError::InvalidValue {
        field: "project-prefix".to_string(),
        message: format!(
            "'{}' must start with a letter or digit and contain only letters, digits, '-' or '_'",
            prefix
        ),
    })
}

/// Read and parse a settings file.
pub fn load_settings(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    let content = std::fs::read_to_string(path)?;
    parse_settings(&content)
}

/// Parse settings from KDL text.
pub fn parse_settings(kdl: &str) -> ConfigResult<Settings> {
    let doc: KdlDocument = kdl.parse()?;

    let mut settings = Settings::default();
    let mut seen = HashSet::new();

    for node in doc.nodes() {
        let name = node.name().value();
        if !seen.insert(name.to_string()) {
            return Err(ConfigError::Duplicate(name.to_string()));
        }

        match name {
            "project-prefix" => {
                let prefix = get_string_arg(node)?;
                validate_project_prefix(&prefix)?;
                settings.project_prefix = prefix;
            }
            "region" => {
                settings.region = Some(get_string_arg(node)?);
            }
            "log-poll-interval-ms" => {
                let millis = get_integer_arg(node)?;
                if millis <= 0 || millis > u64::MAX as i128 {
                    return Err(ConfigError::InvalidValue {
                        field: name.to_string(),
                        message: format!("{} is not a positive number of milliseconds", millis),
                    });
                }
                settings.log_poll_interval = Duration::from_millis(millis as u64);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(settings)
}

fn first_arg(node: &KdlNode) -> Option<&KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

fn get_string_arg(node: &KdlNode) -> ConfigResult<String> {
    let field = node.name().value();
    let value = first_arg(node).ok_or_else(|| ConfigError::MissingValue(field.to_string()))?;
    match value.as_string() {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        Some(_) => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: "must not be empty".to_string(),
        }),
        None => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("expected a string, got {}", value),
        }),
    }
}

fn get_integer_arg(node: &KdlNode) -> ConfigResult<i128> {
    let field = node.name().value();
    let value = first_arg(node).ok_or_else(|| ConfigError::MissingValue(field.to_string()))?;
    value.as_integer().ok_or_else(|| ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("expected an integer, got {}", value),
    })
}
